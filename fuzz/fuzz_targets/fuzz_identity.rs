//! Fuzz target: `append_suffix` / `write_c_name`
//!
//! Arbitrary base names and suffixes must always produce a bounded name
//! that keeps the base, and writing it into a directory buffer of any
//! size must stay in bounds.
//!
//! cargo fuzz run fuzz_identity

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshnode::config::NAME_CAPACITY;
use meshnode::registration::identity::append_suffix;
use meshnode::registration::write_c_name;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = core::str::from_utf8(rest) else {
        return;
    };
    let mut cut = (split as usize).min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let (base, suffix) = text.split_at(cut);
    // Suffixes are hex in practice; keep the ASCII part only.
    let suffix: String = suffix.chars().filter(|c| c.is_ascii_hexdigit()).collect();

    let name = append_suffix::<NAME_CAPACITY>(base, &suffix);
    assert!(name.len() <= NAME_CAPACITY);
    if base.len() <= NAME_CAPACITY {
        assert!(name.starts_with(base));
    }

    let mut buf = vec![0u8; split as usize % 40];
    if let Ok(n) = write_c_name(&mut buf, &name) {
        assert!(n < buf.len());
        assert_eq!(buf[n], 0);
    }
});
