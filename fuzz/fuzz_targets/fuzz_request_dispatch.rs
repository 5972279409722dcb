//! Fuzz target: inbound CoAP request → `Dispatcher::dispatch`
//!
//! Builds a request from arbitrary header bytes, path and body the way
//! the OpenThread adapter does, then dispatches it.  The dispatcher must
//! never panic, must only answer non-confirmable requests, and every
//! answer must echo the request token.
//!
//! cargo fuzz run fuzz_request_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshnode::adapters::openthread::coap::{request_from_raw, RawRequest};
use meshnode::coap::dispatcher::{Dispatch, Dispatcher, ResourceTargets};
use meshnode::coap::resources::{LightCommand, Resource};
use meshnode::coap::{MessageType, Peer};

#[derive(Default)]
struct Targets {
    light: bool,
}

impl ResourceTargets for Targets {
    fn apply_light(&mut self, command: LightCommand) -> bool {
        self.light = match command {
            LightCommand::Off => false,
            LightCommand::On => true,
            LightCommand::Toggle => !self.light,
        };
        self.light
    }

    fn light_state(&self) -> bool {
        self.light
    }

    fn read_measurement(&mut self) -> i8 {
        -3
    }

    fn claim_provisioning_address(&mut self) -> Option<[u8; 16]> {
        None
    }
}

fuzz_target!(|data: &[u8]| {
    // [type, code, path selector, token len, token.., payload..]
    if data.len() < 4 {
        return;
    }
    let path = match data[2] as usize % 5 {
        4 => "",
        i => Resource::ALL[i].path(),
    };
    let token_len = (data[3] as usize % 9).min(data.len() - 4);
    let (token, payload) = data[4..].split_at(token_len);
    let raw = RawRequest {
        message_type: data[0],
        code: data[1],
        message_id: 0,
        token,
        payload,
        peer: Peer::default(),
    };

    let request = request_from_raw(path, &raw);
    let mut targets = Targets::default();
    if let Dispatch::Respond { response, .. } = Dispatcher::new("0.3.0").dispatch(&request, &mut targets) {
        assert_eq!(request.message_type, MessageType::NonConfirmable);
        assert_eq!(response.token, request.token);
        assert!(response.payload.len() <= 16);
    }
});
