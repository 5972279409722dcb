//! GPIO / peripheral pin assignments for the mesh node board
//! (ESP32-H2 devkit plus a small I/O daughterboard).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Indicator LEDs / actuator output (active HIGH)
// ---------------------------------------------------------------------------

/// Lit while attached to the mesh.
pub const CONNECTION_LED_GPIO: i32 = 10;
/// Blinks while the provisioning window is open.
pub const PROVISIONING_LED_GPIO: i32 = 11;
/// Light / pump actuator.  Drives a MOSFET gate; the on-board LED in
/// parallel shows the output state.
pub const LIGHT_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Sensors (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor divider.  GPIO1 = ADC1 channel 0 on ESP32-H2.
pub const TEMP_ADC_GPIO: i32 = 1;
/// Battery voltage through a 2:1 divider.  GPIO2 = ADC1 channel 1.
pub const BATTERY_ADC_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// BOOT button, active LOW with internal pull-up.  Opens the
/// provisioning window.
pub const BUTTON_GPIO: i32 = 9;
