//! NodeService end-to-end: requests, safety cutoff, sensor fallback and
//! the provisioning window, against mock hardware.

use meshnode::app::events::{AppEvent, LightCause};
use meshnode::app::ports::{IndicatorChannel, IndicatorPort, TimerId};
use meshnode::app::service::FIRMWARE_VERSION;
use meshnode::coap::dispatcher::DropReason;
use meshnode::coap::resources::Resource;
use meshnode::coap::{Code, MessageType, Request};
use meshnode::config::NodeConfig;
use meshnode::error::{ResponseError, SampleError, TimerError};
use meshnode::events::NodeEvent;
use meshnode::fsm::DeviceRole;
use meshnode::sensors::temperature::SimulatedTemperature;
use meshnode::sensors::Quality;

use crate::mock_hw::{non, Node, ScriptedSensor, EID, TOKEN};

fn node() -> Node<SimulatedTemperature> {
    Node::start(NodeConfig::default(), SimulatedTemperature::new())
}

fn cutoffs(node: &Node<impl meshnode::app::ports::MeasurementPort>) -> usize {
    node.sink.count(|e| {
        matches!(
            e,
            AppEvent::LightChanged {
                on: false,
                cause: LightCause::SafetyCutoff
            }
        )
    })
}

// ── Light ─────────────────────────────────────────────────────

#[test]
fn light_on_is_cut_off_after_ten_seconds() {
    let mut n = node();
    let resp = n.put_light(b'1').expect("light PUT answered");
    assert_eq!(resp.code, Code::Changed);
    assert_eq!(resp.payload.as_slice(), &[1]);
    assert_eq!(resp.token.as_slice(), &TOKEN);
    assert!(n.light_output());

    n.advance(9_999);
    assert!(n.light_output());
    n.advance(1);
    assert!(!n.light_output());
    assert!(!n.service.light_active());
    assert_eq!(cutoffs(&n), 1);

    let resp = n.get("light").unwrap();
    assert_eq!(resp.code, Code::Content);
    assert_eq!(resp.payload.as_slice(), &[0]);
}

#[test]
fn repeated_on_does_not_extend_the_cutoff() {
    let mut n = node();
    n.put_light(b'1');
    n.advance(5_000);
    assert_eq!(n.put_light(b'1').unwrap().payload.as_slice(), &[1]);
    n.advance(5_000);
    assert!(!n.light_output());
    assert_eq!(cutoffs(&n), 1);
}

#[test]
fn off_cancels_the_cutoff() {
    let mut n = node();
    n.put_light(b'1');
    n.advance(3_000);
    assert_eq!(n.put_light(b'0').unwrap().payload.as_slice(), &[0]);
    n.advance(60_000);
    assert_eq!(cutoffs(&n), 0);
    assert!(!n.board.timers.is_armed(TimerId::SafetyCutoff));
}

#[test]
fn reactivation_gets_a_fresh_window() {
    let mut n = node();
    n.put_light(b'1');
    n.advance(3_000);
    n.put_light(b'0');
    n.advance(1_000);
    n.put_light(b'1');
    // The first activation would have expired at t=10s.
    n.advance(9_000);
    assert!(n.light_output());
    n.advance(1_000);
    assert!(!n.light_output());
    assert_eq!(cutoffs(&n), 1);
}

#[test]
fn toggle_flips_the_state() {
    let mut n = node();
    assert_eq!(n.put_light(b'2').unwrap().payload.as_slice(), &[1]);
    assert_eq!(n.put_light(b'2').unwrap().payload.as_slice(), &[0]);
    assert!(!n.light_output());
}

#[test]
fn unknown_command_reports_unchanged_state() {
    let mut n = node();
    n.put_light(b'1');
    let resp = n.put_light(b'x').unwrap();
    assert_eq!(resp.code, Code::Changed);
    assert_eq!(resp.payload.as_slice(), &[1]);
    assert!(n.light_output());
}

#[test]
fn multi_byte_put_is_dropped() {
    let mut n = node();
    assert!(n.request(non("light", Code::Put, b"11")).is_none());
    assert!(n.request(non("light", Code::Put, b"")).is_none());
    assert!(!n.light_output());
    assert!(n.sink.events.contains(&AppEvent::RequestDropped {
        resource: Some(Resource::Light),
        reason: DropReason::PayloadLength(2),
    }));
}

#[test]
fn light_stays_off_when_cutoff_cannot_be_armed() {
    let mut n = node();
    n.board.timers.refuse_starts(true);
    let resp = n.put_light(b'1').unwrap();
    assert_eq!(resp.payload.as_slice(), &[0]);
    assert!(!n.light_output());
    assert!(n
        .sink
        .events
        .contains(&AppEvent::LightRefused(TimerError::StartFailed(-1))));
}

// ── Contract checks ───────────────────────────────────────────

#[test]
fn mismatched_type_or_code_gets_no_reply() {
    let mut n = node();
    let con = Request::new("light", MessageType::Confirmable, Code::Get, &TOKEN, &[]);
    assert!(n.request(con).is_none());
    assert!(n.request(non("temperature", Code::Put, b"1")).is_none());
    assert!(n.request(non("info", Code::Delete, &[])).is_none());
    assert!(n.get("nope").is_none());

    let reasons: Vec<_> = n
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RequestDropped { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            DropReason::UnexpectedType,
            DropReason::UnexpectedCode,
            DropReason::UnexpectedCode,
            DropReason::UnknownResource,
        ]
    );
}

#[test]
fn info_serves_the_firmware_version() {
    let mut n = node();
    let resp = n.get("info").unwrap();
    assert_eq!(resp.code, Code::Content);
    assert_eq!(resp.payload.len(), 8);
    let len = FIRMWARE_VERSION.len().min(8);
    assert_eq!(&resp.payload[..len], &FIRMWARE_VERSION.as_bytes()[..len]);
}

#[test]
fn transport_failure_is_reported() {
    let mut n = node();
    n.ot.sim_fail_sends(Some(ResponseError::NoBufs));
    assert!(n.get("info").is_none());
    assert!(n.sink.events.contains(&AppEvent::ResponseFailed {
        resource: Resource::Info,
        error: ResponseError::NoBufs,
    }));
}

// ── Sensor ────────────────────────────────────────────────────

#[test]
fn simulated_temperature_walks() {
    let mut n = node();
    let first = n.get("temperature").unwrap();
    let second = n.get("temperature").unwrap();
    assert_eq!(first.payload.as_slice(), &[24]);
    assert_eq!(second.payload.as_slice(), &[25]);
}

#[test]
fn sample_failure_serves_cached_value() {
    let source = ScriptedSensor::new(vec![Ok(215), Err(SampleError::AdcReadFailed)]);
    let mut n = Node::start(NodeConfig::default(), source);
    assert_eq!(n.get("temperature").unwrap().payload.as_slice(), &[22]);
    assert_eq!(n.get("temperature").unwrap().payload.as_slice(), &[22]);
    assert_eq!(n.service.last_reading().quality, Quality::Converted);
}

#[test]
fn conversion_failure_serves_saturated_raw() {
    let mut source = ScriptedSensor::new(vec![Ok(300)]);
    source.fail_conversion = true;
    let mut n = Node::start(NodeConfig::default(), source);
    assert_eq!(n.get("temperature").unwrap().payload.as_slice(), &[127]);
    assert_eq!(n.service.last_reading().quality, Quality::Raw);
}

#[test]
fn negative_reading_is_twos_complement() {
    let mut n = Node::start(NodeConfig::default(), ScriptedSensor::new(vec![Ok(-55)]));
    assert_eq!(n.get("temperature").unwrap().payload.as_slice(), &[(-6i8) as u8]);
}

#[test]
fn background_refresh_updates_the_cache() {
    let config = NodeConfig {
        sensor_refresh_secs: 30,
        ..Default::default()
    };
    let mut n = Node::start(config, SimulatedTemperature::new());
    n.advance(30_000);
    assert_eq!(n.service.last_reading().value, 24);
    n.advance(30_000);
    assert_eq!(n.service.last_reading().value, 25);
    assert_eq!(n.sink.count(|e| matches!(e, AppEvent::Measurement(_))), 2);
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn button_is_ignored_until_attached() {
    let mut n = node();
    n.feed(NodeEvent::ButtonPressed);
    assert!(!n.service.provisioning_open());
    assert!(n.get("provisioning").is_none());
}

#[test]
fn provisioning_serves_the_eid_once() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.feed(NodeEvent::ButtonPressed);
    assert!(n.service.provisioning_open());
    assert!(n.board.indicators.is_on(IndicatorChannel::Provisioning));

    let resp = n.get("provisioning").unwrap();
    assert_eq!(resp.code, Code::Content);
    assert_eq!(resp.payload.as_slice(), &EID);
    assert!(!n.service.provisioning_open());
    assert!(!n.board.indicators.is_on(IndicatorChannel::Provisioning));

    assert!(n.get("provisioning").is_none());
    assert!(n.sink.events.contains(&AppEvent::RequestDropped {
        resource: Some(Resource::Provisioning),
        reason: DropReason::ProvisioningClosed,
    }));
}

#[test]
fn window_blinks_then_expires() {
    let mut n = node();
    n.set_role(DeviceRole::Router);
    n.feed(NodeEvent::ButtonPressed);
    n.advance(4_999);
    let blinks = n.board.indicators.writes_to(IndicatorChannel::Provisioning);
    assert!(blinks.len() > 10);
    assert!(n.service.provisioning_open());

    n.advance(1);
    assert!(!n.service.provisioning_open());
    assert!(!n.board.indicators.is_on(IndicatorChannel::Provisioning));
    assert!(!n.board.timers.is_armed(TimerId::ProvisioningBlink));
    assert!(n.sink.events.contains(&AppEvent::ProvisioningChanged(false)));
}

#[test]
fn second_press_restarts_the_window() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.feed(NodeEvent::ButtonPressed);
    n.advance(4_000);
    n.feed(NodeEvent::ButtonPressed);
    n.advance(4_000);
    assert!(n.service.provisioning_open());
    n.advance(1_000);
    assert!(!n.service.provisioning_open());
    assert_eq!(n.sink.count(|e| *e == AppEvent::ProvisioningChanged(true)), 1);
}

#[test]
fn detach_closes_the_window() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.feed(NodeEvent::ButtonPressed);
    n.set_role(DeviceRole::Detached);
    assert!(!n.service.provisioning_open());
    assert!(n.get("provisioning").is_none());
}

#[test]
fn window_stays_open_without_an_address() {
    let mut n = node();
    n.ot.sim_set_eid(None);
    n.set_role(DeviceRole::Child);
    n.feed(NodeEvent::ButtonPressed);
    assert!(n.get("provisioning").is_none());
    assert!(n.service.provisioning_open());
}
