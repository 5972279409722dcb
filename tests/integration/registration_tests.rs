//! Connectivity-driven service registration against the simulated
//! OpenThread SRP client.

use meshnode::adapters::openthread::SrpCall;
use meshnode::app::events::AppEvent;
use meshnode::app::ports::{IndicatorChannel, TimerId};
use meshnode::config::{NodeConfig, RetryPolicy, SuffixSource};
use meshnode::error::{DirectoryError, RegistrationStep};
use meshnode::events::NodeEvent;
use meshnode::fsm::{DeviceRole, StateId};
use meshnode::registration::DirectoryUpdate;
use meshnode::sensors::temperature::SimulatedTemperature;

use crate::mock_hw::Node;

fn node_with(config: NodeConfig) -> Node<SimulatedTemperature> {
    Node::start(config, SimulatedTemperature::new())
}

fn node() -> Node<SimulatedTemperature> {
    node_with(NodeConfig::default())
}

const FULL_SEQUENCE: [SrpCall; 6] = [
    SrpCall::SetCallback,
    SrpCall::SetHostName,
    SrpCall::EnableAutoHostAddress,
    SrpCall::AllocateService,
    SrpCall::AddService,
    SrpCall::EnableAutoStart,
];

#[test]
fn first_attach_registers_once() {
    let mut n = node();
    n.set_role(DeviceRole::Detached);
    assert!(n.ot.calls().is_empty());

    n.set_role(DeviceRole::Child);
    assert_eq!(n.ot.calls(), &FULL_SEQUENCE);
    assert_eq!(n.ot.registered_host(), Some("meshnode-f4ce360000123456"));
    assert_eq!(
        n.ot.added_services(),
        vec![(
            "meshnode-f4ce360000123456".to_string(),
            "_ot._udp".to_string(),
            49154
        )]
    );
    assert!(n.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::RegistrationSubmitted { host } if host.as_str() == "meshnode-f4ce360000123456"
    )));
}

#[test]
fn reattach_and_promotion_do_not_reregister() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.set_role(DeviceRole::Router);
    n.set_role(DeviceRole::Leader);
    n.set_role(DeviceRole::Detached);
    n.set_role(DeviceRole::Child);
    n.set_role(DeviceRole::Disabled);
    n.set_role(DeviceRole::Router);

    assert_eq!(n.ot.calls().len(), FULL_SEQUENCE.len());
    assert_eq!(n.ot.added_services().len(), 1);
    assert!(n.service.monitor().is_registration_claimed());
}

#[test]
fn connection_indicator_follows_attachment() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.set_role(DeviceRole::Router);
    n.set_role(DeviceRole::Detached);
    n.set_role(DeviceRole::Disabled);
    n.set_role(DeviceRole::Leader);

    assert_eq!(
        n.board.indicators.writes_to(IndicatorChannel::Connection),
        vec![false, true, false, false, true]
    );
    assert_eq!(n.service.connectivity(), StateId::Attached);
}

#[test]
fn attach_from_disabled_registers() {
    let mut n = node();
    n.set_role(DeviceRole::Disabled);
    assert_eq!(n.service.connectivity(), StateId::Disabled);
    n.set_role(DeviceRole::Leader);
    assert_eq!(n.ot.calls(), &FULL_SEQUENCE);
}

#[test]
fn random_suffix_is_shared_by_host_and_instance() {
    let mut n = node_with(NodeConfig {
        suffix_source: SuffixSource::Random,
        ..Default::default()
    });
    n.set_role(DeviceRole::Child);

    let host = n.ot.registered_host().unwrap().to_string();
    let (suffix_len, prefix_ok) = (host.len() - "meshnode-".len(), host.starts_with("meshnode-"));
    assert!(prefix_ok);
    assert_eq!(suffix_len, 8);
    assert_eq!(n.ot.added_services()[0].0, host);
}

#[test]
fn no_suffix_keeps_base_names() {
    let mut n = node_with(NodeConfig {
        suffix_source: SuffixSource::None,
        ..Default::default()
    });
    n.set_role(DeviceRole::Child);
    assert_eq!(n.ot.registered_host(), Some("meshnode"));
}

#[test]
fn long_base_name_shortens_only_the_suffix() {
    let mut config = NodeConfig::default();
    config.host_name = "a-rather-long-host-name-here".try_into().unwrap();
    let mut n = node_with(config);
    n.set_role(DeviceRole::Child);
    assert_eq!(n.ot.registered_host(), Some("a-rather-long-host-name-here-f4c"));
}

#[test]
fn failed_step_is_reported_and_sequence_completes() {
    let mut n = node();
    n.ot.sim_fail(SrpCall::AddService, DirectoryError::NoBufs);
    n.set_role(DeviceRole::Child);

    assert_eq!(n.ot.calls(), &FULL_SEQUENCE);
    assert!(n.ot.auto_start_enabled());
    let err = n
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::RegistrationIncomplete(err) => Some(*err),
            _ => None,
        })
        .expect("incomplete registration reported");
    assert_eq!(
        err.failed_steps().collect::<Vec<_>>(),
        vec![RegistrationStep::AddService]
    );

    // Without a retry policy nothing else happens, even on re-attach.
    assert!(!n.board.timers.is_armed(TimerId::RegistrationRetry));
    n.set_role(DeviceRole::Detached);
    n.set_role(DeviceRole::Child);
    assert_eq!(n.ot.calls().len(), FULL_SEQUENCE.len());
}

#[test]
fn allocation_failure_skips_entry_steps() {
    let mut n = node();
    n.ot.sim_fail(SrpCall::AllocateService, DirectoryError::NoBufs);
    n.set_role(DeviceRole::Child);
    assert_eq!(
        n.ot.calls(),
        &[
            SrpCall::SetCallback,
            SrpCall::SetHostName,
            SrpCall::EnableAutoHostAddress,
            SrpCall::AllocateService,
            SrpCall::EnableAutoStart,
        ]
    );
    assert!(n.ot.added_services().is_empty());
}

#[test]
fn retry_policy_reruns_a_failed_registration() {
    let mut n = node_with(NodeConfig {
        registration_retry: Some(RetryPolicy::default()),
        ..Default::default()
    });
    n.ot.sim_fail(SrpCall::AddService, DirectoryError::InvalidState);
    n.set_role(DeviceRole::Child);
    assert!(n.sink.events.contains(&AppEvent::RegistrationRetryScheduled {
        attempt: 1,
        delay_secs: 2,
    }));

    n.advance(1_999);
    assert_eq!(n.ot.added_services().len(), 0);
    n.advance(1);
    assert_eq!(n.ot.added_services().len(), 1);
    assert_eq!(n.service.monitor().registration().retries(), 0);
    assert!(n
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::RegistrationSubmitted { .. })));
}

#[test]
fn retry_recovers_from_a_transient_failure() {
    let mut n = node_with(NodeConfig {
        registration_retry: Some(RetryPolicy::default()),
        ..Default::default()
    });
    n.ot.sim_fail(SrpCall::SetHostName, DirectoryError::InvalidArgs);
    n.set_role(DeviceRole::Child);
    assert_eq!(n.ot.registered_host(), None);
    assert_eq!(n.ot.added_services().len(), 1);

    for _ in 0..120 {
        n.advance(1_000);
    }

    assert_eq!(
        n.sink.count(|e| matches!(e, AppEvent::RegistrationSubmitted { .. })),
        1
    );
    assert_eq!(
        n.sink.count(|e| matches!(e, AppEvent::RegistrationIncomplete(_))),
        1
    );
    // Only the failed step ran again; the service was not added twice.
    assert_eq!(&n.ot.calls()[FULL_SEQUENCE.len()..], &[SrpCall::SetHostName]);
    assert_eq!(n.ot.registered_host(), Some("meshnode-f4ce360000123456"));
    assert_eq!(n.ot.added_services().len(), 1);
    assert_eq!(n.service.monitor().registration().pending(), None);
    assert!(!n.board.timers.is_armed(TimerId::RegistrationRetry));
}

#[test]
fn retries_back_off_and_give_up() {
    let mut n = node_with(NodeConfig {
        registration_retry: Some(RetryPolicy {
            first_delay_secs: 2,
            max_delay_secs: 3,
            max_attempts: 2,
        }),
        ..Default::default()
    });
    for _ in 0..3 {
        n.ot.sim_fail(SrpCall::SetHostName, DirectoryError::InvalidArgs);
    }
    n.set_role(DeviceRole::Child);
    for _ in 0..60 {
        n.advance(1_000);
    }

    let scheduled: Vec<u64> = n
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RegistrationRetryScheduled { delay_secs, .. } => Some(*delay_secs),
            _ => None,
        })
        .collect();
    assert_eq!(scheduled, vec![2, 3]);
    assert_eq!(
        n.sink.count(|e| matches!(e, AppEvent::RegistrationIncomplete(_))),
        3
    );
    assert!(!n.board.timers.is_armed(TimerId::RegistrationRetry));
}

#[test]
fn server_updates_are_only_recorded() {
    let mut n = node();
    n.set_role(DeviceRole::Child);
    n.feed(NodeEvent::RegistrationUpdate(DirectoryUpdate::Registered));
    n.feed(NodeEvent::RegistrationUpdate(DirectoryUpdate::Failed(
        DirectoryError::Duplicated,
    )));
    assert_eq!(n.ot.calls().len(), FULL_SEQUENCE.len());
    assert_eq!(
        n.service.monitor().registration().last_update(),
        Some(DirectoryUpdate::Failed(DirectoryError::Duplicated))
    );
}
