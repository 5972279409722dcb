//! Node service — the hexagonal core.
//!
//! [`NodeService`] owns every piece of domain state: the actuator safety
//! controller, the sensor reader, the request dispatcher, the
//! connectivity monitor and the provisioning window.  Each [`NodeEvent`]
//! from the queue is routed to the right component.  All I/O flows
//! through port traits injected at call sites, so the whole node runs on
//! the host against mock adapters.
//!
//! ```text
//!  NodeEvent ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │         NodeService          │
//! Indicator  ◀── │ Safety · Sensor · Dispatcher │ ──▶ CoapTransport
//! TimerPort  ◀── │ Connectivity · Provisioning  │ ──▶ DirectoryPort
//!                └──────────────────────────────┘
//! ```

use log::{debug, error, info, warn};

use crate::coap::dispatcher::{Dispatch, Dispatcher, ResourceTargets};
use crate::coap::resources::LightCommand;
use crate::coap::Request;
use crate::config::NodeConfig;
use crate::error::{RegistrationError, TimerError};
use crate::events::NodeEvent;
use crate::fsm::monitor::ConnectivityMonitor;
use crate::fsm::{DeviceRole, StateId};
use crate::provisioning::{ProvisioningWindow, WindowTick};
use crate::safety::{Expiry, SafetyController};
use crate::sensors::{Reading, SensorReader};

use super::events::{AppEvent, LightCause};
use super::ports::{
    CoapTransport, DirectoryPort, EventSink, IdentityPort, IndicatorChannel, IndicatorPort,
    MeasurementPort, TimerHandle, TimerId, TimerPort,
};

/// Firmware version served by the `info` resource.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<M> {
    config: NodeConfig,
    safety: SafetyController,
    sensor: SensorReader<M>,
    dispatcher: Dispatcher,
    monitor: ConnectivityMonitor,
    provisioning: ProvisioningWindow,
    sensor_refresh: Option<TimerHandle>,
    registration_retry: Option<TimerHandle>,
}

impl<M: MeasurementPort> NodeService<M> {
    /// Construct the service.  Does **not** touch hardware; call
    /// [`start`](Self::start) next.
    pub fn new(config: NodeConfig, source: M) -> Self {
        Self {
            safety: SafetyController::new(config.light_max_active()),
            sensor: SensorReader::new(source),
            dispatcher: Dispatcher::new(FIRMWARE_VERSION),
            monitor: ConnectivityMonitor::new(&config),
            provisioning: ProvisioningWindow::new(
                config.provisioning_window(),
                config.provisioning_blink(),
            ),
            sensor_refresh: None,
            registration_retry: None,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, hw: &mut (impl IndicatorPort + TimerPort), sink: &mut impl EventSink) {
        hw.set(IndicatorChannel::Light, false);
        hw.set(IndicatorChannel::Provisioning, false);
        self.monitor.start(hw);

        if let Some(period) = self.config.sensor_refresh() {
            match hw.start_periodic(TimerId::SensorRefresh, period) {
                Ok(h) => {
                    self.sensor_refresh = Some(h);
                    info!("SENSOR: background refresh every {}s", period.as_secs());
                }
                Err(e) => warn!("SENSOR: cannot start refresh timer ({e})"),
            }
        }

        sink.emit(&AppEvent::Started(self.monitor.state()));
        info!("NodeService started in {:?}", self.monitor.state());
    }

    // ── Event routing ─────────────────────────────────────────

    /// Process one event from the queue.
    ///
    /// `hw` covers the local outputs and timers, `net` the mesh stack.
    /// They are separate parameters so a request handler can drive the
    /// light while holding the transport.
    pub fn handle_event(
        &mut self,
        event: NodeEvent,
        hw: &mut (impl IndicatorPort + TimerPort),
        net: &mut (impl DirectoryPort + CoapTransport + IdentityPort),
        sink: &mut impl EventSink,
    ) {
        debug!("EVENT: {}", event.name());
        match event {
            NodeEvent::RoleChanged(role) => self.on_role_changed(role, hw, net, sink),
            NodeEvent::Request(request) => self.on_request(&request, hw, net, sink),
            NodeEvent::TimerExpired(handle) => self.on_timer(handle, hw, net, sink),
            NodeEvent::RegistrationUpdate(update) => {
                self.monitor.on_registration_update(update);
                sink.emit(&AppEvent::RegistrationUpdate(update));
            }
            NodeEvent::ButtonPressed => self.on_button(hw, sink),
        }
    }

    fn on_role_changed(
        &mut self,
        role: DeviceRole,
        hw: &mut (impl IndicatorPort + TimerPort),
        net: &mut (impl DirectoryPort + IdentityPort),
        sink: &mut impl EventSink,
    ) {
        let outcome = self.monitor.on_role_changed(role, hw, net);
        if outcome.from != outcome.to {
            sink.emit(&AppEvent::ConnectivityChanged {
                from: outcome.from,
                to: outcome.to,
                role,
            });
        }
        if outcome.close_provisioning && self.provisioning.close(hw) {
            sink.emit(&AppEvent::ProvisioningChanged(false));
        }
        if let Some(result) = outcome.registration {
            self.on_registration_result(result, hw, sink);
        }
    }

    fn on_registration_result(
        &mut self,
        result: Result<(), RegistrationError>,
        hw: &mut impl TimerPort,
        sink: &mut impl EventSink,
    ) {
        let err = match result {
            Ok(()) => {
                if let Some(identity) = self.monitor.identity() {
                    sink.emit(&AppEvent::RegistrationSubmitted {
                        host: identity.host_name.clone(),
                    });
                }
                return;
            }
            Err(e) => e,
        };
        sink.emit(&AppEvent::RegistrationIncomplete(err));

        let Some(delay) = self.monitor.registration_mut().next_retry_delay() else {
            return;
        };
        match hw.start_one_shot(TimerId::RegistrationRetry, delay) {
            Ok(h) => {
                self.registration_retry = Some(h);
                let attempt = self.monitor.registration().retries();
                info!("SRP: retry {} in {}s", attempt, delay.as_secs());
                sink.emit(&AppEvent::RegistrationRetryScheduled {
                    attempt,
                    delay_secs: delay.as_secs(),
                });
            }
            Err(e) => warn!("SRP: cannot schedule retry ({e})"),
        }
    }

    fn on_request(
        &mut self,
        request: &Request,
        hw: &mut (impl IndicatorPort + TimerPort),
        net: &mut impl CoapTransport,
        sink: &mut impl EventSink,
    ) {
        let mut targets = Targets {
            safety: &mut self.safety,
            sensor: &mut self.sensor,
            provisioning: &mut self.provisioning,
            hw,
            eid: net.mesh_local_eid(),
            light_changed: false,
            light_refused: None,
            reading: None,
            provisioning_closed: false,
        };
        let dispatch = self.dispatcher.dispatch(request, &mut targets);
        let Targets {
            light_changed,
            light_refused,
            reading,
            provisioning_closed,
            ..
        } = targets;

        if light_changed {
            sink.emit(&AppEvent::LightChanged {
                on: self.safety.is_active(),
                cause: LightCause::Request,
            });
        }
        if let Some(e) = light_refused {
            sink.emit(&AppEvent::LightRefused(e));
        }
        if let Some(r) = reading {
            sink.emit(&AppEvent::Measurement(r));
        }
        if provisioning_closed {
            sink.emit(&AppEvent::ProvisioningChanged(false));
        }

        match dispatch {
            Dispatch::Respond { resource, response } => {
                match net.send_response(request, &response) {
                    Ok(()) => {
                        debug!("CoAP: {} answered", resource.path());
                        sink.emit(&AppEvent::ResponseSent { resource });
                    }
                    Err(error) => {
                        error!("CoAP: {} response not sent: {error}", resource.path());
                        sink.emit(&AppEvent::ResponseFailed { resource, error });
                    }
                }
            }
            Dispatch::Drop { resource, reason } => {
                sink.emit(&AppEvent::RequestDropped { resource, reason });
            }
        }
    }

    fn on_timer(
        &mut self,
        handle: TimerHandle,
        hw: &mut (impl IndicatorPort + TimerPort),
        net: &mut (impl DirectoryPort + IdentityPort),
        sink: &mut impl EventSink,
    ) {
        match handle.id {
            TimerId::SafetyCutoff => {
                if self.safety.on_timer_expired(handle, hw) == Expiry::CutOff {
                    sink.emit(&AppEvent::LightChanged {
                        on: false,
                        cause: LightCause::SafetyCutoff,
                    });
                }
            }
            TimerId::ProvisioningWindow | TimerId::ProvisioningBlink => {
                if self.provisioning.on_timer(handle, hw) == WindowTick::Closed {
                    sink.emit(&AppEvent::ProvisioningChanged(false));
                }
            }
            TimerId::SensorRefresh => {
                if self.sensor_refresh == Some(handle) {
                    let reading = self.sensor.read();
                    sink.emit(&AppEvent::Measurement(reading));
                }
            }
            TimerId::RegistrationRetry => {
                if self.registration_retry != Some(handle) {
                    debug!("SRP: stale retry timer ignored");
                    return;
                }
                self.registration_retry = None;
                if let Some(result) = self.monitor.retry_registration(net) {
                    self.on_registration_result(result, hw, sink);
                }
            }
        }
    }

    fn on_button(&mut self, hw: &mut (impl IndicatorPort + TimerPort), sink: &mut impl EventSink) {
        if self.monitor.state() != StateId::Attached {
            info!("PROV: button ignored while not attached");
            return;
        }
        let was_open = self.provisioning.is_open();
        if self.provisioning.open(hw).is_ok() && !was_open {
            sink.emit(&AppEvent::ProvisioningChanged(true));
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn light_active(&self) -> bool {
        self.safety.is_active()
    }

    pub fn safety(&self) -> &SafetyController {
        &self.safety
    }

    pub fn last_reading(&self) -> Reading {
        self.sensor.last()
    }

    pub fn connectivity(&self) -> StateId {
        self.monitor.state()
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn provisioning_open(&self) -> bool {
        self.provisioning.is_open()
    }
}

// ───────────────────────────────────────────────────────────────
// Request targets
// ───────────────────────────────────────────────────────────────

/// Borrowed view of the service handed to the dispatcher for one request.
/// Side effects are recorded so the service can emit events afterwards.
struct Targets<'a, H, M> {
    safety: &'a mut SafetyController,
    sensor: &'a mut SensorReader<M>,
    provisioning: &'a mut ProvisioningWindow,
    hw: &'a mut H,
    eid: Option<[u8; 16]>,
    light_changed: bool,
    light_refused: Option<TimerError>,
    reading: Option<Reading>,
    provisioning_closed: bool,
}

impl<H, M> ResourceTargets for Targets<'_, H, M>
where
    H: IndicatorPort + TimerPort,
    M: MeasurementPort,
{
    fn apply_light(&mut self, command: LightCommand) -> bool {
        let before = self.safety.is_active();
        let result = match command {
            LightCommand::On => self.safety.activate(self.hw).map(|_| ()),
            LightCommand::Off => {
                self.safety.deactivate(self.hw);
                Ok(())
            }
            LightCommand::Toggle => self.safety.toggle(self.hw).map(|_| ()),
        };
        if let Err(e) = result {
            self.light_refused = Some(e);
        }
        let after = self.safety.is_active();
        self.light_changed |= before != after;
        after
    }

    fn light_state(&self) -> bool {
        self.safety.is_active()
    }

    fn read_measurement(&mut self) -> i8 {
        let reading = self.sensor.read();
        self.reading = Some(reading);
        reading.value
    }

    fn claim_provisioning_address(&mut self) -> Option<[u8; 16]> {
        let was_open = self.provisioning.is_open();
        let address = self.provisioning.claim(self.eid, self.hw);
        self.provisioning_closed |= was_open && !self.provisioning.is_open();
        address
    }
}
