//! Mock hardware and harness for integration tests.
//!
//! Indicators record every write so tests can assert on the full output
//! history; timers run on the simulated clock; the mesh stack is the
//! OpenThread adapter's in-memory backend.

use meshnode::adapters::openthread::OpenThreadAdapter;
use meshnode::app::events::AppEvent;
use meshnode::app::ports::{EventSink, IndicatorChannel, IndicatorPort, MeasurementPort};
use meshnode::app::service::NodeService;
use meshnode::coap::{Code, MessageType, Request, Response};
use meshnode::config::NodeConfig;
use meshnode::drivers::board::Board;
use meshnode::drivers::hw_timer::SimTimerService;
use meshnode::error::{ConversionError, SampleError};
use meshnode::events::NodeEvent;
use meshnode::fsm::DeviceRole;

pub const EUI: [u8; 8] = [0xf4, 0xce, 0x36, 0x00, 0x00, 0x12, 0x34, 0x56];
pub const EID: [u8; 16] = [
    0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
];

// ── Indicators ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingIndicators {
    pub writes: Vec<(IndicatorChannel, bool)>,
    levels: [bool; IndicatorChannel::COUNT],
}

#[allow(dead_code)]
impl RecordingIndicators {
    pub fn writes_to(&self, channel: IndicatorChannel) -> Vec<bool> {
        self.writes
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, on)| *on)
            .collect()
    }
}

impl IndicatorPort for RecordingIndicators {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        self.writes.push((channel, on));
        self.levels[channel.index()] = on;
    }

    fn is_on(&self, channel: IndicatorChannel) -> bool {
        self.levels[channel.index()]
    }
}

pub type TestBoard = Board<RecordingIndicators, SimTimerService>;

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn take(&mut self) -> Vec<AppEvent> {
        core::mem::take(&mut self.events)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Scripted measurement source ───────────────────────────────

/// Returns queued samples in order, then repeats the last one.
pub struct ScriptedSensor {
    samples: Vec<Result<i32, SampleError>>,
    pub fail_conversion: bool,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(samples: Vec<Result<i32, SampleError>>) -> Self {
        Self {
            samples,
            fail_conversion: false,
        }
    }
}

impl MeasurementPort for ScriptedSensor {
    fn sample(&mut self) -> Result<i32, SampleError> {
        if self.samples.len() > 1 {
            self.samples.remove(0)
        } else {
            self.samples.first().copied().unwrap_or(Err(SampleError::AdcReadFailed))
        }
    }

    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError> {
        if self.fail_conversion {
            Err(ConversionError::OutOfRange)
        } else {
            Ok(raw as f32 / 10.0)
        }
    }

    fn unit(&self) -> &'static str {
        "dC"
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A node wired to mocks.  Events are fed directly instead of through the
/// global queue so tests stay independent.
pub struct Node<M> {
    pub service: NodeService<M>,
    pub board: TestBoard,
    pub ot: OpenThreadAdapter,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl<M: MeasurementPort> Node<M> {
    pub fn start(config: NodeConfig, source: M) -> Self {
        let mut node = Self {
            service: NodeService::new(config, source),
            board: Board::new(RecordingIndicators::default(), SimTimerService::new()),
            ot: OpenThreadAdapter::simulated(EUI),
            sink: RecordingSink::default(),
        };
        node.ot.sim_set_eid(Some(EID));
        node.service.start(&mut node.board, &mut node.sink);
        node
    }

    pub fn feed(&mut self, event: NodeEvent) {
        self.service
            .handle_event(event, &mut self.board, &mut self.ot, &mut self.sink);
    }

    pub fn set_role(&mut self, role: DeviceRole) {
        self.ot.sim_set_role(role);
        self.feed(NodeEvent::RoleChanged(role));
    }

    /// Run the simulated clock, delivering every expiry in order.
    pub fn advance(&mut self, ms: u64) {
        for handle in self.board.timers.advance(ms) {
            self.feed(NodeEvent::TimerExpired(handle));
        }
    }

    /// Deliver a request and return the response sent for it, if any.
    pub fn request(&mut self, request: Request) -> Option<Response> {
        self.ot.take_sent();
        self.feed(NodeEvent::Request(request));
        self.ot.take_sent().pop().map(|(_, resp)| resp)
    }

    pub fn get(&mut self, path: &str) -> Option<Response> {
        self.request(non(path, Code::Get, &[]))
    }

    pub fn put_light(&mut self, byte: u8) -> Option<Response> {
        self.request(non("light", Code::Put, &[byte]))
    }

    pub fn light_output(&self) -> bool {
        self.board.indicators.is_on(IndicatorChannel::Light)
    }
}

pub const TOKEN: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

pub fn non(path: &str, code: Code, payload: &[u8]) -> Request {
    Request::new(path, MessageType::NonConfirmable, code, &TOKEN, payload)
}
