//! Mesh node firmware: main entry point.
//!
//! Hexagonal architecture driven by a single event queue.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  OpenThreadAdapter        LedBank + EspTimerService  NvsAdapter│
//! │  (SRP · CoAP · identity)  (Board: indicators+timers) (Config) │
//! │  LogEventSink                                                 │
//! │                                                               │
//! │  ─────────────── Port Trait Boundary ───────────────────      │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │          NodeService (pure logic)                       │  │
//! │  │  Connectivity FSM · Safety · Sensor · Dispatcher · Prov │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │                                                               │
//! │  OT task / esp_timer task ──push_event──▶ EVENTS ──▶ main loop│
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{OutputPin as _, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use log::{error, info, warn};

use meshnode::adapters::log_sink::LogEventSink;
use meshnode::adapters::nvs::NvsAdapter;
use meshnode::adapters::openthread::{self, OpenThreadAdapter};
use meshnode::app::ports::ConfigPort;
use meshnode::app::service::{NodeService, FIRMWARE_VERSION};
use meshnode::config::NodeConfig;
use meshnode::drivers::board::Board;
use meshnode::drivers::button::ButtonDriver;
use meshnode::drivers::hw_init;
use meshnode::drivers::hw_timer::EspTimerService;
use meshnode::drivers::led::LedBank;
use meshnode::drivers::watchdog::{LoopWatchdog, LOOP_STALL_TIMEOUT_MS};
use meshnode::events::{push_event, NodeEvent, EVENTS};
use meshnode::pins;
use meshnode::sensors::MeasurementSource;

/// Main loop period.  Bounds button latency and event dispatch delay.
const LOOP_PERIOD_MS: u32 = 10;

fn now_ms() -> u32 {
    // SAFETY: monotonic RTC counter read.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u32
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Meshnode v{:<26}║", FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    // A failed ADC only degrades readings to the cached value.
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, sensors will report cached values", e);
    }
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed: {}, provisioning button disabled", e);
    }

    let peripherals = Peripherals::take()?;
    let outputs = [
        PinDriver::output(peripherals.pins.gpio10.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio11.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio12.downgrade_output())?,
    ];
    info!(
        "LED: connection=GPIO{} provisioning=GPIO{} light=GPIO{}",
        pins::CONNECTION_LED_GPIO,
        pins::PROVISIONING_LED_GPIO,
        pins::LIGHT_GPIO
    );
    let timers = EspTimerService::new().map_err(meshnode::error::Error::Timer)?;
    let mut board = Board::new(LedBank::new(outputs), timers);

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let nvs = NvsAdapter::new().map_err(meshnode::error::Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    };

    // ── 4. Mesh stack ─────────────────────────────────────────
    let _sysloop = EspSystemEventLoop::take()?;
    openthread::spawn_stack()?;
    let mut ot = OpenThreadAdapter::attach(config.coap_port)?;

    // ── 5. Node service ───────────────────────────────────────
    let source = MeasurementSource::from_kind(config.measurement);
    let mut service = NodeService::new(config, source);
    let mut sink = LogEventSink::new();
    service.start(&mut board, &mut sink);

    // The stack may have attached before the callback was hooked.
    push_event(NodeEvent::RoleChanged(ot.current_role()));

    let mut button = ButtonDriver::new();
    let mut watchdog = LoopWatchdog::subscribe(LOOP_STALL_TIMEOUT_MS);
    info!("Entering event loop ({}ms period)", LOOP_PERIOD_MS);

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        if button.poll(now_ms()) {
            push_event(NodeEvent::ButtonPressed);
        }
        while let Some(event) = EVENTS.pop() {
            service.handle_event(event, &mut board, &mut ot, &mut sink);
        }
        watchdog.feed();
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
