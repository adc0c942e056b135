//! Embedded firmware entry point (nRF52840 + Embassy).
//!
//! Task layout:
//!
//! ```text
//!   edge_capture_task ──┐ (EdgeSequence, lock-free)
//!                       ├──> measurement_task ──> NOTIFICATIONS ──> (display)
//!   transport callback ─┘ (REPORT_QUEUE)                │
//!                                                       └──> CSV over defmt
//!   trigger_button_task ──> TRIGGER_START ──> trigger_task ──> output pin
//! ```
//!
//! The USB host transport (enumeration, report delivery) is external to
//! this firmware; it hands reports to [`deliver_hid_report`] and
//! connect/disconnect events to the `TRANSPORT_EVENTS` channel.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{AnyPin, Input, Level, Output, OutputDrive, Pin, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use panic_probe as _;

use edgelat::config::{BUTTON_DEBOUNCE_MS, CSV_HEADER, REPORT_QUEUE_DEPTH, TRIGGER_DEFAULT_PULSES};
use edgelat::correlator::Correlator;
use edgelat::edge::EdgeSequence;
use edgelat::hid::Protocol;
use edgelat::queue::{HidEvent, ReportQueue};
use edgelat::sched::PendingSchedule;
use edgelat::settings::{EdgePolarity, InputBias, Settings, TriggerPin};
use edgelat::stats::LatencyCategory;
use edgelat::trigger::{AutoTrigger, TriggerOutput};
use edgelat::Notification;

/// Transport lifecycle events from the external USB host stack.
#[allow(dead_code)]
enum TransportEvent {
    Connected {
        descriptor: &'static [u8],
        protocol: Protocol,
    },
    Disconnected,
}

static EDGE_SEQ: EdgeSequence = EdgeSequence::new();
static SETTINGS: Settings = Settings::new();

static REPORT_QUEUE: Mutex<CriticalSectionRawMutex, RefCell<ReportQueue<REPORT_QUEUE_DEPTH>>> =
    Mutex::new(RefCell::new(ReportQueue::new()));
static REPORT_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static TRANSPORT_EVENTS: Channel<CriticalSectionRawMutex, TransportEvent, 2> = Channel::new();
static NOTIFICATIONS: Channel<CriticalSectionRawMutex, Notification, 8> = Channel::new();
static TRIGGER_START: Channel<CriticalSectionRawMutex, u16, 2> = Channel::new();

/// Microsecond timestamp on the shared measurement clock. Wraps every
/// ~71.6 minutes; all consumers use wrapping arithmetic.
fn timestamp_us() -> u32 {
    Instant::now().as_micros() as u32
}

/// Entry point for the external transport's report-delivery callback.
/// Must be cheap: copies the report into the queue and signals the
/// measurement task.
#[allow(dead_code)]
pub fn deliver_hid_report(data: &[u8], protocol: Protocol) {
    let event = HidEvent::new(timestamp_us(), protocol, data);
    let overflow = REPORT_QUEUE.lock(|q| q.borrow_mut().push(event).is_err());
    if overflow {
        warn!("report queue full, report dropped");
    }
    REPORT_READY.signal(());
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());

    info!("edgelat starting");

    // Measurement input on P0.04 (AIN2 header position, 5V tolerant tap).
    spawner.must_spawn(edge_capture_task(p.P0_04.degrade()));
    spawner.must_spawn(measurement_task());

    // Auto-trigger outputs on the Arduino header: D6 = P1.07, D11 = P1.13.
    spawner.must_spawn(trigger_task(p.P1_07.degrade(), p.P1_13.degrade()));
    spawner.must_spawn(trigger_button_task(p.P0_11.degrade()));
    spawner.must_spawn(notification_task());
}

/// Masking hook for the edge input. The capture loop realises masking by
/// simply not awaiting the pin during the holdoff, so the port hook has
/// nothing to do in hardware.
struct CaptureGate;

impl edgelat::edge::EdgePort for &mut CaptureGate {
    fn set_armed(&mut self, _armed: bool) {}
}

/// Wait on the measurement input, debounce, and publish accepted edges.
#[embassy_executor::task]
async fn edge_capture_task(pin: AnyPin) -> ! {
    let pull = match SETTINGS.input_bias() {
        InputBias::None => Pull::None,
        InputBias::PullUp => Pull::Up,
        InputBias::PullDown => Pull::Down,
    };
    let mut input = Input::new(pin, pull);
    let mut gate = CaptureGate;
    let mut capture =
        edgelat::edge::EdgeCapture::new(&EDGE_SEQ, &SETTINGS, &mut gate, PendingSchedule::new());

    loop {
        match SETTINGS.edge_polarity() {
            EdgePolarity::Rising => input.wait_for_rising_edge().await,
            EdgePolarity::Falling => input.wait_for_falling_edge().await,
        }

        if capture.on_hardware_edge(timestamp_us()) {
            NOTIFICATIONS.send(Notification::TriggerReady(false)).await;
            // Holdoff: ignore the pin until the bounce burst is over.
            if let Some(delay_us) = capture.rearm_timer_mut().take() {
                Timer::after(Duration::from_micros(delay_us as u64)).await;
            }
            let note = capture.on_holdoff_elapsed();
            NOTIFICATIONS.send(note).await;
        }
    }
}

/// Drain the report queue, correlate, and publish samples.
#[embassy_executor::task]
async fn measurement_task() -> ! {
    let mut correlator = Correlator::new(&EDGE_SEQ, &SETTINGS);
    info!("{=str}", CSV_HEADER);

    loop {
        match select(TRANSPORT_EVENTS.receive(), REPORT_READY.wait()).await {
            Either::First(TransportEvent::Connected {
                descriptor,
                protocol,
            }) => {
                match correlator.on_device_connected(descriptor, protocol) {
                    Ok(()) => info!("device mapped"),
                    Err(e) => warn!("descriptor skipped: {}", e),
                }
                NOTIFICATIONS.send(Notification::DeviceConnected).await;
            }
            Either::First(TransportEvent::Disconnected) => {
                correlator.on_device_disconnected();
                NOTIFICATIONS.send(Notification::DeviceDisconnected).await;
            }
            Either::Second(()) => {
                while let Some(event) = REPORT_QUEUE.lock(|q| q.borrow_mut().pop()) {
                    let measurement =
                        correlator.on_hid_report(event.timestamp_us, event.report(), event.protocol);
                    if let Some(m) = measurement {
                        let line = correlator.stats().csv_line(LatencyCategory::EdgeToUsb);
                        info!("{=str}", line.as_str());
                        NOTIFICATIONS.send(Notification::Measurement(m)).await;
                    }
                }
            }
        }
    }
}

struct PinOut {
    pin: Output<'static>,
}

impl TriggerOutput for &mut PinOut {
    fn drive(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Run auto-trigger pulse trains on the configured output pin.
#[embassy_executor::task]
async fn trigger_task(d6: AnyPin, d11: AnyPin) -> ! {
    let initial = if SETTINGS.trigger_level_high() {
        Level::Low
    } else {
        Level::High
    };
    let mut out_d6 = PinOut {
        pin: Output::new(d6, initial, OutputDrive::Standard),
    };
    let mut out_d11 = PinOut {
        pin: Output::new(d11, initial, OutputDrive::Standard),
    };

    loop {
        let pulses = TRIGGER_START.receive().await;
        match SETTINGS.trigger_pin() {
            TriggerPin::D6 => run_pulse_train(&mut out_d6, pulses).await,
            TriggerPin::D11 => run_pulse_train(&mut out_d11, pulses).await,
        }
    }
}

/// Drive one pulse train to completion, or until a second start request
/// cancels it.
async fn run_pulse_train(out: &mut PinOut, pulses: u16) {
    let seed = timestamp_us() | 1;
    let mut trigger = AutoTrigger::new(
        &SETTINGS,
        out,
        PendingSchedule::new(),
        PendingSchedule::new(),
        seed,
    );
    if !trigger.start(pulses) {
        return;
    }
    info!("auto-trigger: {} pulses", pulses);

    while trigger.is_running() || trigger.release_timer_mut().is_pending() {
        // The release delay (pulse width) is always shorter than the
        // pulse-to-pulse delay, so execute it first when both pend.
        if let Some(delay_us) = trigger.release_timer_mut().take() {
            Timer::after(Duration::from_micros(delay_us as u64)).await;
            trigger.on_release_timer();
            continue;
        }
        let Some(delay_us) = trigger.pulse_timer_mut().take() else {
            break;
        };
        match select(
            Timer::after(Duration::from_micros(delay_us as u64)),
            TRIGGER_START.receive(),
        )
        .await
        {
            Either::First(()) => trigger.on_pulse_timer(),
            Either::Second(_) => {
                // Toggle semantics: a start request during a run stops it.
                trigger.start(0);
                info!("auto-trigger cancelled");
            }
        }
    }
}

/// Front-panel button starting/stopping an auto-trigger run.
#[embassy_executor::task]
async fn trigger_button_task(pin: AnyPin) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        btn.wait_for_falling_edge().await;
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;

        if btn.is_low() {
            TRIGGER_START.send(TRIGGER_DEFAULT_PULSES).await;

            btn.wait_for_rising_edge().await;
            Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        }
    }
}

/// Sink for UI notifications. A display task would replace this; for the
/// headless build the events go to the log.
#[embassy_executor::task]
async fn notification_task() -> ! {
    loop {
        match NOTIFICATIONS.receive().await {
            Notification::Measurement(m) => info!("latency: {} us", m.value_us),
            Notification::DeviceConnected => info!("device connected"),
            Notification::DeviceDisconnected => info!("device disconnected"),
            Notification::ModeChanged => info!("mode changed"),
            Notification::TriggerReady(ready) => info!("trigger ready: {}", ready),
        }
    }
}
