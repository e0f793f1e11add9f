//! Core application runner (business logic) for `atc-listener`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit
//! codes so it can be tested deterministically with a scripted radio and
//! injected output streams.

use crate::atc::{AnomalyThresholds, DeviceFilter};
use crate::reading::Reading;
use crate::scanner::{Radio, RadioError, RadioEvent};
use crate::session::{ReadingHandler, ScanController};
use clap::Parser;
use std::io;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel buffer size for decoded readings awaiting output.
pub const READING_CHANNEL_BUFFER_SIZE: usize = 100;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Interval between scan cycles.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, default_value = "10s", value_parser = crate::scheduler::parse_duration)]
    pub interval: Duration,

    /// Duration bound of each scan, in seconds
    #[arg(long, default_value_t = 6)]
    pub duration: u32,

    /// HCI device index to scan on (0 for hci0)
    #[arg(long, default_value_t = 0)]
    pub device: u16,

    /// Battery voltage above which a reading is flagged as suspicious, in mV
    #[arg(long, default_value_t = 3000)]
    pub max_battery_millivolts: u16,

    /// Temperature above which a reading is flagged as suspicious,
    /// in tenths of a degree Celsius
    #[arg(long, default_value_t = 300)]
    pub max_temperature_tenths: i16,

    /// Verbose output, log discarded packets and scan lifecycle
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Radio(#[from] RadioError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Run the core processing loop, writing one line per reading to `out`.
///
/// Each scheduler tick (re)starts a scan session whose handler forwards
/// readings into a bounded channel; this loop drains radio events, ticks,
/// and readings on a single task owning the [`ScanController`]. Failed scan
/// starts are reported to `err` and retried on the next cycle. Returns once
/// the radio event stream ends, after draining readings still in flight.
pub async fn run_with_io<R: Radio>(
    options: Options,
    radio: R,
    mut events: mpsc::Receiver<RadioEvent>,
    mut ticks: mpsc::Receiver<()>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let thresholds = AnomalyThresholds {
        max_battery_millivolts: options.max_battery_millivolts,
        max_temperature_tenths_c: options.max_temperature_tenths,
    };
    let mut controller = ScanController::new(radio, DeviceFilter::default(), thresholds);

    let (reading_tx, mut readings) = mpsc::channel::<Reading>(READING_CHANNEL_BUFFER_SIZE);

    loop {
        tokio::select! {
            // Process pending ticks ahead of the event backlog so a restart
            // applies before further advertisements
            biased;

            Some(()) = ticks.recv() => {
                let tx = reading_tx.clone();
                let handler: ReadingHandler = Box::new(move |reading| {
                    // try_send keeps the dispatch path non-blocking; a full
                    // channel drops the reading
                    let _ = tx.try_send(reading);
                });
                if let Err(e) = controller.start(options.duration, handler) {
                    // Session stays idle, the next cycle retries
                    writeln!(err, "{e}")?;
                }
            }
            maybe_event = events.recv() => match maybe_event {
                Some(event) => controller.handle_event(event),
                None => break, // radio backend gone
            },
            Some(reading) = readings.recv() => {
                writeln!(out, "{reading}")?;
            }
        }
    }

    // Release the handler's sender clone, then drain readings in flight
    drop(controller);
    drop(reading_tx);
    while let Some(reading) = readings.recv().await {
        writeln!(out, "{reading}")?;
    }

    Ok(())
}
