//! Scan session state machine.
//!
//! [`ScanController`] owns the "is a scan active" state, starts duration-
//! bounded scans on the radio, and routes every radio event through the
//! device filter and payload decoder to the registered consumer. Its one hard
//! invariant: at most one logical session, stop-before-start, and no single
//! bad packet may disturb an active session.

use crate::atc::{AnomalyThresholds, DeviceFilter, decode_advertisement};
use crate::reading::Reading;
use crate::scanner::{Radio, RadioError, RadioEvent, RawAdvertisement};
use log::{debug, info, warn};
use thiserror::Error;

/// Handler invoked synchronously for every decoded reading.
///
/// Runs on the controller's event-processing path and therefore must not
/// block; consumers needing heavier work should hand the reading off to
/// their own context.
pub type ReadingHandler = Box<dyn FnMut(Reading) + Send>;

/// Errors surfaced by [`ScanController::start`].
///
/// Per-packet conditions are absorbed inside the controller; only failure to
/// establish a session reaches the caller, who may simply retry on the next
/// scheduled cycle.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to start scan: {0}")]
    Start(#[source] RadioError),
}

/// Session state, driven by `start` and the radio's stop events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Idle,
    Scanning,
}

/// Controller for bounded scan sessions over a radio backend.
///
/// The handler slot is written only by [`start`](Self::start) and read only
/// by [`handle_event`](Self::handle_event); both run on the single task that
/// owns the controller, so the slot needs no locking. A handler installed by
/// `start` applies to all events processed after that call.
pub struct ScanController<R: Radio> {
    radio: R,
    filter: DeviceFilter,
    thresholds: AnomalyThresholds,
    state: ScanState,
    handler: Option<ReadingHandler>,
}

impl<R: Radio> ScanController<R> {
    pub fn new(radio: R, filter: DeviceFilter, thresholds: AnomalyThresholds) -> Self {
        Self {
            radio,
            filter,
            thresholds,
            state: ScanState::Idle,
            handler: None,
        }
    }

    /// Start a scan session bounded to `duration_secs`, delivering decoded
    /// readings to `handler`.
    ///
    /// Starting while a session is active is not an error: the previous
    /// session is stopped best-effort (its stop result ignored) and its
    /// handler replaced, so the old consumer receives nothing further. On a
    /// failed start request the controller stays idle and the handler slot
    /// keeps the new handler, which simply never fires until a later start
    /// succeeds.
    pub fn start(
        &mut self,
        duration_secs: u32,
        handler: ReadingHandler,
    ) -> Result<(), ScanError> {
        self.handler = Some(handler);

        // Stop-before-start; stopping an idle radio is not an error
        if let Err(e) = self.radio.stop_scan() {
            debug!("ignoring stop of previous scan: {e}");
        }

        if let Err(e) = self.radio.start_scan(duration_secs) {
            self.state = ScanState::Idle;
            return Err(ScanError::Start(e));
        }

        debug!("scan session started, bounded to {duration_secs}s");
        self.state = ScanState::Scanning;
        Ok(())
    }

    /// Whether a scan session is currently active.
    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    /// Process one radio event.
    ///
    /// Advertisement events are filtered, decoded, and delivered; filter
    /// misses and malformed payloads are discarded without affecting the
    /// session. Lifecycle statuses are informational and only logged.
    pub fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::ScanStarted(status) => {
                debug!("scan start completed: {status}");
            }
            RadioEvent::Advertisement(adv) => self.on_advertisement(adv),
            RadioEvent::ScanStopped(status) => {
                info!("scan stopped: {status}");
                self.state = ScanState::Idle;
            }
        }
    }

    fn on_advertisement(&mut self, adv: RawAdvertisement) {
        if !self.filter.matches(&adv.address, &adv.payload) {
            return;
        }

        let reading = match decode_advertisement(&adv.payload, adv.rssi) {
            Ok(reading) => reading,
            Err(e) => {
                debug!("discarding advertisement from {}: {e}", adv.address);
                return;
            }
        };

        if self.thresholds.is_suspicious(&reading) {
            // The format has no checksum; surface implausible values but
            // leave disposition to the consumer
            warn!(
                "suspicious reading {reading}, raw payload {:02x?}",
                adv.payload
            );
        }

        if let Some(handler) = self.handler.as_mut() {
            handler(reading);
        }
    }
}
