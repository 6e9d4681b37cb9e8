//! Continuous polling
//!
//! Reads the open connection at a fixed cadence and hands each outcome to a
//! callback until cancelled. Failures are reported and polling continues;
//! reconnecting is left to the caller.

use std::time::Duration;

use scale_detect::PortOpener;
use scale_protocol::{DecodeResult, WeightReading};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::SessionError;
use crate::manager::ConnectionManager;

/// Configuration for [`PollLoop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between read cycles
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
        }
    }
}

/// Outcome of a single poll cycle
#[derive(Debug)]
pub enum PollEvent {
    /// A weight was read
    Reading(WeightReading),
    /// The cycle completed without a weight
    NoData { last_frame: Option<String> },
    /// The read failed
    Failed(SessionError),
}

impl From<Result<DecodeResult, SessionError>> for PollEvent {
    fn from(result: Result<DecodeResult, SessionError>) -> Self {
        match result {
            Ok(DecodeResult::Weight(reading)) => PollEvent::Reading(reading),
            Ok(DecodeResult::NoWeight { last_frame }) => PollEvent::NoData { last_frame },
            Err(e) => PollEvent::Failed(e),
        }
    }
}

/// Counters for a finished poll run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Read cycles performed
    pub cycles: u64,
    /// Cycles that produced a weight
    pub readings: u64,
    /// Cycles without a weight
    pub misses: u64,
    /// Cycles that failed
    pub failures: u64,
}

impl PollStats {
    fn record(&mut self, event: &PollEvent) {
        self.cycles += 1;
        match event {
            PollEvent::Reading(_) => self.readings += 1,
            PollEvent::NoData { .. } => self.misses += 1,
            PollEvent::Failed(_) => self.failures += 1,
        }
    }
}

/// Fixed-cadence read loop
#[derive(Debug, Clone, Default)]
pub struct PollLoop {
    config: PollConfig,
}

impl PollLoop {
    /// Create a loop with the default cadence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loop with custom configuration
    pub fn with_config(config: PollConfig) -> Self {
        Self { config }
    }

    /// Poll `manager` until `cancel` is triggered
    pub fn run<O, F>(
        &self,
        manager: &mut ConnectionManager<O>,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> PollStats
    where
        O: PortOpener,
        F: FnMut(PollEvent),
    {
        info!("Polling every {:?}", self.config.interval);
        let mut stats = PollStats::default();

        while !cancel.is_cancelled() {
            let event = PollEvent::from(manager.read_current());
            match &event {
                PollEvent::Reading(r) => debug!("Poll: {} kg", r.kilograms),
                PollEvent::NoData { .. } => debug!("Poll: no data"),
                PollEvent::Failed(e) => warn!("Poll: {}", e),
            }

            stats.record(&event);
            on_event(event);

            if !cancel.sleep(self.config.interval) {
                break;
            }
        }

        info!(
            "Polling stopped after {} cycle(s) ({} readings, {} misses, {} failures)",
            stats.cycles, stats.readings, stats.misses, stats.failures
        );
        stats
    }
}
