//! Serial configuration probing
//!
//! Opens a port with each candidate configuration in turn until one opens
//! cleanly. A configuration is accepted as soon as the port opens and the
//! first read cycle completes without a transport error, whether or not
//! that cycle decoded a weight.

use std::thread;
use std::time::Duration;

use scale_protocol::DecodeResult;
use tracing::{debug, info, warn};

use crate::config::{default_candidates, SerialConfig};
use crate::error::DetectError;
use crate::link::{PortOpener, ScaleLink};
use crate::strategy::ReadStrategy;

/// Configuration for probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Candidate configurations, highest priority first
    pub candidates: Vec<SerialConfig>,
    /// Pause after opening before touching the port
    pub settle: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            settle: Duration::from_millis(500),
        }
    }
}

/// A port opened with an accepted configuration
pub struct ProbeOutcome<L> {
    /// Open link, ready for further reads
    pub link: L,
    /// Configuration that opened
    pub config: SerialConfig,
    /// Result of the first read cycle
    pub initial: DecodeResult,
    /// Number of configurations tried, including the accepted one
    pub attempts: usize,
}

/// Result of a single open-read-close pass
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotRead {
    /// Configuration the result came from
    pub config: SerialConfig,
    /// Decoded weight or miss
    pub result: DecodeResult,
}

/// Tries candidate serial configurations against a port
#[derive(Debug, Clone, Default)]
pub struct ConfigProbe {
    config: ProbeConfig,
}

impl ConfigProbe {
    /// Create a probe with the default candidate list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a probe with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Candidate configurations in priority order
    pub fn candidates(&self) -> &[SerialConfig] {
        &self.config.candidates
    }

    /// Probe `port` with the configured candidates
    pub fn attempt<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        strategy: &ReadStrategy,
    ) -> Result<ProbeOutcome<O::Link>, DetectError> {
        self.attempt_with(opener, port, &self.config.candidates, strategy)
    }

    /// Probe `port` with an explicit candidate list
    pub fn attempt_with<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        candidates: &[SerialConfig],
        strategy: &ReadStrategy,
    ) -> Result<ProbeOutcome<O::Link>, DetectError> {
        info!("Probing {} ({} configurations)", port, candidates.len());
        let mut last_reason = String::from("no candidate configurations");

        for (index, config) in candidates.iter().enumerate() {
            debug!("Trying {} on {}", config, port);

            let mut link = match self.open_settled(opener, port, config) {
                Ok(link) => link,
                Err(e) => {
                    warn!("{} failed on {}: {}", config, port, e);
                    last_reason = e.to_string();
                    continue;
                }
            };

            match strategy.read(&mut link) {
                Ok(initial) => {
                    if initial.has_weight() {
                        info!("Connected to {} at {}", port, config);
                    } else {
                        info!("Connected to {} at {} (no initial weight)", port, config);
                    }
                    return Ok(ProbeOutcome {
                        link,
                        config: *config,
                        initial,
                        attempts: index + 1,
                    });
                }
                Err(e) => {
                    warn!("Initial read failed on {} at {}: {}", port, config, e);
                    last_reason = DetectError::communication(port, e).to_string();
                }
            }
        }

        Err(DetectError::NoValidConfiguration {
            port: port.to_string(),
            attempts: candidates.len(),
            last_reason,
        })
    }

    /// Open, read once and close for each candidate until a weight decodes
    ///
    /// If candidates open but none yields a weight, the miss from the last
    /// configuration that opened is returned.
    pub fn read_once<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        candidates: &[SerialConfig],
        strategy: &ReadStrategy,
    ) -> Result<OneShotRead, DetectError> {
        info!("One-shot read from {}", port);
        let mut last_reason = String::from("no candidate configurations");
        let mut last_miss = None;

        for config in candidates {
            let mut link = match self.open_settled(opener, port, config) {
                Ok(link) => link,
                Err(e) => {
                    warn!("{} failed on {}: {}", config, port, e);
                    last_reason = e.to_string();
                    continue;
                }
            };

            let outcome = strategy.read(&mut link);
            drop(link);

            match outcome {
                Ok(result @ DecodeResult::Weight(_)) => {
                    return Ok(OneShotRead {
                        config: *config,
                        result,
                    });
                }
                Ok(miss) => {
                    last_miss = Some(OneShotRead {
                        config: *config,
                        result: miss,
                    });
                }
                Err(e) => {
                    warn!("Read failed on {} at {}: {}", port, config, e);
                    last_reason = DetectError::communication(port, e).to_string();
                }
            }
        }

        last_miss.ok_or_else(|| DetectError::NoValidConfiguration {
            port: port.to_string(),
            attempts: candidates.len(),
            last_reason,
        })
    }

    /// Open the port, let it settle and flush anything stale
    fn open_settled<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        config: &SerialConfig,
    ) -> Result<O::Link, DetectError> {
        let mut link = opener.open(port, config)?;

        if !self.config.settle.is_zero() {
            thread::sleep(self.config.settle);
        }

        link.clear_input()
            .and_then(|_| link.clear_output())
            .map_err(|e| DetectError::communication(port, e))?;

        Ok(link)
    }
}

/// Candidate list for a one-shot read with a caller-preferred baud rate
///
/// The preferred rate is tried first at 8N1 with the given timeout, followed
/// by the regular candidates.
pub fn preferred_candidates(
    base: &[SerialConfig],
    baud_rate: Option<u32>,
    timeout: Option<Duration>,
) -> Vec<SerialConfig> {
    let mut candidates = Vec::with_capacity(base.len() + 1);
    if let Some(baud_rate) = baud_rate {
        let preferred = SerialConfig::new(baud_rate);
        candidates.push(timeout.map_or(preferred, |t| preferred.with_timeout(t)));
    }
    candidates.extend_from_slice(base);
    candidates
}
