//! Connection manager
//!
//! Owns the one open scale connection. The manager is either Closed (no
//! connection) or Open (bound to a port and configuration):
//!
//! ```text
//!            connect() ok
//!   Closed ─────────────────▶ Open
//!     ▲                         │
//!     └──── close() / I/O error ┘
//! ```
//!
//! Connecting always closes the previous connection first, so at most one
//! handle is open at any time. A read that decodes nothing leaves the
//! connection open; a transport error closes it and the caller must
//! reconnect.

use std::time::{Duration, Instant};

use scale_detect::{
    preferred_candidates, ConfigProbe, DetectError, OneShotRead, PortOpener, ProbeConfig,
    ReadStrategy, SerialConfig, StrategyConfig,
};
use scale_protocol::DecodeResult;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection is open
    Closed,
    /// A connection is open and bound to a port
    Open,
}

/// Configuration for [`ConnectionManager`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Candidate configurations and settle time
    pub probe: ProbeConfig,
    /// Read commands, timing and decoder settings
    pub strategy: StrategyConfig,
}

/// Result of a successful connect
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOutcome {
    /// Port that was opened
    pub port: String,
    /// Configuration that opened
    pub config: SerialConfig,
    /// First read cycle on the new connection
    pub initial: DecodeResult,
    /// Configurations tried, including the accepted one
    pub attempts: usize,
}

impl ConnectOutcome {
    /// Initial weight in kilograms, or 0.0 when none was available
    pub fn kilograms(&self) -> f64 {
        self.initial.kilograms_or_zero()
    }

    /// Whether the first read cycle produced a weight
    pub fn has_initial_weight(&self) -> bool {
        self.initial.has_weight()
    }
}

/// Snapshot of the open connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    /// Bound port
    pub port: String,
    /// Bound configuration
    pub config: SerialConfig,
    /// Time since the connection was opened
    pub uptime: Duration,
    /// Read cycles completed on this connection
    pub reads: u64,
}

struct Connection<L> {
    port: String,
    config: SerialConfig,
    link: L,
    opened_at: Instant,
    reads: u64,
}

/// Owner of the single active scale connection
pub struct ConnectionManager<O: PortOpener> {
    opener: O,
    probe: ConfigProbe,
    strategy: ReadStrategy,
    active: Option<Connection<O::Link>>,
}

impl<O: PortOpener> ConnectionManager<O> {
    /// Create a manager with default probing and read settings
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, SessionConfig::default())
    }

    /// Create a manager with custom settings
    pub fn with_config(opener: O, config: SessionConfig) -> Self {
        Self {
            opener,
            probe: ConfigProbe::with_config(config.probe),
            strategy: ReadStrategy::with_config(config.strategy),
            active: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        if self.active.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Port of the open connection, if any
    pub fn active_port(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.port.as_str())
    }

    /// Details of the open connection, if any
    pub fn status(&self) -> Option<ConnectionInfo> {
        self.active.as_ref().map(|c| ConnectionInfo {
            port: c.port.clone(),
            config: c.config,
            uptime: c.opened_at.elapsed(),
            reads: c.reads,
        })
    }

    /// Close any open connection and probe `port` for a working configuration
    pub fn connect(&mut self, port: &str) -> Result<ConnectOutcome, SessionError> {
        self.close();

        let outcome = self.probe.attempt(&self.opener, port, &self.strategy)?;

        self.active = Some(Connection {
            port: port.to_string(),
            config: outcome.config,
            link: outcome.link,
            opened_at: Instant::now(),
            reads: 0,
        });

        Ok(ConnectOutcome {
            port: port.to_string(),
            config: outcome.config,
            initial: outcome.initial,
            attempts: outcome.attempts,
        })
    }

    /// Connect to the first port in `ports` that accepts a configuration
    pub fn connect_first<'a, I>(&mut self, ports: I) -> Result<ConnectOutcome, SessionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut last_error = None;

        for port in ports {
            info!("Trying {}", port);
            match self.connect(port) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!("No scale on {}: {}", port, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SessionError::Detect(DetectError::NoValidConfiguration {
                port: String::from("<none>"),
                attempts: 0,
                last_reason: String::from("no serial ports to try"),
            })
        }))
    }

    /// Run one read cycle on the open connection
    ///
    /// A transport error closes the connection.
    pub fn read_current(&mut self) -> Result<DecodeResult, SessionError> {
        let connection = self.active.as_mut().ok_or(SessionError::NotConnected)?;

        match self.strategy.read(&mut connection.link) {
            Ok(result) => {
                connection.reads += 1;
                Ok(result)
            }
            Err(e) => {
                let port = connection.port.clone();
                warn!("Communication failure on {}: {}", port, e);
                self.close();
                Err(DetectError::communication(&port, e).into())
            }
        }
    }

    /// Read from `port`, reusing the open connection when it is bound there
    ///
    /// With no port the open connection is read, whatever it is bound to.
    pub fn read_port(&mut self, port: Option<&str>) -> Result<DecodeResult, SessionError> {
        match port {
            Some(port) if self.active_port() != Some(port) => {
                debug!("Switching connection to {}", port);
                self.connect(port)?;
                self.read_current()
            }
            _ => self.read_current(),
        }
    }

    /// Open, read and close `port` without keeping a connection
    ///
    /// Any open connection is closed first. `baud_rate` and `timeout` put an
    /// 8N1 configuration in front of the regular candidates.
    pub fn read_once(
        &mut self,
        port: &str,
        baud_rate: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<OneShotRead, SessionError> {
        self.close();

        let candidates = preferred_candidates(self.probe.candidates(), baud_rate, timeout);
        Ok(self
            .probe
            .read_once(&self.opener, port, &candidates, &self.strategy)?)
    }

    /// Close the open connection
    ///
    /// Returns whether a connection was open. Closing when already closed
    /// does nothing.
    pub fn close(&mut self) -> bool {
        match self.active.take() {
            Some(connection) => {
                info!(
                    "Closed {} after {} read(s)",
                    connection.port, connection.reads
                );
                true
            }
            None => false,
        }
    }
}

impl<O: PortOpener> Drop for ConnectionManager<O> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use scale_detect::ReadTiming;
    use scale_sim::{VirtualBus, VirtualScale};

    use super::*;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            probe: ProbeConfig {
                settle: Duration::ZERO,
                ..Default::default()
            },
            strategy: StrategyConfig {
                timing: ReadTiming {
                    command_settle: Duration::ZERO,
                    passive_timeout: Duration::ZERO,
                    passive_interval: Duration::ZERO,
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_starts_closed() {
        let mut manager = ConnectionManager::with_config(VirtualBus::new(), fast_config());
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.status().is_none());
        assert!(matches!(
            manager.read_current(),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn test_connect_reports_initial_weight() {
        let bus = VirtualBus::new().with_scale("COM3", VirtualScale::streaming("N010.00\r\n"));
        let mut manager = ConnectionManager::with_config(bus, fast_config());

        let outcome = manager.connect("COM3").unwrap();
        assert_eq!(outcome.kilograms(), 10.0);
        assert!(outcome.has_initial_weight());
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(manager.active_port(), Some("COM3"));
    }

    #[test]
    fn test_status_counts_reads() {
        let bus = VirtualBus::new().with_scale("COM3", VirtualScale::streaming("N010.00\r\n"));
        let mut manager = ConnectionManager::with_config(bus, fast_config());

        manager.connect("COM3").unwrap();
        manager.read_current().unwrap();
        manager.read_current().unwrap();

        let status = manager.status().unwrap();
        assert_eq!(status.port, "COM3");
        assert_eq!(status.reads, 2);
        assert_eq!(status.config, SerialConfig::new(9600));
    }

    #[test]
    fn test_close_is_idempotent() {
        let bus = VirtualBus::new().with_scale("COM3", VirtualScale::silent());
        let mut manager = ConnectionManager::with_config(bus, fast_config());

        manager.connect("COM3").unwrap();
        assert!(manager.close());
        assert!(!manager.close());
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_connect_first_skips_dead_ports() {
        let bus = VirtualBus::new().with_scale("COM4", VirtualScale::silent());
        let mut manager = ConnectionManager::with_config(bus, fast_config());

        let outcome = manager.connect_first(["COM1", "COM4"]).unwrap();
        assert_eq!(outcome.port, "COM4");
        assert!(!outcome.has_initial_weight());
        assert_eq!(outcome.kilograms(), 0.0);
    }

    #[test]
    fn test_connect_first_with_no_ports() {
        let mut manager = ConnectionManager::with_config(VirtualBus::new(), fast_config());
        let err = manager.connect_first(std::iter::empty()).err().unwrap();
        assert!(matches!(
            err,
            SessionError::Detect(DetectError::NoValidConfiguration { attempts: 0, .. })
        ));
    }
}
