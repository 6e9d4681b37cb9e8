//! Scale Serial Detection Library
//!
//! This crate finds a working serial configuration for a weighing scale and
//! reads weights from it:
//!
//! - [`ConfigProbe`] opens a port with each candidate [`SerialConfig`] until
//!   one opens cleanly
//! - [`ReadStrategy`] elicits a payload (buffered, command, passive) and
//!   decodes it with [`scale_protocol::WeightDecoder`]
//! - [`PortScanner`] lists the serial ports present on the machine
//!
//! Hardware access goes through the [`ScaleLink`] / [`PortOpener`] seam so
//! that the same logic runs against a simulated scale in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use scale_detect::{ConfigProbe, ReadStrategy, SerialOpener};
//!
//! let probe = ConfigProbe::new();
//! let strategy = ReadStrategy::new();
//! let outcome = probe.attempt(&SerialOpener, "/dev/ttyUSB0", &strategy).unwrap();
//!
//! println!("Opened at {}: {:?}", outcome.config, outcome.initial);
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod probe;
pub mod scanner;
pub mod strategy;

pub use config::{default_candidates, DataBits, Parity, SerialConfig, StopBits};
pub use error::DetectError;
pub use link::{PortOpener, ScaleLink, SerialOpener};
pub use probe::{preferred_candidates, ConfigProbe, OneShotRead, ProbeConfig, ProbeOutcome};
pub use scanner::{PortDescriptor, PortScanner, ScannerConfig};
pub use strategy::{default_commands, ReadStrategy, ReadTiming, StrategyConfig, ENQ};
