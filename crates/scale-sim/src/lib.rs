//! Scale Simulation Library
//!
//! This crate provides simulated weighing scales that plug into the
//! [`scale_detect::PortOpener`] seam, so probing, reading and polling can be
//! exercised without serial hardware.
//!
//! - **VirtualScale**: a scale that streams, answers a request command, or
//!   stays silent, and that can be unplugged mid-session
//! - **VirtualBus**: a set of named ports with scales attached
//!
//! # Example
//!
//! ```rust
//! use scale_detect::{ConfigProbe, ReadStrategy};
//! use scale_sim::{VirtualBus, VirtualScale};
//!
//! let scale = VirtualScale::streaming("ST,GS,   1.500kg\r\n");
//! let bus = VirtualBus::new().with_scale("/dev/ttyUSB0", scale.clone());
//!
//! let outcome = ConfigProbe::new()
//!     .attempt(&bus, "/dev/ttyUSB0", &ReadStrategy::new())
//!     .unwrap();
//! assert_eq!(outcome.initial.kilograms_or_zero(), 1.5);
//! assert_eq!(scale.open_handles(), 1);
//! ```

pub mod bus;
pub mod scale;

pub use bus::{VirtualBus, VirtualLink};
pub use scale::{ScaleBehavior, VirtualScale};
