//! Scale Session Library
//!
//! This crate keeps a connection to a weighing scale open across reads:
//!
//! - [`ConnectionManager`] owns the single open connection and exposes
//!   connect / read / close
//! - [`PollLoop`] reads at a fixed cadence until a [`CancelToken`] fires
//!
//! The manager is an ordinary value owned by the caller. Callers that share
//! it between threads must serialize access (for example behind a `Mutex`),
//! since the device can only serve one reader at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use scale_detect::SerialOpener;
//! use scale_session::{CancelToken, ConnectionManager, PollEvent, PollLoop};
//!
//! let mut manager = ConnectionManager::new(SerialOpener);
//! manager.connect("/dev/ttyUSB0").unwrap();
//!
//! let cancel = CancelToken::new();
//! PollLoop::new().run(&mut manager, &cancel, |event| {
//!     if let PollEvent::Reading(reading) = event {
//!         println!("{} kg", reading.kilograms);
//!     }
//! });
//! ```

pub mod cancel;
pub mod error;
pub mod manager;
pub mod poll;

pub use cancel::CancelToken;
pub use error::SessionError;
pub use manager::{ConnectOutcome, ConnectionInfo, ConnectionManager, ConnectionState, SessionConfig};
pub use poll::{PollConfig, PollEvent, PollLoop, PollStats};
