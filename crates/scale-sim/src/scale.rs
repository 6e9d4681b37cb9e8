//! Virtual scale simulation
//!
//! A shared, cloneable scale whose output and failure modes can be changed
//! while links to it are open.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scale_detect::SerialConfig;

/// Output bytes a scale produces when the line settings do not match
const GARBLED: &[u8] = &[0xFE, 0xE0, 0xFC, 0x80, 0xFF];

/// How the scale produces output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleBehavior {
    /// Continuously prints the frame; input is never empty
    Streaming(String),
    /// Prints the reply only after receiving the exact command
    OnRequest { command: Vec<u8>, reply: String },
    /// Never prints anything
    Silent,
}

#[derive(Debug)]
pub(crate) struct ScaleState {
    pub(crate) behavior: ScaleBehavior,
    pub(crate) native: Option<SerialConfig>,
    pub(crate) rejected: HashSet<SerialConfig>,
    pub(crate) unplugged: bool,
    pub(crate) rx: Vec<u8>,
    pub(crate) sent: Vec<Vec<u8>>,
    pub(crate) open_count: usize,
    pub(crate) open_handles: usize,
}

/// A simulated scale shared between a [`crate::VirtualBus`] and the test
#[derive(Debug, Clone)]
pub struct VirtualScale {
    state: Arc<Mutex<ScaleState>>,
}

impl VirtualScale {
    /// Create a scale with the given behavior
    pub fn new(behavior: ScaleBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScaleState {
                behavior,
                native: None,
                rejected: HashSet::new(),
                unplugged: false,
                rx: Vec::new(),
                sent: Vec::new(),
                open_count: 0,
                open_handles: 0,
            })),
        }
    }

    /// A scale that prints `frame` continuously
    pub fn streaming(frame: impl Into<String>) -> Self {
        Self::new(ScaleBehavior::Streaming(frame.into()))
    }

    /// A scale that prints `reply` when it receives `command`
    pub fn on_request(command: &[u8], reply: impl Into<String>) -> Self {
        Self::new(ScaleBehavior::OnRequest {
            command: command.to_vec(),
            reply: reply.into(),
        })
    }

    /// A scale that never prints
    pub fn silent() -> Self {
        Self::new(ScaleBehavior::Silent)
    }

    /// Only produce readable output when opened with `config`
    pub fn with_native_config(self, config: SerialConfig) -> Self {
        self.state().native = Some(config);
        self
    }

    /// Make opening with `config` fail
    pub fn reject(self, config: SerialConfig) -> Self {
        self.state().rejected.insert(config);
        self
    }

    /// Change what the scale prints
    pub fn set_behavior(&self, behavior: ScaleBehavior) {
        self.state().behavior = behavior;
    }

    /// Disconnect the scale; open links start failing
    pub fn unplug(&self) {
        self.state().unplugged = true;
    }

    /// Reconnect the scale
    pub fn plug_in(&self) {
        self.state().unplugged = false;
    }

    /// Total number of times a link was opened
    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    /// Number of links currently open
    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    /// Every request written to the scale, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ScaleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScaleState {
    /// Bytes the scale emits on its own, as seen through `config`
    pub(crate) fn refill(&mut self, config: &SerialConfig) {
        if let ScaleBehavior::Streaming(frame) = &self.behavior {
            if self.rx.is_empty() {
                let bytes = self.render(frame.as_bytes(), config);
                self.rx.extend_from_slice(&bytes);
            }
        }
    }

    /// Handle a request written to the scale
    pub(crate) fn receive(&mut self, data: &[u8], config: &SerialConfig) {
        self.sent.push(data.to_vec());
        if let ScaleBehavior::OnRequest { command, reply } = &self.behavior {
            if command.as_slice() == data {
                let bytes = self.render(reply.as_bytes(), config);
                self.rx.extend_from_slice(&bytes);
            }
        }
    }

    fn render(&self, text: &[u8], config: &SerialConfig) -> Vec<u8> {
        match &self.native {
            Some(native) if native != config => GARBLED.to_vec(),
            _ => text.to_vec(),
        }
    }
}
