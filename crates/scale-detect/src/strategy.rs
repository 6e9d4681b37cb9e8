//! Read strategies for eliciting a weight from a scale
//!
//! Scales either stream readings continuously, answer a polling command, or
//! print only when the platform settles. [`ReadStrategy::read`] covers all
//! three, in order:
//!
//! 1. **Buffered**: decode anything already waiting.
//! 2. **Command**: send each request command and decode the reply.
//! 3. **Passive**: poll the input buffer until a timeout, decoding arrivals.
//!
//! The first decoded weight wins. A cycle with nothing decodable returns
//! [`DecodeResult::NoWeight`]; only transport errors are reported as `Err`.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use scale_protocol::decoder::payload_text;
use scale_protocol::{DecodeResult, DecoderConfig, ReadMethod, WeightDecoder, WeightReading};
use tracing::{debug, trace};

use crate::link::ScaleLink;

/// ASCII enquiry byte understood by many indicator heads
pub const ENQ: u8 = 0x05;

/// Request commands in the order they are tried
pub fn default_commands() -> Vec<Vec<u8>> {
    vec![b"P\r\n".to_vec(), b"W\r\n".to_vec(), b"S\r\n".to_vec(), vec![ENQ]]
}

/// Timing for the command and passive stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTiming {
    /// Wait after writing a command before reading the reply
    pub command_settle: Duration,
    /// Total time spent waiting for unsolicited data
    pub passive_timeout: Duration,
    /// Interval between input buffer checks while waiting
    pub passive_interval: Duration,
}

impl Default for ReadTiming {
    fn default() -> Self {
        Self {
            command_settle: Duration::from_millis(200),
            passive_timeout: Duration::from_secs(1),
            passive_interval: Duration::from_millis(100),
        }
    }
}

/// Configuration for [`ReadStrategy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Request commands, tried in order
    pub commands: Vec<Vec<u8>>,
    /// Stage timing
    pub timing: ReadTiming,
    /// Decoder settings
    pub decoder: DecoderConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            commands: default_commands(),
            timing: ReadTiming::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

/// Nested buffered / command / passive read attempts
#[derive(Debug, Clone)]
pub struct ReadStrategy {
    decoder: WeightDecoder,
    commands: Vec<Vec<u8>>,
    timing: ReadTiming,
}

impl ReadStrategy {
    /// Create a strategy with the default commands and timing
    pub fn new() -> Self {
        Self::with_config(StrategyConfig::default())
    }

    /// Create a strategy with custom configuration
    pub fn with_config(config: StrategyConfig) -> Self {
        Self {
            decoder: WeightDecoder::with_config(config.decoder),
            commands: config.commands,
            timing: config.timing,
        }
    }

    /// The decoder used for every payload
    pub fn decoder(&self) -> &WeightDecoder {
        &self.decoder
    }

    /// Run one read cycle against an open link
    pub fn read<L>(&self, link: &mut L) -> io::Result<DecodeResult>
    where
        L: ScaleLink + ?Sized,
    {
        let mut last_frame = None;

        if link.bytes_available()? > 0 {
            let data = link.read_available()?;
            if let Some(reading) = self.decode(&data, ReadMethod::Buffered, &mut last_frame) {
                return Ok(DecodeResult::Weight(reading));
            }
        }

        for command in &self.commands {
            trace!("Sending request {:02X?}", command);
            link.clear_input()?;
            link.send(command)?;
            sleep(self.timing.command_settle);

            if link.bytes_available()? > 0 {
                let data = link.read_available()?;
                if let Some(reading) = self.decode(&data, ReadMethod::Command, &mut last_frame) {
                    return Ok(DecodeResult::Weight(reading));
                }
            }
        }

        let started = Instant::now();
        while started.elapsed() < self.timing.passive_timeout {
            if link.bytes_available()? > 0 {
                let data = link.read_available()?;
                if let Some(reading) = self.decode(&data, ReadMethod::Passive, &mut last_frame) {
                    return Ok(DecodeResult::Weight(reading));
                }
            }
            sleep(self.timing.passive_interval);
        }

        debug!("No weight this cycle (last frame: {:?})", last_frame);
        Ok(DecodeResult::NoWeight { last_frame })
    }

    fn decode(
        &self,
        data: &[u8],
        method: ReadMethod,
        last_frame: &mut Option<String>,
    ) -> Option<WeightReading> {
        let text = payload_text(data);
        let frame = text.trim();
        if frame.is_empty() {
            return None;
        }

        let decoded = self.decoder.decode_text(frame);
        *last_frame = Some(frame.to_string());

        decoded.map(|weight| {
            debug!("Read {} kg ({}) via {}", weight.kilograms, weight.format, method);
            WeightReading::new(weight, method, Some(frame.to_string()))
        })
    }
}

impl Default for ReadStrategy {
    fn default() -> Self {
        Self::new()
    }
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
