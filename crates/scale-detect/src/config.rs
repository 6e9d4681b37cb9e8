//! Serial line configurations
//!
//! Scales ship with all sorts of factory framing. [`default_candidates`] lists
//! the configurations worth trying, most common first.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("unsupported data bits: {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
}

impl Parity {
    /// Single-letter code used in `8N1` style notation
    pub fn code(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(format!("unsupported stop bits: {other}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// A complete serial line configuration
///
/// Serialized with the field names scale tooling traditionally uses
/// (`baudrate`, `bytesize`, `parity`, `stopbits`, `timeout` in seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Baud rate
    #[serde(rename = "baudrate")]
    pub baud_rate: u32,
    /// Data bits
    #[serde(rename = "bytesize")]
    pub data_bits: DataBits,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    #[serde(rename = "stopbits")]
    pub stop_bits: StopBits,
    /// Blocking read timeout
    #[serde(rename = "timeout", with = "duration_secs")]
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Default read timeout for probing
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// 8N1 at the given baud rate
    pub const fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Same baud rate and timeout with different framing
    pub const fn with_framing(self, data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        Self {
            data_bits,
            parity,
            stop_bits,
            ..self
        }
    }

    /// Same configuration with a different read timeout
    pub const fn with_timeout(self, read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            ..self
        }
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.baud_rate,
            u8::from(self.data_bits),
            self.parity.code(),
            u8::from(self.stop_bits)
        )
    }
}

/// Candidate configurations in probing order
pub fn default_candidates() -> Vec<SerialConfig> {
    vec![
        SerialConfig::new(9600),
        SerialConfig::new(9600).with_framing(DataBits::Seven, Parity::Even, StopBits::One),
        SerialConfig::new(2400).with_framing(DataBits::Seven, Parity::Even, StopBits::One),
        SerialConfig::new(4800),
        SerialConfig::new(19200),
    ]
}

/// Serialize a [`Duration`] as fractional seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates_order() {
        let candidates = default_candidates();
        let labels: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            labels,
            ["9600-8-N-1", "9600-7-E-1", "2400-7-E-1", "4800-8-N-1", "19200-8-N-1"]
        );
        assert!(candidates
            .iter()
            .all(|c| c.read_timeout == Duration::from_secs(1)));
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(SerialConfig::new(9600)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "baudrate": 9600,
                "bytesize": 8,
                "parity": "N",
                "stopbits": 1,
                "timeout": 1.0
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_bad_framing() {
        let bad = r#"{"baudrate":9600,"bytesize":9,"parity":"N","stopbits":1,"timeout":1}"#;
        assert!(serde_json::from_str::<SerialConfig>(bad).is_err());

        let good = r#"{"baudrate":2400,"bytesize":7,"parity":"E","stopbits":1,"timeout":0.5}"#;
        let config: SerialConfig = serde_json::from_str(good).unwrap();
        assert_eq!(config.to_string(), "2400-7-E-1");
        assert_eq!(config.read_timeout, Duration::from_millis(500));
    }
}
