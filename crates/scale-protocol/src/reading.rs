//! Weight readings and read outcomes

use crate::decoder::DecodedWeight;
use crate::WeightFormat;

/// How the payload behind a reading was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadMethod {
    /// Bytes were already waiting in the input buffer
    #[cfg_attr(feature = "serde", serde(rename = "buffer_directo"))]
    Buffered,
    /// The scale answered a request command
    #[cfg_attr(feature = "serde", serde(rename = "comando"))]
    Command,
    /// The scale pushed data on its own while we waited
    #[cfg_attr(feature = "serde", serde(rename = "automatico"))]
    Passive,
}

impl ReadMethod {
    /// Short tag used in reports and logs
    pub fn tag(&self) -> &'static str {
        match self {
            ReadMethod::Buffered => "buffer_directo",
            ReadMethod::Command => "comando",
            ReadMethod::Passive => "automatico",
        }
    }
}

impl std::fmt::Display for ReadMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A validated weight taken from the scale
#[derive(Debug, Clone, PartialEq)]
pub struct WeightReading {
    /// Weight in kilograms, within `0.001..=1000`
    pub kilograms: f64,
    /// Grammar that matched
    pub format: WeightFormat,
    /// Read attempt that produced the payload
    pub method: ReadMethod,
    /// Trimmed device text the weight was decoded from
    pub raw_frame: Option<String>,
}

impl WeightReading {
    /// Build a reading from a decoded weight
    pub fn new(weight: DecodedWeight, method: ReadMethod, raw_frame: Option<String>) -> Self {
        Self {
            kilograms: weight.kilograms,
            format: weight.format,
            method,
            raw_frame,
        }
    }
}

/// Outcome of one read cycle
///
/// A cycle without a recognizable weight is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    /// A weight was decoded
    Weight(WeightReading),
    /// Nothing decodable arrived this cycle
    NoWeight {
        /// Last text received, if the scale sent anything at all
        last_frame: Option<String>,
    },
}

impl DecodeResult {
    /// The reading, if one was decoded
    pub fn reading(&self) -> Option<&WeightReading> {
        match self {
            DecodeResult::Weight(reading) => Some(reading),
            DecodeResult::NoWeight { .. } => None,
        }
    }

    /// Weight in kilograms, or 0.0 for a miss
    pub fn kilograms_or_zero(&self) -> f64 {
        self.reading().map_or(0.0, |r| r.kilograms)
    }

    /// Whether a weight was decoded
    pub fn has_weight(&self) -> bool {
        matches!(self, DecodeResult::Weight(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_reports_zero() {
        let miss = DecodeResult::NoWeight { last_frame: None };
        assert_eq!(miss.kilograms_or_zero(), 0.0);
        assert!(!miss.has_weight());
    }

    #[test]
    fn test_reading_from_decoded() {
        let decoded = DecodedWeight {
            kilograms: 3.25,
            format: WeightFormat::ClassPrefixed,
        };
        let result = DecodeResult::Weight(WeightReading::new(
            decoded,
            ReadMethod::Command,
            Some("N003.25".into()),
        ));
        assert_eq!(result.kilograms_or_zero(), 3.25);
        assert_eq!(result.reading().unwrap().method, ReadMethod::Command);
    }
}
