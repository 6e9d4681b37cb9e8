//! Multi-grammar weight decoder
//!
//! Scales print their readings in one of several informal ASCII grammars.
//! The decoder tries each grammar in priority order:
//!
//! | Stage | Grammar          | Example                 | Tag      |
//! |-------|------------------|-------------------------|----------|
//! | 1     | `ST,GS` framed   | `ST,GS,   1.500kg`      | `torrey` |
//! | 2     | `N`/`T` prefixed | `N001.50`               | `cas`    |
//! | 3     | signed decimal   | `+001.50`               | `signed` |
//! | 4     | bare decimal     | `12.34`                 | `simple` |
//! | 5     | integer grams    | `15340`                 | `gramos` |
//!
//! Each stage looks at its first textual match only. A stage whose match falls
//! outside [`MIN_WEIGHT_KG`]..=[`MAX_WEIGHT_KG`] produces nothing and the next
//! stage runs. Later stages are never consulted once an earlier one succeeds,
//! so `ST,GS, 12.500 kg  T045.00` decodes to 12.5 and not 45.0.
//!
//! A negative reading from a signed grammar (stage 1 or 3) ends decoding with
//! no weight: the unsigned grammars would otherwise pick up the same digits
//! without their sign.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::WeightFormat;

/// Smallest weight accepted, in kilograms
pub const MIN_WEIGHT_KG: f64 = 0.001;

/// Largest weight accepted, in kilograms
pub const MAX_WEIGHT_KG: f64 = 1000.0;

/// Grams in a kilogram; integer readings above this are taken as grams
pub const GRAMS_PER_KG: f64 = 1000.0;

/// Payloads with fewer visible characters than this are never decoded
const MIN_PAYLOAD_LEN: usize = 2;

/// Result of running one grammar stage
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    /// In-range weight in kilograms
    Weight(f64),
    /// No usable match; try the next grammar
    Skip,
    /// The scale reported a negative weight; stop decoding
    Negative,
}

static VENDOR_FRAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ST,GS[,\s]*([+-]?)\s*(\d+(?:\.\d+)?)\s*(?:kg|g)?").expect("valid regex")
});

static CLASS_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[NT](\d+(?:\.\d+)?)").expect("valid regex"));

static SIGNED_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+-]?)(\d+(?:\.\d+)?)").expect("valid regex"));

static BARE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").expect("valid regex"));

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// A weight extracted from a payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedWeight {
    /// Weight in kilograms, rounded to 3 decimals
    pub kilograms: f64,
    /// Grammar that produced the weight
    pub format: WeightFormat,
}

/// Tunables that differ between scale installations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Minimum number of digits for a bare integer to be read as grams
    pub gram_min_digits: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { gram_min_digits: 3 }
    }
}

/// Stateless weight decoder
#[derive(Debug, Clone, Default)]
pub struct WeightDecoder {
    config: DecoderConfig,
}

impl WeightDecoder {
    /// Create a decoder with the default grammar settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with custom settings
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decoder settings
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a raw payload read from the device
    ///
    /// Non-ASCII bytes are dropped before matching.
    pub fn decode(&self, payload: &[u8]) -> Option<DecodedWeight> {
        self.decode_text(&payload_text(payload))
    }

    /// Decode text that has already been converted from device bytes
    pub fn decode_text(&self, text: &str) -> Option<DecodedWeight> {
        let cleaned = text.replace(['\r', '\n', '\t'], " ");
        let cleaned = cleaned.trim();
        if cleaned.len() < MIN_PAYLOAD_LEN {
            return None;
        }

        for &format in WeightFormat::PRIORITY.iter() {
            match self.try_stage(format, cleaned) {
                Stage::Weight(kg) => {
                    let kilograms = round_grams(kg);
                    trace!("Decoded {} kg as {} from {:?}", kilograms, format, cleaned);
                    return Some(DecodedWeight { kilograms, format });
                }
                Stage::Negative => {
                    trace!("Negative {} reading in {:?}", format, cleaned);
                    return None;
                }
                Stage::Skip => {}
            }
        }

        trace!("No weight grammar matched {:?}", cleaned);
        None
    }

    /// Run a single grammar stage
    fn try_stage(&self, format: WeightFormat, text: &str) -> Stage {
        let value = match format {
            WeightFormat::VendorFramed if text.contains("ST,GS") => {
                VENDOR_FRAMED.captures(text).and_then(|caps| parse_signed(&caps[1], &caps[2]))
            }
            WeightFormat::VendorFramed => None,
            WeightFormat::ClassPrefixed => CLASS_PREFIXED
                .captures(text)
                .and_then(|caps| caps[1].parse::<f64>().ok()),
            WeightFormat::SignedDecimal => SIGNED_DECIMAL
                .captures(text)
                .and_then(|caps| parse_signed(&caps[1], &caps[2])),
            WeightFormat::BareDecimal => BARE_DECIMAL
                .find(text)
                .and_then(|m| m.as_str().parse::<f64>().ok()),
            WeightFormat::Grams => self.first_integer_run(text).map(|grams| {
                if grams > GRAMS_PER_KG {
                    grams / GRAMS_PER_KG
                } else {
                    grams
                }
            }),
        };

        match value {
            Some(kg) if kg < 0.0 => Stage::Negative,
            Some(kg) if in_range(kg) => Stage::Weight(kg),
            _ => Stage::Skip,
        }
    }

    /// First run of digits long enough to be grams and not part of a decimal
    fn first_integer_run(&self, text: &str) -> Option<f64> {
        let bytes = text.as_bytes();
        DIGIT_RUN
            .find_iter(text)
            .filter(|m| m.as_str().len() >= self.config.gram_min_digits)
            .find(|m| {
                let before = m.start().checked_sub(1).map(|i| bytes[i]);
                let after = bytes.get(m.end()).copied();
                before != Some(b'.') && after != Some(b'.')
            })
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }
}

/// Convert device bytes to text, dropping anything outside ASCII
pub fn payload_text(payload: &[u8]) -> String {
    payload
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

fn parse_signed(sign: &str, digits: &str) -> Option<f64> {
    let value = digits.parse::<f64>().ok()?;
    Some(if sign == "-" { -value } else { value })
}

fn in_range(kg: f64) -> bool {
    (MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&kg)
}

/// Round to whole grams (3 decimal places of a kilogram)
fn round_grams(kg: f64) -> f64 {
    (kg * GRAMS_PER_KG).round() / GRAMS_PER_KG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Option<DecodedWeight> {
        WeightDecoder::new().decode(text.as_bytes())
    }

    #[test]
    fn test_vendor_framed() {
        let w = decode("ST,GS,   1.500kg\r\n").unwrap();
        assert_eq!(w.kilograms, 1.5);
        assert_eq!(w.format, WeightFormat::VendorFramed);

        let w = decode("ST,GS,001.500,kg").unwrap();
        assert_eq!(w.kilograms, 1.5);
        assert_eq!(w.format, WeightFormat::VendorFramed);
    }

    #[test]
    fn test_vendor_framed_wins_over_later_stages() {
        let w = decode("ST,GS, 12.500 kg  T045.00").unwrap();
        assert_eq!(w.kilograms, 12.5);
        assert_eq!(w.format, WeightFormat::VendorFramed);
    }

    #[test]
    fn test_vendor_framed_negative_is_miss() {
        assert_eq!(decode("ST,GS,-  0.500kg"), None);
        assert_eq!(decode("ST,GS,-12.500kg"), None);
    }

    #[test]
    fn test_class_prefixed() {
        let w = decode("N001.50").unwrap();
        assert_eq!(w.kilograms, 1.5);
        assert_eq!(w.format, WeightFormat::ClassPrefixed);

        let w = decode("T045.00").unwrap();
        assert_eq!(w.kilograms, 45.0);
        assert_eq!(w.format, WeightFormat::ClassPrefixed);
    }

    #[test]
    fn test_class_prefix_beats_signed() {
        let w = decode("N12.5").unwrap();
        assert_eq!(w.format, WeightFormat::ClassPrefixed);
        assert_eq!(w.kilograms, 12.5);
    }

    #[test]
    fn test_signed_decimal() {
        let w = decode("+001.50").unwrap();
        assert_eq!(w.kilograms, 1.5);
        assert_eq!(w.format, WeightFormat::SignedDecimal);

        let w = decode("  12.34  ").unwrap();
        assert_eq!(w.format, WeightFormat::SignedDecimal);
    }

    #[test]
    fn test_negative_signed_is_miss() {
        // The bare decimal and gram stages must not pick up the unsigned digits
        assert_eq!(decode("-000.75"), None);
        assert_eq!(decode("-3.2"), None);
        assert_eq!(decode("-1500"), None);
    }

    #[test]
    fn test_config_accessor() {
        let decoder = WeightDecoder::with_config(DecoderConfig { gram_min_digits: 4 });
        assert_eq!(decoder.config().gram_min_digits, 4);
        assert_eq!(WeightDecoder::new().config(), &DecoderConfig::default());
    }

    #[test]
    fn test_bare_decimal_after_out_of_range_signed() {
        // Stage 3 only sees the first number (5000), which is out of range
        let w = decode("5000 12.34").unwrap();
        assert_eq!(w.kilograms, 12.34);
        assert_eq!(w.format, WeightFormat::BareDecimal);
    }

    #[test]
    fn test_grams_normalized() {
        let w = decode("15340").unwrap();
        assert_eq!(w.kilograms, 15.34);
        assert_eq!(w.format, WeightFormat::Grams);
    }

    #[test]
    fn test_grams_conversion_threshold() {
        // Up to one kilogram's worth of grams the integer is kept as kilograms
        let w = decode("0 1000").unwrap();
        assert_eq!(w.format, WeightFormat::Grams);
        assert_eq!(w.kilograms, 1000.0);

        let w = decode("0 1001").unwrap();
        assert_eq!(w.format, WeightFormat::Grams);
        assert_eq!(w.kilograms, 1001.0 / GRAMS_PER_KG);
    }

    #[test]
    fn test_grams_min_digits_configurable() {
        let decoder = WeightDecoder::with_config(DecoderConfig { gram_min_digits: 4 });
        // 1500 is above the 4-digit threshold
        let w = decoder.decode(b"x 5000.5 1500").unwrap();
        assert_eq!(w.format, WeightFormat::Grams);
        assert_eq!(w.kilograms, 1.5);
    }

    #[test]
    fn test_out_of_range_is_miss() {
        assert_eq!(decode("5000.0"), None);
        assert_eq!(decode("0.0000"), None);
        assert_eq!(decode("99999999"), None);
    }

    #[test]
    fn test_rounding() {
        let w = decode("12.34567").unwrap();
        assert_eq!(w.kilograms, 12.346);
    }

    #[test]
    fn test_short_or_empty_payload() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("\r\n"), None);
        assert_eq!(decode("5"), None);
    }

    #[test]
    fn test_no_digits() {
        assert_eq!(decode("ERR OVERLOAD"), None);
    }

    #[test]
    fn test_non_ascii_dropped() {
        let w = WeightDecoder::new().decode(b"\xff\xfeN002.25\x80").unwrap();
        assert_eq!(w.kilograms, 2.25);
        assert_eq!(w.format, WeightFormat::ClassPrefixed);
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(payload_text(b"A\xffB"), "AB");
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decoded_weight_always_in_window(text in "[ -~\r\n]{0,40}") {
            if let Some(w) = WeightDecoder::new().decode_text(&text) {
                prop_assert!(w.kilograms >= MIN_WEIGHT_KG);
                prop_assert!(w.kilograms <= MAX_WEIGHT_KG);
            }
        }

        #[test]
        fn negative_readings_never_decode(grams in 1u32..1_000_000u32, framed in any::<bool>()) {
            let kg = f64::from(grams) / 1000.0;
            let line = if framed {
                format!("ST,GS,-{:.3}kg\r\n", kg)
            } else {
                format!("-{:.3}\r\n", kg)
            };
            prop_assert_eq!(WeightDecoder::new().decode(line.as_bytes()), None);
        }

        #[test]
        fn decoding_is_deterministic(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let decoder = WeightDecoder::new();
            prop_assert_eq!(decoder.decode(&payload), decoder.decode(&payload));
        }

        #[test]
        fn framed_weights_round_trip(grams in 1u32..1_000_000u32) {
            let kg = f64::from(grams) / 1000.0;
            let line = format!("ST,GS,{:>10.3}kg\r\n", kg);
            let w = WeightDecoder::new().decode(line.as_bytes()).unwrap();
            prop_assert_eq!(w.format, WeightFormat::VendorFramed);
            prop_assert_eq!(w.kilograms, kg);
        }
    }
}
