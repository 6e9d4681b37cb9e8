//! Scale Protocol Library
//!
//! This crate turns the raw text printed by electronic weighing scales into
//! validated weights. Scales in the field speak a handful of loosely defined
//! ASCII conventions:
//!
//! - **Torrey / Toledo framed**: `ST,GS,   1.500kg`
//! - **CAS class-prefixed**: `N001.50`, `T001.50`
//! - **Signed decimal**: `+001.50` (negative readings such as `-000.75` are
//!   rejected)
//! - **Bare decimal**: `12.34`
//! - **Grams**: `15340` (integer grams, normalized to kilograms)
//!
//! # Architecture
//!
//! [`WeightDecoder`] tries the grammars in a fixed priority order and returns
//! the first match that lands inside the valid weight window. Decoding is pure:
//! the same payload always produces the same result.
//!
//! # Example
//!
//! ```rust
//! use scale_protocol::{WeightDecoder, WeightFormat};
//!
//! let decoder = WeightDecoder::new();
//! let weight = decoder.decode(b"ST,GS, 12.500 kg\r\n").unwrap();
//!
//! assert_eq!(weight.kilograms, 12.5);
//! assert_eq!(weight.format, WeightFormat::VendorFramed);
//! ```

pub mod decoder;
pub mod reading;

pub use decoder::{
    DecodedWeight, DecoderConfig, WeightDecoder, GRAMS_PER_KG, MAX_WEIGHT_KG, MIN_WEIGHT_KG,
};
pub use reading::{DecodeResult, ReadMethod, WeightReading};

/// Identifies which output grammar matched a payload
///
/// Variants are listed in decoding priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightFormat {
    /// `ST,GS` framed output (Torrey EQB / L-EQ, Toledo)
    #[cfg_attr(feature = "serde", serde(rename = "torrey"))]
    VendorFramed,
    /// Net/tare letter prefix (CAS)
    #[cfg_attr(feature = "serde", serde(rename = "cas"))]
    ClassPrefixed,
    /// Number with optional leading sign
    #[cfg_attr(feature = "serde", serde(rename = "signed"))]
    SignedDecimal,
    /// Plain `digits.digits`
    #[cfg_attr(feature = "serde", serde(rename = "simple"))]
    BareDecimal,
    /// Integer grams
    #[cfg_attr(feature = "serde", serde(rename = "gramos"))]
    Grams,
}

impl WeightFormat {
    /// All formats in decoding priority order
    pub const PRIORITY: [WeightFormat; 5] = [
        WeightFormat::VendorFramed,
        WeightFormat::ClassPrefixed,
        WeightFormat::SignedDecimal,
        WeightFormat::BareDecimal,
        WeightFormat::Grams,
    ];

    /// Short tag used in reports and logs
    pub fn tag(&self) -> &'static str {
        match self {
            WeightFormat::VendorFramed => "torrey",
            WeightFormat::ClassPrefixed => "cas",
            WeightFormat::SignedDecimal => "signed",
            WeightFormat::BareDecimal => "simple",
            WeightFormat::Grams => "gramos",
        }
    }
}

impl std::fmt::Display for WeightFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
