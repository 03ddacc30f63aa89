//! Fixed-length binary strings used to store hash variants.
//!
//! Hashes are persisted as strings of `'0'`/`'1'` characters so that the
//! manifest stays readable by the browser client, which compares them
//! character by character.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FingerprintError, Result};

/// A validated string of `'0'` and `'1'` characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitString(String);

impl BitString {
    /// Build from a sequence of bits, first bit first.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        Self(bits.into_iter().map(|b| if b { '1' } else { '0' }).collect())
    }

    /// Expand bytes most-significant bit first.
    pub fn from_bytes_msb(bytes: &[u8]) -> Self {
        Self::from_bits(
            bytes
                .iter()
                .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1)),
        )
    }

    /// An all-zero string of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self("0".repeat(len))
    }

    /// Pad with trailing zeros or truncate to exactly `len` bits.
    pub fn fit_to(mut self, len: usize) -> Self {
        if self.0.len() < len {
            let pad = len - self.0.len();
            self.0.extend(std::iter::repeat('0').take(pad));
        } else {
            self.0.truncate(len);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Count of differing bit positions.
    ///
    /// Returns `None` when the lengths differ: strings of different lengths
    /// come from different algorithms and have no meaningful distance.
    pub fn hamming_distance(&self, other: &Self) -> Option<u32> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let distance = self
            .0
            .bytes()
            .zip(other.0.bytes())
            .filter(|(a, b)| a != b)
            .count();
        Some(distance as u32)
    }

    /// `1 - hamming / bit_length`, in `[0, 1]`.
    pub fn similarity(&self, other: &Self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let distance = self.hamming_distance(other)?;
        Some(1.0 - f64::from(distance) / self.len() as f64)
    }
}

impl TryFrom<String> for BitString {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self> {
        if let Some(pos) = value.find(|c| c != '0' && c != '1') {
            return Err(FingerprintError::InvalidBitString(format!(
                "unexpected character at position {pos}"
            )));
        }
        Ok(Self(value))
    }
}

impl From<BitString> for String {
    fn from(bits: BitString) -> Self {
        bits.0
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
