//! Perceptual hash values.

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgument;

/// Number of bits in a perceptual hash.
pub const HASH_BITS: u32 = 64;

/// Method name of the difference hash.
pub const METHOD_DHASH: &str = "dhash";
/// Method name of the average hash.
pub const METHOD_AHASH: &str = "ahash";

/// A 64-bit perceptual image signature.
///
/// Two hashes are comparable only when their `method` matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash {
    /// The bit vector
    pub value: u64,
    /// Name of the method that produced it
    pub method: String,
}

impl PerceptualHash {
    /// Create a new perceptual hash.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `method` is blank.
    pub fn new(value: u64, method: impl Into<String>) -> Result<Self, InvalidArgument> {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(InvalidArgument::new("perceptual hash method must not be blank"));
        }
        Ok(Self { value, method })
    }

    /// Hamming distance: 0 for identical, 64 for maximally different.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the methods differ.
    pub fn distance(&self, other: &Self) -> Result<u32, InvalidArgument> {
        self.ensure_comparable(other)?;
        Ok((self.value ^ other.value).count_ones())
    }

    /// Similarity score in `[0, 1]`, `1 - distance / 64`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the methods differ.
    pub fn similarity(&self, other: &Self) -> Result<f64, InvalidArgument> {
        let distance = self.distance(other)?;
        Ok(1.0 - f64::from(distance) / f64::from(HASH_BITS))
    }

    /// Whether `distance(other) <= threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the methods differ.
    pub fn is_similar(&self, other: &Self, threshold: u32) -> Result<bool, InvalidArgument> {
        Ok(self.distance(other)? <= threshold)
    }

    /// The hash as 16 lowercase hex digits.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.value)
    }

    fn ensure_comparable(&self, other: &Self) -> Result<(), InvalidArgument> {
        if self.method != other.method {
            return Err(InvalidArgument::new(format!(
                "cannot compare perceptual hashes from different methods: {} vs {}",
                self.method, other.method
            )));
        }
        Ok(())
    }
}
