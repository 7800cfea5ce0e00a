//! Perceptual image hashing for similarity detection.
//!
//! Both methods downsample the luminance channel to a tiny grid and derive
//! one bit per sample, producing a 64-bit [`PerceptualHash`]:
//!
//! - **dHash** resizes to 9×8 and sets bit `y*8+x` when a sample is
//!   brighter than its right-hand neighbour.
//! - **aHash** resizes to 8×8 and sets bit `i` when sample `i` is brighter
//!   than the mean of all 64 samples.

use bk_tree::{BKTree, Metric};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::InvalidArgument;
use crate::model::perceptual::{METHOD_AHASH, METHOD_DHASH};
use crate::model::PerceptualHash;

/// Default maximum Hamming distance for two images to count as similar.
pub const DEFAULT_IMAGE_THRESHOLD: u32 = 10;

/// Supported perceptual hashing methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualMethod {
    /// dHash (Difference Hash) - gradient-based, fast and effective.
    #[default]
    Dhash,
    /// aHash (Average Hash) - mean-based, fast but less resilient.
    Ahash,
}

impl PerceptualMethod {
    /// Method name carried by the hashes this method produces.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dhash => METHOD_DHASH,
            Self::Ahash => METHOD_AHASH,
        }
    }

    /// A boxed hasher for this method.
    #[must_use]
    pub fn hasher(self) -> Box<dyn PerceptualHasher> {
        match self {
            Self::Dhash => Box::new(DifferenceHasher),
            Self::Ahash => Box::new(AverageHasher),
        }
    }
}

impl fmt::Display for PerceptualMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerceptualMethod {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            METHOD_DHASH => Ok(Self::Dhash),
            METHOD_AHASH => Ok(Self::Ahash),
            other => Err(InvalidArgument::new(format!(
                "unknown perceptual method '{other}' (available: {METHOD_DHASH}, {METHOD_AHASH})"
            ))),
        }
    }
}

/// Computes perceptual hashes for decoded images.
pub trait PerceptualHasher: Send + Sync {
    /// Method name stamped on every hash this hasher produces.
    fn method(&self) -> &str;

    /// Hash an already decoded image.
    fn hash_image(&self, image: &DynamicImage) -> Option<PerceptualHash>;

    /// Decode and hash the image at `path`.
    ///
    /// Unsupported or undecodable files yield `None` so batch callers can
    /// skip them.
    fn hash_path(&self, path: &Path) -> Option<PerceptualHash> {
        match image::open(path) {
            Ok(image) => self.hash_image(&image),
            Err(e) => {
                log::debug!("No perceptual hash for {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Default maximum distance for [`PerceptualHash::is_similar`].
    fn default_threshold(&self) -> u32 {
        DEFAULT_IMAGE_THRESHOLD
    }
}

fn luminance_grid(image: &DynamicImage, width: u32, height: u32) -> GrayImage {
    image
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8()
}

/// dHash over a 9×8 luminance grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceHasher;

impl PerceptualHasher for DifferenceHasher {
    fn method(&self) -> &str {
        METHOD_DHASH
    }

    fn hash_image(&self, image: &DynamicImage) -> Option<PerceptualHash> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        let grid = luminance_grid(image, 9, 8);
        let mut value = 0u64;
        for y in 0..8 {
            for x in 0..8 {
                let left = grid.get_pixel(x, y).0[0];
                let right = grid.get_pixel(x + 1, y).0[0];
                if left > right {
                    value |= 1 << (y * 8 + x);
                }
            }
        }
        PerceptualHash::new(value, METHOD_DHASH).ok()
    }
}

/// aHash over an 8×8 luminance grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageHasher;

impl PerceptualHasher for AverageHasher {
    fn method(&self) -> &str {
        METHOD_AHASH
    }

    fn hash_image(&self, image: &DynamicImage) -> Option<PerceptualHash> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        let grid = luminance_grid(image, 8, 8);
        let samples: Vec<u8> = grid.pixels().map(|p| p.0[0]).collect();
        let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / 64.0;
        let value = samples
            .iter()
            .enumerate()
            .filter(|&(_, &s)| f64::from(s) > mean)
            .fold(0u64, |acc, (i, _)| acc | (1 << i));
        PerceptualHash::new(value, METHOD_AHASH).ok()
    }
}

/// Hamming distance over raw 64-bit hash values.
#[derive(Default, Clone, Copy, Debug)]
pub struct HammingMetric;

impl Metric<u64> for HammingMetric {
    fn distance(&self, a: &u64, b: &u64) -> u32 {
        (a ^ b).count_ones()
    }

    fn threshold_distance(&self, a: &u64, b: &u64, threshold: u32) -> Option<u32> {
        let d = self.distance(a, b);
        if d <= threshold {
            Some(d)
        } else {
            None
        }
    }
}

/// A BK-tree index over perceptual hashes of a single method.
///
/// Each inserted hash is tagged with the caller's item index; several items
/// may share one hash value.
pub struct SimilarityIndex {
    method: String,
    tree: BKTree<u64, HammingMetric>,
    items: HashMap<u64, Vec<usize>>,
    count: usize,
}

impl SimilarityIndex {
    /// Create a new empty index for hashes of `method`.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            tree: BKTree::new(HammingMetric),
            items: HashMap::new(),
            count: 0,
        }
    }

    /// Add the hash of item `index` to the index.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the hash was produced by another method.
    pub fn insert(&mut self, index: usize, hash: &PerceptualHash) -> Result<(), InvalidArgument> {
        self.check_method(hash)?;
        let slot = self.items.entry(hash.value).or_default();
        if slot.is_empty() {
            self.tree.add(hash.value);
        }
        slot.push(index);
        self.count += 1;
        Ok(())
    }

    /// All items within `max_distance` of `hash`, as `(distance, index)`
    /// pairs sorted by distance then index.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the hash was produced by another method.
    pub fn find(
        &self,
        hash: &PerceptualHash,
        max_distance: u32,
    ) -> Result<Vec<(u32, usize)>, InvalidArgument> {
        self.check_method(hash)?;
        let mut found: Vec<(u32, usize)> = self
            .tree
            .find(&hash.value, max_distance)
            .flat_map(|(distance, value)| {
                self.items
                    .get(value)
                    .into_iter()
                    .flatten()
                    .map(move |&index| (distance, index))
            })
            .collect();
        found.sort_unstable();
        Ok(found)
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the number of items in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn check_method(&self, hash: &PerceptualHash) -> Result<(), InvalidArgument> {
        if hash.method != self.method {
            return Err(InvalidArgument::new(format!(
                "index holds {} hashes, got {}",
                self.method, hash.method
            )));
        }
        Ok(())
    }
}
