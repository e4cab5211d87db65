use std::fmt::Write as _;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Per-file draw counts of one bootstrap resample.
///
/// `weights[i]` is the number of times file `i` was selected when drawing `N` files
/// out of `N` with replacement, so the counts always sum to the number of files.
/// Files that were not drawn have weight zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawWeights(Vec<u32>);

impl DrawWeights {
    /// Wraps explicit per-file counts.
    #[must_use]
    pub fn from_counts(counts: Vec<u32>) -> Self {
        Self(counts)
    }

    /// Weight one for every file: the full, non-resampled ensemble.
    #[must_use]
    pub fn ones(file_count: usize) -> Self {
        Self(vec![1; file_count])
    }

    /// Number of files covered by the weights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.iter().copied().map(u64::from).sum()
    }

    /// Returns the counts as a slice indexed by file.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Iterates over the counts in file order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

/// Draws bootstrap weights over a fixed number of files.
///
/// # Draw algorithm
///
/// With `N` files, `N` indices are drawn independently and uniformly from `[0, N)`
/// with replacement; the weight of file `i` is the number of times `i` was drawn.
/// This reproduces the classical bootstrap distribution: every file has expected
/// weight 1 and variance `(N - 1) / N`.
///
/// # Example
///
/// ```
/// use rootstrap_engine::resample::{ResampleSeed, WeightDrawer};
///
/// let seed = ResampleSeed::from_bytes([7; 16]);
/// let mut drawer = WeightDrawer::with_seed(5, seed);
///
/// let weights = drawer.draw();
/// assert_eq!(weights.len(), 5);
/// assert_eq!(weights.total(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct WeightDrawer {
    rng: Pcg32,
    file_count: usize,
}

/// Seed for deterministic resampling.
///
/// This is a 128-bit (16-byte) seed for the random number generator that draws the
/// bootstrap weights. The same seed over the same file list reproduces the same sequence
/// of resamples, which makes runs repeatable and tests deterministic.
///
/// Serialized as a 32-character hexadecimal string.
///
/// # Example
///
/// ```
/// use rand::Rng as _;
/// use rootstrap_engine::resample::{ResampleSeed, WeightDrawer};
///
/// let seed: ResampleSeed = rand::rng().random();
///
/// let mut a = WeightDrawer::with_seed(10, seed);
/// let mut b = WeightDrawer::with_seed(10, seed);
/// assert_eq!(a.draw(), b.draw());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleSeed([u8; 16]);

impl ResampleSeed {
    /// Creates a seed from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a seed from a 128-bit integer (big-endian byte order).
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Serialize for ResampleSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = u128::from_be_bytes(self.0);
        let mut hex_str = String::with_capacity(2 * self.0.len());
        write!(&mut hex_str, "{num:032x}").map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex_str)
    }
}

impl<'de> Deserialize<'de> for ResampleSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        hex_str.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when parsing a [`ResampleSeed`] from text.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid hex seed: {message}")]
pub struct ParseSeedError {
    #[error(not(source))]
    message: String,
}

impl std::str::FromStr for ResampleSeed {
    type Err = ParseSeedError;

    fn from_str(hex_str: &str) -> Result<Self, Self::Err> {
        if hex_str.len() != 32 {
            return Err(ParseSeedError {
                message: format!("expected 32 characters, got {}", hex_str.len()),
            });
        }
        let num = u128::from_str_radix(hex_str, 16).map_err(|e| ParseSeedError {
            message: format!("{hex_str} ({e})"),
        })?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl std::fmt::Display for ResampleSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

/// Allows generating random `ResampleSeed` values with `rng.random()`.
impl Distribution<ResampleSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ResampleSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        ResampleSeed(seed)
    }
}

impl WeightDrawer {
    /// Creates a drawer over `file_count` files with a random seed.
    ///
    /// For reproducible resampling, use [`Self::with_seed`] instead.
    #[must_use]
    pub fn new(file_count: usize) -> Self {
        Self::with_seed(file_count, rand::rng().random())
    }

    /// Like [`Self::new`], but with a specific seed.
    #[must_use]
    pub fn with_seed(file_count: usize, seed: ResampleSeed) -> Self {
        Self {
            rng: Pcg32::from_seed(seed.0),
            file_count,
        }
    }

    /// Number of files each draw covers.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Draws a new set of bootstrap weights.
    pub fn draw(&mut self) -> DrawWeights {
        let mut counts = vec![0_u32; self.file_count];
        for _ in 0..self.file_count {
            counts[self.rng.random_range(0..self.file_count)] += 1;
        }
        DrawWeights(counts)
    }
}
