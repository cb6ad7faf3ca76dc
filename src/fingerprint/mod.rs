//! Fingerprint containers and the two generators.

use ndarray::Array1;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod maccs;
pub use maccs::*;

mod morgan;
pub use morgan::*;

/// Dense numeric form of a fingerprint: 0/1 for bit vectors, counts for
/// count vectors.
pub type FeatureVector = Array1<u32>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("Unknown fingerprint algorithm '{0}', expected 'morgan' or 'maccs'")]
    UnknownKind(String),
    #[error("Fingerprint lengths differ: {0} vs {1}")]
    LengthMismatch(usize, usize),
    #[error("Cannot compare a bit fingerprint with a count fingerprint")]
    EncodingMismatch,
    #[error("Fingerprint size must be at least 1")]
    ZeroSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.len, "bit {bit} out of range {}", self.len);
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && self.words[bit / 64] >> (bit % 64) & 1 == 1
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the set bits, ascending.
    pub fn on_bits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&bit| self.get(bit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountVector {
    counts: Vec<u32>,
}

impl CountVector {
    pub fn new(len: usize) -> Self {
        Self { counts: vec![0; len] }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn increment(&mut self, index: usize) {
        self.counts[index] = self.counts[index].saturating_add(1);
    }

    pub fn get(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// `(index, count)` for every non-zero entry, ascending.
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.counts.iter().copied().enumerate().filter(|(_, c)| *c > 0)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Bits(BitVector),
    Counts(CountVector),
}

impl Fingerprint {
    pub fn len(&self) -> usize {
        match self {
            Fingerprint::Bits(bits) => bits.len(),
            Fingerprint::Counts(counts) => counts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_array(&self) -> FeatureVector {
        match self {
            Fingerprint::Bits(bits) => (0..bits.len()).map(|i| bits.get(i) as u32).collect(),
            Fingerprint::Counts(counts) => Array1::from(counts.as_slice().to_vec()),
        }
    }

    /// Tanimoto similarity. Count fingerprints use the min/max form.
    /// Two empty fingerprints are identical.
    pub fn tanimoto(&self, other: &Fingerprint) -> Result<f64, FingerprintError> {
        if self.len() != other.len() {
            return Err(FingerprintError::LengthMismatch(self.len(), other.len()));
        }
        let (shared, total) = match (self, other) {
            (Fingerprint::Bits(a), Fingerprint::Bits(b)) => a
                .words
                .iter()
                .zip(&b.words)
                .fold((0u64, 0u64), |(and, or), (x, y)| {
                    (and + (x & y).count_ones() as u64, or + (x | y).count_ones() as u64)
                }),
            (Fingerprint::Counts(a), Fingerprint::Counts(b)) => a
                .counts
                .iter()
                .zip(&b.counts)
                .fold((0u64, 0u64), |(min, max), (x, y)| {
                    (min + (*x).min(*y) as u64, max + (*x).max(*y) as u64)
                }),
            _ => return Err(FingerprintError::EncodingMismatch),
        };
        if total == 0 {
            return Ok(1.0);
        }
        Ok(shared as f64 / total as f64)
    }
}

impl fmt::Display for Fingerprint {
    /// Bit fingerprints print their on-bits joined by `;`, count
    /// fingerprints their `bit:count` pairs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Fingerprint::Bits(bits) => {
                bits.on_bits().map(|b| b.to_string()).collect::<Vec<_>>().join(";")
            }
            Fingerprint::Counts(counts) => counts
                .nonzero()
                .map(|(b, c)| format!("{b}:{c}"))
                .collect::<Vec<_>>()
                .join(";"),
        };
        write!(f, "{text}")
    }
}

/// Which generator the end-to-end featurizer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FingerprintKind {
    #[default]
    Morgan,
    Maccs,
}

/// Only `morgan` and `maccs` are accepted, ignoring case and surrounding
/// whitespace. Any other name is an error rather than a silent fall back to
/// Morgan.
impl FromStr for FingerprintKind {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morgan" => Ok(FingerprintKind::Morgan),
            "maccs" => Ok(FingerprintKind::Maccs),
            _ => Err(FingerprintError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintKind::Morgan => write!(f, "morgan"),
            FingerprintKind::Maccs => write!(f, "maccs"),
        }
    }
}

/// Morgan generator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MorganOptions {
    /// Neighbourhood radius in bonds.
    pub radius: u32,
    /// Output length in bits.
    pub fp_size: usize,
    /// Count occurrences instead of recording presence.
    pub use_count: bool,
}

impl Default for MorganOptions {
    fn default() -> Self {
        Self {
            radius: 2,
            fp_size: 2048,
            use_count: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_vector_basics() {
        let mut bits = BitVector::new(130);
        assert_eq!(bits.words.len(), 3);
        bits.set(0);
        bits.set(64);
        bits.set(129);
        assert!(bits.get(64));
        assert!(!bits.get(65));
        assert!(!bits.get(500));
        assert_eq!(bits.count_ones(), 3);
        assert_eq!(bits.on_bits().collect::<Vec<_>>(), [0, 64, 129]);
    }

    #[test]
    fn arrays_keep_length_and_values() {
        let mut bits = BitVector::new(8);
        bits.set(3);
        let array = Fingerprint::Bits(bits).to_array();
        assert_eq!(array.to_vec(), [0, 0, 0, 1, 0, 0, 0, 0]);

        let mut counts = CountVector::new(4);
        counts.increment(1);
        counts.increment(1);
        let array = Fingerprint::Counts(counts).to_array();
        assert_eq!(array.to_vec(), [0, 2, 0, 0]);
    }

    #[test]
    fn tanimoto() {
        let mut a = BitVector::new(16);
        let mut b = BitVector::new(16);
        for bit in [1, 2, 3] {
            a.set(bit);
        }
        for bit in [2, 3, 4] {
            b.set(bit);
        }
        let a = Fingerprint::Bits(a);
        let b = Fingerprint::Bits(b);
        assert_eq!(a.tanimoto(&b), Ok(0.5));
        assert_eq!(a.tanimoto(&a), Ok(1.0));

        let empty = Fingerprint::Bits(BitVector::new(16));
        assert_eq!(empty.tanimoto(&empty), Ok(1.0));
        assert_eq!(
            a.tanimoto(&Fingerprint::Bits(BitVector::new(8))),
            Err(FingerprintError::LengthMismatch(16, 8))
        );
        assert_eq!(
            a.tanimoto(&Fingerprint::Counts(CountVector::new(16))),
            Err(FingerprintError::EncodingMismatch)
        );
    }

    #[test]
    fn display_forms() {
        let mut bits = BitVector::new(10);
        bits.set(2);
        bits.set(7);
        assert_eq!(Fingerprint::Bits(bits).to_string(), "2;7");

        let mut counts = CountVector::new(10);
        counts.increment(4);
        counts.increment(4);
        counts.increment(9);
        assert_eq!(Fingerprint::Counts(counts).to_string(), "4:2;9:1");
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("morgan".parse(), Ok(FingerprintKind::Morgan));
        assert_eq!("MACCS".parse(), Ok(FingerprintKind::Maccs));
        assert_eq!(
            "ecfp".parse::<FingerprintKind>(),
            Err(FingerprintError::UnknownKind("ecfp".into()))
        );
        assert_eq!(" Morgan\n".parse(), Ok(FingerprintKind::Morgan));
        // no fall back to the default for an empty name
        assert_eq!("".parse::<FingerprintKind>(), Err(FingerprintError::UnknownKind("".into())));
        assert_eq!(FingerprintKind::default(), FingerprintKind::Morgan);
    }

    #[test]
    fn morgan_defaults() {
        let options = MorganOptions::default();
        assert_eq!((options.radius, options.fp_size, options.use_count), (2, 2048, false));
    }
}
