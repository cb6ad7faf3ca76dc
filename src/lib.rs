//! Molecular fingerprints for machine learning.
//!
//! A table of SMILES strings goes in; molecules, fingerprints (Morgan or
//! MACCS) and dense feature vectors come out as new columns. Records that
//! fail to parse are kept as `Err` cells by the step operations of
//! [`Featurizer`], and dropped by [`Featurizer::fingerprint`].
//!
//! ```no_run
//! use molprint::*;
//!
//! let table = Table::from_path("molecules.csv")?;
//! let options = MorganOptions::default();
//! let features = Featurizer::new(&table).fingerprint("smiles", FingerprintKind::Maccs, &options)?;
//! let matrix = features.feature_matrix(FEATURES_COLUMN)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use tracing::metadata::LevelFilter;

pub mod element;
pub mod fingerprint;
pub mod molecule;
pub mod parse;
pub mod ring;
pub mod substructure;
pub mod table;

mod featurizer;
pub use featurizer::*;

pub use element::Element;
pub use fingerprint::{
    maccs_fingerprint, morgan_fingerprint, BitVector, CountVector, FeatureVector, Fingerprint,
    FingerprintError, FingerprintKind, MorganOptions,
};
pub use molecule::{Atom, Bond, Molecule};
pub use parse::{parse_smiles, SmartsError, SmartsPattern, SmilesError};
pub use table::{Cell, Column, RecordError, Table, TableError, Value};

/// Installs a `fmt` subscriber at `level` ("error" through "trace").
/// Unknown levels fall back to "info". Calling it again is a no-op.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt().with_max_level(filter).try_init();
}
