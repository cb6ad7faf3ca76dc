//! Turns a SMILES column into molecules, fingerprints and feature vectors.
//!
//! The step operations keep failed records as `Err` cells so every derived
//! column stays as long as the table. The end-to-end [`Featurizer::fingerprint`]
//! instead drops the rows whose fingerprint could not be computed.

use crate::fingerprint::{
    maccs_fingerprint, morgan_fingerprint, Fingerprint, FingerprintError, FingerprintKind,
    MorganOptions,
};
use crate::molecule::Molecule;
use crate::parse::{parse_smiles, SmilesError};
use crate::table::{Cell, Column, RecordError, Table, TableError, Value};
use anyhow::{Context, Result};
use tracing::*;

pub const MOLECULE_COLUMN: &str = "Molecule";
pub const FINGERPRINT_COLUMN: &str = "Fingerprint";
pub const FEATURES_COLUMN: &str = "Features";

/// Fingerprinting helper. Owns a private copy of the table it was given;
/// the caller's table is never touched.
#[derive(Debug, Clone)]
pub struct Featurizer {
    table: Table,
}

impl Featurizer {
    pub fn new(table: &Table) -> Self {
        Self { table: table.clone() }
    }

    /// The working table, with every column added so far.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Parses `smiles_column` into the `Molecule` column. Empty and
    /// unparsable SMILES become `Err` cells; nothing is raised for them.
    pub fn parse_molecules(&mut self, smiles_column: &str) -> Result<&mut Self> {
        let cells = self
            .table
            .map_column(smiles_column, |label, value| {
                let molecule = match value {
                    Value::Text(smiles) => parse_record(smiles),
                    other => Err(RecordError::Incompatible {
                        column: smiles_column.to_string(),
                        expected: "SMILES text",
                        found: other.kind(),
                    }),
                };
                if let Err(e) = &molecule {
                    debug!("Row {label}: no molecule: {e}");
                }
                molecule
            })
            .context(format!("Failed to parse SMILES column '{smiles_column}'"))?;
        self.store(MOLECULE_COLUMN, Column::Molecules(cells))?;
        Ok(self)
    }

    /// Computes Morgan fingerprints from `molecule_column` into the
    /// `Fingerprint` column. Records without a molecule keep an `Err` cell.
    pub fn morgan_fingerprints(
        &mut self,
        molecule_column: &str,
        options: &MorganOptions,
    ) -> Result<&mut Self> {
        if options.fp_size == 0 {
            return Err(TableError::ZeroFingerprintSize).context("Invalid Morgan options");
        }
        debug!(
            "Morgan fingerprints: radius {}, {} bits, counts: {}",
            options.radius, options.fp_size, options.use_count
        );
        self.fingerprints(molecule_column, |molecule| morgan_fingerprint(molecule, options))
    }

    /// Computes 166-bit MACCS key fingerprints from `molecule_column` into
    /// the `Fingerprint` column.
    pub fn maccs_fingerprints(&mut self, molecule_column: &str) -> Result<&mut Self> {
        self.fingerprints(molecule_column, |molecule| Ok(maccs_fingerprint(molecule)))
    }

    fn fingerprints(
        &mut self,
        molecule_column: &str,
        generate: impl Fn(&Molecule) -> Result<Fingerprint, FingerprintError>,
    ) -> Result<&mut Self> {
        let cells = self
            .table
            .map_column(molecule_column, |label, value| {
                let fingerprint = match value {
                    Value::Molecule(molecule) => generate(molecule).map_err(RecordError::from),
                    other => upstream(molecule_column, "a molecule", other),
                };
                if let Err(e) = &fingerprint {
                    debug!("Row {label}: no fingerprint: {e}");
                }
                fingerprint
            })
            .context(format!("Failed to fingerprint column '{molecule_column}'"))?;
        self.store(FINGERPRINT_COLUMN, Column::Fingerprints(cells))?;
        Ok(self)
    }

    /// Converts `fingerprint_column` into dense arrays in the `Features`
    /// column.
    pub fn fingerprints_to_arrays(&mut self, fingerprint_column: &str) -> Result<&mut Self> {
        let cells = self
            .table
            .map_column(fingerprint_column, |label, value| {
                let features = match value {
                    Value::Fingerprint(fingerprint) => Ok(fingerprint.to_array()),
                    other => upstream(fingerprint_column, "a fingerprint", other),
                };
                if let Err(e) = &features {
                    debug!("Row {label}: no features: {e}");
                }
                features
            })
            .context(format!("Failed to convert column '{fingerprint_column}'"))?;
        self.store(FEATURES_COLUMN, Column::Features(cells))?;
        Ok(self)
    }

    /// Parses, fingerprints, drops every row whose fingerprint is missing,
    /// then converts. Unlike the step operations, failed rows do not
    /// survive into the returned table; its index keeps the original
    /// labels of those that do.
    pub fn fingerprint(
        &mut self,
        smiles_column: &str,
        kind: FingerprintKind,
        options: &MorganOptions,
    ) -> Result<Table> {
        info!("Fingerprinting {} rows with {kind}", self.table.len());
        self.parse_molecules(smiles_column)?;
        match kind {
            FingerprintKind::Morgan => self.morgan_fingerprints(MOLECULE_COLUMN, options)?,
            FingerprintKind::Maccs => self.maccs_fingerprints(MOLECULE_COLUMN)?,
        };

        let keep: Vec<bool> = match self.table.column(FINGERPRINT_COLUMN)? {
            Column::Fingerprints(cells) => cells.iter().map(Result::is_ok).collect(),
            other => vec![false; other.len()],
        };
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            let labels: Vec<usize> = self
                .table
                .index()
                .iter()
                .zip(&keep)
                .filter(|(_, k)| !**k)
                .map(|(label, _)| *label)
                .collect();
            warn!("Dropping {dropped} rows without a fingerprint: {labels:?}");
        }
        self.table
            .retain_rows(&keep)
            .context("Failed to drop rows without a fingerprint")?;

        self.fingerprints_to_arrays(FINGERPRINT_COLUMN)?;
        Ok(self.table.clone())
    }

    fn store(&mut self, name: &str, column: Column) -> Result<()> {
        info!("{name}: {} of {} rows computed", column.present(), column.len());
        self.table
            .insert_column(name, column)
            .context(format!("Failed to store column '{name}'"))
    }
}

fn parse_record(smiles: &str) -> Cell<Molecule> {
    if smiles.trim().is_empty() {
        return Err(RecordError::EmptySmiles);
    }
    parse_smiles(smiles).map_err(|e| RecordError::InvalidSmiles {
        smiles: smiles.to_string(),
        reason: e
            .downcast_ref::<SmilesError>()
            .map_or_else(|| format!("{e:#}"), |cause| cause.to_string()),
    })
}

/// The cell for a record whose input is missing or of the wrong kind.
fn upstream<T>(column: &str, expected: &'static str, value: Value<'_>) -> Cell<T> {
    match value {
        Value::Missing(cause) => Err(RecordError::MissingInput {
            column: column.to_string(),
            cause: Box::new(cause.clone()),
        }),
        other => Err(RecordError::Incompatible {
            column: column.to_string(),
            expected,
            found: other.kind(),
        }),
    }
}
