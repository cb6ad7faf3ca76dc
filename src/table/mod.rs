//! An ordered, row-labelled table whose derived columns hold one
//! `Cell` per record, so a bad record never takes the batch down with it.

use crate::fingerprint::{FeatureVector, Fingerprint, FingerprintError};
use crate::molecule::Molecule;
use ndarray::Array2;
use thiserror::Error;

mod io;

/// One record's value in a derived column, or the reason it is missing.
pub type Cell<T> = Result<T, RecordError>;

/// Why a single record has no value. These are stored, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Empty SMILES")]
    EmptySmiles,
    #[error("Invalid SMILES '{smiles}': {reason}")]
    InvalidSmiles { smiles: String, reason: String },
    #[error("No input in column '{column}': {cause}")]
    MissingInput { column: String, cause: Box<RecordError> },
    #[error("Column '{column}' holds {found}, expected {expected}")]
    Incompatible {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("No fingerprint: {0}")]
    Fingerprint(#[from] FingerprintError),
}

/// Errors in how a table is used, as opposed to errors in its records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("No column named '{0}'")]
    MissingColumn(String),
    #[error("Column '{column}' has {found} rows, the table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Row filter has {found} entries, the table has {expected} rows")]
    FilterLength { expected: usize, found: usize },
    #[error("Fingerprint size must be at least 1")]
    ZeroFingerprintSize,
    #[error("Column '{column}' holds {found}, not feature vectors")]
    NotFeatures { column: String, found: &'static str },
    #[error("Row {label} of column '{column}' has no features")]
    MissingFeatures { column: String, label: usize },
    #[error("Row {label} of column '{column}' has {found} features, expected {expected}")]
    RaggedFeatures {
        column: String,
        label: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone)]
pub enum Column {
    Text(Vec<String>),
    Molecules(Vec<Cell<Molecule>>),
    Fingerprints(Vec<Cell<Fingerprint>>),
    Features(Vec<Cell<FeatureVector>>),
}

/// A borrowed view of one cell, whatever its column type.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Text(&'a str),
    Molecule(&'a Molecule),
    Fingerprint(&'a Fingerprint),
    Features(&'a FeatureVector),
    Missing(&'a RecordError),
}

impl Value<'_> {
    /// Name of the kind of object held, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Molecule(_) => "a molecule",
            Value::Fingerprint(_) => "a fingerprint",
            Value::Features(_) => "a feature vector",
            Value::Missing(_) => "nothing",
        }
    }
}

fn view<'a, T>(cell: &'a Cell<T>, present: impl Fn(&'a T) -> Value<'a>) -> Value<'a> {
    match cell {
        Ok(value) => present(value),
        Err(e) => Value::Missing(e),
    }
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Molecules(v) => v.len(),
            Column::Fingerprints(v) => v.len(),
            Column::Features(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Text(_) => "text",
            Column::Molecules(_) => "molecules",
            Column::Fingerprints(_) => "fingerprints",
            Column::Features(_) => "feature vectors",
        }
    }

    /// The cell at `row`. Panics if `row` is out of bounds.
    pub fn value(&self, row: usize) -> Value<'_> {
        match self {
            Column::Text(v) => Value::Text(&v[row]),
            Column::Molecules(v) => view(&v[row], Value::Molecule),
            Column::Fingerprints(v) => view(&v[row], Value::Fingerprint),
            Column::Features(v) => view(&v[row], Value::Features),
        }
    }

    /// Number of cells holding a value.
    pub fn present(&self) -> usize {
        (0..self.len())
            .filter(|row| !matches!(self.value(*row), Value::Missing(_)))
            .count()
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut row = 0;
            values.retain(|_| {
                row += 1;
                keep[row - 1]
            });
        }
        match self {
            Column::Text(v) => filter(v, keep),
            Column::Molecules(v) => filter(v, keep),
            Column::Fingerprints(v) => filter(v, keep),
            Column::Features(v) => filter(v, keep),
        }
    }
}

/// Records in a fixed order, each carrying the label it was created with.
#[derive(Debug, Clone, Default)]
pub struct Table {
    index: Vec<usize>,
    columns: Vec<(String, Column)>,
}

impl Table {
    /// An empty table with `len` rows labelled `0..len`.
    pub fn with_len(len: usize) -> Self {
        Self {
            index: (0..len).collect(),
            columns: Vec::new(),
        }
    }

    /// Builds a table from named columns. The first column fixes the row
    /// count; every other column must match it.
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Column)>,
    ) -> Result<Self, TableError> {
        let mut columns = columns.into_iter().peekable();
        let len = columns.peek().map_or(0, |(_, column)| column.len());
        let mut table = Self::with_len(len);
        for (name, column) in columns {
            table.insert_column(name, column)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Row labels, in row order. Dropping rows keeps the survivors' labels.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| column)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Adds a column at the end, or replaces an existing one of the same
    /// name where it stands.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        column: Column,
    ) -> Result<(), TableError> {
        let name = name.into();
        if column.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.len(),
                found: column.len(),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    /// Applies `f` to every cell of column `name`, in row order. `f` gets
    /// the row label and the cell.
    pub fn map_column<T>(
        &self,
        name: &str,
        mut f: impl FnMut(usize, Value<'_>) -> Cell<T>,
    ) -> Result<Vec<Cell<T>>, TableError> {
        let column = self.column(name)?;
        Ok(self
            .index
            .iter()
            .enumerate()
            .map(|(row, label)| f(*label, column.value(row)))
            .collect())
    }

    /// Keeps the rows for which `keep` is true. `keep` has one entry per row.
    pub fn retain_rows(&mut self, keep: &[bool]) -> Result<(), TableError> {
        if keep.len() != self.len() {
            return Err(TableError::FilterLength {
                expected: self.len(),
                found: keep.len(),
            });
        }
        let mut row = 0;
        self.index.retain(|_| {
            row += 1;
            keep[row - 1]
        });
        for (_, column) in &mut self.columns {
            column.retain(keep);
        }
        Ok(())
    }

    /// Stacks a features column into a `rows x width` matrix.
    pub fn feature_matrix(&self, name: &str) -> Result<Array2<f64>, TableError> {
        let Column::Features(cells) = self.column(name)? else {
            return Err(TableError::NotFeatures {
                column: name.to_string(),
                found: self.column(name)?.kind(),
            });
        };

        let mut width = None;
        let mut rows = Vec::with_capacity(cells.len());
        for (cell, label) in cells.iter().zip(&self.index) {
            let features = cell.as_ref().map_err(|_| TableError::MissingFeatures {
                column: name.to_string(),
                label: *label,
            })?;
            let expected = *width.get_or_insert(features.len());
            if features.len() != expected {
                return Err(TableError::RaggedFeatures {
                    column: name.to_string(),
                    label: *label,
                    expected,
                    found: features.len(),
                });
            }
            rows.push(features);
        }

        let shape = (rows.len(), width.unwrap_or(0));
        Ok(Array2::from_shape_fn(shape, |(row, col)| rows[row][col] as f64))
    }
}
