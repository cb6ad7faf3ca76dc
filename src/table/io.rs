use super::{Column, Table, Value};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::*;

impl Table {
    /// Reads a CSV with a header row. Every column comes in as text.
    pub fn read_csv(reader: impl Read) -> Result<Table> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row, result) in rdr.records().enumerate() {
            let record: StringRecord = result.context(format!("Failed to read CSV record {row}"))?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }
        debug!("Read {} CSV rows with columns {:?}", columns.first().map_or(0, Vec::len), headers);

        if headers.is_empty() {
            warn!("CSV input has no columns");
        }
        let columns = columns.into_iter().map(Column::Text);
        let table = Table::from_columns(headers.into_iter().zip(columns))?;
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
        Table::read_csv(file).context(format!("Failed to read table from {}", path.display()))
    }

    /// Writes every column. Missing cells are written as empty fields.
    pub fn write_csv(&self, writer: impl Write) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(self.column_names()).context("Failed to write CSV header")?;
        let columns: Vec<&Column> = self.columns.iter().map(|(_, column)| column).collect();
        for row in 0..self.len() {
            let record: Vec<String> =
                columns.iter().map(|column| render(column.value(row))).collect();
            wtr.write_record(&record)
                .context(format!("Failed to write CSV record {row}"))?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}

fn render(value: Value<'_>) -> String {
    match value {
        Value::Text(text) => text.to_string(),
        Value::Molecule(molecule) => molecule.smiles().to_string(),
        Value::Fingerprint(fingerprint) => fingerprint.to_string(),
        Value::Features(features) => {
            features.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
        }
        Value::Missing(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::table::{Column, RecordError, Table};
    use crate::fingerprint::{BitVector, FeatureVector, Fingerprint};
    use anyhow::Result;

    #[test]
    fn read_text_columns() -> Result<()> {
        let data = "id,smiles\n1,CCO\n2,\n3,c1ccccc1\n";
        let table = Table::read_csv(data.as_bytes())?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names().collect::<Vec<_>>(), ["id", "smiles"]);
        let Column::Text(smiles) = table.column("smiles")? else {
            panic!("expected text");
        };
        assert_eq!(smiles, &["CCO", "", "c1ccccc1"]);
        Ok(())
    }

    #[test]
    fn ragged_csv_is_an_error() {
        let data = "id,smiles\n1,CCO,extra\n";
        let err = Table::read_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn missing_file() {
        assert!(Table::from_path("/nonexistent/molecules.csv").is_err());
    }

    #[test]
    fn write_renders_every_column() -> Result<()> {
        let mut bits = BitVector::new(8);
        bits.set(1);
        bits.set(5);
        let table = Table::from_columns([
            ("smiles", Column::Text(vec!["CC".into(), "?".into()])),
            (
                "Fingerprint",
                Column::Fingerprints(vec![
                    Ok(Fingerprint::Bits(bits)),
                    Err(RecordError::EmptySmiles),
                ]),
            ),
            (
                "Features",
                Column::Features(vec![
                    Ok(FeatureVector::from(vec![0, 2, 1])),
                    Err(RecordError::EmptySmiles),
                ]),
            ),
        ])?;

        let mut out = Vec::new();
        table.write_csv(&mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "smiles,Fingerprint,Features\nCC,1;5,0 2 1\n?,,\n"
        );
        Ok(())
    }
}
