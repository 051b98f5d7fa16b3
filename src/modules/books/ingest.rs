//! Bulk load of books from a CSV file.
//!
//! Rows are inserted one at a time as they are read. A bad row stops the
//! load, leaving earlier rows in place.

use std::io::Read;
use std::path::{Path, PathBuf};

use mongodb::bson::{Bson, Document};
use thiserror::Error;

use super::models::fields;
use super::store::{BookStore, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("row {row}: Precio '{value}' is not a number")]
    InvalidPrice { row: usize, value: String },

    #[error("row {row}: {source}")]
    Store {
        row: usize,
        #[source]
        source: StoreError,
    },
}

/// Load every row of the CSV file at `path` into `store`.
pub async fn load_file(store: &dyn BookStore, path: &Path) -> Result<usize, IngestError> {
    let contents = tokio::fs::read(path)
        .await
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    load(store, contents.as_slice()).await
}

/// Load every row of `input` into `store`, returning the number inserted.
///
/// `Precio` is stored as a double; every other column is kept as the string
/// read, in header order.
pub async fn load<R: Read>(store: &dyn BookStore, input: R) -> Result<usize, IngestError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
    let headers = reader.headers()?.clone();

    for column in fields::CSV_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(IngestError::MissingColumn { column });
        }
    }

    let mut inserted = 0;
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        let document = row_document(&headers, &record, row)?;
        store
            .insert(document)
            .await
            .map_err(|source| IngestError::Store { row, source })?;
        inserted += 1;
    }

    tracing::debug!(inserted, "csv load finished");
    Ok(inserted)
}

fn row_document(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    row: usize,
) -> Result<Document, IngestError> {
    let mut document = Document::new();
    for (header, value) in headers.iter().zip(record.iter()) {
        if header == fields::PRICE {
            let price = value
                .trim()
                .parse::<f64>()
                .map_err(|_| IngestError::InvalidPrice {
                    row,
                    value: value.to_string(),
                })?;
            document.insert(header, Bson::Double(price));
        } else {
            document.insert(header, value);
        }
    }
    Ok(document)
}
