//! Row types kept in the record store, and their CSV encoding.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::{Record, ResolvedRecord};

/// A row that can live in a bucket, either as CSV or as a columnar batch.
pub trait BucketRow: Serialize + DeserializeOwned + Sized {
    /// Column names, in order. Also the CSV header.
    const COLUMNS: [&'static str; 2];

    fn schema() -> SchemaRef {
        let [id, text] = Self::COLUMNS;
        Arc::new(Schema::new(vec![
            Field::new(id, DataType::UInt64, false),
            Field::new(text, DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, String>;
}

fn columns<'a>(
    batch: &'a RecordBatch,
    names: [&str; 2],
) -> Result<(&'a UInt64Array, &'a StringArray), String> {
    let [id, text] = names;
    let ids = batch
        .column_by_name(id)
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| format!("missing or mistyped column `{id}`"))?;
    let texts = batch
        .column_by_name(text)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| format!("missing or mistyped column `{text}`"))?;
    Ok((ids, texts))
}

impl BucketRow for Record {
    const COLUMNS: [&'static str; 2] = ["author_id", "full_name"];

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let ids = UInt64Array::from_iter_values(rows.iter().map(|r| r.author_id));
        let places = StringArray::from_iter_values(rows.iter().map(|r| r.raw_place.as_str()));
        RecordBatch::try_new(
            Self::schema(),
            vec![Arc::new(ids) as ArrayRef, Arc::new(places) as ArrayRef],
        )
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, String> {
        let (ids, places) = columns(batch, Self::COLUMNS)?;
        Ok((0..ids.len())
            .map(|i| Record::new(ids.value(i), places.value(i)))
            .collect())
    }
}

impl BucketRow for ResolvedRecord {
    const COLUMNS: [&'static str; 2] = ["author_id", "gcc"];

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let ids = UInt64Array::from_iter_values(rows.iter().map(|r| r.author_id));
        let codes = StringArray::from_iter_values(rows.iter().map(|r| r.region_code.as_str()));
        RecordBatch::try_new(
            Self::schema(),
            vec![Arc::new(ids) as ArrayRef, Arc::new(codes) as ArrayRef],
        )
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, String> {
        let (ids, codes) = columns(batch, Self::COLUMNS)?;
        Ok((0..ids.len())
            .map(|i| ResolvedRecord::new(ids.value(i), codes.value(i)))
            .collect())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Truncates `path` to an empty file holding only the header row.
pub fn create_with_header<T: BucketRow>(path: &Path) -> Result<(), StoreError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record(T::COLUMNS).map_err(csv_error(path))?;
    writer.flush().map_err(io_error(path))
}

/// Writes `rows` (with header) to a fresh CSV file.
pub fn write_all<T: BucketRow>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    if rows.is_empty() {
        writer.write_record(T::COLUMNS).map_err(csv_error(path))?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(io_error(path))
}

/// Reads every row of a CSV file written by this module.
pub fn read_all<T: BucketRow>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error(path))?;
    let headers = reader.headers().map_err(csv_error(path))?;
    if headers.iter().ne(T::COLUMNS) {
        return Err(StoreError::Layout {
            path: path.to_path_buf(),
            details: format!("expected header {:?}, found {:?}", T::COLUMNS, headers),
        });
    }
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_error(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_places_with_commas_survive_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bucket.csv");
        let rows = vec![Record::new(1, "Sydney, New South Wales \"CBD\"")];
        write_all(&path, &rows).unwrap();
        assert_eq!(read_all::<Record>(&path).unwrap(), rows);
    }

    #[test]
    fn test_wrong_header_is_a_layout_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bucket.csv");
        create_with_header::<ResolvedRecord>(&path).unwrap();
        assert!(matches!(
            read_all::<Record>(&path),
            Err(StoreError::Layout { .. })
        ));
    }

    #[test]
    fn test_batch_conversion_checks_columns() {
        let batch = Record::to_batch(&[Record::new(9, "Perth, Western Australia")]).unwrap();
        assert_eq!(
            Record::from_batch(&batch).unwrap(),
            vec![Record::new(9, "Perth, Western Australia")]
        );
        assert!(ResolvedRecord::from_batch(&batch).is_err());
    }
}
