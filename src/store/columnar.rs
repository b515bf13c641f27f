//! Parquet encoding of bucket rows.

use std::fs::File;
use std::path::Path;

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::BucketRow;
use crate::error::StoreError;

/// Rows per record batch when writing.
const BATCH_ROWS: usize = 64 * 1024;

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `rows` to a fresh parquet file, one batch per [`BATCH_ROWS`].
pub fn write_rows<T: BucketRow>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, T::schema(), Some(props))?;
    for chunk in rows.chunks(BATCH_ROWS) {
        writer.write(&T::to_batch(chunk)?)?;
    }
    // writer must be closed to write footer
    writer.close()?;
    Ok(())
}

/// Reads every row of every batch in a parquet file.
pub fn read_rows<T: BucketRow>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut decoded = T::from_batch(&batch).map_err(|details| StoreError::Layout {
            path: path.to_path_buf(),
            details,
        })?;
        rows.append(&mut decoded);
    }
    Ok(rows)
}
