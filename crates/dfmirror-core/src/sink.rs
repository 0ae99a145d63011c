//! Parquet file writer with atomic tmp→rename

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Rows per parquet row group
const MAX_ROW_GROUP_SIZE: usize = 1024 * 1024;

/// Buffered parquet writer with atomic tmp→rename
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create a new Snappy-compressed sink writing to `{final_path}.tmp`
    pub fn new(final_path: &Path, schema: &Schema) -> Result<Self, std::io::Error> {
        let final_path = final_path.to_path_buf();
        let mut tmp = final_path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp_path = PathBuf::from(tmp);

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_max_row_group_size(MAX_ROW_GROUP_SIZE)
            .build();

        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(std::io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path,
            row_count: 0,
        })
    }

    /// Write a record batch
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), std::io::Error> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(std::io::Error::other)
    }

    /// Finalize: flush footer and atomically rename tmp → final
    pub fn finalize(self) -> Result<usize, std::io::Error> {
        let Self {
            writer,
            tmp_path,
            final_path,
            row_count,
        } = self;
        if let Err(e) = writer.close() {
            let _ = fs::remove_file(&tmp_path);
            return Err(std::io::Error::other(e));
        }
        fs::rename(&tmp_path, &final_path)?;
        Ok(row_count)
    }

    /// Drop the writer and remove the tmp file without touching the final path
    pub fn abandon(self) {
        let Self {
            writer, tmp_path, ..
        } = self;
        drop(writer);
        if let Err(e) = fs::remove_file(&tmp_path) {
            log::warn!("Failed to remove {}: {e}", tmp_path.display());
        }
    }
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    parquet::file::reader::SerializedFileReader::new(file).is_ok()
}
