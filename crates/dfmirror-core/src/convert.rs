//! CSV → Parquet conversion with inferred column types

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::error::ArrowError;

use crate::archive::with_suffix;
use crate::sink::ParquetSink;

/// Rows per record batch read from the CSV
const BATCH_SIZE: usize = 8192;

/// Error from parsing the CSV or writing the parquet file
#[derive(Debug)]
pub enum ConvertError {
    Io(io::Error),
    /// Malformed CSV: bad quoting, inconsistent field counts, unparseable values
    Parse(ArrowError),
    /// No header row to take column names from
    MissingHeader,
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Parse(e) => write!(f, "CSV: {e}"),
            Self::MissingHeader => write!(f, "CSV: missing header row"),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::MissingHeader => None,
        }
    }
}

impl From<io::Error> for ConvertError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArrowError> for ConvertError {
    fn from(e: ArrowError) -> Self {
        Self::Parse(e)
    }
}

/// Statistics from a completed conversion
#[derive(Debug, Clone)]
pub struct ConvertStats {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Parse `src` as CSV with a header row and write `{output_base}.parquet`.
///
/// Column types are inferred from every record in the file, then the file is
/// read again in batches. The target path is only replaced on success.
pub fn convert_to_parquet(src: &Path, output_base: &Path) -> Result<ConvertStats, ConvertError> {
    let format = Format::default().with_header(true);

    let mut file = File::open(src)?;
    let (schema, records) = format.infer_schema(&mut file, None)?;
    if schema.fields().is_empty() {
        return Err(ConvertError::MissingHeader);
    }
    log::debug!(
        "Inferred {} columns from {records} records: {:?}",
        schema.fields().len(),
        schema
            .fields()
            .iter()
            .map(|f| format!("{}: {}", f.name(), f.data_type()))
            .collect::<Vec<_>>()
    );
    file.seek(SeekFrom::Start(0))?;

    let columns = schema.fields().len();
    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(BATCH_SIZE)
        .build(file)?;

    let path = with_suffix(output_base, "parquet");
    let mut sink = ParquetSink::new(&path, &schema)?;

    for batch in reader {
        let written = batch
            .map_err(ConvertError::from)
            .and_then(|b| sink.write_batch(&b).map_err(ConvertError::from));
        if let Err(e) = written {
            sink.abandon();
            return Err(e);
        }
    }

    let rows = sink.finalize()?;
    Ok(ConvertStats {
        path,
        rows,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, RecordBatch, StringArray};
    use arrow::datatypes::DataType;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn read_parquet(path: &Path) -> Vec<RecordBatch> {
        let file = File::open(path).unwrap();
        ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn convert_text(dir: &TempDir, text: &str) -> Result<ConvertStats, ConvertError> {
        let src = dir.path().join("payload.csv");
        std::fs::write(&src, text).unwrap();
        convert_to_parquet(&src, &dir.path().join("ds1"))
    }

    #[test]
    fn integer_columns_inferred() {
        let dir = TempDir::new().unwrap();
        let stats = convert_text(&dir, "a,b\n1,2\n3,4\n").unwrap();

        assert_eq!(stats.path, dir.path().join("ds1.parquet"));
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.columns, 2);

        let batches = read_parquet(&stats.path);
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        let schema = batch.schema();
        assert_eq!(schema.field(0).name(), "a");
        assert_eq!(schema.field(1).name(), "b");
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);

        let a = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        let b = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(a.values().to_vec(), vec![1, 3]);
        assert_eq!(b.values().to_vec(), vec![2, 4]);
    }

    #[test]
    fn rows_reserialize_to_same_csv() {
        let dir = TempDir::new().unwrap();
        let text = "a,b\n1,2\n3,4\n";
        let stats = convert_text(&dir, text).unwrap();

        let mut out = Vec::new();
        {
            let mut writer = arrow::csv::Writer::new(&mut out);
            for batch in read_parquet(&stats.path) {
                writer.write(&batch).unwrap();
            }
        }
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }

    #[test]
    fn mixed_types_and_nulls() {
        let dir = TempDir::new().unwrap();
        let stats = convert_text(
            &dir,
            "REF_AREA,TIME_PERIOD,OBS_VALUE\nFRA,2020,1.5\nDEU,2021,\nITA,2022,3\n",
        )
        .unwrap();

        let batches = read_parquet(&stats.path);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 3);

        let area = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(area.value(2), "ITA");

        let value = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(value.value(0), 1.5);
        assert!(value.is_null(1));
        assert_eq!(value.value(2), 3.0);
    }

    #[test]
    fn inconsistent_field_count_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let result = convert_text(&dir, "a,b\n1,2\n3\n");

        assert!(result.is_err());
        assert!(!dir.path().join("ds1.parquet").exists());
        assert!(!dir.path().join("ds1.parquet.tmp").exists());
    }

    #[test]
    fn empty_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(convert_text(&dir, "").is_err());
        assert!(!dir.path().join("ds1.parquet").exists());
    }

    #[test]
    fn failed_conversion_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ds1.parquet"), b"previous").unwrap();

        assert!(convert_text(&dir, "a,b\n1,2\n3\n").is_err());
        assert_eq!(
            std::fs::read(dir.path().join("ds1.parquet")).unwrap(),
            b"previous"
        );
    }

    #[test]
    fn display_missing_header() {
        assert_eq!(
            format!("{}", ConvertError::MissingHeader),
            "CSV: missing header row"
        );
    }
}
