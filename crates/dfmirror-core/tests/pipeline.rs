//! End-to-end tests for dfmirror-core
//!
//! Runs the whole job against a local wiremock server and an in-memory bucket.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{Array, Int64Array};
use dfmirror_core::{JobError, JobParams, ProgressContext, Publisher, RunConfig, process_with};
use futures_util::TryStreamExt;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CSV: &str = "a,b\n1,2\n3,4\n";

struct Harness {
    server: MockServer,
    rt: tokio::runtime::Runtime,
    store: Arc<InMemory>,
    out: TempDir,
    work: TempDir,
}

impl Harness {
    fn new() -> Self {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("Failed to build runtime");
        let server = rt.block_on(MockServer::start());
        Self {
            server,
            rt,
            store: Arc::new(InMemory::new()),
            out: TempDir::new().expect("Failed to create temp dir"),
            work: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn mount(&self, route: &str, response: ResponseTemplate) {
        self.rt.block_on(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(&self.server),
        );
    }

    fn params(&self, route: &str) -> JobParams {
        JobParams {
            dataflow_url: format!("{}{route}", self.server.uri()),
            s3_bucket: "my-bucket".to_string(),
            filename: "ds1".to_string(),
        }
    }

    fn config(&self) -> RunConfig {
        RunConfig {
            output_dir: self.out.path().to_path_buf(),
            temp_dir: Some(self.work.path().to_path_buf()),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn run(&self, route: &str) -> Result<dfmirror_core::Summary, JobError> {
        let publisher = Publisher::new(self.store.clone(), "my-bucket");
        process_with(
            &self.params(route),
            &self.config(),
            &publisher,
            &ProgressContext::hidden(),
        )
    }

    fn output(&self, name: &str) -> PathBuf {
        self.out.path().join(name)
    }

    fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.rt.block_on(async {
            let result = self.store.get(&ObjectPath::from(key)).await.ok()?;
            result.bytes().await.ok().map(|b| b.to_vec())
        })
    }

    fn stored_keys(&self) -> Vec<String> {
        self.rt.block_on(async {
            let mut keys: Vec<String> = self
                .store
                .list(None)
                .map_ok(|meta| meta.location.to_string())
                .try_collect()
                .await
                .expect("Failed to list store");
            keys.sort();
            keys
        })
    }

    fn workspace_is_gone(&self) -> bool {
        fs::read_dir(self.work.path())
            .expect("Failed to read work dir")
            .next()
            .is_none()
    }
}

fn zip_entry(path: &Path) -> (String, Vec<u8>) {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    assert_eq!(archive.len(), 1, "archive should have a single entry");
    let mut entry = archive.by_index(0).unwrap();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    (entry.name().to_string(), content)
}

fn parquet_columns(path: &Path) -> Vec<Vec<i64>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let mut columns: Vec<Vec<i64>> = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        columns.resize(batch.num_columns(), Vec::new());
        for (i, column) in batch.columns().iter().enumerate() {
            let values = column.as_any().downcast_ref::<Int64Array>().unwrap();
            assert_eq!(values.null_count(), 0);
            columns[i].extend(values.values().iter().copied());
        }
    }
    columns
}

#[test]
fn mirrors_csv_to_zip_and_parquet() {
    let h = Harness::new();
    h.mount("/data/ds1.csv", ResponseTemplate::new(200).set_body_string(CSV));

    let summary = h.run("/data/ds1.csv").expect("Job should succeed");

    assert_eq!(summary.bucket, "my-bucket");
    assert_eq!(summary.download.bytes, CSV.len() as u64);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.columns, 2);
    assert!(summary.archive.uploaded && summary.parquet.uploaded);

    // Exactly the two artifacts, no tmp leftovers
    let mut names: Vec<String> = fs::read_dir(h.out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["ds1.parquet", "ds1.zip"]);

    let (entry_name, content) = zip_entry(&h.output("ds1.zip"));
    assert_eq!(entry_name, "ds1.csv");
    assert_eq!(content, CSV.as_bytes());

    assert_eq!(
        parquet_columns(&h.output("ds1.parquet")),
        vec![vec![1, 3], vec![2, 4]]
    );

    assert_eq!(h.stored_keys(), vec!["ds1.parquet", "ds1.zip"]);
    assert_eq!(
        h.stored("ds1.zip").unwrap(),
        fs::read(h.output("ds1.zip")).unwrap()
    );
    assert_eq!(
        h.stored("ds1.parquet").unwrap(),
        fs::read(h.output("ds1.parquet")).unwrap()
    );

    assert!(h.workspace_is_gone());
}

#[test]
fn not_found_aborts_before_any_artifact() {
    let h = Harness::new();
    h.mount("/missing", ResponseTemplate::new(404));
    // Leftovers from an earlier run must not survive as if fresh
    fs::write(h.output("ds1.zip"), b"stale").unwrap();
    fs::write(h.output("ds1.parquet"), b"stale").unwrap();

    let err = h.run("/missing").expect_err("Job should fail");

    assert_eq!(err.http_status(), Some(404), "{err}");
    assert!(!h.output("ds1.zip").exists());
    assert!(!h.output("ds1.parquet").exists());
    assert!(h.stored_keys().is_empty());
    assert!(h.workspace_is_gone());
}

#[test]
fn server_error_is_fatal() {
    let h = Harness::new();
    h.mount("/boom", ResponseTemplate::new(503));

    let err = h.run("/boom").expect_err("Job should fail");

    assert!(matches!(err, JobError::Transfer(_)));
    assert_eq!(err.http_status(), Some(503));
    assert!(h.stored_keys().is_empty());
    assert!(h.workspace_is_gone());
}

#[test]
fn stalled_response_times_out() {
    let h = Harness::new();
    h.mount(
        "/slow",
        ResponseTemplate::new(200)
            .set_body_string(CSV)
            .set_delay(Duration::from_secs(3)),
    );
    let publisher = Publisher::new(h.store.clone(), "my-bucket");
    let config = RunConfig {
        timeout: Duration::from_millis(500),
        ..h.config()
    };

    let err = process_with(
        &h.params("/slow"),
        &config,
        &publisher,
        &ProgressContext::hidden(),
    )
    .expect_err("Job should time out");

    assert!(
        matches!(err, JobError::Transfer(dfmirror_core::StreamError::Timeout(_))),
        "{err}"
    );
    assert!(h.workspace_is_gone());
}

#[test]
fn malformed_csv_fails_without_upload() {
    let h = Harness::new();
    h.mount(
        "/ragged.csv",
        ResponseTemplate::new(200).set_body_string("a,b\n1,2\n3\n"),
    );

    let err = h.run("/ragged.csv").expect_err("Job should fail");

    assert!(matches!(err, JobError::Convert(_)), "{err}");
    assert!(!h.output("ds1.parquet").exists());
    assert!(h.stored_keys().is_empty());
    assert!(h.workspace_is_gone());
}

#[test]
fn gzip_encoded_body_is_decoded() {
    let h = Harness::new();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(CSV.as_bytes()).unwrap();
    let gzipped = encoder.finish().unwrap();
    h.mount(
        "/gz",
        ResponseTemplate::new(200)
            .insert_header("Content-Encoding", "gzip")
            .set_body_bytes(gzipped),
    );

    let summary = h.run("/gz").expect("Job should succeed");

    assert!(summary.download.content_encoding.is_none());
    let (_, content) = zip_entry(&h.output("ds1.zip"));
    assert_eq!(content, CSV.as_bytes());
    assert_eq!(summary.rows, 2);
}

#[test]
fn upload_failure_is_fatal_after_both_attempts() {
    let h = Harness::new();
    h.mount("/data.csv", ResponseTemplate::new(200).set_body_string(CSV));

    // A store rooted at a regular file cannot create any object
    let blocker = h.work.path().join("not-a-dir");
    fs::write(&blocker, b"").unwrap();
    let store = object_store::local::LocalFileSystem::new_with_prefix(&blocker).unwrap();
    let publisher = Publisher::new(Arc::new(store), "my-bucket");
    let config = RunConfig {
        temp_dir: Some(h.work.path().join("jobs")),
        ..h.config()
    };

    let err = process_with(
        &h.params("/data.csv"),
        &config,
        &publisher,
        &ProgressContext::hidden(),
    )
    .expect_err("Job should fail");

    match err {
        JobError::Upload(keys) => assert_eq!(keys, vec!["ds1.zip", "ds1.parquet"]),
        other => panic!("expected upload error, got {other}"),
    }
    // Artifacts stay on disk for inspection
    assert!(h.output("ds1.zip").exists());
    assert!(h.output("ds1.parquet").exists());
    assert!(
        fs::read_dir(h.work.path().join("jobs"))
            .unwrap()
            .next()
            .is_none()
    );
}
