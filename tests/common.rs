#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tinyimg::api::{CompressionApi, ResultRecord, UploadResponse};
use tinyimg::error::{Result, TinyImgError};
use tinyimg::files::SelectedFile;
use tinyimg::formats::FormatSet;
use tinyimg::orchestrator::BatchEvent;
use tinyimg::stats::{AggregateStats, StatsDelta, StatsStore};
use tokio::sync::{mpsc, Notify};

pub const FAKE_API: &str = "http://api.test";

#[derive(Debug, Clone, PartialEq)]
pub struct UploadCall {
    pub name: String,
    pub formats: FormatSet,
}

/// Compression service double.
///
/// Every upload shrinks the file to half its size unless told otherwise.
/// Uploads can be held until released, made to fail, or answered with a
/// short body.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<UploadCall>>,
    new_sizes: Mutex<HashMap<String, u64>>,
    failing: Mutex<HashSet<String>>,
    malformed: Mutex<HashSet<String>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    bundle_gate: Mutex<Option<Arc<Notify>>>,
    bundle_requests: Mutex<Vec<Vec<String>>>,
    fetched: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> Vec<UploadCall> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    pub fn set_new_size(&self, name: &str, size: u64) {
        self.new_sizes.lock().unwrap().insert(name.to_string(), size);
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn answer_short(&self, name: &str) {
        self.malformed.lock().unwrap().insert(name.to_string());
    }

    /// Hold the next upload of `name` until the returned gate is notified
    pub fn hold(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn hold_bundle(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.bundle_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn bundle_requests(&self) -> Vec<Vec<String>> {
        self.bundle_requests.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    fn respond(&self, file: &SelectedFile, formats: &FormatSet) -> Result<UploadResponse> {
        if self.failing.lock().unwrap().contains(&file.name) {
            return Err(TinyImgError::RequestFailed("status 500".to_string()));
        }

        let stem = Path::new(&file.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let own_format = file.type_label().replace("jpeg", "jpg");
        let requested: Vec<String> = if formats.is_empty() {
            vec![own_format]
        } else {
            formats.iter().map(|t| t.as_str().to_string()).collect()
        };
        let new_size = self
            .new_sizes
            .lock()
            .unwrap()
            .get(&file.name)
            .copied()
            .unwrap_or(file.size_bytes / 2);

        let mut data: Vec<ResultRecord> = requested
            .iter()
            .map(|format| ResultRecord {
                saved_bytes: file.size_bytes as i64 - new_size as i64,
                new_size,
                time: 5,
                image_url: format!("{}/image?f={}.{}", FAKE_API, stem, format),
                format: format.clone(),
            })
            .collect();
        if self.malformed.lock().unwrap().contains(&file.name) {
            data.pop();
        }
        let files = data.iter().map(|r| r.image_url.clone()).collect();
        Ok(UploadResponse {
            data,
            files,
            errors: Vec::new(),
        })
    }
}

impl CompressionApi for FakeApi {
    async fn upload(&self, file: &SelectedFile, formats: &FormatSet) -> Result<UploadResponse> {
        self.calls.lock().unwrap().push(UploadCall {
            name: file.name.clone(),
            formats: formats.clone(),
        });
        let gate = self.held.lock().unwrap().remove(&file.name);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.respond(file, formats)
    }

    async fn download_bundle(&self, artifacts: &[String]) -> Result<Vec<u8>> {
        self.bundle_requests.lock().unwrap().push(artifacts.to_vec());
        let gate = self.bundle_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(format!("PK zip of {} files", artifacts.len()).into_bytes())
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        Ok(format!("bytes of {}", url).into_bytes())
    }
}

/// Stats store whose updates always fail
#[derive(Default)]
pub struct FailingStatsStore {
    attempts: AtomicUsize,
}

impl FailingStatsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl StatsStore for FailingStatsStore {
    async fn get(&self) -> Result<AggregateStats> {
        Err(TinyImgError::StatsUpdateFailed("store offline".to_string()))
    }

    async fn add(&self, _delta: StatsDelta) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TinyImgError::StatsUpdateFailed("store offline".to_string()))
    }
}

pub fn image(name: &str, size: usize) -> SelectedFile {
    SelectedFile::from_bytes(name, vec![0u8; size])
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn create_test_image_files(temp_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for (name, data) in [
        ("test.jpg", &b"fake jpg data"[..]),
        ("test.png", b"fake png data"),
        ("test.webp", b"fake webp data"),
        ("test.txt", b"not an image"),
    ] {
        let path = temp_dir.join(name);
        File::create(&path).unwrap().write_all(data).unwrap();
        files.push(path);
    }

    files
}

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}
