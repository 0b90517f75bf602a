//! Drives one batch of files through the compression service.
//!
//! Every file gets its own task per batch generation. A generation ends
//! whenever the file selection or the format set changes; responses that
//! arrive for an older generation are dropped without touching the new state.
//! Whether "download all" is available is recomputed from the recorded results
//! on every read, never cached.

use crate::api::{CompressionApi, CompressionResult};
use crate::constants::{MAX_BATCH_FILES, MAX_FILE_SIZE};
use crate::error::{Result, TinyImgError};
use crate::files::SelectedFile;
use crate::formats::FormatSet;
use crate::stats::{StatsDelta, StatsStore};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Why a file produced no results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFailure {
    FileTooLarge { size: u64, limit: u64 },
    RequestFailed(String),
    MalformedResponse(String),
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFailure::FileTooLarge { size, limit } => {
                write!(f, "file is {} bytes, limit is {} bytes", size, limit)
            }
            FileFailure::RequestFailed(msg) => write!(f, "request failed: {}", msg),
            FileFailure::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl From<TinyImgError> for FileFailure {
    fn from(err: TinyImgError) -> Self {
        match err {
            TinyImgError::FileTooLarge(size, limit) => FileFailure::FileTooLarge { size, limit },
            TinyImgError::MalformedResponse(msg) => FileFailure::MalformedResponse(msg),
            TinyImgError::RequestFailed(msg) => FileFailure::RequestFailed(msg),
            other => FileFailure::RequestFailed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileState {
    Idle,
    Compressing,
    Completed(Vec<CompressionResult>),
    Failed(FileFailure),
}

impl FileState {
    pub fn results(&self) -> &[CompressionResult] {
        match self {
            FileState::Completed(results) => results,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileItem {
    pub file: SelectedFile,
    pub state: FileState,
}

/// Limits the client enforces before sending anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_file_size: u64,
    pub max_files: Option<usize>,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_files: Some(MAX_BATCH_FILES),
        }
    }
}

/// A compression request to issue for one file of one generation
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub generation: u64,
    pub index: usize,
    pub file: SelectedFile,
    pub formats: FormatSet,
}

/// Bookkeeping for the active batch
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    generation: u64,
    items: Vec<FileItem>,
    formats: FormatSet,
    artifacts: Vec<String>,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[FileItem] {
        &self.items
    }

    pub fn formats(&self) -> &FormatSet {
        &self.formats
    }

    /// Artifact URLs across all files and formats, in arrival order
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn expected_results(&self) -> usize {
        self.items.len() * self.formats.results_per_file()
    }

    pub fn recorded_results(&self) -> usize {
        self.items.iter().map(|item| item.state.results().len()).sum()
    }

    /// True exactly when every file has recorded a result for every format
    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.recorded_results() == self.expected_results()
    }

    /// Replace the selection and start a new generation
    pub fn replace_files(&mut self, files: Vec<SelectedFile>, limits: &BatchLimits) -> Vec<Dispatch> {
        self.items = files
            .into_iter()
            .map(|file| FileItem {
                file,
                state: FileState::Idle,
            })
            .collect();
        self.restart(limits)
    }

    /// Replace the formats; prior results are discarded and every file is requested again
    pub fn replace_formats(&mut self, formats: FormatSet, limits: &BatchLimits) -> Vec<Dispatch> {
        self.formats = formats;
        self.restart(limits)
    }

    fn restart(&mut self, limits: &BatchLimits) -> Vec<Dispatch> {
        self.generation += 1;
        self.artifacts.clear();

        let mut dispatches = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            if item.file.size_bytes > limits.max_file_size {
                item.state = FileState::Failed(FileFailure::FileTooLarge {
                    size: item.file.size_bytes,
                    limit: limits.max_file_size,
                });
                continue;
            }
            item.state = FileState::Compressing;
            dispatches.push(Dispatch {
                generation: self.generation,
                index,
                file: item.file.clone(),
                formats: self.formats.clone(),
            });
        }
        dispatches
    }

    fn current_item(&mut self, generation: u64, index: usize) -> Option<&mut FileItem> {
        if generation != self.generation {
            return None;
        }
        self.items
            .get_mut(index)
            .filter(|item| item.state == FileState::Compressing)
    }

    /// Record a successful response. Returns `false` for a stale response,
    /// which leaves the state untouched.
    pub fn record_success(
        &mut self,
        generation: u64,
        index: usize,
        results: Vec<CompressionResult>,
    ) -> bool {
        let Some(item) = self.current_item(generation, index) else {
            return false;
        };
        let urls: Vec<String> = results.iter().map(|r| r.artifact_url.clone()).collect();
        item.state = FileState::Completed(results);
        self.artifacts.extend(urls);
        true
    }

    /// Record a failed request. Returns `false` for a stale response.
    pub fn record_failure(&mut self, generation: u64, index: usize, failure: FileFailure) -> bool {
        let Some(item) = self.current_item(generation, index) else {
            return false;
        };
        item.state = FileState::Failed(failure);
        true
    }
}

/// Progress notifications for whoever renders the batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        generation: u64,
        files: usize,
        expected_results: usize,
    },
    FileCompleted {
        generation: u64,
        index: usize,
        results: usize,
    },
    FileFailed {
        generation: u64,
        index: usize,
        failure: FileFailure,
    },
    StaleResponseIgnored {
        generation: u64,
        index: usize,
    },
    BatchReady {
        generation: u64,
        artifacts: usize,
    },
}

/// Per-generation progress as seen through the event stream.
///
/// Events from a generation older than the latest `Started` are dropped, so a
/// response accepted just before a restart never counts toward the new batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    generation: u64,
    files: usize,
    finished: usize,
    ready: bool,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn files(&self) -> usize {
        self.files
    }

    /// Files that completed or failed in the current generation
    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Fold one event in. Returns `false` when the event was dropped.
    pub fn apply(&mut self, event: &BatchEvent) -> bool {
        match *event {
            BatchEvent::Started {
                generation, files, ..
            } => {
                if generation <= self.generation {
                    return false;
                }
                *self = Self {
                    generation,
                    files,
                    finished: 0,
                    ready: false,
                };
                true
            }
            BatchEvent::FileCompleted { generation, .. }
            | BatchEvent::FileFailed { generation, .. } => {
                if generation != self.generation {
                    return false;
                }
                self.finished += 1;
                true
            }
            BatchEvent::BatchReady { generation, .. } => {
                if generation != self.generation {
                    return false;
                }
                self.ready = true;
                true
            }
            BatchEvent::StaleResponseIgnored { .. } => false,
        }
    }
}

struct Shared<A, S> {
    api: Arc<A>,
    stats: Arc<S>,
    state: Mutex<BatchState>,
    stats_tasks: Mutex<Vec<JoinHandle<()>>>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl<A, S> Shared<A, S> {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // Nobody listening is fine
            let _ = tx.send(event);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Orchestrator<A, S> {
    shared: Arc<Shared<A, S>>,
    limits: BatchLimits,
    file_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: CompressionApi, S: StatsStore> Orchestrator<A, S> {
    pub fn new(api: Arc<A>, stats: Arc<S>, limits: BatchLimits) -> Self {
        Self::build(api, stats, limits, None)
    }

    pub fn with_events(
        api: Arc<A>,
        stats: Arc<S>,
        limits: BatchLimits,
        events: mpsc::UnboundedSender<BatchEvent>,
    ) -> Self {
        Self::build(api, stats, limits, Some(events))
    }

    fn build(
        api: Arc<A>,
        stats: Arc<S>,
        limits: BatchLimits,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                stats,
                state: Mutex::new(BatchState::new()),
                stats_tasks: Mutex::new(Vec::new()),
                events,
            }),
            limits,
            file_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    /// Start a new batch for `files`, discarding the previous one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn select_files(&self, files: Vec<SelectedFile>) -> Result<()> {
        if let Some(max_files) = self.limits.max_files {
            if files.len() > max_files {
                return Err(TinyImgError::BatchFileLimitExceeded(files.len(), max_files));
            }
        }
        let limits = self.limits;
        self.restart(|state| state.replace_files(files, &limits));
        Ok(())
    }

    /// Switch the format set. In-flight requests keep running but their
    /// responses will be ignored; every file is requested again.
    pub fn set_formats(&self, formats: FormatSet) {
        crate::verbose!("Formats changed to {}, restarting batch", formats);
        let limits = self.limits;
        self.restart(|state| state.replace_formats(formats, &limits));
    }

    /// Adopt the receiver's current selection, then restart the batch on
    /// every selection it observes
    pub fn follow_formats(self: &Arc<Self>, mut rx: watch::Receiver<FormatSet>) -> JoinHandle<()> {
        let current = rx.borrow_and_update().clone();
        let differs = *lock(&self.shared.state).formats() != current;
        if differs {
            self.set_formats(current);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let formats = rx.borrow_and_update().clone();
                this.set_formats(formats);
            }
        })
    }

    fn restart(&self, reset: impl FnOnce(&mut BatchState) -> Vec<Dispatch>) {
        let (dispatches, generation, files, expected_results, rejected) = {
            let mut state = lock(&self.shared.state);
            let dispatches = reset(&mut *state);
            // Files over the size limit fail during the reset, without a task
            let rejected: Vec<(usize, String, FileFailure)> = state
                .items()
                .iter()
                .enumerate()
                .filter_map(|(index, item)| match &item.state {
                    FileState::Failed(failure) => {
                        Some((index, item.file.name.clone(), failure.clone()))
                    }
                    _ => None,
                })
                .collect();
            (
                dispatches,
                state.generation(),
                state.items().len(),
                state.expected_results(),
                rejected,
            )
        };

        self.shared.emit(BatchEvent::Started {
            generation,
            files,
            expected_results,
        });
        for (index, name, failure) in rejected {
            crate::warn!("Skipping {}: {}", name, failure);
            self.shared.emit(BatchEvent::FileFailed {
                generation,
                index,
                failure,
            });
        }

        let mut tasks = lock(&self.file_tasks);
        tasks.retain(|handle| !handle.is_finished());
        for dispatch in dispatches {
            let shared = Arc::clone(&self.shared);
            tasks.push(tokio::spawn(compress_file(shared, dispatch)));
        }
    }

    /// Wait until every file task issued so far, including any started while
    /// waiting, has finished
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *lock(&self.file_tasks));
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    crate::error!("Compression task ended abnormally: {}", e);
                }
            }
        }
    }

    /// Let pending stats updates reach the store before the process exits.
    /// Their outcome was already logged by the task itself.
    pub async fn flush_stats(&self) {
        let handles = std::mem::take(&mut *lock(&self.shared.stats_tasks));
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Handles still held for `settle` and `flush_stats`, as (file, stats).
    /// Finished tasks are dropped whenever new ones are spawned.
    pub fn tracked_tasks(&self) -> (usize, usize) {
        (
            lock(&self.file_tasks).len(),
            lock(&self.shared.stats_tasks).len(),
        )
    }

    pub fn snapshot(&self) -> BatchState {
        lock(&self.shared.state).clone()
    }

    pub fn can_download_all(&self) -> bool {
        lock(&self.shared.state).is_complete()
    }

    pub fn artifacts(&self) -> Vec<String> {
        lock(&self.shared.state).artifacts().to_vec()
    }
}

async fn compress_file<A: CompressionApi, S: StatsStore>(shared: Arc<Shared<A, S>>, dispatch: Dispatch) {
    let Dispatch {
        generation,
        index,
        file,
        formats,
    } = dispatch;
    crate::verbose!("Uploading {} ({} bytes) as {}", file.name, file.size_bytes, formats);

    let outcome = match shared.api.upload(&file, &formats).await {
        Ok(response) => response.into_results(&formats),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(results) => {
            let delta = StatsDelta::from_results(&results);
            let count = results.len();
            let (accepted, ready, artifacts) = {
                let mut state = lock(&shared.state);
                let accepted = state.record_success(generation, index, results);
                (accepted, accepted && state.is_complete(), state.artifacts().len())
            };
            if !accepted {
                crate::verbose!("Ignoring stale response for {}", file.name);
                shared.emit(BatchEvent::StaleResponseIgnored { generation, index });
                return;
            }

            shared.emit(BatchEvent::FileCompleted {
                generation,
                index,
                results: count,
            });
            if ready {
                shared.emit(BatchEvent::BatchReady {
                    generation,
                    artifacts,
                });
            }

            let stats = Arc::clone(&shared.stats);
            let handle = tokio::spawn(async move {
                if let Err(e) = stats.add(delta).await {
                    crate::warn!("Stats update failed: {}", e);
                }
            });
            let mut stats_tasks = lock(&shared.stats_tasks);
            stats_tasks.retain(|handle| !handle.is_finished());
            stats_tasks.push(handle);
        }
        Err(e) => {
            let failure = FileFailure::from(e);
            let accepted = lock(&shared.state).record_failure(generation, index, failure.clone());
            if !accepted {
                crate::verbose!("Ignoring stale failure for {}: {}", file.name, failure);
                shared.emit(BatchEvent::StaleResponseIgnored { generation, index });
                return;
            }
            crate::error!("Failed to compress {}: {}", file.name, failure);
            shared.emit(BatchEvent::FileFailed {
                generation,
                index,
                failure,
            });
        }
    }
}
