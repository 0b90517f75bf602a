use crate::api::CompressionResult;
use crate::constants::STATS_PATH;
use crate::error::{Result, TinyImgError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;

/// Cumulative totals kept by the stats store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_files: u64,
    pub total_size: i64,
}

/// Additive update sent after a file completes. Same wire shape as the totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDelta {
    pub total_files: u64,
    pub total_size: i64,
}

impl StatsDelta {
    /// One count per returned result, bytes summed across them
    pub fn from_results(results: &[CompressionResult]) -> Self {
        Self {
            total_files: results.len() as u64,
            total_size: results.iter().map(|r| r.saved_bytes).sum(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[allow(dead_code)]
    message: String,
}

/// Persisted counter of files converted and bytes saved.
///
/// Implementations apply `add` atomically; callers never read before writing.
pub trait StatsStore: Send + Sync + 'static {
    fn get(&self) -> impl Future<Output = Result<AggregateStats>> + Send;

    fn add(&self, delta: StatsDelta) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpStatsStore {
    client: reqwest::Client,
    stats_url: String,
}

impl HttpStatsStore {
    pub fn new(site_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            stats_url: format!("{}{}", site_url.trim_end_matches('/'), STATS_PATH),
        }
    }

    pub fn stats_url(&self) -> &str {
        &self.stats_url
    }
}

impl StatsStore for HttpStatsStore {
    async fn get(&self) -> Result<AggregateStats> {
        let response = self
            .client
            .get(&self.stats_url)
            .send()
            .await
            .map_err(|e| TinyImgError::RequestFailed(format!("Failed to read stats: {}", e)))?;

        if !response.status().is_success() {
            return Err(TinyImgError::RequestFailed(format!(
                "Stats read failed with status {}",
                response.status()
            )));
        }

        response
            .json::<AggregateStats>()
            .await
            .map_err(|e| TinyImgError::MalformedResponse(e.to_string()))
    }

    async fn add(&self, delta: StatsDelta) -> Result<()> {
        let response = self
            .client
            .post(&self.stats_url)
            .json(&delta)
            .send()
            .await
            .map_err(|e| TinyImgError::StatsUpdateFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TinyImgError::StatsUpdateFailed(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<Ack>()
            .await
            .map_err(|e| TinyImgError::StatsUpdateFailed(e.to_string()))?;
        Ok(())
    }
}

/// In-process store; each update is applied under one lock
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    totals: Mutex<AggregateStats>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals(totals: AggregateStats) -> Self {
        Self {
            totals: Mutex::new(totals),
        }
    }

    pub fn totals(&self) -> AggregateStats {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatsStore for MemoryStatsStore {
    async fn get(&self) -> Result<AggregateStats> {
        Ok(self.totals())
    }

    async fn add(&self, delta: StatsDelta) -> Result<()> {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        totals.total_files += delta.total_files;
        totals.total_size += delta.total_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn result(saved: i64) -> CompressionResult {
        CompressionResult {
            saved_bytes: saved,
            new_size_bytes: 100,
            elapsed_ms: 1,
            artifact_url: "u".into(),
            format: "png".into(),
        }
    }

    #[test]
    fn test_delta_from_results() {
        let delta = StatsDelta::from_results(&[result(500)]);
        assert_eq!(
            delta,
            StatsDelta {
                total_files: 1,
                total_size: 500
            }
        );

        let delta = StatsDelta::from_results(&[result(300), result(-100), result(0)]);
        assert_eq!(delta.total_files, 3);
        assert_eq!(delta.total_size, 200);
    }

    #[test]
    fn test_delta_wire_shape() {
        let json = serde_json::to_string(&StatsDelta {
            total_files: 1,
            total_size: 500,
        })
        .unwrap();
        assert_eq!(json, r#"{"totalFiles":1,"totalSize":500}"#);
    }

    #[test]
    fn test_aggregate_stats_parse() {
        let stats: AggregateStats =
            serde_json::from_str(r#"{"totalFiles":42,"totalSize":123456}"#).unwrap();
        assert_eq!(stats.total_files, 42);
        assert_eq!(stats.total_size, 123456);
    }

    #[test]
    fn test_http_stats_url() {
        let store = HttpStatsStore::new("https://tinyimg.example/");
        assert_eq!(store.stats_url(), "https://tinyimg.example/api/stats");
    }

    #[tokio::test]
    async fn test_memory_store_accumulates() {
        let store = MemoryStatsStore::with_totals(AggregateStats {
            total_files: 10,
            total_size: 1000,
        });
        store
            .add(StatsDelta {
                total_files: 2,
                total_size: 50,
            })
            .await
            .unwrap();
        assert_eq!(
            store.get().await.unwrap(),
            AggregateStats {
                total_files: 12,
                total_size: 1050
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_store_concurrent_updates() {
        let store = Arc::new(MemoryStatsStore::new());
        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(StatsDelta {
                        total_files: 1,
                        total_size: 7,
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.totals().total_files, 100);
        assert_eq!(store.totals().total_size, 700);
    }
}
