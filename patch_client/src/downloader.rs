//! Bounded batch downloader.
//!
//! A session runs at most `max_concurrent` jobs at once. All job futures are
//! polled on the caller's task, so the aggregate counters are plain fields:
//! each completion increments them, then publishes a snapshot.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use patch_shared::{
    error::{DownloadError, NetworkError},
    manifest::{content_hash, ManifestEntry},
    progress::DownloadProgress,
};
use tracing::{debug, info, warn};

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub key: String,
    pub expected_len: u64,
    /// Expected SHA-256 hex digest; empty skips the hash check.
    pub hash: String,
}

impl DownloadJob {
    pub fn new(key: impl Into<String>, expected_len: u64) -> Self {
        Self {
            key: key.into(),
            expected_len,
            hash: String::new(),
        }
    }

    pub fn from_entry(entry: &ManifestEntry) -> Self {
        Self {
            key: entry.name.clone(),
            expected_len: entry.size,
            hash: entry.hash.clone(),
        }
    }

    /// Checks fetched bytes against the expected length and hash.
    pub fn verify(&self, body: &[u8]) -> Result<(), NetworkError> {
        if body.len() as u64 != self.expected_len {
            return Err(NetworkError::Integrity {
                key: self.key.clone(),
                detail: format!("expected {} bytes, got {}", self.expected_len, body.len()),
            });
        }
        if !self.hash.is_empty() && content_hash(body) != self.hash {
            return Err(NetworkError::Integrity {
                key: self.key.clone(),
                detail: "hash mismatch".into(),
            });
        }
        Ok(())
    }
}

/// Performs a single attempt at one job.
#[async_trait]
pub trait JobFetcher: Send + Sync {
    async fn fetch(&self, job: &DownloadJob) -> Result<(), NetworkError>;
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Running,
    Succeeded,
    Failed,
}

/// Retry behaviour for each job.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
    /// Limit for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// A batch of jobs with aggregate counters.
#[derive(Debug)]
pub struct DownloadSession {
    jobs: Vec<DownloadJob>,
    max_concurrent: usize,
    policy: RetryPolicy,
    status: DownloadStatus,
    total_bytes: u64,
    done_bytes: u64,
    total_count: usize,
    done_count: usize,
    failed: Vec<(String, NetworkError)>,
}

impl DownloadSession {
    /// Creates a session. Duplicate keys keep their first occurrence.
    pub fn new(jobs: Vec<DownloadJob>, max_concurrent: usize, max_retries: u32) -> Self {
        Self::with_policy(
            jobs,
            max_concurrent,
            RetryPolicy {
                max_retries,
                ..RetryPolicy::default()
            },
        )
    }

    pub fn with_policy(jobs: Vec<DownloadJob>, max_concurrent: usize, policy: RetryPolicy) -> Self {
        let mut seen = HashSet::new();
        let jobs: Vec<DownloadJob> = jobs
            .into_iter()
            .filter(|j| seen.insert(j.key.clone()))
            .collect();
        let total_bytes = jobs.iter().map(|j| j.expected_len).sum();
        let total_count = jobs.len();
        Self {
            jobs,
            max_concurrent: max_concurrent.max(1),
            policy,
            status: DownloadStatus::Running,
            total_bytes,
            done_bytes: 0,
            total_count,
            done_count: 0,
            failed: Vec::new(),
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status != DownloadStatus::Running
    }

    pub fn jobs(&self) -> &[DownloadJob] {
        &self.jobs
    }

    pub fn failed(&self) -> &[(String, NetworkError)] {
        &self.failed
    }

    pub fn snapshot(&self) -> DownloadProgress {
        DownloadProgress {
            done_bytes: self.done_bytes,
            total_bytes: self.total_bytes,
            done_count: self.done_count,
            total_count: self.total_count,
        }
    }

    /// The session outcome as a result.
    pub fn outcome(&self) -> Result<DownloadProgress, DownloadError> {
        match self.status {
            DownloadStatus::Failed => Err(DownloadError {
                failed: self.failed.clone(),
            }),
            _ => Ok(self.snapshot()),
        }
    }

    /// Runs every job to completion and returns the final status.
    ///
    /// `on_progress` sees one snapshot per finished job, or a single full
    /// snapshot for an empty session.
    pub async fn begin<F>(
        &mut self,
        fetcher: &F,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> DownloadStatus
    where
        F: JobFetcher + ?Sized,
    {
        if self.is_done() {
            return self.status;
        }
        if self.jobs.is_empty() {
            self.status = DownloadStatus::Succeeded;
            on_progress(self.snapshot());
            return self.status;
        }

        info!(
            files = self.total_count,
            bytes = self.total_bytes,
            max_concurrent = self.max_concurrent,
            "Download started"
        );

        let policy = &self.policy;
        let jobs = self.jobs.clone();
        let mut in_flight = stream::iter(jobs.into_iter().map(|job| async move {
            let result = fetch_with_retry(fetcher, &job, policy).await;
            (job, result)
        }))
        .buffer_unordered(self.max_concurrent);

        let mut done_bytes = self.done_bytes;
        let mut done_count = self.done_count;
        let mut failed = Vec::new();
        while let Some((job, result)) = in_flight.next().await {
            done_count += 1;
            match result {
                Ok(()) => {
                    done_bytes += job.expected_len;
                    debug!(key = %job.key, bytes = job.expected_len, "downloaded");
                }
                Err(e) => {
                    warn!(key = %job.key, error = %e, "download failed permanently");
                    failed.push((job.key, e));
                }
            }
            on_progress(DownloadProgress {
                done_bytes,
                total_bytes: self.total_bytes,
                done_count,
                total_count: self.total_count,
            });
        }
        drop(in_flight);

        self.done_bytes = done_bytes;
        self.done_count = done_count;
        self.failed = failed;
        self.status = if self.failed.is_empty() {
            DownloadStatus::Succeeded
        } else {
            DownloadStatus::Failed
        };
        info!(status = ?self.status, failed = self.failed.len(), "Download finished");
        self.status
    }
}

/// Attempts a job once plus up to `max_retries` more times.
async fn fetch_with_retry<F>(
    fetcher: &F,
    job: &DownloadJob,
    policy: &RetryPolicy,
) -> Result<(), NetworkError>
where
    F: JobFetcher + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, fetcher.fetch(job)).await {
            Ok(r) => r,
            Err(_) => Err(NetworkError::Timeout),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                warn!(key = %job.key, attempt, error = %e, "download attempt failed, retrying");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
