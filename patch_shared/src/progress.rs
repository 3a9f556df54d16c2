//! Download progress snapshots and their presentation.

use serde::{Deserialize, Serialize};

/// Aggregate counters of a download session at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub done_bytes: u64,
    pub total_bytes: u64,
    pub done_count: usize,
    pub total_count: usize,
}

impl DownloadProgress {
    /// Completion in [0, 1]. An empty session counts as complete.
    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            if self.done_count >= self.total_count {
                1.0
            } else {
                0.0
            }
        } else {
            (self.done_bytes as f64 / self.total_bytes as f64).min(1.0)
        }
    }

    /// e.g. `42.50%`.
    pub fn percent_text(&self) -> String {
        format!("{:.2}%", self.ratio() * 100.0)
    }

    /// e.g. `1.50 MB/3.00 MB`.
    pub fn bytes_text(&self) -> String {
        format!("{}/{}", format_bytes(self.done_bytes), format_bytes(self.total_bytes))
    }
}

/// Receives progress snapshots while content downloads.
///
/// May be called zero or many times; snapshots never go backwards.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, progress: DownloadProgress);

    /// Called instead of progress when there is nothing to download.
    fn on_nothing_to_download(&mut self) {}
}

/// Formats a byte count as `B`, `KB` or `MB`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}
