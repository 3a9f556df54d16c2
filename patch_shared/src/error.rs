//! Error taxonomy for the boot pipeline.
//!
//! Every component returns one of these as a typed result. Only the client
//! orchestrator maps them to a retry, a strategy downgrade or an abort.

use std::fmt;

/// Failure talking to the content host, or a timeout standing in for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The strategy has no remote or local authority to ask.
    Unavailable(String),
    /// Could not connect or the connection dropped.
    Connection(String),
    /// The host answered that the path does not exist.
    NotFound(String),
    /// The host answered with something unexpected.
    Protocol(String),
    /// Downloaded bytes did not match the manifest entry.
    Integrity { key: String, detail: String },
    /// Writing fetched content to local storage failed.
    Storage(String),
    /// A suspension point exceeded its timeout.
    Timeout,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Unavailable(m) => write!(f, "no content authority available: {m}"),
            NetworkError::Connection(m) => write!(f, "connection failed: {m}"),
            NetworkError::NotFound(p) => write!(f, "not found on host: {p}"),
            NetworkError::Protocol(m) => write!(f, "protocol error: {m}"),
            NetworkError::Integrity { key, detail } => {
                write!(f, "integrity check failed for {key}: {detail}")
            }
            NetworkError::Storage(m) => write!(f, "local storage error: {m}"),
            NetworkError::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Package initialization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    InvalidConfig(String),
    Storage(String),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::InvalidConfig(m) => write!(f, "invalid boot config: {m}"),
            InitError::Storage(m) => write!(f, "package storage unavailable: {m}"),
        }
    }
}

impl std::error::Error for InitError {}

/// Manifest fetch or validation failure. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    Fetch(NetworkError),
    Parse(String),
    PackageMismatch { expected: String, found: String },
    VersionMismatch { expected: String, found: String },
    DuplicateEntry(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Fetch(e) => write!(f, "manifest fetch failed: {e}"),
            ManifestError::Parse(m) => write!(f, "manifest is malformed: {m}"),
            ManifestError::PackageMismatch { expected, found } => {
                write!(f, "manifest belongs to package {found}, expected {expected}")
            }
            ManifestError::VersionMismatch { expected, found } => {
                write!(f, "manifest has version {found}, expected {expected}")
            }
            ManifestError::DuplicateEntry(name) => {
                write!(f, "manifest lists {name} more than once")
            }
        }
    }
}

impl std::error::Error for ManifestError {}

impl From<NetworkError> for ManifestError {
    fn from(e: NetworkError) -> Self {
        ManifestError::Fetch(e)
    }
}

/// A download session ended with permanently failed jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadError {
    /// Failed keys with the error from their last attempt.
    pub failed: Vec<(String, NetworkError)>,
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} file(s) failed to download", self.failed.len())?;
        if let Some((key, err)) = self.failed.first() {
            write!(f, " (first: {key}: {err})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DownloadError {}

/// Per-module metadata patch failure. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPatchError {
    /// The module image was not staged; an empty payload was handed over.
    AssetMissing(String),
    /// The patcher refused the image.
    Rejected { module: String, reason: String },
}

impl fmt::Display for MetadataPatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataPatchError::AssetMissing(m) => {
                write!(f, "metadata image {m} was not staged (patched with empty payload)")
            }
            MetadataPatchError::Rejected { module, reason } => {
                write!(f, "metadata patch for {module} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for MetadataPatchError {}

/// Dynamic module load failure. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyLoadError {
    /// The module bytes were never staged.
    AssetMissing(String),
    /// The code host refused the module.
    Rejected { module: String, reason: String },
    Timeout(String),
}

impl fmt::Display for AssemblyLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyLoadError::AssetMissing(m) => write!(f, "dynamic module {m} was not staged"),
            AssemblyLoadError::Rejected { module, reason } => {
                write!(f, "dynamic module {module} failed to load: {reason}")
            }
            AssemblyLoadError::Timeout(m) => write!(f, "loading dynamic module {m} timed out"),
        }
    }
}

impl std::error::Error for AssemblyLoadError {}

/// Reason a boot ended in the aborted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    Init(InitError),
    Network(NetworkError),
    Manifest(ManifestError),
    Download(DownloadError),
    AssemblyLoad(AssemblyLoadError),
    /// Package initialization was attempted more times than allowed.
    AttemptsExhausted(u32),
    /// The scene loader refused control.
    Handoff(String),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Init(e) => write!(f, "package initialization failed: {e}"),
            BootError::Network(e) => write!(f, "version resolution failed: {e}"),
            BootError::Manifest(e) => write!(f, "{e}"),
            BootError::Download(e) => write!(f, "content update failed: {e}"),
            BootError::AssemblyLoad(e) => write!(f, "{e}"),
            BootError::AttemptsExhausted(n) => {
                write!(f, "gave up after {n} package initialization attempts")
            }
            BootError::Handoff(m) => write!(f, "scene handoff failed: {m}"),
        }
    }
}

impl std::error::Error for BootError {}
