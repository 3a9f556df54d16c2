//! In-memory collaborators for unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use patch_shared::{
    config::BootConfig,
    error::{AssemblyLoadError, NetworkError},
    manifest::{manifest_file_name, version_file_name, content_hash, Manifest, ManifestEntry, VersionToken},
    progress::{DownloadProgress, ProgressSink},
    storage::StorageLayout,
};
use tempfile::TempDir;

use crate::{
    boot::SceneLoader,
    loader::{DynamicCodeHost, LoadedModule, MetadataPatcher},
    transport::ContentTransport,
};

pub const HOST: &str = "tcp://content.test:9000/Test/PC";

/// URL -> body map with per-URL failure and latency injection.
#[derive(Default)]
pub struct MemoryTransport {
    bodies: Mutex<HashMap<String, Bytes>>,
    fail_times: Mutex<HashMap<String, u32>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<HashMap<String, u32>>,
    offline: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Bytes::copy_from_slice(body));
    }

    pub fn fail_times(&self, url: &str, times: u32) {
        self.fail_times.lock().unwrap().insert(url.to_string(), times);
    }

    /// Holds every response for `url` back by `delay`.
    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    /// Every request fails with a connection error.
    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn requests(&self, url: &str) -> u32 {
        self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> u32 {
        self.requests.lock().unwrap().values().sum()
    }

    /// Publishes a package version under `HOST`.
    pub fn publish(&self, package: &str, version: &str, files: &[(&str, &[u8])]) -> Manifest {
        let version = VersionToken::new(version);
        let entries = files
            .iter()
            .map(|(name, body)| ManifestEntry::from_bytes(*name, body))
            .collect();
        let manifest = Manifest::new(package, version.clone(), entries);
        for (name, body) in files {
            self.insert(&format!("{HOST}/{name}"), body);
        }
        self.insert(
            &format!("{HOST}/{}", manifest_file_name(package, &version)),
            &manifest.to_json_vec().unwrap(),
        );
        self.insert(
            &format!("{HOST}/{}", version_file_name(package)),
            version.as_str().as_bytes(),
        );
        manifest
    }
}

#[async_trait]
impl ContentTransport for MemoryTransport {
    async fn fetch(&self, url: &str) -> Result<Bytes, NetworkError> {
        *self.requests.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.offline.lock().unwrap() {
            return Err(NetworkError::Connection("network unreachable".into()));
        }
        if let Some(n) = self.fail_times.lock().unwrap().get_mut(url) {
            if *n > 0 {
                *n -= 1;
                return Err(NetworkError::Connection("reset by peer".into()));
            }
        }
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| NetworkError::NotFound(url.to_string()))
    }
}

/// Patcher that records (module, payload length) and rejects chosen modules.
#[derive(Default)]
pub struct RecordingPatcher {
    calls: Mutex<Vec<(String, usize)>>,
    reject: Vec<String>,
    events: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingPatcher {
    /// Also appends `patch:<module>` to a log shared with other recorders.
    pub fn with_events(events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn rejecting(module: &str) -> Self {
        Self {
            reject: vec![module.to_string()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataPatcher for RecordingPatcher {
    async fn patch_metadata(&self, module: &str, image: Bytes) -> Result<(), String> {
        self.calls.lock().unwrap().push((module.to_string(), image.len()));
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("patch:{module}"));
        }
        if self.reject.iter().any(|m| m == module) || image.is_empty() {
            return Err("bad image".into());
        }
        Ok(())
    }
}

/// Code host that records what it loaded.
#[derive(Default)]
pub struct RecordingHost {
    loaded: Mutex<Vec<String>>,
    fail: bool,
    events: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingHost {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_events(events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl DynamicCodeHost for RecordingHost {
    async fn load_module(&self, module: &str, bytes: Bytes) -> Result<LoadedModule, AssemblyLoadError> {
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("load:{module}"));
        }
        if self.fail {
            return Err(AssemblyLoadError::Rejected {
                module: module.to_string(),
                reason: "bad image format".into(),
            });
        }
        self.loaded.lock().unwrap().push(module.to_string());
        Ok(LoadedModule {
            name: module.to_string(),
            len: bytes.len(),
            digest: content_hash(&bytes),
            path: None,
        })
    }
}

/// Scene loader that counts invocations.
#[derive(Clone, Default)]
pub struct RecordingScene {
    pub scenes: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SceneLoader for RecordingScene {
    async fn load_scene(&mut self, scene: &str) -> anyhow::Result<()> {
        self.scenes.lock().unwrap().push(scene.to_string());
        Ok(())
    }
}

/// Progress sink that keeps every snapshot.
#[derive(Clone, Default)]
pub struct RecordingProgress {
    pub snapshots: Arc<Mutex<Vec<DownloadProgress>>>,
    pub nothing_to_download: Arc<Mutex<u32>>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&mut self, progress: DownloadProgress) {
        self.snapshots.lock().unwrap().push(progress);
    }

    fn on_nothing_to_download(&mut self) {
        *self.nothing_to_download.lock().unwrap() += 1;
    }
}

/// Temporary cache root with a config pointing at it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: BootConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BootConfig::new(
            "HotUpdate.dll",
            "tcp://content.test:9000/Test",
            "PC",
            dir.path().to_string_lossy().to_string(),
        );
        config.retry_backoff_ms = 0;
        config.phase_timeout_ms = 5_000;
        Self { dir, config }
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.dir.path())
    }

    fn write(&self, dir: std::path::PathBuf, name: &str, body: &[u8]) {
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    pub fn write_builtin(&self, name: &str, body: &[u8]) {
        self.write(self.layout().builtin_dir(&self.config.package_name), name, body);
    }

    pub fn write_cache(&self, name: &str, body: &[u8]) {
        self.write(self.layout().cache_dir(&self.config.package_name), name, body);
    }

    pub fn write_simulate(&self, name: &str, body: &[u8]) {
        self.write(self.layout().simulate_dir(&self.config.package_name), name, body);
    }

    /// Ships a complete package version in built-in storage.
    pub fn ship_builtin(&self, version: &str, files: &[(&str, &[u8])]) {
        let package = self.config.package_name.clone();
        let version = VersionToken::new(version);
        let entries = files
            .iter()
            .map(|(name, body)| ManifestEntry::from_bytes(*name, body))
            .collect();
        let manifest = Manifest::new(package.clone(), version.clone(), entries);
        for (name, body) in files {
            self.write_builtin(name, body);
        }
        self.write_builtin(
            &manifest_file_name(&package, &version),
            &manifest.to_json_vec().unwrap(),
        );
        self.write_builtin(&version_file_name(&package), version.as_str().as_bytes());
    }
}
