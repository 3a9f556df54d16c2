//! Resource packages and their strategy-selected initialization.
//!
//! A package owns the storage its strategy wires up and answers three
//! questions for the rest of the pipeline: what is the latest version, what
//! does that version contain, and where do its bytes come from.
//! Initialization only wires storage; it never talks to the host.

use std::sync::Arc;

use bytes::Bytes;
use patch_shared::{
    config::{BootConfig, PlayStrategy},
    error::{InitError, ManifestError, NetworkError},
    manifest::{manifest_file_name, version_file_name, Manifest, ManifestEntry, VersionToken, SIMULATE_VERSION},
    storage::{PackageStore, StorageLayout},
};
use tracing::{debug, info, warn};

use crate::{
    downloader::{DownloadJob, JobFetcher},
    transport::{fetch_with_fallback, ContentTransport, HostServices, RemoteServices},
};

/// Lifecycle of a package within one boot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Initialized,
    VersionResolved,
    ManifestSynced,
}

/// Storage wiring chosen by the play strategy.
enum Backend {
    Simulated {
        source: PackageStore,
    },
    Offline {
        builtin: PackageStore,
    },
    Host {
        cache: PackageStore,
        builtin: Option<PackageStore>,
        remote: Arc<dyn RemoteServices>,
        transport: Arc<dyn ContentTransport>,
    },
}

/// A named, versioned catalog of addressable content.
pub struct ResourcePackage {
    name: String,
    strategy: PlayStrategy,
    state: PackageState,
    version: Option<VersionToken>,
    manifest: Option<Manifest>,
    backend: Backend,
}

impl ResourcePackage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> PlayStrategy {
        self.strategy
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    pub fn version(&self) -> Option<&VersionToken> {
        self.version.as_ref()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub(crate) fn set_version(&mut self, version: VersionToken) {
        self.version = Some(version);
        self.state = PackageState::VersionResolved;
    }

    pub(crate) fn set_manifest(&mut self, manifest: Manifest) {
        self.manifest = Some(manifest);
        self.state = PackageState::ManifestSynced;
    }

    /// Stores searched, in order, when reading package content.
    fn local_stores(&self) -> Vec<&PackageStore> {
        match &self.backend {
            Backend::Simulated { source } => vec![source],
            Backend::Offline { builtin } => vec![builtin],
            Backend::Host { cache, builtin, .. } => {
                let mut stores = vec![cache];
                stores.extend(builtin.iter());
                stores
            }
        }
    }

    /// Asks the package's authority for its latest version.
    pub(crate) async fn request_version(&self) -> Result<VersionToken, NetworkError> {
        match &self.backend {
            Backend::Simulated { .. } => Ok(VersionToken::new(SIMULATE_VERSION)),
            Backend::Offline { builtin } => builtin
                .read_version(&self.name)
                .await
                .map_err(|e| NetworkError::Storage(e.to_string()))?
                .ok_or_else(|| {
                    NetworkError::Unavailable(format!(
                        "no built-in version for package {}",
                        self.name
                    ))
                }),
            Backend::Host {
                remote, transport, ..
            } => {
                let raw = fetch_with_fallback(transport, remote, &version_file_name(&self.name)).await?;
                let text = String::from_utf8_lossy(&raw).trim().to_string();
                if text.is_empty() {
                    return Err(NetworkError::Protocol("empty version file".into()));
                }
                Ok(VersionToken::new(text))
            }
        }
    }

    /// Loads the manifest for `version` from wherever the strategy keeps it.
    pub(crate) async fn load_manifest(&self, version: &VersionToken) -> Result<Manifest, ManifestError> {
        let file = manifest_file_name(&self.name, version);
        match &self.backend {
            Backend::Simulated { source } => {
                let names = source
                    .list_content()
                    .await
                    .map_err(|e| ManifestError::Fetch(NetworkError::Storage(e.to_string())))?;
                let mut files = Vec::with_capacity(names.len());
                for name in names {
                    let bytes = read_store(source, &name)
                        .await?
                        .ok_or_else(|| ManifestError::Fetch(NetworkError::NotFound(name.clone())))?;
                    files.push(ManifestEntry::from_bytes(name, &bytes));
                }
                Ok(Manifest::new(self.name.clone(), version.clone(), files))
            }
            Backend::Offline { builtin } => {
                let raw = read_store(builtin, &file)
                    .await?
                    .ok_or_else(|| ManifestError::Fetch(NetworkError::NotFound(file.clone())))?;
                Manifest::parse_and_validate(&raw, &self.name, version)
            }
            Backend::Host {
                cache,
                remote,
                transport,
                ..
            } => {
                let raw = fetch_with_fallback(transport, remote, &file).await?;
                let manifest = Manifest::parse_and_validate(&raw, &self.name, version)?;
                if let Err(e) = cache.write(&file, &raw).await {
                    debug!(file = %file, error = %e, "could not persist manifest locally");
                }
                Ok(manifest)
            }
        }
    }

    /// Manifest entries not yet held intact by local storage.
    ///
    /// Only host-synced packages can download; other strategies always get
    /// an empty list.
    pub async fn download_jobs(&self) -> Vec<DownloadJob> {
        let (Some(manifest), Backend::Host { .. }) = (&self.manifest, &self.backend) else {
            return Vec::new();
        };
        let stores = self.local_stores();
        let mut jobs = Vec::new();
        'entries: for entry in &manifest.files {
            for store in &stores {
                if store.holds(entry).await {
                    continue 'entries;
                }
            }
            jobs.push(DownloadJob::from_entry(entry));
        }
        jobs
    }

    /// Reads a content file by key. `Ok(None)` if the package lacks it.
    ///
    /// Once a manifest is synced only a copy that matches its entry counts;
    /// a stale copy in one store never shadows an intact one in the next.
    pub async fn read_asset(&self, key: &str) -> Result<Option<Bytes>, NetworkError> {
        let entry = match &self.manifest {
            Some(manifest) => match manifest.entry(key) {
                Some(entry) => Some(entry),
                None => return Ok(None),
            },
            None => None,
        };
        for store in self.local_stores() {
            let found = store
                .read(key)
                .await
                .map_err(|e| NetworkError::Storage(e.to_string()))?;
            let Some(bytes) = found else { continue };
            match entry {
                Some(entry) if !entry.matches(&bytes) => {
                    warn!(
                        package = %self.name,
                        key,
                        dir = %store.dir().display(),
                        "Skipping copy that does not match the manifest"
                    );
                }
                _ => return Ok(Some(bytes)),
            }
        }
        Ok(None)
    }
}

async fn read_store(store: &PackageStore, name: &str) -> Result<Option<Bytes>, ManifestError> {
    store
        .read(name)
        .await
        .map_err(|e| ManifestError::Fetch(NetworkError::Storage(e.to_string())))
}

#[async_trait::async_trait]
impl JobFetcher for ResourcePackage {
    async fn fetch(&self, job: &DownloadJob) -> Result<(), NetworkError> {
        let Backend::Host {
            cache,
            remote,
            transport,
            ..
        } = &self.backend
        else {
            return Err(NetworkError::Unavailable(format!(
                "{} package cannot download",
                self.strategy
            )));
        };
        let body = fetch_with_fallback(transport, remote, &job.key).await?;
        job.verify(&body)?;
        cache
            .write(&job.key, &body)
            .await
            .map_err(|e| NetworkError::Storage(e.to_string()))
    }
}

/// Builds packages for a given strategy.
pub struct PackageInitializer {
    package_name: String,
    layout: StorageLayout,
    remote: Arc<dyn RemoteServices>,
    transport: Arc<dyn ContentTransport>,
}

impl PackageInitializer {
    pub fn new(config: &BootConfig, transport: Arc<dyn ContentTransport>) -> Self {
        let remote = Arc::new(HostServices::new(
            config.host_server_url(),
            config.fallback_server_url(),
        ));
        Self::with_remote(config, remote, transport)
    }

    pub fn with_remote(
        config: &BootConfig,
        remote: Arc<dyn RemoteServices>,
        transport: Arc<dyn ContentTransport>,
    ) -> Self {
        Self {
            package_name: config.package_name.clone(),
            layout: StorageLayout::new(&config.local_cache_root),
            remote,
            transport,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Creates a fresh package wired for `strategy`.
    pub async fn initialize(&self, strategy: PlayStrategy) -> Result<ResourcePackage, InitError> {
        if self.package_name.trim().is_empty() {
            return Err(InitError::InvalidConfig("package name is empty".into()));
        }
        let name = self.package_name.clone();
        let backend = match strategy {
            PlayStrategy::Simulated => Backend::Simulated {
                source: PackageStore::new(self.layout.simulate_dir(&name)),
            },
            PlayStrategy::OfflineOnly => Backend::Offline {
                builtin: PackageStore::new(self.layout.builtin_dir(&name)),
            },
            PlayStrategy::HostSynced => {
                let cache_dir = self.layout.cache_dir(&name);
                tokio::fs::create_dir_all(&cache_dir)
                    .await
                    .map_err(|e| InitError::Storage(format!("{}: {e}", cache_dir.display())))?;
                let builtin = PackageStore::new(self.layout.builtin_dir(&name));
                let populated = builtin.is_populated().await;
                Backend::Host {
                    cache: PackageStore::new(cache_dir),
                    builtin: populated.then_some(builtin),
                    remote: Arc::clone(&self.remote),
                    transport: Arc::clone(&self.transport),
                }
            }
        };
        info!(package = %name, strategy = %strategy, "Package initialized");
        Ok(ResourcePackage {
            name,
            strategy,
            state: PackageState::Initialized,
            version: None,
            manifest: None,
            backend,
        })
    }
}
