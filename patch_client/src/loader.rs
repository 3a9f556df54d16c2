//! Two-phase code module loading.
//!
//! Phase A hands every ahead-of-time module image to the metadata patcher so
//! the type layouts the dynamic module depends on are registered. Phase B
//! loads the dynamic module itself. Phase B takes the `PatchReport` Phase A
//! produced, so it cannot run before Phase A has visited every image.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use patch_shared::{
    cache::AssetByteCache,
    error::{AssemblyLoadError, MetadataPatchError},
    manifest::content_hash,
    module::ModuleDescriptor,
    storage::PackageStore,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Registers AOT type metadata from a module image.
#[async_trait]
pub trait MetadataPatcher: Send + Sync {
    async fn patch_metadata(&self, module: &str, image: Bytes) -> Result<(), String>;
}

/// Loads a dynamic module into the running process.
#[async_trait]
pub trait DynamicCodeHost: Send + Sync {
    async fn load_module(&self, module: &str, bytes: Bytes) -> Result<LoadedModule, AssemblyLoadError>;
}

/// A dynamic module that is now executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub name: String,
    pub len: usize,
    pub digest: String,
    pub path: Option<PathBuf>,
}

/// Phase A outcome for one AOT module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerModuleResult {
    pub module: String,
    pub outcome: Result<(), MetadataPatchError>,
}

impl PerModuleResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Phase A outcome for every declared AOT module, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub results: Vec<PerModuleResult>,
}

impl PatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PerModuleResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Drives both loading phases against the staged byte cache.
pub struct DynamicModuleLoader {
    patcher: Arc<dyn MetadataPatcher>,
    host: Arc<dyn DynamicCodeHost>,
    timeout: Duration,
}

impl DynamicModuleLoader {
    pub fn new(
        patcher: Arc<dyn MetadataPatcher>,
        host: Arc<dyn DynamicCodeHost>,
        timeout: Duration,
    ) -> Self {
        Self {
            patcher,
            host,
            timeout,
        }
    }

    /// Phase A: patches metadata for every AOT module, never stopping early.
    ///
    /// A module whose image was not staged is handed an empty payload and
    /// reported as `AssetMissing` whatever the patcher says.
    pub async fn patch_module_metadata(
        &self,
        cache: &AssetByteCache,
        aot: &[ModuleDescriptor],
    ) -> PatchReport {
        let mut results = Vec::with_capacity(aot.len());
        for descriptor in aot {
            let (image, found) = cache.get_or_empty(&descriptor.name);
            let len = image.len();
            let patched =
                tokio::time::timeout(self.timeout, self.patcher.patch_metadata(&descriptor.name, image))
                    .await;
            let outcome = match (found, patched) {
                (false, _) => Err(MetadataPatchError::AssetMissing(descriptor.name.clone())),
                (true, Ok(Ok(()))) => Ok(()),
                (true, Ok(Err(reason))) => Err(MetadataPatchError::Rejected {
                    module: descriptor.name.clone(),
                    reason,
                }),
                (true, Err(_)) => Err(MetadataPatchError::Rejected {
                    module: descriptor.name.clone(),
                    reason: "timed out".into(),
                }),
            };
            match &outcome {
                Ok(()) => info!(module = %descriptor.name, bytes = len, "AOT metadata patched"),
                Err(e) => warn!(module = %descriptor.name, error = %e, "AOT metadata patch failed"),
            }
            results.push(PerModuleResult {
                module: descriptor.name.clone(),
                outcome,
            });
        }
        PatchReport { results }
    }

    /// Phase B: loads the dynamic module once Phase A has completed.
    pub async fn load_dynamic_module(
        &self,
        cache: &AssetByteCache,
        descriptor: &ModuleDescriptor,
        patched: &PatchReport,
    ) -> Result<LoadedModule, AssemblyLoadError> {
        if patched.failures().next().is_some() {
            warn!(
                failed = patched.results.len() - patched.succeeded(),
                "Loading dynamic module with incomplete AOT metadata"
            );
        }
        let Some(bytes) = cache.get(&descriptor.name) else {
            error!(module = %descriptor.name, "Dynamic module bytes were never staged");
            return Err(AssemblyLoadError::AssetMissing(descriptor.name.clone()));
        };
        let loaded = tokio::time::timeout(self.timeout, self.host.load_module(&descriptor.name, bytes))
            .await
            .map_err(|_| AssemblyLoadError::Timeout(descriptor.name.clone()))??;
        info!(module = %loaded.name, bytes = loaded.len, "Dynamic module loaded");
        Ok(loaded)
    }
}

// =========================================================================
// Bundled collaborators
// =========================================================================

/// One registered metadata image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredImage {
    pub module: String,
    pub digest: String,
    pub len: usize,
}

/// Patcher that accepts any non-empty image and records its digest.
#[derive(Debug, Default)]
pub struct ImageMetadataPatcher {
    registry: Mutex<Vec<RegisteredImage>>,
}

impl ImageMetadataPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn registered(&self) -> Vec<RegisteredImage> {
        self.registry.lock().await.clone()
    }
}

#[async_trait]
impl MetadataPatcher for ImageMetadataPatcher {
    async fn patch_metadata(&self, module: &str, image: Bytes) -> Result<(), String> {
        if image.is_empty() {
            return Err("empty metadata image".into());
        }
        let mut registry = self.registry.lock().await;
        if registry.iter().any(|r| r.module == module) {
            return Err("metadata already registered".into());
        }
        registry.push(RegisteredImage {
            module: module.to_string(),
            digest: content_hash(&image),
            len: image.len(),
        });
        Ok(())
    }
}

/// Code host that stages module bytes on disk for the platform loader.
#[derive(Debug, Clone)]
pub struct StagedCodeHost {
    staging: PackageStore,
}

impl StagedCodeHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            staging: PackageStore::new(dir),
        }
    }
}

#[async_trait]
impl DynamicCodeHost for StagedCodeHost {
    async fn load_module(&self, module: &str, bytes: Bytes) -> Result<LoadedModule, AssemblyLoadError> {
        if bytes.is_empty() {
            return Err(AssemblyLoadError::Rejected {
                module: module.to_string(),
                reason: "empty module image".into(),
            });
        }
        self.staging
            .write(module, &bytes)
            .await
            .map_err(|e| AssemblyLoadError::Rejected {
                module: module.to_string(),
                reason: e.to_string(),
            })?;
        Ok(LoadedModule {
            name: module.to_string(),
            len: bytes.len(),
            digest: content_hash(&bytes),
            path: Some(self.staging.dir().join(module)),
        })
    }
}
