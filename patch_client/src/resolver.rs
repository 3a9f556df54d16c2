//! Version resolution and manifest synchronization.
//!
//! Neither retries on its own: the orchestrator decides whether a failure
//! means downgrading the strategy or aborting.

use std::time::Duration;

use patch_shared::{
    error::{ManifestError, NetworkError},
    manifest::{Manifest, VersionToken},
};
use tracing::{info, warn};

use crate::package::ResourcePackage;

/// Asks a package's authority for its latest content version.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    timeout: Duration,
}

impl VersionResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Resolves and records the latest version on `package`.
    pub async fn resolve_latest_version(
        &self,
        package: &mut ResourcePackage,
    ) -> Result<VersionToken, NetworkError> {
        let version = tokio::time::timeout(self.timeout, package.request_version())
            .await
            .unwrap_or(Err(NetworkError::Timeout))
            .inspect_err(|e| warn!(package = %package.name(), error = %e, "Version request failed"))?;
        info!(package = %package.name(), version = %version, "Resolved package version");
        package.set_version(version.clone());
        Ok(version)
    }
}

/// Fetches and validates the manifest matching a resolved version.
#[derive(Debug, Clone)]
pub struct ManifestSynchronizer {
    timeout: Duration,
}

impl ManifestSynchronizer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn sync_manifest(
        &self,
        package: &mut ResourcePackage,
        version: &VersionToken,
    ) -> Result<Manifest, ManifestError> {
        let manifest = tokio::time::timeout(self.timeout, package.load_manifest(version))
            .await
            .unwrap_or(Err(ManifestError::Fetch(NetworkError::Timeout)))
            .inspect_err(|e| {
                warn!(package = %package.name(), version = %version, error = %e, "Manifest sync failed")
            })?;
        info!(
            package = %package.name(),
            version = %version,
            files = manifest.files.len(),
            bytes = manifest.total_bytes(),
            "Manifest synchronized"
        );
        package.set_manifest(manifest.clone());
        Ok(manifest)
    }
}
