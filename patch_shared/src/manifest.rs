//! Package versions and manifests.
//!
//! A manifest lists every file of one package version with its size and
//! SHA-256 digest. Hosts publish it next to a small version file that names
//! the latest version.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ManifestError;

/// Opaque content revision identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(s: impl Into<String>) -> Self {
        VersionToken(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version token used by simulated packages.
pub const SIMULATE_VERSION: &str = "Simulate";

/// File holding the latest version of a package.
pub fn version_file_name(package: &str) -> String {
    format!("PackageManifest_{package}.version")
}

/// Manifest file for one version of a package.
pub fn manifest_file_name(package: &str, version: &VersionToken) -> String {
    format!("PackageManifest_{package}_{version}.json")
}

/// Whether a file name is package bookkeeping rather than content.
pub fn is_manifest_file(name: &str) -> bool {
    name.starts_with("PackageManifest_")
}

/// Lowercase hex SHA-256 of a payload.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// One file in a package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    pub hash: String,
}

impl ManifestEntry {
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            hash: content_hash(bytes),
        }
    }

    /// Whether `bytes` are exactly this entry's content.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.size && content_hash(bytes) == self.hash
    }
}

/// The file list of one package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub package: String,
    pub version: VersionToken,
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(package: impl Into<String>, version: VersionToken, files: Vec<ManifestEntry>) -> Self {
        Self {
            package: package.into(),
            version,
            files,
        }
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parses a manifest and checks it belongs to `package` at `version`.
    pub fn parse_and_validate(
        bytes: &[u8],
        package: &str,
        version: &VersionToken,
    ) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse(e.to_string()))?;
        manifest.validate(package, version)?;
        Ok(manifest)
    }

    pub fn validate(&self, package: &str, version: &VersionToken) -> Result<(), ManifestError> {
        if self.package != package {
            return Err(ManifestError::PackageMismatch {
                expected: package.to_string(),
                found: self.package.clone(),
            });
        }
        if &self.version != version {
            return Err(ManifestError::VersionMismatch {
                expected: version.to_string(),
                found: self.version.to_string(),
            });
        }
        let mut seen = HashSet::new();
        for entry in &self.files {
            if !seen.insert(entry.name.as_str()) {
                return Err(ManifestError::DuplicateEntry(entry.name.clone()));
            }
        }
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|e| e.name == name)
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|e| e.size).sum()
    }
}
