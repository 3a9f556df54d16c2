//! Publishing a package version onto the content host's root.

use std::path::Path;

use anyhow::Context;
use patch_shared::{
    manifest::{manifest_file_name, version_file_name, Manifest, ManifestEntry, VersionToken},
    storage::PackageStore,
};
use tracing::info;

/// Copies every file in `src` into `{out_root}/{platform}/` and writes the
/// manifest and version files for `package` at `version`.
///
/// The platform directory is flat: a file that changed since an earlier
/// version overwrites its bytes, so only the latest manifest is guaranteed to
/// describe what is on disk. Older manifest files stay behind, and the version
/// file is what points clients at the new set.
pub async fn publish_package(
    src: &Path,
    out_root: &Path,
    platform: &str,
    package: &str,
    version: &str,
) -> anyhow::Result<Manifest> {
    let version = version.trim();
    anyhow::ensure!(!version.is_empty(), "version must not be empty");
    anyhow::ensure!(
        !version.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\'),
        "version `{version}` must be a single path segment"
    );
    anyhow::ensure!(!package.trim().is_empty(), "package name must not be empty");
    let version = VersionToken::new(version);

    let source = PackageStore::new(src);
    let target = PackageStore::new(out_root.join(platform));
    let names = source
        .list_content()
        .await
        .with_context(|| format!("list {}", src.display()))?;

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let body = source
            .read(&name)
            .await
            .with_context(|| format!("read {name}"))?
            .with_context(|| format!("{name} vanished while publishing"))?;
        target
            .write(&name, &body)
            .await
            .with_context(|| format!("write {name}"))?;
        files.push(ManifestEntry::from_bytes(name, &body));
    }

    let manifest = Manifest::new(package, version.clone(), files);
    let json = manifest.to_json_vec().context("serialize manifest")?;
    target
        .write(&manifest_file_name(package, &version), &json)
        .await
        .context("write manifest")?;
    // Written last so clients never see a version without its manifest.
    target
        .write(&version_file_name(package), version.as_str().as_bytes())
        .await
        .context("write version file")?;

    info!(
        package,
        version = %version,
        platform,
        files = manifest.files.len(),
        bytes = manifest.total_bytes(),
        "Package published"
    );
    Ok(manifest)
}
