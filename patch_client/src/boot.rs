//! Boot orchestration.
//!
//! The orchestrator walks one linear state machine per process:
//!
//! ```text
//! Idle -> InitializingPackage -> ResolvingVersion
//!      -> (DowngradingStrategy -> InitializingPackage)*
//!      -> SynchronizingManifest -> Downloading -> LoadingRequiredAssets
//!      -> PatchingModuleMetadata -> LoadingDynamicModule
//!      -> HandoffToApplication -> Done
//! ```
//!
//! Any fatal error lands in `Aborted`. It is the only place where component
//! errors are turned into a downgrade, a retry or an abort.

use std::sync::Arc;

use async_trait::async_trait;
use patch_shared::{
    cache::AssetByteCache,
    config::{BootConfig, PlayStrategy},
    error::{BootError, InitError, NetworkError},
    manifest::VersionToken,
    progress::{DownloadProgress, ProgressSink},
};
use tracing::{error, info, warn};

use crate::{
    downloader::{DownloadSession, DownloadStatus, RetryPolicy},
    loader::{DynamicCodeHost, DynamicModuleLoader, LoadedModule, MetadataPatcher, PatchReport},
    package::{PackageInitializer, ResourcePackage},
    resolver::{ManifestSynchronizer, VersionResolver},
    transport::ContentTransport,
};

/// Takes over once the boot sequence is complete.
#[async_trait]
pub trait SceneLoader: Send {
    async fn load_scene(&mut self, scene: &str) -> anyhow::Result<()>;
}

/// Orchestrator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootState {
    Idle,
    InitializingPackage(PlayStrategy),
    ResolvingVersion,
    DowngradingStrategy { from: PlayStrategy, to: PlayStrategy },
    SynchronizingManifest,
    Downloading,
    LoadingRequiredAssets,
    PatchingModuleMetadata,
    LoadingDynamicModule,
    HandoffToApplication,
    Done,
    Aborted(BootError),
}

/// What a successful boot produced.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub strategy: PlayStrategy,
    pub version: VersionToken,
    /// Package initializations performed, including downgrades.
    pub attempts: u32,
    pub download: DownloadProgress,
    /// Required assets that could not be staged.
    pub missing_assets: Vec<String>,
    pub patch_report: PatchReport,
    pub module: LoadedModule,
}

/// Terminal outcome handed to the hosting application.
#[derive(Debug, Clone)]
pub enum BootOutcome {
    Done(BootReport),
    Aborted(BootError),
}

impl BootOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, BootOutcome::Done(_))
    }
}

/// Collaborators the orchestrator drives.
pub struct BootDeps {
    pub transport: Arc<dyn ContentTransport>,
    pub patcher: Arc<dyn MetadataPatcher>,
    pub code_host: Arc<dyn DynamicCodeHost>,
    pub scene_loader: Box<dyn SceneLoader>,
    pub progress: Box<dyn ProgressSink>,
}

/// Top-level boot state machine.
pub struct BootstrapOrchestrator {
    config: BootConfig,
    initializer: PackageInitializer,
    resolver: VersionResolver,
    synchronizer: ManifestSynchronizer,
    loader: DynamicModuleLoader,
    scene_loader: Box<dyn SceneLoader>,
    progress: Box<dyn ProgressSink>,
    strategy: PlayStrategy,
    state: BootState,
    history: Vec<BootState>,
    attempts: u32,
    finished: Option<BootOutcome>,
}

impl BootstrapOrchestrator {
    pub fn new(config: BootConfig, deps: BootDeps) -> Self {
        let initializer = PackageInitializer::new(&config, deps.transport);
        Self::with_initializer(
            config,
            initializer,
            deps.patcher,
            deps.code_host,
            deps.scene_loader,
            deps.progress,
        )
    }

    pub fn with_initializer(
        config: BootConfig,
        initializer: PackageInitializer,
        patcher: Arc<dyn MetadataPatcher>,
        code_host: Arc<dyn DynamicCodeHost>,
        scene_loader: Box<dyn SceneLoader>,
        progress: Box<dyn ProgressSink>,
    ) -> Self {
        let timeout = config.phase_timeout();
        Self {
            strategy: config.strategy,
            resolver: VersionResolver::new(timeout),
            synchronizer: ManifestSynchronizer::new(timeout),
            loader: DynamicModuleLoader::new(patcher, code_host, timeout),
            initializer,
            scene_loader,
            progress,
            state: BootState::Idle,
            history: vec![BootState::Idle],
            attempts: 0,
            finished: None,
            config,
        }
    }

    pub fn state(&self) -> &BootState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[BootState] {
        &self.history
    }

    /// Current strategy; changes only through a downgrade.
    pub fn strategy(&self) -> PlayStrategy {
        self.strategy
    }

    fn enter(&mut self, next: BootState) {
        info!(from = ?self.state, to = ?next, "Boot state transition");
        self.state = next.clone();
        self.history.push(next);
    }

    fn abort(&mut self, reason: BootError) -> BootOutcome {
        error!(reason = %reason, state = ?self.state, "Boot aborted");
        self.enter(BootState::Aborted(reason.clone()));
        BootOutcome::Aborted(reason)
    }

    /// Runs the boot sequence to a terminal state.
    ///
    /// Calling it again after a terminal state returns the same outcome
    /// without doing any work.
    pub async fn run(&mut self) -> BootOutcome {
        if let Some(outcome) = &self.finished {
            return outcome.clone();
        }
        let outcome = self.drive().await;
        self.finished = Some(outcome.clone());
        outcome
    }

    async fn drive(&mut self) -> BootOutcome {
        let (mut package, version) = match self.prepare_package().await {
            Ok(found) => found,
            Err(reason) => return self.abort(reason),
        };

        self.enter(BootState::SynchronizingManifest);
        if let Err(e) = self.synchronizer.sync_manifest(&mut package, &version).await {
            return self.abort(BootError::Manifest(e));
        }

        self.enter(BootState::Downloading);
        let download = match self.download(&package).await {
            Ok(progress) => progress,
            Err(reason) => return self.abort(reason),
        };

        self.enter(BootState::LoadingRequiredAssets);
        let cache = self.stage_required_assets(&package).await;

        self.enter(BootState::PatchingModuleMetadata);
        let patch_report = self
            .loader
            .patch_module_metadata(&cache, &self.config.aot_descriptors())
            .await;

        self.enter(BootState::LoadingDynamicModule);
        let module = match self
            .loader
            .load_dynamic_module(&cache, &self.config.dynamic_descriptor(), &patch_report)
            .await
        {
            Ok(m) => m,
            Err(e) => return self.abort(BootError::AssemblyLoad(e)),
        };

        self.enter(BootState::HandoffToApplication);
        let scene = self.config.main_scene.clone();
        let timeout = self.config.phase_timeout();
        match tokio::time::timeout(timeout, self.scene_loader.load_scene(&scene)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.abort(BootError::Handoff(format!("{e:#}"))),
            Err(_) => {
                return self.abort(BootError::Handoff(format!("loading scene {scene} timed out")))
            }
        }

        self.enter(BootState::Done);
        info!(
            strategy = %self.strategy,
            version = %version,
            attempts = self.attempts,
            "Boot complete"
        );
        BootOutcome::Done(BootReport {
            strategy: self.strategy,
            version,
            attempts: self.attempts,
            download,
            missing_assets: cache.missing().to_vec(),
            patch_report,
            module,
        })
    }

    /// Initializes a package and resolves its version, downgrading the
    /// strategy on recoverable failures.
    async fn prepare_package(&mut self) -> Result<(ResourcePackage, VersionToken), BootError> {
        loop {
            if self.attempts >= self.config.max_boot_attempts {
                return Err(BootError::AttemptsExhausted(self.attempts));
            }
            self.attempts += 1;

            self.enter(BootState::InitializingPackage(self.strategy));
            let init = tokio::time::timeout(
                self.config.phase_timeout(),
                self.initializer.initialize(self.strategy),
            )
            .await;
            let mut package = match init {
                Ok(Ok(p)) => p,
                Ok(Err(e)) => return Err(BootError::Init(e)),
                Err(_) => {
                    return Err(BootError::Init(InitError::Storage(
                        "initialization timed out".into(),
                    )))
                }
            };

            self.enter(BootState::ResolvingVersion);
            let err: NetworkError = match self.resolver.resolve_latest_version(&mut package).await {
                Ok(version) => return Ok((package, version)),
                Err(e) => e,
            };

            let Some(next) = self.strategy.downgrade() else {
                return Err(BootError::Network(err));
            };
            warn!(
                error = %err,
                from = %self.strategy,
                to = %next,
                "Network unavailable, switching strategy"
            );
            self.enter(BootState::DowngradingStrategy {
                from: self.strategy,
                to: next,
            });
            // Never reuse a package across strategies.
            drop(package);
            self.strategy = next;
        }
    }

    async fn download(&mut self, package: &ResourcePackage) -> Result<DownloadProgress, BootError> {
        let jobs = package.download_jobs().await;
        if jobs.is_empty() {
            info!("No content update needed");
            self.progress.on_nothing_to_download();
        }
        let policy = RetryPolicy {
            max_retries: self.config.max_retries_per_file,
            backoff: self.config.retry_backoff(),
            attempt_timeout: self.config.phase_timeout(),
        };
        let mut session =
            DownloadSession::with_policy(jobs, self.config.max_concurrent_downloads, policy);
        let sink = &mut self.progress;
        let status = session
            .begin(package, &mut |p: DownloadProgress| sink.on_progress(p))
            .await;
        debug_assert_ne!(status, DownloadStatus::Running);
        session.outcome().map_err(BootError::Download)
    }

    /// Reads every declared module into a fresh byte cache.
    ///
    /// Absent assets are recorded and left for the loader to report.
    async fn stage_required_assets(&self, package: &ResourcePackage) -> AssetByteCache {
        let mut cache = AssetByteCache::new();
        for key in self.config.required_assets() {
            let read = tokio::time::timeout(self.config.phase_timeout(), package.read_asset(&key));
            match read.await {
                Ok(Ok(Some(bytes))) => {
                    info!(asset = %key, bytes = bytes.len(), "Staged required asset");
                    cache.put(key, bytes);
                }
                Ok(Ok(None)) => {
                    warn!(asset = %key, "Required asset not found in package");
                    cache.record_missing(key);
                }
                Ok(Err(e)) => {
                    warn!(asset = %key, error = %e, "Required asset could not be read");
                    cache.record_missing(key);
                }
                Err(_) => {
                    warn!(asset = %key, "Reading required asset timed out");
                    cache.record_missing(key);
                }
            }
        }
        cache
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use std::time::Duration;

    use patch_shared::error::{AssemblyLoadError, ManifestError, MetadataPatchError};
    use patch_shared::manifest::{content_hash, manifest_file_name, version_file_name};

    use super::*;
    use crate::testing::{
        Fixture, MemoryTransport, RecordingHost, RecordingPatcher, RecordingProgress,
        RecordingScene, HOST,
    };

    struct Harness {
        fx: Fixture,
        mem: Arc<MemoryTransport>,
        patcher: Arc<RecordingPatcher>,
        host: Arc<RecordingHost>,
        scene: RecordingScene,
        progress: RecordingProgress,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                fx: Fixture::new(),
                mem: Arc::new(MemoryTransport::new()),
                patcher: Arc::new(RecordingPatcher::default()),
                host: Arc::new(RecordingHost::default()),
                scene: RecordingScene::default(),
                progress: RecordingProgress::default(),
            }
        }

        fn orchestrator(&self) -> BootstrapOrchestrator {
            BootstrapOrchestrator::new(
                self.fx.config.clone(),
                BootDeps {
                    transport: self.mem.clone(),
                    patcher: self.patcher.clone(),
                    code_host: self.host.clone(),
                    scene_loader: Box::new(self.scene.clone()),
                    progress: Box::new(self.progress.clone()),
                },
            )
        }

        fn snapshots(&self) -> Vec<DownloadProgress> {
            self.progress.snapshots.lock().unwrap().clone()
        }

        fn scenes(&self) -> Vec<String> {
            self.scene.scenes.lock().unwrap().clone()
        }
    }

    fn entered(history: &[BootState], wanted: &BootState) -> usize {
        history.iter().filter(|s| *s == wanted).count()
    }

    // =========================================================================
    // Scenario A: host-synced boot downloads everything
    // =========================================================================

    #[tokio::test]
    async fn host_boot_downloads_and_hands_off() {
        let h = Harness::new();
        h.mem.publish(
            "DefaultPackage",
            "v1",
            &[
                ("HotUpdate.dll", &[7u8; 100]),
                ("ui.bundle", &[1u8; 120]),
                ("audio.bundle", &[2u8; 80]),
            ],
        );
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Done(report) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(report.strategy, PlayStrategy::HostSynced);
        assert_eq!(report.version.as_str(), "v1");
        assert_eq!(report.download.done_bytes, 300);
        assert_eq!(report.download.total_bytes, 300);
        assert_eq!(report.module.name, "HotUpdate.dll");

        let snaps = h.snapshots();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps.last().unwrap().ratio(), 1.0);
        assert_eq!(h.scenes(), vec!["Main".to_string()]);
        assert_eq!(boot.state(), &BootState::Done);
    }

    #[tokio::test]
    async fn second_boot_finds_nothing_to_download() {
        let h = Harness::new();
        h.mem.publish("DefaultPackage", "v1", &[("HotUpdate.dll", b"code")]);
        assert!(h.orchestrator().run().await.is_done());

        let before = h.mem.requests(&format!("{HOST}/HotUpdate.dll"));
        let outcome = h.orchestrator().run().await;

        assert!(outcome.is_done());
        assert_eq!(h.mem.requests(&format!("{HOST}/HotUpdate.dll")), before);
        assert_eq!(*h.progress.nothing_to_download.lock().unwrap(), 1);
        assert_eq!(h.snapshots().last().unwrap().ratio(), 1.0);
    }

    // =========================================================================
    // Scenario B: version failure downgrades exactly once
    // =========================================================================

    #[tokio::test]
    async fn version_failure_downgrades_to_offline() {
        let h = Harness::new();
        h.mem.go_offline();
        h.fx.ship_builtin("b1", &[("HotUpdate.dll", b"shipped-code")]);
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Done(report) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(report.strategy, PlayStrategy::OfflineOnly);
        assert_eq!(report.version.as_str(), "b1");
        assert_eq!(report.attempts, 2);
        assert_eq!(boot.strategy(), PlayStrategy::OfflineOnly);

        let history = boot.history();
        assert_eq!(
            entered(
                history,
                &BootState::DowngradingStrategy {
                    from: PlayStrategy::HostSynced,
                    to: PlayStrategy::OfflineOnly
                }
            ),
            1
        );
        assert_eq!(
            entered(history, &BootState::InitializingPackage(PlayStrategy::OfflineOnly)),
            1
        );
        assert!(history.contains(&BootState::SynchronizingManifest));
    }

    #[tokio::test]
    async fn version_timeout_downgrades_once() {
        let mut h = Harness::new();
        h.fx.config.phase_timeout_ms = 50;
        h.mem.publish("DefaultPackage", "v1", &[("HotUpdate.dll", b"host-code")]);
        h.mem.delay(
            &format!("{HOST}/{}", version_file_name("DefaultPackage")),
            Duration::from_secs(2),
        );
        h.fx.ship_builtin("b1", &[("HotUpdate.dll", b"shipped-code")]);
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Done(report) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(report.strategy, PlayStrategy::OfflineOnly);
        assert_eq!(report.version.as_str(), "b1");
        let downgrades = boot
            .history()
            .iter()
            .filter(|s| matches!(s, BootState::DowngradingStrategy { .. }))
            .count();
        assert_eq!(downgrades, 1);
        assert_eq!(h.mem.requests(&format!("{HOST}/HotUpdate.dll")), 0);
    }

    #[tokio::test]
    async fn offline_version_failure_aborts_without_looping() {
        let mut h = Harness::new();
        h.fx.config.strategy = PlayStrategy::OfflineOnly;
        h.fx.config.max_boot_attempts = 10;
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(outcome, BootOutcome::Aborted(BootError::Network(_))));
        assert!(matches!(boot.state(), BootState::Aborted(BootError::Network(_))));
        let inits = boot
            .history()
            .iter()
            .filter(|s| matches!(s, BootState::InitializingPackage(_)))
            .count();
        assert_eq!(inits, 1);
        assert_eq!(h.mem.total_requests(), 0);
    }

    #[tokio::test]
    async fn downgraded_boot_without_builtin_content_aborts() {
        let h = Harness::new();
        h.mem.go_offline();
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(outcome, BootOutcome::Aborted(BootError::Network(_))));
        assert_eq!(boot.strategy(), PlayStrategy::OfflineOnly);
        assert!(h.scenes().is_empty());
    }

    #[tokio::test]
    async fn attempt_ceiling_stops_the_downgrade_loop() {
        let mut h = Harness::new();
        h.mem.go_offline();
        h.fx.config.max_boot_attempts = 1;
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(
            outcome,
            BootOutcome::Aborted(BootError::AttemptsExhausted(1))
        ));
    }

    // =========================================================================
    // Scenario C: missing AOT image still lets the dynamic module load
    // =========================================================================

    #[tokio::test]
    async fn missing_aot_image_does_not_block_dynamic_module() {
        let mut h = Harness::new();
        h.fx.config.aot_modules = vec!["mscorlib.dll".into(), "System.Core.dll".into()];
        let events = Arc::new(Mutex::new(Vec::new()));
        h.patcher = Arc::new(RecordingPatcher::with_events(events.clone()));
        h.host = Arc::new(RecordingHost::with_events(events.clone()));
        h.mem.publish(
            "DefaultPackage",
            "v3",
            &[("HotUpdate.dll", b"code"), ("mscorlib.dll", b"aot")],
        );
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Done(report) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        let results = &report.patch_report.results;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
        assert_eq!(
            results[1].outcome,
            Err(MetadataPatchError::AssetMissing("System.Core.dll".into()))
        );
        assert_eq!(report.missing_assets, vec!["System.Core.dll".to_string()]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "patch:mscorlib.dll".to_string(),
                "patch:System.Core.dll".to_string(),
                "load:HotUpdate.dll".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dynamic_module_failure_aborts_before_handoff() {
        let mut h = Harness::new();
        h.host = Arc::new(RecordingHost::failing());
        h.mem.publish("DefaultPackage", "v1", &[("HotUpdate.dll", b"code")]);
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(
            outcome,
            BootOutcome::Aborted(BootError::AssemblyLoad(AssemblyLoadError::Rejected { .. }))
        ));
        assert!(!boot.history().contains(&BootState::HandoffToApplication));
        assert!(h.scenes().is_empty());
    }

    // =========================================================================
    // Scenario D: manifest failure aborts before any download
    // =========================================================================

    #[tokio::test]
    async fn manifest_failure_aborts_without_downloading() {
        let h = Harness::new();
        h.mem.insert(
            &format!("{HOST}/PackageManifest_DefaultPackage.version"),
            b"v9",
        );
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(outcome, BootOutcome::Aborted(BootError::Manifest(_))));
        assert!(!boot.history().contains(&BootState::Downloading));
        assert!(!boot
            .history()
            .iter()
            .any(|s| matches!(s, BootState::DowngradingStrategy { .. })));
        assert!(h.snapshots().is_empty());
    }

    #[tokio::test]
    async fn manifest_timeout_aborts() {
        let mut h = Harness::new();
        h.fx.config.phase_timeout_ms = 50;
        h.mem.publish("DefaultPackage", "v1", &[("HotUpdate.dll", b"code")]);
        h.mem.delay(
            &format!("{HOST}/{}", manifest_file_name("DefaultPackage", &VersionToken::new("v1"))),
            Duration::from_secs(2),
        );
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(matches!(
            outcome,
            BootOutcome::Aborted(BootError::Manifest(ManifestError::Fetch(NetworkError::Timeout)))
        ));
        assert_eq!(boot.strategy(), PlayStrategy::HostSynced);
        assert!(!boot.history().contains(&BootState::Downloading));
    }

    #[tokio::test]
    async fn exhausted_download_aborts() {
        let mut h = Harness::new();
        h.fx.config.max_retries_per_file = 1;
        h.mem.publish("DefaultPackage", "v1", &[("HotUpdate.dll", b"code")]);
        h.mem.fail_times(&format!("{HOST}/HotUpdate.dll"), 5);
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Aborted(BootError::Download(err)) = outcome else {
            panic!("expected download abort, got {outcome:?}");
        };
        assert_eq!(err.failed[0].0, "HotUpdate.dll");
        assert_eq!(h.mem.requests(&format!("{HOST}/HotUpdate.dll")), 2);
        assert!(!boot.history().contains(&BootState::LoadingRequiredAssets));
    }

    // =========================================================================
    // Stale local copies
    // =========================================================================

    #[tokio::test]
    async fn stale_cached_module_is_not_loaded() {
        let h = Harness::new();
        h.fx.write_cache("HotUpdate.dll", b"old-code-v1");
        h.fx.ship_builtin("v2", &[("HotUpdate.dll", b"new-code-v2")]);
        h.mem.publish("DefaultPackage", "v2", &[("HotUpdate.dll", b"new-code-v2")]);
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Done(report) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(report.module.digest, content_hash(b"new-code-v2"));
        assert_eq!(h.mem.requests(&format!("{HOST}/HotUpdate.dll")), 0);
    }

    #[tokio::test]
    async fn corrupt_builtin_module_aborts_offline_boot() {
        let mut h = Harness::new();
        h.fx.config.strategy = PlayStrategy::OfflineOnly;
        h.fx.ship_builtin("b1", &[("HotUpdate.dll", b"shipped-code")]);
        h.fx.write_builtin("HotUpdate.dll", b"shipped-cod");
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        let BootOutcome::Aborted(BootError::AssemblyLoad(AssemblyLoadError::AssetMissing(module))) =
            outcome
        else {
            panic!("expected missing module abort, got {outcome:?}");
        };
        assert_eq!(module, "HotUpdate.dll");
        assert!(h.host.loaded().is_empty());
        assert!(h.scenes().is_empty());
    }

    // =========================================================================
    // Other strategies and re-entry
    // =========================================================================

    #[tokio::test]
    async fn simulated_boot_uses_local_files_only() {
        let mut h = Harness::new();
        h.fx.config.strategy = PlayStrategy::Simulated;
        h.fx.write_simulate("HotUpdate.dll", b"sim-code");
        let mut boot = h.orchestrator();

        let outcome = boot.run().await;

        assert!(outcome.is_done());
        assert_eq!(h.mem.total_requests(), 0);
        assert_eq!(h.host.loaded(), vec!["HotUpdate.dll".to_string()]);
    }

    #[tokio::test]
    async fn finished_orchestrator_does_not_rerun() {
        let h = Harness::new();
        h.mem.go_offline();
        let mut boot = h.orchestrator();
        let first = boot.run().await;
        let requests = h.mem.total_requests();

        let second = boot.run().await;

        assert!(matches!(first, BootOutcome::Aborted(_)));
        assert!(matches!(second, BootOutcome::Aborted(_)));
        assert_eq!(h.mem.total_requests(), requests);
    }
}
