//! Reconciliation engine
//!
//! Runs the per-image protocol for every target concurrently and folds the
//! settled records into a [`RunReport`]. Only the bootstrap may abort a run;
//! inside the engine every collaborator error is downgraded to a warning or
//! an error on that image's record.

use crate::cache::{CacheStore, KeyBuilder};
use crate::image::{ImageMetadata, ImageTarget};
use crate::orchestration::{DigestResolver, ImageRuntime};
use crate::reconcile::gather::gather;
use crate::reconcile::record::{ImageState, ProcessingRecord, RunReport};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Callback invoked once per settled image
pub type ProgressObserver = Arc<dyn Fn(&ProcessingRecord) + Send + Sync>;

/// Per-run engine switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Trust a restored image without comparing its local digest
    pub skip_latest_check: bool,
}

/// Drives images from manifest target to loaded-and-cached
#[derive(Clone)]
pub struct Reconciler {
    resolver: Arc<dyn DigestResolver>,
    store: Arc<dyn CacheStore>,
    runtime: Arc<dyn ImageRuntime>,
    keys: Arc<KeyBuilder>,
    options: ReconcileOptions,
    observer: Option<ProgressObserver>,
}

impl Reconciler {
    pub fn new(
        resolver: Arc<dyn DigestResolver>,
        store: Arc<dyn CacheStore>,
        runtime: Arc<dyn ImageRuntime>,
        keys: KeyBuilder,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            resolver,
            store,
            runtime,
            keys: Arc::new(keys),
            options,
            observer: None,
        }
    }

    /// Report each image as soon as it settles
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Process every target and aggregate the outcome.
    ///
    /// Targets are expected to be filtered and deduplicated already. Targets
    /// sharing a name (one per platform) run one after another, since the
    /// runtime tags every platform variant under the same name.
    pub async fn run(&self, targets: Vec<ImageTarget>) -> RunReport {
        if targets.is_empty() {
            info!("No images to process");
            return RunReport::empty();
        }

        info!(
            "Reconciling {} image(s) via {} / {} / {}",
            targets.len(),
            self.resolver.resolver_name(),
            self.store.store_name(),
            self.runtime.runtime_name()
        );

        let mut name_locks: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
        let tasks = targets.into_iter().map(|target| {
            let this = self.clone();
            let owned = target.clone();
            let lock = name_locks.entry(target.name.clone()).or_default().clone();
            (target, async move {
                let _guard = lock.lock().await;
                this.process(owned).await
            })
        });

        let records = gather(tasks)
            .await
            .into_iter()
            .map(|settled| match settled.outcome {
                Ok(record) => record,
                Err(failure) => {
                    error!("{}: {}", settled.key, failure.message);
                    let record = ProcessingRecord::crashed(settled.key, failure.message);
                    self.notify(&record);
                    record
                }
            })
            .collect();

        RunReport::new(records)
    }

    async fn process(&self, target: ImageTarget) -> ProcessingRecord {
        let mut record = ProcessingRecord::new(target);
        self.drive(&mut record).await;
        self.notify(&record);
        record
    }

    fn notify(&self, record: &ProcessingRecord) {
        if let Some(observer) = &self.observer {
            observer(record);
        }
    }

    async fn drive(&self, record: &mut ProcessingRecord) {
        let target = record.target.clone();

        let digest = match self
            .resolver
            .resolve(&target.name, target.platform.as_deref())
            .await
        {
            Ok(Some(digest)) => digest,
            Ok(None) => {
                let message = format!("No remote digest for {}", record.target);
                self.unresolved(record, message);
                return;
            }
            Err(e) => {
                let message = format!("Digest resolution failed for {}: {}", record.target, e);
                self.unresolved(record, message);
                return;
            }
        };

        let image = ImageMetadata::new(target, digest);
        let key = self.keys.build_key(&image);
        let path = self.keys.build_path(&image);
        record.resolved(&image, key.clone(), path.clone());

        let restored = self.restore(record, &key, &path).await;
        record.needs_pull = !restored;

        if restored {
            record.advance(ImageState::CacheHit);
            let loaded = self.load(record, &path, &image.remote_digest).await;
            discard_scratch(&path).await;
            if loaded {
                return;
            }
            record.needs_pull = true;
        } else {
            record.advance(ImageState::CacheMiss);
        }

        if let Err(e) = self.runtime.pull(&image.target.name, image.platform()).await {
            error!("Failed to pull {}: {}", record.target, e);
            record.advance(ImageState::PullFailed);
            record.fail(e.to_string());
            return;
        }
        record.advance(ImageState::Pulled);
        record.success = true;

        if !self.verify(record, &image.remote_digest).await {
            return;
        }

        self.save(record, &key, &path).await;
        discard_scratch(&path).await;
    }

    fn unresolved(&self, record: &mut ProcessingRecord, message: String) {
        warn!("{}", message);
        record.advance(ImageState::DigestResolutionFailed);
        record.warn(message.clone());
        record.fail(message);
    }

    /// Restore `key` into `path`; only a hit with the archive on disk counts
    async fn restore(&self, record: &mut ProcessingRecord, key: &str, path: &Path) -> bool {
        match self.store.restore(key, path).await {
            Ok(true) => {
                if fs::try_exists(path).await.unwrap_or(false) {
                    true
                } else {
                    debug!("{}: store hit without archive, treating as miss", record.target);
                    false
                }
            }
            Ok(false) => false,
            Err(e) => {
                let message = format!("Cache restore failed for {}: {}", record.target, e);
                warn!("{}", message);
                record.warn(message);
                false
            }
        }
    }

    /// Load a restored archive; `false` demotes the image to the pull path
    async fn load(&self, record: &mut ProcessingRecord, path: &Path, digest: &str) -> bool {
        if let Err(e) = self.runtime.load(path).await {
            let message = format!("Failed to load {} from cache: {}", record.target, e);
            warn!("{}", message);
            record.warn(message);
            record.advance(ImageState::LoadFailed);
            return false;
        }

        if !self.options.skip_latest_check {
            match self.runtime.local_digest(&record.target.name).await {
                Ok(Some(local)) if local != digest => {
                    let message = format!(
                        "Cached {} is stale (local {}, remote {}), pulling",
                        record.target, local, digest
                    );
                    warn!("{}", message);
                    record.warn(message);
                    record.advance(ImageState::LoadFailed);
                    return false;
                }
                Ok(_) => {}
                Err(e) => debug!("{}: local digest unavailable after load: {}", record.target, e),
            }
        }

        info!("Loaded {} from cache", record.target);
        record.advance(ImageState::Loaded);
        record.restored_from_cache = true;
        record.success = true;
        true
    }

    /// Compare the pulled image against the resolved digest
    async fn verify(&self, record: &mut ProcessingRecord, digest: &str) -> bool {
        let message = match self.runtime.local_digest(&record.target.name).await {
            Ok(Some(local)) if local == digest => {
                record.advance(ImageState::DigestVerified);
                return true;
            }
            Ok(Some(local)) => format!(
                "Digest mismatch for {}: expected {}, found {}; not caching",
                record.target, digest, local
            ),
            Ok(None) => format!(
                "No local digest for {} (expected {}); not caching",
                record.target, digest
            ),
            Err(e) => format!(
                "Could not verify digest of {} (expected {}): {}; not caching",
                record.target, digest, e
            ),
        };

        warn!("{}", message);
        record.warn(message);
        record.advance(ImageState::DigestMismatch);
        false
    }

    async fn save(&self, record: &mut ProcessingRecord, key: &str, path: &Path) {
        let images = [record.target.name.clone()];
        let result = match self.runtime.save(path, &images).await {
            Ok(()) => self.store.save(key, path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Cached {} as {}", record.target, key);
                record.advance(ImageState::Saved);
            }
            Err(e) => {
                let message = format!("Failed to cache {}: {}", record.target, e);
                warn!("{}", message);
                record.warn(message);
            }
        }
    }
}

/// Remove a scratch archive, ignoring failures
async fn discard_scratch(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove {}: {}", path.display(), e),
    }
}
