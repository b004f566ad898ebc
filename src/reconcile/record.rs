//! Per-image processing state and run-level aggregation

use crate::image::{ImageMetadata, ImageTarget};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Where an image is in the reconciliation protocol
///
/// ```text
/// Pending → DigestResolved → CacheHit → Loaded
///                                     → LoadFailed → (pull path)
///                          → CacheMiss → Pulled → DigestVerified → Saved
///                                               → DigestMismatch
///                                      → PullFailed
///         → DigestResolutionFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageState {
    Pending,
    DigestResolved,
    DigestResolutionFailed,
    CacheHit,
    CacheMiss,
    Loaded,
    LoadFailed,
    Pulled,
    PullFailed,
    DigestVerified,
    DigestMismatch,
    Saved,
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::DigestResolved => "digest resolved",
            Self::DigestResolutionFailed => "digest resolution failed",
            Self::CacheHit => "cache hit",
            Self::CacheMiss => "cache miss",
            Self::Loaded => "loaded",
            Self::LoadFailed => "load failed",
            Self::Pulled => "pulled",
            Self::PullFailed => "pull failed",
            Self::DigestVerified => "digest verified",
            Self::DigestMismatch => "digest mismatch",
            Self::Saved => "saved",
        };
        write!(f, "{}", name)
    }
}

/// Reported outcome of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageStatus {
    Cached,
    Pulled,
    Error,
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => write!(f, "cached"),
            Self::Pulled => write!(f, "pulled"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Mutable state of one image for the duration of a run
#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    pub target: ImageTarget,
    pub remote_digest: Option<String>,
    pub primary_key: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub state: ImageState,
    pub needs_pull: bool,
    pub success: bool,
    pub restored_from_cache: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl ProcessingRecord {
    pub fn new(target: ImageTarget) -> Self {
        Self {
            target,
            remote_digest: None,
            primary_key: None,
            cache_path: None,
            state: ImageState::Pending,
            needs_pull: false,
            success: false,
            restored_from_cache: false,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Record for a task that died before returning its own record
    pub fn crashed(target: ImageTarget, message: impl Into<String>) -> Self {
        let mut record = Self::new(target);
        record.error = Some(message.into());
        record
    }

    /// Attach the resolved digest and the cache location derived from it
    pub fn resolved(&mut self, image: &ImageMetadata, key: String, path: PathBuf) {
        self.remote_digest = Some(image.remote_digest.clone());
        self.primary_key = Some(key);
        self.cache_path = Some(path);
        self.advance(ImageState::DigestResolved);
    }

    /// Move to `state`
    pub fn advance(&mut self, state: ImageState) {
        debug!("{}: {} -> {}", self.target, self.state, state);
        self.state = state;
    }

    /// Mark the image unsuccessful
    pub fn fail(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error = Some(message.into());
    }

    /// Attach a recoverable condition
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn status(&self) -> ImageStatus {
        if !self.success {
            ImageStatus::Error
        } else if self.restored_from_cache {
            ImageStatus::Cached
        } else {
            ImageStatus::Pulled
        }
    }
}

/// Aggregate over all records of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub total_count: usize,
    pub cache_hit_count: usize,
    pub pulled_count: usize,
    pub error_count: usize,
    pub all_successful: bool,
    /// True iff at least one image was processed and none needed a pull
    pub all_from_cache: bool,
}

impl RunResult {
    pub fn from_records(records: &[ProcessingRecord]) -> Self {
        let total_count = records.len();
        let count = |status: ImageStatus| records.iter().filter(|r| r.status() == status).count();
        let cache_hit_count = count(ImageStatus::Cached);

        Self {
            total_count,
            cache_hit_count,
            pulled_count: count(ImageStatus::Pulled),
            error_count: count(ImageStatus::Error),
            all_successful: records.iter().all(|r| r.success),
            all_from_cache: total_count > 0 && cache_hit_count == total_count,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<ProcessingRecord>,
    pub result: RunResult,
}

impl RunReport {
    pub fn new(records: Vec<ProcessingRecord>) -> Self {
        let result = RunResult::from_records(&records);
        Self { records, result }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}
