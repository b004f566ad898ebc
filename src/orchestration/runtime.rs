//! Container image runtime abstraction
//!
//! Provides a trait for the image operations the cache needs, implemented
//! by CLI-driven backends (Docker, Podman) and by in-memory fakes in tests.

use crate::error::DockstashResult;
use async_trait::async_trait;
use std::path::Path;

/// Abstract container image runtime
///
/// Implementations must tolerate concurrent calls for different images.
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// Check the runtime can be driven on this system
    async fn ensure_ready(&self) -> DockstashResult<()>;

    /// Pull an image, optionally for a specific `os/arch[/variant]`
    async fn pull(&self, image: &str, platform: Option<&str>) -> DockstashResult<()>;

    /// Load images from an archive produced by [`ImageRuntime::save`]
    async fn load(&self, archive: &Path) -> DockstashResult<()>;

    /// Export images to an archive
    async fn save(&self, archive: &Path, images: &[String]) -> DockstashResult<()>;

    /// Content digest of a locally present image, if the runtime records one
    async fn local_digest(&self, image: &str) -> DockstashResult<Option<String>>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
