//! Cache key derivation
//!
//! Keys are pure functions of the prefix, host OS, image name, platform,
//! remote digest and manifest fingerprint. A changed remote digest gives a
//! changed key, so a stale entry simply stops matching.

use crate::image::ImageMetadata;
use crate::platform::HostPlatform;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters that never appear in a key or a cache file name
pub const UNSAFE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replacement for unsafe characters
const SAFE_SEPARATOR: char = '-';

/// Joins key components
const KEY_DELIMITER: &str = "-";

/// Replace every unsafe character with a safe separator
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { SAFE_SEPARATOR } else { c })
        .collect()
}

/// Builds cache keys and scratch paths for one run
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
    host_os: String,
    host_platform: String,
    fingerprint: String,
    scratch_dir: PathBuf,
}

impl KeyBuilder {
    /// Create a key builder for the given host.
    ///
    /// Registry naming is used for the host components; a host outside the
    /// mapping table falls back to its raw `std::env::consts` names.
    pub fn new(
        prefix: impl Into<String>,
        host: &HostPlatform,
        fingerprint: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        let host_os = match host.registry_os() {
            Ok(os) => os.to_string(),
            Err(e) => {
                debug!("{}; using raw host os in cache keys", e);
                host.os.clone()
            }
        };
        let host_platform = match host.registry_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!("{}; using raw host platform in cache keys", e);
                host.raw_descriptor()
            }
        };

        Self {
            prefix: prefix.into(),
            host_os,
            host_platform,
            fingerprint: fingerprint.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Cache key for one resolved image:
    /// `prefix-hostOS-name-plt_platform-digest-fingerprint`
    pub fn build_key(&self, image: &ImageMetadata) -> String {
        let platform = image.platform().unwrap_or(&self.host_platform);

        [
            sanitize(&self.prefix),
            sanitize(&self.host_os),
            sanitize(&image.target.name),
            format!("plt_{}", sanitize(platform)),
            sanitize(&image.remote_digest),
            sanitize(&self.fingerprint),
        ]
        .join(KEY_DELIMITER)
    }

    /// Scratch archive path for one resolved image
    pub fn build_path(&self, image: &ImageMetadata) -> PathBuf {
        self.scratch_dir.join(format!("{}.tar", self.build_key(image)))
    }

    /// Directory holding scratch archives
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Manifest fingerprint baked into every key
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
