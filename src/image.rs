//! Image targets and pre-processing
//!
//! An image target is a `(name, platform)` pair read from a manifest.
//! Before reconciliation the list is filtered against the exclusion set
//! and deduplicated.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// An image to cache, optionally pinned to a platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageTarget {
    /// Image reference as written in the manifest (e.g. `nginx:latest`)
    pub name: String,
    /// `os/arch[/variant]`; `None` means the host platform
    pub platform: Option<String>,
}

impl ImageTarget {
    pub fn new(name: impl Into<String>, platform: Option<String>) -> Self {
        Self {
            name: name.into(),
            platform,
        }
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.platform {
            Some(platform) => write!(f, "{} ({})", self.name, platform),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An image target together with its resolved remote digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub target: ImageTarget,
    /// Opaque content digest, e.g. `sha256:<hex>`
    pub remote_digest: String,
}

impl ImageMetadata {
    pub fn new(target: ImageTarget, remote_digest: impl Into<String>) -> Self {
        Self {
            target,
            remote_digest: remote_digest.into(),
        }
    }

    /// Requested platform, if pinned
    pub fn platform(&self) -> Option<&str> {
        self.target.platform.as_deref()
    }
}

/// Drop excluded images and duplicate `(name, platform)` pairs.
///
/// Exclusion matches on the name only, so excluding a name removes every
/// platform variant of it. The first occurrence of each pair is kept.
pub fn select_targets(targets: Vec<ImageTarget>, exclude: &[String]) -> Vec<ImageTarget> {
    let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    targets
        .into_iter()
        .filter(|t| !excluded.contains(t.name.as_str()))
        .filter(|t| seen.insert((t.name.clone(), t.platform.clone())))
        .collect()
}
