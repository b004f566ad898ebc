//! Compose manifest reading
//!
//! Extracts `(image, platform)` pairs from compose-style YAML files and
//! fingerprints the whole manifest set. Same manifests = same fingerprint.

use crate::error::{DockstashError, DockstashResult};
use crate::image::ImageTarget;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level compose document; everything except services is ignored
#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: Option<serde_yaml::Mapping>,
}

/// The parts of a service definition that matter for image caching
#[derive(Debug, Default, Deserialize)]
struct ServiceSpec {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

/// All manifests of one run, parsed
#[derive(Debug, Clone)]
pub struct ManifestSet {
    /// Manifest paths in the order they were given
    pub paths: Vec<PathBuf>,
    /// Image targets in manifest order, duplicates included
    pub targets: Vec<ImageTarget>,
    /// Hash over all manifest contents (first 12 hex chars)
    pub fingerprint: String,
}

/// Check that manifests were given and that every one exists.
///
/// Runs before anything else touches the network or the cache.
pub fn validate_paths(paths: &[PathBuf]) -> DockstashResult<()> {
    if paths.is_empty() {
        return Err(DockstashError::NoManifests);
    }

    for path in paths {
        if !path.is_file() {
            return Err(DockstashError::ManifestNotFound(path.clone()));
        }
    }

    Ok(())
}

/// Validate, read and parse every manifest, and fingerprint the set
pub async fn load(paths: &[PathBuf]) -> DockstashResult<ManifestSet> {
    validate_paths(paths)?;

    let mut contents = Vec::with_capacity(paths.len());
    let mut targets = Vec::new();

    for path in paths {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            DockstashError::io(format!("reading manifest {}", path.display()), e)
        })?;

        let text = String::from_utf8_lossy(&bytes);
        let found = parse_compose(&text, path, |name| std::env::var(name).ok())?;
        debug!("Found {} image(s) in {}", found.len(), path.display());

        targets.extend(found);
        contents.push((path.clone(), bytes));
    }

    Ok(ManifestSet {
        paths: paths.to_vec(),
        targets,
        fingerprint: fingerprint(&contents),
    })
}

/// Extract image targets from one compose document.
///
/// Services without an `image` (build-only services) are skipped.
pub fn parse_compose(
    content: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> DockstashResult<Vec<ImageTarget>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let invalid = |reason: String| DockstashError::ManifestInvalid {
        path: path.to_path_buf(),
        reason,
    };

    let compose: ComposeFile = serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

    let mut targets = Vec::new();
    for (service, value) in compose.services.unwrap_or_default() {
        if value.is_null() {
            continue;
        }

        let spec: ServiceSpec = serde_yaml::from_value(value).map_err(|e| {
            let name = service.as_str().unwrap_or("<non-string>");
            invalid(format!("service {}: {}", name, e))
        })?;

        let Some(image) = spec.image else {
            continue;
        };

        let image = interpolate(&image, &lookup);
        if image.is_empty() {
            continue;
        }

        let platform = spec
            .platform
            .map(|p| interpolate(&p, &lookup))
            .filter(|p| !p.is_empty());

        targets.push(ImageTarget::new(image, platform));
    }

    Ok(targets)
}

/// Expand `$VAR`, `${VAR}`, `${VAR:-default}` and `${VAR-default}`.
///
/// `$$` is a literal dollar. Unset variables without a default expand to
/// the empty string.
pub fn interpolate(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            continue;
        }

        if let Some(body) = after.strip_prefix('{') {
            match body.find('}') {
                Some(end) => {
                    out.push_str(&expand_braced(&body[..end], &lookup));
                    rest = &body[end + 1..];
                }
                None => {
                    // Unterminated, keep as written
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if name_len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..name_len]).unwrap_or_default());
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}

fn expand_braced(expr: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    if let Some((name, default)) = expr.split_once(":-") {
        return lookup(name)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string());
    }

    if let Some((name, default)) = expr.split_once('-') {
        return lookup(name).unwrap_or_else(|| default.to_string());
    }

    lookup(expr).unwrap_or_default()
}

/// Hash the manifest set: contents concatenated in path order, SHA256,
/// first 12 hex characters.
pub fn fingerprint(contents: &[(PathBuf, Vec<u8>)]) -> String {
    let mut sorted: Vec<&(PathBuf, Vec<u8>)> = contents.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (_, bytes) in sorted {
        hasher.update(bytes);
    }
    let result = hasher.finalize();

    hex::encode(&result[..6])
}
