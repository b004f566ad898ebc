//! Docker/Podman image runtime
//!
//! Implements the ImageRuntime trait by executing the engine CLI. Docker
//! and Podman accept the same arguments for every operation used here.

use crate::error::{DockstashError, DockstashResult};
use crate::orchestration::command_error_output;
use crate::orchestration::runtime::ImageRuntime;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported container engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Docker,
    Podman,
}

impl Engine {
    /// Executable name
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary())
    }
}

/// Image runtime driven through the engine CLI
pub struct EngineCliRuntime {
    engine: Engine,
}

impl EngineCliRuntime {
    /// Create a runtime for the given engine
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> DockstashResult<std::process::Output> {
        let binary = self.engine.binary();
        debug!("Executing: {} {:?}", binary, args);

        Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DockstashError::command_failed(format!("{} {:?}", binary, args), e))
    }
}

#[async_trait]
impl ImageRuntime for EngineCliRuntime {
    async fn ensure_ready(&self) -> DockstashResult<()> {
        let binary = self.engine.binary();
        let available = Command::new(binary)
            .args(["version", "--format", "{{.Client.Version}}"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);

        if available {
            Ok(())
        } else {
            Err(DockstashError::CliNotFound {
                name: binary.to_string(),
                hint: format!("Install {} or choose another engine with --engine", binary),
            })
        }
    }

    async fn pull(&self, image: &str, platform: Option<&str>) -> DockstashResult<()> {
        info!("Pulling image: {}", image);

        let mut args = vec!["pull"];
        if let Some(platform) = platform {
            args.extend(["--platform", platform]);
        }
        args.push(image);

        let output = self.exec(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DockstashError::ImagePull {
                image: image.to_string(),
                reason: command_error_output(&output),
            })
        }
    }

    async fn load(&self, archive: &Path) -> DockstashResult<()> {
        let archive_str = archive.to_string_lossy();
        let output = self.exec(&["load", "-i", &archive_str]).await?;

        if output.status.success() {
            debug!("Loaded {}", archive.display());
            Ok(())
        } else {
            Err(DockstashError::ImageLoad {
                path: archive.to_path_buf(),
                reason: command_error_output(&output),
            })
        }
    }

    async fn save(&self, archive: &Path, images: &[String]) -> DockstashResult<()> {
        if let Some(parent) = archive.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DockstashError::io(format!("creating {}", parent.display()), e)
            })?;
        }

        let archive_str = archive.to_string_lossy();
        let mut args = vec!["save", "-o", &*archive_str];
        args.extend(images.iter().map(String::as_str));

        let output = self.exec(&args).await?;
        if output.status.success() {
            info!("Saved {} to {}", images.join(", "), archive.display());
            Ok(())
        } else {
            Err(DockstashError::ImageSave {
                image: images.join(", "),
                reason: command_error_output(&output),
            })
        }
    }

    async fn local_digest(&self, image: &str) -> DockstashResult<Option<String>> {
        let output = self
            .exec(&["image", "inspect", "--format", "{{json .RepoDigests}}", image])
            .await?;

        if !output.status.success() {
            return Err(DockstashError::ImageInspect {
                image: image.to_string(),
                reason: command_error_output(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let digests: Option<Vec<String>> = serde_json::from_str(stdout.trim())?;
        Ok(select_repo_digest(&digests.unwrap_or_default(), image))
    }

    fn runtime_name(&self) -> &'static str {
        match self.engine {
            Engine::Docker => "Docker",
            Engine::Podman => "Podman",
        }
    }
}

/// Repository part of a reference: `reg:5000/a/b:tag@sha256:x` → `reg:5000/a/b`
pub(crate) fn repository_of(reference: &str) -> &str {
    let without_digest = reference.split('@').next().unwrap_or(reference);
    match without_digest.rfind(':') {
        Some(colon) if !without_digest[colon..].contains('/') => &without_digest[..colon],
        _ => without_digest,
    }
}

/// Registry qualifications Podman adds to Docker Hub references
const HUB_QUALIFIERS: [&str; 2] = ["docker.io/", "docker.io/library/"];

/// Pick the digest recorded for `image`'s repository out of `RepoDigests`.
///
/// An exact repository match wins. Podman records Docker Hub images fully
/// qualified (`docker.io/library/nginx@...`), so those forms are accepted
/// next. Falls back to the first entry.
pub(crate) fn select_repo_digest(repo_digests: &[String], image: &str) -> Option<String> {
    let repo = repository_of(image);

    let exact = repo_digests.iter().find(|entry| repository_of(entry) == repo);
    let qualified = || {
        repo_digests.iter().find(|entry| {
            let entry_repo = repository_of(entry);
            HUB_QUALIFIERS
                .iter()
                .any(|q| entry_repo.strip_prefix(q) == Some(repo))
        })
    };

    exact
        .or_else(qualified)
        .or_else(|| repo_digests.first())
        .and_then(|entry| entry.split_once('@'))
        .map(|(_, digest)| digest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_runtime_names() {
        assert_eq!(EngineCliRuntime::new(Engine::Docker).runtime_name(), "Docker");
        assert_eq!(EngineCliRuntime::new(Engine::Podman).runtime_name(), "Podman");
        assert_eq!(Engine::Podman.to_string(), "podman");
    }

    #[test]
    fn repository_strips_tag_and_digest() {
        assert_eq!(repository_of("nginx:latest"), "nginx");
        assert_eq!(repository_of("nginx"), "nginx");
        assert_eq!(repository_of("localhost:5000/app"), "localhost:5000/app");
        assert_eq!(repository_of("localhost:5000/app:1.0"), "localhost:5000/app");
        assert_eq!(repository_of("ghcr.io/o/a@sha256:abc"), "ghcr.io/o/a");
    }

    #[test]
    fn select_digest_prefers_matching_repository() {
        let digests = vec![
            "mirror.local/nginx@sha256:1111".to_string(),
            "nginx@sha256:2222".to_string(),
        ];
        assert_eq!(
            select_repo_digest(&digests, "nginx:latest").as_deref(),
            Some("sha256:2222")
        );
    }

    #[test]
    fn select_digest_ignores_mirror_suffix_match() {
        let digests = vec![
            "mirror.local/library/redis@sha256:5555".to_string(),
            "docker.io/library/redis@sha256:6666".to_string(),
        ];
        assert_eq!(
            select_repo_digest(&digests, "redis:7").as_deref(),
            Some("sha256:6666")
        );
    }

    #[test]
    fn select_digest_accepts_qualified_podman_names() {
        let digests = vec!["docker.io/library/redis@sha256:3333".to_string()];
        assert_eq!(
            select_repo_digest(&digests, "library/redis:7").as_deref(),
            Some("sha256:3333")
        );
    }

    #[test]
    fn select_digest_falls_back_to_first() {
        let digests = vec!["other@sha256:4444".to_string()];
        assert_eq!(
            select_repo_digest(&digests, "nginx").as_deref(),
            Some("sha256:4444")
        );
        assert_eq!(select_repo_digest(&[], "nginx"), None);
    }

    #[test]
    fn engine_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            engine: Engine,
        }
        let w: Wrapper = toml::from_str("engine = \"podman\"").unwrap();
        assert_eq!(w.engine, Engine::Podman);
    }
}
