//! Remote digest resolution
//!
//! Asks the origin registry for the content digest an image reference
//! currently points at, without pulling it.

use crate::error::{DockstashError, DockstashResult};
use crate::orchestration::command_error_output;
use crate::platform::PlatformSpec;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Resolves image references to their published content digest
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// Check the resolver's tooling is usable
    async fn ensure_ready(&self) -> DockstashResult<()>;

    /// Current remote digest of `image` for `platform` (host platform if `None`)
    async fn resolve(&self, image: &str, platform: Option<&str>) -> DockstashResult<Option<String>>;

    /// Human-readable resolver name for display
    fn resolver_name(&self) -> &'static str;
}

/// Resolver backed by `skopeo inspect`
pub struct SkopeoResolver {
    binary: String,
    tls_verify: bool,
}

impl SkopeoResolver {
    /// Create a resolver using the given skopeo executable
    pub fn new(binary: impl Into<String>, tls_verify: bool) -> Self {
        Self {
            binary: binary.into(),
            tls_verify,
        }
    }

    /// Arguments for `skopeo inspect` printing only the digest
    fn inspect_args(&self, image: &str, platform: Option<&str>) -> DockstashResult<Vec<String>> {
        let mut args = vec!["inspect".to_string()];

        if let Some(platform) = platform {
            let spec = PlatformSpec::parse(platform)?;
            args.push(format!("--override-os={}", spec.os));
            args.push(format!("--override-arch={}", spec.arch));
            if let Some(variant) = spec.variant {
                args.push(format!("--override-variant={}", variant));
            }
        }

        if !self.tls_verify {
            args.push("--tls-verify=false".to_string());
        }

        args.push("--format".to_string());
        args.push("{{.Digest}}".to_string());
        args.push(format!("docker://{}", image));
        Ok(args)
    }
}

#[async_trait]
impl DigestResolver for SkopeoResolver {
    async fn ensure_ready(&self) -> DockstashResult<()> {
        let available = Command::new(&self.binary)
            .arg("--version")
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
                name: self.binary.clone(),
                hint: "Install skopeo: https://github.com/containers/skopeo/blob/main/install.md"
                    .to_string(),
            })
        }
    }

    async fn resolve(&self, image: &str, platform: Option<&str>) -> DockstashResult<Option<String>> {
        let args = self.inspect_args(image, platform)?;
        debug!("Executing: {} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DockstashError::command_failed(format!("{} inspect", self.binary), e))?;

        if !output.status.success() {
            return Err(DockstashError::DigestResolution {
                image: image.to_string(),
                reason: command_error_output(&output),
            });
        }

        let digest = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(digest).filter(|d| !d.is_empty()))
    }

    fn resolver_name(&self) -> &'static str {
        "skopeo"
    }
}
