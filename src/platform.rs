//! Host and target platform handling
//!
//! Hosts name themselves with Rust's `std::env::consts` identifiers while
//! registries use OCI identifiers. The mapping between the two is a closed
//! table; anything outside it is reported as unmappable instead of being
//! passed through.

use crate::error::{DockstashError, DockstashResult};
use std::fmt;

/// Map a host OS identifier to its registry OS identifier
pub fn registry_os(host_os: &str) -> DockstashResult<&'static str> {
    match host_os {
        "linux" => Ok("linux"),
        "macos" => Ok("darwin"),
        "windows" => Ok("windows"),
        "freebsd" => Ok("freebsd"),
        other => Err(DockstashError::UnmappablePlatform(format!("os {}", other))),
    }
}

/// Map a host architecture identifier to its registry architecture identifier
pub fn registry_arch(host_arch: &str) -> DockstashResult<&'static str> {
    match host_arch {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        "arm" => Ok("arm"),
        "x86" => Ok("386"),
        "s390x" => Ok("s390x"),
        "riscv64" => Ok("riscv64"),
        #[cfg(target_endian = "little")]
        "powerpc64" => Ok("ppc64le"),
        other => Err(DockstashError::UnmappablePlatform(format!("arch {}", other))),
    }
}

/// The platform of the machine dockstash runs on, in host naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: String,
    pub arch: String,
}

impl HostPlatform {
    /// Detect the current host
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_testing(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Registry-side OS name
    pub fn registry_os(&self) -> DockstashResult<&'static str> {
        registry_os(&self.os)
    }

    /// Registry-side `os_arch` descriptor
    pub fn registry_descriptor(&self) -> DockstashResult<String> {
        Ok(format!(
            "{}_{}",
            registry_os(&self.os)?,
            registry_arch(&self.arch)?
        ))
    }

    /// Raw `os_arch` descriptor in host naming
    pub fn raw_descriptor(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

/// A parsed `os/arch[/variant]` platform string as written in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSpec {
    pub os: String,
    pub arch: String,
    pub variant: Option<String>,
}

impl PlatformSpec {
    /// Parse a platform string such as `linux/arm64/v8`
    pub fn parse(platform: &str) -> DockstashResult<Self> {
        let invalid = |reason: &str| DockstashError::InvalidPlatform {
            platform: platform.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = platform.trim().split('/').collect();
        match parts.as_slice() {
            [os, arch] | [os, arch, _] if os.is_empty() || arch.is_empty() => {
                Err(invalid("os and architecture must not be empty"))
            }
            [os, arch] => Ok(Self {
                os: os.to_string(),
                arch: arch.to_string(),
                variant: None,
            }),
            [_, _, variant] if variant.is_empty() => Err(invalid("variant must not be empty")),
            [os, arch, variant] => Ok(Self {
                os: os.to_string(),
                arch: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(invalid("expected os/arch or os/arch/variant")),
        }
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.arch, variant),
            None => write!(f, "{}/{}", self.os, self.arch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_hosts() {
        assert_eq!(registry_os("macos").unwrap(), "darwin");
        assert_eq!(registry_os("linux").unwrap(), "linux");
        assert_eq!(registry_arch("x86_64").unwrap(), "amd64");
        assert_eq!(registry_arch("aarch64").unwrap(), "arm64");
        assert_eq!(registry_arch("x86").unwrap(), "386");
    }

    #[test]
    fn unknown_host_is_unmappable() {
        assert!(matches!(
            registry_os("haiku"),
            Err(DockstashError::UnmappablePlatform(_))
        ));
        assert!(matches!(
            registry_arch("mips"),
            Err(DockstashError::UnmappablePlatform(_))
        ));
    }

    #[test]
    fn host_descriptors() {
        let host = HostPlatform::new_for_testing("macos", "aarch64");
        assert_eq!(host.registry_descriptor().unwrap(), "darwin_arm64");
        assert_eq!(host.raw_descriptor(), "macos_aarch64");

        let odd = HostPlatform::new_for_testing("haiku", "x86_64");
        assert!(odd.registry_descriptor().is_err());
    }

    #[test]
    fn detect_matches_consts() {
        let host = HostPlatform::detect();
        assert_eq!(host.os, std::env::consts::OS);
        assert_eq!(host.arch, std::env::consts::ARCH);
    }

    #[test]
    fn parse_platform_strings() {
        let spec = PlatformSpec::parse("linux/amd64").unwrap();
        assert_eq!(spec.os, "linux");
        assert_eq!(spec.arch, "amd64");
        assert_eq!(spec.variant, None);

        let spec = PlatformSpec::parse("linux/arm64/v8").unwrap();
        assert_eq!(spec.variant.as_deref(), Some("v8"));
        assert_eq!(spec.to_string(), "linux/arm64/v8");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(PlatformSpec::parse("linux").is_err());
        assert!(PlatformSpec::parse("linux/").is_err());
        assert!(PlatformSpec::parse("/amd64").is_err());
        assert!(PlatformSpec::parse("linux/arm/").is_err());
        assert!(PlatformSpec::parse("a/b/c/d").is_err());
    }
}
