//! Configuration schema for dockstash
//!
//! Configuration is stored at `~/.config/dockstash/config.toml`, with an
//! optional project-local `.dockstash.toml` layered on top.

use crate::orchestration::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache key and storage settings
    pub cache: CacheConfig,

    /// Container engine settings
    pub runtime: RuntimeConfig,

    /// Registry inspection settings
    pub registry: RegistryConfig,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix for every cache key
    pub prefix: String,

    /// Store root (default: `<cache_dir>/dockstash`)
    pub dir: Option<PathBuf>,

    /// Directory for transient image archives (default: `<tmp>/dockstash`)
    pub scratch_dir: Option<PathBuf>,

    /// `cache prune` removes entries older than N days (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "dockstash".to_string(),
            dir: None,
            scratch_dir: None,
            gc_days: 30,
        }
    }
}

impl CacheConfig {
    /// Effective store root
    pub fn store_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("dockstash")
        })
    }

    /// Effective scratch directory
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dockstash"))
    }
}

/// Container engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Engine used to pull, load and save images
    pub engine: Engine,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Docker,
        }
    }
}

/// Registry inspection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry inspection executable
    pub inspector: String,

    /// Verify registry TLS certificates
    pub tls_verify: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            inspector: "skopeo".to_string(),
            tls_verify: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[runtime]"));
        assert!(toml.contains("engine = \"docker\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.prefix, "dockstash");
        assert!(config.registry.tls_verify);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [runtime]
            engine = "podman"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.runtime.engine, Engine::Podman);
        assert_eq!(config.registry.inspector, "skopeo"); // default preserved
    }

    #[test]
    fn explicit_dirs_win() {
        let cache = CacheConfig {
            dir: Some(PathBuf::from("/srv/cache")),
            scratch_dir: Some(PathBuf::from("/srv/tmp")),
            ..CacheConfig::default()
        };
        assert_eq!(cache.store_dir(), PathBuf::from("/srv/cache"));
        assert_eq!(cache.scratch_dir(), PathBuf::from("/srv/tmp"));
    }

    #[test]
    fn default_dirs_end_in_product_name() {
        let cache = CacheConfig::default();
        assert!(cache.store_dir().ends_with("dockstash"));
        assert!(cache.scratch_dir().ends_with("dockstash"));
    }
}
