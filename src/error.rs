//! Error types for dockstash
//!
//! All modules use `DockstashResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dockstash operations
pub type DockstashResult<T> = Result<T, DockstashError>;

/// All errors that can occur in dockstash
#[derive(Error, Debug)]
pub enum DockstashError {
    // Input validation errors
    #[error("No manifest files given. Pass at least one with -f <compose.yml>")]
    NoManifests,

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    // Environment errors
    #[error("Required CLI not found: {name}. {hint}")]
    CliNotFound { name: String, hint: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Platform errors
    #[error("Invalid platform '{platform}': {reason}")]
    InvalidPlatform { platform: String, reason: String },

    #[error("No registry equivalent for host platform component: {0}")]
    UnmappablePlatform(String),

    // Image errors
    #[error("Digest resolution failed: {image}: {reason}")]
    DigestResolution { image: String, reason: String },

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Image load failed from {path}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("Image save failed: {image}: {reason}")]
    ImageSave { image: String, reason: String },

    #[error("Image inspect failed: {image}: {reason}")]
    ImageInspect { image: String, reason: String },

    // Cache store errors
    #[error("Cache restore failed for {key}: {reason}")]
    CacheRestore { key: String, reason: String },

    #[error("Cache save failed for {key}: {reason}")]
    CacheSave { key: String, reason: String },

    #[error("Cache entry not found: {0}")]
    CacheEntryNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl DockstashError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether this error belongs to the input-validation class.
    ///
    /// Only these are allowed to abort a run; everything else is scoped
    /// to a single image.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoManifests | Self::ManifestNotFound(_) | Self::ManifestInvalid { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoManifests => Some("Example: dockstash run -f docker-compose.yml"),
            Self::ManifestNotFound(_) => Some("Check the -f paths relative to the working directory"),
            Self::CliNotFound { .. } => Some("Install the tool or set its path in config.toml"),
            Self::UnmappablePlatform(_) => Some("Pass an explicit platform in the manifest"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DockstashError::ManifestNotFound(PathBuf::from("compose.yml"));
        assert!(err.to_string().contains("Manifest not found: compose.yml"));
    }

    #[test]
    fn error_hint() {
        assert!(DockstashError::NoManifests.hint().is_some());
        assert_eq!(DockstashError::User("x".to_string()).hint(), None);
    }

    #[test]
    fn only_validation_errors_are_fatal() {
        assert!(DockstashError::NoManifests.is_fatal());
        assert!(DockstashError::ManifestNotFound(PathBuf::from("a.yml")).is_fatal());
        assert!(!DockstashError::ImagePull {
            image: "nginx".to_string(),
            reason: "timeout".to_string(),
        }
        .is_fatal());
        assert!(!DockstashError::CacheSave {
            key: "k".to_string(),
            reason: "reservation conflict".to_string(),
        }
        .is_fatal());
    }
}
