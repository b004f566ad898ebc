//! dockstash - container image cache for CI
//!
//! Reads the images referenced by compose manifests, restores each one from
//! a content-addressed cache when the registry digest is unchanged, and
//! pulls and caches the rest.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod manifest;
pub mod orchestration;
pub mod platform;
pub mod reconcile;
pub mod report;
pub mod ui;

pub use error::{DockstashError, DockstashResult};
