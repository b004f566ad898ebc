//! Collaborator factory
//!
//! Builds the runtime, resolver and cache store a run is wired with.

use crate::cache::{CacheStore, LocalCacheStore};
use crate::config::Config;
use crate::orchestration::engine_cli::{Engine, EngineCliRuntime};
use crate::orchestration::resolver::{DigestResolver, SkopeoResolver};
use crate::orchestration::runtime::ImageRuntime;
use std::sync::Arc;

/// Create the image runtime, preferring `engine` over the configured one
pub fn create_runtime(config: &Config, engine: Option<Engine>) -> Arc<dyn ImageRuntime> {
    let engine = engine.unwrap_or(config.runtime.engine);
    Arc::new(EngineCliRuntime::new(engine))
}

/// Create the registry digest resolver
pub fn create_resolver(config: &Config) -> Arc<dyn DigestResolver> {
    Arc::new(SkopeoResolver::new(
        config.registry.inspector.clone(),
        config.registry.tls_verify,
    ))
}

/// Create the cache store
pub fn create_store(config: &Config) -> Arc<dyn CacheStore> {
    Arc::new(LocalCacheStore::new(config.cache.store_dir()))
}
