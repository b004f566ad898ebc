//! Plan command - show what a run would restore and what it would pull

use crate::cache::{CacheStore, KeyBuilder};
use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::commands::run::{key_builder, prepare};
use crate::config::Config;
use crate::error::DockstashResult;
use crate::image::{ImageMetadata, ImageTarget};
use crate::orchestration::{create_resolver, create_store, DigestResolver};
use crate::reconcile::gather;
use console::style;
use serde::Serialize;
use std::sync::Arc;

/// Expected outcome for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub platform: Option<String>,
    pub digest: Option<String>,
    pub cache_key: Option<String>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanEntry {
    fn new(target: &ImageTarget) -> Self {
        Self {
            name: target.name.clone(),
            platform: target.platform.clone(),
            digest: None,
            cache_key: None,
            cached: false,
            error: None,
        }
    }
}

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config) -> DockstashResult<()> {
    let prepared = prepare(&args.manifests).await?;

    let entries = if prepared.targets.is_empty() {
        Vec::new()
    } else {
        let resolver = create_resolver(config);
        resolver.ensure_ready().await?;
        let keys = key_builder(&args.manifests, config, &prepared.manifests.fingerprint);
        plan(resolver, create_store(config), keys, prepared.targets).await
    };

    match args.format {
        OutputFormat::Table => print_plan(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }

    Ok(())
}

/// Resolve every target and look its key up in the store
pub(crate) async fn plan(
    resolver: Arc<dyn DigestResolver>,
    store: Arc<dyn CacheStore>,
    keys: KeyBuilder,
    targets: Vec<ImageTarget>,
) -> Vec<PlanEntry> {
    let keys = Arc::new(keys);
    let tasks = targets.into_iter().map(|target| {
        let resolver = resolver.clone();
        let store = store.clone();
        let keys = keys.clone();
        let owned = target.clone();
        (target, async move { plan_one(&*resolver, &*store, &keys, owned).await })
    });

    gather(tasks)
        .await
        .into_iter()
        .map(|settled| {
            settled.outcome.unwrap_or_else(|failure| PlanEntry {
                error: Some(failure.message),
                ..PlanEntry::new(&settled.key)
            })
        })
        .collect()
}

async fn plan_one(
    resolver: &dyn DigestResolver,
    store: &dyn CacheStore,
    keys: &KeyBuilder,
    target: ImageTarget,
) -> PlanEntry {
    let mut entry = PlanEntry::new(&target);

    let digest = match resolver.resolve(&target.name, target.platform.as_deref()).await {
        Ok(Some(digest)) => digest,
        Ok(None) => {
            entry.error = Some("no remote digest".to_string());
            return entry;
        }
        Err(e) => {
            entry.error = Some(e.to_string());
            return entry;
        }
    };

    let image = ImageMetadata::new(target, digest);
    let key = keys.build_key(&image);
    match store.contains(&key).await {
        Ok(cached) => entry.cached = cached,
        Err(e) => entry.error = Some(e.to_string()),
    }
    entry.digest = Some(image.remote_digest);
    entry.cache_key = Some(key);
    entry
}

fn print_plan(entries: &[PlanEntry]) {
    if entries.is_empty() {
        println!("No images to process.");
        return;
    }

    for entry in entries {
        let target = match &entry.platform {
            Some(platform) => format!("{} ({})", entry.name, platform),
            None => entry.name.clone(),
        };
        let marker = match (&entry.error, entry.cached) {
            (Some(_), _) => style("error").red(),
            (None, true) => style("restore").green(),
            (None, false) => style("pull").yellow(),
        };
        println!("{:<8} {}", marker.to_string(), target);
        match (&entry.error, &entry.cache_key) {
            (Some(error), _) => println!("         {}", style(error).dim()),
            (None, Some(key)) => println!("         {}", style(key).dim()),
            (None, None) => {}
        }
    }

    let cached = entries.iter().filter(|e| e.cached).count();
    println!();
    println!("{} of {} image(s) cached", cached, entries.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCacheStore;
    use crate::error::DockstashError;
    use crate::platform::HostPlatform;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticResolver;

    #[async_trait]
    impl DigestResolver for StaticResolver {
        async fn ensure_ready(&self) -> DockstashResult<()> {
            Ok(())
        }

        async fn resolve(&self, image: &str, _platform: Option<&str>) -> DockstashResult<Option<String>> {
            match image {
                "nginx:latest" => Ok(Some("sha256:aaa".to_string())),
                "scratch:none" => Ok(None),
                _ => Err(DockstashError::DigestResolution {
                    image: image.to_string(),
                    reason: "not found".to_string(),
                }),
            }
        }

        fn resolver_name(&self) -> &'static str {
            "static"
        }
    }

    #[tokio::test]
    async fn plan_reports_cached_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let host = HostPlatform::new_for_testing("linux", "x86_64");
        let keys = KeyBuilder::new("dockstash", &host, "0123456789ab", dir.path().join("scratch"));

        let blob = dir.path().join("blob.tar");
        tokio::fs::write(&blob, b"image").await.unwrap();
        let cached = ImageMetadata::new(ImageTarget::new("nginx:latest", None), "sha256:aaa");
        let key = keys.build_key(&cached);
        store.save(&key, &blob).await.unwrap();

        let targets = vec![
            ImageTarget::new("nginx:latest", None),
            ImageTarget::new("nginx:latest", Some("linux/arm64".to_string())),
            ImageTarget::new("scratch:none", None),
            ImageTarget::new("ghost:1", None),
        ];
        let entries = plan(Arc::new(StaticResolver), Arc::new(store), keys, targets).await;

        assert!(entries[0].cached);
        assert_eq!(entries[0].cache_key.as_deref(), Some(key.as_str()));
        assert!(!entries[1].cached);
        assert!(entries[1].error.is_none());
        assert_eq!(entries[2].error.as_deref(), Some("no remote digest"));
        assert!(entries[3].error.as_deref().unwrap().contains("ghost:1"));
        assert!(entries[3].cache_key.is_none());
    }
}
