//! Cache command - inspect and clean the image cache

use crate::cache::{format_bytes, CacheEntry, CacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::DockstashResult;
use crate::orchestration::create_store;
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DockstashResult<()> {
    let store = create_store(config);
    debug!("Cache root: {}", config.cache.store_dir().display());

    match args.action {
        CacheAction::List { format } => list_entries(&*store, format).await,
        CacheAction::Prune { days, dry_run } => {
            prune_entries(&*store, days.unwrap_or(config.cache.gc_days), dry_run).await
        }
        CacheAction::Clear { yes } => clear_entries(&*store, yes).await,
    }
}

async fn list_entries(store: &dyn CacheStore, format: OutputFormat) -> DockstashResult<()> {
    let entries = store.list().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Table if entries.is_empty() => println!("No cached images."),
        OutputFormat::Table => print_entry_table(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!("{:<18} {:>10}  {}", "CREATED", "SIZE", "KEY");
    println!("{}", "-".repeat(80));

    for entry in entries {
        println!(
            "{:<18} {:>10}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            format_bytes(entry.size_bytes),
            entry.key
        );
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!();
    println!("Total: {} entr(ies), {}", entries.len(), format_bytes(total));
}

/// Entries older than `days`; `days == 0` disables pruning
fn prunable(entries: Vec<CacheEntry>, days: u32) -> Vec<CacheEntry> {
    if days == 0 {
        return Vec::new();
    }
    entries
        .into_iter()
        .filter(|e| e.is_older_than_days(days))
        .collect()
}

async fn prune_entries(store: &dyn CacheStore, days: u32, dry_run: bool) -> DockstashResult<()> {
    if days == 0 {
        println!("Cache pruning is disabled (gc_days = 0)");
        return Ok(());
    }

    let to_remove = prunable(store.list().await?, days);
    if to_remove.is_empty() {
        println!("No cache entries older than {} days.", days);
        return Ok(());
    }

    println!(
        "Found {} entr(ies) older than {} days:",
        to_remove.len(),
        days
    );
    for entry in &to_remove {
        let age_days = (Utc::now() - entry.created_at).num_days();
        println!("  {} {} ({} days old)", style("•").red(), entry.key, age_days);
    }

    if dry_run {
        println!();
        println!("Dry run - nothing removed.");
        return Ok(());
    }

    remove_all(store, &to_remove).await
}

async fn clear_entries(store: &dyn CacheStore, yes: bool) -> DockstashResult<()> {
    let entries = store.list().await?;
    if entries.is_empty() {
        println!("No cached images to clear.");
        return Ok(());
    }

    println!("This will remove {} cache entr(ies):", entries.len());
    for entry in &entries {
        println!("  {} {}", style("•").red(), entry.key);
    }
    println!();

    let ctx = UiContext::detect().with_auto_yes(yes);
    if !ui::confirm(&ctx, "Remove these entries?", false).await? {
        println!("Aborted.");
        return Ok(());
    }

    remove_all(store, &entries).await
}

async fn remove_all(store: &dyn CacheStore, entries: &[CacheEntry]) -> DockstashResult<()> {
    print!("Removing entries... ");
    let _ = io::stdout().flush();

    let mut freed = 0;
    for entry in entries {
        debug!("Removing cache entry: {}", entry.key);
        store.remove(&entry.key).await?;
        freed += entry.size_bytes;
    }

    println!(
        "{} removed {} entr(ies), freed {}",
        style("✓").green(),
        entries.len(),
        format_bytes(freed)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCacheStore;
    use chrono::Duration;
    use tempfile::TempDir;

    fn entry(key: &str, age_days: i64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            created_at: Utc::now() - Duration::days(age_days),
            size_bytes: 1024,
        }
    }

    #[test]
    fn prunable_filters_by_age() {
        let entries = vec![entry("old", 40), entry("new", 1)];
        let keys: Vec<String> = prunable(entries, 30).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["old"]);
    }

    #[test]
    fn prunable_disabled_at_zero() {
        assert!(prunable(vec![entry("old", 400)], 0).is_empty());
    }

    #[tokio::test]
    async fn clear_with_yes_empties_store() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let blob = dir.path().join("blob.tar");
        tokio::fs::write(&blob, b"image").await.unwrap();
        store.save("key-a", &blob).await.unwrap();
        store.save("key-b", &blob).await.unwrap();

        clear_entries(&store, true).await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_dry_run_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        let blob = dir.path().join("blob.tar");
        tokio::fs::write(&blob, b"image").await.unwrap();
        store.save("key-a", &blob).await.unwrap();

        prune_entries(&store, 1, true).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
