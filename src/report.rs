//! Run reporting
//!
//! Turns a [`RunReport`] into per-image rows for the terminal table, the
//! JSON report and the CI step outputs (`cache-hit`, `image-list`).

use crate::error::{DockstashError, DockstashResult};
use crate::reconcile::{ImageStatus, ProcessingRecord, RunReport, RunResult};
use console::style;
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// One image as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub name: String,
    pub platform: Option<String>,
    pub status: ImageStatus,
    pub digest: Option<String>,
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&ProcessingRecord> for ImageReport {
    fn from(record: &ProcessingRecord) -> Self {
        Self {
            name: record.target.name.clone(),
            platform: record.target.platform.clone(),
            status: record.status(),
            digest: record.remote_digest.clone(),
            cache_key: record.primary_key.clone(),
            error: record.error.clone(),
            warnings: record.warnings.clone(),
        }
    }
}

/// Whole-run JSON document
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub cache_hit: bool,
    #[serde(flatten)]
    pub summary: RunResult,
    pub images: Vec<ImageReport>,
}

pub fn image_reports(report: &RunReport) -> Vec<ImageReport> {
    report.records.iter().map(ImageReport::from).collect()
}

pub fn to_json(report: &RunReport) -> DockstashResult<String> {
    let doc = JsonReport {
        cache_hit: report.result.all_from_cache,
        summary: report.result,
        images: image_reports(report),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Print the per-image table
pub fn print_table(report: &RunReport) {
    println!(
        "{:<40} {:<14} {:<8} {:<20}",
        "IMAGE", "PLATFORM", "STATUS", "DIGEST"
    );
    println!("{}", "-".repeat(84));

    for row in image_reports(report) {
        let status = match row.status {
            ImageStatus::Cached => style("cached").green().to_string(),
            ImageStatus::Pulled => style("pulled").yellow().to_string(),
            ImageStatus::Error => style("error").red().to_string(),
        };
        println!(
            "{:<40} {:<14} {:<8} {:<20}",
            row.name,
            row.platform.as_deref().unwrap_or("host"),
            status,
            short_digest(row.digest.as_deref()),
        );
        if let Some(error) = &row.error {
            println!("  {} {}", style("•").red(), error);
        }
        for warning in &row.warnings {
            println!("  {} {}", style("•").yellow(), warning);
        }
    }

    let result = &report.result;
    println!();
    println!(
        "Total: {} image(s), {} cached, {} pulled, {} failed",
        result.total_count, result.cache_hit_count, result.pulled_count, result.error_count
    );
}

/// `sha256:0123456789ab` form of a digest
fn short_digest(digest: Option<&str>) -> String {
    match digest {
        None => "-".to_string(),
        Some(d) => match d.split_once(':') {
            Some((algo, hex)) if hex.len() > 12 => format!("{}:{}", algo, &hex[..12]),
            _ => d.to_string(),
        },
    }
}

/// Render the CI step outputs
pub fn step_outputs(report: &RunReport) -> DockstashResult<String> {
    let images = serde_json::to_string(&image_reports(report))?;
    Ok(format!(
        "cache-hit={}\nimage-list={}\n",
        report.result.all_from_cache, images
    ))
}

/// Append the CI step outputs to the file at `path`
pub async fn write_step_outputs(path: &Path, report: &RunReport) -> DockstashResult<()> {
    let content = step_outputs(report)?;
    let context = || format!("writing step outputs to {}", path.display());

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| DockstashError::io(context(), e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| DockstashError::io(context(), e))?;
    file.flush().await.map_err(|e| DockstashError::io(context(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageTarget;
    use tempfile::TempDir;

    fn cached(name: &str) -> ProcessingRecord {
        let mut r = ProcessingRecord::new(ImageTarget::new(name, None));
        r.remote_digest = Some("sha256:0123456789abcdef".to_string());
        r.primary_key = Some(format!("dockstash-linux-{}", name));
        r.success = true;
        r.restored_from_cache = true;
        r
    }

    fn failed(name: &str) -> ProcessingRecord {
        let mut r = ProcessingRecord::new(ImageTarget::new(name, Some("linux/arm64".into())));
        r.fail("pull failed");
        r
    }

    #[test]
    fn rows_carry_status_and_key() {
        let report = RunReport::new(vec![cached("nginx"), failed("redis")]);
        let rows = image_reports(&report);

        assert_eq!(rows[0].status, ImageStatus::Cached);
        assert_eq!(rows[0].cache_key.as_deref(), Some("dockstash-linux-nginx"));
        assert_eq!(rows[1].status, ImageStatus::Error);
        assert_eq!(rows[1].platform.as_deref(), Some("linux/arm64"));
        assert!(rows[1].cache_key.is_none());
    }

    #[test]
    fn json_report_shape() {
        let report = RunReport::new(vec![cached("nginx")]);
        let value: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();

        assert_eq!(value["cache_hit"], true);
        assert_eq!(value["total_count"], 1);
        assert_eq!(value["images"][0]["status"], "Cached");
        assert_eq!(value["images"][0]["digest"], "sha256:0123456789abcdef");
        assert!(value["images"][0].get("error").is_none());
    }

    #[test]
    fn step_outputs_format() {
        let report = RunReport::new(vec![cached("nginx"), failed("redis")]);
        let text = step_outputs(&report).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("cache-hit=false"));
        let list = lines.next().unwrap().strip_prefix("image-list=").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(list).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_run_is_not_a_hit() {
        let text = step_outputs(&RunReport::empty()).unwrap();
        assert_eq!(text, "cache-hit=false\nimage-list=[]\n");
    }

    #[tokio::test]
    async fn step_outputs_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("github_output");
        tokio::fs::write(&path, "previous=1\n").await.unwrap();

        write_step_outputs(&path, &RunReport::new(vec![cached("nginx")]))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("previous=1\ncache-hit=true\nimage-list=["));
    }

    #[test]
    fn short_digest_truncates_hex() {
        assert_eq!(short_digest(Some("sha256:0123456789abcdef")), "sha256:0123456789ab");
        assert_eq!(short_digest(Some("sha256:abc")), "sha256:abc");
        assert_eq!(short_digest(None), "-");
    }
}
