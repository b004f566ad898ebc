//! Run command - restore, pull and cache every manifest image

use crate::cache::KeyBuilder;
use crate::cli::args::{ManifestArgs, OutputFormat, RunArgs};
use crate::config::Config;
use crate::error::{DockstashError, DockstashResult};
use crate::image::{select_targets, ImageTarget};
use crate::manifest::{self, ManifestSet};
use crate::orchestration::{create_resolver, create_runtime, create_store};
use crate::platform::HostPlatform;
use crate::reconcile::{ProcessingRecord, ReconcileOptions, Reconciler, RunReport};
use crate::report;
use crate::ui::{self, RunProgress, TaskSpinner, UiContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the CI step output file
const STEP_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Manifests read and filtered, ready for the engine
pub(crate) struct Prepared {
    pub manifests: ManifestSet,
    pub targets: Vec<ImageTarget>,
}

/// Validate and read manifests, then apply exclusions and dedup
pub(crate) async fn prepare(args: &ManifestArgs) -> DockstashResult<Prepared> {
    let manifests = manifest::load(&args.files).await?;
    let found = manifests.targets.len();
    let targets = select_targets(manifests.targets.clone(), &args.exclude);

    debug!(
        "{} image reference(s) in {} manifest(s), {} after exclusion and dedup (fingerprint {})",
        found,
        manifests.paths.len(),
        targets.len(),
        manifests.fingerprint
    );

    Ok(Prepared { manifests, targets })
}

/// Key builder for this host and manifest set
pub(crate) fn key_builder(args: &ManifestArgs, config: &Config, fingerprint: &str) -> KeyBuilder {
    let prefix = args.prefix.as_deref().unwrap_or(&config.cache.prefix);
    KeyBuilder::new(
        prefix,
        &HostPlatform::detect(),
        fingerprint,
        config.cache.scratch_dir(),
    )
}

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> DockstashResult<()> {
    let json = args.format == OutputFormat::Json;
    let ctx = if json {
        UiContext::non_interactive()
    } else {
        UiContext::detect()
    };

    let prepared = prepare(&args.manifests).await?;

    if !json {
        ui::intro(&ctx, "dockstash run");
    }

    let report = if prepared.targets.is_empty() {
        if !json {
            ui::step_warn(&ctx, "No images to process");
        }
        RunReport::empty()
    } else {
        reconcile(&args, config, &ctx, prepared).await?
    };

    if json {
        println!("{}", report::to_json(&report)?);
    } else if report.result.total_count > 0 {
        report::print_table(&report);
        print_outcome(&ctx, &report);
    }

    if let Some(path) = std::env::var_os(STEP_OUTPUT_ENV) {
        let path = PathBuf::from(path);
        report::write_step_outputs(&path, &report).await?;
        debug!("Wrote step outputs to {}", path.display());
    }

    if args.strict && report.result.error_count > 0 {
        return Err(DockstashError::User(format!(
            "{} image(s) failed (--strict)",
            report.result.error_count
        )));
    }

    Ok(())
}

async fn reconcile(
    args: &RunArgs,
    config: &Config,
    ctx: &UiContext,
    prepared: Prepared,
) -> DockstashResult<RunReport> {
    let resolver = create_resolver(config);
    let runtime = create_runtime(config, args.engine);
    let store = create_store(config);

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!(
        "Checking {} and {}...",
        resolver.resolver_name(),
        runtime.runtime_name()
    ));
    let ready = match resolver.ensure_ready().await {
        Ok(()) => runtime.ensure_ready().await,
        Err(e) => Err(e),
    };
    if let Err(e) = ready {
        spinner.stop_error("Required tooling unavailable");
        return Err(e);
    }
    spinner.stop("Tooling ready");

    let keys = key_builder(&args.manifests, config, &prepared.manifests.fingerprint);
    info!(
        "Scratch directory {}, store {}",
        keys.scratch_dir().display(),
        config.cache.store_dir().display()
    );

    let options = ReconcileOptions {
        skip_latest_check: args.skip_latest_check,
    };
    let progress = Arc::new(RunProgress::new(ctx, prepared.targets.len()));
    let observer = progress.clone();
    let reconciler = Reconciler::new(resolver, store, runtime, keys, options)
        .with_observer(Arc::new(move |record: &ProcessingRecord| observer.on_record(record)));

    let report = reconciler.run(prepared.targets).await;
    progress.finish();

    Ok(report)
}

fn print_outcome(ctx: &UiContext, report: &RunReport) {
    let result = &report.result;
    if result.all_from_cache {
        ui::outro_success(
            ctx,
            &format!("All {} image(s) served from cache", result.total_count),
        );
    } else if result.error_count > 0 {
        ui::outro_error(
            ctx,
            &format!(
                "{} of {} image(s) failed",
                result.error_count, result.total_count
            ),
        );
    } else {
        ui::outro_warn(
            ctx,
            &format!(
                "{} of {} image(s) served from cache, {} pulled",
                result.cache_hit_count, result.total_count, result.pulled_count
            ),
        );
    }
}
