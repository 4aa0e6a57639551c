use crate::archive::{self, ArchiveStatus};
use crate::catalog::filter_keys;
use crate::download_plan::{DownloadPlan, DownloadTask, FetchOutcome};
use crate::render::Renderer;
use crate::run_config::RunConfig;
use crate::s3::S3ObjOps;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Only build the plan and write it to the configured plan file.
    pub dry_run: bool,
    pub skip_render: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub archive: Option<ArchiveStatus>,
    pub rendered: bool,
}

/// List one product's keys for the configured day and turn the ones inside the window into tasks.
pub async fn plan_product(
    provider: &impl S3ObjOps,
    config: &RunConfig,
    product: &str,
) -> Result<DownloadPlan> {
    let prefix = config.prefix(product);
    let keys = provider
        .list_keys(&config.bucket, &prefix)
        .await
        .with_context(|| format!("Failed to list s3://{}/{}", config.bucket, prefix))?;

    let selected = filter_keys(&keys, &config.window(), config.malformed_keys)?;
    info!("{product}: filtered {} keys to {}", keys.len(), selected.len());
    debug!(?selected);

    let tasks = selected
        .iter()
        .map(|key| -> Result<DownloadTask> {
            let file_name = Path::new(key)
                .file_name()
                .ok_or(anyhow!("Key has no file name: {}", key))?;
            let output = config.samples_dir.join(file_name);
            Ok(DownloadTask::new(&config.bucket, key, output))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DownloadPlan::new(tasks))
}

pub async fn plan(provider: &impl S3ObjOps, config: &RunConfig) -> Result<DownloadPlan> {
    let mut plan = DownloadPlan::default();
    for product in config.products.iter() {
        plan.extend(plan_product(provider, config, product).await?);
    }
    Ok(plan)
}

pub async fn run(
    config: &RunConfig,
    provider: &impl S3ObjOps,
    http: &reqwest::Client,
    renderer: &impl Renderer,
    options: RunOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    if options.dry_run {
        let full_plan = plan(provider, config).await?;
        summary.planned = full_plan.tasks.len();
        let path = &config.plan_file;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        full_plan.write(path)?;
        info!("Wrote {} tasks to {}", summary.planned, path.display());
        return Ok(summary);
    }

    // Each product is fetched before the next one is listed.
    for product in config.products.iter() {
        let plan = plan_product(provider, config, product).await?;
        summary.planned += plan.tasks.len();
        for outcome in plan.execute(provider).await? {
            match outcome {
                FetchOutcome::Downloaded { .. } => summary.downloaded += 1,
                FetchOutcome::Skipped => summary.skipped += 1,
            }
        }
    }

    let status = archive::sync_archive(http, &config.shapefiles_url, &config.shapefiles_dir).await?;
    summary.archive = Some(status);

    if !options.skip_render {
        renderer.render(&config.samples_dir).await?;
        summary.rendered = true;
    }

    info!(
        "Done: {} planned, {} downloaded, {} skipped",
        summary.planned, summary.downloaded, summary.skipped
    );
    Ok(summary)
}
