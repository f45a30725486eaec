use anyhow::Context;
use clap::Parser;

use screenspot_ingest::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();
    tracing::info!(
        annotations = %config.annotations_dir.display(),
        images = %config.images_dir.display(),
        dataset = %config.dataset_name,
        bbox_policy = %config.box_policy,
        "starting ingest"
    );

    let report = screenspot_ingest::run(&config)
        .with_context(|| format!("failed to build dataset {}", config.dataset_name))?;

    tracing::info!(
        dataset = %report.dataset,
        files = report.files,
        entries = report.entries,
        skipped_missing = report.skipped_missing,
        samples = report.samples,
        metadata_failed = report.metadata_failed,
        dynamic_fields = report.dynamic_fields,
        groups = report.groups,
        "ingest finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
