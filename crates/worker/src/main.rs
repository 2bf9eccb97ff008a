//! `storyreel-worker` -- renders one segmented story into a published video.
//!
//! # Environment variables
//!
//! | Variable     | Required | Description                                   |
//! |--------------|----------|-----------------------------------------------|
//! | `STORY_ID`   | yes      | Integer id of the story                       |
//! | `STORY_FILE` | yes      | Path to the story's `<segment>` markup        |
//!
//! Service and pipeline settings are read by each component's `from_env`.
//! Ctrl-C cancels the run; the workspace is still removed.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyreel_worker::{build_pipeline, run_story, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyreel_worker=info,storyreel_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        story_id = config.story_id,
        work_dir = %config.pipeline.work_dir.display(),
        max_encodes = config.pipeline.max_encodes,
        "Starting storyreel-worker",
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let pipeline = build_pipeline(&config)
        .await
        .context("failed to initialise service clients")?;
    let report = run_story(&config, &pipeline, &cancel)
        .await
        .with_context(|| format!("story {} failed", config.story_id))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
