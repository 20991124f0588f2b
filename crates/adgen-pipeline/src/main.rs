//! Video ad generation CLI.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adgen_ai::{ClaudeClient, RayClient};
use adgen_models::SessionId;
use adgen_pipeline::{
    run_analysis, run_generation, run_merge, run_selection, GenerationOptions, MergeRequest,
    PipelineConfig, PipelineError, SessionFilter, SessionStore,
};
use adgen_storage::S3Client;

/// Generate video ads from product images.
#[derive(Debug, Parser)]
#[command(name = "adgen", version, about)]
struct Cli {
    /// Project folder containing a product_images/ directory
    folder: PathBuf,

    /// Number of images to select
    #[arg(short = 'n', long, default_value_t = 1)]
    num_images: usize,

    /// Video prompts to generate per image
    #[arg(short = 'p', long, default_value_t = 3)]
    prompts: usize,

    /// S3 bucket the video service writes outputs to
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Key prefix within the bucket
    #[arg(long, default_value = "luma-videos")]
    s3_prefix: String,

    /// Reuse the existing selected_images.json
    #[arg(long)]
    skip_selection: bool,

    /// Reuse the existing product_analysis_prompts.json
    #[arg(long)]
    skip_analysis: bool,

    /// Do not use product images as opening keyframes
    #[arg(long)]
    no_keyframes: bool,

    /// Merge the newest session's videos after generation
    #[arg(long)]
    merge: bool,

    /// Merge videos from every recorded session
    #[arg(long)]
    merge_all: bool,

    /// Merge a specific session instead of generating
    #[arg(long, value_name = "SESSION")]
    merge_session: Option<String>,

    /// Only merge; skip every generation stage
    #[arg(long)]
    merge_only: bool,

    /// Apply fade transitions when merging (re-encodes)
    #[arg(long)]
    transition: bool,

    /// Fade duration in seconds
    #[arg(long, default_value_t = 0.5)]
    transition_duration: f64,

    /// Override the maximum number of concurrent video jobs
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("adgen=info".parse().unwrap())
        .add_directive("aws_config=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> Result<(), PipelineError> {
    let mut store = SessionStore::new(&cli.folder);

    let wants_merge =
        cli.merge || cli.merge_all || cli.merge_only || cli.merge_session.is_some();

    if !cli.merge_only {
        generate(&cli, &mut store).await?;
    }

    if wants_merge {
        let filter = merge_filter(&cli)?;
        let report = run_merge(
            &store,
            &cli.folder,
            &MergeRequest {
                filter,
                transition: cli.transition,
                transition_duration: cli.transition_duration,
            },
        )
        .await?;
        info!(
            "Merged {} clips into {}",
            report.source_videos.len(),
            report.output_video
        );
    }

    Ok(())
}

async fn generate(cli: &Cli, store: &mut SessionStore) -> Result<(), PipelineError> {
    let s3_bucket = cli.s3_bucket.clone().ok_or_else(|| {
        PipelineError::config_error("--s3-bucket is required unless --merge-only")
    })?;

    let mut config = PipelineConfig::from_env();
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent_jobs = concurrency;
    }

    let claude = ClaudeClient::from_env()?;

    let selection = if cli.skip_selection {
        info!("Reusing existing image selection");
        store.load_selection()?
    } else {
        run_selection(store, &claude, &cli.folder, cli.num_images).await?
    };

    let prompts = if cli.skip_analysis {
        info!("Reusing existing prompt analysis");
        store.load_prompts()?
    } else {
        run_analysis(store, &claude, &cli.folder, &selection, cli.prompts).await?
    };

    let generator = Arc::new(RayClient::from_env()?);
    let s3 = S3Client::from_env().await?;

    let report = run_generation(
        store,
        generator,
        &s3,
        &config,
        &GenerationOptions {
            folder: cli.folder.clone(),
            s3_bucket,
            s3_prefix: cli.s3_prefix.clone(),
            use_keyframes: !cli.no_keyframes,
        },
        &prompts,
    )
    .await?;

    info!(
        "Generation finished: {}/{} videos succeeded",
        report.succeeded_count, report.total_attempted
    );
    Ok(())
}

fn merge_filter(cli: &Cli) -> Result<SessionFilter, PipelineError> {
    if let Some(raw) = &cli.merge_session {
        let session = SessionId::parse(raw.as_str()).ok_or_else(|| {
            PipelineError::config_error(format!("invalid session id: {}", raw))
        })?;
        return Ok(SessionFilter::Id(session));
    }
    if cli.merge_all {
        Ok(SessionFilter::All)
    } else {
        Ok(SessionFilter::Latest)
    }
}
