//! Batch text-to-video runner binary.

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_callback::CallbackReporter;
use reel_media::{check_ffmpeg, check_ffprobe, FfmpegRunner, FfmpegTool};
use reel_storage::S3Client;
use reel_worker::{BatchOrchestrator, Collaborators, RunConfig, WanInvoker};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting reel-worker");

    let config = match RunConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        job_id = %config.spec.job_id,
        prompts = config.spec.total_prompts(),
        target_duration = config.spec.target_duration,
        prefix = %config.spec.storage.prefix,
        "Run config loaded"
    );

    preflight(&config);

    let store = match S3Client::new(config.storage.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let reporter = match CallbackReporter::from_spec(&config.spec) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create callback reporter: {}", e);
            std::process::exit(1);
        }
    };
    if !reporter.is_enabled() {
        info!("No CALLBACK_URL configured, callbacks disabled");
    }

    let mut runner = FfmpegRunner::new();
    if let Some(secs) = config.settings.ffmpeg_timeout_secs {
        runner = runner.with_timeout(secs);
    }

    let collaborators = Collaborators {
        generator: Arc::new(WanInvoker::new(config.settings.generation_timeout)),
        media: Arc::new(FfmpegTool::new(runner)),
        store: Arc::new(store),
        events: Arc::new(reporter),
    };

    let orchestrator =
        BatchOrchestrator::new(Arc::new(config.spec), config.settings, collaborators);
    let report = orchestrator.run().await;

    match &report.summary.failure_reason {
        Some(reason) => error!("Run failed: {}", reason),
        None => info!("Run completed with {} clips", report.summary.urls.len()),
    }

    std::process::exit(report.summary.status.exit_code());
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["reel=info", "aws_config=warn", "aws_smithy_runtime=warn", "hyper=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

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
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Warn about missing tools up front; per-item failures surface later.
fn preflight(config: &RunConfig) {
    if let Err(e) = check_ffmpeg() {
        warn!("Preflight: {}", e);
    }
    if let Err(e) = check_ffprobe() {
        warn!("Preflight: {}", e);
    }
    if let Err(e) = WanInvoker::check_available(&config.spec.generation) {
        warn!("Preflight: {}", e);
    }
    if !config.spec.generation.project_dir.is_dir() {
        warn!(
            "Preflight: project dir {} does not exist",
            config.spec.generation.project_dir.display()
        );
    }
}
