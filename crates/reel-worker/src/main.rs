//! Video pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_queue::JobQueue;
use reel_remote::{HttpRemoteTaskClient, RemoteConfig};
use reel_store::RedisRunStore;
use reel_worker::{
    JobExecutor, OpenAiSceneWriter, Pipeline, PipelineConfig, ScriptConfig, WorkerConfig,
    WorkerResult,
};

#[tokio::main]
async fn main() {
    // reqwest is built with rustls and no default provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("Failed to install rustls crypto provider");
        std::process::exit(1);
    }

    dotenvy::dotenv().ok();

    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "reel-worker starting");

    let executor = match build_executor() {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!(error = %e, "Worker could not start");
            std::process::exit(1);
        }
    };

    let on_signal = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, draining");
            on_signal.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!(error = %e, "Executor stopped with an error");
        std::process::exit(1);
    }
}

/// Colored output for dev, JSON for production (`LOG_FORMAT=json`).
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reel_worker=info,reel_remote=info,hyper=warn,reqwest=warn"));

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

fn build_executor() -> WorkerResult<JobExecutor> {
    let worker_config = WorkerConfig::from_env();
    let remote_config = RemoteConfig::from_env()?;
    let pipeline_config = PipelineConfig::from_env().with_caption_model(remote_config.default_caption_model);
    info!(?worker_config, ?pipeline_config, "Configuration loaded");

    let pipeline = Pipeline::new(
        Arc::new(HttpRemoteTaskClient::new(remote_config)?),
        Arc::new(OpenAiSceneWriter::new(ScriptConfig::from_env()?)?),
        Arc::new(RedisRunStore::from_env()?),
        pipeline_config,
    );
    let queue = JobQueue::from_env()?;

    Ok(JobExecutor::new(worker_config, queue, Arc::new(pipeline)))
}
