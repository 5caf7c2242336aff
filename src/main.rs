mod config;
mod demux;
mod error;
mod http_client;
mod logging;
mod metrics;
mod scheduler;
mod server;
mod stream;
mod view;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use config::{Args, Config};
use metrics::AppState;
use scheduler::Scheduler;
use view::MetricView;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config {}: {:#}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.exporter.log_level)?;
    info!(config = %args.config.display(), "starting video-stream-exporter");

    let client = http_client::build().context("failed to build HTTP client")?;

    let scheduler = Arc::new(Scheduler::new(
        client,
        config.check_interval(),
        config.sample_duration(),
        config.exporter.min_keyframes as usize,
        config.exporter.max_concurrent,
        config.exporter.max_retries,
        config.per_attempt_deadline(),
    ));

    for (project, streams) in &config.streams {
        for stream in streams {
            scheduler
                .register(stream.id.clone(), stream.url.clone(), project.clone())
                .await;
        }
    }
    info!(stream_count = scheduler.probe_count().await, "streams registered");

    let view = Arc::new(MetricView::new(scheduler.clone()));
    let state = AppState::new(view).context("failed to set up metrics registry")?;

    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    let listen_addr = config.exporter.listen_addr.clone();
    let server_task = tokio::spawn(async move { server::run_server(state, &listen_addr).await });

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received");
            scheduler.stop();
            let _ = scheduler_task.await;
            Ok(())
        }
        result = server_task => {
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("metrics server error: {:#}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("metrics server task panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM — either is a clean shutdown
/// request.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
