use anyhow::{Context, Result};
use faceprint_core::{FaceAnalysis, FaceDetector, FaceRecognizer};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;
#[cfg(test)]
mod testing;

use config::Config;
use engine::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        model_dir = %config.model_dir.display(),
        model = %config.model_name,
        "faceprintd starting"
    );

    // Load both models up front; a broken bundle is fatal.
    let detector = FaceDetector::load(&config.detector_model_path(), config.intra_threads)
        .context("loading SCRFD detector")?
        .with_confidence_threshold(config.detection_threshold);
    let recognizer = FaceRecognizer::load(&config.recognizer_model_path(), config.intra_threads)
        .context("loading ArcFace recognizer")?;

    let engine = Engine::spawn(FaceAnalysis::new(config.model_name.clone(), detector, recognizer))?;

    let state = http::AppState::new(engine.handle(), &config.model_name, config.match_threshold);
    let app = http::router(state, &config.cors_origins, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "faceprintd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("faceprintd shutting down");
    tokio::task::spawn_blocking(move || engine.shutdown()).await?;

    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
