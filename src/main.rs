use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shapesort::server::{self, AppState};
use shapesort::{
    ActiveCamera, ActuatorDispatcher, Config, DetectionEngine, HttpActuatorClient,
    InspectionState, StreamPublisher, SystemCapture,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let state = Arc::new(InspectionState::new(config.cooldown(), config.initial_expected()));

    let client = HttpActuatorClient::new(&config.actuator_base_url, config.actuator_timeout())
        .context("invalid actuator base URL")?;
    let dispatcher =
        ActuatorDispatcher::new(Arc::new(client), config.actuation_plan(), Handle::current());
    let engine = Arc::new(
        DetectionEngine::new(config.detection_params(), state.clone()).with_dispatcher(dispatcher),
    );

    let backend = Arc::new(SystemCapture::new(config.capture_settings()));
    let initial = config.camera.clone();
    let settings = config.capture_settings();
    let camera = tokio::task::spawn_blocking(move || ActiveCamera::open(backend, initial, settings))
        .await
        .context("camera start-up task failed")?
        .with_context(|| format!("cannot open camera {}", config.camera))?;
    let camera = Arc::new(camera);

    let publisher = Arc::new(StreamPublisher::new(
        camera.clone(),
        engine,
        config.stream_settings(),
    ));
    let app = server::router(AppState {
        state,
        camera: camera.clone(),
        publisher: publisher.clone(),
    });

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, camera = %camera.current_source(), "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // open video feeds would otherwise hold the server forever
            publisher.close();
        })
        .await
        .context("server error")?;

    tokio::task::spawn_blocking(move || camera.shutdown())
        .await
        .context("camera shutdown task failed")?;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
