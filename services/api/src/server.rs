use crate::cli::ServeArgs;
use crate::infra::{open_campus, AppState};
use crate::routes::with_campus_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campus_records::config::AppConfig;
use campus_records::error::AppError;
use campus_records::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data) = args.data.take() {
        config.storage.data_path = Some(data);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let campus = Arc::new(open_campus(
        config.storage.data_path.as_ref(),
        config.policy.clone(),
    )?);
    if config.storage.data_path.is_none() {
        warn!("APP_DATA_PATH not set; records live in memory only");
    }

    let app = with_campus_routes(campus.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "campus records service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    campus.database().save()?;
    info!("campus records snapshot saved");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
