use crate::cli::ServeArgs;
use crate::infra::{in_memory_service, seed_portfolio, AppState};
use crate::routes::with_letting_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use letting_crm::config::AppConfig;
use letting_crm::error::AppError;
use letting_crm::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let service = in_memory_service(None);
    if args.seed {
        let seeded = seed_portfolio(&service)?;
        info!(instructions = seeded.len(), "seeded demo portfolio");
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        lettings: config.lettings.clone(),
        service: service.clone(),
    };

    let app = with_letting_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "letting crm service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
