use crate::cli::ServeArgs;
use crate::infra::{AppState, Services};
use crate::routes::with_family_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use kindred::audit::UserId;
use kindred::config::AppConfig;
use kindred::error::AppError;
use kindred::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

const SEED_USER: &str = "seed";

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = Services::in_memory(config.archive, config.scoring.clone());
    if let Some(path) = args.seed_csv.take() {
        let summary = services
            .importer
            .import_path(&UserId::new(SEED_USER), &path, None)?;
        info!(
            path = %path.display(),
            people = summary.people_created,
            skipped = summary.skipped.len(),
            "seeded family records"
        );
    }

    let app = with_family_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "kindred family archive ready");

    axum::serve(listener, app).await?;
    Ok(())
}
