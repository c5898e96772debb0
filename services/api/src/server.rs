use crate::cli::ServeArgs;
use crate::infra::{
    register_baseline_actors, AppState, InMemoryAuditLog, InMemoryListingRegistry,
    InMemoryNotificationCenter, InMemoryWorkflowStore,
};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ipo_workflow::config::AppConfig;
use ipo_workflow::error::AppError;
use ipo_workflow::telemetry;
use ipo_workflow::workflows::listing::ApplicationWorkflowService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

const DEMO_COMPANY: &str = "demo-issuer";

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryWorkflowStore::default());
    register_baseline_actors(&store, DEMO_COMPANY);
    let notifications = Arc::new(InMemoryNotificationCenter::default());
    let audit = Arc::new(InMemoryAuditLog::default());
    let listings = Arc::new(InMemoryListingRegistry::default());
    let workflow_service = Arc::new(ApplicationWorkflowService::new(
        store,
        notifications,
        audit,
        listings,
    ));

    let app = with_workflow_routes(workflow_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "listing workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
