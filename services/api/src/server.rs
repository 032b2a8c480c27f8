use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryAccountRepository, InMemoryEnquiryRepository, PortalService,
};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use coaching_portal::config::AppConfig;
use coaching_portal::error::AppError;
use coaching_portal::telemetry;
use coaching_portal::workflows::enrollment::{
    AdminSessions, EmailNotifier, EnrollmentService, SystemClock, TracingMailTransport,
};
use std::sync::atomic::Ordering;
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

    telemetry::init(&config.telemetry)?;

    if config.enrollment.credential_policy.is_guessable() {
        warn!("APP_CREDENTIAL_POLICY=name_derived issues guessable default passwords");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let enquiries = Arc::new(InMemoryEnquiryRepository::default());
    let accounts = Arc::new(InMemoryAccountRepository::default());
    let notifier = Arc::new(EmailNotifier::new(
        TracingMailTransport,
        config.enrollment.portal_url.clone(),
    ));
    let service: Arc<PortalService> = Arc::new(EnrollmentService::new(
        enquiries,
        accounts,
        notifier,
        config.enrollment.clone(),
    ));
    let sessions = Arc::new(AdminSessions::new(&config.admin, Arc::new(SystemClock)));

    let app = with_enrollment_routes(service, sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "coaching portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
