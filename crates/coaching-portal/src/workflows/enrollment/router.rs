use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{EnquiryFilter, EnquiryId, EnquiryStatus, EnquirySubmission, EnquiryView};
use super::notification::CredentialNotifier;
use super::repository::{AccountRepository, EnquiryRepository};
use super::service::{EnrollmentService, ProvisioningError};
use super::sessions::{bearer_token, AdminSession, AdminSessions, SessionError};

/// Shared handler state: the workflow service plus the operator session store.
pub struct PortalState<E, A, N> {
    pub service: Arc<EnrollmentService<E, A, N>>,
    pub sessions: Arc<AdminSessions>,
}

impl<E, A, N> Clone for PortalState<E, A, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StudentLoginRequest {
    pub student_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnquiryListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Router builder exposing intake, operator and student-login endpoints.
pub fn enrollment_router<E, A, N>(
    service: Arc<EnrollmentService<E, A, N>>,
    sessions: Arc<AdminSessions>,
) -> Router
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/enquiries",
            post(submit_handler::<E, A, N>).get(list_handler::<E, A, N>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id",
            get(enquiry_handler::<E, A, N>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/status",
            post(status_handler::<E, A, N>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/provision",
            post(provision_handler::<E, A, N>),
        )
        .route(
            "/api/v1/admin/sessions",
            post(login_handler::<E, A, N>).delete(logout_handler::<E, A, N>),
        )
        .route(
            "/api/v1/students/login",
            post(student_login_handler::<E, A, N>),
        )
        .route(
            "/api/v1/notifications/deliveries",
            get(deliveries_handler::<E, A, N>),
        )
        .with_state(PortalState { service, sessions })
}

fn error_response(error: ProvisioningError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), Json(payload)).into_response()
}

fn unauthorized(error: SessionError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn authorize(sessions: &AdminSessions, headers: &HeaderMap) -> Result<AdminSession, Response> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    bearer_token(header)
        .and_then(|token| sessions.verify(token))
        .map_err(unauthorized)
}

pub(crate) async fn submit_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    Json(submission): Json<EnquirySubmission>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    match state.service.submit_enquiry(submission) {
        Ok(enquiry) => (StatusCode::ACCEPTED, Json(enquiry.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
    Query(query): Query<EnquiryListQuery>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    if let Err(response) = authorize(&state.sessions, &headers) {
        return response;
    }

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => match EnquiryStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                let payload = json!({ "error": format!("unknown status filter '{raw}'") });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        },
    };
    let filter = EnquiryFilter {
        search: query.search,
        status,
    };

    let enquiries = match state.service.list_enquiries(&filter) {
        Ok(enquiries) => enquiries,
        Err(error) => return error_response(error),
    };
    let stats = match state.service.enquiry_stats() {
        Ok(stats) => stats,
        Err(error) => return error_response(error),
    };

    let views: Vec<EnquiryView> = enquiries.iter().map(|enquiry| enquiry.view()).collect();
    let payload = json!({ "enquiries": views, "stats": stats });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn enquiry_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    if let Err(response) = authorize(&state.sessions, &headers) {
        return response;
    }

    match state.service.get_enquiry(&EnquiryId(enquiry_id)) {
        Ok(enquiry) => (StatusCode::OK, Json(enquiry.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    if let Err(response) = authorize(&state.sessions, &headers) {
        return response;
    }

    let Some(status) = EnquiryStatus::parse(&request.status) else {
        let payload = json!({ "error": format!("unknown status '{}'", request.status) });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    };

    match state.service.update_status(&EnquiryId(enquiry_id), status) {
        Ok(enquiry) => (StatusCode::OK, Json(enquiry.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn provision_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    if let Err(response) = authorize(&state.sessions, &headers) {
        return response;
    }

    match state.service.provision(&EnquiryId(enquiry_id)) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn login_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    Json(request): Json<AdminLoginRequest>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    match state.sessions.login(&request.email, &request.password) {
        Ok(session) => {
            let payload = json!({
                "token": session.token,
                "email": session.email,
                "expires_at": session.expires_at,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => unauthorized(error),
    }
}

pub(crate) async fn logout_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    let session = match authorize(&state.sessions, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.sessions.logout(&session.token) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => unauthorized(error),
    }
}

pub(crate) async fn student_login_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    Json(request): Json<StudentLoginRequest>,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    match state
        .service
        .authenticate_student(&request.student_id, &request.password)
    {
        Ok(account) => (StatusCode::OK, Json(account.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn deliveries_handler<E, A, N>(
    State(state): State<PortalState<E, A, N>>,
    headers: HeaderMap,
) -> Response
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    if let Err(response) = authorize(&state.sessions, &headers) {
        return response;
    }

    let deliveries = state.service.notifier().deliveries();
    (StatusCode::OK, Json(json!({ "deliveries": deliveries }))).into_response()
}
