use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{create_jwt, Auth};
use crate::config::DEFAULT_UPLOAD_LIMIT;
use crate::error::ApiError;
use crate::models::UserRole;
use crate::rate_limit::{LimitedAction, RateLimiterFacade};
use crate::repo::{Repo, RepoError};

pub mod blogs;
pub mod courses;
pub mod forum;
pub mod sites;
pub mod submissions;
pub mod users;

/// JSON bodies carry quiz definitions and profile fields, never media.
pub const JSON_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
        .route("/", web::get().to(index))
        .route("/jwt", web::post().to(issue_jwt))
        .route("/metrics", web::get().to(metrics));
    users::config(cfg);
    sites::config(cfg);
    courses::config(cfg);
    submissions::config(cfg);
    forum::config(cfg);
    blogs::config(cfg);
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub metrics: Option<PrometheusHandle>,
    /// Cap on any single multipart part.
    pub upload_limit: usize,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo, rate_limiter: None, metrics: None, upload_limit: DEFAULT_UPLOAD_LIMIT }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiterFacade) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    /// 403 unless the caller's stored role is admin.
    pub async fn require_admin(&self, auth: &Auth) -> Result<(), ApiError> {
        match self.repo.get_user_by_email(auth.email()).await {
            Ok(user) if user.role == UserRole::Admin => Ok(()),
            Ok(_) | Err(RepoError::NotFound(_)) => Err(ApiError::forbidden()),
            Err(e) => Err(e.into()),
        }
    }

    /// 429 when the caller exceeded the window for `action`.
    pub fn check_rate(&self, req: &HttpRequest, action: LimitedAction) -> Result<(), ApiError> {
        let Some(rl) = &self.rate_limiter else { return Ok(()) };
        let info = req.connection_info();
        let client = info.realip_remote_addr().unwrap_or("unknown");
        if rl.allow(action, client) {
            Ok(())
        } else {
            Err(ApiError::TooManyRequests)
        }
    }
}

/// `{ "message": ... }` acknowledgement used by most write endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    pub message: String,
}

pub(crate) fn message(text: &str) -> Message {
    Message { message: text.to_string() }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertedId {
    pub inserted_id: String,
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("LMS server is running")
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JwtRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JwtResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/jwt",
    request_body = JwtRequest,
    responses(
        (status = 200, description = "Bearer token valid for one hour", body = JwtResponse),
        (status = 400, description = "Missing email")
    )
)]
pub async fn issue_jwt(payload: web::Json<JwtRequest>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    if req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required".into()));
    }
    let token = create_jwt(req.email.trim(), req.name.as_deref()).map_err(|e| {
        log::error!("failed to sign token: {e}");
        ApiError::Internal
    })?;
    Ok(HttpResponse::Ok().json(JwtResponse { token }))
}

async fn metrics(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}
