use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::{message, AppState};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{Blob, NewUser, UserRole};
use crate::upload::read_multipart;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::get().to(list_users))
            .route(web::post().to(create_user)),
    )
    .service(web::resource("/users/admin/{email}").route(web::get().to(is_admin)))
    .service(web::resource("/users/profilePic").route(web::put().to(set_profile_pic)))
    .service(web::resource("/users/profile-type").route(web::put().to(set_profile_type)))
    .service(
        web::resource("/users/{key}")
            .route(web::get().to(get_user))
            .route(web::delete().to(delete_user)),
    )
    .service(web::resource("/users-info").route(web::put().to(upsert_profile)));
}

pub async fn list_users(_auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_users().await?))
}

pub async fn get_user(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let user = data.repo.get_user_by_email(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStatus {
    pub admin: bool,
}

#[utoipa::path(
    get,
    path = "/users/admin/{email}",
    params(("email" = String, Path, description = "Must equal the caller's email")),
    responses(
        (status = 200, description = "Admin flag", body = AdminStatus),
        (status = 403, description = "Asking about someone else")
    )
)]
pub async fn is_admin(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let email = path.into_inner();
    if email != auth.email() {
        return Err(ApiError::forbidden());
    }
    let admin = match data.repo.get_user_by_email(&email).await {
        Ok(user) => user.role == UserRole::Admin,
        Err(crate::repo::RepoError::NotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok().json(AdminStatus { admin }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertedUser {
    message: &'static str,
    inserted_id: Option<String>,
}

pub async fn create_user(data: web::Data<AppState>, payload: web::Json<NewUser>) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    if new.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required".into()));
    }
    let body = match data.repo.insert_user_if_absent(new).await? {
        Some(user) => InsertedUser { message: "user created", inserted_id: Some(user.id) },
        None => InsertedUser { message: "user already exist", inserted_id: None },
    };
    Ok(HttpResponse::Ok().json(body))
}

pub async fn set_profile_pic(data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let email = form.text("email").ok_or_else(|| ApiError::BadRequest("email is required".into()))?;
    let pic = form
        .take_file("profilePic")
        .ok_or_else(|| ApiError::BadRequest("profilePic file is required".into()))?;
    data.repo.set_profile_pic(&email, Blob(pic.bytes)).await?;
    Ok(HttpResponse::Ok().json(message("Profile picture updated")))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileType {
    pub email: String,
    pub profile_type: String,
}

pub async fn set_profile_type(data: web::Data<AppState>, payload: web::Json<ProfileType>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    data.repo.set_profile_type(&req.email, &req.profile_type).await?;
    Ok(HttpResponse::Ok().json(message("Profile type updated")))
}

/// Upsert free-form profile fields keyed by `email`.
pub async fn upsert_profile(
    data: web::Data<AppState>,
    payload: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let fields = payload.into_inner();
    let email = fields
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("email is required".into()))?;
    data.repo.upsert_profile(&email, fields).await?;
    Ok(HttpResponse::Ok().json(message("Profile saved")))
}

pub async fn delete_user(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    data.require_admin(&auth).await?;
    let id = path.into_inner();
    data.repo.delete_user(&id).await?;
    log::info!("user {id} deleted by {}", auth.email());
    Ok(HttpResponse::Ok().json(message("User deleted")))
}
