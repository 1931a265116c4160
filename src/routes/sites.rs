use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{message, AppState, InsertedId};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{Announcement, HomeSettings, NewSite, Site, SiteView};
use crate::repo::RepoError;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sites").route(web::post().to(create_site)))
        .service(web::resource("/sites/join").route(web::post().to(join_site)))
        .service(web::resource("/sites/by-name/{siteName}").route(web::get().to(get_site_by_name)))
        .service(web::resource("/sites/joined/{email}").route(web::get().to(joined_sites)))
        .service(web::resource("/sites/{id}/announcements").route(web::put().to(set_announcements)))
        .service(
            web::resource("/sites/{id}/announcements/{index}").route(web::delete().to(delete_announcement)),
        )
        .service(web::resource("/sites/{siteName}/is-member").route(web::get().to(is_member)))
        .service(web::resource("/sites/{id}/home-settings").route(web::put().to(update_home_settings)))
        .service(web::resource("/sites/{email}").route(web::get().to(sites_created_by)));
}

fn views(sites: Vec<Site>) -> Vec<SiteView> {
    sites.into_iter().map(SiteView::from).collect()
}

/// Only the creator may edit a site's home page.
async fn owned_site(data: &AppState, auth: &Auth, id: &str) -> Result<Site, ApiError> {
    let site = data.repo.get_site(id).await?;
    if site.created_by != auth.email() {
        return Err(ApiError::Forbidden("Only the site creator can change this site".into()));
    }
    Ok(site)
}

#[utoipa::path(
    post,
    path = "/sites",
    request_body = NewSite,
    responses(
        (status = 201, description = "Site created", body = InsertedId),
        (status = 400, description = "Missing name or password"),
        (status = 409, description = "Site name already exists")
    )
)]
pub async fn create_site(data: web::Data<AppState>, payload: web::Json<NewSite>) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    if new.site_name.trim().is_empty() || new.password.is_empty() {
        return Err(ApiError::BadRequest("siteName and password are required".into()));
    }
    let site = data.repo.create_site(new).await?;
    log::info!("site '{}' created by {}", site.site_name, site.created_by);
    Ok(HttpResponse::Created().json(InsertedId { inserted_id: site.id }))
}

pub async fn sites_created_by(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let sites = data.repo.list_sites_created_by(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views(sites)))
}

#[utoipa::path(
    get,
    path = "/sites/by-name/{siteName}",
    params(("siteName" = String, Path, description = "Unique site name")),
    responses(
        (status = 200, description = "Site without its password", body = SiteView),
        (status = 404, description = "Site not found")
    )
)]
pub async fn get_site_by_name(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let site = data.repo.get_site_by_name(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SiteView::from(site)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinSite {
    pub site_name: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/sites/join",
    request_body = JoinSite,
    responses(
        (status = 200, description = "Joined"),
        (status = 400, description = "Already a member"),
        (status = 401, description = "Incorrect password"),
        (status = 404, description = "Site not found")
    )
)]
pub async fn join_site(auth: Auth, data: web::Data<AppState>, payload: web::Json<JoinSite>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    let site = data.repo.get_site_by_name(&req.site_name).await?;
    if site.password != req.password {
        return Err(ApiError::Unauthorized("Incorrect password".into()));
    }
    match data.repo.add_member(&site.id, auth.email()).await {
        Ok(()) => {}
        Err(RepoError::Conflict(msg)) => return Err(ApiError::BadRequest(msg.into())),
        Err(e) => return Err(e.into()),
    }
    metrics::increment_counter!("lms_site_joins_total");
    Ok(HttpResponse::Ok().json(message("Successfully joined the site")))
}

pub async fn joined_sites(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let sites = data.repo.list_sites_joined_by(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views(sites)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct Announcements {
    pub announcements: Vec<Announcement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementsSaved {
    message: &'static str,
    count: usize,
}

#[utoipa::path(
    put,
    path = "/sites/{id}/announcements",
    params(("id" = String, Path, description = "Site id")),
    request_body = Announcements,
    responses(
        (status = 200, description = "Announcements replaced"),
        (status = 400, description = "An announcement lacks title or content"),
        (status = 403, description = "Not the site creator"),
        (status = 404, description = "Site not found")
    )
)]
pub async fn set_announcements(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<Announcements>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let announcements = payload.into_inner().announcements;
    if announcements.iter().any(|a| a.title.trim().is_empty() || a.content.trim().is_empty()) {
        return Err(ApiError::BadRequest("Each announcement must have a title and content".into()));
    }
    owned_site(&data, &auth, &id).await?;
    let count = announcements.len();
    data.repo.set_announcements(&id, announcements).await?;
    Ok(HttpResponse::Ok().json(AnnouncementsSaved { message: "Announcements updated successfully", count }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementDeleted {
    message: &'static str,
    remaining_count: usize,
}

pub async fn delete_announcement(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, index) = path.into_inner();
    let mut site = owned_site(&data, &auth, &id).await?;
    let index: usize = index
        .parse()
        .ok()
        .filter(|i| *i < site.announcements.len())
        .ok_or_else(|| ApiError::BadRequest("Invalid announcement index".into()))?;
    site.announcements.remove(index);
    let remaining_count = site.announcements.len();
    data.repo.set_announcements(&id, site.announcements).await?;
    Ok(HttpResponse::Ok().json(AnnouncementDeleted { message: "Announcement deleted successfully", remaining_count }))
}

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Membership {
    is_member: bool,
}

pub async fn is_member(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MemberQuery>,
) -> Result<HttpResponse, ApiError> {
    let site = data.repo.get_site_by_name(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(Membership { is_member: site.is_member(&query.email) }))
}

pub async fn update_home_settings(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<HomeSettings>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    owned_site(&data, &auth, &id).await?;
    data.repo.update_home_settings(&id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message("Home settings updated")))
}
