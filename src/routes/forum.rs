use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use super::{message, AppState};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{ForumReply, NewForumReply, NewForumTopic};
use crate::rate_limit::LimitedAction;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/forum-topics")
            .route(web::get().to(list_topics))
            .route(web::post().to(create_topic)),
    )
    .service(
        web::resource("/forum-topics/{id}")
            .route(web::get().to(view_topic))
            .route(web::delete().to(delete_topic)),
    )
    .service(web::resource("/forum-replies").route(web::post().to(create_reply)))
    .service(
        web::resource("/forum-replies/{id}")
            .route(web::get().to(list_replies))
            .route(web::delete().to(delete_reply)),
    );
}

pub async fn list_topics(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_topics().await?))
}

#[utoipa::path(
    post,
    path = "/forum-topics",
    request_body = NewForumTopic,
    responses(
        (status = 201, description = "Topic created", body = ForumTopic),
        (status = 400, description = "Missing title or body"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn create_topic(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewForumTopic>) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    if new.title.trim().is_empty() || new.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and body are required".into()));
    }
    let topic = data.repo.create_topic(new, auth.email()).await?;
    Ok(HttpResponse::Created().json(topic))
}

#[utoipa::path(
    get,
    path = "/forum-topics/{id}",
    params(("id" = String, Path, description = "Topic id")),
    responses(
        (status = 200, description = "Topic with its view counter already incremented", body = ForumTopic),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn view_topic(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let topic = data.repo.view_topic(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(topic))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicDeleted {
    message: &'static str,
    deleted_replies: u64,
}

pub async fn delete_topic(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let topic = data.repo.get_topic(&id).await?;
    if topic.author != auth.email() {
        return Err(ApiError::forbidden());
    }
    let deleted_replies = data.repo.delete_topic(&id).await?;
    log::info!("topic {id} deleted by {} with {deleted_replies} replies", auth.email());
    Ok(HttpResponse::Ok().json(TopicDeleted { message: "Topic deleted successfully", deleted_replies }))
}

/// Replies of one topic; the path segment is the topic id.
pub async fn list_replies(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let replies: Vec<ForumReply> = data.repo.list_replies(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(replies))
}

#[utoipa::path(
    post,
    path = "/forum-replies",
    request_body = NewForumReply,
    responses(
        (status = 201, description = "Reply stored and topic counter incremented", body = ForumReply),
        (status = 404, description = "Topic not found"),
        (status = 429, description = "Too many replies")
    )
)]
pub async fn create_reply(
    auth: Auth,
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewForumReply>,
) -> Result<HttpResponse, ApiError> {
    data.check_rate(&req, LimitedAction::ForumReply)?;
    let new = payload.into_inner();
    if new.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Reply body is required".into()));
    }
    let reply = data.repo.create_reply(new, auth.email()).await?;
    metrics::increment_counter!("lms_forum_replies_total");
    Ok(HttpResponse::Created().json(reply))
}

pub async fn delete_reply(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let reply = data.repo.get_reply(&id).await?;
    if reply.author != auth.email() {
        return Err(ApiError::forbidden());
    }
    data.repo.delete_reply(&id).await?;
    Ok(HttpResponse::Ok().json(message("Reply deleted successfully")))
}
