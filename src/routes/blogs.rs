use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{total_pages, Blob, Blog, BlogQuery, BlogUpdate, LikeOutcome, NewBlog};
use crate::upload::read_multipart;

pub const RELATED_BLOGS: usize = 3;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/blogs")
            .route(web::get().to(list_blogs))
            .route(web::post().to(create_blog)),
    )
    .service(
        web::resource("/blogs/{id}")
            .route(web::get().to(get_blog))
            .route(web::patch().to(update_blog))
            .route(web::delete().to(delete_blog)),
    )
    .service(web::resource("/blogs/{id}/like").route(web::post().to(like_blog)));
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BlogList {
    pub blogs: Vec<Blog>,
    pub pagination: Pagination,
    pub categories: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/blogs",
    params(
        ("category" = Option<String>, Query, description = "Exact category"),
        ("search" = Option<String>, Query, description = "Case-insensitive match on title or content"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("limit" = Option<u64>, Query, description = "Page size, default 6")
    ),
    responses((status = 200, description = "Newest first", body = BlogList))
)]
pub async fn list_blogs(data: web::Data<AppState>, query: web::Query<BlogQuery>) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let page = data.repo.list_blogs(&query).await?;
    let limit = query.limit();
    Ok(HttpResponse::Ok().json(BlogList {
        blogs: page.blogs,
        pagination: Pagination {
            total: page.total,
            total_pages: total_pages(page.total, limit),
            current_page: query.page(),
            limit,
        },
        categories: page.categories,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogWithRelated {
    pub blog: Blog,
    pub related_blogs: Vec<Blog>,
}

pub async fn get_blog(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let blog = data.repo.view_blog(&path.into_inner()).await?;
    let related_blogs = data.repo.related_blogs(&blog.category, &blog.id, RELATED_BLOGS).await?;
    Ok(HttpResponse::Ok().json(BlogWithRelated { blog, related_blogs }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlogCreated {
    success: bool,
    inserted_id: String,
    blog: Blog,
}

#[utoipa::path(
    post,
    path = "/blogs",
    responses(
        (status = 201, description = "Blog published"),
        (status = 400, description = "Title, content, and category are required"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn create_blog(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let (Some(title), Some(content), Some(category)) = (form.text("title"), form.raw("content"), form.text("category"))
    else {
        return Err(ApiError::BadRequest("Title, content, and category are required".into()));
    };
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title, content, and category are required".into()));
    }
    let new = NewBlog {
        title,
        content,
        category,
        excerpt: form.text("excerpt"),
        image: form.take_file("image").map(|f| Blob(f.bytes)),
        author: auth.email().to_string(),
        author_name: auth.0.display_name(),
    };
    let blog = data.repo.create_blog(new).await?;
    log::info!("blog {} published by {}", blog.id, blog.author);
    Ok(HttpResponse::Created().json(BlogCreated { success: true, inserted_id: blog.id.clone(), blog }))
}

#[derive(Debug, Serialize)]
struct BlogSaved {
    success: bool,
    blog: Blog,
}

/// Only the author may change or remove a post.
async fn authored_blog(data: &AppState, auth: &Auth, id: &str) -> Result<Blog, ApiError> {
    let blog = data.repo.get_blog(id).await?;
    if blog.author != auth.email() {
        return Err(ApiError::Forbidden("You can only modify your own blogs".into()));
    }
    Ok(blog)
}

pub async fn update_blog(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    authored_blog(&data, &auth, &id).await?;
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let upd = BlogUpdate {
        title: form.text("title"),
        content: form.raw("content"),
        category: form.text("category"),
        excerpt: form.text("excerpt"),
        image: form.take_file("image").map(|f| Blob(f.bytes)),
    };
    let blog = data.repo.update_blog(&id, upd).await?;
    Ok(HttpResponse::Ok().json(BlogSaved { success: true, blog }))
}

#[derive(Debug, Serialize)]
struct BlogDeleted {
    success: bool,
    message: &'static str,
}

pub async fn delete_blog(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    authored_blog(&data, &auth, &id).await?;
    data.repo.delete_blog(&id).await?;
    log::info!("blog {id} deleted by {}", auth.email());
    Ok(HttpResponse::Ok().json(BlogDeleted { success: true, message: "Blog deleted successfully" }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeToggled {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: LikeOutcome,
}

#[utoipa::path(
    post,
    path = "/blogs/{id}/like",
    params(("id" = String, Path, description = "Blog id")),
    responses(
        (status = 200, description = "Like toggled; likes equals the number of likers", body = LikeToggled),
        (status = 404, description = "Blog not found")
    )
)]
pub async fn like_blog(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let outcome = data.repo.toggle_like(&path.into_inner(), auth.email()).await?;
    metrics::increment_counter!("lms_blog_like_toggles_total");
    Ok(HttpResponse::Ok().json(LikeToggled { success: true, outcome }))
}
