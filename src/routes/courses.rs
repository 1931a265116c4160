use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{message, AppState, InsertedId};
use crate::auth::Auth;
use crate::content::{ContentPatch, LessonContent};
use crate::error::ApiError;
use crate::models::{parse_tags, Blob, CourseSettings, NewCourse};
use crate::upload::read_multipart;

const LESSON: &str = "/course/{courseId}/section/{sectionId}/lesson/{lessonId}";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/courses").route(web::post().to(create_course)))
        .service(
            web::resource("/courses/{id}")
                .route(web::get().to(courses_by_origin))
                .route(web::put().to(update_course))
                .route(web::delete().to(delete_course)),
        )
        .service(web::resource("/course/{courseId}").route(web::get().to(get_course)))
        .service(web::resource("/course/{courseId}/section").route(web::post().to(add_section)))
        .service(
            web::resource("/course/{courseId}/section/{sectionId}")
                .route(web::put().to(rename_section))
                .route(web::delete().to(delete_section)),
        )
        .service(web::resource("/course/{courseId}/section/{sectionId}/lesson").route(web::post().to(add_lesson)))
        .service(
            web::resource(LESSON)
                .route(web::put().to(rename_lesson))
                .route(web::delete().to(delete_lesson)),
        )
        .service(web::resource(format!("{LESSON}/video")).route(web::post().to(upload_video)))
        .service(web::resource(format!("{LESSON}/article")).route(web::post().to(save_article)))
        .service(web::resource(format!("{LESSON}/assignment")).route(web::post().to(save_assignment)))
        .service(web::resource(format!("{LESSON}/quiz")).route(web::post().to(save_quiz)))
        .service(web::resource(format!("{LESSON}/resources")).route(web::post().to(upload_resources)))
        .service(
            web::resource(format!("{LESSON}/content"))
                .route(web::patch().to(patch_content))
                .route(web::delete().to(delete_content)),
        );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPath {
    pub course_id: String,
    pub section_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPath {
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
}

#[derive(Debug, Serialize)]
struct Acknowledged {
    acknowledged: bool,
}

fn required(value: Option<String>, what: &str) -> Result<String, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("{what} is required")))
}

#[utoipa::path(
    post,
    path = "/courses",
    responses(
        (status = 200, description = "Course created", body = InsertedId),
        (status = 400, description = "Thumbnail or course name missing"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn create_course(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::BadRequest("Thumbnail is required".into()))?;
    let new = NewCourse {
        origin: form.text("origin").unwrap_or_default(),
        course_name: required(form.text("courseName"), "courseName")?,
        course_description: form.raw("courseDescription").unwrap_or_default(),
        course_category: form.text("courseCategory").unwrap_or_default(),
        course_tags: form.raw("courseTags").map(|t| parse_tags(&t)).unwrap_or_default(),
        created_by: Some(auth.email().to_string()),
        thumbnail: Blob(thumbnail.bytes),
    };
    let course = data.repo.create_course(new).await?;
    log::info!("course '{}' created by {}", course.course_name, auth.email());
    Ok(HttpResponse::Ok().json(InsertedId { inserted_id: course.id }))
}

pub async fn courses_by_origin(_auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let courses = data.repo.list_courses_by_origin(&path.into_inner()).await?;
    if courses.is_empty() {
        return Err(ApiError::NotFound("No courses found for this originId".into()));
    }
    Ok(HttpResponse::Ok().json(courses))
}

#[utoipa::path(
    get,
    path = "/course/{courseId}",
    params(("courseId" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "The whole course tree", body = Course),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let course = data.repo.get_course(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(course))
}

pub async fn update_course(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let settings = CourseSettings {
        course_name: form.text("courseName"),
        course_description: form.raw("courseDescription"),
        course_category: form.text("courseCategory"),
        course_tags: form.raw("courseTags").map(|t| parse_tags(&t)),
        thumbnail: form.take_file("thumbnail").map(|f| Blob(f.bytes)),
    };
    data.repo.update_course_settings(&path.into_inner(), settings).await?;
    Ok(HttpResponse::Ok().json(Acknowledged { acknowledged: true }))
}

pub async fn delete_course(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    data.repo.delete_course(&id).await?;
    log::info!("course {id} deleted by {}", auth.email());
    Ok(HttpResponse::Ok().json(Acknowledged { acknowledged: true }))
}

// ---------------- sections and lessons ----------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewSection {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameSection {
    pub new_title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub lesson_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameLesson {
    pub new_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionCreated {
    pub message: String,
    pub section_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonCreated {
    pub message: String,
    pub lesson_id: String,
}

fn non_blank(value: Option<String>, what: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{what} is required"))),
    }
}

#[utoipa::path(
    post,
    path = "/course/{courseId}/section",
    params(("courseId" = String, Path, description = "Course id")),
    request_body = NewSection,
    responses(
        (status = 201, description = "Section appended", body = SectionCreated),
        (status = 400, description = "Missing title"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_section(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewSection>,
) -> Result<HttpResponse, ApiError> {
    let title = non_blank(payload.into_inner().title, "Section title")?;
    let section = data.repo.add_section(&path.into_inner(), &title).await?;
    Ok(HttpResponse::Created().json(SectionCreated {
        message: "Section added successfully".into(),
        section_id: section.section_id,
    }))
}

pub async fn rename_section(
    data: web::Data<AppState>,
    path: web::Path<SectionPath>,
    payload: web::Json<RenameSection>,
) -> Result<HttpResponse, ApiError> {
    let title = non_blank(payload.into_inner().new_title, "newTitle")?;
    data.repo.rename_section(&path.course_id, &path.section_id, &title).await?;
    Ok(HttpResponse::Ok().json(message("Section title updated successfully")))
}

pub async fn delete_section(data: web::Data<AppState>, path: web::Path<SectionPath>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_section(&path.course_id, &path.section_id).await?;
    Ok(HttpResponse::Ok().json(message("Section deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/course/{courseId}/section/{sectionId}/lesson",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("sectionId" = String, Path, description = "Section id")
    ),
    request_body = NewLesson,
    responses(
        (status = 201, description = "Lesson appended", body = LessonCreated),
        (status = 400, description = "Missing lesson name"),
        (status = 404, description = "Course or section not found")
    )
)]
pub async fn add_lesson(
    data: web::Data<AppState>,
    path: web::Path<SectionPath>,
    payload: web::Json<NewLesson>,
) -> Result<HttpResponse, ApiError> {
    let name = non_blank(payload.into_inner().lesson_name, "Lesson name")?;
    let lesson = data.repo.add_lesson(&path.course_id, &path.section_id, &name).await?;
    Ok(HttpResponse::Created().json(LessonCreated { message: "Lesson added successfully".into(), lesson_id: lesson.lesson_id }))
}

pub async fn rename_lesson(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: web::Json<RenameLesson>,
) -> Result<HttpResponse, ApiError> {
    let name = non_blank(payload.into_inner().new_name, "newName")?;
    data.repo
        .rename_lesson(&path.course_id, &path.section_id, &path.lesson_id, &name)
        .await?;
    Ok(HttpResponse::Ok().json(message("Lesson name updated successfully")))
}

pub async fn delete_lesson(data: web::Data<AppState>, path: web::Path<LessonPath>) -> Result<HttpResponse, ApiError> {
    data.repo
        .delete_lesson(&path.course_id, &path.section_id, &path.lesson_id)
        .await?;
    Ok(HttpResponse::Ok().json(message("Lesson deleted successfully")))
}

// ---------------- lesson content ----------------

async fn store_content(data: &AppState, path: &LessonPath, content: LessonContent) -> Result<(), ApiError> {
    let kind = content.kind();
    data.repo
        .set_lesson_content(&path.course_id, &path.section_id, &path.lesson_id, content)
        .await?;
    metrics::increment_counter!("lms_lesson_content_writes_total", "kind" => kind.as_str());
    log::debug!("{} content stored on lesson {}", kind.as_str(), path.lesson_id);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/course/{courseId}/section/{sectionId}/lesson/{lessonId}/video",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("sectionId" = String, Path, description = "Section id"),
        ("lessonId" = String, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Video stored"),
        (status = 400, description = "Missing file or not a video"),
        (status = 404, description = "Course, section or lesson not found")
    )
)]
pub async fn upload_video(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let content = LessonContent::video(form.text("title"), form.take_file("file"))?;
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(message("Video uploaded successfully")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ArticleBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

pub async fn save_article(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: web::Json<ArticleBody>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    let content = LessonContent::article(body.title, body.content)?;
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(message("Article saved successfully")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
}

pub async fn save_assignment(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: web::Json<AssignmentBody>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    let content = LessonContent::assignment(body.title, body.description, body.id)?;
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(message("Assignment saved successfully")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuizBody {
    pub title: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub questions: Option<Value>,
    pub id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/course/{courseId}/section/{sectionId}/lesson/{lessonId}/quiz",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("sectionId" = String, Path, description = "Section id"),
        ("lessonId" = String, Path, description = "Lesson id")
    ),
    request_body = QuizBody,
    responses(
        (status = 200, description = "Quiz stored"),
        (status = 400, description = "Missing title or no questions"),
        (status = 404, description = "Course, section or lesson not found")
    )
)]
pub async fn save_quiz(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: web::Json<QuizBody>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    let questions = match body.questions {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    };
    let content = LessonContent::quiz(body.title, questions, body.id, Utc::now())?;
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(message("Quiz saved successfully")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilesStored {
    message: &'static str,
    files_count: usize,
}

pub async fn upload_resources(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let files = form.take_files("files");
    let files_count = files.len();
    let content = LessonContent::resources(form.text("title"), files, Utc::now())?;
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(FilesStored { message: "Resources uploaded successfully", files_count }))
}

/// Replace the lesson's content with a payload assembled from a multipart form.
pub async fn patch_content(
    data: web::Data<AppState>,
    path: web::Path<LessonPath>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, data.upload_limit).await?;
    let files = form.take_files("files");
    let patch = ContentPatch {
        title: form.text("title"),
        kind: form.text("type"),
        description: form.raw("description"),
        id: form.text("id"),
        content: form.raw("content"),
        questions: form.raw("questions"),
        existing_files: form.raw("existingFiles"),
        files,
    };
    let content = patch.build(Utc::now())?;
    let files_count = match &content {
        LessonContent::Resources(bundle) => bundle.files.len(),
        _ => 0,
    };
    store_content(&data, &path, content).await?;
    Ok(HttpResponse::Ok().json(FilesStored { message: "Content updated successfully!", files_count }))
}

pub async fn delete_content(data: web::Data<AppState>, path: web::Path<LessonPath>) -> Result<HttpResponse, ApiError> {
    data.repo
        .clear_lesson_content(&path.course_id, &path.section_id, &path.lesson_id)
        .await?;
    Ok(HttpResponse::Ok().json(message("Content deleted successfully")))
}
