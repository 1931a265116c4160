use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{message, AppState};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::grades::compute_grades;
use crate::models::{Blob, MarkSubmission, NewAssignmentSubmission, NewQuizSubmission, SubmissionSummary};
use crate::progress::toggle_lesson_completion;
use crate::rate_limit::LimitedAction;
use crate::upload::read_multipart;

pub const ASSIGNMENT_MAX_BYTES: usize = 10 * 1024 * 1024;
pub const ASSIGNMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".zip"];

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/course-progress/{courseId}/{email}")
            .route(web::get().to(get_progress))
            .route(web::post().to(update_progress)),
    )
    .service(web::resource("/assignments/submit").route(web::post().to(submit_assignment)))
    .service(web::resource("/assignments/{assignmentId}/submissions").route(web::get().to(list_submissions)))
    .service(
        web::resource("/assignments/{assignmentId}/submissions/{submissionId}/mark")
            .route(web::post().to(mark_submission)),
    )
    .service(web::resource("/assignments/{assignmentId}/submission/{email}").route(web::get().to(get_submission)))
    .service(web::resource("/quiz-submissions").route(web::post().to(submit_quiz)))
    .service(
        web::resource("/quiz-submissions/{quizId}/{userId}")
            .route(web::get().to(get_quiz_submission))
            .route(web::delete().to(delete_quiz_submission)),
    )
    .service(web::resource("/grades/{courseId}").route(web::get().to(grades)));
}

fn valid_score(score: f64) -> Result<f64, ApiError> {
    if (0.0..=100.0).contains(&score) {
        Ok(score)
    } else {
        Err(ApiError::BadRequest("Score must be between 0 and 100".into()))
    }
}

// ---------------- progress ----------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPath {
    pub course_id: String,
    pub email: String,
}

impl ProgressPath {
    fn ensure_self(&self, auth: &Auth) -> Result<(), ApiError> {
        if self.email != auth.email() {
            return Err(ApiError::forbidden());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoProgress {
    completed_lessons: [String; 0],
    progress: f64,
}

#[utoipa::path(
    get,
    path = "/course-progress/{courseId}/{email}",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("email" = String, Path, description = "Must equal the caller's email")
    ),
    responses(
        (status = 200, description = "Progress record, or an empty one", body = CourseProgress),
        (status = 403, description = "Reading someone else's progress")
    )
)]
pub async fn get_progress(auth: Auth, data: web::Data<AppState>, path: web::Path<ProgressPath>) -> Result<HttpResponse, ApiError> {
    path.ensure_self(&auth)?;
    match data.repo.get_progress(&path.course_id, &path.email).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::Ok().json(NoProgress { completed_lessons: [], progress: 0.0 })),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub lesson_id: String,
    pub completed: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressSaved {
    pub success: bool,
    pub progress: f64,
}

#[utoipa::path(
    post,
    path = "/course-progress/{courseId}/{email}",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("email" = String, Path, description = "Must equal the caller's email")
    ),
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Completion recorded", body = ProgressSaved),
        (status = 403, description = "Updating someone else's progress"),
        (status = 404, description = "Course or lesson not found")
    )
)]
pub async fn update_progress(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<ProgressPath>,
    payload: web::Json<ProgressUpdate>,
) -> Result<HttpResponse, ApiError> {
    path.ensure_self(&auth)?;
    let update = payload.into_inner();
    let at = update.timestamp.unwrap_or_else(Utc::now);
    let record = toggle_lesson_completion(
        data.repo.as_ref(),
        &path.course_id,
        &path.email,
        &update.lesson_id,
        update.completed,
        at,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ProgressSaved { success: true, progress: record.progress }))
}

// ---------------- assignments ----------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreated {
    pub message: String,
    pub submission_id: String,
}

#[utoipa::path(
    post,
    path = "/assignments/submit",
    responses(
        (status = 201, description = "Submission stored", body = SubmissionCreated),
        (status = 400, description = "Missing file, file over 10MB or disallowed type"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn submit_assignment(
    auth: Auth,
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    data.check_rate(&req, LimitedAction::AssignmentSubmission)?;
    let mut form = read_multipart(payload, ASSIGNMENT_MAX_BYTES).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    let extension = file.extension();
    if !ASSIGNMENT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Allowed: {}",
            ASSIGNMENT_EXTENSIONS.join(", ")
        )));
    }
    let assignment_id = form
        .text("assignmentId")
        .ok_or_else(|| ApiError::BadRequest("assignmentId is required".into()))?;

    let new = NewAssignmentSubmission {
        assignment_id,
        course_id: form.text("courseId").unwrap_or_default(),
        section_id: form.text("sectionId").unwrap_or_default(),
        lesson_id: form.text("lessonId").unwrap_or_default(),
        student_email: auth.email().to_string(),
        file_name: file.filename,
        file_type: extension,
        file_data: Blob(file.bytes),
    };
    let stored = data.repo.insert_assignment_submission(new).await?;
    metrics::increment_counter!("lms_submissions_total", "kind" => "assignment");
    log::info!("assignment {} submitted by {}", stored.assignment_id, stored.student_email);
    Ok(HttpResponse::Created().json(SubmissionCreated {
        message: "Assignment submitted successfully".into(),
        submission_id: stored.id,
    }))
}

pub async fn list_submissions(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let subs: Vec<SubmissionSummary> = data
        .repo
        .list_assignment_submissions(&path.into_inner())
        .await?
        .into_iter()
        .map(SubmissionSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(subs))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPath {
    pub assignment_id: String,
    pub submission_id: String,
}

#[utoipa::path(
    post,
    path = "/assignments/{assignmentId}/submissions/{submissionId}/mark",
    params(
        ("assignmentId" = String, Path, description = "Assignment id"),
        ("submissionId" = String, Path, description = "Submission id")
    ),
    request_body = MarkSubmission,
    responses(
        (status = 200, description = "Score recorded"),
        (status = 400, description = "Score outside 0..=100"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn mark_submission(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<MarkPath>,
    payload: web::Json<MarkSubmission>,
) -> Result<HttpResponse, ApiError> {
    let mark = payload.into_inner();
    let score = valid_score(mark.score)?;
    data.repo
        .mark_assignment_submission(&path.assignment_id, &path.submission_id, score, mark.feedback)
        .await?;
    log::info!("submission {} marked {score} by {}", path.submission_id, auth.email());
    Ok(HttpResponse::Ok().json(message("Submission marked successfully")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSubmissionPath {
    pub assignment_id: String,
    pub email: String,
}

pub async fn get_submission(
    data: web::Data<AppState>,
    path: web::Path<StudentSubmissionPath>,
) -> Result<HttpResponse, ApiError> {
    let sub = data
        .repo
        .find_assignment_submission(&path.assignment_id, &path.email)
        .await?;
    Ok(HttpResponse::Ok().json(SubmissionSummary::from(sub)))
}

// ---------------- quizzes ----------------

#[utoipa::path(
    post,
    path = "/quiz-submissions",
    request_body = NewQuizSubmission,
    responses(
        (status = 201, description = "Quiz result stored", body = SubmissionCreated),
        (status = 400, description = "Missing fields or score outside 0..=100"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn submit_quiz(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewQuizSubmission>,
) -> Result<HttpResponse, ApiError> {
    data.check_rate(&req, LimitedAction::QuizSubmission)?;
    let new = payload.into_inner();
    let score = match new.score {
        Some(score) if !new.user_id.is_empty() && !new.quiz_id.is_empty() && new.answers.is_some() => score,
        _ => return Err(ApiError::BadRequest("Missing required fields".into())),
    };
    valid_score(score)?;
    let stored = data.repo.insert_quiz_submission(new).await?;
    metrics::increment_counter!("lms_submissions_total", "kind" => "quiz");
    Ok(HttpResponse::Created().json(SubmissionCreated {
        message: "Quiz submission saved successfully".into(),
        submission_id: stored.id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPath {
    pub quiz_id: String,
    pub user_id: String,
}

pub async fn get_quiz_submission(data: web::Data<AppState>, path: web::Path<QuizPath>) -> Result<HttpResponse, ApiError> {
    let sub = data.repo.find_quiz_submission(&path.quiz_id, &path.user_id).await?;
    Ok(HttpResponse::Ok().json(sub))
}

pub async fn delete_quiz_submission(data: web::Data<AppState>, path: web::Path<QuizPath>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_quiz_submission(&path.quiz_id, &path.user_id).await?;
    Ok(HttpResponse::Ok().json(message("Quiz submission deleted successfully")))
}

// ---------------- grades ----------------

#[derive(Debug, Deserialize)]
pub struct GradesQuery {
    pub email: Option<String>,
}

#[utoipa::path(
    get,
    path = "/grades/{courseId}",
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("email" = String, Query, description = "Student email")
    ),
    responses(
        (status = 200, description = "Per-item scores and the overall grade", body = GradeReport),
        (status = 400, description = "Email is required")
    )
)]
pub async fn grades(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<GradesQuery>,
) -> Result<HttpResponse, ApiError> {
    let email = query
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".into()))?;
    let course_id = path.into_inner();
    let assignments = data.repo.list_student_assignment_submissions(&course_id, email).await?;
    let quizzes = data.repo.list_student_quiz_submissions(&course_id, email).await?;
    Ok(HttpResponse::Ok().json(compute_grades(&assignments, &quizzes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(valid_score(0.0).is_ok());
        assert!(valid_score(100.0).is_ok());
        assert!(valid_score(-1.0).is_err());
        assert!(valid_score(100.5).is_err());
    }
}
