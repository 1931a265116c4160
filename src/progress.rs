//! Lesson completion and the derived course percentage.

use chrono::{DateTime, Utc};

use crate::models::CourseProgress;
use crate::repo::{Repo, RepoError, RepoResult};

/// `100 * completed / total`; a course without lessons reports 0.
pub fn completion_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Record a completion toggle and recompute the percentage from the course's
/// current lesson count.
///
/// The course is read first, so an unknown course or a lesson outside it is
/// reported before anything is written. The percentage is re-derived on every
/// call, so a stale value left by a concurrent toggle is corrected by the next.
pub async fn toggle_lesson_completion(
    repo: &dyn Repo,
    course_id: &str,
    email: &str,
    lesson_id: &str,
    completed: bool,
    at: DateTime<Utc>,
) -> RepoResult<CourseProgress> {
    let course = repo.get_course(course_id).await?;
    if completed && !course.contains_lesson(lesson_id) {
        return Err(RepoError::NotFound("lesson"));
    }

    let mut record = repo.record_completion(course_id, email, lesson_id, completed, at).await?;

    // ids of lessons deleted since completion stay in the set but no longer count
    let done = record
        .completed_lessons
        .iter()
        .filter(|id| course.contains_lesson(id.as_str()))
        .count();
    let percentage = completion_percentage(done, course.total_lessons());
    repo.set_progress_percentage(course_id, email, percentage).await?;
    record.progress = percentage;

    log::debug!("progress for {email} in {course_id}: {percentage:.1}%");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_formula() {
        assert_eq!(completion_percentage(0, 0), 0.0);
        assert_eq!(completion_percentage(3, 0), 0.0);
        assert_eq!(completion_percentage(1, 4), 25.0);
        assert_eq!(completion_percentage(4, 4), 100.0);
    }
}
