//! Grade report for one student in one course.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{AssignmentSubmission, QuizSubmission};

/// Assignments are marked on the same 0..=100 scale as quizzes.
pub const ASSIGNMENT_MAX_SCORE: f64 = 100.0;
pub const QUIZ_MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub title: String,
    pub score: f64,
    pub max_score: f64,
    pub submission_date: DateTime<Utc>,
    pub feedback: String,
}

impl GradeEntry {
    /// Score on a 0..=100 scale.
    pub fn normalized(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        self.score / self.max_score * 100.0
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub assignments: Vec<GradeEntry>,
    pub quizzes: Vec<GradeEntry>,
    /// One-decimal percentage such as "87.5%", or "N/A" without submissions.
    pub overall_grade: String,
}

pub fn compute_grades(assignments: &[AssignmentSubmission], quizzes: &[QuizSubmission]) -> GradeReport {
    let assignments: Vec<GradeEntry> = assignments
        .iter()
        .map(|a| GradeEntry {
            title: "Assignment".into(),
            score: a.score.unwrap_or(0.0),
            max_score: ASSIGNMENT_MAX_SCORE,
            submission_date: a.submitted_at,
            feedback: a.feedback.clone().unwrap_or_default(),
        })
        .collect();
    let quizzes: Vec<GradeEntry> = quizzes
        .iter()
        .map(|q| GradeEntry {
            title: "Quiz".into(),
            score: q.score,
            max_score: QUIZ_MAX_SCORE,
            submission_date: q.submitted_at,
            feedback: String::new(),
        })
        .collect();

    let scores: Vec<f64> = assignments.iter().chain(&quizzes).map(GradeEntry::normalized).collect();
    let overall_grade = match scores.len() {
        0 => "N/A".to_string(),
        n => format!("{:.1}%", scores.iter().sum::<f64>() / n as f64),
    };

    GradeReport { assignments, quizzes, overall_grade }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Blob;
    use serde_json::Value;

    fn assignment(score: Option<f64>) -> AssignmentSubmission {
        AssignmentSubmission {
            id: "a".into(),
            assignment_id: "asg".into(),
            course_id: "c".into(),
            section_id: "s".into(),
            lesson_id: "l".into(),
            student_email: "s@x.io".into(),
            file_name: "work.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 1,
            file_data: Blob(vec![1]),
            submitted_at: Utc::now(),
            score,
            feedback: score.map(|_| "good".into()),
            marked_at: None,
        }
    }

    fn quiz(score: f64) -> QuizSubmission {
        QuizSubmission {
            id: "q".into(),
            course_id: "c".into(),
            section_id: "s".into(),
            lesson_id: "l".into(),
            user_id: "s@x.io".into(),
            quiz_id: "quiz".into(),
            score,
            answers: Value::Null,
            total_questions: None,
            correct_answers: None,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn no_submissions_is_not_applicable() {
        let report = compute_grades(&[], &[]);
        assert_eq!(report.overall_grade, "N/A");
        assert!(report.assignments.is_empty() && report.quizzes.is_empty());
    }

    #[test]
    fn averages_unweighted_across_kinds() {
        let report = compute_grades(&[assignment(Some(80.0)), assignment(None)], &[quiz(95.0)]);
        // (80 + 0 + 95) / 3
        assert_eq!(report.overall_grade, "58.3%");
        assert_eq!(report.assignments[0].feedback, "good");
        assert_eq!(report.assignments[1].feedback, "");
        assert_eq!(report.assignments[0].max_score, 100.0);
    }

    #[test]
    fn perfect_marks_stay_at_one_hundred() {
        let report = compute_grades(&[assignment(Some(100.0))], &[quiz(100.0)]);
        assert_eq!(report.overall_grade, "100.0%");
    }
}
