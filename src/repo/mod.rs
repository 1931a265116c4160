use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::content::LessonContent;
use crate::models::*;

#[cfg(feature = "inmem-store")]
pub mod inmem;
#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    /// Names the missing entity: "course", "section", "lesson", ...
    #[error("{0} not found")] NotFound(&'static str),
    #[error("{0}")] Conflict(&'static str),
    #[error("storage failure: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

pub const SITE_NAME_TAKEN: &str = "Site name already exists";
pub const ALREADY_MEMBER: &str = "You are already a member of this site";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<User>;
    /// Insert only when no user with this email exists; `None` when it did.
    async fn insert_user_if_absent(&self, new: NewUser) -> RepoResult<Option<User>>;
    async fn set_profile_pic(&self, email: &str, pic: Blob) -> RepoResult<()>;
    async fn set_profile_type(&self, email: &str, profile_type: &str) -> RepoResult<()>;
    /// Set the given fields on the user with this email, creating it if absent.
    async fn upsert_profile(&self, email: &str, fields: Map<String, Value>) -> RepoResult<()>;
    async fn delete_user(&self, id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait SiteRepo: Send + Sync {
    async fn create_site(&self, new: NewSite) -> RepoResult<Site>;
    async fn get_site(&self, id: &str) -> RepoResult<Site>;
    async fn get_site_by_name(&self, name: &str) -> RepoResult<Site>;
    async fn list_sites_created_by(&self, email: &str) -> RepoResult<Vec<Site>>;
    async fn list_sites_joined_by(&self, email: &str) -> RepoResult<Vec<Site>>;
    /// Add `email` to the member set; `Conflict` when already present.
    async fn add_member(&self, site_id: &str, email: &str) -> RepoResult<()>;
    async fn set_announcements(&self, site_id: &str, announcements: Vec<Announcement>) -> RepoResult<()>;
    async fn update_home_settings(&self, site_id: &str, settings: HomeSettings) -> RepoResult<()>;
}

/// The course aggregate. Every nested mutation is a single match-and-mutate
/// step keyed by section/lesson id, never by array position.
#[async_trait]
pub trait CourseRepo: Send + Sync {
    async fn create_course(&self, new: NewCourse) -> RepoResult<Course>;
    async fn get_course(&self, id: &str) -> RepoResult<Course>;
    async fn list_courses_by_origin(&self, origin: &str) -> RepoResult<Vec<Course>>;
    async fn update_course_settings(&self, id: &str, settings: CourseSettings) -> RepoResult<()>;
    async fn delete_course(&self, id: &str) -> RepoResult<()>;

    async fn add_section(&self, course_id: &str, title: &str) -> RepoResult<Section>;
    async fn rename_section(&self, course_id: &str, section_id: &str, title: &str) -> RepoResult<()>;
    async fn delete_section(&self, course_id: &str, section_id: &str) -> RepoResult<()>;

    async fn add_lesson(&self, course_id: &str, section_id: &str, name: &str) -> RepoResult<Lesson>;
    async fn rename_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str, name: &str) -> RepoResult<()>;
    async fn delete_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()>;

    async fn set_lesson_content(
        &self,
        course_id: &str,
        section_id: &str,
        lesson_id: &str,
        content: LessonContent,
    ) -> RepoResult<()>;
    async fn clear_lesson_content(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait ProgressRepo: Send + Sync {
    async fn get_progress(&self, course_id: &str, email: &str) -> RepoResult<Option<CourseProgress>>;
    /// Upsert the (course, email) record: add or remove `lesson_id`, stamp
    /// `lastUpdated`, and `startedAt` only when the record is created.
    async fn record_completion(
        &self,
        course_id: &str,
        email: &str,
        lesson_id: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> RepoResult<CourseProgress>;
    async fn set_progress_percentage(&self, course_id: &str, email: &str, progress: f64) -> RepoResult<()>;
}

#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    async fn insert_assignment_submission(&self, new: NewAssignmentSubmission) -> RepoResult<AssignmentSubmission>;
    async fn list_assignment_submissions(&self, assignment_id: &str) -> RepoResult<Vec<AssignmentSubmission>>;
    async fn find_assignment_submission(&self, assignment_id: &str, email: &str) -> RepoResult<AssignmentSubmission>;
    async fn mark_assignment_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
        score: f64,
        feedback: Option<String>,
    ) -> RepoResult<()>;
    async fn list_student_assignment_submissions(&self, course_id: &str, email: &str) -> RepoResult<Vec<AssignmentSubmission>>;

    async fn insert_quiz_submission(&self, new: NewQuizSubmission) -> RepoResult<QuizSubmission>;
    async fn find_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<QuizSubmission>;
    async fn delete_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<()>;
    async fn list_student_quiz_submissions(&self, course_id: &str, user_id: &str) -> RepoResult<Vec<QuizSubmission>>;
}

/// Forum topics keep a denormalized reply counter; every method that adds or
/// removes replies adjusts it in the same call.
#[async_trait]
pub trait ForumRepo: Send + Sync {
    async fn list_topics(&self) -> RepoResult<Vec<ForumTopic>>;
    async fn create_topic(&self, new: NewForumTopic, author: &str) -> RepoResult<ForumTopic>;
    async fn get_topic(&self, id: &str) -> RepoResult<ForumTopic>;
    /// Increment the view counter and return the updated topic.
    async fn view_topic(&self, id: &str) -> RepoResult<ForumTopic>;
    /// Remove the topic and all of its replies; returns the number of replies removed.
    async fn delete_topic(&self, id: &str) -> RepoResult<u64>;

    async fn list_replies(&self, topic_id: &str) -> RepoResult<Vec<ForumReply>>;
    async fn get_reply(&self, id: &str) -> RepoResult<ForumReply>;
    async fn create_reply(&self, new: NewForumReply, author: &str) -> RepoResult<ForumReply>;
    async fn delete_reply(&self, id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait BlogRepo: Send + Sync {
    async fn list_blogs(&self, query: &BlogQuery) -> RepoResult<BlogPage>;
    async fn get_blog(&self, id: &str) -> RepoResult<Blog>;
    /// Increment the view counter and return the updated blog.
    async fn view_blog(&self, id: &str) -> RepoResult<Blog>;
    async fn related_blogs(&self, category: &str, exclude_id: &str, limit: usize) -> RepoResult<Vec<Blog>>;
    async fn create_blog(&self, new: NewBlog) -> RepoResult<Blog>;
    async fn update_blog(&self, id: &str, upd: BlogUpdate) -> RepoResult<Blog>;
    async fn delete_blog(&self, id: &str) -> RepoResult<()>;
    /// Like when `email` is not in `likedBy`, otherwise unlike. Counter and
    /// set change together.
    async fn toggle_like(&self, id: &str, email: &str) -> RepoResult<LikeOutcome>;
}

pub trait Repo: UserRepo + SiteRepo + CourseRepo + ProgressRepo + SubmissionRepo + ForumRepo + BlogRepo {}

impl<T> Repo for T where T: UserRepo + SiteRepo + CourseRepo + ProgressRepo + SubmissionRepo + ForumRepo + BlogRepo {}
