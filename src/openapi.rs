use crate::content::{ArticleContent, AssignmentContent, QuizContent};
use crate::grades::{GradeEntry, GradeReport};
use crate::models::{
    Announcement, Blog, Course, CourseProgress, ForumReply, ForumTopic, HomeSettings, Lesson, LikeOutcome,
    MarkSubmission, NewForumReply, NewForumTopic, NewQuizSubmission, NewSite, QuizSubmission, Section, SiteView,
    SubmissionSummary, UserRole,
};
use crate::routes::{blogs, courses, forum, sites, submissions, users};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::issue_jwt,
        users::is_admin,
        sites::create_site,
        sites::get_site_by_name,
        sites::join_site,
        sites::set_announcements,
        courses::create_course,
        courses::get_course,
        courses::add_section,
        courses::add_lesson,
        courses::upload_video,
        courses::save_quiz,
        submissions::get_progress,
        submissions::update_progress,
        submissions::submit_assignment,
        submissions::mark_submission,
        submissions::submit_quiz,
        submissions::grades,
        forum::create_topic,
        forum::view_topic,
        forum::create_reply,
        blogs::list_blogs,
        blogs::create_blog,
        blogs::like_blog,
    ),
    components(schemas(
        crate::routes::Message, crate::routes::InsertedId, crate::routes::JwtRequest, crate::routes::JwtResponse,
        users::AdminStatus, users::ProfileType, UserRole,
        sites::JoinSite, sites::Announcements, SiteView, NewSite, Announcement, HomeSettings,
        Course, Section, Lesson, ArticleContent, AssignmentContent, QuizContent,
        courses::NewSection, courses::RenameSection, courses::NewLesson, courses::RenameLesson,
        courses::SectionCreated, courses::LessonCreated, courses::ArticleBody, courses::AssignmentBody, courses::QuizBody,
        CourseProgress, submissions::ProgressUpdate, submissions::ProgressSaved, submissions::SubmissionCreated,
        SubmissionSummary, MarkSubmission, QuizSubmission, NewQuizSubmission, GradeReport, GradeEntry,
        ForumTopic, NewForumTopic, ForumReply, NewForumReply,
        Blog, LikeOutcome, blogs::Pagination, blogs::BlogList, blogs::BlogWithRelated, blogs::LikeToggled
    )),
    tags(
        (name = "courses", description = "Course tree and lesson content"),
        (name = "learning", description = "Progress, submissions and grades"),
        (name = "community", description = "Sites, forum and blog"),
    )
)]
pub struct ApiDoc;
