use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::content::LessonContent;

/// Top-level documents carry an opaque string id (ObjectId hex or UUID).
pub type Id = String;

/// Fresh identifier for nested sections and lessons.
pub fn new_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

/// Binary payload embedded in a document, carried as base64 text both on the
/// wire and at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
}

impl From<Vec<u8>> for Blob {
    fn from(v: Vec<u8>) -> Self { Blob(v) }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Blob)
            .map_err(serde::de::Error::custom)
    }
}

// ---------------- users ----------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<Blob>,
    /// Free-form profile fields (name, photo URL, phone, ...).
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// Keys a caller may never write through the free-form profile update.
pub const RESERVED_PROFILE_KEYS: &[&str] = &["_id", "email", "role", "profilePic", "profileType"];

/// Drop reserved keys so free-form updates cannot escalate role or rewrite ids.
pub fn sanitize_profile(mut profile: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_PROFILE_KEYS {
        profile.remove(*key);
    }
    profile
}

impl NewUser {
    pub fn into_user(self, id: Id) -> User {
        User {
            id,
            email: self.email,
            role: UserRole::default(),
            profile_type: None,
            profile_pic: None,
            profile: sanitize_profile(self.profile),
        }
    }
}

// ---------------- sites ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "_id")]
    pub id: Id,
    pub site_name: String,
    pub created_by: String,
    pub password: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
    #[serde(default)]
    pub full_site_name: Option<String>,
    #[serde(default)]
    pub short_site_name: Option<String>,
    #[serde(default)]
    pub site_summary: Option<String>,
}

impl Site {
    pub fn is_member(&self, email: &str) -> bool {
        self.members.iter().any(|m| m == email)
    }

    /// Returns false when `email` already belongs to the site.
    pub fn add_member(&mut self, email: &str) -> bool {
        if self.is_member(email) {
            return false;
        }
        self.members.push(email.to_string());
        true
    }

    pub fn apply_home_settings(&mut self, settings: HomeSettings) {
        self.full_site_name = settings.full_site_name;
        self.short_site_name = settings.short_site_name;
        self.site_summary = settings.site_summary;
    }
}

/// Site as returned to clients: everything except the join password.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteView {
    #[serde(rename = "_id")]
    pub id: Id,
    pub site_id: Id,
    pub site_name: String,
    pub created_by: String,
    pub date: Option<String>,
    pub members: Vec<String>,
    pub announcements: Vec<Announcement>,
    pub full_site_name: Option<String>,
    pub short_site_name: Option<String>,
    pub site_summary: Option<String>,
}

impl From<Site> for SiteView {
    fn from(s: Site) -> Self {
        SiteView {
            site_id: s.id.clone(),
            id: s.id,
            site_name: s.site_name,
            created_by: s.created_by,
            date: s.date,
            members: s.members,
            announcements: s.announcements,
            full_site_name: s.full_site_name,
            short_site_name: s.short_site_name,
            site_summary: s.site_summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub created_by: String,
    pub site_name: String,
    pub password: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl NewSite {
    pub fn into_site(self, id: Id) -> Site {
        Site {
            id,
            site_name: self.site_name,
            created_by: self.created_by,
            password: self.password,
            date: self.date,
            members: Vec::new(),
            announcements: Vec::new(),
            full_site_name: None,
            short_site_name: None,
            site_summary: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeSettings {
    pub full_site_name: Option<String>,
    pub short_site_name: Option<String>,
    pub site_summary: Option<String>,
}

// ---------------- courses ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: Id,
    pub origin: String,
    pub course_name: String,
    #[serde(default)]
    pub course_description: String,
    #[serde(default)]
    pub course_category: String,
    #[serde(default)]
    pub course_tags: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[schema(value_type = String, format = Byte)]
    pub thumbnail: Blob,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn total_lessons(&self) -> usize {
        self.sections.iter().map(|s| s.lessons.len()).sum()
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.section_id == section_id)
    }

    pub fn contains_lesson(&self, lesson_id: &str) -> bool {
        self.sections
            .iter()
            .any(|s| s.lessons.iter().any(|l| l.lesson_id == lesson_id))
    }

    pub fn push_section(&mut self, title: &str) -> Section {
        let section = Section {
            course_id: self.id.clone(),
            section_id: new_id(),
            title: title.to_string(),
            lessons: Vec::new(),
        };
        self.sections.push(section.clone());
        section
    }

    /// Returns false when no section has this id.
    pub fn remove_section(&mut self, section_id: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.section_id != section_id);
        self.sections.len() != before
    }

    pub fn apply_settings(&mut self, settings: CourseSettings, now: DateTime<Utc>) {
        if let Some(v) = settings.course_name { self.course_name = v; }
        if let Some(v) = settings.course_description { self.course_description = v; }
        if let Some(v) = settings.course_category { self.course_category = v; }
        if let Some(v) = settings.course_tags { self.course_tags = v; }
        if let Some(v) = settings.thumbnail { self.thumbnail = v; }
        self.updated_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub course_id: Id,
    pub section_id: Id,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Section {
    pub fn lesson_mut(&mut self, lesson_id: &str) -> Option<&mut Lesson> {
        self.lessons.iter_mut().find(|l| l.lesson_id == lesson_id)
    }

    pub fn push_lesson(&mut self, name: &str) -> Lesson {
        let lesson = Lesson {
            course_id: self.course_id.clone(),
            section_id: self.section_id.clone(),
            lesson_id: new_id(),
            name: name.to_string(),
            content: None,
        };
        self.lessons.push(lesson.clone());
        lesson
    }

    pub fn remove_lesson(&mut self, lesson_id: &str) -> bool {
        let before = self.lessons.len();
        self.lessons.retain(|l| l.lesson_id != lesson_id);
        self.lessons.len() != before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub course_id: Id,
    pub section_id: Id,
    pub lesson_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub content: Option<LessonContent>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub origin: String,
    pub course_name: String,
    pub course_description: String,
    pub course_category: String,
    pub course_tags: Vec<String>,
    pub created_by: Option<String>,
    pub thumbnail: Blob,
}

impl NewCourse {
    pub fn into_course(self, id: Id, now: DateTime<Utc>) -> Course {
        Course {
            id,
            origin: self.origin,
            course_name: self.course_name,
            course_description: self.course_description,
            course_category: self.course_category,
            course_tags: self.course_tags,
            created_by: self.created_by,
            thumbnail: self.thumbnail,
            sections: Vec::new(),
            created_at: now,
            updated_at: None,
        }
    }
}

/// Course-level settings; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CourseSettings {
    pub course_name: Option<String>,
    pub course_description: Option<String>,
    pub course_category: Option<String>,
    pub course_tags: Option<Vec<String>>,
    pub thumbnail: Option<Blob>,
}

/// Tags arrive either as a JSON array or as a comma separated list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw) {
        return tags.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
    }
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ---------------- progress ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: Id,
    pub user_email: String,
    #[serde(default)]
    pub completed_lessons: Vec<Id>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CourseProgress {
    pub fn started(course_id: &str, email: &str, at: DateTime<Utc>) -> Self {
        CourseProgress {
            course_id: course_id.to_string(),
            user_email: email.to_string(),
            completed_lessons: Vec::new(),
            progress: 0.0,
            started_at: Some(at),
            last_updated: None,
        }
    }

    /// Set-semantics toggle: completing twice or un-completing an absent
    /// lesson leaves the list unchanged.
    pub fn set_completed(&mut self, lesson_id: &str, completed: bool, at: DateTime<Utc>) {
        if completed {
            if !self.completed_lessons.iter().any(|l| l == lesson_id) {
                self.completed_lessons.push(lesson_id.to_string());
            }
        } else {
            self.completed_lessons.retain(|l| l != lesson_id);
        }
        self.last_updated = Some(at);
    }
}

// ---------------- submissions ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSubmission {
    #[serde(rename = "_id")]
    pub id: Id,
    pub assignment_id: String,
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
    pub student_email: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_data: Blob,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub marked_at: Option<DateTime<Utc>>,
}

/// Submission metadata without the uploaded bytes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    #[serde(rename = "_id")]
    pub id: Id,
    pub assignment_id: String,
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
    pub student_email: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub marked_at: Option<DateTime<Utc>>,
}

impl From<AssignmentSubmission> for SubmissionSummary {
    fn from(s: AssignmentSubmission) -> Self {
        SubmissionSummary {
            id: s.id,
            assignment_id: s.assignment_id,
            course_id: s.course_id,
            section_id: s.section_id,
            lesson_id: s.lesson_id,
            student_email: s.student_email,
            file_name: s.file_name,
            file_type: s.file_type,
            file_size: s.file_size,
            submitted_at: s.submitted_at,
            score: s.score,
            feedback: s.feedback,
            marked_at: s.marked_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAssignmentSubmission {
    pub assignment_id: String,
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
    pub student_email: String,
    pub file_name: String,
    pub file_type: String,
    pub file_data: Blob,
}

impl NewAssignmentSubmission {
    pub fn into_submission(self, id: Id, now: DateTime<Utc>) -> AssignmentSubmission {
        AssignmentSubmission {
            id,
            assignment_id: self.assignment_id,
            course_id: self.course_id,
            section_id: self.section_id,
            lesson_id: self.lesson_id,
            student_email: self.student_email,
            file_name: self.file_name,
            file_type: self.file_type,
            file_size: self.file_data.len() as i64,
            file_data: self.file_data,
            submitted_at: now,
            score: None,
            feedback: None,
            marked_at: None,
        }
    }
}

impl AssignmentSubmission {
    pub fn mark(&mut self, score: f64, feedback: Option<String>, now: DateTime<Utc>) {
        self.score = Some(score);
        self.feedback = feedback;
        self.marked_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkSubmission {
    pub score: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub lesson_id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub score: f64,
    #[schema(value_type = Object)]
    pub answers: Value,
    #[serde(default)]
    pub total_questions: Option<i64>,
    #[serde(default)]
    pub correct_answers: Option<i64>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizSubmission {
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub lesson_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub quiz_id: String,
    pub score: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub answers: Option<Value>,
    #[serde(default)]
    pub total_questions: Option<i64>,
    #[serde(default)]
    pub correct_answers: Option<i64>,
}

impl NewQuizSubmission {
    pub fn into_submission(self, id: Id, now: DateTime<Utc>) -> QuizSubmission {
        QuizSubmission {
            id,
            course_id: self.course_id,
            section_id: self.section_id,
            lesson_id: self.lesson_id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            score: self.score.unwrap_or_default(),
            answers: self.answers.unwrap_or(Value::Null),
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            submitted_at: now,
        }
    }
}

// ---------------- forum ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForumTopic {
    #[serde(rename = "_id")]
    pub id: Id,
    pub author: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub replies: i64,
    #[serde(default)]
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewForumTopic {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewForumTopic {
    pub fn into_topic(self, id: Id, author: &str, now: DateTime<Utc>) -> ForumTopic {
        ForumTopic {
            id,
            author: author.to_string(),
            title: self.title,
            body: self.body,
            category: self.category,
            created_at: now,
            replies: 0,
            views: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForumReply {
    #[serde(rename = "_id")]
    pub id: Id,
    pub topic_id: Id,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewForumReply {
    pub topic_id: Id,
    pub body: String,
}

impl NewForumReply {
    pub fn into_reply(self, id: Id, author: &str, now: DateTime<Utc>) -> ForumReply {
        ForumReply { id, topic_id: self.topic_id, author: author.to_string(), body: self.body, created_at: now }
    }
}

// ---------------- blog ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Byte)]
    pub image: Option<Blob>,
    pub excerpt: String,
    pub author: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub liked_by: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub content: String,
    pub category: String,
    pub excerpt: Option<String>,
    pub image: Option<Blob>,
    pub author: String,
    pub author_name: String,
}

impl NewBlog {
    pub fn into_blog(self, id: Id, now: DateTime<Utc>) -> Blog {
        let excerpt = self
            .excerpt
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_excerpt(&self.content));
        Blog {
            id,
            title: self.title,
            content: self.content,
            category: self.category,
            image: self.image,
            excerpt,
            author: self.author,
            author_name: self.author_name,
            created_at: now,
            updated_at: now,
            views: 0,
            likes: 0,
            liked_by: Vec::new(),
        }
    }
}

impl Blog {
    /// Like when `email` has not liked yet, otherwise unlike. `likes` always
    /// equals the size of `liked_by` afterwards.
    pub fn toggle_like(&mut self, email: &str) -> LikeOutcome {
        let liked = match self.liked_by.iter().position(|e| e == email) {
            Some(idx) => {
                self.liked_by.remove(idx);
                false
            }
            None => {
                self.liked_by.push(email.to_string());
                true
            }
        };
        self.likes = self.liked_by.len() as i64;
        LikeOutcome { liked, likes: self.likes }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub excerpt: Option<String>,
    pub image: Option<Blob>,
}

const EXCERPT_CHARS: usize = 150;

/// First 150 characters of the body followed by an ellipsis.
pub fn default_excerpt(content: &str) -> String {
    let head: String = content.chars().take(EXCERPT_CHARS).collect();
    format!("{head}...")
}

impl BlogUpdate {
    /// Apply onto an existing blog; empty strings count as absent.
    pub fn apply(self, blog: &mut Blog, now: DateTime<Utc>) {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let new_content = non_empty(self.content);
        if let Some(t) = non_empty(self.title) { blog.title = t; }
        if let Some(c) = non_empty(self.category) { blog.category = c; }
        match (non_empty(self.excerpt), &new_content) {
            (Some(e), _) => blog.excerpt = e,
            (None, Some(c)) => blog.excerpt = default_excerpt(c),
            (None, None) => {}
        }
        if let Some(c) = new_content { blog.content = c; }
        if let Some(img) = self.image { blog.image = Some(img); }
        blog.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BlogQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub const DEFAULT_BLOG_PAGE_SIZE: u64 = 6;
pub const MAX_BLOG_PAGE_SIZE: u64 = 100;

impl BlogQuery {
    pub fn page(&self) -> u64 { self.page.filter(|p| *p >= 1).unwrap_or(1) }

    pub fn limit(&self) -> u64 {
        self.limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_BLOG_PAGE_SIZE)
            .min(MAX_BLOG_PAGE_SIZE)
    }

    /// Row offset of the requested page; saturates so a huge page is just past the end.
    pub fn skip(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit()).min(i64::MAX as u64)
    }

    pub fn category(&self) -> Option<&str> { self.category.as_deref().filter(|c| !c.is_empty()) }

    pub fn search(&self) -> Option<&str> { self.search.as_deref().filter(|s| !s.is_empty()) }

    /// Case-insensitive substring match over title and content, plus category filter.
    pub fn matches(&self, blog: &Blog) -> bool {
        if let Some(cat) = self.category() {
            if blog.category != cat { return false; }
        }
        match self.search() {
            Some(needle) => {
                let needle = needle.to_lowercase();
                blog.title.to_lowercase().contains(&needle) || blog.content.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// One page of blogs plus the totals needed for pagination.
#[derive(Debug, Clone)]
pub struct BlogPage {
    pub blogs: Vec<Blog>,
    pub total: u64,
    pub categories: Vec<String>,
}

pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 { 0 } else { total.div_ceil(limit) }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_base64_on_the_wire() {
        let b = Blob(vec![0, 1, 2, 250]);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "\"AAEC+g==\"");
        let back: Blob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn tags_accept_json_or_csv() {
        assert_eq!(parse_tags(r#"["rust", " web "]"#), vec!["rust", "web"]);
        assert_eq!(parse_tags("rust, web,,"), vec!["rust", "web"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn blog_query_defaults_and_clamps() {
        let q = BlogQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 6);
        assert_eq!(q.skip(), 0);
        let q = BlogQuery { page: Some(3), limit: Some(1000), ..Default::default() };
        assert_eq!(q.limit(), MAX_BLOG_PAGE_SIZE);
        assert_eq!(q.skip(), 200);
        assert_eq!(total_pages(13, 6), 3);
        assert_eq!(total_pages(0, 6), 0);
    }

    #[test]
    fn huge_page_saturates_offset() {
        let q = BlogQuery { page: Some(u64::MAX), limit: Some(50), ..Default::default() };
        assert_eq!(q.skip(), i64::MAX as u64);
    }

    #[test]
    fn excerpt_is_char_safe() {
        let body = "é".repeat(200);
        let e = default_excerpt(&body);
        assert_eq!(e.chars().count(), 153);
        assert!(e.ends_with("..."));
    }

    #[test]
    fn like_toggle_keeps_counter_in_step() {
        let now = Utc::now();
        let mut blog = NewBlog {
            title: "t".into(),
            content: "c".into(),
            category: "news".into(),
            excerpt: None,
            image: None,
            author: "a@x.io".into(),
            author_name: "a".into(),
        }
        .into_blog("b1".into(), now);
        assert_eq!(blog.toggle_like("u@x.io"), LikeOutcome { liked: true, likes: 1 });
        assert_eq!(blog.toggle_like("v@x.io"), LikeOutcome { liked: true, likes: 2 });
        assert_eq!(blog.toggle_like("u@x.io"), LikeOutcome { liked: false, likes: 1 });
        assert_eq!(blog.liked_by, vec!["v@x.io".to_string()]);
    }

    #[test]
    fn completion_toggle_is_idempotent() {
        let now = Utc::now();
        let mut p = CourseProgress::started("c1", "s@x.io", now);
        p.set_completed("l1", true, now);
        p.set_completed("l1", true, now);
        assert_eq!(p.completed_lessons, vec!["l1".to_string()]);
        p.set_completed("l2", false, now);
        p.set_completed("l1", false, now);
        assert!(p.completed_lessons.is_empty());
        assert_eq!(p.last_updated, Some(now));
    }

    #[test]
    fn section_and_lesson_ids_are_unique() {
        let mut course = NewCourse {
            origin: "site".into(),
            course_name: "Rust".into(),
            course_description: String::new(),
            course_category: String::new(),
            course_tags: vec![],
            created_by: None,
            thumbnail: Blob::default(),
        }
        .into_course("c1".into(), Utc::now());
        let a = course.push_section("A");
        let b = course.push_section("B");
        assert_ne!(a.section_id, b.section_id);
        let section = course.section_mut(&a.section_id).unwrap();
        let l1 = section.push_lesson("one");
        let l2 = section.push_lesson("two");
        assert_ne!(l1.lesson_id, l2.lesson_id);
        assert_eq!(l1.course_id, "c1");
        assert!(course.contains_lesson(&l2.lesson_id));
        assert_eq!(course.total_lessons(), 2);
        assert!(course.remove_section(&a.section_id));
        assert!(!course.remove_section(&a.section_id));
        assert_eq!(course.total_lessons(), 0);
    }

    #[test]
    fn sanitize_profile_drops_role() {
        let mut m = Map::new();
        m.insert("role".into(), Value::String("admin".into()));
        m.insert("name".into(), Value::String("Ada".into()));
        let m = sanitize_profile(m);
        assert!(m.get("role").is_none());
        assert_eq!(m.get("name").unwrap(), "Ada");
    }
}
