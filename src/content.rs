//! Lesson content: one typed payload per lesson.
//!
//! Every constructor validates its input before anything reaches storage, so a
//! `LessonContent` value is always storable as-is. Writing content replaces the
//! previous payload wholesale; there is no cross-type merge.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::Blob;
use crate::upload::UploadedFile;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ContentError {
    #[error("Title is required.")]
    MissingTitle,
    #[error("At least one question is required.")]
    NoQuestions,
    #[error("Video file is required")]
    MissingVideo,
    #[error("File must be a video (got {0})")]
    NotAVideo(String),
    #[error("No files were uploaded")]
    NoFiles,
    #[error("unknown content type '{0}'")]
    UnknownKind(String),
    #[error("'{0}' is not valid JSON")]
    InvalidJson(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LessonContent {
    Video(VideoContent),
    Article(ArticleContent),
    Assignment(AssignmentContent),
    Quiz(QuizContent),
    Resources(ResourceBundle),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mimetype: String,
    pub data: Blob,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArticleContent {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizContent {
    pub title: String,
    #[schema(value_type = Vec<Object>)]
    pub questions: Vec<Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBundle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub files: Vec<ResourceFile>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceFile {
    pub filename: String,
    pub filesize: i64,
    pub mimetype: String,
    pub data: Blob,
}

impl From<UploadedFile> for ResourceFile {
    fn from(f: UploadedFile) -> Self {
        ResourceFile {
            filesize: f.bytes.len() as i64,
            filename: f.filename,
            mimetype: f.mime,
            data: Blob(f.bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    Article,
    Assignment,
    Quiz,
    Resources,
}

impl FromStr for ContentKind {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ContentKind::Video),
            "article" => Ok(ContentKind::Article),
            "assignment" => Ok(ContentKind::Assignment),
            "quiz" => Ok(ContentKind::Quiz),
            "resources" | "resource" => Ok(ContentKind::Resources),
            other => Err(ContentError::UnknownKind(other.to_string())),
        }
    }
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Article => "article",
            ContentKind::Assignment => "assignment",
            ContentKind::Quiz => "quiz",
            ContentKind::Resources => "resources",
        }
    }
}

fn require_title(title: Option<String>) -> Result<String, ContentError> {
    match title.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ContentError::MissingTitle),
    }
}

impl LessonContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            LessonContent::Video(_) => ContentKind::Video,
            LessonContent::Article(_) => ContentKind::Article,
            LessonContent::Assignment(_) => ContentKind::Assignment,
            LessonContent::Quiz(_) => ContentKind::Quiz,
            LessonContent::Resources(_) => ContentKind::Resources,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            LessonContent::Video(v) => &v.title,
            LessonContent::Article(a) => &a.title,
            LessonContent::Assignment(a) => &a.title,
            LessonContent::Quiz(q) => &q.title,
            LessonContent::Resources(r) => &r.title,
        }
    }

    pub fn video(title: Option<String>, file: Option<UploadedFile>) -> Result<Self, ContentError> {
        let file = file.ok_or(ContentError::MissingVideo)?;
        if !file.mime.starts_with("video/") {
            return Err(ContentError::NotAVideo(file.mime));
        }
        Ok(LessonContent::Video(VideoContent {
            title: title.unwrap_or_default(),
            mimetype: file.mime,
            data: Blob(file.bytes),
        }))
    }

    pub fn article(title: Option<String>, content: Option<String>) -> Result<Self, ContentError> {
        Ok(LessonContent::Article(ArticleContent {
            title: require_title(title)?,
            content: content.unwrap_or_default(),
        }))
    }

    pub fn assignment(
        title: Option<String>,
        description: Option<String>,
        id: Option<String>,
    ) -> Result<Self, ContentError> {
        Ok(LessonContent::Assignment(AssignmentContent {
            title: require_title(title)?,
            description: description.unwrap_or_default(),
            id,
        }))
    }

    pub fn quiz(
        title: Option<String>,
        questions: Option<Vec<Value>>,
        id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ContentError> {
        let title = require_title(title)?;
        let questions = questions.filter(|q| !q.is_empty()).ok_or(ContentError::NoQuestions)?;
        Ok(LessonContent::Quiz(QuizContent { title, questions, id, created_at: Some(now), updated_at: None }))
    }

    pub fn resources(
        title: Option<String>,
        files: Vec<UploadedFile>,
        now: DateTime<Utc>,
    ) -> Result<Self, ContentError> {
        if files.is_empty() {
            return Err(ContentError::NoFiles);
        }
        Ok(LessonContent::Resources(ResourceBundle {
            title: title.unwrap_or_default(),
            files: files.into_iter().map(ResourceFile::from).collect(),
            uploaded_at: now,
        }))
    }
}

/// Field set accepted by the "patch content" operation.
///
/// A patch never merges with what is stored: it assembles a fresh payload of
/// the requested kind from whichever fields are present.
#[derive(Debug, Default)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
    pub content: Option<String>,
    pub questions: Option<String>,
    pub existing_files: Option<String>,
    pub files: Vec<UploadedFile>,
}

impl ContentPatch {
    pub fn build(self, now: DateTime<Utc>) -> Result<LessonContent, ContentError> {
        let title = require_title(self.title)?;
        let kind: ContentKind = self.kind.as_deref().unwrap_or("").parse()?;
        match kind {
            ContentKind::Video => {
                let video = self.files.into_iter().find(|f| f.mime.starts_with("video/"));
                LessonContent::video(Some(title), video)
            }
            ContentKind::Article => LessonContent::article(Some(title), self.content),
            ContentKind::Assignment => LessonContent::assignment(Some(title), self.description, self.id),
            ContentKind::Quiz => {
                let questions = match self.questions.as_deref() {
                    Some(raw) => Some(
                        serde_json::from_str::<Vec<Value>>(raw)
                            .map_err(|_| ContentError::InvalidJson("questions"))?,
                    ),
                    None => None,
                };
                let questions = questions.filter(|q| !q.is_empty()).ok_or(ContentError::NoQuestions)?;
                Ok(LessonContent::Quiz(QuizContent {
                    title,
                    questions,
                    id: self.id,
                    created_at: None,
                    updated_at: Some(now),
                }))
            }
            ContentKind::Resources => {
                // malformed existingFiles is treated as an empty list
                let mut files: Vec<ResourceFile> = self
                    .existing_files
                    .as_deref()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_default();
                files.extend(self.files.into_iter().map(ResourceFile::from));
                Ok(LessonContent::Resources(ResourceBundle { title, files, uploaded_at: now }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(name: &str, mime: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            field: "file".into(),
            filename: name.into(),
            mime: mime.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn video_requires_video_mime() {
        let err = LessonContent::video(Some("intro".into()), Some(file("a.png", "image/png", b"x"))).unwrap_err();
        assert_eq!(err, ContentError::NotAVideo("image/png".into()));
        assert_eq!(LessonContent::video(None, None).unwrap_err(), ContentError::MissingVideo);
        let ok = LessonContent::video(Some("intro".into()), Some(file("a.mp4", "video/mp4", b"abc"))).unwrap();
        assert_eq!(ok.kind(), ContentKind::Video);
    }

    #[test]
    fn article_and_assignment_need_title() {
        assert_eq!(LessonContent::article(Some("  ".into()), None).unwrap_err(), ContentError::MissingTitle);
        assert_eq!(LessonContent::assignment(None, None, None).unwrap_err(), ContentError::MissingTitle);
        assert!(LessonContent::article(Some("Read me".into()), Some("body".into())).is_ok());
    }

    #[test]
    fn quiz_needs_questions() {
        let now = Utc::now();
        assert_eq!(
            LessonContent::quiz(Some("Q".into()), Some(vec![]), None, now).unwrap_err(),
            ContentError::NoQuestions
        );
        let q = LessonContent::quiz(Some("Q".into()), Some(vec![json!({"q": "2+2"})]), Some("q1".into()), now).unwrap();
        assert_eq!(q.title(), "Q");
    }

    #[test]
    fn serialized_form_is_tagged_by_type() {
        let c = LessonContent::article(Some("T".into()), Some("body".into())).unwrap();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "article");
        assert_eq!(v["title"], "T");
        let back: LessonContent = serde_json::from_value(v).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn patch_merges_existing_and_new_files() {
        let existing = serde_json::to_string(&vec![ResourceFile {
            filename: "old.pdf".into(),
            filesize: 3,
            mimetype: "application/pdf".into(),
            data: Blob(b"old".to_vec()),
        }])
        .unwrap();
        let patch = ContentPatch {
            title: Some("Slides".into()),
            kind: Some("resources".into()),
            existing_files: Some(existing),
            files: vec![file("new.pdf", "application/pdf", b"new!")],
            ..Default::default()
        };
        match patch.build(Utc::now()).unwrap() {
            LessonContent::Resources(r) => {
                let names: Vec<_> = r.files.iter().map(|f| f.filename.as_str()).collect();
                assert_eq!(names, vec!["old.pdf", "new.pdf"]);
                assert_eq!(r.files[1].filesize, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn patch_rejects_bad_input() {
        let no_title = ContentPatch { kind: Some("article".into()), ..Default::default() };
        assert_eq!(no_title.build(Utc::now()).unwrap_err(), ContentError::MissingTitle);

        let bad_kind = ContentPatch { title: Some("t".into()), kind: Some("podcast".into()), ..Default::default() };
        assert!(matches!(bad_kind.build(Utc::now()), Err(ContentError::UnknownKind(_))));

        let bad_questions = ContentPatch {
            title: Some("t".into()),
            kind: Some("quiz".into()),
            questions: Some("not json".into()),
            ..Default::default()
        };
        assert_eq!(bad_questions.build(Utc::now()).unwrap_err(), ContentError::InvalidJson("questions"));
    }

    #[test]
    fn patch_builds_fresh_assignment() {
        let patch = ContentPatch {
            title: Some("Essay".into()),
            kind: Some("assignment".into()),
            description: Some("500 words".into()),
            id: Some("a-1".into()),
            content: Some("ignored for assignments".into()),
            ..Default::default()
        };
        let built = patch.build(Utc::now()).unwrap();
        assert_eq!(
            built,
            LessonContent::Assignment(AssignmentContent {
                title: "Essay".into(),
                description: "500 words".into(),
                id: Some("a-1".into()),
            })
        );
    }
}
