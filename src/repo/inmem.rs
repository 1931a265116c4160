//! Process-local store. One write lock per call gives every nested mutation
//! the same match-and-mutate atomicity a positional update has in a document
//! database.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::*;

#[derive(Default, Serialize, Deserialize)]
struct State {
    users: Vec<User>,
    sites: Vec<Site>,
    courses: Vec<Course>,
    progress: Vec<CourseProgress>,
    assignment_submissions: Vec<AssignmentSubmission>,
    quiz_submissions: Vec<QuizSubmission>,
    topics: Vec<ForumTopic>,
    replies: Vec<ForumReply>,
    blogs: Vec<Blog>,
}

impl State {
    fn course_mut(&mut self, id: &str) -> RepoResult<&mut Course> {
        self.courses.iter_mut().find(|c| c.id == id).ok_or(RepoError::NotFound("course"))
    }

    fn section_mut(&mut self, course_id: &str, section_id: &str) -> RepoResult<&mut Section> {
        self.course_mut(course_id)?
            .section_mut(section_id)
            .ok_or(RepoError::NotFound("section"))
    }

    fn lesson_mut(&mut self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<&mut Lesson> {
        self.section_mut(course_id, section_id)?
            .lesson_mut(lesson_id)
            .ok_or(RepoError::NotFound("lesson"))
    }

    fn site_mut(&mut self, id: &str) -> RepoResult<&mut Site> {
        self.sites.iter_mut().find(|s| s.id == id).ok_or(RepoError::NotFound("site"))
    }

    fn topic_mut(&mut self, id: &str) -> RepoResult<&mut ForumTopic> {
        self.topics.iter_mut().find(|t| t.id == id).ok_or(RepoError::NotFound("topic"))
    }

    fn blog_mut(&mut self, id: &str) -> RepoResult<&mut Blog> {
        self.blogs.iter_mut().find(|b| b.id == id).ok_or(RepoError::NotFound("blog"))
    }
}

#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl InMemRepo {
    /// Empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot under `dir`, loaded now and rewritten
    /// after every mutation.
    pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join("state.json");
        let state = Self::load_state_from(&path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(Arc::new(path)),
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    log::info!("loaded snapshot '{}'", path.display());
                    s
                }
                Err(e) => {
                    log::warn!("failed to parse snapshot '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            },
            Err(e) => {
                log::info!("no snapshot at '{}': {e}. Starting empty.", path.display());
                State::default()
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `state` to the snapshot file. Callers hold the write guard so
    /// snapshots land on disk in mutation order.
    fn persist(&self, state: &State) {
        let Some(path) = self.snapshot_path.as_deref() else { return };
        let bytes = match serde_json::to_vec_pretty(state) {
            Ok(b) => b,
            Err(e) => {
                log::error!("failed to serialise snapshot: {e}");
                return;
            }
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(path, bytes) {
            log::error!("failed to write snapshot '{}': {e}", path.display());
        }
    }

    /// Run `f` under the write lock and persist before releasing it when it succeeded.
    fn mutate<T>(&self, f: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
        let mut s = self.write();
        let out = f(&mut s);
        if out.is_ok() {
            self.persist(&s);
        }
        out
    }

    fn next_id() -> Id {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.read().users.clone())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        self.read()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepoError::NotFound("user"))
    }

    async fn insert_user_if_absent(&self, new: NewUser) -> RepoResult<Option<User>> {
        self.mutate(|s| {
            if s.users.iter().any(|u| u.email == new.email) {
                return Ok(None);
            }
            let user = new.into_user(Self::next_id());
            s.users.push(user.clone());
            Ok(Some(user))
        })
    }

    async fn set_profile_pic(&self, email: &str, pic: Blob) -> RepoResult<()> {
        self.mutate(|s| {
            let user = s.users.iter_mut().find(|u| u.email == email).ok_or(RepoError::NotFound("user"))?;
            user.profile_pic = Some(pic);
            Ok(())
        })
    }

    async fn set_profile_type(&self, email: &str, profile_type: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let user = s.users.iter_mut().find(|u| u.email == email).ok_or(RepoError::NotFound("user"))?;
            user.profile_type = Some(profile_type.to_string());
            Ok(())
        })
    }

    async fn upsert_profile(&self, email: &str, fields: Map<String, Value>) -> RepoResult<()> {
        let fields = sanitize_profile(fields);
        self.mutate(|s| {
            match s.users.iter_mut().find(|u| u.email == email) {
                Some(user) => user.profile.extend(fields),
                None => s.users.push(NewUser { email: email.to_string(), profile: fields }.into_user(Self::next_id())),
            }
            Ok(())
        })
    }

    async fn delete_user(&self, id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let before = s.users.len();
            s.users.retain(|u| u.id != id);
            if s.users.len() == before { Err(RepoError::NotFound("user")) } else { Ok(()) }
        })
    }
}

#[async_trait]
impl SiteRepo for InMemRepo {
    async fn create_site(&self, new: NewSite) -> RepoResult<Site> {
        self.mutate(|s| {
            if s.sites.iter().any(|site| site.site_name == new.site_name) {
                return Err(RepoError::Conflict(SITE_NAME_TAKEN));
            }
            let site = new.into_site(Self::next_id());
            s.sites.push(site.clone());
            Ok(site)
        })
    }

    async fn get_site(&self, id: &str) -> RepoResult<Site> {
        self.read().sites.iter().find(|s| s.id == id).cloned().ok_or(RepoError::NotFound("site"))
    }

    async fn get_site_by_name(&self, name: &str) -> RepoResult<Site> {
        self.read()
            .sites
            .iter()
            .find(|s| s.site_name == name)
            .cloned()
            .ok_or(RepoError::NotFound("site"))
    }

    async fn list_sites_created_by(&self, email: &str) -> RepoResult<Vec<Site>> {
        Ok(self.read().sites.iter().filter(|s| s.created_by == email).cloned().collect())
    }

    async fn list_sites_joined_by(&self, email: &str) -> RepoResult<Vec<Site>> {
        Ok(self.read().sites.iter().filter(|s| s.is_member(email)).cloned().collect())
    }

    async fn add_member(&self, site_id: &str, email: &str) -> RepoResult<()> {
        self.mutate(|s| {
            if s.site_mut(site_id)?.add_member(email) {
                Ok(())
            } else {
                Err(RepoError::Conflict(ALREADY_MEMBER))
            }
        })
    }

    async fn set_announcements(&self, site_id: &str, announcements: Vec<Announcement>) -> RepoResult<()> {
        self.mutate(|s| {
            s.site_mut(site_id)?.announcements = announcements;
            Ok(())
        })
    }

    async fn update_home_settings(&self, site_id: &str, settings: HomeSettings) -> RepoResult<()> {
        self.mutate(|s| {
            s.site_mut(site_id)?.apply_home_settings(settings);
            Ok(())
        })
    }
}

#[async_trait]
impl CourseRepo for InMemRepo {
    async fn create_course(&self, new: NewCourse) -> RepoResult<Course> {
        self.mutate(|s| {
            let course = new.into_course(Self::next_id(), Utc::now());
            s.courses.push(course.clone());
            Ok(course)
        })
    }

    async fn get_course(&self, id: &str) -> RepoResult<Course> {
        self.read().courses.iter().find(|c| c.id == id).cloned().ok_or(RepoError::NotFound("course"))
    }

    async fn list_courses_by_origin(&self, origin: &str) -> RepoResult<Vec<Course>> {
        Ok(self.read().courses.iter().filter(|c| c.origin == origin).cloned().collect())
    }

    async fn update_course_settings(&self, id: &str, settings: CourseSettings) -> RepoResult<()> {
        self.mutate(|s| {
            s.course_mut(id)?.apply_settings(settings, Utc::now());
            Ok(())
        })
    }

    async fn delete_course(&self, id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let before = s.courses.len();
            s.courses.retain(|c| c.id != id);
            if s.courses.len() == before { Err(RepoError::NotFound("course")) } else { Ok(()) }
        })
    }

    async fn add_section(&self, course_id: &str, title: &str) -> RepoResult<Section> {
        self.mutate(|s| {
            Ok(s.course_mut(course_id)?.push_section(title))
        })
    }

    async fn rename_section(&self, course_id: &str, section_id: &str, title: &str) -> RepoResult<()> {
        self.mutate(|s| {
            s.section_mut(course_id, section_id)?.title = title.to_string();
            Ok(())
        })
    }

    async fn delete_section(&self, course_id: &str, section_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            if s.course_mut(course_id)?.remove_section(section_id) {
                Ok(())
            } else {
                Err(RepoError::NotFound("section"))
            }
        })
    }

    async fn add_lesson(&self, course_id: &str, section_id: &str, name: &str) -> RepoResult<Lesson> {
        self.mutate(|s| {
            Ok(s.section_mut(course_id, section_id)?.push_lesson(name))
        })
    }

    async fn rename_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str, name: &str) -> RepoResult<()> {
        self.mutate(|s| {
            s.lesson_mut(course_id, section_id, lesson_id)?.name = name.to_string();
            Ok(())
        })
    }

    async fn delete_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            if s.section_mut(course_id, section_id)?.remove_lesson(lesson_id) {
                Ok(())
            } else {
                Err(RepoError::NotFound("lesson"))
            }
        })
    }

    async fn set_lesson_content(
        &self,
        course_id: &str,
        section_id: &str,
        lesson_id: &str,
        content: LessonContent,
    ) -> RepoResult<()> {
        self.mutate(|s| {
            s.lesson_mut(course_id, section_id, lesson_id)?.content = Some(content);
            Ok(())
        })
    }

    async fn clear_lesson_content(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            s.lesson_mut(course_id, section_id, lesson_id)?.content = None;
            Ok(())
        })
    }
}

#[async_trait]
impl ProgressRepo for InMemRepo {
    async fn get_progress(&self, course_id: &str, email: &str) -> RepoResult<Option<CourseProgress>> {
        Ok(self
            .read()
            .progress
            .iter()
            .find(|p| p.course_id == course_id && p.user_email == email)
            .cloned())
    }

    async fn record_completion(
        &self,
        course_id: &str,
        email: &str,
        lesson_id: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> RepoResult<CourseProgress> {
        self.mutate(|s| {
            let idx = match s.progress.iter().position(|p| p.course_id == course_id && p.user_email == email) {
                Some(i) => i,
                None => {
                    s.progress.push(CourseProgress::started(course_id, email, at));
                    s.progress.len() - 1
                }
            };
            let record = &mut s.progress[idx];
            record.set_completed(lesson_id, completed, at);
            Ok(record.clone())
        })
    }

    async fn set_progress_percentage(&self, course_id: &str, email: &str, progress: f64) -> RepoResult<()> {
        self.mutate(|s| {
            let record = s
                .progress
                .iter_mut()
                .find(|p| p.course_id == course_id && p.user_email == email)
                .ok_or(RepoError::NotFound("progress"))?;
            record.progress = progress;
            Ok(())
        })
    }
}

#[async_trait]
impl SubmissionRepo for InMemRepo {
    async fn insert_assignment_submission(&self, new: NewAssignmentSubmission) -> RepoResult<AssignmentSubmission> {
        self.mutate(|s| {
            let sub = new.into_submission(Self::next_id(), Utc::now());
            s.assignment_submissions.push(sub.clone());
            Ok(sub)
        })
    }

    async fn list_assignment_submissions(&self, assignment_id: &str) -> RepoResult<Vec<AssignmentSubmission>> {
        Ok(self
            .read()
            .assignment_submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn find_assignment_submission(&self, assignment_id: &str, email: &str) -> RepoResult<AssignmentSubmission> {
        self.read()
            .assignment_submissions
            .iter()
            .find(|s| s.assignment_id == assignment_id && s.student_email == email)
            .cloned()
            .ok_or(RepoError::NotFound("submission"))
    }

    async fn mark_assignment_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
        score: f64,
        feedback: Option<String>,
    ) -> RepoResult<()> {
        self.mutate(|s| {
            let sub = s
                .assignment_submissions
                .iter_mut()
                .find(|x| x.id == submission_id && x.assignment_id == assignment_id)
                .ok_or(RepoError::NotFound("submission"))?;
            sub.mark(score, feedback, Utc::now());
            Ok(())
        })
    }

    async fn list_student_assignment_submissions(&self, course_id: &str, email: &str) -> RepoResult<Vec<AssignmentSubmission>> {
        Ok(self
            .read()
            .assignment_submissions
            .iter()
            .filter(|s| s.course_id == course_id && s.student_email == email)
            .cloned()
            .collect())
    }

    async fn insert_quiz_submission(&self, new: NewQuizSubmission) -> RepoResult<QuizSubmission> {
        self.mutate(|s| {
            let sub = new.into_submission(Self::next_id(), Utc::now());
            s.quiz_submissions.push(sub.clone());
            Ok(sub)
        })
    }

    async fn find_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<QuizSubmission> {
        self.read()
            .quiz_submissions
            .iter()
            .find(|s| s.quiz_id == quiz_id && s.user_id == user_id)
            .cloned()
            .ok_or(RepoError::NotFound("quiz submission"))
    }

    async fn delete_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let idx = s
                .quiz_submissions
                .iter()
                .position(|x| x.quiz_id == quiz_id && x.user_id == user_id)
                .ok_or(RepoError::NotFound("quiz submission"))?;
            s.quiz_submissions.remove(idx);
            Ok(())
        })
    }

    async fn list_student_quiz_submissions(&self, course_id: &str, user_id: &str) -> RepoResult<Vec<QuizSubmission>> {
        Ok(self
            .read()
            .quiz_submissions
            .iter()
            .filter(|s| s.course_id == course_id && s.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ForumRepo for InMemRepo {
    async fn list_topics(&self) -> RepoResult<Vec<ForumTopic>> {
        Ok(self.read().topics.clone())
    }

    async fn create_topic(&self, new: NewForumTopic, author: &str) -> RepoResult<ForumTopic> {
        self.mutate(|s| {
            let topic = new.into_topic(Self::next_id(), author, Utc::now());
            s.topics.push(topic.clone());
            Ok(topic)
        })
    }

    async fn get_topic(&self, id: &str) -> RepoResult<ForumTopic> {
        self.read().topics.iter().find(|t| t.id == id).cloned().ok_or(RepoError::NotFound("topic"))
    }

    async fn view_topic(&self, id: &str) -> RepoResult<ForumTopic> {
        self.mutate(|s| {
            let topic = s.topic_mut(id)?;
            topic.views += 1;
            Ok(topic.clone())
        })
    }

    async fn delete_topic(&self, id: &str) -> RepoResult<u64> {
        self.mutate(|s| {
            let idx = s.topics.iter().position(|t| t.id == id).ok_or(RepoError::NotFound("topic"))?;
            let before = s.replies.len();
            s.replies.retain(|r| r.topic_id != id);
            let removed = (before - s.replies.len()) as u64;
            s.topics.remove(idx);
            Ok(removed)
        })
    }

    async fn list_replies(&self, topic_id: &str) -> RepoResult<Vec<ForumReply>> {
        Ok(self.read().replies.iter().filter(|r| r.topic_id == topic_id).cloned().collect())
    }

    async fn get_reply(&self, id: &str) -> RepoResult<ForumReply> {
        self.read().replies.iter().find(|r| r.id == id).cloned().ok_or(RepoError::NotFound("reply"))
    }

    async fn create_reply(&self, new: NewForumReply, author: &str) -> RepoResult<ForumReply> {
        self.mutate(|s| {
            s.topic_mut(&new.topic_id)?.replies += 1;
            let reply = new.into_reply(Self::next_id(), author, Utc::now());
            s.replies.push(reply.clone());
            Ok(reply)
        })
    }

    async fn delete_reply(&self, id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let idx = s.replies.iter().position(|r| r.id == id).ok_or(RepoError::NotFound("reply"))?;
            let reply = s.replies.remove(idx);
            if let Ok(topic) = s.topic_mut(&reply.topic_id) {
                topic.replies = (topic.replies - 1).max(0);
            }
            Ok(())
        })
    }
}

#[async_trait]
impl BlogRepo for InMemRepo {
    async fn list_blogs(&self, query: &BlogQuery) -> RepoResult<BlogPage> {
        let s = self.read();
        let mut matching: Vec<&Blog> = s.blogs.iter().filter(|b| query.matches(b)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let blogs = matching
            .into_iter()
            .skip(query.skip() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();
        let mut categories: Vec<String> = Vec::new();
        for b in &s.blogs {
            if !categories.contains(&b.category) {
                categories.push(b.category.clone());
            }
        }
        Ok(BlogPage { blogs, total, categories })
    }

    async fn get_blog(&self, id: &str) -> RepoResult<Blog> {
        self.read().blogs.iter().find(|b| b.id == id).cloned().ok_or(RepoError::NotFound("blog"))
    }

    async fn view_blog(&self, id: &str) -> RepoResult<Blog> {
        self.mutate(|s| {
            let blog = s.blog_mut(id)?;
            blog.views += 1;
            Ok(blog.clone())
        })
    }

    async fn related_blogs(&self, category: &str, exclude_id: &str, limit: usize) -> RepoResult<Vec<Blog>> {
        Ok(self
            .read()
            .blogs
            .iter()
            .filter(|b| b.category == category && b.id != exclude_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_blog(&self, new: NewBlog) -> RepoResult<Blog> {
        self.mutate(|s| {
            let blog = new.into_blog(Self::next_id(), Utc::now());
            s.blogs.push(blog.clone());
            Ok(blog)
        })
    }

    async fn update_blog(&self, id: &str, upd: BlogUpdate) -> RepoResult<Blog> {
        self.mutate(|s| {
            let blog = s.blog_mut(id)?;
            upd.apply(blog, Utc::now());
            Ok(blog.clone())
        })
    }

    async fn delete_blog(&self, id: &str) -> RepoResult<()> {
        self.mutate(|s| {
            let before = s.blogs.len();
            s.blogs.retain(|b| b.id != id);
            if s.blogs.len() == before { Err(RepoError::NotFound("blog")) } else { Ok(()) }
        })
    }

    async fn toggle_like(&self, id: &str, email: &str) -> RepoResult<LikeOutcome> {
        self.mutate(|s| {
            Ok(s.blog_mut(id)?.toggle_like(email))
        })
    }
}
