//! Postgres backend. Each aggregate lives in one JSONB `doc` column; nested
//! mutations lock the owning row (`FOR UPDATE`), apply the change in memory and
//! write the document back inside the same transaction.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use super::*;

const USERS: &str = "users";
const SITES: &str = "sites";
const COURSES: &str = "courses";
const PROGRESS: &str = "course_progress";
const ASSIGNMENTS: &str = "assignment_submissions";
const QUIZZES: &str = "quiz_submissions";
const TOPICS: &str = "forum_topics";
const REPLIES: &str = "forum_replies";
const BLOGS: &str = "blogs";

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Internal(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn progress_key(course_id: &str, email: &str) -> String {
    format!("{course_id}/{email}")
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct PgRepo {
    pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url` and apply pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RepoError::Internal(e.to_string()))?;
        log::info!("postgres migrations applied");
        Ok(Self::new(pool))
    }

    async fn find_one<T>(&self, table: &str, filter: &str, binds: &[&str]) -> RepoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        let sql = format!("SELECT doc FROM {table} WHERE {filter} LIMIT 1");
        let mut q = sqlx::query_as::<_, (Json<T>,)>(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let row = q.fetch_optional(&self.pool).await.map_err(db_err)?;
        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn find_many<T>(&self, table: &str, filter: &str, binds: &[&str], tail: &str) -> RepoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        let sql = format!("SELECT doc FROM {table} WHERE {filter} {tail}");
        let mut q = sqlx::query_as::<_, (Json<T>,)>(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn insert<T>(&self, table: &str, id: &str, doc: &T) -> Result<(), sqlx::Error>
    where
        T: Serialize + Sync,
    {
        let sql = format!("INSERT INTO {table} (id, doc) VALUES ($1, $2)");
        sqlx::query(&sql).bind(id).bind(Json(doc)).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert unless a row with the same id or unique key exists; true when inserted.
    async fn insert_if_absent<T>(&self, table: &str, id: &str, doc: &T) -> RepoResult<bool>
    where
        T: Serialize + Sync,
    {
        let sql = format!("INSERT INTO {table} (id, doc) VALUES ($1, $2) ON CONFLICT DO NOTHING");
        let done = sqlx::query(&sql)
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn delete_where(&self, table: &str, filter: &str, binds: &[&str]) -> RepoResult<u64> {
        let sql = format!("DELETE FROM {table} WHERE {filter}");
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let done = q.execute(&self.pool).await.map_err(db_err)?;
        Ok(done.rows_affected())
    }

    /// Lock the first row matching `filter`, run `f` on its document and write
    /// it back. An `Err` from `f` rolls the transaction back untouched.
    async fn update_one<T, R, F>(
        &self,
        table: &str,
        filter: &str,
        binds: &[&str],
        missing: &'static str,
        f: F,
    ) -> RepoResult<R>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static,
        R: Send,
        F: FnOnce(&mut T) -> RepoResult<R> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sql = format!("SELECT id, doc FROM {table} WHERE {filter} LIMIT 1 FOR UPDATE");
        let mut q = sqlx::query_as::<_, (String, Json<T>)>(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let Some((id, Json(mut doc))) = q.fetch_optional(&mut *tx).await.map_err(db_err)? else {
            return Err(RepoError::NotFound(missing));
        };
        let out = f(&mut doc)?;
        let sql = format!("UPDATE {table} SET doc = $2 WHERE id = $1");
        sqlx::query(&sql)
            .bind(&id)
            .bind(Json(&doc))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(out)
    }

    async fn update_course<R, F>(&self, course_id: &str, f: F) -> RepoResult<R>
    where
        R: Send,
        F: FnOnce(&mut Course) -> RepoResult<R> + Send,
    {
        self.update_one(COURSES, "id = $1", &[course_id], "course", f).await
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.find_many(USERS, "TRUE", &[], "ORDER BY created_at").await
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        self.find_one(USERS, "doc->>'email' = $1", &[email])
            .await?
            .ok_or(RepoError::NotFound("user"))
    }

    async fn insert_user_if_absent(&self, new: NewUser) -> RepoResult<Option<User>> {
        let user = new.into_user(new_id());
        let inserted = self.insert_if_absent(USERS, &user.id, &user).await?;
        Ok(inserted.then_some(user))
    }

    async fn set_profile_pic(&self, email: &str, pic: Blob) -> RepoResult<()> {
        self.update_one(USERS, "doc->>'email' = $1", &[email], "user", |u: &mut User| {
            u.profile_pic = Some(pic);
            Ok(())
        })
        .await
    }

    async fn set_profile_type(&self, email: &str, profile_type: &str) -> RepoResult<()> {
        self.update_one(USERS, "doc->>'email' = $1", &[email], "user", |u: &mut User| {
            u.profile_type = Some(profile_type.to_string());
            Ok(())
        })
        .await
    }

    async fn upsert_profile(&self, email: &str, fields: Map<String, Value>) -> RepoResult<()> {
        let blank = NewUser { email: email.to_string(), profile: Map::new() }.into_user(new_id());
        self.insert_if_absent(USERS, &blank.id, &blank).await?;
        let fields = sanitize_profile(fields);
        self.update_one(USERS, "doc->>'email' = $1", &[email], "user", |u: &mut User| {
            u.profile.extend(fields);
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, id: &str) -> RepoResult<()> {
        match self.delete_where(USERS, "id = $1", &[id]).await? {
            0 => Err(RepoError::NotFound("user")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SiteRepo for PgRepo {
    async fn create_site(&self, new: NewSite) -> RepoResult<Site> {
        let site = new.into_site(new_id());
        match self.insert(SITES, &site.id, &site).await {
            Ok(()) => Ok(site),
            Err(e) if is_unique_violation(&e) => Err(RepoError::Conflict(SITE_NAME_TAKEN)),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_site(&self, id: &str) -> RepoResult<Site> {
        self.find_one(SITES, "id = $1", &[id]).await?.ok_or(RepoError::NotFound("site"))
    }

    async fn get_site_by_name(&self, name: &str) -> RepoResult<Site> {
        self.find_one(SITES, "doc->>'siteName' = $1", &[name])
            .await?
            .ok_or(RepoError::NotFound("site"))
    }

    async fn list_sites_created_by(&self, email: &str) -> RepoResult<Vec<Site>> {
        self.find_many(SITES, "doc->>'createdBy' = $1", &[email], "ORDER BY created_at").await
    }

    async fn list_sites_joined_by(&self, email: &str) -> RepoResult<Vec<Site>> {
        self.find_many(SITES, "jsonb_exists(doc->'members', $1)", &[email], "ORDER BY created_at")
            .await
    }

    async fn add_member(&self, site_id: &str, email: &str) -> RepoResult<()> {
        self.update_one(SITES, "id = $1", &[site_id], "site", |s: &mut Site| {
            if s.add_member(email) {
                Ok(())
            } else {
                Err(RepoError::Conflict(ALREADY_MEMBER))
            }
        })
        .await
    }

    async fn set_announcements(&self, site_id: &str, announcements: Vec<Announcement>) -> RepoResult<()> {
        self.update_one(SITES, "id = $1", &[site_id], "site", |s: &mut Site| {
            s.announcements = announcements;
            Ok(())
        })
        .await
    }

    async fn update_home_settings(&self, site_id: &str, settings: HomeSettings) -> RepoResult<()> {
        self.update_one(SITES, "id = $1", &[site_id], "site", |s: &mut Site| {
            s.apply_home_settings(settings);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CourseRepo for PgRepo {
    async fn create_course(&self, new: NewCourse) -> RepoResult<Course> {
        let course = new.into_course(new_id(), Utc::now());
        self.insert(COURSES, &course.id, &course).await.map_err(db_err)?;
        Ok(course)
    }

    async fn get_course(&self, id: &str) -> RepoResult<Course> {
        self.find_one(COURSES, "id = $1", &[id]).await?.ok_or(RepoError::NotFound("course"))
    }

    async fn list_courses_by_origin(&self, origin: &str) -> RepoResult<Vec<Course>> {
        self.find_many(COURSES, "doc->>'origin' = $1", &[origin], "ORDER BY created_at").await
    }

    async fn update_course_settings(&self, id: &str, settings: CourseSettings) -> RepoResult<()> {
        self.update_course(id, |c| {
            c.apply_settings(settings, Utc::now());
            Ok(())
        })
        .await
    }

    async fn delete_course(&self, id: &str) -> RepoResult<()> {
        match self.delete_where(COURSES, "id = $1", &[id]).await? {
            0 => Err(RepoError::NotFound("course")),
            _ => Ok(()),
        }
    }

    async fn add_section(&self, course_id: &str, title: &str) -> RepoResult<Section> {
        self.update_course(course_id, |c| Ok(c.push_section(title))).await
    }

    async fn rename_section(&self, course_id: &str, section_id: &str, title: &str) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            section.title = title.to_string();
            Ok(())
        })
        .await
    }

    async fn delete_section(&self, course_id: &str, section_id: &str) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            if c.remove_section(section_id) {
                Ok(())
            } else {
                Err(RepoError::NotFound("section"))
            }
        })
        .await
    }

    async fn add_lesson(&self, course_id: &str, section_id: &str, name: &str) -> RepoResult<Lesson> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            Ok(section.push_lesson(name))
        })
        .await
    }

    async fn rename_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str, name: &str) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            let lesson = section.lesson_mut(lesson_id).ok_or(RepoError::NotFound("lesson"))?;
            lesson.name = name.to_string();
            Ok(())
        })
        .await
    }

    async fn delete_lesson(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            if section.remove_lesson(lesson_id) {
                Ok(())
            } else {
                Err(RepoError::NotFound("lesson"))
            }
        })
        .await
    }

    async fn set_lesson_content(
        &self,
        course_id: &str,
        section_id: &str,
        lesson_id: &str,
        content: LessonContent,
    ) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            let lesson = section.lesson_mut(lesson_id).ok_or(RepoError::NotFound("lesson"))?;
            lesson.content = Some(content);
            Ok(())
        })
        .await
    }

    async fn clear_lesson_content(&self, course_id: &str, section_id: &str, lesson_id: &str) -> RepoResult<()> {
        self.update_course(course_id, |c| {
            let section = c.section_mut(section_id).ok_or(RepoError::NotFound("section"))?;
            let lesson = section.lesson_mut(lesson_id).ok_or(RepoError::NotFound("lesson"))?;
            lesson.content = None;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ProgressRepo for PgRepo {
    async fn get_progress(&self, course_id: &str, email: &str) -> RepoResult<Option<CourseProgress>> {
        let key = progress_key(course_id, email);
        self.find_one(PROGRESS, "id = $1", &[key.as_str()]).await
    }

    async fn record_completion(
        &self,
        course_id: &str,
        email: &str,
        lesson_id: &str,
        completed: bool,
        at: DateTime<Utc>,
    ) -> RepoResult<CourseProgress> {
        let key = progress_key(course_id, email);
        self.insert_if_absent(PROGRESS, &key, &CourseProgress::started(course_id, email, at))
            .await?;
        self.update_one(PROGRESS, "id = $1", &[key.as_str()], "progress", |p: &mut CourseProgress| {
            p.set_completed(lesson_id, completed, at);
            Ok(p.clone())
        })
        .await
    }

    async fn set_progress_percentage(&self, course_id: &str, email: &str, progress: f64) -> RepoResult<()> {
        let key = progress_key(course_id, email);
        self.update_one(PROGRESS, "id = $1", &[key.as_str()], "progress", |p: &mut CourseProgress| {
            p.progress = progress;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SubmissionRepo for PgRepo {
    async fn insert_assignment_submission(&self, new: NewAssignmentSubmission) -> RepoResult<AssignmentSubmission> {
        let sub = new.into_submission(new_id(), Utc::now());
        self.insert(ASSIGNMENTS, &sub.id, &sub).await.map_err(db_err)?;
        Ok(sub)
    }

    async fn list_assignment_submissions(&self, assignment_id: &str) -> RepoResult<Vec<AssignmentSubmission>> {
        self.find_many(ASSIGNMENTS, "doc->>'assignmentId' = $1", &[assignment_id], "ORDER BY created_at")
            .await
    }

    async fn find_assignment_submission(&self, assignment_id: &str, email: &str) -> RepoResult<AssignmentSubmission> {
        self.find_one(
            ASSIGNMENTS,
            "doc->>'assignmentId' = $1 AND doc->>'studentEmail' = $2",
            &[assignment_id, email],
        )
        .await?
        .ok_or(RepoError::NotFound("submission"))
    }

    async fn mark_assignment_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
        score: f64,
        feedback: Option<String>,
    ) -> RepoResult<()> {
        self.update_one(
            ASSIGNMENTS,
            "id = $1 AND doc->>'assignmentId' = $2",
            &[submission_id, assignment_id],
            "submission",
            |s: &mut AssignmentSubmission| {
                s.mark(score, feedback, Utc::now());
                Ok(())
            },
        )
        .await
    }

    async fn list_student_assignment_submissions(&self, course_id: &str, email: &str) -> RepoResult<Vec<AssignmentSubmission>> {
        self.find_many(
            ASSIGNMENTS,
            "doc->>'courseId' = $1 AND doc->>'studentEmail' = $2",
            &[course_id, email],
            "ORDER BY created_at",
        )
        .await
    }

    async fn insert_quiz_submission(&self, new: NewQuizSubmission) -> RepoResult<QuizSubmission> {
        let sub = new.into_submission(new_id(), Utc::now());
        self.insert(QUIZZES, &sub.id, &sub).await.map_err(db_err)?;
        Ok(sub)
    }

    async fn find_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<QuizSubmission> {
        self.find_one(QUIZZES, "doc->>'quizId' = $1 AND doc->>'userId' = $2", &[quiz_id, user_id])
            .await?
            .ok_or(RepoError::NotFound("quiz submission"))
    }

    async fn delete_quiz_submission(&self, quiz_id: &str, user_id: &str) -> RepoResult<()> {
        match self
            .delete_where(QUIZZES, "doc->>'quizId' = $1 AND doc->>'userId' = $2", &[quiz_id, user_id])
            .await?
        {
            0 => Err(RepoError::NotFound("quiz submission")),
            _ => Ok(()),
        }
    }

    async fn list_student_quiz_submissions(&self, course_id: &str, user_id: &str) -> RepoResult<Vec<QuizSubmission>> {
        self.find_many(
            QUIZZES,
            "doc->>'courseId' = $1 AND doc->>'userId' = $2",
            &[course_id, user_id],
            "ORDER BY created_at",
        )
        .await
    }
}

#[async_trait]
impl ForumRepo for PgRepo {
    async fn list_topics(&self) -> RepoResult<Vec<ForumTopic>> {
        self.find_many(TOPICS, "TRUE", &[], "ORDER BY created_at DESC").await
    }

    async fn create_topic(&self, new: NewForumTopic, author: &str) -> RepoResult<ForumTopic> {
        let topic = new.into_topic(new_id(), author, Utc::now());
        self.insert(TOPICS, &topic.id, &topic).await.map_err(db_err)?;
        Ok(topic)
    }

    async fn get_topic(&self, id: &str) -> RepoResult<ForumTopic> {
        self.find_one(TOPICS, "id = $1", &[id]).await?.ok_or(RepoError::NotFound("topic"))
    }

    async fn view_topic(&self, id: &str) -> RepoResult<ForumTopic> {
        self.update_one(TOPICS, "id = $1", &[id], "topic", |t: &mut ForumTopic| {
            t.views += 1;
            Ok(t.clone())
        })
        .await
    }

    async fn delete_topic(&self, id: &str) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let replies = sqlx::query("DELETE FROM forum_replies WHERE doc->>'topicId' = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        let topics = sqlx::query("DELETE FROM forum_topics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        if topics == 0 {
            return Err(RepoError::NotFound("topic"));
        }
        tx.commit().await.map_err(db_err)?;
        Ok(replies)
    }

    async fn list_replies(&self, topic_id: &str) -> RepoResult<Vec<ForumReply>> {
        self.find_many(REPLIES, "doc->>'topicId' = $1", &[topic_id], "ORDER BY created_at").await
    }

    async fn get_reply(&self, id: &str) -> RepoResult<ForumReply> {
        self.find_one(REPLIES, "id = $1", &[id]).await?.ok_or(RepoError::NotFound("reply"))
    }

    async fn create_reply(&self, new: NewForumReply, author: &str) -> RepoResult<ForumReply> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let bumped = sqlx::query(
            "UPDATE forum_topics SET doc = jsonb_set(doc, '{replies}', to_jsonb(COALESCE((doc->>'replies')::bigint, 0) + 1)) WHERE id = $1",
        )
        .bind(&new.topic_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        if bumped == 0 {
            return Err(RepoError::NotFound("topic"));
        }
        let reply = new.into_reply(new_id(), author, Utc::now());
        sqlx::query("INSERT INTO forum_replies (id, doc) VALUES ($1, $2)")
            .bind(&reply.id)
            .bind(Json(&reply))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(reply)
    }

    async fn delete_reply(&self, id: &str) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = sqlx::query_as::<_, (Json<ForumReply>,)>("DELETE FROM forum_replies WHERE id = $1 RETURNING doc")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some((Json(reply),)) = removed else {
            return Err(RepoError::NotFound("reply"));
        };
        sqlx::query(
            "UPDATE forum_topics SET doc = jsonb_set(doc, '{replies}', to_jsonb(GREATEST(COALESCE((doc->>'replies')::bigint, 0) - 1, 0))) WHERE id = $1",
        )
        .bind(&reply.topic_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl BlogRepo for PgRepo {
    async fn list_blogs(&self, query: &BlogQuery) -> RepoResult<BlogPage> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(cat) = query.category() {
            values.push(cat.to_string());
            clauses.push(format!("doc->>'category' = ${}", values.len()));
        }
        if let Some(needle) = query.search() {
            values.push(format!("%{}%", escape_like(needle)));
            let n = values.len();
            clauses.push(format!("(doc->>'title' ILIKE ${n} OR doc->>'content' ILIKE ${n})"));
        }
        let filter = if clauses.is_empty() { "TRUE".to_string() } else { clauses.join(" AND ") };
        let binds: Vec<&str> = values.iter().map(String::as_str).collect();

        let count_sql = format!("SELECT COUNT(*) FROM blogs WHERE {filter}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &binds {
            count = count.bind(*b);
        }
        let total = count.fetch_one(&self.pool).await.map_err(db_err)?.max(0) as u64;

        let tail = format!("ORDER BY created_at DESC LIMIT {} OFFSET {}", query.limit(), query.skip());
        let blogs = self.find_many(BLOGS, &filter, &binds, &tail).await?;

        let categories: Vec<Option<String>> =
            sqlx::query_scalar("SELECT DISTINCT doc->>'category' FROM blogs")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(BlogPage { blogs, total, categories: categories.into_iter().flatten().collect() })
    }

    async fn get_blog(&self, id: &str) -> RepoResult<Blog> {
        self.find_one(BLOGS, "id = $1", &[id]).await?.ok_or(RepoError::NotFound("blog"))
    }

    async fn view_blog(&self, id: &str) -> RepoResult<Blog> {
        self.update_one(BLOGS, "id = $1", &[id], "blog", |b: &mut Blog| {
            b.views += 1;
            Ok(b.clone())
        })
        .await
    }

    async fn related_blogs(&self, category: &str, exclude_id: &str, limit: usize) -> RepoResult<Vec<Blog>> {
        let tail = format!("ORDER BY created_at DESC LIMIT {limit}");
        self.find_many(BLOGS, "doc->>'category' = $1 AND id <> $2", &[category, exclude_id], &tail)
            .await
    }

    async fn create_blog(&self, new: NewBlog) -> RepoResult<Blog> {
        let blog = new.into_blog(new_id(), Utc::now());
        self.insert(BLOGS, &blog.id, &blog).await.map_err(db_err)?;
        Ok(blog)
    }

    async fn update_blog(&self, id: &str, upd: BlogUpdate) -> RepoResult<Blog> {
        self.update_one(BLOGS, "id = $1", &[id], "blog", |b: &mut Blog| {
            upd.apply(b, Utc::now());
            Ok(b.clone())
        })
        .await
    }

    async fn delete_blog(&self, id: &str) -> RepoResult<()> {
        match self.delete_where(BLOGS, "id = $1", &[id]).await? {
            0 => Err(RepoError::NotFound("blog")),
            _ => Ok(()),
        }
    }

    async fn toggle_like(&self, id: &str, email: &str) -> RepoResult<LikeOutcome> {
        self.update_one(BLOGS, "id = $1", &[id], "blog", |b: &mut Blog| Ok(b.toggle_like(email)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("rust"), "rust");
    }

    #[test]
    fn progress_rows_are_keyed_per_pair() {
        assert_eq!(progress_key("c1", "a@x.io"), "c1/a@x.io");
        assert_ne!(progress_key("c1", "a@x.io"), progress_key("c2", "a@x.io"));
    }
}
