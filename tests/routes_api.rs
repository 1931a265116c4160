#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use base64::Engine as _;
use lms::auth::create_jwt;
use lms::repo::inmem::InMemRepo;
use lms::repo::SubmissionRepo;
use lms::{config, AppState, SecurityHeaders};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;

const BOUNDARY: &str = "----lms-test-boundary";

// Helper to ensure JWT secret present
fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn token(email: &str) -> String {
    create_jwt(email, None).unwrap()
}

fn bearer(email: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(email)))
}

/// Hand-rolled multipart body: text fields first, then `(field, filename, mime, bytes)` parts.
fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, filename, mime, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

macro_rules! app {
    ($repo:expr) => {
        test::init_service(
            App::new()
                .wrap(SecurityHeaders::default())
                .app_data(web::Data::new(AppState::new(Arc::new($repo))))
                .configure(config),
        )
        .await
    };
}

async fn json_body(resp: actix_web::dev::ServiceResponse) -> Value {
    serde_json::from_slice(&test::read_body(resp).await).unwrap()
}

#[actix_web::test]
#[serial]
async fn course_section_lesson_video_flow() {
    setup_env();
    let app = app!(InMemRepo::new());

    let (ct, body) = multipart(
        &[("courseName", "Rust 101"), ("origin", "site-1"), ("courseTags", "rust, systems")],
        &[("thumbnail", "thumb.png", "image/png", &[0x89u8, 0x50, 0x4e, 0x47][..])],
    );
    let req = test::TestRequest::post()
        .uri("/courses")
        .insert_header(bearer("instructor@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let course_id = json_body(resp).await["insertedId"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/course/{course_id}/section"))
        .set_json(&json!({"title": "Intro"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let section_id = json_body(resp).await["sectionId"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/course/{course_id}/section/{section_id}/lesson"))
        .set_json(&json!({"lessonName": "Welcome"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let lesson_id = json_body(resp).await["lessonId"].as_str().unwrap().to_string();

    let clip: &[u8] = &[0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2'];
    let (ct, body) = multipart(&[("title", "Clip")], &[("file", "clip.mp4", "video/mp4", clip)]);
    let req = test::TestRequest::post()
        .uri(&format!("/course/{course_id}/section/{section_id}/lesson/{lesson_id}/video"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri(&format!("/course/{course_id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let course = json_body(resp).await;
    assert_eq!(course["courseTags"], json!(["rust", "systems"]));
    let lesson = &course["sections"][0]["lessons"][0];
    assert_eq!(course["sections"][0]["title"], "Intro");
    assert_eq!(lesson["name"], "Welcome");
    assert_eq!(lesson["content"]["type"], "video");
    assert_eq!(lesson["content"]["mimetype"], "video/mp4");
    let encoded = base64::engine::general_purpose::STANDARD.encode(clip);
    assert_eq!(lesson["content"]["data"], encoded.as_str());

    // content replaced wholesale by an article, then cleared
    let req = test::TestRequest::post()
        .uri(&format!("/course/{course_id}/section/{section_id}/lesson/{lesson_id}/article"))
        .set_json(&json!({"title": "Notes", "content": "<p>hi</p>"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri(&format!("/course/{course_id}")).to_request();
    let course = json_body(test::call_service(&app, req).await).await;
    let content = &course["sections"][0]["lessons"][0]["content"];
    assert_eq!(content["type"], "article");
    assert!(content.get("data").is_none());

    let req = test::TestRequest::delete()
        .uri(&format!("/course/{course_id}/section/{section_id}/lesson/{lesson_id}/content"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri(&format!("/course/{course_id}")).to_request();
    let course = json_body(test::call_service(&app, req).await).await;
    assert!(course["sections"][0]["lessons"][0].get("content").is_none());
}

#[actix_web::test]
#[serial]
async fn course_creation_requires_thumbnail_and_token() {
    setup_env();
    let app = app!(InMemRepo::new());

    let (ct, body) = multipart(&[("courseName", "No thumb")], &[]);
    let req = test::TestRequest::post()
        .uri("/courses")
        .insert_header(("content-type", ct.clone()))
        .set_payload(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/courses")
        .insert_header(bearer("t@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["error"], "Thumbnail is required");
}

#[actix_web::test]
#[serial]
async fn unknown_ids_in_course_tree_are_404() {
    setup_env();
    let app = app!(InMemRepo::new());
    let req = test::TestRequest::post()
        .uri("/course/missing/section")
        .set_json(&json!({"title": "Intro"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri("/course/missing/section/s/lesson/l/quiz")
        .set_json(&json!({"title": "Q", "questions": [{"q": "?"}]}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn joining_twice_is_rejected() {
    setup_env();
    let app = app!(InMemRepo::new());

    let req = test::TestRequest::post()
        .uri("/sites")
        .set_json(&json!({"createdBy": "owner@example.com", "siteName": "rustaceans", "password": "secret"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/sites/join")
        .insert_header(bearer("member@example.com"))
        .set_json(&json!({"siteName": "rustaceans", "password": "wrong"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let join = || {
        test::TestRequest::post()
            .uri("/sites/join")
            .insert_header(bearer("member@example.com"))
            .set_json(&json!({"siteName": "rustaceans", "password": "secret"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, join()).await.status(), 200);
    let resp = test::call_service(&app, join()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["error"], "You are already a member of this site");

    let req = test::TestRequest::get()
        .uri("/sites/rustaceans/is-member?email=member@example.com")
        .to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await["isMember"], true);

    let req = test::TestRequest::get()
        .uri("/sites/by-name/rustaceans")
        .insert_header(bearer("member@example.com"))
        .to_request();
    let site = json_body(test::call_service(&app, req).await).await;
    assert_eq!(site["members"], json!(["member@example.com"]));
    assert!(site.get("password").is_none());
}

#[actix_web::test]
#[serial]
async fn announcements_are_owner_only_and_bounds_checked() {
    setup_env();
    let app = app!(InMemRepo::new());

    let req = test::TestRequest::post()
        .uri("/sites")
        .set_json(&json!({"createdBy": "owner@example.com", "siteName": "news-site", "password": "pw"}))
        .to_request();
    let site_id = json_body(test::call_service(&app, req).await).await["insertedId"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/sites/{site_id}/announcements");

    let put = |who: &str, body: Value| {
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(who))
            .set_json(&body)
            .to_request()
    };
    let three = json!({"announcements": [
        {"title": "a", "content": "first"},
        {"title": "b", "content": "second"},
        {"title": "c", "content": "third"}
    ]});

    let resp = test::call_service(&app, put("owner@example.com", json!({"announcements": [{"title": "", "content": "x"}]}))).await;
    assert_eq!(resp.status(), 400);
    let resp = test::call_service(&app, put("intruder@example.com", three.clone())).await;
    assert_eq!(resp.status(), 403);
    let resp = test::call_service(&app, put("owner@example.com", three)).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["count"], 3);

    let delete = |who: &str, index: &str| {
        test::TestRequest::delete()
            .uri(&format!("/sites/{site_id}/announcements/{index}"))
            .insert_header(bearer(who))
            .to_request()
    };
    let resp = test::call_service(&app, delete("owner@example.com", "1")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["remainingCount"], 2);

    // bounds follow the current length, which is now 2
    let resp = test::call_service(&app, delete("owner@example.com", "2")).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["error"], "Invalid announcement index");
    let resp = test::call_service(&app, delete("owner@example.com", "first")).await;
    assert_eq!(resp.status(), 400);
    let resp = test::call_service(&app, delete("intruder@example.com", "0")).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri("/sites/by-name/news-site")
        .insert_header(bearer("owner@example.com"))
        .to_request();
    let site = json_body(test::call_service(&app, req).await).await;
    assert_eq!(
        site["announcements"],
        json!([{"title": "a", "content": "first"}, {"title": "c", "content": "third"}])
    );
}

#[actix_web::test]
#[serial]
async fn progress_toggle_is_idempotent() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(repo.clone());

    let (ct, body) = multipart(&[("courseName", "C")], &[("thumbnail", "t.png", "image/png", &[1u8, 2, 3][..])]);
    let req = test::TestRequest::post()
        .uri("/courses")
        .insert_header(bearer("t@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let course_id = json_body(test::call_service(&app, req).await).await["insertedId"]
        .as_str()
        .unwrap()
        .to_string();
    let req = test::TestRequest::post()
        .uri(&format!("/course/{course_id}/section"))
        .set_json(&json!({"title": "S"}))
        .to_request();
    let section_id = json_body(test::call_service(&app, req).await).await["sectionId"]
        .as_str()
        .unwrap()
        .to_string();
    let mut lessons = Vec::new();
    for name in ["one", "two", "three"] {
        let req = test::TestRequest::post()
            .uri(&format!("/course/{course_id}/section/{section_id}/lesson"))
            .set_json(&json!({"lessonName": name}))
            .to_request();
        lessons.push(
            json_body(test::call_service(&app, req).await).await["lessonId"]
                .as_str()
                .unwrap()
                .to_string(),
        );
    }

    let uri = format!("/course-progress/{course_id}/s@example.com");
    let req = test::TestRequest::get().uri(&uri).insert_header(bearer("s@example.com")).to_request();
    let empty = json_body(test::call_service(&app, req).await).await;
    assert_eq!(empty["completedLessons"], json!([]));
    assert_eq!(empty["progress"], 0.0);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer("s@example.com"))
            .set_json(&json!({"lessonId": lessons[0], "completed": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let v = json_body(resp).await;
        assert_eq!(v["success"], true);
        let progress = v["progress"].as_f64().unwrap();
        assert!((progress - 100.0 / 3.0).abs() < 1e-9);
    }

    let req = test::TestRequest::get().uri(&uri).insert_header(bearer("s@example.com")).to_request();
    let record = json_body(test::call_service(&app, req).await).await;
    assert_eq!(record["completedLessons"], json!([lessons[0]]));

    // someone else's record
    let req = test::TestRequest::get().uri(&uri).insert_header(bearer("other@example.com")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // unknown course is 404 and leaves nothing behind
    let req = test::TestRequest::post()
        .uri("/course-progress/nope/s@example.com")
        .insert_header(bearer("s@example.com"))
        .set_json(&json!({"lessonId": "x", "completed": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    use lms::repo::ProgressRepo;
    assert!(repo.get_progress("nope", "s@example.com").await.unwrap().is_none());
}

#[actix_web::test]
#[serial]
async fn liking_twice_restores_count() {
    setup_env();
    let app = app!(InMemRepo::new());

    let (ct, body) = multipart(&[("title", "Hello"), ("content", "First post"), ("category", "news")], &[]);
    let req = test::TestRequest::post()
        .uri("/blogs")
        .insert_header(bearer("writer@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created = json_body(resp).await;
    assert_eq!(created["blog"]["excerpt"], "First post...");
    assert_eq!(created["blog"]["authorName"], "writer");
    let id = created["insertedId"].as_str().unwrap().to_string();

    let like = || {
        test::TestRequest::post()
            .uri(&format!("/blogs/{id}/like"))
            .insert_header(bearer("reader@example.com"))
            .to_request()
    };
    let v = json_body(test::call_service(&app, like()).await).await;
    assert_eq!(v, json!({"success": true, "liked": true, "likes": 1}));
    let v = json_body(test::call_service(&app, like()).await).await;
    assert_eq!(v, json!({"success": true, "liked": false, "likes": 0}));

    let req = test::TestRequest::get().uri(&format!("/blogs/{id}")).to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v["blog"]["likes"], 0);
    assert_eq!(v["blog"]["likedBy"], json!([]));
    assert_eq!(v["blog"]["views"], 1);
    assert_eq!(v["relatedBlogs"], json!([]));

    let req = test::TestRequest::get().uri("/blogs?category=news&page=1&limit=6").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v["pagination"], json!({"total": 1, "totalPages": 1, "currentPage": 1, "limit": 6}));
    assert_eq!(v["categories"], json!(["news"]));

    let req = test::TestRequest::get().uri("/blogs?page=18446744073709551615").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v = json_body(resp).await;
    assert_eq!(v["blogs"], json!([]));
    assert_eq!(v["pagination"]["total"], 1);

    // only the author may delete
    let req = test::TestRequest::delete()
        .uri(&format!("/blogs/{id}"))
        .insert_header(bearer("reader@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
#[serial]
async fn deleting_topic_removes_its_replies() {
    setup_env();
    let app = app!(InMemRepo::new());

    let req = test::TestRequest::post()
        .uri("/forum-topics")
        .insert_header(bearer("author@example.com"))
        .set_json(&json!({"title": "Borrow checker", "body": "Why?"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let topic_id = json_body(resp).await["_id"].as_str().unwrap().to_string();

    for body in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri("/forum-replies")
            .insert_header(bearer("helper@example.com"))
            .set_json(&json!({"topicId": topic_id, "body": body}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let req = test::TestRequest::get().uri(&format!("/forum-topics/{topic_id}")).to_request();
    let topic = json_body(test::call_service(&app, req).await).await;
    assert_eq!(topic["replies"], 2);
    assert_eq!(topic["views"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/forum-topics/{topic_id}"))
        .insert_header(bearer("helper@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::delete()
        .uri(&format!("/forum-topics/{topic_id}"))
        .insert_header(bearer("author@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["deletedReplies"], 2);

    let req = test::TestRequest::get().uri(&format!("/forum-replies/{topic_id}")).to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await, json!([]));

    let req = test::TestRequest::post()
        .uri("/forum-replies")
        .insert_header(bearer("helper@example.com"))
        .set_json(&json!({"topicId": topic_id, "body": "late"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn oversized_assignment_is_rejected_before_storage() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(repo.clone());

    let big = vec![0u8; 11 * 1024 * 1024];
    let (ct, body) = multipart(
        &[("assignmentId", "a1"), ("courseId", "c1")],
        &[("file", "essay.pdf", "application/pdf", &big[..])],
    );
    let req = test::TestRequest::post()
        .uri("/assignments/submit")
        .insert_header(bearer("student@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err = json_body(resp).await["error"].as_str().unwrap().to_string();
    assert!(err.starts_with("File size must be less than 10MB"), "{err}");
    assert!(repo.list_assignment_submissions("a1").await.unwrap().is_empty());

    let (ct, body) = multipart(&[("assignmentId", "a1")], &[("file", "run.exe", "application/octet-stream", &b"MZ"[..])]);
    let req = test::TestRequest::post()
        .uri("/assignments/submit")
        .insert_header(bearer("student@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    assert!(repo.list_assignment_submissions("a1").await.unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn submissions_marking_and_grades() {
    setup_env();
    let app = app!(InMemRepo::new());

    let (ct, body) = multipart(
        &[("assignmentId", "a1"), ("courseId", "c1"), ("sectionId", "s1"), ("lessonId", "l1")],
        &[("file", "essay.PDF", "application/pdf", &b"%PDF-1.4"[..])],
    );
    let req = test::TestRequest::post()
        .uri("/assignments/submit")
        .insert_header(bearer("student@example.com"))
        .insert_header(("content-type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let submission_id = json_body(resp).await["submissionId"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri("/assignments/a1/submission/student@example.com").to_request();
    let sub = json_body(test::call_service(&app, req).await).await;
    assert_eq!(sub["fileType"], ".pdf");
    assert!(sub.get("fileData").is_none());

    let mark = |score: f64| {
        test::TestRequest::post()
            .uri(&format!("/assignments/a1/submissions/{submission_id}/mark"))
            .insert_header(bearer("instructor@example.com"))
            .set_json(&json!({"score": score, "feedback": "ok"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, mark(101.0)).await.status(), 400);
    assert_eq!(test::call_service(&app, mark(80.0)).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/quiz-submissions")
        .set_json(&json!({
            "courseId": "c1", "sectionId": "s1", "lessonId": "l2",
            "userId": "student@example.com", "quizId": "q1",
            "score": 90, "answers": [1, 2], "totalQuestions": 2, "correctAnswers": 2
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::post()
        .uri("/quiz-submissions")
        .set_json(&json!({"userId": "student@example.com", "quizId": "q2", "answers": []}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri("/grades/c1?email=student@example.com").to_request();
    let grades = json_body(test::call_service(&app, req).await).await;
    assert_eq!(grades["overallGrade"], "85.0%");
    assert_eq!(grades["assignments"][0]["maxScore"], 100.0);

    let req = test::TestRequest::get().uri("/grades/c1").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}
