#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use lms::auth::create_jwt;
use lms::rate_limit::{RateLimitConfig, RateLimiterFacade};
use lms::repo::inmem::InMemRepo;
use lms::{config, AppState};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn ensure_secret() {
    std::env::set_var("JWT_SECRET", "testsecret-abcdefghijklmnopqrstuvwxyz012345");
}

fn limited(reply_limit: usize, submission_limit: usize) -> RateLimiterFacade {
    RateLimiterFacade::new(RateLimitConfig {
        enabled: true,
        reply_limit,
        reply_window: Duration::from_secs(300),
        submission_limit,
        submission_window: Duration::from_secs(300),
    })
}

#[actix_web::test]
#[serial]
async fn rate_limit_forum_replies() {
    ensure_secret();
    let state = AppState::new(Arc::new(InMemRepo::new())).with_rate_limiter(limited(1, 100));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;
    let auth = ("Authorization", format!("Bearer {}", create_jwt("poster@example.com", None).unwrap()));

    let req = test::TestRequest::post()
        .uri("/forum-topics")
        .insert_header(auth.clone())
        .set_json(&json!({"title": "Limits", "body": "How many?"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let topic: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let topic_id = topic["_id"].as_str().unwrap();

    let reply = || {
        test::TestRequest::post()
            .uri("/forum-replies")
            .insert_header(auth.clone())
            .set_json(&json!({"topicId": topic_id, "body": "again"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, reply()).await.status(), 201);
    assert_eq!(test::call_service(&app, reply()).await.status(), 429);
}

#[actix_web::test]
#[serial]
async fn rate_limit_quiz_submissions() {
    ensure_secret();
    let state = AppState::new(Arc::new(InMemRepo::new())).with_rate_limiter(limited(100, 2));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let submit = || {
        test::TestRequest::post()
            .uri("/quiz-submissions")
            .set_json(&json!({"userId": "u@example.com", "quizId": "q", "score": 50, "answers": []}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, submit()).await.status(), 201);
    assert_eq!(test::call_service(&app, submit()).await.status(), 201);
    assert_eq!(test::call_service(&app, submit()).await.status(), 429);
}

#[actix_web::test]
#[serial]
async fn disabled_limiter_never_blocks() {
    ensure_secret();
    let cfg = RateLimitConfig { enabled: false, submission_limit: 1, ..RateLimitConfig::default() };
    let state = AppState::new(Arc::new(InMemRepo::new())).with_rate_limiter(RateLimiterFacade::new(cfg));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/quiz-submissions")
            .set_json(&json!({"userId": "u@example.com", "quizId": "q", "score": 50, "answers": []}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }
}
