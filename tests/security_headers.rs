#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use lms::repo::inmem::InMemRepo;
use lms::{config, AppState, SecurityHeaders};
use std::sync::Arc;

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(Arc::new(InMemRepo::new())))
}

#[actix_web::test]
async fn test_security_headers_present() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::new(false)).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/blogs").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("media-src 'self' data: blob:"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
async fn test_hsts_enabled() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::new(true)).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(resp.headers().get("strict-transport-security").is_some(), "HSTS header missing");
}

#[actix_web::test]
async fn headers_are_added_to_error_responses() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::default()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/course/does-not-exist").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().get("content-security-policy").is_some());
}

#[actix_web::test]
async fn custom_policy_replaces_default() {
    let sec = SecurityHeaders::default().with_csp("default-src 'none'");
    let app = test::init_service(App::new().wrap(sec).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("content-security-policy").unwrap(), "default-src 'none'");
}
