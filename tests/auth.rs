use actix_web::{dev::Payload, test::TestRequest, FromRequest};
use lms::auth::{create_jwt, Auth, Claims};
use serial_test::serial;
use std::env;

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

#[actix_web::test]
#[serial]
async fn jwt_roundtrip_ok() {
    set_secret();
    let token = create_jwt("learner@example.com", Some("Learner")).expect("token");
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.email(), "learner@example.com");
    assert_eq!(auth.0.display_name(), "Learner");
}

#[actix_web::test]
#[serial]
async fn token_expires_within_the_hour() {
    set_secret();
    let token = create_jwt("a@b.io", None).unwrap();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();
    let auth = Auth::from_request(&req, &mut Payload::None).await.unwrap();
    let now = chrono::Utc::now().timestamp() as usize;
    assert!(auth.0.exp > now);
    assert!(auth.0.exp <= now + 3600 + 5);
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_invalid_token() {
    set_secret();
    let req = TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_missing_header() {
    set_secret();
    let req = TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
#[serial]
async fn token_signed_with_other_secret_is_rejected() {
    env::set_var("JWT_SECRET", "another-secret-that-is-32-bytes-long");
    let token = create_jwt("a@b.io", None).unwrap();
    set_secret();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();
    assert!(Auth::from_request(&req, &mut Payload::None).await.is_err());
}

#[test]
fn display_name_falls_back_to_local_part() {
    let claims = Claims { email: "jane.doe@example.com".into(), name: None, exp: usize::MAX };
    assert_eq!(claims.display_name(), "jane.doe");
    let claims = Claims { email: "x@y.z".into(), name: Some(String::new()), exp: usize::MAX };
    assert_eq!(claims.display_name(), "x");
}
