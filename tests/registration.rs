#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use edulink::repo::inmem::InMemRepo;
use edulink::routes::{config, AppState};
use edulink::security::SecurityHeaders;
use edulink::storage::FsFileStore;
use serial_test::serial;
use std::sync::Arc;

fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("EDULINK_DATA_DIR", tmp.path().to_str().unwrap());
}

fn state() -> AppState {
    AppState {
        repo: Arc::new(InMemRepo::new()),
        file_store: Arc::new(FsFileStore::new()),
        rate_limiter: None,
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(SecurityHeaders::from_env())
                .app_data(actix_web::web::Data::new($state))
                .configure(config),
        )
        .await
    };
}

#[actix_web::test]
#[serial]
async fn student_without_grade_is_rejected() {
    setup_env();
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Ann",
            "email": "ann@x.com",
            "role": "student"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
#[serial]
async fn student_with_grade_is_created() {
    setup_env();
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Ann",
            "email": "ann@x.com",
            "role": "student",
            "grade": "6"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(user["role"], "student");
    assert_eq!(user["grade"], "6");
    assert_eq!(user["points"], 0);
    assert!(user["subject"].is_null());
    assert!(user["student_email"].is_null());
}

#[actix_web::test]
#[serial]
async fn duplicate_email_returns_stored_profile() {
    setup_env();
    let app = app!(state());

    let payload = serde_json::json!({
        "display_name": "Ann",
        "email": "ann@x.com",
        "role": "student",
        "grade": "7"
    });
    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let first: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();

    // same email again, even with different details, yields the stored profile
    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Someone Else",
            "email": "ANN@X.COM",
            "role": "student",
            "grade": "9"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let second: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["display_name"], "Ann");
    assert_eq!(second["grade"], "7");
}

#[actix_web::test]
#[serial]
async fn teacher_requires_subject() {
    setup_env();
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Mr. K",
            "email": "k@school.org",
            "role": "teacher"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Mr. K",
            "email": "k@school.org",
            "role": "teacher",
            "subject": "Physics"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(user["subject"], "Physics");
    assert!(user["grade"].is_null());
}

#[actix_web::test]
#[serial]
async fn parent_requires_student_email() {
    setup_env();
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent",
            "student_email": "Kid@X.com"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(user["student_email"], "kid@x.com"); // normalized
}

#[actix_web::test]
#[serial]
async fn out_of_range_grade_is_rejected() {
    setup_env();
    let app = app!(state());

    for grade in ["5", "13", "abc", ""] {
        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .set_json(&serde_json::json!({
                "display_name": "Ann",
                "email": "ann@x.com",
                "role": "student",
                "grade": grade
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "grade {grade:?} should be rejected");
    }
}

#[actix_web::test]
#[serial]
async fn omitted_role_defaults_to_student() {
    setup_env();
    let app = app!(state());

    let req = test::TestRequest::post()
        .uri("/api/v1/users")
        .set_json(&serde_json::json!({
            "display_name": "NoRole",
            "email": "norole@x.com",
            "grade": "8"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(user["role"], "student");
}
