#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use edulink::auth::create_jwt;
use edulink::models::{NewNotification, NotificationKind, Role};
use edulink::repo::inmem::InMemRepo;
use edulink::repo::NotificationRepo;
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

fn state(repo: InMemRepo) -> AppState {
    AppState {
        repo: Arc::new(repo),
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

macro_rules! register_student {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .set_json(&serde_json::json!({
                "display_name": $email,
                "email": $email,
                "role": "student",
                "grade": "7"
            }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
    }};
}

fn token(email: &str) -> String {
    create_jwt(email, "Test", Role::Student).unwrap()
}

async fn seed_notification(repo: &InMemRepo, email: &str) -> i64 {
    repo.create_notification(NewNotification {
        user_email: email.to_string(),
        kind: NotificationKind::Achievement,
        title: "Well done".into(),
        message: "Seeded".into(),
        question_id: None,
    })
    .await
    .unwrap()
    .id
}

#[actix_web::test]
#[serial]
async fn mark_read_and_delete_lifecycle() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(state(repo.clone()));

    register_student!(&app, "kid@x.com");
    let id = seed_notification(&repo, "kid@x.com").await;

    // starts unread
    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(list[0]["read"], false);

    // mark read
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/notifications/{id}/read"))
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let n: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(n["read"], true);

    // delete
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/notifications/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[actix_web::test]
#[serial]
async fn notifications_are_private_to_the_recipient() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(state(repo.clone()));

    register_student!(&app, "kid@x.com");
    register_student!(&app, "other@x.com");
    let id = seed_notification(&repo, "kid@x.com").await;

    // another account sees an empty list
    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("other@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 0);

    // and cannot mark or delete someone else's notification
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/notifications/{id}/read"))
        .insert_header(("Authorization", format!("Bearer {}", token("other@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/notifications/{id}"))
        .insert_header(("Authorization", format!("Bearer {}", token("other@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
#[serial]
async fn newest_notifications_come_first() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(state(repo.clone()));

    register_student!(&app, "kid@x.com");
    for _ in 0..3 {
        seed_notification(&repo, "kid@x.com").await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let items = list.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for pair in items.windows(2) {
        let a: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(pair[0]["created_at"].clone()).unwrap();
        let b: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(pair[1]["created_at"].clone()).unwrap();
        assert!(a >= b);
    }
}
