#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use edulink::auth::create_jwt;
use edulink::models::Role;
use edulink::repo::inmem::InMemRepo;
use edulink::repo::UserRepo;
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

macro_rules! register {
    ($app:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .set_json(&$body)
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
    }};
}

macro_rules! post_question {
    ($app:expr, $email:expr, $classroom:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/questions")
            .insert_header((
                "Authorization",
                format!("Bearer {}", token($email)),
            ))
            .set_json(&serde_json::json!({
                "title": "Q",
                "description": "Body",
                "subject": "Math",
                "classroom": $classroom
            }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
    }};
}

fn token(email: &str) -> String {
    create_jwt(email, "Test", Role::Student).unwrap()
}

#[actix_web::test]
#[serial]
async fn dashboard_reports_child_stats_with_floor_averages() {
    setup_env();
    let app = app!(state(InMemRepo::new()));

    register!(
        &app,
        serde_json::json!({
            "display_name": "Kid",
            "email": "kid@x.com",
            "role": "student",
            "grade": "8"
        })
    );
    register!(
        &app,
        serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent",
            "student_email": "kid@x.com"
        })
    );
    post_question!(&app, "kid@x.com", "8");

    let req = test::TestRequest::get()
        .uri("/api/v1/parent/dashboard")
        .insert_header(("Authorization", format!("Bearer {}", token("pat@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let dash: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(dash["child"]["email"], "kid@x.com");
    assert_eq!(dash["child"]["grade"], "8");
    assert_eq!(dash["child"]["questions_asked"], 1);
    assert_eq!(dash["child"]["answers_given"], 0);
    // grade 8 has no other students: every average floors at 2
    assert_eq!(dash["class_average"]["questions"], 2);
    assert_eq!(dash["class_average"]["answers"], 2);
    assert_eq!(dash["class_average"]["points"], 2);
}

#[actix_web::test]
#[serial]
async fn class_average_reflects_classmates() {
    setup_env();
    let repo = InMemRepo::new();
    let app = app!(state(repo.clone()));

    register!(
        &app,
        serde_json::json!({
            "display_name": "Kid",
            "email": "kid@x.com",
            "role": "student",
            "grade": "8"
        })
    );
    register!(
        &app,
        serde_json::json!({
            "display_name": "Busy",
            "email": "busy@x.com",
            "role": "student",
            "grade": "8"
        })
    );
    register!(
        &app,
        serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent",
            "student_email": "kid@x.com"
        })
    );
    for _ in 0..4 {
        post_question!(&app, "busy@x.com", "8");
    }
    repo.add_points("busy@x.com", 60).await.unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/parent/dashboard")
        .insert_header(("Authorization", format!("Bearer {}", token("pat@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let dash: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    // one classmate with 4 questions, 0 answers (floored), 60 points
    assert_eq!(dash["class_average"]["questions"], 4);
    assert_eq!(dash["class_average"]["answers"], 2);
    assert_eq!(dash["class_average"]["points"], 60);
}

#[actix_web::test]
#[serial]
async fn unknown_linked_student_is_404() {
    setup_env();
    let app = app!(state(InMemRepo::new()));

    register!(
        &app,
        serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent",
            "student_email": "ghost@x.com"
        })
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/parent/dashboard")
        .insert_header(("Authorization", format!("Bearer {}", token("pat@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["error"], "student not found");
}

#[actix_web::test]
#[serial]
async fn non_parent_cannot_open_dashboard() {
    setup_env();
    let app = app!(state(InMemRepo::new()));

    register!(
        &app,
        serde_json::json!({
            "display_name": "Kid",
            "email": "kid@x.com",
            "role": "student",
            "grade": "8"
        })
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/parent/dashboard")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
#[serial]
async fn kudos_lands_in_the_childs_notifications() {
    setup_env();
    let app = app!(state(InMemRepo::new()));

    register!(
        &app,
        serde_json::json!({
            "display_name": "Kid",
            "email": "kid@x.com",
            "role": "student",
            "grade": "8"
        })
    );
    register!(
        &app,
        serde_json::json!({
            "display_name": "Pat",
            "email": "pat@x.com",
            "role": "parent",
            "student_email": "kid@x.com"
        })
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/parent/kudos")
        .insert_header(("Authorization", format!("Bearer {}", token("pat@x.com"))))
        .set_json(&serde_json::json!({"message": "Proud of you!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let notifications: serde_json::Value =
        serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let list = notifications.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["kind"], "kudos");
    assert_eq!(list[0]["message"], "Proud of you!");
    assert_eq!(list[0]["title"], "Kudos from Pat");
}
