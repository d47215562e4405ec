#![cfg(feature = "inmem-store")]

use actix_web::{test, App};
use edulink::auth::create_jwt;
use edulink::models::Role;
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

fn token(email: &str) -> String {
    create_jwt(email, "Test", Role::Student).unwrap()
}

fn tiny_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I', b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I',
        b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

fn multipart_body(boundary: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[actix_web::test]
#[serial]
async fn upload_fetch_and_duplicate_roundtrip() {
    setup_env();
    let app = app!(state());
    register!(
        &app,
        serde_json::json!({
            "display_name": "Mr. K",
            "email": "k@school.org",
            "role": "teacher",
            "subject": "Physics"
        })
    );

    let boundary = "BOUNDARYHASH";
    let body = multipart_body(boundary, &tiny_png());

    let req = test::TestRequest::post()
        .uri("/api/v1/files")
        .insert_header(("Authorization", format!("Bearer {}", token("k@school.org"))))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let uploaded: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(uploaded["mime"], "image/png");
    assert_eq!(uploaded["file_type"], "image");
    assert_eq!(uploaded["duplicate"], false);
    let hash = uploaded["hash"].as_str().unwrap().to_string();

    // re-upload is idempotent
    let req = test::TestRequest::post()
        .uri("/api/v1/files")
        .insert_header(("Authorization", format!("Bearer {}", token("k@school.org"))))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let dup: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(dup["duplicate"], true);
    assert_eq!(dup["hash"], hash.as_str());

    // public fetch serves the stored bytes
    let req = test::TestRequest::get().uri(&format!("/files/{hash}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert_eq!(ct, "image/png");
    let bytes = test::read_body(resp).await;
    assert_eq!(bytes.to_vec(), tiny_png());
}

#[actix_web::test]
#[serial]
async fn upload_requires_a_session() {
    setup_env();
    let app = app!(state());

    let boundary = "BOUNDARYHASH";
    let req = test::TestRequest::post()
        .uri("/api/v1/files")
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, &tiny_png()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
#[serial]
async fn unsupported_media_type_is_rejected() {
    setup_env();
    let app = app!(state());
    register!(
        &app,
        serde_json::json!({
            "display_name": "Mr. K",
            "email": "k@school.org",
            "role": "teacher",
            "subject": "Physics"
        })
    );

    let boundary = "BOUNDARYHASH";
    // plain text sniffs to no known type
    let req = test::TestRequest::post()
        .uri("/api/v1/files")
        .insert_header(("Authorization", format!("Bearer {}", token("k@school.org"))))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, b"just some text"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 415);
}

#[actix_web::test]
#[serial]
async fn resource_upload_notifies_the_classroom() {
    setup_env();
    let app = app!(state());
    register!(
        &app,
        serde_json::json!({
            "display_name": "Kid",
            "email": "kid@x.com",
            "role": "student",
            "grade": "6"
        })
    );
    register!(
        &app,
        serde_json::json!({
            "display_name": "Mr. K",
            "email": "k@school.org",
            "role": "teacher",
            "subject": "Physics"
        })
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/resources")
        .insert_header(("Authorization", format!("Bearer {}", token("k@school.org"))))
        .set_json(&serde_json::json!({
            "title": "Forces cheat sheet",
            "description": "One page summary",
            "file_type": "pdf",
            "subject": "Physics",
            "classroom": "6"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let resource: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let resource_id = resource["id"].as_i64().unwrap();

    // student in grade 6 hears about it
    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let items = list.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "resource");

    // the classroom listing carries it
    let req = test::TestRequest::get()
        .uri("/api/v1/classrooms/6/resources")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let resources: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(resources.as_array().unwrap().len(), 1);

    // and so does the student's policy-filtered resource feed
    let req = test::TestRequest::get()
        .uri("/api/v1/feed/resources")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let feed: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(feed.as_array().unwrap().len(), 1);

    // download provenance log
    let req = test::TestRequest::post()
        .uri("/api/v1/downloads")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .set_json(&serde_json::json!({
            "resource_id": resource_id,
            "local_path": "/sdcard/edulink/forces.pdf"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get()
        .uri("/api/v1/downloads")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let downloads: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(downloads.as_array().unwrap().len(), 1);
    assert_eq!(downloads[0]["resource_id"], resource_id);

    // a download of a missing resource is rejected
    let req = test::TestRequest::post()
        .uri("/api/v1/downloads")
        .insert_header(("Authorization", format!("Bearer {}", token("kid@x.com"))))
        .set_json(&serde_json::json!({
            "resource_id": 9999,
            "local_path": "/sdcard/edulink/ghost.pdf"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
