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

#[actix_web::test]
#[serial]
async fn baseline_headers_are_present() {
    setup_env();
    let state = AppState {
        repo: Arc::new(InMemRepo::new()),
        file_store: Arc::new(FsFileStore::new()),
        rate_limiter: None,
    };
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/classrooms/7/questions")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let headers = resp.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert!(headers.get("content-security-policy").is_some());
    // HSTS is opt-in and off by default
    assert!(headers.get("strict-transport-security").is_none());
}

#[actix_web::test]
#[serial]
async fn hsts_can_be_enabled() {
    setup_env();
    let state = AppState {
        repo: Arc::new(InMemRepo::new()),
        file_store: Arc::new(FsFileStore::new()),
        rate_limiter: None,
    };
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default().with_hsts(true))
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/classrooms/7/questions")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp
        .headers()
        .get("strict-transport-security")
        .is_some());
}
