use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::affordability::router::affordability_router;

#[tokio::test]
async fn rates_route_reports_fetch_then_cache() {
    let fixture = fixture(Arc::new(StaticSource::answering(bundle())));
    let router = affordability_router(fixture.service.clone());

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/v1/rates?state=CO&county=Denver&zip=80202")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], json!("fetched"));
    assert_eq!(payload["phase"], json!("ready"));
    assert_eq!(payload["bundle"]["source"], json!("database_snapshot"));
    assert_eq!(payload["progress"]["progress"], json!(100));

    let response = router
        .oneshot(
            Request::get("/api/v1/rates?state=co&county=denver&silent=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], json!("cached"));
}

#[tokio::test]
async fn rates_route_requires_state_and_county() {
    let fixture = fixture(Arc::new(StaticSource::answering(bundle())));
    let response = affordability_router(fixture.service)
        .oneshot(
            Request::get("/api/v1/rates?state=CO")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        json!("rate acquisition error: state and county are required before rates can be loaded")
    );
}

#[tokio::test]
async fn refresh_surfaces_exhausted_chain() {
    let fixture = fixture(Arc::new(StaticSource::down()));
    let router = affordability_router(fixture.service.clone());

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/v1/rates?state=CO&county=Denver")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/rates/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        json!("rate acquisition error: unable to load mortgage rates: all 1 source(s) failed")
    );

    let response = router
        .oneshot(
            Request::get("/api/v1/rates/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["phase"], json!("error"));
    assert_eq!(payload["is_error"], json!(true));
    assert_eq!(payload["location"]["county"], json!("Denver"));
}

#[tokio::test]
async fn affordability_route_returns_quote() {
    let fixture = fixture(Arc::new(StaticSource::answering(bundle())));

    let response = affordability_router(fixture.service)
        .oneshot(
            Request::post("/api/v1/affordability")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&quote_request(Some("user-1"))).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["affordability"]["status"], json!("available"));
    assert!(payload["affordability"]["max_home_price"].as_f64().unwrap_or_default() > 0.0);
    assert_eq!(payload["scenarios"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn flag_routes_store_overrides() {
    let fixture = fixture(Arc::new(StaticSource::answering(bundle())));
    let router = affordability_router(fixture.service);

    let response = router
        .clone()
        .oneshot(
            Request::put("/api/v1/flags/user-9")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"flag":"scenarios","enabled":false}"#))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::get("/api/v1/flags/user-9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["overrides"]["scenarios"], json!(false));
}
