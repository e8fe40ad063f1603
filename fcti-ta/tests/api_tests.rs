//! HTTP read API

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fcti_ta::discovery::{PartyRole, PropertySeed};
use fcti_ta::models::TaskType;
use fcti_ta::{build_router, AppState};
use helpers::{fast_discovery, harness, summary, ymd, ScriptedRegistry, PROPERTY};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let h = harness(Arc::new(ScriptedRegistry::new("scripted")), fast_discovery()).await;
    let router = build_router(AppState::new(h.service.clone(), h.events.clone()));

    let (status, body) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fcti-ta");
}

#[tokio::test]
async fn test_title_report_after_analysis() {
    let registry = Arc::new(ScriptedRegistry::new("scripted"));
    registry.respond(
        TaskType::PartyName,
        "DOE JANE",
        vec![
            summary("2010-0100", "2010-03-01", "WD", &["SMITH ROBERT"], &["DOE JANE"]),
            summary("2015-0001", "2015-04-01", "MTG", &["DOE JANE"], &["FIRST NATIONAL BANK"]),
        ],
    );
    registry.respond(
        TaskType::PartyName,
        "SMITH ROBERT",
        vec![summary("1985-0042", "1985-07-15", "WD", &["BROWN CARL"], &["SMITH ROBERT"])],
    );
    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let seed = PropertySeed::new(PROPERTY).with_party(
        "DOE JANE",
        PartyRole::Owner,
        Some(ymd(2010, 3, 1)),
        None,
    );
    h.service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();

    let router = build_router(AppState::new(h.service.clone(), h.events.clone()));
    let (status, body) = get_json(router, &format!("/properties/{}/title", PROPERTY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["property"]["propertyId"], PROPERTY);
    assert_eq!(body["property"]["chainComplete"], true);
    assert_eq!(body["periods"].as_array().unwrap().len(), 2);
    assert!(body["periods"][0]["id"].is_string());

    let encumbrances = body["encumbrances"].as_array().unwrap();
    assert_eq!(encumbrances.len(), 1);
    assert!(encumbrances[0]["survivalStatus"].is_string());
}

#[tokio::test]
async fn test_unknown_property_is_404() {
    let h = harness(Arc::new(ScriptedRegistry::new("scripted")), fast_discovery()).await;
    let router = build_router(AppState::new(h.service.clone(), h.events.clone()));

    let (status, body) = get_json(router, "/properties/NOPE/title").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
