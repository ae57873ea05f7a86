use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use iptv_parser::{
    models::{PlaylistChannel, ProgramRecord},
    services::Catalog,
    utils::XmltvTimestamp,
    web::{AppState, WebServer},
};

// Helper function to send requests to the app
async fn send_request(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

fn xmltv_hours_from_now(hours: i64) -> String {
    (Utc::now() + Duration::hours(hours))
        .format("%Y%m%d%H%M%S +0000")
        .to_string()
}

fn channel(name: &str, category: &str, guide_id: &str) -> PlaylistChannel {
    PlaylistChannel {
        name: Some(name.to_string()),
        logo: None,
        url: format!("http://stream/{}", guide_id),
        category: Some(category.to_string()),
        guide_id: Some(guide_id.to_string()),
    }
}

fn program(channel: &str, start_hours: i64, stop_hours: i64, title: &str) -> ProgramRecord {
    let start = xmltv_hours_from_now(start_hours);
    let stop = xmltv_hours_from_now(stop_hours);
    ProgramRecord {
        channel: Some(channel.to_string()),
        start_time: XmltvTimestamp::parse(&start),
        start_raw: Some(start),
        stop_time: XmltvTimestamp::parse(&stop),
        stop_raw: Some(stop),
        title: Some(title.to_string()),
        description: Some(format!("About {}", title)),
        ..ProgramRecord::default()
    }
}

fn test_app() -> Router {
    let catalog = Catalog::new(
        vec![
            channel("WPVI Philadelphia", "USA LOCALS", "wpvi.us"),
            channel("CNN", "NEWS", "cnn.us"),
            channel("BBC News", "NEWS", "bbcnews.uk"),
        ],
        vec![
            program("cnn.us", 3, 4, "Later"),
            program("cnn.us", -3, -2, "Finished"),
            program("cnn.us", -1, 1, "On Now"),
            program("cnn.us", -1, 1, "On Now"),
            program("wpvi.us", 0, 1, "Local"),
        ],
        chrono_tz::America::New_York,
    );
    WebServer::create_router(AppState {
        catalog: Arc::new(catalog),
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, response) = send_request(&app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["channels"], 3);
    assert_eq!(response["programs"], 5);
}

#[tokio::test]
async fn test_categories() {
    let app = test_app();
    let (status, response) = send_request(&app, Method::GET, "/categories").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!([{ "name": "NEWS" }, { "name": "USA LOCALS" }]));
}

#[tokio::test]
async fn test_category_channels_with_encoded_name() {
    let app = test_app();
    let (status, response) =
        send_request(&app, Method::GET, "/categories/NEWS/channels").await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = response
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["BBC News", "CNN"]);
    assert_eq!(response[1]["guide_id"], "cnn.us");
    assert_eq!(response[1]["url"], "http://stream/cnn.us");

    let (status, response) =
        send_request(&app, Method::GET, "/categories/USA%20LOCALS/channels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response[0]["name"], "WPVI Philadelphia");

    let (status, response) =
        send_request(&app, Method::GET, "/categories/MOVIES/channels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!([]));
}

#[tokio::test]
async fn test_channel_programs() {
    let app = test_app();
    let (status, response) = send_request(&app, Method::GET, "/channels/cnn.us/programs").await;

    assert_eq!(status, StatusCode::OK);
    let programs = response.as_array().unwrap();
    let titles: Vec<&str> = programs
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["On Now", "Later"]);

    let program = &programs[0];
    assert_eq!(program["channel"], "cnn.us");
    assert_eq!(program["description"], "About On Now");
    let start = program["start_dt"].as_str().unwrap();
    assert!(start.ends_with("-05:00") || start.ends_with("-04:00"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app();
    let (status, response) = send_request(&app, Method::GET, "/api/v1/sources").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(response["error"].as_str().unwrap().contains("/api/v1/sources"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/categories")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
