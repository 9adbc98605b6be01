//! Integration tests for the soundscape HTTP API
//!
//! Every test builds the router over an in-memory database and a temporary
//! uploads directory, then drives it with `oneshot` requests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use soundscape::{
    build_router, Aggregator, AppState, Coordinates, NewSound, Storage, UploadPolicy, UploadStore,
};

const FRONTEND: &str = "http://localhost:3000";
const BOUNDARY: &str = "soundscape-test-boundary";

struct TestApp {
    router: Router,
    uploads: TempDir,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn send_json(&self, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    fn stored_files(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn sound(name: &str, lat: f64, lng: f64, emotions: &[&str], tags: &[&str]) -> NewSound {
    let mut sound = NewSound::new(name, Coordinates::new(lat, lng));
    sound.author = Some("Ana".to_string());
    sound.emotions = emotions.iter().map(|s| (*s).to_string()).collect();
    sound.tags = tags.iter().map(|s| (*s).to_string()).collect();
    sound.duration_secs = 60;
    sound
}

/// Bogotá, Chía (about 25 km away) and Medellín, recorded over three days.
fn setup_app() -> TestApp {
    let storage = Storage::open_in_memory().unwrap();
    let now = Utc::now();
    let fixtures = [
        sound("Rain on Septima", 4.6097, -74.0817, &["calm", "nostalgic"], &["rain", "city"]),
        sound("Chia market", 4.8615, -74.0325, &["joyful"], &["market", "city"]),
        sound("Medellin metro", 6.2442, -75.5812, &["energetic", "calm"], &["transport"]),
    ];
    for (days_ago, mut fixture) in (0_i64..).zip(fixtures) {
        fixture.recorded_at = Some(now - Duration::days(days_ago));
        storage.insert(&fixture).unwrap();
    }
    setup_with(storage)
}

fn setup_with(storage: Storage) -> TestApp {
    let uploads = TempDir::new().unwrap();
    let policy = UploadPolicy {
        max_bytes: 1024,
        ..UploadPolicy::default()
    };
    let state = AppState::new(
        storage,
        UploadStore::new(uploads.path(), policy),
        Aggregator::default(),
    );
    TestApp {
        router: build_router(state, FRONTEND).unwrap(),
        uploads,
    }
}

/// Build a multipart body from text fields and an optional audio part.
fn multipart(fields: &[(&str, &str)], audio: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/sounds")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn valid_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Birds at dawn"),
        ("latitude", "4.5981"),
        ("longitude", "-74.0760"),
        ("author", "Luis"),
        ("duration", "95"),
        ("quality", "high"),
        ("emotions", "peaceful"),
        ("emotions", " peaceful "),
        ("tags", "birds"),
    ]
}

// =============================================================================
// Health and routing
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();
    let (status, body) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "soundscape");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_returns_error_envelope() {
    let app = setup_app();
    let (status, body) = app.get("/api/nothing-here").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_cors_allows_frontend_origin() {
    let app = setup_app();
    let request = Request::get("/api/health")
        .header(header::ORIGIN, FRONTEND)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        FRONTEND
    );
}

// =============================================================================
// Reading sounds
// =============================================================================

#[tokio::test]
async fn test_list_sounds_newest_first() {
    let app = setup_app();
    let (status, body) = app.get("/api/sounds").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"][0]["name"], "Rain on Septima");
    assert_eq!(body["data"][2]["name"], "Medellin metro");
}

#[tokio::test]
async fn test_list_sounds_by_emotion() {
    let app = setup_app();
    let (status, body) = app.get("/api/sounds?emotion=calm").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rain on Septima", "Medellin metro"]);
}

#[tokio::test]
async fn test_list_sounds_nearby() {
    let app = setup_app();
    let (status, body) = app
        .get("/api/sounds?lat=4.6097&lng=-74.0817&radius=50")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["name"], "Rain on Septima");
    assert!(body["data"][0]["distance_km"].as_f64().unwrap() < 0.01);
    assert_eq!(body["data"][1]["name"], "Chia market");
}

#[tokio::test]
async fn test_list_sounds_requires_both_coordinates() {
    let app = setup_app();
    let (status, body) = app.get("/api/sounds?lat=4.6").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_get_sound() {
    let app = setup_app();
    let (status, body) = app.get("/api/sounds/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["emotions"], json!(["calm", "nostalgic"]));
}

#[tokio::test]
async fn test_get_missing_sound_is_404() {
    let app = setup_app();
    let (status, body) = app.get("/api/sounds/999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_get_invalid_id_is_400() {
    let app = setup_app();
    let (status, _) = app.get("/api/sounds/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Creating sounds
// =============================================================================

#[tokio::test]
async fn test_create_sound_with_audio() {
    let app = setup_app();
    let request = multipart(
        &valid_fields(),
        Some(("dawn chorus.mp3", "audio/mpeg", b"ID3 fake audio")),
    );
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], 4);
    let audio_url = body["data"]["audio_url"].as_str().unwrap().to_string();
    assert!(audio_url.starts_with("/uploads/sound_"));
    assert!(audio_url.ends_with(".mp3"));
    assert_eq!(app.stored_files(), 1);

    let (_, body) = app.get("/api/sounds/4").await;
    assert_eq!(body["data"]["name"], "Birds at dawn");
    assert_eq!(body["data"]["emotions"], json!(["peaceful"]));
    assert_eq!(body["data"]["quality"], "high");
    assert_eq!(body["data"]["duration_secs"], 95);
    assert_eq!(body["data"]["audio_url"], audio_url.as_str());

    let response = app
        .router
        .clone()
        .oneshot(Request::get(audio_url.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ID3 fake audio");
}

#[tokio::test]
async fn test_create_sound_without_audio_is_400() {
    let app = setup_app();
    let (status, body) = app.send(multipart(&valid_fields(), None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_sound_missing_fields_is_400() {
    let app = setup_app();
    let request = multipart(
        &[("name", "No place")],
        Some(("a.mp3", "audio/mpeg", b"abc")),
    );
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_create_sound_rejects_bad_format() {
    let app = setup_app();
    let request = multipart(&valid_fields(), Some(("notes.txt", "text/plain", b"hello")));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("format"));
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_create_sound_rejects_invalid_coordinates() {
    let app = setup_app();
    let mut fields = valid_fields();
    fields[1] = ("latitude", "91");
    let request = multipart(&fields, Some(("a.mp3", "audio/mpeg", b"abc")));
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_create_sound_rejects_oversized_file() {
    let app = setup_app();
    let big = vec![0_u8; 2048];
    let request = multipart(&valid_fields(), Some(("big.wav", "audio/wav", &big)));
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_files(), 0);
}

// =============================================================================
// Updating, tagging and deleting
// =============================================================================

#[tokio::test]
async fn test_update_sound() {
    let app = setup_app();
    let (status, body) = app
        .send_json(
            "PUT",
            "/api/sounds/2",
            &json!({"name": "Chia Sunday market", "emotions": ["joyful", "busy"]}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Chia Sunday market");
    assert_eq!(body["data"]["emotions"], json!(["joyful", "busy"]));
    assert_eq!(body["data"]["tags"], json!(["market", "city"]));
}

#[tokio::test]
async fn test_update_with_empty_body_is_400() {
    let app = setup_app();
    let (status, _) = app.send_json("PUT", "/api/sounds/1", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_missing_sound_is_404() {
    let app = setup_app();
    let (status, _) = app
        .send_json("PUT", "/api/sounds/42", &json!({"name": "Ghost"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_with_malformed_json_is_400() {
    let app = setup_app();
    let request = Request::put("/api/sounds/1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_add_tag() {
    let app = setup_app();
    let (status, body) = app
        .send_json("POST", "/api/sounds/3/tags", &json!({"tag": "Rush Hour"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "tag added");

    let (status, body) = app
        .send_json("POST", "/api/sounds/3/tags", &json!({"tag": " Rush Hour "}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "tag already present");

    let (_, body) = app.get("/api/sounds/3").await;
    assert_eq!(body["data"]["tags"], json!(["transport", "Rush Hour"]));
}

#[tokio::test]
async fn test_add_tag_validation() {
    let app = setup_app();
    let (status, _) = app
        .send_json("POST", "/api/sounds/1/tags", &json!({"tag": "  "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json("POST", "/api/sounds/99/tags", &json!({"tag": "rain"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_sound_removes_audio() {
    let app = setup_app();
    let request = multipart(&valid_fields(), Some(("a.ogg", "audio/ogg", b"OggS")));
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(app.stored_files(), 1);

    let request = Request::delete(format!("/api/sounds/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "sound deleted");
    assert_eq!(app.stored_files(), 0);

    let (status, _) = app.get(&format!("/api/sounds/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_keeps_audio_of_identical_upload() {
    let app = setup_app();
    let mut ids = Vec::new();
    let mut urls = Vec::new();
    for _ in 0..2 {
        let request = multipart(&valid_fields(), Some(("loop.wav", "audio/wav", b"RIFF same")));
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["data"]["id"].as_i64().unwrap());
        urls.push(body["data"]["audio_url"].as_str().unwrap().to_string());
    }
    assert_ne!(urls[0], urls[1]);
    assert_eq!(app.stored_files(), 2);

    let request = Request::delete(format!("/api/sounds/{}", ids[0]))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stored_files(), 1);

    let kept = urls[1].trim_start_matches("/uploads/");
    assert!(app.uploads.path().join(kept).exists());
}

#[tokio::test]
async fn test_delete_missing_sound_is_404() {
    let app = setup_app();
    let request = Request::delete("/api/sounds/77").body(Body::empty()).unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_report() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/report").await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["summary"]["total_sounds"], 3);
    assert_eq!(report["summary"]["unique_authors"], 1);
    assert_eq!(report["summary"]["unique_emotions"], 4);
    assert_eq!(report["summary"]["total_duration_secs"], 180);
    assert_eq!(report["emotions"][0]["emotion"], "calm");
    assert_eq!(report["emotions"][0]["count"], 2);
    assert_eq!(report["timeline"].as_array().unwrap().len(), 30);
    assert_eq!(report["insights"][0]["kind"], "dominant_emotion");
}

#[tokio::test]
async fn test_analytics_report_on_empty_collection() {
    let app = setup_with(Storage::open_in_memory().unwrap());
    let (status, body) = app.get("/api/analytics/report").await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["summary"]["total_sounds"], 0);
    assert_eq!(report["emotions"], json!([]));
    assert_eq!(report["insights"][0]["kind"], "recent_activity");
}

#[tokio::test]
async fn test_analytics_emotions() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/emotions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert_eq!(body["data"][0]["emotion"], "calm");
    assert_eq!(body["data"][0]["count"], 2);
    assert_eq!(
        body["data"][0]["examples"],
        json!(["Rain on Septima", "Medellin metro"])
    );
}

#[tokio::test]
async fn test_analytics_locations_and_tags() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/locations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (status, body) = app.get("/api/analytics/tags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["tag"], "city");
    assert_eq!(body["data"][0]["count"], 2);
}

#[tokio::test]
async fn test_analytics_timeline() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/timeline").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let today = Utc::now().date_naive().to_string();
    assert_eq!(body["data"][0]["date"], today.as_str());
}

#[tokio::test]
async fn test_analytics_search() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/search?q=MARKET").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["name"], "Chia market");

    let (_, body) = app.get("/api/analytics/search?tag=city&emotion=calm").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["name"], "Rain on Septima");

    let (_, body) = app.get("/api/analytics/search?author=nobody").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_analytics_recommendations() {
    let app = setup_app();
    let (status, body) = app.get("/api/analytics/recommendations/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"]["id"], 1);
    assert_eq!(body["count"], 2);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert!(!ids.contains(&1));
    assert!(body["data"][0]["similarity_score"].as_u64().unwrap() >= 1);

    let (status, _) = app.get("/api/analytics/recommendations/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
