//! HTTP client against an in-process stand-in for the voicemail service.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voicemail_playback::api::{Voicemail, VoicemailClient, VoicemailService};
use voicemail_playback::PlaybackError;

const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt \x10\x00\x00\x00";

#[derive(Clone, Default)]
struct Recorded {
    puts: Arc<Mutex<Vec<Value>>>,
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "Voicemail API is running" }))
}

async fn list() -> Json<Value> {
    Json(json!({
        "voicemails": [
            {
                "id": 5,
                "number": "+16045558888",
                "name": "Eve",
                "description": "Unrecognized number offering insurance",
                "spam": true,
                "date": "2025-10-19T10:30:00",
                "unread": true,
                "recording": "5.wav"
            },
            {
                "id": "7",
                "number": "+15551234567",
                "name": "Alice",
                "description": "Call me back",
                "spam": false,
                "date": "2025-10-18T08:00:00+00:00",
                "unread": false,
                "recording": null
            }
        ],
        "count": 2
    }))
}

async fn put_voicemail(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    recorded.puts.lock().unwrap().push(body);
    ([(header::CONTENT_TYPE, "audio/wav")], WAV).into_response()
}

async fn recording(Path(id): Path<String>) -> Response {
    if id == "5" {
        ([(header::CONTENT_TYPE, "audio/wav")], WAV).into_response()
    } else {
        Json(json!({ "error": "Recording not found" })).into_response()
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn voicemail_service() -> (VoicemailClient, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/", get(status))
        .route("/voicemails", get(list).put(put_voicemail))
        .route("/voicemail/:id/recording", get(recording))
        .with_state(recorded.clone());
    let base = serve(app).await;
    let client = VoicemailClient::new(&base, Duration::from_secs(5)).unwrap();
    (client, recorded)
}

#[tokio::test]
async fn health_reports_status() {
    let (client, _) = voicemail_service().await;
    assert_eq!(client.health().await.unwrap(), "Voicemail API is running");
    assert!(!client.base_url().ends_with('/'));
}

#[tokio::test]
async fn list_accepts_integer_and_string_ids() {
    let (client, _) = voicemail_service().await;

    let voicemails = client.list_voicemails().await.unwrap();

    assert_eq!(voicemails.len(), 2);
    assert_eq!(voicemails[0].id, "5");
    assert_eq!(voicemails[1].id, "7");
    assert!(voicemails[0].unread);
    assert_eq!(voicemails[0].recording.as_deref(), Some("5.wav"));
    assert!(voicemails[1].recording.is_none());
}

#[tokio::test]
async fn put_sends_voicemail_marked_read_and_returns_bytes() {
    let (client, recorded) = voicemail_service().await;
    let voicemail: Voicemail = client.list_voicemails().await.unwrap().remove(0);

    let bytes = VoicemailService::mark_read_and_fetch_recording(&client, &voicemail)
        .await
        .unwrap();

    assert_eq!(bytes, WAV);
    let puts = recorded.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0]["id"], "5");
    assert_eq!(puts[0]["unread"], false);
    assert_eq!(puts[0]["name"], "Eve");
}

#[tokio::test]
async fn recording_endpoint_maps_json_error_to_network_failure() {
    let (client, _) = voicemail_service().await;

    assert_eq!(client.fetch_recording("5").await.unwrap(), WAV);
    let err = client.fetch_recording("99").await.unwrap_err();
    assert_eq!(err, PlaybackError::Network("Recording not found".to_string()));
}

#[tokio::test]
async fn error_body_on_list_is_a_network_failure() {
    let app = Router::new().route(
        "/voicemails",
        get(|| async { Json(json!({ "error": "Database not configured" })) }),
    );
    let client = VoicemailClient::new(&serve(app).await, Duration::from_secs(5)).unwrap();

    let err = client.list_voicemails().await.unwrap_err();

    assert!(err.is_retryable());
    assert!(err.to_string().contains("Database not configured"));
}

#[tokio::test]
async fn server_error_status_is_a_network_failure() {
    let app = Router::new().route(
        "/voicemails",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }).put(|| async { StatusCode::BAD_GATEWAY }),
    );
    let client = VoicemailClient::new(&serve(app).await, Duration::from_secs(5)).unwrap();
    let voicemail: Voicemail = serde_json::from_value(json!({
        "id": "1",
        "number": "+1",
        "name": "Bob",
        "description": "",
        "spam": false,
        "date": "2025-10-19T10:30:00Z",
        "unread": true
    }))
    .unwrap();

    assert!(matches!(
        client.mark_read_and_fetch_recording(&voicemail).await,
        Err(PlaybackError::Network(_))
    ));
    assert!(matches!(
        client.list_voicemails().await,
        Err(PlaybackError::Network(_))
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = VoicemailClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();

    assert!(matches!(
        client.list_voicemails().await,
        Err(PlaybackError::Network(_))
    ));
}
