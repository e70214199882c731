use crate::api::models::*;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// The remote voicemail store as the pipeline sees it.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait VoicemailService {
    async fn list_voicemails(&self) -> Result<Vec<Voicemail>>;

    /// Send the voicemail with `unread: false` and receive its recording bytes.
    async fn mark_read_and_fetch_recording(&self, voicemail: &Voicemail) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct VoicemailClient {
    base_url: String,
    http: reqwest::Client,
}

impl VoicemailClient {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PlaybackError::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            http,
        })
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url),
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /`: the status string the service reports.
    pub async fn health(&self) -> Result<String> {
        let response = self.http.get(self.endpoint("")).send().await?;
        let response = ensure_success(response)?;
        let json: serde_json::Value = response.json().await?;
        Ok(json
            .get("status")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    pub async fn list_voicemails(&self) -> Result<Vec<Voicemail>> {
        let response = self.http.get(self.endpoint("voicemails")).send().await?;
        let response = ensure_success(response)?;
        let list: VoicemailList = response
            .json()
            .await
            .map_err(|e| PlaybackError::network(format!("malformed voicemail list: {e}")))?;

        if let Some(error) = list.error {
            return Err(PlaybackError::network(error));
        }
        debug!(count = list.voicemails.len(), "fetched voicemails");
        Ok(list.voicemails)
    }

    /// `PUT /voicemails` with the read flag cleared; the body is the recording.
    pub async fn mark_read_and_fetch_recording(&self, voicemail: &Voicemail) -> Result<Vec<u8>> {
        let updated = voicemail.marked_read();
        let response = self
            .http
            .put(self.endpoint("voicemails"))
            .json(&updated)
            .send()
            .await?;
        read_recording(ensure_success(response)?).await
    }

    /// `GET /voicemail/{id}/recording`: the recording, read state untouched.
    pub async fn fetch_recording(&self, voicemail_id: &str) -> Result<Vec<u8>> {
        let path = format!("voicemail/{}/recording", voicemail_id.trim());
        let response = self.http.get(self.endpoint(&path)).send().await?;
        read_recording(ensure_success(response)?).await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl VoicemailService for VoicemailClient {
    async fn list_voicemails(&self) -> Result<Vec<Voicemail>> {
        VoicemailClient::list_voicemails(self).await
    }

    async fn mark_read_and_fetch_recording(&self, voicemail: &Voicemail) -> Result<Vec<u8>> {
        VoicemailClient::mark_read_and_fetch_recording(self, voicemail).await
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_SERVER_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PlaybackError::network(format!(
            "{} answered {status}",
            response.url().path()
        )))
    }
}

fn is_json_response(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

async fn read_recording(response: reqwest::Response) -> Result<Vec<u8>> {
    if is_json_response(&response) {
        // The service reports a missing recording as a JSON error object.
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .get("error")
            .and_then(|value| value.as_str())
            .unwrap_or("recording unavailable")
            .to_string();
        warn!(%message, "service returned no recording");
        return Err(PlaybackError::network(message));
    }
    let bytes = response.bytes().await?;
    debug!(len = bytes.len(), "received recording bytes");
    Ok(bytes.to_vec())
}
