//! Error types for the voicemail playback pipeline.

use thiserror::Error;

/// Failures surfaced by the retrieval-to-playback pipeline.
///
/// A superseded request is not an error; see `Materialized::Stale` and
/// `SelectionOutcome::Superseded`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The voicemail service could not be reached or answered with a failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Recording bytes could not be turned into the canonical base64 form.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A temp file or object URL could not be created for the recording.
    #[error("Resource creation error: {0}")]
    ResourceCreation(String),

    /// The platform audio capability rejected the resource.
    #[error("Playback error: {0}")]
    Playback(String),

    /// Settings could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PlaybackError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceCreation(message.into())
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Only network failures are worth retrying from the overlay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Short text for the overlay's non-playable state.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Couldn't reach the voicemail service. Try again.",
            Self::Decode(_) => "This recording is empty or unreadable.",
            Self::ResourceCreation(_) => "Couldn't prepare this recording for playback.",
            Self::Playback(_) => "Audio playback failed for this recording.",
            Self::Storage(_) => "Couldn't load player settings.",
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<rusqlite::Error> for PlaybackError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(PlaybackError::network("refused").is_retryable());
        assert!(!PlaybackError::decode("empty").is_retryable());
        assert!(!PlaybackError::resource("disk full").is_retryable());
        assert!(!PlaybackError::playback("unsupported").is_retryable());
    }

    #[test]
    fn display_includes_category_and_detail() {
        let err = PlaybackError::resource("cache dir missing");
        assert_eq!(err.to_string(), "Resource creation error: cache dir missing");
    }

    #[test]
    fn user_message_hides_detail() {
        let err = PlaybackError::network("connection refused (os error 111)");
        assert!(!err.user_message().contains("os error"));
    }
}
