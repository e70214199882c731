//! Transport decoding: raw recording bytes from the network to the
//! canonical base64 form, and back again when a resource is built.

use crate::error::{PlaybackError, Result};
use base64::{engine::general_purpose, Engine as _};

/// Mime type assumed for payloads that carry no data-URI prefix.
pub const DEFAULT_AUDIO_MIME: &str = "audio/wav";

const DATA_URI_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Canonical encoding of one recording: plain base64, or a full
/// `data:audio/<subtype>;base64,` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudioPayload(String);

impl EncodedAudioPayload {
    /// Wrap an already-encoded value (plain base64 or data URI).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.base64_body().is_empty()
    }

    pub fn is_data_uri(&self) -> bool {
        self.split_data_uri().is_some()
    }

    /// The mime type named by the data-URI prefix, or the default for raw payloads.
    pub fn mime_type(&self) -> &str {
        self.split_data_uri()
            .map(|(mime, _)| mime)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_AUDIO_MIME)
    }

    /// The base64 content with any data-URI prefix stripped.
    pub fn base64_body(&self) -> &str {
        self.split_data_uri()
            .map(|(_, body)| body)
            .unwrap_or(self.0.as_str())
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        let body = self.base64_body();
        if body.is_empty() {
            return Err(PlaybackError::decode("payload is empty"));
        }
        general_purpose::STANDARD
            .decode(body)
            .map_err(|e| PlaybackError::decode(format!("invalid base64 payload: {e}")))
    }

    /// Full data URI for this payload, adding the prefix when missing.
    pub fn to_data_uri(&self) -> String {
        if self.is_data_uri() {
            self.0.clone()
        } else {
            format!("{DATA_URI_SCHEME}{DEFAULT_AUDIO_MIME}{BASE64_MARKER}{}", self.0)
        }
    }

    fn split_data_uri(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix(DATA_URI_SCHEME)?;
        let marker = rest.find(BASE64_MARKER)?;
        let mime = &rest[..marker];
        let body = &rest[marker + BASE64_MARKER.len()..];
        Some((mime, body))
    }
}

/// Encode recording bytes as received from the service.
///
/// Fails on an empty buffer; the caller decides what that means for any
/// state it already committed.
pub fn encode_recording(bytes: &[u8]) -> Result<EncodedAudioPayload> {
    if bytes.is_empty() {
        return Err(PlaybackError::decode("recording body is empty"));
    }
    Ok(EncodedAudioPayload(general_purpose::STANDARD.encode(bytes)))
}

/// Cache file extension for an audio mime type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let normalized = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/flac" => "flac",
        _ => "audio",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAV_HEADER: &[u8] = b"RIFF\x24\x08\x00\x00WAVEfmt ";

    #[test]
    fn wav_header_encodes_to_riff_prefix() {
        let payload = encode_recording(WAV_HEADER).unwrap();
        assert!(payload.as_str().starts_with("UklGR"));
        assert!(!payload.is_data_uri());
        assert_eq!(payload.mime_type(), DEFAULT_AUDIO_MIME);
    }

    #[test]
    fn empty_buffer_is_a_decode_failure() {
        let err = encode_recording(&[]).unwrap_err();
        assert!(matches!(err, PlaybackError::Decode(_)));
    }

    #[test]
    fn data_uri_prefix_is_recognized_and_stripped() {
        let payload = EncodedAudioPayload::from_encoded("data:audio/mpeg;base64,SUQz");
        assert!(payload.is_data_uri());
        assert_eq!(payload.mime_type(), "audio/mpeg");
        assert_eq!(payload.base64_body(), "SUQz");
        assert_eq!(payload.decode_bytes().unwrap(), b"ID3");
        assert_eq!(payload.to_data_uri(), "data:audio/mpeg;base64,SUQz");
    }

    #[test]
    fn raw_payload_gains_wav_prefix() {
        let payload = EncodedAudioPayload::from_encoded("UklGRg==");
        assert_eq!(payload.to_data_uri(), "data:audio/wav;base64,UklGRg==");
    }

    #[test]
    fn prefix_without_body_is_empty() {
        let payload = EncodedAudioPayload::from_encoded("data:audio/wav;base64,");
        assert!(payload.is_empty());
        assert!(matches!(payload.decode_bytes(), Err(PlaybackError::Decode(_))));
    }

    #[test]
    fn garbage_base64_fails_to_decode() {
        let payload = EncodedAudioPayload::from_encoded("not base64!!");
        assert!(matches!(payload.decode_bytes(), Err(PlaybackError::Decode(_))));
    }

    #[test]
    fn extensions_follow_subtype() {
        assert_eq!(extension_for_mime("audio/x-wav"), "wav");
        assert_eq!(extension_for_mime("audio/mpeg; charset=binary"), "mp3");
        assert_eq!(extension_for_mime("audio/opus"), "audio");
    }
}
