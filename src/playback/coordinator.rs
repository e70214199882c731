//! Retrieval step: one round trip that marks a voicemail read and encodes its recording.

use crate::api::{Voicemail, VoicemailService};
use crate::diagnostics::{log_perf, perf_start};
use crate::error::{PlaybackError, Result};
use crate::playback::transport::{encode_recording, EncodedAudioPayload};
use tracing::{debug, info, warn};

/// Called once per successful retrieval with the voicemail marked read.
pub type ReadListener = Box<dyn Fn(&Voicemail) + Send + Sync>;

/// Outcome of a successful network round trip.
#[derive(Debug)]
pub struct Retrieval {
    /// The voicemail with `unread` cleared; merge it into the collection.
    pub updated: Voicemail,
    /// The encoded recording, or why it could not be encoded.
    pub payload: Result<EncodedAudioPayload>,
}

/// Drives one voicemail from selection to an encoded payload.
pub struct RetrievalCoordinator<S> {
    service: S,
    on_read: Option<ReadListener>,
}

impl<S: VoicemailService> RetrievalCoordinator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            on_read: None,
        }
    }

    /// Observe read-state flips. The listener runs before the payload is encoded.
    pub fn with_read_listener(mut self, listener: ReadListener) -> Self {
        self.on_read = Some(listener);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch the recording and clear the unread flag.
    ///
    /// A network failure leaves read state alone and returns `Err`. Once the
    /// network succeeds the read flip is committed even if encoding fails.
    pub async fn retrieve_and_prepare(&self, voicemail: &Voicemail) -> Result<Retrieval> {
        if voicemail.id.trim().is_empty() {
            return Err(PlaybackError::network("voicemail has no identifier"));
        }

        let started = perf_start();
        let bytes = self
            .service
            .mark_read_and_fetch_recording(voicemail)
            .await
            .map_err(|err| match err {
                PlaybackError::Network(_) => err,
                other => PlaybackError::network(other.to_string()),
            });
        log_perf("retrieve", started, &format!("voicemail_id={}", voicemail.id));

        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(voicemail_id = %voicemail.id, %err, "recording retrieval failed");
                return Err(err);
            }
        };

        let updated = voicemail.marked_read();
        if voicemail.unread {
            info!(voicemail_id = %voicemail.id, "marked voicemail read");
        }
        if let Some(listener) = &self.on_read {
            listener(&updated);
        }

        let payload = encode_recording(&bytes);
        match &payload {
            Ok(encoded) => debug!(
                voicemail_id = %voicemail.id,
                encoded_len = encoded.as_str().len(),
                "recording encoded"
            ),
            Err(err) => warn!(voicemail_id = %voicemail.id, %err, "recording could not be encoded"),
        }

        Ok(Retrieval { updated, payload })
    }
}
