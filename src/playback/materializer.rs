//! Turns encoded payloads into playable resources for the current platform.
//!
//! Every request carries a generation ticket. A request whose ticket has been
//! superseded by the time its I/O finishes throws its resource away instead of
//! returning it, so the newest selection always wins.

use crate::diagnostics::{log_perf, perf_start};
use crate::error::PlaybackError;
use crate::playback::resource::{Platform, PlayableResource, ResourceBackend};
use crate::playback::transport::{extension_for_mime, EncodedAudioPayload};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Snapshot of the generation counter taken when a request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic request counter. Only the latest ticket is current.
#[derive(Debug, Default)]
pub struct GenerationCounter(AtomicU64);

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier ticket.
    pub fn advance(&self) -> Generation {
        Generation(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.0.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, ticket: Generation) -> bool {
        self.current() == ticket
    }
}

/// Result of one materialization request.
#[derive(Debug, PartialEq)]
pub enum Materialized {
    Ready(PlayableResource),
    /// No payload; the live resource was cleared and nothing replaced it.
    Empty,
    /// A newer request started first. Anything created has been disposed.
    Stale,
    Failed(PlaybackError),
}

pub struct ResourceMaterializer<B> {
    backend: B,
}

impl<B: ResourceBackend> ResourceMaterializer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    /// Replace `previous` with a resource built from `payload`.
    ///
    /// `previous` is always disposed before anything new is created.
    pub async fn materialize(
        &self,
        previous: Option<PlayableResource>,
        payload: Option<&EncodedAudioPayload>,
        ticket: Generation,
        generations: &GenerationCounter,
    ) -> Materialized {
        if let Some(previous) = previous {
            self.dispose(previous).await;
        }

        let Some(payload) = payload.filter(|payload| !payload.is_empty()) else {
            return Materialized::Empty;
        };

        if !generations.is_current(ticket) {
            debug!(%ticket, "materialization superseded before start");
            return Materialized::Stale;
        }

        let started = perf_start();
        let created = self.create(payload).await;
        log_perf("materialize", started, &format!("generation={ticket}"));

        let resource = match created {
            Ok(resource) => resource,
            Err(err) => {
                warn!(%ticket, %err, "failed to materialize recording");
                return Materialized::Failed(err);
            }
        };

        if !generations.is_current(ticket) {
            debug!(%ticket, "discarding stale resource");
            self.dispose(resource).await;
            return Materialized::Stale;
        }

        Materialized::Ready(resource)
    }

    async fn create(&self, payload: &EncodedAudioPayload) -> crate::error::Result<PlayableResource> {
        match self.backend.platform() {
            Platform::Browser => {
                if payload.is_data_uri() {
                    return Ok(PlayableResource::DataUri {
                        uri: payload.as_str().to_string(),
                    });
                }
                let bytes = payload.decode_bytes().map_err(into_resource_error)?;
                let url = self.backend.create_url(&bytes, payload.mime_type()).await?;
                Ok(PlayableResource::ObjectUrl { url })
            }
            Platform::Native => {
                let bytes = payload.decode_bytes().map_err(into_resource_error)?;
                let extension = extension_for_mime(payload.mime_type());
                let path = self.backend.write(&bytes, extension).await?;
                Ok(PlayableResource::NativeFile { path })
            }
        }
    }

    /// Release a resource. Failures are logged and otherwise ignored.
    pub async fn dispose(&self, resource: PlayableResource) {
        let outcome = match &resource {
            PlayableResource::NativeFile { path } => self.backend.delete(path).await,
            PlayableResource::ObjectUrl { url } => self.backend.revoke_url(url).await,
            PlayableResource::DataUri { .. } => Ok(()),
        };
        match outcome {
            Ok(()) => debug!(kind = ?resource.kind(), "disposed resource"),
            Err(err) => warn!(kind = ?resource.kind(), %err, "failed to dispose resource"),
        }
    }
}

fn into_resource_error(err: PlaybackError) -> PlaybackError {
    match err {
        PlaybackError::Decode(message) => PlaybackError::ResourceCreation(message),
        other => other,
    }
}
