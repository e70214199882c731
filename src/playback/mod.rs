//! Retrieval-to-playback pipeline for a single selected voicemail.

pub mod controller;
pub mod coordinator;
pub mod materializer;
pub mod player;
pub mod resource;
pub mod transport;

#[cfg(not(target_arch = "wasm32"))]
pub mod native_files;

#[cfg(all(not(target_arch = "wasm32"), feature = "native-audio"))]
pub mod native_audio;

#[cfg(target_arch = "wasm32")]
pub mod web_audio;
#[cfg(target_arch = "wasm32")]
pub mod web_blobs;

pub use controller::{AudioOutput, OutputEvent, PlaybackController, PlaybackState, StatusListener};
pub use coordinator::{ReadListener, Retrieval, RetrievalCoordinator};
pub use materializer::{Generation, GenerationCounter, Materialized, ResourceMaterializer};
pub use player::{OverlaySnapshot, SelectionOutcome, VoicemailPlayer};
pub use resource::{Platform, PlayableResource, ResourceBackend, ResourceKind};
pub use transport::{encode_recording, extension_for_mime, EncodedAudioPayload};

#[cfg(not(target_arch = "wasm32"))]
pub use native_files::NativeFileBackend;

#[cfg(all(not(target_arch = "wasm32"), feature = "native-audio"))]
pub use native_audio::RodioOutput;

#[cfg(target_arch = "wasm32")]
pub use web_audio::WebAudioOutput;
#[cfg(target_arch = "wasm32")]
pub use web_blobs::WebBlobBackend;
