//! Playback controller: binds the platform audio output to the live resource
//! and tracks the overlay's transport state.
//!
//! State machine:
//!
//! ```text
//! Idle -> Loading -> Ready -> Playing <-> Paused -> Closed
//!            \          \
//!             +-> Error <+
//! ```
//!
//! Every mutation is tagged with the generation that requested it; a tag that
//! no longer matches the bound generation is ignored.

use crate::error::{PlaybackError, Result};
use crate::playback::materializer::Generation;
use crate::playback::resource::PlayableResource;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Error,
    Closed,
}

impl PlaybackState {
    pub fn has_resource(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// Status reported by the platform audio capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Playing,
    Paused,
    Ended,
    Failed(String),
}

pub type StatusListener = Box<dyn Fn(OutputEvent) + Send + Sync>;

/// Platform audio player, treated as an opaque capability.
pub trait AudioOutput {
    fn attach(&self, resource: &PlayableResource) -> Result<()>;

    /// Stop and unload whatever is attached.
    fn detach(&self);

    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Replace the status listener; `None` unsubscribes.
    fn set_status_listener(&self, listener: Option<StatusListener>);
}

#[derive(Debug, Default)]
struct Binding {
    generation: Option<Generation>,
    state: PlaybackState,
    error: Option<PlaybackError>,
}

pub struct PlaybackController<O: AudioOutput> {
    output: O,
    binding: Arc<Mutex<Binding>>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            binding: Arc::new(Mutex::new(Binding::default())),
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<PlaybackError> {
        self.lock().error.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing && self.output.is_playing()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Binding> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A retrieval for `generation` has started.
    pub fn begin_loading(&self, generation: Generation) {
        let mut binding = self.lock();
        binding.generation = Some(generation);
        binding.state = PlaybackState::Loading;
        binding.error = None;
    }

    /// Move to `Error` if `generation` is still the bound one.
    pub fn fail(&self, generation: Generation, error: PlaybackError) {
        let mut binding = self.lock();
        if binding.generation != Some(generation) {
            debug!(%generation, "ignoring failure from superseded request");
            return;
        }
        if !matches!(binding.state, PlaybackState::Loading | PlaybackState::Ready) {
            return;
        }
        warn!(%generation, %error, "playback unavailable");
        binding.state = PlaybackState::Error;
        binding.error = Some(error);
    }

    /// Hand `resource` to the output and subscribe to its status updates.
    pub fn attach(&self, generation: Generation, resource: &PlayableResource) -> Result<()> {
        {
            let binding = self.lock();
            if binding.generation != Some(generation) || binding.state != PlaybackState::Loading {
                return Err(PlaybackError::playback(format!(
                    "generation {generation} is not loading"
                )));
            }
        }

        if let Err(err) = self.output.attach(resource) {
            self.fail(generation, err.clone());
            return Err(err);
        }

        let weak = Arc::downgrade(&self.binding);
        self.output
            .set_status_listener(Some(status_listener(weak, generation)));

        let mut binding = self.lock();
        binding.state = PlaybackState::Ready;
        debug!(%generation, kind = ?resource.kind(), "resource attached");
        Ok(())
    }

    pub fn play(&self) {
        let state = self.state();
        if !matches!(state, PlaybackState::Ready | PlaybackState::Paused) {
            return;
        }
        match self.output.play() {
            Ok(()) => self.transition_from(state, PlaybackState::Playing),
            Err(err) => self.fail_attached(err),
        }
    }

    pub fn pause(&self) {
        if self.state() != PlaybackState::Playing {
            return;
        }
        match self.output.pause() {
            Ok(()) => self.transition_from(PlaybackState::Playing, PlaybackState::Paused),
            Err(err) => self.fail_attached(err),
        }
    }

    /// Flip `Playing <-> Paused`; no-op in every other state.
    pub fn toggle(&self) {
        match self.state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.play(),
            _ => {}
        }
    }

    /// Unsubscribe and unload. The caller disposes the resource afterwards.
    pub fn close(&self, generation: Generation) {
        self.output.set_status_listener(None);
        if self.state().has_resource() {
            self.output.detach();
        }
        let mut binding = self.lock();
        binding.generation = Some(generation);
        binding.state = PlaybackState::Closed;
        binding.error = None;
    }

    /// Unsubscribe and unload after a failure. The state stays `Error`.
    pub fn unload_failed(&self) {
        self.output.set_status_listener(None);
        self.output.detach();
    }

    fn transition_from(&self, from: PlaybackState, to: PlaybackState) {
        let mut binding = self.lock();
        if binding.state == from {
            binding.state = to;
        }
    }

    fn fail_attached(&self, error: PlaybackError) {
        warn!(%error, "audio output rejected command");
        self.output.detach();
        let mut binding = self.lock();
        binding.state = PlaybackState::Error;
        binding.error = Some(error);
    }
}

fn status_listener(binding: Weak<Mutex<Binding>>, generation: Generation) -> StatusListener {
    Box::new(move |event| {
        let Some(binding) = binding.upgrade() else {
            return;
        };
        let mut binding = binding.lock().unwrap_or_else(|e| e.into_inner());
        if binding.generation != Some(generation) || !binding.state.has_resource() {
            return;
        }
        match event {
            OutputEvent::Playing => binding.state = PlaybackState::Playing,
            OutputEvent::Paused | OutputEvent::Ended => binding.state = PlaybackState::Paused,
            OutputEvent::Failed(message) => {
                warn!(%generation, %message, "audio output failed");
                binding.state = PlaybackState::Error;
                binding.error = Some(PlaybackError::Playback(message));
            }
        }
    })
}
