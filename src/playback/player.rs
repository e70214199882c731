//! The playback overlay's engine: one `VoicemailPlayer` owns the current
//! `PlaybackSession` and wires retrieval, materialization and the controller.

use crate::api::{Voicemail, VoicemailService};
use crate::error::PlaybackError;
use crate::playback::controller::{AudioOutput, PlaybackController, PlaybackState};
use crate::playback::coordinator::{ReadListener, RetrievalCoordinator};
use crate::playback::materializer::{
    Generation, GenerationCounter, Materialized, ResourceMaterializer,
};
use crate::playback::resource::{PlayableResource, ResourceBackend};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// One voicemail's attached recording. Dropped only through disposal.
#[derive(Debug)]
struct PlaybackSession {
    generation: Generation,
    resource: PlayableResource,
}

/// What happened to a `select` call.
#[derive(Debug, PartialEq)]
pub enum SelectionOutcome {
    /// The recording is attached (and playing when autoplay is on).
    Attached { updated: Voicemail },
    /// Read state changed but nothing is playable.
    Unplayable {
        updated: Voicemail,
        error: PlaybackError,
    },
    /// The request never reached the service successfully; read state untouched.
    Failed { error: PlaybackError },
    /// A newer selection or a close won. `updated` is set when the network
    /// round trip had already succeeded.
    Superseded { updated: Option<Voicemail> },
}

impl SelectionOutcome {
    /// The voicemail to merge into the list, if read state changed.
    pub fn read_update(&self) -> Option<&Voicemail> {
        match self {
            Self::Attached { updated } | Self::Unplayable { updated, .. } => Some(updated),
            Self::Superseded { updated } => updated.as_ref(),
            Self::Failed { .. } => None,
        }
    }
}

/// Everything an overlay needs to render itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshot {
    pub state: PlaybackState,
    pub voicemail_id: Option<String>,
    pub is_playing: bool,
    pub show_spinner: bool,
    pub can_toggle: bool,
    pub error: Option<String>,
}

pub struct VoicemailPlayer<S, B, O: AudioOutput> {
    coordinator: RetrievalCoordinator<S>,
    materializer: ResourceMaterializer<B>,
    controller: PlaybackController<O>,
    generations: GenerationCounter,
    session: Mutex<Option<PlaybackSession>>,
    requested: Mutex<Option<String>>,
    autoplay: bool,
}

impl<S, B, O> VoicemailPlayer<S, B, O>
where
    S: VoicemailService,
    B: ResourceBackend,
    O: AudioOutput,
{
    pub fn new(service: S, backend: B, output: O) -> Self {
        Self {
            coordinator: RetrievalCoordinator::new(service),
            materializer: ResourceMaterializer::new(backend),
            controller: PlaybackController::new(output),
            generations: GenerationCounter::new(),
            session: Mutex::new(None),
            requested: Mutex::new(None),
            autoplay: true,
        }
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_read_listener(mut self, listener: ReadListener) -> Self {
        self.coordinator = self.coordinator.with_read_listener(listener);
        self
    }

    pub fn controller(&self) -> &PlaybackController<O> {
        &self.controller
    }

    pub fn materializer(&self) -> &ResourceMaterializer<B> {
        &self.materializer
    }

    pub fn coordinator(&self) -> &RetrievalCoordinator<S> {
        &self.coordinator
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn is_playing(&self) -> bool {
        self.controller.is_playing()
    }

    /// The resource currently attached to the controller. Always `None` once
    /// a failure has been settled through `dispose_if_failed`.
    pub fn live_resource(&self) -> Option<PlayableResource> {
        self.lock_session()
            .as_ref()
            .map(|session| session.resource.clone())
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        let state = self.controller.state();
        let voicemail_id = self
            .requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        OverlaySnapshot {
            state,
            voicemail_id,
            is_playing: self.controller.is_playing(),
            show_spinner: state == PlaybackState::Loading,
            can_toggle: matches!(state, PlaybackState::Playing | PlaybackState::Paused),
            error: self
                .controller
                .last_error()
                .map(|err| err.user_message().to_string()),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<PlaybackSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retrieve, materialize and attach the recording for `voicemail`.
    ///
    /// Any current session is closed first; any older in-flight selection is
    /// cancelled and will discard whatever it produces.
    pub async fn select(&self, voicemail: &Voicemail) -> SelectionOutcome {
        let generation = self.generations.advance();
        info!(voicemail_id = %voicemail.id, %generation, "voicemail selected");

        self.release_session(generation).await;
        *self.requested.lock().unwrap_or_else(|e| e.into_inner()) = Some(voicemail.id.clone());
        self.controller.begin_loading(generation);

        let retrieval = match self.coordinator.retrieve_and_prepare(voicemail).await {
            Ok(retrieval) => retrieval,
            Err(error) => {
                if !self.generations.is_current(generation) {
                    return SelectionOutcome::Superseded { updated: None };
                }
                self.controller.fail(generation, error.clone());
                return SelectionOutcome::Failed { error };
            }
        };
        let updated = retrieval.updated;

        if !self.generations.is_current(generation) {
            debug!(%generation, "retrieval superseded, dropping payload");
            return SelectionOutcome::Superseded {
                updated: Some(updated),
            };
        }

        let payload = match retrieval.payload {
            Ok(payload) => payload,
            Err(error) => {
                self.controller.fail(generation, error.clone());
                return SelectionOutcome::Unplayable { updated, error };
            }
        };

        let resource = match self
            .materializer
            .materialize(None, Some(&payload), generation, &self.generations)
            .await
        {
            Materialized::Ready(resource) => resource,
            Materialized::Stale => {
                return SelectionOutcome::Superseded {
                    updated: Some(updated),
                }
            }
            Materialized::Empty => {
                let error = PlaybackError::resource("recording produced no playable data");
                self.controller.fail(generation, error.clone());
                return SelectionOutcome::Unplayable { updated, error };
            }
            Materialized::Failed(error) => {
                self.controller.fail(generation, error.clone());
                return SelectionOutcome::Unplayable { updated, error };
            }
        };

        match self.install(generation, resource) {
            Ok(()) => {}
            Err(Rejected::Stale(resource)) => {
                self.materializer.dispose(resource).await;
                return SelectionOutcome::Superseded {
                    updated: Some(updated),
                };
            }
            Err(Rejected::Output(resource, error)) => {
                self.materializer.dispose(resource).await;
                return SelectionOutcome::Unplayable { updated, error };
            }
        }

        if self.autoplay {
            self.controller.play();
            if self.dispose_if_failed().await {
                let error = self
                    .controller
                    .last_error()
                    .unwrap_or_else(|| PlaybackError::playback("playback failed to start"));
                return SelectionOutcome::Unplayable { updated, error };
            }
        }
        SelectionOutcome::Attached { updated }
    }

    /// Final generation check and attach, under the session lock so a
    /// concurrent `select` or `close` sees either no session or this one.
    fn install(
        &self,
        generation: Generation,
        resource: PlayableResource,
    ) -> Result<(), Rejected> {
        let mut session = self.lock_session();
        if !self.generations.is_current(generation) {
            return Err(Rejected::Stale(resource));
        }
        if let Err(error) = self.controller.attach(generation, &resource) {
            return Err(Rejected::Output(resource, error));
        }
        *session = Some(PlaybackSession {
            generation,
            resource,
        });
        Ok(())
    }

    pub async fn toggle(&self) {
        self.controller.toggle();
        self.dispose_if_failed().await;
    }

    pub async fn play(&self) {
        self.controller.play();
        self.dispose_if_failed().await;
    }

    pub async fn pause(&self) {
        self.controller.pause();
        self.dispose_if_failed().await;
    }

    /// Release the live session once the output has failed, so the `Error`
    /// state never holds a resource. Output failures reported through the
    /// status listener are settled the next time this runs.
    ///
    /// Returns whether a resource was disposed.
    pub async fn dispose_if_failed(&self) -> bool {
        let failed = {
            let mut session = self.lock_session();
            if self.controller.state() != PlaybackState::Error {
                return false;
            }
            session.take()
        };
        let Some(failed) = failed else {
            return false;
        };
        debug!(session = %failed.generation, "releasing failed session");
        self.controller.unload_failed();
        self.materializer.dispose(failed.resource).await;
        true
    }

    /// Dismiss the overlay: cancel in-flight work, unload, then dispose.
    pub async fn close(&self) {
        let generation = self.generations.advance();
        self.release_session(generation).await;
        self.controller.close(generation);
        *self.requested.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!(%generation, "playback overlay closed");
    }

    /// Detach the live session (if any) and dispose its resource, in that order.
    async fn release_session(&self, generation: Generation) {
        let previous = self.lock_session().take();
        let Some(previous) = previous else {
            return;
        };
        debug!(session = %previous.generation, "releasing session");
        self.controller.close(generation);
        self.materializer.dispose(previous.resource).await;
    }
}

enum Rejected {
    Stale(PlayableResource),
    Output(PlayableResource, PlaybackError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::playback::controller::tests::FakeOutput;
    use crate::playback::controller::OutputEvent;
    use crate::playback::resource::Platform;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::path::{Path, PathBuf};

    struct StaticService(Result<Vec<u8>>);

    #[async_trait]
    impl VoicemailService for StaticService {
        async fn list_voicemails(&self) -> Result<Vec<Voicemail>> {
            Ok(Vec::new())
        }

        async fn mark_read_and_fetch_recording(&self, _voicemail: &Voicemail) -> Result<Vec<u8>> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct MemoryFiles {
        live: Mutex<Vec<PathBuf>>,
        next: Mutex<usize>,
    }

    #[async_trait]
    impl ResourceBackend for MemoryFiles {
        fn platform(&self) -> Platform {
            Platform::Native
        }

        async fn write(&self, _bytes: &[u8], extension: &str) -> Result<PathBuf> {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            let path = PathBuf::from(format!("/tmp/vm_{next}.{extension}"));
            self.live.lock().unwrap().push(path.clone());
            Ok(path)
        }

        async fn delete(&self, path: &Path) -> Result<()> {
            self.live.lock().unwrap().retain(|live| live != path);
            Ok(())
        }

        async fn create_url(&self, _bytes: &[u8], _mime: &str) -> Result<String> {
            Err(PlaybackError::resource("no urls"))
        }

        async fn revoke_url(&self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    fn voicemail(id: &str) -> Voicemail {
        Voicemail {
            id: id.to_string(),
            number: "+15551234567".to_string(),
            name: "Alice".to_string(),
            description: "Call me back".to_string(),
            spam: false,
            date: Utc.with_ymd_and_hms(2025, 10, 19, 9, 0, 0).unwrap(),
            unread: true,
            recording: Some(format!("{id}.wav")),
        }
    }

    fn player(
        response: Result<Vec<u8>>,
    ) -> VoicemailPlayer<StaticService, MemoryFiles, FakeOutput> {
        VoicemailPlayer::new(
            StaticService(response),
            MemoryFiles::default(),
            FakeOutput::default(),
        )
    }

    #[tokio::test]
    async fn select_attaches_and_autoplays() {
        let player = player(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec()));

        let outcome = player.select(&voicemail("1")).await;

        assert!(matches!(outcome, SelectionOutcome::Attached { ref updated } if !updated.unread));
        assert_eq!(player.state(), PlaybackState::Playing);
        let snapshot = player.snapshot();
        assert!(snapshot.can_toggle);
        assert!(!snapshot.show_spinner);
        assert_eq!(snapshot.voicemail_id.as_deref(), Some("1"));
        assert_eq!(player.materializer().backend().live.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reselect_disposes_previous_file() {
        let player = player(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec()));

        player.select(&voicemail("1")).await;
        player.select(&voicemail("2")).await;

        let live = player.materializer().backend().live.lock().unwrap().clone();
        assert_eq!(live, vec![PathBuf::from("/tmp/vm_2.wav")]);
        assert_eq!(
            player.live_resource().and_then(|r| r.file_path().map(Path::to_path_buf)),
            Some(PathBuf::from("/tmp/vm_2.wav"))
        );
        assert_eq!(player.snapshot().voicemail_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn network_failure_reports_error_without_read_update() {
        let player = player(Err(PlaybackError::network("connection refused")));

        let outcome = player.select(&voicemail("3")).await;

        assert!(outcome.read_update().is_none());
        assert_eq!(player.state(), PlaybackState::Error);
        let snapshot = player.snapshot();
        assert!(!snapshot.can_toggle);
        assert!(snapshot.error.is_some());
        assert!(player.live_resource().is_none());
    }

    #[tokio::test]
    async fn empty_recording_is_unplayable_but_read() {
        let player = player(Ok(Vec::new()));

        let outcome = player.select(&voicemail("4")).await;

        assert!(matches!(outcome, SelectionOutcome::Unplayable { .. }));
        assert!(!outcome.read_update().unwrap().unread);
        assert_eq!(player.state(), PlaybackState::Error);
    }

    #[tokio::test]
    async fn close_unloads_then_disposes() {
        let player = player(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec()));
        player.select(&voicemail("1")).await;

        player.close().await;

        assert_eq!(player.state(), PlaybackState::Closed);
        assert!(player.live_resource().is_none());
        assert!(player.materializer().backend().live.lock().unwrap().is_empty());
        assert_eq!(player.controller().output().calls().last().unwrap(), "detach");
        assert!(player.snapshot().voicemail_id.is_none());
    }

    #[tokio::test]
    async fn autoplay_off_leaves_ready() {
        let player = player(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec())).with_autoplay(false);

        player.select(&voicemail("1")).await;
        assert_eq!(player.state(), PlaybackState::Ready);
        assert!(!player.snapshot().can_toggle);

        player.play().await;
        assert_eq!(player.state(), PlaybackState::Playing);
        player.toggle().await;
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn rejected_autoplay_disposes_the_resource() {
        let player = VoicemailPlayer::new(
            StaticService(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec())),
            MemoryFiles::default(),
            FakeOutput {
                reject_play: true,
                ..FakeOutput::default()
            },
        );

        let outcome = player.select(&voicemail("1")).await;

        match outcome {
            SelectionOutcome::Unplayable { ref updated, ref error } => {
                assert!(!updated.unread);
                assert!(matches!(error, PlaybackError::Playback(_)));
            }
            other => panic!("expected unplayable, got {other:?}"),
        }
        assert_eq!(player.state(), PlaybackState::Error);
        assert!(player.live_resource().is_none());
        assert!(player.materializer().backend().live.lock().unwrap().is_empty());
        assert!(!player.controller().output().has_listener());
        assert_eq!(player.controller().output().calls().last().unwrap(), "detach");
        assert!(player.snapshot().error.is_some());
    }

    #[tokio::test]
    async fn output_failure_releases_the_session() {
        let player = player(Ok(b"RIFF\x24\x00\x00\x00WAVE".to_vec()));
        player.select(&voicemail("1")).await;
        assert_eq!(player.materializer().backend().live.lock().unwrap().len(), 1);

        player
            .controller()
            .output()
            .emit(OutputEvent::Failed("device unplugged".to_string()));
        assert_eq!(player.state(), PlaybackState::Error);

        assert!(player.dispose_if_failed().await);
        assert!(player.live_resource().is_none());
        assert!(player.materializer().backend().live.lock().unwrap().is_empty());
        assert!(!player.dispose_if_failed().await);

        player.toggle().await;
        assert_eq!(player.state(), PlaybackState::Error);
    }
}
