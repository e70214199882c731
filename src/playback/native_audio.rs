//! Desktop audio output: a dedicated rodio thread driven over a command channel.

use crate::error::{PlaybackError, Result};
use crate::playback::controller::{AudioOutput, OutputEvent, StatusListener};
use crate::playback::resource::PlayableResource;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

enum OutputCommand {
    Load {
        path: PathBuf,
        reply: mpsc::Sender<Result<()>>,
    },
    Play {
        reply: mpsc::Sender<Result<()>>,
    },
    Pause,
    Stop,
    Shutdown,
}

type SharedListener = Arc<Mutex<Option<StatusListener>>>;

pub struct RodioOutput {
    commands: mpsc::Sender<OutputCommand>,
    playing: Arc<AtomicBool>,
    listener: SharedListener,
}

impl RodioOutput {
    /// Spawn the audio thread and open the default output device.
    pub fn new() -> Result<Self> {
        let (commands, rx) = mpsc::channel::<OutputCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let playing = Arc::new(AtomicBool::new(false));
        let listener: SharedListener = Arc::new(Mutex::new(None));

        let thread_playing = playing.clone();
        let thread_listener = listener.clone();
        thread::Builder::new()
            .name("voicemail-audio".to_string())
            .spawn(move || run_output_thread(rx, ready_tx, thread_playing, thread_listener))
            .map_err(|err| PlaybackError::playback(format!("failed to spawn audio thread: {err}")))?;

        ready_rx
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| PlaybackError::playback("audio thread did not start"))??;

        Ok(Self {
            commands,
            playing,
            listener,
        })
    }

    fn send(&self, command: OutputCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::playback("audio thread has stopped"))
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(OutputCommand::Shutdown);
    }
}

fn emit(listener: &SharedListener, event: OutputEvent) {
    if let Some(callback) = listener.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        callback(event);
    }
}

/// What a play command does given the thread's current source.
#[derive(Debug, PartialEq, Eq)]
enum PlayAction<'a> {
    Resume,
    /// The last sink drained or was dropped; decode the file again.
    Reopen(&'a Path),
    NothingLoaded,
}

fn play_action<'a>(loaded: Option<&'a Path>, sink_drained: Option<bool>) -> PlayAction<'a> {
    match (loaded, sink_drained) {
        (None, _) => PlayAction::NothingLoaded,
        (Some(_), Some(false)) => PlayAction::Resume,
        (Some(path), _) => PlayAction::Reopen(path),
    }
}

fn run_output_thread(
    rx: mpsc::Receiver<OutputCommand>,
    ready: mpsc::Sender<Result<()>>,
    playing: Arc<AtomicBool>,
    listener: SharedListener,
) {
    // The stream must outlive every sink created from its handle.
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to open audio output");
            let _ = ready.send(Err(PlaybackError::playback(format!(
                "no audio output device: {err}"
            ))));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut sink: Option<Sink> = None;
    let mut loaded: Option<PathBuf> = None;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(OutputCommand::Load { path, reply }) => {
                if let Some(previous) = sink.take() {
                    previous.stop();
                }
                playing.store(false, Ordering::SeqCst);
                loaded = None;
                match open_sink(&handle, &path) {
                    Ok(new_sink) => {
                        debug!(path = %path.display(), "recording loaded");
                        sink = Some(new_sink);
                        loaded = Some(path);
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Ok(OutputCommand::Play { reply }) => {
                let drained = sink.as_ref().map(Sink::empty);
                let result = match play_action(loaded.as_deref(), drained) {
                    PlayAction::Resume => Ok(()),
                    PlayAction::Reopen(path) => {
                        debug!(path = %path.display(), "restarting drained recording");
                        open_sink(&handle, path).map(|reopened| {
                            sink = Some(reopened);
                        })
                    }
                    PlayAction::NothingLoaded => {
                        Err(PlaybackError::playback("no recording is loaded"))
                    }
                };
                if result.is_ok() {
                    if let Some(sink) = &sink {
                        sink.play();
                    }
                    playing.store(true, Ordering::SeqCst);
                }
                let _ = reply.send(result);
            }
            Ok(OutputCommand::Pause) => {
                if let Some(sink) = &sink {
                    sink.pause();
                }
                playing.store(false, Ordering::SeqCst);
            }
            Ok(OutputCommand::Stop) => {
                if let Some(previous) = sink.take() {
                    previous.stop();
                }
                loaded = None;
                playing.store(false, Ordering::SeqCst);
            }
            Ok(OutputCommand::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let finished = sink.as_ref().map(Sink::empty).unwrap_or(false);
        if finished && playing.swap(false, Ordering::SeqCst) {
            // `loaded` survives so the next play restarts from the top.
            sink = None;
            emit(&listener, OutputEvent::Ended);
        }
    }
}

fn open_sink(handle: &rodio::OutputStreamHandle, path: &Path) -> Result<Sink> {
    let file = File::open(path)
        .map_err(|err| PlaybackError::playback(format!("cannot open {}: {err}", path.display())))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|err| PlaybackError::playback(format!("unsupported audio: {err}")))?;
    let sink = Sink::try_new(handle)
        .map_err(|err| PlaybackError::playback(format!("audio sink unavailable: {err}")))?;
    sink.pause();
    sink.append(source);
    Ok(sink)
}

impl AudioOutput for RodioOutput {
    fn attach(&self, resource: &PlayableResource) -> Result<()> {
        let Some(path) = resource.file_path() else {
            return Err(PlaybackError::playback(
                "native output only plays local files",
            ));
        };
        let (reply, response) = mpsc::channel();
        self.send(OutputCommand::Load {
            path: path.to_path_buf(),
            reply,
        })?;
        response
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| PlaybackError::playback("audio thread did not answer"))?
    }

    fn detach(&self) {
        if let Err(err) = self.send(OutputCommand::Stop) {
            warn!(%err, "failed to stop audio output");
        }
    }

    fn play(&self) -> Result<()> {
        let (reply, response) = mpsc::channel();
        self.send(OutputCommand::Play { reply })?;
        response
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| PlaybackError::playback("audio thread did not answer"))?
    }

    fn pause(&self) -> Result<()> {
        self.send(OutputCommand::Pause)?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn set_status_listener(&self, listener: Option<StatusListener>) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = listener;
    }
}
