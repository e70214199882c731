//! Browser audio output backed by a single hidden `<audio>` element.

use crate::error::{PlaybackError, Result};
use crate::playback::controller::{AudioOutput, OutputEvent, StatusListener};
use crate::playback::resource::PlayableResource;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlAudioElement};

const AUDIO_ELEMENT_ID: &str = "voicemail-audio";

/// Find the overlay's audio element, creating it on first use.
pub fn get_or_create_audio_element() -> Option<HtmlAudioElement> {
    let document = window()?.document()?;

    if let Some(existing) = document.get_element_by_id(AUDIO_ELEMENT_ID) {
        return existing.dyn_into::<HtmlAudioElement>().ok();
    }

    let audio: HtmlAudioElement = document.create_element("audio").ok()?.dyn_into().ok()?;
    audio.set_id(AUDIO_ELEMENT_ID);
    audio.set_attribute("preload", "auto").ok()?;
    document.body()?.append_child(&audio).ok()?;

    Some(audio)
}

type SharedListener = Rc<RefCell<Option<StatusListener>>>;

pub struct WebAudioOutput {
    audio: HtmlAudioElement,
    listener: SharedListener,
    // Bumped on every listener change so late play() rejections are dropped.
    epoch: Rc<Cell<u64>>,
    // Held so the element's handlers stay valid; dropped with the output.
    _handlers: Vec<Closure<dyn FnMut()>>,
}

impl WebAudioOutput {
    pub fn new() -> Result<Self> {
        let audio = get_or_create_audio_element()
            .ok_or_else(|| PlaybackError::playback("audio element unavailable"))?;
        let listener: SharedListener = Rc::new(RefCell::new(None));

        let on_play = event_handler(&listener, || OutputEvent::Playing);
        let on_pause = event_handler(&listener, || OutputEvent::Paused);
        let on_ended = event_handler(&listener, || OutputEvent::Ended);
        let error_audio = audio.clone();
        let on_error = event_handler(&listener, move || {
            OutputEvent::Failed(media_error_message(&error_audio))
        });

        audio.set_onplay(Some(on_play.as_ref().unchecked_ref()));
        audio.set_onpause(Some(on_pause.as_ref().unchecked_ref()));
        audio.set_onended(Some(on_ended.as_ref().unchecked_ref()));
        audio.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Ok(Self {
            audio,
            listener,
            epoch: Rc::new(Cell::new(0)),
            _handlers: vec![on_play, on_pause, on_ended, on_error],
        })
    }
}

fn event_handler(
    listener: &SharedListener,
    event: impl Fn() -> OutputEvent + 'static,
) -> Closure<dyn FnMut()> {
    let listener = listener.clone();
    Closure::wrap(Box::new(move || {
        if let Some(callback) = listener.borrow().as_ref() {
            callback(event());
        }
    }) as Box<dyn FnMut()>)
}

fn media_error_message(audio: &HtmlAudioElement) -> String {
    let audio_js = JsValue::from(audio.clone());
    js_sys::Reflect::get(&audio_js, &"error".into())
        .ok()
        .filter(|error| !error.is_null() && !error.is_undefined())
        .and_then(|error| js_sys::Reflect::get(&error, &"message".into()).ok())
        .and_then(|message| message.as_string())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| "the browser could not play this recording".to_string())
}

impl Drop for WebAudioOutput {
    fn drop(&mut self) {
        self.audio.set_onplay(None);
        self.audio.set_onpause(None);
        self.audio.set_onended(None);
        self.audio.set_onerror(None);
    }
}

impl AudioOutput for WebAudioOutput {
    fn attach(&self, resource: &PlayableResource) -> Result<()> {
        match resource {
            PlayableResource::ObjectUrl { url } => self.audio.set_src(url),
            PlayableResource::DataUri { uri } => self.audio.set_src(uri),
            PlayableResource::NativeFile { .. } => {
                return Err(PlaybackError::playback(
                    "the browser cannot open local files",
                ))
            }
        }
        self.audio.load();
        Ok(())
    }

    fn detach(&self) {
        let _ = self.audio.pause();
        let _ = self.audio.remove_attribute("src");
        self.audio.load();
    }

    fn play(&self) -> Result<()> {
        let promise = self
            .audio
            .play()
            .map_err(|err| PlaybackError::playback(format!("{err:?}")))?;
        let listener = self.listener.clone();
        let epoch = self.epoch.clone();
        let requested_in = epoch.get();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = wasm_bindgen_futures::JsFuture::from(promise).await {
                if epoch.get() != requested_in {
                    return;
                }
                if let Some(callback) = listener.borrow().as_ref() {
                    callback(OutputEvent::Failed(format!("play() rejected: {err:?}")));
                }
            }
        });
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.audio
            .pause()
            .map_err(|err| PlaybackError::playback(format!("{err:?}")))
    }

    fn is_playing(&self) -> bool {
        !self.audio.paused()
    }

    fn set_status_listener(&self, listener: Option<StatusListener>) {
        self.epoch.set(self.epoch.get().wrapping_add(1));
        *self.listener.borrow_mut() = listener;
    }
}
