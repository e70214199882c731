//! Browser strategy: recordings become blob object URLs, revoked on disposal.

use crate::error::{PlaybackError, Result};
use crate::playback::resource::{Platform, ResourceBackend};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use web_sys::{Blob, BlobPropertyBag, Url};

#[derive(Debug, Clone, Copy, Default)]
pub struct WebBlobBackend;

impl WebBlobBackend {
    pub fn new() -> Self {
        Self
    }
}

fn js_error(context: &str, err: wasm_bindgen::JsValue) -> PlaybackError {
    PlaybackError::resource(format!("{context}: {err:?}"))
}

#[async_trait(?Send)]
impl ResourceBackend for WebBlobBackend {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    async fn write(&self, _bytes: &[u8], _extension: &str) -> Result<PathBuf> {
        Err(PlaybackError::resource(
            "file storage is not available in the browser",
        ))
    }

    async fn delete(&self, _path: &Path) -> Result<()> {
        Err(PlaybackError::resource(
            "file storage is not available in the browser",
        ))
    }

    async fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
        let options = BlobPropertyBag::new();
        options.set_type(mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| js_error("failed to create audio blob", e))?;
        let url = Url::create_object_url_with_blob(&blob)
            .map_err(|e| js_error("failed to create object URL", e))?;
        debug!(%url, len = bytes.len(), "created object URL");
        Ok(url)
    }

    async fn revoke_url(&self, url: &str) -> Result<()> {
        Url::revoke_object_url(url).map_err(|e| js_error("failed to revoke object URL", e))
    }
}
