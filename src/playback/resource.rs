use crate::error::Result;
use crate::utils::path_to_file_url;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Runtime family, which decides how a payload becomes playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Browser,
    Native,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Browser
        } else {
            Self::Native
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    NativeFile,
    ObjectUrl,
    DataUri,
}

/// Something the platform audio player can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableResource {
    NativeFile { path: PathBuf },
    ObjectUrl { url: String },
    DataUri { uri: String },
}

impl PlayableResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::NativeFile { .. } => ResourceKind::NativeFile,
            Self::ObjectUrl { .. } => ResourceKind::ObjectUrl,
            Self::DataUri { .. } => ResourceKind::DataUri,
        }
    }

    /// Data URIs live only as long as the string does; nothing to release.
    pub fn needs_disposal(&self) -> bool {
        !matches!(self, Self::DataUri { .. })
    }

    /// URI form handed to players that want a `src`.
    pub fn source_uri(&self) -> String {
        match self {
            Self::NativeFile { path } => path_to_file_url(path),
            Self::ObjectUrl { url } => url.clone(),
            Self::DataUri { uri } => uri.clone(),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::NativeFile { path } => Some(path),
            _ => None,
        }
    }
}

/// Platform capability set used to create and release playable resources.
///
/// Native backends implement the file half, browser backends the URL half;
/// the other half reports `ResourceCreation` errors.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait ResourceBackend {
    fn platform(&self) -> Platform;

    /// Write `bytes` to a fresh, uniquely named file and return its path.
    async fn write(&self, bytes: &[u8], extension: &str) -> Result<PathBuf>;

    async fn delete(&self, path: &Path) -> Result<()>;

    /// Wrap `bytes` as a blob of type `mime` and return an object URL for it.
    async fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String>;

    async fn revoke_url(&self, url: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_data_uris_skip_disposal() {
        let file = PlayableResource::NativeFile {
            path: PathBuf::from("/tmp/a.wav"),
        };
        let url = PlayableResource::ObjectUrl {
            url: "blob:http://localhost/1".to_string(),
        };
        let data = PlayableResource::DataUri {
            uri: "data:audio/wav;base64,UklGRg==".to_string(),
        };
        assert!(file.needs_disposal());
        assert!(url.needs_disposal());
        assert!(!data.needs_disposal());
        assert_eq!(file.source_uri(), "file:///tmp/a.wav");
        assert_eq!(url.kind(), ResourceKind::ObjectUrl);
    }

    #[test]
    fn native_is_detected_off_wasm() {
        assert_eq!(Platform::detect(), Platform::Native);
    }
}
