use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use crate::error::{PlaybackError, Result};
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

#[cfg(target_arch = "wasm32")]
use gloo_storage::{errors::StorageError, LocalStorage, Storage};

#[cfg(target_arch = "wasm32")]
const SETTINGS_KEY: &str = "voicemail_playback.player_settings";
#[cfg(not(target_arch = "wasm32"))]
const SETTINGS_ROW: &str = "player_settings";
#[cfg(not(target_arch = "wasm32"))]
const DATABASE_FILE: &str = "voicemail-playback.db";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Player settings stored between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cache_subdir")]
    pub cache_subdir: String,
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default = "default_true")]
    pub purge_cache_on_start: bool,
}

fn default_server_url() -> String {
    crate::api::DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_cache_subdir() -> String {
    "voicemail_audio".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_subdir: default_cache_subdir(),
            autoplay: true,
            purge_cache_on_start: true,
        }
    }
}

impl PlayerSettings {
    /// Trim stray slashes and pull out-of-range values back into bounds.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.server_url.trim().trim_end_matches('/');
        self.server_url = if trimmed.is_empty() {
            default_server_url()
        } else {
            trimmed.to_string()
        };
        self.request_timeout_secs = self
            .request_timeout_secs
            .clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS);
        if self.cache_subdir.trim().is_empty() {
            self.cache_subdir = default_cache_subdir();
        }
        self
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.request_timeout_secs
                .clamp(MIN_REQUEST_TIMEOUT_SECS, MAX_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Key/value settings table in a SQLite file.
#[cfg(not(target_arch = "wasm32"))]
pub struct SettingsStore {
    conn: rusqlite::Connection,
}

#[cfg(not(target_arch = "wasm32"))]
impl SettingsStore {
    /// Open (or create) the database at `path` and make sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlaybackError::storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| PlaybackError::storage(format!("failed to open database: {e}")))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Stored settings, or defaults when nothing has been saved yet.
    pub fn load(&self) -> Result<PlayerSettings> {
        let result: std::result::Result<String, rusqlite::Error> = self.conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [SETTINGS_ROW],
            |row: &rusqlite::Row| row.get(0),
        );

        match result {
            Ok(json) => serde_json::from_str::<PlayerSettings>(&json)
                .map(PlayerSettings::normalized)
                .map_err(|e| PlaybackError::storage(format!("corrupt settings: {e}"))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(PlayerSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, settings: &PlayerSettings) -> Result<()> {
        let settings_json = serde_json::to_string(&settings.clone().normalized())
            .map_err(|e| PlaybackError::storage(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            [SETTINGS_ROW, settings_json.as_str()],
        )?;
        Ok(())
    }
}

/// `<platform data dir>/voicemail-playback/voicemail-playback.db`.
#[cfg(not(target_arch = "wasm32"))]
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::playback::native_files::APP_CACHE_DIR)
        .join(DATABASE_FILE)
}

#[cfg(not(target_arch = "wasm32"))]
fn get_db_connection() -> Result<SettingsStore> {
    SettingsStore::open(default_database_path())
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn initialize_database() -> Result<()> {
    get_db_connection().map(|_| ())
}

#[cfg(target_arch = "wasm32")]
pub async fn initialize_database() -> Result<(), StorageError> {
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_settings() -> Result<PlayerSettings> {
    get_db_connection()?.load()
}

#[cfg(target_arch = "wasm32")]
pub async fn load_settings() -> Result<PlayerSettings, StorageError> {
    match LocalStorage::get::<PlayerSettings>(SETTINGS_KEY) {
        Ok(settings) => Ok(settings.normalized()),
        Err(_) => Ok(PlayerSettings::default()),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn save_settings(settings: PlayerSettings) -> Result<()> {
    get_db_connection()?.save(&settings)
}

#[cfg(target_arch = "wasm32")]
pub async fn save_settings(settings: PlayerSettings) -> Result<(), StorageError> {
    LocalStorage::set(SETTINGS_KEY, settings.normalized())
}
