//! Retrieval-to-playback pipeline for voicemail recordings.
//!
//! Selecting a voicemail fetches its recording (flipping it to read in the
//! same round trip), encodes the bytes, turns them into something the
//! platform audio player can open and hands that to the player. Exactly one
//! recording is live at a time; every superseded one is released.

pub mod api;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod playback;
pub mod utils;

pub use error::{PlaybackError, Result};
