pub mod models;
pub mod voicemail_service;

pub use models::*;
pub use voicemail_service::*;
