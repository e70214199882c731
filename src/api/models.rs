use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One voicemail as the voicemail service reports it.
///
/// The list screen owns the collection; the playback pipeline only ever
/// receives one value per request and hands back a copy with `unread`
/// flipped on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voicemail {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub spam: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub recording: Option<String>,
}

impl Voicemail {
    /// Copy of this voicemail with the unread flag cleared.
    pub fn marked_read(&self) -> Self {
        Self {
            unread: false,
            ..self.clone()
        }
    }
}

/// Body of `GET /voicemails`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VoicemailList {
    #[serde(default)]
    pub voicemails: Vec<Voicemail>,
    #[serde(default)]
    pub count: Option<usize>,
    /// The service answers 200 with only this field when its store is unavailable.
    #[serde(default)]
    pub error: Option<String>,
}

/// Merge an updated voicemail into `collection` by id.
/// Returns `true` when a matching entry was found and changed.
pub fn apply_read_update(collection: &mut [Voicemail], updated: &Voicemail) -> bool {
    let Some(entry) = collection.iter_mut().find(|entry| entry.id == updated.id) else {
        return false;
    };
    if *entry == *updated {
        return false;
    }
    entry.unread = updated.unread;
    true
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(text.trim().to_string()),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "voicemail id must be a string or integer, got {other}"
        ))),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognized voicemail timestamp: {raw}"))
    })
}

/// Parse RFC 3339 timestamps, falling back to naive ISO values taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}
