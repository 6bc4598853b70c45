//! Memory Type Definitions
//!
//! Defines the persisted documents (profile, themes, sessions), the derived
//! memory index, and the values exchanged with the conversation loop.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable client identifier; names the client's directory on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Maximum accepted identifier length
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a client identifier.
    ///
    /// Valid IDs are 1-128 characters of ASCII alphanumerics, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidClientId("client id cannot be empty".into()));
        }
        if id.len() > Self::MAX_LEN {
            return Err(Error::InvalidClientId(format!(
                "client id must be {} characters or less",
                Self::MAX_LEN
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::InvalidClientId(format!(
                "{id}: only letters, digits, '-' and '_' are allowed"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One transcript turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Client profile: key facts plus free-form goals.
///
/// Keys are unique as stored. Case-insensitive matching of new facts against
/// existing keys happens at merge time. Older profile documents name these
/// fields `basic_info` / `current_goals` and keep unkeyed facts in
/// `key_facts`; all three are read as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub client_id: ClientId,
    #[serde(default, alias = "basic_info", deserialize_with = "compat::string_map")]
    pub facts: BTreeMap<String, String>,
    /// Free-text facts without a key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_facts: Vec<String>,
    #[serde(default, alias = "current_goals")]
    pub goals: Vec<String>,
    #[serde(deserialize_with = "compat::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "compat::timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Profile {
    /// Empty profile for a first session
    pub fn empty(client_id: ClientId) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            facts: BTreeMap::new(),
            key_facts: Vec::new(),
            goals: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.key_facts.is_empty() && self.goals.is_empty()
    }

    /// Existing key matching `key` case-insensitively, if any
    pub fn matching_key(&self, key: &str) -> Option<&str> {
        let wanted = key.trim().to_lowercase();
        self.facts
            .keys()
            .find(|existing| existing.to_lowercase() == wanted)
            .map(String::as_str)
    }

    /// Case-insensitive fact lookup
    pub fn fact(&self, key: &str) -> Option<&str> {
        self.matching_key(key)
            .and_then(|k| self.facts.get(k))
            .map(String::as_str)
    }
}

/// Theme lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeStatus {
    #[default]
    Active,
    Resolved,
}

impl ThemeStatus {
    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ThemeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How strongly a theme showed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    #[serde(alias = "High")]
    High,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Low")]
    Low,
}

impl Intensity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A recurring pattern tracked across sessions.
///
/// Entries from older documents have a `name` and no status or session
/// indices; they load as active with `first_seen = last_updated = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeEntry {
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ThemeStatus,
    #[serde(default)]
    pub first_seen: u32,
    #[serde(default)]
    pub last_updated: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Intensity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A sign of progress noted during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMarker {
    pub milestone: String,
    /// YYYY-MM-DD
    pub date: String,
    #[serde(default)]
    pub session_index: u32,
}

/// The theme collection document (`themes.json`).
///
/// `themes` (or `recurring_themes` in older documents) is required so that a
/// document of some other shape is reported instead of read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeDocument {
    #[serde(alias = "recurring_themes")]
    pub themes: Vec<ThemeEntry>,
    #[serde(default)]
    pub progress_markers: Vec<ProgressMarker>,
}

/// A finalized session. Never edited after it is written.
///
/// Older documents identify the session as `session_id: "session_003"` and
/// list `extracted_facts` / `themes_discussed`; those are read into the same
/// fields. They carry no extraction flag and load as succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(alias = "session_id", deserialize_with = "compat::session_index")]
    pub index: u32,
    /// When the conversation started, if the caller tracked it
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "compat::optional_timestamp"
    )]
    pub started_at: Option<DateTime<Utc>>,
    /// When the session was persisted
    #[serde(alias = "recorded_at", deserialize_with = "compat::timestamp")]
    pub ended_at: DateTime<Utc>,
    pub transcript: Vec<Turn>,
    pub summary: String,
    #[serde(default, alias = "extracted_facts")]
    pub extracted_fact_keys: BTreeSet<String>,
    #[serde(default, alias = "themes_discussed")]
    pub extracted_theme_titles: BTreeSet<String>,
    #[serde(default = "compat::succeeded")]
    pub extraction_succeeded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub important_moments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_session_focus: Option<String>,
}

/// Everything needed to append a session; the store assigns index and `ended_at`.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub started_at: Option<DateTime<Utc>>,
    pub transcript: Vec<Turn>,
    pub summary: String,
    pub extracted_fact_keys: BTreeSet<String>,
    pub extracted_theme_titles: BTreeSet<String>,
    pub extraction_succeeded: bool,
    pub important_moments: Vec<String>,
    pub next_session_focus: Option<String>,
}

/// Session index entry: no transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub index: u32,
    pub summary: String,
}

/// Theme index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub title: String,
    pub status: ThemeStatus,
    pub description: String,
}

impl From<&ThemeEntry> for ThemeSummary {
    fn from(theme: &ThemeEntry) -> Self {
        Self {
            title: theme.title.clone(),
            status: theme.status,
            description: theme.description.clone(),
        }
    }
}

/// Compact, derived view of a client's memory used for relevance decisions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryIndex {
    pub themes: Vec<ThemeSummary>,
    pub sessions: Vec<SessionSummary>,
}

impl MemoryIndex {
    pub fn new(themes: &[ThemeEntry], sessions: Vec<SessionSummary>) -> Self {
        Self {
            themes: themes.iter().map(ThemeSummary::from).collect(),
            sessions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.sessions.is_empty()
    }

    /// Canonical spelling of a theme title, matched case-insensitively
    pub fn canonical_theme_title(&self, title: &str) -> Option<&str> {
        let wanted = title.trim().to_lowercase();
        self.themes
            .iter()
            .find(|t| t.title.to_lowercase() == wanted)
            .map(|t| t.title.as_str())
    }

    pub fn has_session(&self, index: u32) -> bool {
        self.sessions.iter().any(|s| s.index == index)
    }
}

/// Which parts of memory to expand for the current turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub theme_titles: BTreeSet<String>,
    pub session_indices: BTreeSet<u32>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.theme_titles.is_empty() && self.session_indices.is_empty()
    }
}

/// Memory assembled for one conversational turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub profile: Profile,
    pub selected_themes: Vec<ThemeEntry>,
    pub selected_sessions: Vec<SessionRecord>,
    pub progress_markers: Vec<ProgressMarker>,
}

/// A fact key/value proposed by extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactUpdate {
    pub key: String,
    pub value: String,
}

/// A theme proposed by extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeUpdate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<ThemeStatus>,
    #[serde(default)]
    pub intensity: Option<Intensity>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated extraction output for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub facts: Vec<FactUpdate>,
    pub themes: Vec<ThemeUpdate>,
    pub goals: Vec<String>,
    pub summary: String,
    pub progress_markers: Vec<String>,
    pub important_moments: Vec<String>,
    pub next_session_focus: Option<String>,
}

/// What `finalize_session` did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizationReport {
    pub session_index: u32,
    pub new_facts: Vec<FactUpdate>,
    pub updated_themes: Vec<ThemeEntry>,
    pub summary: String,
    pub extraction_succeeded: bool,
    pub message_count: usize,
}

/// Readers for older document shapes
mod compat {
    use std::collections::BTreeMap;

    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::{self, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;

    /// RFC 3339, or a naive ISO 8601 timestamp taken as UTC
    pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn optional_timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }

    /// `3` or `"session_003"`
    pub fn session_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| de::Error::custom(format!("invalid session index: {n}"))),
            Value::String(s) => s
                .strip_prefix("session_")
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| de::Error::custom(format!("invalid session id: {s}"))),
            other => Err(de::Error::custom(format!("invalid session index: {other}"))),
        }
    }

    /// Map of scalar values, numbers and booleans rendered as text
    pub fn string_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => return Err(de::Error::custom(format!("fact {key} is not a scalar: {other}"))),
                };
                Ok((key, text))
            })
            .collect()
    }

    pub fn succeeded() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_validation() {
        assert!(ClientId::new("client_1a2b3c4d").is_ok());
        assert!(ClientId::new("alex-r").is_ok());
        assert!(ClientId::new("").is_err());
        assert!(ClientId::new("../etc").is_err());
        assert!(ClientId::new("a/b").is_err());
        assert!(ClientId::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_theme_status_conversion() {
        assert_eq!(ThemeStatus::from_str("Resolved"), Some(ThemeStatus::Resolved));
        assert_eq!(ThemeStatus::from_str(" active "), Some(ThemeStatus::Active));
        assert_eq!(ThemeStatus::from_str("dormant"), None);
        assert_eq!(ThemeStatus::Active.as_str(), "active");
    }

    #[test]
    fn test_profile_case_insensitive_lookup() {
        let mut profile = Profile::empty(ClientId::new("c1").unwrap());
        profile.facts.insert("Name".into(), "Alex".into());

        assert_eq!(profile.matching_key("name"), Some("Name"));
        assert_eq!(profile.fact("NAME"), Some("Alex"));
        assert_eq!(profile.fact("age"), None);
    }

    #[test]
    fn test_turn_accepts_content_alias() {
        let turn: Turn = serde_json::from_str(r#"{"role": "user", "content": "hi"}"#).unwrap();
        assert_eq!(turn, Turn::user("hi"));
    }

    #[test]
    fn test_naive_timestamps_read_as_utc() {
        let parsed = compat::parse_timestamp("2025-03-01T09:15:02.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-01T09:15:02.123456+00:00");
        assert!(compat::parse_timestamp("2025-03-01T09:15:02Z").is_some());
        assert!(compat::parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_session_record_accepts_session_id() {
        let record: SessionRecord = serde_json::from_str(
            r#"{"session_id": "session_012", "ended_at": "2025-03-08T10:00:00", "transcript": [], "summary": "s"}"#,
        )
        .unwrap();
        assert_eq!(record.index, 12);
        assert!(record.started_at.is_none());

        let bad = r#"{"session_id": "latest", "ended_at": "2025-03-08T10:00:00", "transcript": [], "summary": "s"}"#;
        assert!(serde_json::from_str::<SessionRecord>(bad).is_err());
    }

    #[test]
    fn test_theme_document_requires_themes() {
        assert!(serde_json::from_str::<ThemeDocument>(r#"{"progress_markers": []}"#).is_err());
        let doc: ThemeDocument = serde_json::from_str(r#"{"recurring_themes": [{"name": "Grief"}]}"#).unwrap();
        assert_eq!(doc.themes[0].title, "Grief");
        assert_eq!(doc.themes[0].status, ThemeStatus::Active);
    }

    #[test]
    fn test_memory_index_lookup() {
        let themes = vec![ThemeEntry {
            title: "Anxiety".into(),
            description: "Work-related worry".into(),
            status: ThemeStatus::Active,
            first_seen: 1,
            last_updated: 2,
            intensity: None,
            notes: None,
        }];
        let index = MemoryIndex::new(&themes, vec![SessionSummary { index: 1, summary: "intro".into() }]);

        assert_eq!(index.canonical_theme_title("anxiety"), Some("Anxiety"));
        assert_eq!(index.canonical_theme_title("sleep"), None);
        assert!(index.has_session(1));
        assert!(!index.has_session(2));
        assert!(!index.is_empty());
    }
}
