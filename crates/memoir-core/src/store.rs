//! Memory Store Implementation
//!
//! File-backed storage, one directory per client:
//!
//! ```text
//! <root>/<client_id>/profile.json
//! <root>/<client_id>/themes.json
//! <root>/<client_id>/sessions/session_001.json
//! ```
//!
//! Every write goes to a temp file in the target directory, is fsynced, and
//! is then renamed over the target, so a crash never leaves a half-written
//! document behind. Missing profile/theme documents mean "new client".
//! Documents that fail to parse are reported as `CorruptState`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{
    ClientId, NewSession, Profile, SessionRecord, SessionSummary, ThemeDocument, ThemeEntry,
};

const PROFILE_FILE: &str = "profile.json";
const THEMES_FILE: &str = "themes.json";
const SESSIONS_DIR: &str = "sessions";
const SESSION_PREFIX: &str = "session_";
const SESSION_SUFFIX: &str = ".json";

/// Core trait for memory storage operations.
///
/// Implementations own the persisted representation of each client. Every
/// operation is scoped to one `ClientId`; nothing is shared across clients.
pub trait MemoryStore: Send + Sync {
    /// Load the profile, or an empty one for a new client.
    fn load_profile(&self, client: &ClientId) -> Result<Profile>;

    /// Atomically replace the profile document.
    fn save_profile(&self, client: &ClientId, profile: &Profile) -> Result<()>;

    /// Load the full theme document (themes + progress markers).
    fn load_themes(&self, client: &ClientId) -> Result<ThemeDocument>;

    /// Atomically replace the theme document.
    fn save_themes(&self, client: &ClientId, themes: &ThemeDocument) -> Result<()>;

    /// Themes ordered by `last_updated` descending.
    fn load_theme_index(&self, client: &ClientId) -> Result<Vec<ThemeEntry>> {
        let mut themes = self.load_themes(client)?.themes;
        themes.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(themes)
    }

    /// `{index, summary}` for every session, ascending by index.
    fn load_session_index(&self, client: &ClientId) -> Result<Vec<SessionSummary>>;

    /// Load one full session record.
    fn load_session(&self, client: &ClientId, index: u32) -> Result<SessionRecord>;

    /// Index the next appended session will receive.
    fn next_session_index(&self, client: &ClientId) -> Result<u32>;

    /// Append a session, assigning the next gap-free index.
    fn append_session(&self, client: &ClientId, session: NewSession) -> Result<SessionRecord>;

    /// All clients with a memory directory.
    fn list_clients(&self) -> Result<Vec<ClientId>>;
}

/// JSON-document store rooted at a data directory
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    root: PathBuf,
}

impl FileMemoryStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn client_dir(&self, client: &ClientId) -> PathBuf {
        self.root.join(client.as_str())
    }

    fn sessions_dir(&self, client: &ClientId) -> PathBuf {
        self.client_dir(client).join(SESSIONS_DIR)
    }

    fn session_path(&self, client: &ClientId, index: u32) -> PathBuf {
        self.sessions_dir(client).join(session_file_name(index))
    }

    /// Session indices present on disk, ascending and checked for gaps.
    fn session_indices(&self, client: &ClientId) -> Result<Vec<u32>> {
        let dir = self.sessions_dir(client);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_session_file_name) {
                indices.push(index);
            }
        }
        indices.sort_unstable();

        for (position, index) in indices.iter().enumerate() {
            let expected = position as u32 + 1;
            if *index != expected {
                return Err(Error::corrupt(
                    client,
                    format!("session numbering gap: expected session {expected}, found {index}"),
                ));
            }
        }

        Ok(indices)
    }

    fn read_document<T: DeserializeOwned>(&self, client: &ClientId, path: &Path) -> Result<Option<T>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::corrupt(client, format!("{}: {}", display_name(path), e)))
    }

    fn stage_document<T: Serialize>(dir: &Path, value: &T) -> Result<NamedTempFile> {
        fs::create_dir_all(dir)?;
        let mut tmp = Builder::new().prefix(".").suffix(".tmp").tempfile_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
        tmp.as_file_mut().write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    /// Write-to-temp-then-rename over `path`.
    fn write_document<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let tmp = Self::stage_document(dir, value)?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }
}

impl MemoryStore for FileMemoryStore {
    fn load_profile(&self, client: &ClientId) -> Result<Profile> {
        let path = self.client_dir(client).join(PROFILE_FILE);
        let profile: Option<Profile> = self.read_document(client, &path)?;

        match profile {
            Some(profile) if profile.client_id != *client => Err(Error::corrupt(
                client,
                format!("{PROFILE_FILE} belongs to client {}", profile.client_id),
            )),
            Some(profile) => Ok(profile),
            None => Ok(Profile::empty(client.clone())),
        }
    }

    fn save_profile(&self, client: &ClientId, profile: &Profile) -> Result<()> {
        if profile.client_id != *client {
            return Err(Error::invalid_state(format!(
                "profile for {} cannot be saved under {}",
                profile.client_id, client
            )));
        }
        self.write_document(&self.client_dir(client).join(PROFILE_FILE), profile)
    }

    fn load_themes(&self, client: &ClientId) -> Result<ThemeDocument> {
        let path = self.client_dir(client).join(THEMES_FILE);
        Ok(self.read_document(client, &path)?.unwrap_or_default())
    }

    fn save_themes(&self, client: &ClientId, themes: &ThemeDocument) -> Result<()> {
        self.write_document(&self.client_dir(client).join(THEMES_FILE), themes)
    }

    fn load_session_index(&self, client: &ClientId) -> Result<Vec<SessionSummary>> {
        self.session_indices(client)?
            .into_iter()
            .map(|index| {
                self.load_session(client, index).map(|record| SessionSummary {
                    index: record.index,
                    summary: record.summary,
                })
            })
            .collect()
    }

    fn load_session(&self, client: &ClientId, index: u32) -> Result<SessionRecord> {
        let path = self.session_path(client, index);
        let record: SessionRecord = self
            .read_document(client, &path)?
            .ok_or_else(|| Error::not_found("Session", format!("{client}/{index}")))?;

        if record.index != index {
            return Err(Error::corrupt(
                client,
                format!("{} records index {}", display_name(&path), record.index),
            ));
        }
        Ok(record)
    }

    fn next_session_index(&self, client: &ClientId) -> Result<u32> {
        Ok(self.session_indices(client)?.last().copied().unwrap_or(0) + 1)
    }

    fn append_session(&self, client: &ClientId, session: NewSession) -> Result<SessionRecord> {
        let index = self.next_session_index(client)?;
        let record = SessionRecord {
            index,
            started_at: session.started_at,
            ended_at: Utc::now(),
            transcript: session.transcript,
            summary: session.summary,
            extracted_fact_keys: session.extracted_fact_keys,
            extracted_theme_titles: session.extracted_theme_titles,
            extraction_succeeded: session.extraction_succeeded,
            important_moments: session.important_moments,
            next_session_focus: session.next_session_focus,
        };

        let path = self.session_path(client, index);
        let tmp = Self::stage_document(&self.sessions_dir(client), &record)?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                Error::invalid_state(format!("session {index} for {client} already exists"))
            } else {
                Error::Io(e.error)
            }
        })?;

        info!(client = %client, index, "session appended");
        Ok(record)
    }

    fn list_clients(&self) -> Result<Vec<ClientId>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut clients = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(client) = entry.file_name().to_str().and_then(|n| ClientId::new(n).ok()) {
                clients.push(client);
            }
        }
        clients.sort();
        Ok(clients)
    }
}

/// `session_001.json`; wider than three digits past 999.
pub fn session_file_name(index: u32) -> String {
    format!("{SESSION_PREFIX}{index:03}{SESSION_SUFFIX}")
}

fn parse_session_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SESSION_PREFIX)?.strip_suffix(SESSION_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|index| *index > 0)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
