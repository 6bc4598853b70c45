//! Session finalization from a transcript file.
//!
//! Not wrapped in an operation timeout: cancelling mid-way could drop the
//! session record. The reasoning client's own request timeout still applies.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use colored::Colorize;
use memoir_core::types::{FinalizationReport, Turn};
use memoir_core::{ActiveSession, MemoryManager};
use serde::Deserialize;
use std::path::Path;

use super::{client_id, manager};
use crate::commands::show::print_json;
use crate::config::Config;

/// Accepted transcript file shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Turns(Vec<Turn>),
    Wrapped {
        transcript: Vec<Turn>,
        #[serde(default)]
        started_at: Option<DateTime<Utc>>,
    },
}

/// A transcript read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub turns: Vec<Turn>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Execute finalize command.
pub async fn execute(client: &str, transcript: &Path, json: bool, config: &Config) -> Result<()> {
    let transcript = read_transcript(transcript)?;
    let manager = manager(config)?;
    let report = finalize(&manager, client, transcript).await?;

    if json {
        return print_json(&report);
    }

    let status = if report.extraction_succeeded {
        "✓".green()
    } else {
        "⚠".yellow()
    };
    println!("{} Session {} saved", status, report.session_index);
    println!("  Summary: {}", report.summary);
    println!("  Messages: {}", report.message_count);
    if !report.extraction_succeeded {
        println!("  {}", "Extraction failed; profile and themes unchanged".yellow());
    }
    for fact in &report.new_facts {
        println!("  {} {}: {}", "fact".cyan(), fact.key, fact.value);
    }
    for theme in &report.updated_themes {
        println!("  {} {} [{}]", "theme".cyan(), theme.title, theme.status);
    }
    Ok(())
}

pub async fn finalize(
    manager: &MemoryManager,
    client: &str,
    transcript: Transcript,
) -> Result<FinalizationReport> {
    let client = client_id(client)?;
    let mut session = ActiveSession::from_transcript(client.clone(), transcript.turns);
    if let Some(started_at) = transcript.started_at {
        session = session.with_started_at(started_at);
    }
    manager
        .finalize_active(session)
        .await
        .with_context(|| format!("Failed to finalize session for {client}"))
}

/// Read a transcript: either a bare array of turns or
/// `{"transcript": [...], "started_at": "..."}`.
pub fn read_transcript(path: &Path) -> Result<Transcript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    let file: TranscriptFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse transcript {}", path.display()))?;

    let (turns, started_at) = match file {
        TranscriptFile::Turns(turns) => (turns, None),
        TranscriptFile::Wrapped { transcript, started_at } => (transcript, started_at),
    };
    if turns.is_empty() {
        bail!("Transcript {} has no turns", path.display());
    }
    Ok(Transcript { turns, started_at })
}
