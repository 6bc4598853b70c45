//! Read-only views of stored client memory.

use anyhow::{Context, Result};
use colored::Colorize;
use memoir_core::MemoryStore;
use memoir_core::types::{SessionRecord, ThemeEntry, ThemeStatus};
use serde::Serialize;

use super::client_id;
use crate::cli::{ShowAction, ShowCommand};
use crate::config::Config;

/// Execute show command.
pub fn execute(cmd: ShowCommand, config: &Config) -> Result<()> {
    let store = config.store();

    match cmd.action {
        ShowAction::Profile { client, json } => {
            let client = client_id(&client)?;
            let profile = store.load_profile(&client).context("Failed to load profile")?;
            if json {
                return print_json(&profile);
            }

            println!("{} {}", "Profile".bold(), client.as_str().cyan());
            println!("  Updated: {}", profile.last_updated.format("%Y-%m-%d %H:%M"));
            if profile.is_empty() {
                println!("  {}", "(empty)".dimmed());
            }
            for (key, value) in &profile.facts {
                println!("  {}: {}", key.cyan(), value);
            }
            for fact in &profile.key_facts {
                println!("  • {}", fact);
            }
            if !profile.goals.is_empty() {
                println!("  {}", "Goals:".bold());
                for goal in &profile.goals {
                    println!("    • {}", goal);
                }
            }
            Ok(())
        }

        ShowAction::Themes { client, json } => {
            let client = client_id(&client)?;
            let doc = store.load_themes(&client).context("Failed to load themes")?;
            if json {
                return print_json(&doc);
            }

            let themes = store.load_theme_index(&client)?;
            if themes.is_empty() {
                println!("{} No themes recorded for {}", "⚠".yellow(), client);
            }
            for theme in &themes {
                print_theme(theme);
            }
            if !doc.progress_markers.is_empty() {
                println!();
                println!("{}", "Progress:".bold());
                for marker in &doc.progress_markers {
                    println!(
                        "  • [{}] {} (session {})",
                        marker.date, marker.milestone, marker.session_index
                    );
                }
            }
            Ok(())
        }

        ShowAction::Sessions { client, json } => {
            let client = client_id(&client)?;
            let sessions = store
                .load_session_index(&client)
                .context("Failed to load sessions")?;
            if json {
                return print_json(&sessions);
            }

            if sessions.is_empty() {
                println!("{} No sessions recorded for {}", "⚠".yellow(), client);
                return Ok(());
            }
            for session in &sessions {
                println!("  {} {}", format!("#{:03}", session.index).cyan(), session.summary);
            }
            Ok(())
        }

        ShowAction::Session { client, index, json } => {
            let client = client_id(&client)?;
            let record = store
                .load_session(&client, index)
                .with_context(|| format!("Failed to load session {index} for {client}"))?;
            if json {
                return print_json(&record);
            }
            print_session(&record);
            Ok(())
        }
    }
}

fn print_theme(theme: &ThemeEntry) {
    let status = match theme.status {
        ThemeStatus::Active => theme.status.as_str().yellow(),
        ThemeStatus::Resolved => theme.status.as_str().green(),
    };
    println!(
        "{} [{}] sessions {}-{}",
        theme.title.bold(),
        status,
        theme.first_seen,
        theme.last_updated
    );
    if !theme.description.is_empty() {
        println!("  {}", theme.description);
    }
    if let Some(notes) = &theme.notes {
        println!("  {} {}", "Notes:".dimmed(), notes);
    }
}

fn print_session(record: &SessionRecord) {
    let extraction = if record.extraction_succeeded {
        "extracted".green()
    } else {
        "extraction failed".red()
    };
    let started = record
        .started_at
        .map(|t| format!("{} - ", t.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    println!(
        "{} {} ({}{}, {})",
        "Session".bold(),
        record.index,
        started,
        record.ended_at.format("%Y-%m-%d %H:%M"),
        extraction
    );
    println!("  {}", record.summary);

    if !record.extracted_fact_keys.is_empty() {
        let keys: Vec<&str> = record.extracted_fact_keys.iter().map(String::as_str).collect();
        println!("  Facts: {}", keys.join(", "));
    }
    if !record.extracted_theme_titles.is_empty() {
        let titles: Vec<&str> = record.extracted_theme_titles.iter().map(String::as_str).collect();
        println!("  Themes: {}", titles.join(", "));
    }
    if let Some(focus) = &record.next_session_focus {
        println!("  Next focus: {}", focus);
    }

    println!();
    for turn in &record.transcript {
        println!("  {} {}", format!("{}:", turn.role.as_str()).dimmed(), turn.text);
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
