//! Prompt rendering for the reasoning service and the conversation loop.

use std::fmt::Write;

use crate::types::{ContextBundle, MemoryIndex, Profile, Role, ThemeEntry, Turn};

pub const SELECTION_SYSTEM: &str =
    "You decide which past memories are relevant to the current conversation with a client.";

pub const EXTRACTION_SYSTEM: &str =
    "You review a finished conversation and extract what should be remembered about the client.";

/// Retrieval-selection prompt: message, profile summary and the compact index
pub fn retrieval_prompt(message: &str, profile_summary: &str, index: &MemoryIndex) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CURRENT USER MESSAGE:\n{message}\n");
    let _ = writeln!(out, "CLIENT PROFILE:\n{profile_summary}\n");

    out.push_str("AVAILABLE THEMES:\n");
    if index.themes.is_empty() {
        out.push_str("No themes recorded yet\n");
    }
    for theme in &index.themes {
        let _ = writeln!(out, "- {} [{}]: {}", theme.title, theme.status, theme.description);
    }

    out.push_str("\nAVAILABLE PAST SESSIONS:\n");
    if index.sessions.is_empty() {
        out.push_str("No previous sessions\n");
    }
    for session in &index.sessions {
        let _ = writeln!(out, "- session {}: {}", session.index, session.summary);
    }

    out.push_str(
        r#"
Return JSON with this structure:
{
  "relevant_themes": ["exact theme titles from the list above"],
  "relevant_sessions": [session numbers from the list above],
  "reasoning": "one sentence"
}
Only include what is truly relevant. Empty lists are fine."#,
    );
    out
}

/// Extraction prompt: transcript, current profile and known theme titles
pub fn extraction_prompt(transcript: &[Turn], profile: &Profile, themes: &[ThemeEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TRANSCRIPT:\n{}\n", format_transcript(transcript));

    out.push_str("KNOWN FACTS:\n");
    if profile.facts.is_empty() && profile.key_facts.is_empty() {
        out.push_str("None yet\n");
    }
    for (key, value) in &profile.facts {
        let _ = writeln!(out, "- {key}: {value}");
    }
    for fact in &profile.key_facts {
        let _ = writeln!(out, "- {fact}");
    }

    out.push_str("\nKNOWN THEMES:\n");
    if themes.is_empty() {
        out.push_str("None yet\n");
    }
    for theme in themes {
        let _ = writeln!(out, "- {} [{}]", theme.title, theme.status);
    }

    out.push_str(
        r#"
Return JSON with this structure:
{
  "facts": [{"key": "short_fact_name", "value": "fact value"}],
  "themes": [{
    "title": "reuse a known theme title when it is the same pattern",
    "description": "brief description of the pattern",
    "status": "active|resolved",
    "intensity": "high|medium|low",
    "notes": "specific details or triggers"
  }],
  "goals": ["goals the client stated"],
  "session_summary": "2-3 sentence summary",
  "important_moments": ["significant moments"],
  "progress_markers": ["signs of progress"],
  "next_session_focus": "what to follow up on"
}
Mark a theme resolved only when the conversation says so."#,
    );
    out
}

/// Short profile line for retrieval decisions
pub fn profile_summary(profile: &Profile, max_facts: usize) -> String {
    if profile.is_empty() {
        return "New client, no profile yet".to_string();
    }

    let mut parts = Vec::new();
    if !profile.facts.is_empty() || !profile.key_facts.is_empty() {
        let facts: Vec<String> = profile
            .facts
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .chain(profile.key_facts.iter().cloned())
            .take(max_facts)
            .collect();
        parts.push(facts.join(", "));
    }
    if !profile.goals.is_empty() {
        parts.push(format!("Goals: {}", profile.goals.join("; ")));
    }
    parts.join(" | ")
}

pub fn format_transcript(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => Some(format!("Client: {}", turn.text)),
            Role::Assistant => Some(format!("Assistant: {}", turn.text)),
            Role::System => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a context bundle as a prompt section for the conversation loop
pub fn render_context(bundle: &ContextBundle) -> String {
    let mut out = String::from("=== CLIENT PROFILE ===\n");
    let profile = &bundle.profile;

    if profile.is_empty() {
        out.push_str("New client, nothing recorded yet.\n");
    }
    for (key, value) in &profile.facts {
        let _ = writeln!(out, "- {key}: {value}");
    }
    for fact in &profile.key_facts {
        let _ = writeln!(out, "- {fact}");
    }
    if !profile.goals.is_empty() {
        out.push_str("\nCurrent Goals:\n");
        for goal in &profile.goals {
            let _ = writeln!(out, "• {goal}");
        }
    }

    if !bundle.selected_themes.is_empty() {
        out.push_str("\n=== RECURRING THEMES ===\n");
        for theme in &bundle.selected_themes {
            let _ = writeln!(out, "\n{} ({})", theme.title, theme.status);
            if !theme.description.is_empty() {
                let _ = writeln!(out, "  {}", theme.description);
            }
            if let Some(intensity) = theme.intensity {
                let _ = writeln!(out, "  Intensity: {}", intensity.as_str());
            }
            if let Some(notes) = &theme.notes {
                let _ = writeln!(out, "  Notes: {notes}");
            }
        }
    }

    if !bundle.progress_markers.is_empty() {
        out.push_str("\n=== PROGRESS MARKERS ===\n");
        for marker in &bundle.progress_markers {
            let _ = writeln!(out, "• [{}] {}", marker.date, marker.milestone);
        }
    }

    if !bundle.selected_sessions.is_empty() {
        out.push_str("\n=== RELEVANT PAST SESSIONS ===\n");
        for session in &bundle.selected_sessions {
            let _ = writeln!(
                out,
                "\nSession {} ({}):\n  {}",
                session.index,
                session.ended_at.format("%Y-%m-%d"),
                session.summary
            );
            if let Some(focus) = &session.next_session_focus {
                let _ = writeln!(out, "  Follow up: {focus}");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientId, SessionSummary, ThemeStatus};

    fn profile() -> Profile {
        let mut profile = Profile::empty(ClientId::new("c1").unwrap());
        profile.facts.insert("age".into(), "34".into());
        profile.facts.insert("job".into(), "nurse".into());
        profile.facts.insert("name".into(), "Alex".into());
        profile.facts.insert("pet".into(), "cat".into());
        profile
    }

    #[test]
    fn test_profile_summary_limits_facts() {
        let summary = profile_summary(&profile(), 2);
        assert_eq!(summary, "age: 34, job: nurse");

        let empty = Profile::empty(ClientId::new("c2").unwrap());
        assert_eq!(profile_summary(&empty, 3), "New client, no profile yet");
    }

    #[test]
    fn test_retrieval_prompt_lists_index() {
        let index = MemoryIndex {
            themes: vec![crate::types::ThemeSummary {
                title: "Sleep".into(),
                status: ThemeStatus::Active,
                description: "Trouble falling asleep".into(),
            }],
            sessions: vec![SessionSummary { index: 2, summary: "Night shifts".into() }],
        };

        let prompt = retrieval_prompt("I can't sleep again", "name: Alex", &index);
        assert!(prompt.contains("I can't sleep again"));
        assert!(prompt.contains("- Sleep [active]: Trouble falling asleep"));
        assert!(prompt.contains("- session 2: Night shifts"));
    }

    #[test]
    fn test_format_transcript_skips_system_turns() {
        let transcript = vec![
            Turn { role: Role::System, text: "setup".into() },
            Turn::assistant("How are you?"),
            Turn::user("Tired."),
        ];
        assert_eq!(format_transcript(&transcript), "Assistant: How are you?\n\nClient: Tired.");
    }

    #[test]
    fn test_unkeyed_facts_are_rendered() {
        let mut profile = Profile::empty(ClientId::new("c4").unwrap());
        profile.key_facts.push("Has a sister in Leeds".into());

        assert_eq!(profile_summary(&profile, 3), "Has a sister in Leeds");
        assert!(extraction_prompt(&[], &profile, &[]).contains("- Has a sister in Leeds"));
    }

    #[test]
    fn test_render_context_new_client() {
        let bundle = ContextBundle {
            profile: Profile::empty(ClientId::new("c3").unwrap()),
            selected_themes: vec![],
            selected_sessions: vec![],
            progress_markers: vec![],
        };
        let rendered = render_context(&bundle);
        assert!(rendered.contains("New client"));
        assert!(!rendered.contains("RECURRING THEMES"));
    }
}
