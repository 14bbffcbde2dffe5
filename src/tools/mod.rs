mod journal;
mod options;
mod reflect;
mod triggers;

use anyhow::Result;

use crate::types::{Memory, Reflection, Tone, Trigger};

fn parse_tone(tone: &str) -> Result<Tone> {
    Tone::from_str(tone)
        .ok_or_else(|| anyhow::anyhow!("invalid tone '{}'. use: therapeutic, inspirational", tone))
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn format_memory(memory: &Memory) -> String {
    format!(
        "[{}] ({}, {} words) {}\n  id: {}",
        memory.date.format("%Y-%m-%d"),
        memory.mood.map(|m| m.as_str()).unwrap_or("-"),
        memory.word_count,
        preview(&memory.text, 200),
        memory.id,
    )
}

fn format_reflection(reflection: &Reflection) -> String {
    format!(
        "[{} {}, {}] {}\n  id: {} (seed memory: {})",
        reflection.tier.as_str(),
        reflection.period,
        reflection.tone.as_str(),
        preview(&reflection.narrative, 300),
        reflection.id,
        reflection.seed_memory_id,
    )
}

fn format_trigger(trigger: &Trigger) -> String {
    format!(
        "[{}] {} (since {})",
        trigger.tier().as_str(),
        trigger.period,
        trigger.trigger_date.format("%Y-%m-%d"),
    )
}

/// Wednesday of week 11, 2024
#[cfg(test)]
pub(crate) fn test_today() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()
}

#[cfg(test)]
pub(crate) fn test_server() -> (
    crate::server::ReflectionServer,
    std::sync::Arc<crate::store::SqliteStore>,
    std::sync::Arc<crate::engine::testing::ScriptedNarrator>,
) {
    let (engine, store, narrator) = crate::engine::testing::engine();
    let server = crate::server::ReflectionServer {
        engine,
        user_id: "u1".into(),
        today: Some(test_today()),
    };
    (server, store, narrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn tone_parse_reports_choices() {
        assert_eq!(parse_tone("Inspirational").unwrap(), Tone::Inspirational);
        let err = parse_tone("cheerful").unwrap_err().to_string();
        assert!(err.contains("therapeutic, inspirational"));
    }
}
