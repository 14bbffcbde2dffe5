use anyhow::Result;
use chrono::{Datelike, NaiveDate};

use super::{format_memory, preview};
use crate::server::ReflectionServer;
use crate::types::Mood;
use crate::week;

impl ReflectionServer {
    pub fn do_remember(
        &self,
        text: &str,
        mood: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<String> {
        if text.trim().is_empty() {
            anyhow::bail!("entry is empty");
        }
        let mood = match mood {
            Some(m) => Some(Mood::from_str(m).ok_or_else(|| anyhow::anyhow!(
                "invalid mood '{}'. use: amazing, good, okay, bad, terrible", m
            ))?),
            None => None,
        };

        let today = self.today();
        let existed = self.engine.memory_for_date(&self.user_id, today)?.is_some();
        let memory = self
            .engine
            .record_memory(&self.user_id, today, today, text, mood, prompt)?;

        Ok(format!(
            "{} entry for {}: {} (id: {})",
            if existed { "Updated" } else { "Saved" },
            memory.date.format("%Y-%m-%d"),
            preview(&memory.text, 80),
            memory.id
        ))
    }

    pub fn do_week_memories(&self, week: Option<u32>, year: Option<i32>) -> Result<String> {
        let today = self.today();
        let (this_year, this_week) = week::week_containing(today)
            .unwrap_or((today.year(), week::week_number_of(today)));
        let year = year.unwrap_or(this_year);
        let week = week.unwrap_or(this_week);

        let memories = self.engine.get_week_memories(&self.user_id, week, year)?;
        if memories.is_empty() {
            return Ok(format!("No entries in week {} of {}.", week, year));
        }

        let lines: Vec<String> = memories.iter().map(format_memory).collect();
        Ok(format!(
            "{} entries in week {} of {}:\n\n{}",
            memories.len(),
            week,
            year,
            lines.join("\n\n")
        ))
    }

    pub fn do_month_memories(&self, month: u32, year: i32) -> Result<String> {
        let memories = self.engine.month_memories(&self.user_id, month, year)?;
        if memories.is_empty() {
            return Ok(format!("No entries in {}-{:02}.", year, month));
        }

        let lines: Vec<String> = memories.iter().map(format_memory).collect();
        Ok(format!(
            "{} entries in {}-{:02}:\n\n{}",
            memories.len(),
            year,
            month,
            lines.join("\n\n")
        ))
    }

    pub fn do_all_memories(&self) -> Result<String> {
        let memories = self.engine.all_memories(&self.user_id)?;
        if memories.is_empty() {
            return Ok("No entries yet.".into());
        }

        let lines: Vec<String> = memories.iter().map(format_memory).collect();
        Ok(format!("{} entries:\n\n{}", memories.len(), lines.join("\n\n")))
    }

    pub fn do_memory_dates(&self, month: u32, year: i32) -> Result<String> {
        let dates = self.engine.dates_with_memories(&self.user_id, month, year)?;
        if dates.is_empty() {
            return Ok(format!("No entries in {}-{:02}.", year, month));
        }

        let days: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
        Ok(days.join("\n"))
    }

    pub fn do_forget(&self, date: &str, reason: Option<&str>) -> Result<String> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("invalid date '{}'. use YYYY-MM-DD", date))?;

        match self.engine.delete_memory(&self.user_id, date)? {
            Some(memory) => {
                if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
                    tracing::info!(id = %memory.id, reason, "entry forgotten");
                }
                Ok(format!(
                    "Deleted entry for {}: {}",
                    memory.date.format("%Y-%m-%d"),
                    preview(&memory.text, 80)
                ))
            }
            None => Ok(format!("No entry found for {}.", date.format("%Y-%m-%d"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::d;
    use crate::store::MemoryStore;
    use crate::tools::test_server;

    #[test]
    fn remember_then_list_current_week() {
        let (server, _, _) = test_server();
        let saved = server.do_remember("planted tomatoes", Some("good"), None).unwrap();
        assert!(saved.starts_with("Saved entry for 2024-03-13"), "{}", saved);
        let again = server.do_remember("planted tomatoes and basil", Some("good"), None).unwrap();
        assert!(again.starts_with("Updated entry for 2024-03-13"));

        let listed = server.do_week_memories(None, None).unwrap();
        assert!(listed.starts_with("1 entries in week 11 of 2024"), "{}", listed);
        assert!(listed.contains("planted tomatoes and basil"));
        assert!(listed.contains("(good, 4 words)"));
    }

    #[test]
    fn remember_rejects_bad_input() {
        let (server, _, _) = test_server();
        assert!(server.do_remember("   ", None, None).is_err());
        let err = server.do_remember("fine", Some("meh"), None).unwrap_err();
        assert!(err.to_string().contains("invalid mood"));
    }

    #[test]
    fn empty_periods_are_reported_not_failed() {
        let (server, _, _) = test_server();
        assert_eq!(server.do_month_memories(2, 2020).unwrap(), "No entries in 2020-02.");
        assert!(server.do_month_memories(13, 2020).is_err());
        assert_eq!(server.do_week_memories(None, None).unwrap(), "No entries in week 11 of 2024.");
        assert_eq!(server.do_all_memories().unwrap(), "No entries yet.");
        assert_eq!(server.do_memory_dates(3, 2024).unwrap(), "No entries in 2024-03.");
    }

    #[test]
    fn browse_dates_and_forget_past_entry() {
        let (server, store, _) = test_server();
        store.upsert("u1", d(2024, 3, 2), "saturday market", None, None).unwrap();
        server.do_remember("today", None, None).unwrap();

        assert_eq!(server.do_memory_dates(3, 2024).unwrap(), "2024-03-02\n2024-03-13");
        assert!(server.do_all_memories().unwrap().starts_with("2 entries:"));

        let out = server.do_forget("2024-03-02", Some("duplicate")).unwrap();
        assert_eq!(out, "Deleted entry for 2024-03-02: saturday market");
        assert_eq!(server.do_forget("2024-03-02", None).unwrap(), "No entry found for 2024-03-02.");
        assert!(server.do_forget("March 2nd", None).is_err());
        assert_eq!(server.do_memory_dates(3, 2024).unwrap(), "2024-03-13");
    }
}
