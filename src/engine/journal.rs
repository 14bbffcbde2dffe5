use chrono::NaiveDate;
use tracing::{info, warn};

use super::{month_range, ReflectionEngine};
use crate::error::{ReflectionError, Result};
use crate::types::{Memory, Mood};

impl ReflectionEngine {
    /// Write the entry for `date`. Only today's entry may be written;
    /// writing it again replaces the text in place.
    pub fn record_memory(
        &self,
        user_id: &str,
        today: NaiveDate,
        date: NaiveDate,
        text: &str,
        mood: Option<Mood>,
        prompt: Option<&str>,
    ) -> Result<Memory> {
        if date != today {
            return Err(ReflectionError::NotEditable { date, today });
        }
        let memory = self.memories.upsert(user_id, date, text, mood, prompt)?;
        info!(user = user_id, %date, words = memory.word_count, "memory recorded");
        Ok(memory)
    }

    pub fn memory_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>> {
        Ok(self.memories.get_by_date(user_id, date)?)
    }

    /// Every entry of the user, newest first
    pub fn all_memories(&self, user_id: &str) -> Result<Vec<Memory>> {
        Ok(self.memories.get_all(user_id)?)
    }

    /// Days of the month that have an entry, in calendar order
    pub fn dates_with_memories(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<NaiveDate>> {
        let mut dates: Vec<NaiveDate> = self
            .month_memories(user_id, month, year)?
            .into_iter()
            .map(|m| m.date)
            .collect();
        dates.sort();
        Ok(dates)
    }

    /// Remove the entry for `date`, any day. Reflections already generated
    /// from it stay readable but can no longer seed a higher tier.
    pub fn delete_memory(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>> {
        let removed = self.memories.delete(user_id, date)?;
        match &removed {
            Some(memory) => warn!(user = user_id, %date, id = %memory.id, "memory deleted"),
            None => info!(user = user_id, %date, "no memory to delete"),
        }
        Ok(removed)
    }

    /// Newest first
    pub fn month_memories(&self, user_id: &str, month: u32, year: i32) -> Result<Vec<Memory>> {
        month_range(month, year)?;
        Ok(self.memories.get_by_month(user_id, month, year)?)
    }
}
