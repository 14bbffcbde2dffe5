pub mod sqlite;

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;

use crate::types::{
    Memory, MonthlySelection, MonthlySelectionRow, Mood, Period, PeriodSelection, Reflection,
    Trigger, WeeklySelection, WeeklySelectionRow,
};

pub use sqlite::SqliteStore;

/// One journal entry per (user, date). Every lookup is scoped to a user.
pub trait MemoryStore: Send + Sync {
    fn get_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>>;

    /// Newest first
    fn get_by_month(&self, user_id: &str, month: u32, year: i32) -> Result<Vec<Memory>>;

    /// Inclusive on both ends, oldest first
    fn get_by_range(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Memory>>;

    fn get_by_id(&self, user_id: &str, id: &str) -> Result<Option<Memory>>;

    /// Newest first
    fn get_all(&self, user_id: &str) -> Result<Vec<Memory>>;

    /// Remove the entry for a date, returning it if there was one. Reflections
    /// seeded from it are left in place.
    fn delete(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>>;

    /// Insert, or update the existing entry for that date in place
    fn upsert(
        &self,
        user_id: &str,
        date: NaiveDate,
        text: &str,
        mood: Option<Mood>,
        prompt: Option<&str>,
    ) -> Result<Memory>;
}

/// Reflections, their period selections, and reflection triggers.
pub trait ReflectionStore: Send + Sync {
    fn insert_reflection(&self, reflection: &Reflection) -> Result<()>;

    /// Keyed on (user, week, year). Writing the same period again points the
    /// selection at the newer reflection.
    fn insert_weekly_selection(&self, selection: &WeeklySelection) -> Result<()>;

    /// Keyed on (user, month, year), same replacement rule as weekly.
    fn insert_monthly_selection(&self, selection: &MonthlySelection) -> Result<()>;

    /// Persist a reflection together with its selection row.
    ///
    /// Stores without transactions get this ordering: the reflection goes in
    /// first and the selection only afterwards, so a selection can never
    /// point at a reflection that was not written. A failed selection insert
    /// leaves an orphaned reflection, which is logged and returned as an error.
    fn record_reflection(
        &self,
        reflection: &Reflection,
        selection: Option<&PeriodSelection>,
    ) -> Result<()> {
        self.insert_reflection(reflection)?;
        let inserted = match selection {
            Some(PeriodSelection::Weekly(s)) => self.insert_weekly_selection(s),
            Some(PeriodSelection::Monthly(s)) => self.insert_monthly_selection(s),
            None => Ok(()),
        };
        if let Err(e) = inserted {
            tracing::error!(
                reflection_id = %reflection.id,
                "selection insert failed after reflection was stored: {}", e
            );
            return Err(e);
        }
        Ok(())
    }

    fn get_reflection_by_id(&self, id: &str) -> Result<Option<Reflection>>;

    /// Newest first
    fn list_reflections(&self, user_id: &str) -> Result<Vec<Reflection>>;

    /// Weekly selections whose seed memory is dated inside `[start, end]`,
    /// oldest memory first
    fn weekly_selections_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeeklySelectionRow>>;

    /// Monthly selections for a year, ordered by month
    fn monthly_selections_for_year(
        &self,
        user_id: &str,
        year: i32,
    ) -> Result<Vec<MonthlySelectionRow>>;

    /// Whether any reflection already covers this exact period
    fn has_reflection_for(&self, user_id: &str, period: &Period) -> Result<bool>;

    fn find_trigger(&self, user_id: &str, period: &Period) -> Result<Option<Trigger>>;

    /// Returns false when a trigger with the same key already exists
    fn insert_trigger(&self, trigger: &Trigger) -> Result<bool>;

    /// Returns false when there was no pending trigger to complete
    fn mark_trigger_completed(&self, user_id: &str, period: &Period) -> Result<bool>;

    /// Oldest trigger date first
    fn get_pending_triggers(&self, user_id: &str) -> Result<Vec<Trigger>>;
}

/// Open (creating if needed) the store directory and its database
pub fn open(path: &Path) -> Result<SqliteStore> {
    std::fs::create_dir_all(path)?;
    let store = SqliteStore::open(path)?;
    tracing::info!(path = %path.display(), "reflection store opened");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::types::{Tier, Tone};

    /// Store without transactions: keeps the default `record_reflection` and
    /// can be told to fail either insert.
    #[derive(Default)]
    struct PlainStore {
        inner: Option<SqliteStore>,
        fail_reflection: AtomicBool,
        fail_selection: AtomicBool,
        selection_attempts: AtomicUsize,
    }

    impl PlainStore {
        fn new() -> Self {
            Self {
                inner: Some(SqliteStore::open_in_memory().unwrap()),
                ..Default::default()
            }
        }

        fn db(&self) -> &SqliteStore {
            self.inner.as_ref().unwrap()
        }
    }

    impl ReflectionStore for PlainStore {
        fn insert_reflection(&self, reflection: &Reflection) -> Result<()> {
            if self.fail_reflection.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.db().insert_reflection(reflection)
        }

        fn insert_weekly_selection(&self, selection: &WeeklySelection) -> Result<()> {
            self.selection_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_selection.load(Ordering::SeqCst) {
                anyhow::bail!("selection write refused");
            }
            self.db().insert_weekly_selection(selection)
        }

        fn insert_monthly_selection(&self, selection: &MonthlySelection) -> Result<()> {
            self.selection_attempts.fetch_add(1, Ordering::SeqCst);
            self.db().insert_monthly_selection(selection)
        }

        fn get_reflection_by_id(&self, id: &str) -> Result<Option<Reflection>> {
            self.db().get_reflection_by_id(id)
        }

        fn list_reflections(&self, user_id: &str) -> Result<Vec<Reflection>> {
            self.db().list_reflections(user_id)
        }

        fn weekly_selections_between(
            &self,
            user_id: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<WeeklySelectionRow>> {
            self.db().weekly_selections_between(user_id, start, end)
        }

        fn monthly_selections_for_year(
            &self,
            user_id: &str,
            year: i32,
        ) -> Result<Vec<MonthlySelectionRow>> {
            self.db().monthly_selections_for_year(user_id, year)
        }

        fn has_reflection_for(&self, user_id: &str, period: &Period) -> Result<bool> {
            self.db().has_reflection_for(user_id, period)
        }

        fn find_trigger(&self, user_id: &str, period: &Period) -> Result<Option<Trigger>> {
            self.db().find_trigger(user_id, period)
        }

        fn insert_trigger(&self, trigger: &Trigger) -> Result<bool> {
            self.db().insert_trigger(trigger)
        }

        fn mark_trigger_completed(&self, user_id: &str, period: &Period) -> Result<bool> {
            self.db().mark_trigger_completed(user_id, period)
        }

        fn get_pending_triggers(&self, user_id: &str) -> Result<Vec<Trigger>> {
            self.db().get_pending_triggers(user_id)
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn weekly_pair(store: &PlainStore) -> (Reflection, PeriodSelection) {
        let memory = store.db().upsert("u1", d(2024, 3, 4), "text", None, None).unwrap();
        let reflection = Reflection {
            id: "r1".into(),
            user_id: "u1".into(),
            tier: Tier::Weekly,
            seed_memory_id: memory.id.clone(),
            narrative: "story".into(),
            tone: Tone::Therapeutic,
            created_at: Utc::now(),
            period: Period::Week { week: 10, year: 2024 },
            prompt_used: "prompt".into(),
        };
        let selection = PeriodSelection::Weekly(WeeklySelection {
            id: "s1".into(),
            user_id: "u1".into(),
            week: 10,
            year: 2024,
            memory_id: memory.id,
            reflection_id: "r1".into(),
            created_at: Utc::now(),
        });
        (reflection, selection)
    }

    fn weekly_rows(store: &PlainStore) -> Vec<WeeklySelectionRow> {
        store.weekly_selections_between("u1", d(2024, 3, 1), d(2024, 3, 31)).unwrap()
    }

    #[test]
    fn default_record_writes_reflection_then_selection() {
        let store = PlainStore::new();
        let (reflection, selection) = weekly_pair(&store);

        store.record_reflection(&reflection, Some(&selection)).unwrap();

        let rows = weekly_rows(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reflection.as_ref().unwrap().id, "r1");
    }

    #[test]
    fn default_record_keeps_reflection_when_selection_fails() {
        let store = PlainStore::new();
        store.fail_selection.store(true, Ordering::SeqCst);
        let (reflection, selection) = weekly_pair(&store);

        let err = store.record_reflection(&reflection, Some(&selection)).unwrap_err();
        assert!(err.to_string().contains("selection write refused"));
        assert!(store.get_reflection_by_id("r1").unwrap().is_some());
        assert!(weekly_rows(&store).is_empty());
    }

    #[test]
    fn default_record_skips_selection_when_reflection_fails() {
        let store = PlainStore::new();
        store.fail_reflection.store(true, Ordering::SeqCst);
        let (reflection, selection) = weekly_pair(&store);

        assert!(store.record_reflection(&reflection, Some(&selection)).is_err());
        assert_eq!(store.selection_attempts.load(Ordering::SeqCst), 0);
        assert!(store.get_reflection_by_id("r1").unwrap().is_none());
        assert!(weekly_rows(&store).is_empty());
    }
}
