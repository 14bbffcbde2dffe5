use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use super::ReflectionEngine;
use crate::error::Result;
use crate::types::{new_id, Period, Tier, Trigger};
use crate::week;

/// Monthly and yearly checks only run during the first days of a new period
const TRANSITION_DAYS: u32 = 7;

impl ReflectionEngine {
    /// Re-evaluate eligibility for `user` as of `today` and create any
    /// triggers that are newly due. Returns the triggers created by this call.
    pub fn refresh_triggers(&self, user_id: &str, today: NaiveDate) -> Result<Vec<Trigger>> {
        let mut created = Vec::new();

        // Weekly: the week just finished, and the one in progress
        let weeks = week::previous_week(today).into_iter().chain(week::week_containing(today));
        for (year, week) in weeks {
            if self.get_week_memories(user_id, week, year)?.is_empty() {
                continue;
            }
            self.offer(user_id, Period::Week { week, year }, today, &mut created)?;
        }

        if today.day() <= TRANSITION_DAYS {
            let (month, year) = week::previous_month(today);
            if !self.monthly_options(user_id, month, year)?.is_empty() {
                self.offer(user_id, Period::Month { month, year }, today, &mut created)?;
            }

            if today.month() == 1 {
                let year = today.year() - 1;
                if !self.reflections.monthly_selections_for_year(user_id, year)?.is_empty() {
                    self.offer(user_id, Period::Year { year }, today, &mut created)?;
                }
            }
        }

        debug!(user = user_id, %today, created = created.len(), "triggers refreshed");
        Ok(created)
    }

    /// Create the trigger for an eligible period, unless the user already
    /// reflected on it without one
    fn offer(
        &self,
        user_id: &str,
        period: Period,
        today: NaiveDate,
        created: &mut Vec<Trigger>,
    ) -> Result<()> {
        if self.reflections.has_reflection_for(user_id, &period)? {
            debug!(user = user_id, %period, "period already reflected on");
            return Ok(());
        }
        if let Some(trigger) = self.create_trigger_if_not_exists(user_id, period, today)? {
            created.push(trigger);
        }
        Ok(())
    }

    /// Insert a pending trigger for `period` unless one already exists,
    /// pending or completed. Safe to call any number of times.
    pub fn create_trigger_if_not_exists(
        &self,
        user_id: &str,
        period: Period,
        today: NaiveDate,
    ) -> Result<Option<Trigger>> {
        if self.reflections.find_trigger(user_id, &period)?.is_some() {
            return Ok(None);
        }

        let trigger = Trigger {
            id: new_id("trg"),
            user_id: user_id.to_string(),
            period,
            completed: false,
            trigger_date: today,
        };
        // a re-entrant call may have inserted between the lookup and here
        if !self.reflections.insert_trigger(&trigger)? {
            return Ok(None);
        }

        info!(user = user_id, %period, "reflection trigger created");
        Ok(Some(trigger))
    }

    /// Flip the trigger for `period` to completed. Missing or already
    /// completed triggers are left alone.
    pub fn mark_trigger_completed(&self, user_id: &str, period: &Period) -> Result<()> {
        if self.reflections.mark_trigger_completed(user_id, period)? {
            info!(user = user_id, %period, "reflection trigger completed");
        } else {
            debug!(user = user_id, %period, "no pending trigger to complete");
        }
        Ok(())
    }

    pub fn pending_triggers(&self, user_id: &str) -> Result<Vec<Trigger>> {
        Ok(self.reflections.get_pending_triggers(user_id)?)
    }

    pub fn has_pending(&self, user_id: &str, tier: Tier) -> Result<bool> {
        Ok(self.pending_triggers(user_id)?.iter().any(|t| t.tier() == tier))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{d, engine};
    use crate::store::{MemoryStore, ReflectionStore};
    use crate::types::{Period, Tier, Tone};

    #[test]
    fn memory_in_previous_week_creates_one_trigger() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 3, 5), "tuesday", None, None).unwrap();

        let created = engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].period, Period::Week { week: 10, year: 2024 });
        assert!(!created[0].completed);

        assert!(engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap().is_empty());
        assert_eq!(engine.pending_triggers("u1").unwrap().len(), 1);
    }

    #[test]
    fn back_to_back_refreshes_leave_one_row() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 3, 6), "wednesday", None, None).unwrap();

        let other = engine.clone();
        engine.refresh_triggers("u1", d(2024, 3, 12)).unwrap();
        other.refresh_triggers("u1", d(2024, 3, 12)).unwrap();

        let pending = store.get_pending_triggers("u1").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].period, Period::Week { week: 10, year: 2024 });
    }

    #[test]
    fn current_week_is_offered_immediately() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 3, 13), "today", None, None).unwrap();

        let created = engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].period, Period::Week { week: 11, year: 2024 });
    }

    #[test]
    fn empty_weeks_create_nothing() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 1, 15), "long ago", None, None).unwrap();
        assert!(engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap().is_empty());
        assert!(engine.refresh_triggers("u2", d(2024, 1, 16)).unwrap().is_empty());
    }

    #[test]
    fn first_week_of_year_looks_back_into_december() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 12, 31), "new year's eve", None, None).unwrap();

        let created = engine.refresh_triggers("u1", d(2025, 1, 8)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].period, Period::Week { week: 53, year: 2024 });
    }

    #[test]
    fn completed_trigger_is_not_recreated() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 3, 5), "tuesday", None, None).unwrap();
        engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap();

        let period = Period::Week { week: 10, year: 2024 };
        engine.mark_trigger_completed("u1", &period).unwrap();
        engine.mark_trigger_completed("u1", &period).unwrap();

        assert!(engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap().is_empty());
        assert!(engine.pending_triggers("u1").unwrap().is_empty());
        assert!(store.find_trigger("u1", &period).unwrap().unwrap().completed);
    }

    #[tokio::test]
    async fn reflected_week_without_trigger_is_not_offered() {
        let (engine, store, _) = engine();
        let memory = store.upsert("u1", d(2024, 3, 5), "tuesday", None, None).unwrap();
        engine
            .create_weekly_reflection("u1", 10, 2024, &memory.id, Tone::Therapeutic)
            .await
            .unwrap();

        assert!(engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap().is_empty());
        let week = Period::Week { week: 10, year: 2024 };
        assert!(store.find_trigger("u1", &week).unwrap().is_none());
        assert!(!engine.has_pending("u1", Tier::Weekly).unwrap());
    }

    #[test]
    fn completing_unknown_trigger_is_a_no_op() {
        let (engine, _, _) = engine();
        engine
            .mark_trigger_completed("u1", &Period::Month { month: 2, year: 2024 })
            .unwrap();
    }

    #[tokio::test]
    async fn monthly_trigger_only_in_first_days_of_next_month() {
        let (engine, store, _) = engine();
        let memory = store.upsert("u1", d(2024, 3, 20), "spring", None, None).unwrap();
        engine
            .create_weekly_reflection("u1", 12, 2024, &memory.id, Tone::Inspirational)
            .await
            .unwrap();

        assert!(!engine.has_pending("u1", Tier::Monthly).unwrap());
        engine.refresh_triggers("u1", d(2024, 4, 10)).unwrap();
        assert!(!engine.has_pending("u1", Tier::Monthly).unwrap());

        let created = engine.refresh_triggers("u1", d(2024, 4, 3)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].period, Period::Month { month: 3, year: 2024 });
        assert!(engine.has_pending("u1", Tier::Monthly).unwrap());
    }

    #[tokio::test]
    async fn yearly_trigger_in_first_days_of_january() {
        let (engine, store, _) = engine();
        let memory = store.upsert("u1", d(2024, 6, 12), "summer", None, None).unwrap();
        let weekly = engine
            .create_weekly_reflection("u1", 24, 2024, &memory.id, Tone::Therapeutic)
            .await
            .unwrap();
        engine
            .create_monthly_reflection("u1", 6, 2024, &weekly.id, Tone::Therapeutic)
            .await
            .unwrap();

        engine.refresh_triggers("u1", d(2024, 12, 3)).unwrap();
        assert!(!engine.has_pending("u1", Tier::Yearly).unwrap());

        let created = engine.refresh_triggers("u1", d(2025, 1, 2)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].period, Period::Year { year: 2024 });
        assert!(engine.refresh_triggers("u1", d(2025, 1, 3)).unwrap().is_empty());
    }

    #[test]
    fn pending_triggers_are_ordered_by_trigger_date() {
        let (engine, store, _) = engine();
        store.upsert("u1", d(2024, 3, 5), "week ten", None, None).unwrap();
        store.upsert("u1", d(2024, 3, 12), "week eleven", None, None).unwrap();

        engine.refresh_triggers("u1", d(2024, 3, 19)).unwrap();
        engine.refresh_triggers("u1", d(2024, 3, 13)).unwrap();

        let weeks: Vec<_> = engine
            .pending_triggers("u1")
            .unwrap()
            .iter()
            .filter_map(|t| t.period.week())
            .collect();
        assert_eq!(weeks, vec![10, 11]);
    }
}
