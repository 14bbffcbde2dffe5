use tracing::{error, warn};

use super::{month_range, ReflectionEngine};
use crate::error::Result;
use crate::types::{
    MonthlyOption, MonthlySelectionRow, Reflection, WeeklySelectionRow, YearlyOption,
};

impl ReflectionEngine {
    /// Weekly reflections whose seed memory is dated inside the month. The
    /// memory date decides membership, so a week straddling two months only
    /// counts toward the month its memory belongs to.
    pub fn monthly_options(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<MonthlyOption>> {
        let (start, end) = month_range(month, year)?;
        let rows = self.reflections.weekly_selections_between(user_id, start, end)?;
        Ok(resolve_monthly(rows))
    }

    /// Monthly reflections of a year, January first
    pub fn yearly_options(&self, user_id: &str, year: i32) -> Result<Vec<YearlyOption>> {
        let rows = self.reflections.monthly_selections_for_year(user_id, year)?;
        Ok(resolve_yearly(rows))
    }

    /// Every reflection of the user, newest first
    pub fn user_reflections(&self, user_id: &str) -> Result<Vec<Reflection>> {
        Ok(self.reflections.list_reflections(user_id)?)
    }
}

fn resolve_monthly(rows: Vec<WeeklySelectionRow>) -> Vec<MonthlyOption> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(reflection) = row.reflection else {
                error!(
                    selection = %row.selection.id,
                    reflection = %row.selection.reflection_id,
                    "weekly selection points at a missing reflection"
                );
                return None;
            };
            let Some(memory) = row.memory else {
                // seed memory deleted by the user
                warn!(
                    selection = %row.selection.id,
                    memory = %row.selection.memory_id,
                    "weekly selection's memory is gone"
                );
                return None;
            };
            Some(MonthlyOption {
                selection: row.selection,
                reflection,
                memory,
            })
        })
        .collect()
}

fn resolve_yearly(rows: Vec<MonthlySelectionRow>) -> Vec<YearlyOption> {
    rows.into_iter()
        .filter_map(|row| match row.reflection {
            Some(reflection) => Some(YearlyOption {
                selection: row.selection,
                reflection,
            }),
            None => {
                error!(
                    selection = %row.selection.id,
                    reflection = %row.selection.reflection_id,
                    "monthly selection points at a missing reflection"
                );
                None
            }
        })
        .collect()
}
