//! Reflection scheduling and aggregation.
//!
//! The engine holds no state of its own beyond its collaborators: every
//! lookup goes to the stores, and "today" is always passed in by the caller.

mod aggregate;
mod generate;
mod journal;
mod triggers;

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::error::{ReflectionError, Result};
use crate::narrator::Narrator;
use crate::store::{MemoryStore, ReflectionStore};
use crate::week;

#[derive(Clone)]
pub struct ReflectionEngine {
    memories: Arc<dyn MemoryStore>,
    reflections: Arc<dyn ReflectionStore>,
    narrator: Arc<dyn Narrator>,
}

impl ReflectionEngine {
    pub fn new(
        memories: Arc<dyn MemoryStore>,
        reflections: Arc<dyn ReflectionStore>,
        narrator: Arc<dyn Narrator>,
    ) -> Self {
        Self {
            memories,
            reflections,
            narrator,
        }
    }
}

/// Date range of a week. A week must start inside its own year, so week 53
/// only exists in years whose 53rd Monday is still in December.
fn week_range(week: u32, year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || ReflectionError::InvalidPeriod(format!("week {} of {}", week, year));
    if !(1..=53).contains(&week) {
        return Err(invalid());
    }
    match (week::week_start(year, week), week::week_end(year, week)) {
        (Some(start), Some(end)) if start.year() == year => Ok((start, end)),
        _ => Err(invalid()),
    }
}

fn month_range(month: u32, year: i32) -> Result<(NaiveDate, NaiveDate)> {
    week::month_bounds(month, year)
        .ok_or_else(|| ReflectionError::InvalidPeriod(format!("month {} of {}", month, year)))
}

fn year_range(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 12, 31)) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(ReflectionError::InvalidPeriod(format!("year {}", year))),
    }
}
