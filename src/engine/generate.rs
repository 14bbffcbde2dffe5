use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use super::{month_range, week_range, year_range, ReflectionEngine};
use crate::error::{ReflectionError, Result};
use crate::narrator::{NarrationRequest, Narration};
use crate::types::{
    new_id, Memory, MonthlySelection, Period, PeriodSelection, Reflection, Tier, Tone,
    WeeklySelection,
};

impl ReflectionEngine {
    /// Memories dated inside the given week, oldest first
    pub fn get_week_memories(&self, user_id: &str, week: u32, year: i32) -> Result<Vec<Memory>> {
        let (start, end) = week_range(week, year)?;
        Ok(self.memories.get_by_range(user_id, start, end)?)
    }

    pub async fn create_weekly_reflection(
        &self,
        user_id: &str,
        week: u32,
        year: i32,
        memory_id: &str,
        tone: Tone,
    ) -> Result<Reflection> {
        let period = Period::Week { week, year };
        let (start, end) = week_range(week, year)?;
        let memory = self
            .memories
            .get_by_id(user_id, memory_id)?
            .ok_or_else(|| ReflectionError::not_found("memory", memory_id))?;
        ensure_inside(&memory, start, end, &period)?;

        let narration = self
            .narrate(NarrationRequest {
                text: memory.text.clone(),
                memory_date: memory.date,
                tier: Tier::Weekly,
                tone,
                context: None,
            })
            .await?;

        let reflection = self.new_reflection(user_id, &memory, period, tone, narration);
        let selection = PeriodSelection::Weekly(WeeklySelection {
            id: new_id("wsel"),
            user_id: user_id.to_string(),
            week,
            year,
            memory_id: memory.id.clone(),
            reflection_id: reflection.id.clone(),
            created_at: reflection.created_at,
        });

        self.persist(&reflection, Some(&selection))?;
        Ok(reflection)
    }

    /// Regenerates from the weekly reflection's seed memory; the weekly
    /// narrative only rides along as context.
    pub async fn create_monthly_reflection(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
        weekly_reflection_id: &str,
        tone: Tone,
    ) -> Result<Reflection> {
        let period = Period::Month { month, year };
        let (start, end) = month_range(month, year)?;
        let weekly = self.source_reflection(user_id, weekly_reflection_id, Tier::Weekly)?;
        let memory = self.seed_memory(user_id, &weekly)?;
        ensure_inside(&memory, start, end, &period)?;

        let narration = self
            .narrate(NarrationRequest {
                text: memory.text.clone(),
                memory_date: memory.date,
                tier: Tier::Monthly,
                tone,
                context: Some(format!("Previous weekly reflection: {}", weekly.narrative)),
            })
            .await?;

        let reflection = self.new_reflection(user_id, &memory, period, tone, narration);
        let selection = PeriodSelection::Monthly(MonthlySelection {
            id: new_id("msel"),
            user_id: user_id.to_string(),
            month,
            year,
            weekly_reflection_id: weekly.id.clone(),
            reflection_id: reflection.id.clone(),
            created_at: reflection.created_at,
        });

        self.persist(&reflection, Some(&selection))?;
        Ok(reflection)
    }

    pub async fn create_yearly_reflection(
        &self,
        user_id: &str,
        year: i32,
        monthly_reflection_id: &str,
        tone: Tone,
    ) -> Result<Reflection> {
        let period = Period::Year { year };
        let (start, end) = year_range(year)?;
        let monthly = self.source_reflection(user_id, monthly_reflection_id, Tier::Monthly)?;
        let memory = self.seed_memory(user_id, &monthly)?;
        ensure_inside(&memory, start, end, &period)?;

        let narration = self
            .narrate(NarrationRequest {
                text: memory.text.clone(),
                memory_date: memory.date,
                tier: Tier::Yearly,
                tone,
                context: Some(format!("Previous monthly reflection: {}", monthly.narrative)),
            })
            .await?;

        let reflection = self.new_reflection(user_id, &memory, period, tone, narration);
        self.persist(&reflection, None)?;
        Ok(reflection)
    }

    /// Round trip to the narrator backend without generating anything
    pub async fn check_narrator(&self) -> Result<()> {
        match self.narrator.check_connection().await {
            Ok(()) => {
                info!("narrator reachable");
                Ok(())
            }
            Err(e) => {
                warn!(retryable = e.is_retryable(), "narrator check failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn narrate(&self, request: NarrationRequest) -> Result<Narration> {
        self.narrator.generate(&request).await.map_err(|e| {
            warn!(
                tier = request.tier.as_str(),
                retryable = e.is_retryable(),
                "narration failed: {}", e
            );
            ReflectionError::from(e)
        })
    }

    fn new_reflection(
        &self,
        user_id: &str,
        seed: &Memory,
        period: Period,
        tone: Tone,
        narration: Narration,
    ) -> Reflection {
        Reflection {
            id: new_id("ref"),
            user_id: user_id.to_string(),
            tier: period.tier(),
            seed_memory_id: seed.id.clone(),
            narrative: narration.narrative,
            tone,
            created_at: Utc::now(),
            period,
            prompt_used: narration.prompt_used,
        }
    }

    /// Write the reflection and its selection, then close the trigger
    fn persist(&self, reflection: &Reflection, selection: Option<&PeriodSelection>) -> Result<()> {
        self.reflections.record_reflection(reflection, selection)?;
        info!(
            user = %reflection.user_id,
            id = %reflection.id,
            period = %reflection.period,
            "reflection stored"
        );

        // The reflection is already durable here; a failed flag update must
        // not make the caller think generation failed.
        if let Err(e) = self.mark_trigger_completed(&reflection.user_id, &reflection.period) {
            error!(period = %reflection.period, "could not complete trigger: {}", e);
        }
        Ok(())
    }

    /// Load a lower-tier reflection the user picked, checking owner and tier
    fn source_reflection(&self, user_id: &str, id: &str, tier: Tier) -> Result<Reflection> {
        match self.reflections.get_reflection_by_id(id)? {
            Some(r) if r.user_id == user_id && r.tier == tier => Ok(r),
            _ => Err(ReflectionError::not_found(
                match tier {
                    Tier::Weekly => "weekly reflection",
                    Tier::Monthly => "monthly reflection",
                    Tier::Yearly => "yearly reflection",
                },
                id,
            )),
        }
    }

    fn seed_memory(&self, user_id: &str, reflection: &Reflection) -> Result<Memory> {
        self.memories
            .get_by_id(user_id, &reflection.seed_memory_id)?
            .ok_or_else(|| {
                error!(
                    reflection = %reflection.id,
                    memory = %reflection.seed_memory_id,
                    "reflection seed memory is missing"
                );
                ReflectionError::InconsistentState(format!(
                    "reflection {} points at missing memory {}",
                    reflection.id, reflection.seed_memory_id
                ))
            })
    }
}

/// The seed memory has to be dated inside the period it is reflected under,
/// otherwise it would surface in another period's options.
fn ensure_inside(memory: &Memory, start: NaiveDate, end: NaiveDate, period: &Period) -> Result<()> {
    if memory.date < start || memory.date > end {
        return Err(ReflectionError::InvalidPeriod(format!(
            "memory of {} is outside {}",
            memory.date, period
        )));
    }
    Ok(())
}
