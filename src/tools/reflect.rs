use anyhow::Result;

use super::parse_tone;
use crate::server::ReflectionServer;
use crate::types::Reflection;

fn render(reflection: &Reflection) -> String {
    format!(
        "{} reflection for {} ({}):\n\n{}\n\nid: {} | seed memory: {}",
        reflection.tier.as_str(),
        reflection.period,
        reflection.tone.as_str(),
        reflection.narrative,
        reflection.id,
        reflection.seed_memory_id,
    )
}

impl ReflectionServer {
    pub async fn do_reflect_weekly(
        &self,
        week: u32,
        year: i32,
        memory_id: &str,
        tone: &str,
    ) -> Result<String> {
        let tone = parse_tone(tone)?;
        let reflection = self
            .engine
            .create_weekly_reflection(&self.user_id, week, year, memory_id, tone)
            .await?;
        Ok(render(&reflection))
    }

    pub async fn do_reflect_monthly(
        &self,
        month: u32,
        year: i32,
        weekly_reflection_id: &str,
        tone: &str,
    ) -> Result<String> {
        let tone = parse_tone(tone)?;
        let reflection = self
            .engine
            .create_monthly_reflection(&self.user_id, month, year, weekly_reflection_id, tone)
            .await?;
        Ok(render(&reflection))
    }

    pub async fn do_reflect_yearly(
        &self,
        year: i32,
        monthly_reflection_id: &str,
        tone: &str,
    ) -> Result<String> {
        let tone = parse_tone(tone)?;
        let reflection = self
            .engine
            .create_yearly_reflection(&self.user_id, year, monthly_reflection_id, tone)
            .await?;
        Ok(render(&reflection))
    }

    pub async fn do_check_narrator(&self) -> Result<String> {
        self.engine.check_narrator().await?;
        Ok("Narrator reachable, API key accepted.".into())
    }
}
