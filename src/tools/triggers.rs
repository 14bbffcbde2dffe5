use anyhow::Result;

use super::format_trigger;
use crate::server::ReflectionServer;
use crate::types::Tier;

impl ReflectionServer {
    pub fn do_refresh(&self) -> Result<String> {
        let created = self.engine.refresh_triggers(&self.user_id, self.today())?;
        let pending = self.do_pending()?;
        if created.is_empty() {
            return Ok(pending);
        }
        Ok(format!("{} new reflection(s) available.\n\n{}", created.len(), pending))
    }

    pub fn do_pending(&self) -> Result<String> {
        let pending = self.engine.pending_triggers(&self.user_id)?;
        if pending.is_empty() {
            return Ok("Nothing is waiting for reflection.".into());
        }

        let mut next = Vec::new();
        for (tier, tool) in [
            (Tier::Weekly, "week_memories + reflect_weekly"),
            (Tier::Monthly, "monthly_options + reflect_monthly"),
            (Tier::Yearly, "yearly_options + reflect_yearly"),
        ] {
            if self.engine.has_pending(&self.user_id, tier)? {
                next.push(tool);
            }
        }

        let lines: Vec<String> = pending.iter().map(format_trigger).collect();
        Ok(format!(
            "Ready for reflection:\n{}\n\nNext: {}",
            lines.join("\n"),
            next.join("; ")
        ))
    }
}
