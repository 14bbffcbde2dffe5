use anyhow::Result;

use super::{format_reflection, preview};
use crate::server::ReflectionServer;

impl ReflectionServer {
    pub fn do_monthly_options(&self, month: u32, year: i32) -> Result<String> {
        let options = self.engine.monthly_options(&self.user_id, month, year)?;
        if options.is_empty() {
            return Ok(format!("No weekly reflections for {}-{:02} yet.", year, month));
        }

        let lines: Vec<String> = options
            .iter()
            .map(|o| {
                format!(
                    "[week {} of {}] memory of {}: {}\n  {}\n  weekly reflection id: {}",
                    o.selection.week,
                    o.selection.year,
                    o.memory.date.format("%Y-%m-%d"),
                    preview(&o.memory.text, 120),
                    preview(&o.reflection.narrative, 200),
                    o.reflection.id,
                )
            })
            .collect();
        Ok(format!(
            "{} weekly reflection(s) for {}-{:02}:\n\n{}",
            options.len(),
            year,
            month,
            lines.join("\n\n")
        ))
    }

    pub fn do_yearly_options(&self, year: i32) -> Result<String> {
        let options = self.engine.yearly_options(&self.user_id, year)?;
        if options.is_empty() {
            return Ok(format!("No monthly reflections for {} yet.", year));
        }

        let lines: Vec<String> = options
            .iter()
            .map(|o| {
                format!(
                    "[{}-{:02}] {}\n  monthly reflection id: {}",
                    o.selection.year,
                    o.selection.month,
                    preview(&o.reflection.narrative, 200),
                    o.reflection.id,
                )
            })
            .collect();
        Ok(format!(
            "{} monthly reflection(s) for {}:\n\n{}",
            options.len(),
            year,
            lines.join("\n\n")
        ))
    }

    pub fn do_reflections(&self) -> Result<String> {
        let reflections = self.engine.user_reflections(&self.user_id)?;
        if reflections.is_empty() {
            return Ok("No reflections yet.".into());
        }

        let lines: Vec<String> = reflections.iter().map(format_reflection).collect();
        Ok(format!("{} reflection(s):\n\n{}", reflections.len(), lines.join("\n\n")))
    }
}
