use rmcp::{
    ServerHandler,
    model::{ServerCapabilities, ServerInfo},
    tool,
    schemars,
};

use crate::engine::ReflectionEngine;
use crate::error::ReflectionError;

#[derive(Clone)]
pub struct ReflectionServer {
    pub engine: ReflectionEngine,
    pub user_id: String,
    /// Pinned calendar date; local time when unset
    pub today: Option<chrono::NaiveDate>,
}

impl ReflectionServer {
    pub fn today(&self) -> chrono::NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Render a tool failure, adding what the user can do about narrator errors
pub fn render_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ReflectionError>() {
        Some(ReflectionError::Narrator(n)) => format!("Error: {} ({})", n, n.guidance()),
        _ => format!("Error: {}", e),
    }
}

// MCP request types

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RememberRequest {
    #[schemars(description = "Today's journal entry")]
    pub text: String,
    #[schemars(description = "Mood: amazing, good, okay, bad, or terrible (optional)")]
    pub mood: Option<String>,
    #[schemars(description = "Daily prompt the entry answers (optional)")]
    pub prompt: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct WeekRequest {
    #[schemars(description = "Week number (defaults to the current week)")]
    pub week: Option<u32>,
    #[schemars(description = "Year (defaults to the current year)")]
    pub year: Option<i32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct MonthRequest {
    #[schemars(description = "Month, 1-12")]
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct YearRequest {
    pub year: i32,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ForgetRequest {
    #[schemars(description = "Date of the entry to delete, YYYY-MM-DD")]
    pub date: String,
    #[schemars(description = "Why the entry is being deleted (optional)")]
    pub reason: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct EmptyRequest {}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct WeeklyReflectionRequest {
    pub week: u32,
    pub year: i32,
    #[schemars(description = "ID of the memory to reflect on (from week_memories)")]
    pub memory_id: String,
    #[schemars(description = "therapeutic or inspirational")]
    pub tone: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct MonthlyReflectionRequest {
    pub month: u32,
    pub year: i32,
    #[schemars(description = "ID of a weekly reflection (from monthly_options)")]
    pub weekly_reflection_id: String,
    #[schemars(description = "therapeutic or inspirational")]
    pub tone: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct YearlyReflectionRequest {
    pub year: i32,
    #[schemars(description = "ID of a monthly reflection (from yearly_options)")]
    pub monthly_reflection_id: String,
    #[schemars(description = "therapeutic or inspirational")]
    pub tone: String,
}

#[tool(tool_box)]
impl ReflectionServer {
    #[tool(description = "Write today's journal entry. One entry per day; writing again replaces today's text. Past days cannot be edited.")]
    async fn remember(
        &self, #[tool(aggr)] req: RememberRequest,
    ) -> String {
        match self.do_remember(&req.text, req.mood.as_deref(), req.prompt.as_deref()) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List the journal entries of a week, oldest first, with their IDs.")]
    async fn week_memories(
        &self, #[tool(aggr)] req: WeekRequest,
    ) -> String {
        match self.do_week_memories(req.week, req.year) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List the journal entries of a month, newest first.")]
    async fn month_memories(
        &self, #[tool(aggr)] req: MonthRequest,
    ) -> String {
        match self.do_month_memories(req.month, req.year) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List every journal entry, newest first.")]
    async fn all_memories(
        &self, #[tool(aggr)] _req: EmptyRequest,
    ) -> String {
        match self.do_all_memories() {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List the days of a month that have a journal entry, for calendar views.")]
    async fn memory_dates(
        &self, #[tool(aggr)] req: MonthRequest,
    ) -> String {
        match self.do_memory_dates(req.month, req.year) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Delete the journal entry of a given day. Reflections already written from it are kept.")]
    async fn forget(
        &self, #[tool(aggr)] req: ForgetRequest,
    ) -> String {
        match self.do_forget(&req.date, req.reason.as_deref()) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Check that the reflection writer (Anthropic API) is reachable and the key is accepted.")]
    async fn check_narrator(
        &self, #[tool(aggr)] _req: EmptyRequest,
    ) -> String {
        match self.do_check_narrator().await {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Check which weekly, monthly and yearly reflections have become available, then list everything ready for reflection.")]
    async fn refresh(
        &self, #[tool(aggr)] _req: EmptyRequest,
    ) -> String {
        match self.do_refresh() {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List reflections that are ready but not done yet, oldest first.")]
    async fn pending(
        &self, #[tool(aggr)] _req: EmptyRequest,
    ) -> String {
        match self.do_pending() {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Generate a weekly reflection from one memory of that week.")]
    async fn reflect_weekly(
        &self, #[tool(aggr)] req: WeeklyReflectionRequest,
    ) -> String {
        match self.do_reflect_weekly(req.week, req.year, &req.memory_id, &req.tone).await {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Generate a monthly reflection from one of the month's weekly reflections. The original memory is re-read; the weekly story is used as context.")]
    async fn reflect_monthly(
        &self, #[tool(aggr)] req: MonthlyReflectionRequest,
    ) -> String {
        match self
            .do_reflect_monthly(req.month, req.year, &req.weekly_reflection_id, &req.tone)
            .await
        {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "Generate a yearly reflection from one of the year's monthly reflections.")]
    async fn reflect_yearly(
        &self, #[tool(aggr)] req: YearlyReflectionRequest,
    ) -> String {
        match self
            .do_reflect_yearly(req.year, &req.monthly_reflection_id, &req.tone)
            .await
        {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List weekly reflections whose memory falls in the given month. These can seed a monthly reflection.")]
    async fn monthly_options(
        &self, #[tool(aggr)] req: MonthRequest,
    ) -> String {
        match self.do_monthly_options(req.month, req.year) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List the monthly reflections of a year. These can seed a yearly reflection.")]
    async fn yearly_options(
        &self, #[tool(aggr)] req: YearRequest,
    ) -> String {
        match self.do_yearly_options(req.year) {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }

    #[tool(description = "List every reflection, newest first.")]
    async fn reflections(
        &self, #[tool(aggr)] _req: EmptyRequest,
    ) -> String {
        match self.do_reflections() {
            Ok(msg) => msg,
            Err(e) => render_error(&e),
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for ReflectionServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Daily journal with tiered reflections. \
                 remember writes today's entry, forget deletes one; \
                 all_memories and memory_dates browse the journal; \
                 refresh and pending show what is ready to reflect on; \
                 week_memories, monthly_options and yearly_options list the candidates; \
                 reflect_weekly, reflect_monthly and reflect_yearly generate the stories; \
                 reflections lists everything generated so far; \
                 check_narrator tests the API connection. \
                 Every reflection traces back to one original journal entry."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NarratorError;

    #[test]
    fn narrator_errors_carry_guidance() {
        let err = anyhow::Error::from(ReflectionError::from(NarratorError::RateLimited(
            "429".into(),
        )));
        assert_eq!(
            render_error(&err),
            "Error: narrator rate limited: 429 (wait a moment and retry)"
        );

        let err = anyhow::Error::from(ReflectionError::not_found("memory", "mem_1"));
        assert_eq!(render_error(&err), "Error: memory not found: mem_1");
    }
}
