use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER: &str = "default-user";

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub user_id: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let store_path = get("REFLECTIONS_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = get("HOME").unwrap_or_else(|| ".".into());
                PathBuf::from(home).join(".daily-reflections")
            });

        let timeout_secs = match get("REFLECTIONS_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("ignoring invalid REFLECTIONS_TIMEOUT_SECS '{}'", raw);
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        };

        Self {
            store_path,
            api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: get("REFLECTIONS_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            timeout: Duration::from_secs(timeout_secs),
            user_id: get("REFLECTIONS_USER")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER.into()),
        }
    }
}
