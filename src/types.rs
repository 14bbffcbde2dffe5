use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Weekly,
    Monthly,
    Yearly,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
            Tier::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weekly" => Some(Tier::Weekly),
            "monthly" => Some(Tier::Monthly),
            "yearly" => Some(Tier::Yearly),
            _ => None,
        }
    }

    /// Upper bound on narrator output tokens for this tier
    pub fn max_tokens(&self) -> u32 {
        match self {
            Tier::Weekly => 600,
            Tier::Monthly => 900,
            Tier::Yearly => 1200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Therapeutic,
    Inspirational,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Therapeutic => "therapeutic",
            Tone::Inspirational => "inspirational",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "therapeutic" => Some(Tone::Therapeutic),
            "inspirational" => Some(Tone::Inspirational),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Amazing,
    Good,
    Okay,
    Bad,
    Terrible,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Amazing => "amazing",
            Mood::Good => "good",
            Mood::Okay => "okay",
            Mood::Bad => "bad",
            Mood::Terrible => "terrible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "amazing" => Some(Mood::Amazing),
            "good" => Some(Mood::Good),
            "okay" => Some(Mood::Okay),
            "bad" => Some(Mood::Bad),
            "terrible" => Some(Mood::Terrible),
            _ => None,
        }
    }
}

/// The period a reflection or trigger covers. The tier is implied by the
/// variant, so a (tier, period) key can never disagree with itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum Period {
    #[serde(rename = "weekly")]
    Week { week: u32, year: i32 },
    #[serde(rename = "monthly")]
    Month { month: u32, year: i32 },
    #[serde(rename = "yearly")]
    Year { year: i32 },
}

impl Period {
    pub fn tier(&self) -> Tier {
        match self {
            Period::Week { .. } => Tier::Weekly,
            Period::Month { .. } => Tier::Monthly,
            Period::Year { .. } => Tier::Yearly,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Period::Week { year, .. } | Period::Month { year, .. } | Period::Year { year } => *year,
        }
    }

    pub fn week(&self) -> Option<u32> {
        match self {
            Period::Week { week, .. } => Some(*week),
            _ => None,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            Period::Month { month, .. } => Some(*month),
            _ => None,
        }
    }

    /// Rebuild a period from its stored columns
    pub fn from_parts(
        tier: Tier,
        week: Option<u32>,
        month: Option<u32>,
        year: i32,
    ) -> Option<Self> {
        match tier {
            Tier::Weekly => week.map(|week| Period::Week { week, year }),
            Tier::Monthly => month.map(|month| Period::Month { month, year }),
            Tier::Yearly => Some(Period::Year { year }),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Week { week, year } => write!(f, "week {} of {}", week, year),
            Period::Month { month, year } => write!(f, "{}-{:02}", year, month),
            Period::Year { year } => write!(f, "{}", year),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub text: String,
    pub mood: Option<Mood>,
    pub prompt: Option<String>,
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub id: String,
    pub user_id: String,
    pub tier: Tier,
    pub seed_memory_id: String,
    pub narrative: String,
    pub tone: Tone,
    pub created_at: DateTime<Utc>,
    pub period: Period,
    pub prompt_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklySelection {
    pub id: String,
    pub user_id: String,
    pub week: u32,
    pub year: i32,
    pub memory_id: String,
    pub reflection_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySelection {
    pub id: String,
    pub user_id: String,
    pub month: u32,
    pub year: i32,
    pub weekly_reflection_id: String,
    pub reflection_id: String,
    pub created_at: DateTime<Utc>,
}

/// Join record written alongside a reflection. Yearly reflections have none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PeriodSelection {
    Weekly(WeeklySelection),
    Monthly(MonthlySelection),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    pub id: String,
    pub user_id: String,
    pub period: Period,
    pub completed: bool,
    pub trigger_date: NaiveDate,
}

impl Trigger {
    pub fn tier(&self) -> Tier {
        self.period.tier()
    }
}

/// Raw weekly-selection join row; `reflection` is `None` when the linked
/// reflection id does not resolve.
#[derive(Debug, Clone)]
pub struct WeeklySelectionRow {
    pub selection: WeeklySelection,
    pub reflection: Option<Reflection>,
    pub memory: Option<Memory>,
}

#[derive(Debug, Clone)]
pub struct MonthlySelectionRow {
    pub selection: MonthlySelection,
    pub reflection: Option<Reflection>,
}

/// A weekly reflection that can seed a monthly one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyOption {
    pub selection: WeeklySelection,
    pub reflection: Reflection,
    pub memory: Memory,
}

/// A monthly reflection that can seed a yearly one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyOption {
    pub selection: MonthlySelection,
    pub reflection: Reflection,
}

/// Count words the same way for memories and narratives
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
