use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Row};

use crate::store::{MemoryStore, ReflectionStore};
use crate::types::{
    Memory, MonthlySelection, MonthlySelectionRow, Mood, Period, PeriodSelection, Reflection,
    Tier, Tone, Trigger, WeeklySelection, WeeklySelectionRow,
};

const DATE_FMT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS memories (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        date TEXT NOT NULL,
        text TEXT NOT NULL,
        mood TEXT,
        prompt TEXT,
        word_count INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, date)
    );

    CREATE TABLE IF NOT EXISTS reflections (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        tier TEXT NOT NULL,
        seed_memory_id TEXT NOT NULL,
        narrative TEXT NOT NULL,
        tone TEXT NOT NULL,
        created_at TEXT NOT NULL,
        week INTEGER,
        month INTEGER,
        year INTEGER NOT NULL,
        prompt_used TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS reflections_user_created
        ON reflections (user_id, created_at);

    CREATE TABLE IF NOT EXISTS weekly_selections (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        week INTEGER NOT NULL,
        year INTEGER NOT NULL,
        memory_id TEXT NOT NULL,
        reflection_id TEXT NOT NULL REFERENCES reflections (id),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, week, year)
    );

    CREATE TABLE IF NOT EXISTS monthly_selections (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        month INTEGER NOT NULL,
        year INTEGER NOT NULL,
        weekly_reflection_id TEXT NOT NULL,
        reflection_id TEXT NOT NULL REFERENCES reflections (id),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, month, year)
    );

    -- week/month are 0 when the tier has no such component, so the
    -- unique key never contains NULLs
    CREATE TABLE IF NOT EXISTS reflection_triggers (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        tier TEXT NOT NULL,
        week INTEGER NOT NULL DEFAULT 0,
        month INTEGER NOT NULL DEFAULT 0,
        year INTEGER NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        trigger_date TEXT NOT NULL,
        UNIQUE (user_id, tier, week, month, year)
    );
";

const MEMORY_COLUMNS: &str =
    "m.id, m.user_id, m.date, m.text, m.mood, m.prompt, m.word_count, m.created_at, m.updated_at";

const REFLECTION_COLUMNS: &str = "r.id, r.user_id, r.tier, r.seed_memory_id, r.narrative, \
     r.tone, r.created_at, r.week, r.month, r.year, r.prompt_used";

const MEMORY_WIDTH: usize = 9;
const REFLECTION_WIDTH: usize = 11;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(store_path: &Path) -> Result<Self> {
        let db_path = store_path.join("reflections.db");
        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))
    }
}

impl MemoryStore for SqliteStore {
    fn get_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        memory_where(
            &conn,
            "m.user_id = ?1 AND m.date = ?2",
            rusqlite::params![user_id, date.format(DATE_FMT).to_string()],
        )
    }

    fn get_by_month(&self, user_id: &str, month: u32, year: i32) -> Result<Vec<Memory>> {
        let Some((start, end)) = crate::week::month_bounds(month, year) else {
            return Ok(Vec::new());
        };
        let mut memories = self.get_by_range(user_id, start, end)?;
        memories.reverse();
        Ok(memories)
    }

    fn get_by_range(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories m \
             WHERE m.user_id = ?1 AND m.date >= ?2 AND m.date <= ?3 \
             ORDER BY m.date ASC",
            MEMORY_COLUMNS
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![
                user_id,
                start.format(DATE_FMT).to_string(),
                end.format(DATE_FMT).to_string()
            ],
            |row| memory_at(row, 0),
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn get_by_id(&self, user_id: &str, id: &str) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        memory_where(&conn, "m.user_id = ?1 AND m.id = ?2", rusqlite::params![user_id, id])
    }

    fn get_all(&self, user_id: &str) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories m WHERE m.user_id = ?1 ORDER BY m.date DESC",
            MEMORY_COLUMNS
        ))?;
        let rows = stmt.query_map(rusqlite::params![user_id], |row| memory_at(row, 0))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn delete(&self, user_id: &str, date: NaiveDate) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        let date_str = date.format(DATE_FMT).to_string();
        let existing = memory_where(
            &conn,
            "m.user_id = ?1 AND m.date = ?2",
            rusqlite::params![user_id, date_str],
        )?;
        if existing.is_some() {
            conn.execute(
                "DELETE FROM memories WHERE user_id = ?1 AND date = ?2",
                rusqlite::params![user_id, date_str],
            )?;
        }
        Ok(existing)
    }

    fn upsert(
        &self,
        user_id: &str,
        date: NaiveDate,
        text: &str,
        mood: Option<Mood>,
        prompt: Option<&str>,
    ) -> Result<Memory> {
        let conn = self.conn()?;
        let now = fmt_dt(&Utc::now());
        let date_str = date.format(DATE_FMT).to_string();
        conn.execute(
            "INSERT INTO memories \
             (id, user_id, date, text, mood, prompt, word_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                text = excluded.text, \
                mood = excluded.mood, \
                prompt = excluded.prompt, \
                word_count = excluded.word_count, \
                updated_at = excluded.updated_at",
            rusqlite::params![
                crate::types::new_id("mem"),
                user_id,
                date_str,
                text,
                mood.map(|m| m.as_str()),
                prompt,
                crate::types::word_count(text),
                now,
            ],
        )?;

        memory_where(
            &conn,
            "m.user_id = ?1 AND m.date = ?2",
            rusqlite::params![user_id, date_str],
        )?
        .ok_or_else(|| anyhow::anyhow!("memory for {} vanished after upsert", date_str))
    }
}

impl ReflectionStore for SqliteStore {
    fn insert_reflection(&self, reflection: &Reflection) -> Result<()> {
        let conn = self.conn()?;
        insert_reflection_on(&conn, reflection)
    }

    fn insert_weekly_selection(&self, selection: &WeeklySelection) -> Result<()> {
        let conn = self.conn()?;
        insert_weekly_on(&conn, selection)
    }

    fn insert_monthly_selection(&self, selection: &MonthlySelection) -> Result<()> {
        let conn = self.conn()?;
        insert_monthly_on(&conn, selection)
    }

    fn record_reflection(
        &self,
        reflection: &Reflection,
        selection: Option<&PeriodSelection>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        insert_reflection_on(&tx, reflection)?;
        match selection {
            Some(PeriodSelection::Weekly(s)) => insert_weekly_on(&tx, s)?,
            Some(PeriodSelection::Monthly(s)) => insert_monthly_on(&tx, s)?,
            None => {}
        }
        tx.commit()?;
        Ok(())
    }

    fn get_reflection_by_id(&self, id: &str) -> Result<Option<Reflection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reflections r WHERE r.id = ?1",
            REFLECTION_COLUMNS
        ))?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| reflection_at(row, 0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_reflections(&self, user_id: &str) -> Result<Vec<Reflection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reflections r WHERE r.user_id = ?1 \
             ORDER BY r.created_at DESC, r.rowid DESC",
            REFLECTION_COLUMNS
        ))?;
        let rows = stmt.query_map(rusqlite::params![user_id], |row| reflection_at(row, 0))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn weekly_selections_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeeklySelectionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT s.id, s.user_id, s.week, s.year, s.memory_id, s.reflection_id, s.created_at, \
                    {}, {} \
             FROM weekly_selections s \
             LEFT JOIN reflections r ON r.id = s.reflection_id AND r.user_id = s.user_id \
             LEFT JOIN memories m ON m.id = s.memory_id AND m.user_id = s.user_id \
             WHERE s.user_id = ?1 AND m.date >= ?2 AND m.date <= ?3 \
             ORDER BY m.date ASC",
            REFLECTION_COLUMNS, MEMORY_COLUMNS
        ))?;

        let rows = stmt.query_map(
            rusqlite::params![
                user_id,
                start.format(DATE_FMT).to_string(),
                end.format(DATE_FMT).to_string()
            ],
            |row| {
                let selection = WeeklySelection {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    week: row.get(2)?,
                    year: row.get(3)?,
                    memory_id: row.get(4)?,
                    reflection_id: row.get(5)?,
                    created_at: parse_dt(row.get::<_, String>(6)?),
                };
                let reflection = match row.get::<_, Option<String>>(7)? {
                    Some(_) => Some(reflection_at(row, 7)?),
                    None => None,
                };
                let memory_base = 7 + REFLECTION_WIDTH;
                let memory = match row.get::<_, Option<String>>(memory_base)? {
                    Some(_) => Some(memory_at(row, memory_base)?),
                    None => None,
                };
                Ok(WeeklySelectionRow { selection, reflection, memory })
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn monthly_selections_for_year(
        &self,
        user_id: &str,
        year: i32,
    ) -> Result<Vec<MonthlySelectionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT s.id, s.user_id, s.month, s.year, s.weekly_reflection_id, s.reflection_id, \
                    s.created_at, {} \
             FROM monthly_selections s \
             LEFT JOIN reflections r ON r.id = s.reflection_id AND r.user_id = s.user_id \
             WHERE s.user_id = ?1 AND s.year = ?2 \
             ORDER BY s.month ASC",
            REFLECTION_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![user_id, year], |row| {
            let selection = MonthlySelection {
                id: row.get(0)?,
                user_id: row.get(1)?,
                month: row.get(2)?,
                year: row.get(3)?,
                weekly_reflection_id: row.get(4)?,
                reflection_id: row.get(5)?,
                created_at: parse_dt(row.get::<_, String>(6)?),
            };
            let reflection = match row.get::<_, Option<String>>(7)? {
                Some(_) => Some(reflection_at(row, 7)?),
                None => None,
            };
            Ok(MonthlySelectionRow { selection, reflection })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn has_reflection_for(&self, user_id: &str, period: &Period) -> Result<bool> {
        let conn = self.conn()?;
        let (week, month) = key_parts(period);
        let mut stmt = conn.prepare(
            "SELECT 1 FROM reflections \
             WHERE user_id = ?1 AND tier = ?2 AND IFNULL(week, 0) = ?3 \
               AND IFNULL(month, 0) = ?4 AND year = ?5 \
             LIMIT 1",
        )?;
        let found = stmt.exists(rusqlite::params![
            user_id,
            period.tier().as_str(),
            week,
            month,
            period.year()
        ])?;
        Ok(found)
    }

    fn find_trigger(&self, user_id: &str, period: &Period) -> Result<Option<Trigger>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, tier, week, month, year, completed, trigger_date \
             FROM reflection_triggers \
             WHERE user_id = ?1 AND tier = ?2 AND week = ?3 AND month = ?4 AND year = ?5",
        )?;
        let (week, month) = key_parts(period);
        let mut rows = stmt.query_map(
            rusqlite::params![user_id, period.tier().as_str(), week, month, period.year()],
            trigger_from_row,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn insert_trigger(&self, trigger: &Trigger) -> Result<bool> {
        let conn = self.conn()?;
        let (week, month) = key_parts(&trigger.period);
        let changed = conn.execute(
            "INSERT OR IGNORE INTO reflection_triggers \
             (id, user_id, tier, week, month, year, completed, trigger_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                trigger.id,
                trigger.user_id,
                trigger.period.tier().as_str(),
                week,
                month,
                trigger.period.year(),
                trigger.completed,
                trigger.trigger_date.format(DATE_FMT).to_string(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn mark_trigger_completed(&self, user_id: &str, period: &Period) -> Result<bool> {
        let conn = self.conn()?;
        let (week, month) = key_parts(period);
        let changed = conn.execute(
            "UPDATE reflection_triggers SET completed = 1 \
             WHERE user_id = ?1 AND tier = ?2 AND week = ?3 AND month = ?4 AND year = ?5 \
               AND completed = 0",
            rusqlite::params![user_id, period.tier().as_str(), week, month, period.year()],
        )?;
        Ok(changed > 0)
    }

    fn get_pending_triggers(&self, user_id: &str) -> Result<Vec<Trigger>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, tier, week, month, year, completed, trigger_date \
             FROM reflection_triggers \
             WHERE user_id = ?1 AND completed = 0 \
             ORDER BY trigger_date ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id], trigger_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn memory_where(
    conn: &Connection,
    predicate: &str,
    params: impl rusqlite::Params,
) -> Result<Option<Memory>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM memories m WHERE {} LIMIT 1",
        MEMORY_COLUMNS, predicate
    ))?;
    let mut rows = stmt.query_map(params, |row| memory_at(row, 0))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

fn insert_reflection_on(conn: &Connection, reflection: &Reflection) -> Result<()> {
    conn.execute(
        "INSERT INTO reflections \
         (id, user_id, tier, seed_memory_id, narrative, tone, created_at, \
          week, month, year, prompt_used) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            reflection.id,
            reflection.user_id,
            reflection.tier.as_str(),
            reflection.seed_memory_id,
            reflection.narrative,
            reflection.tone.as_str(),
            fmt_dt(&reflection.created_at),
            reflection.period.week(),
            reflection.period.month(),
            reflection.period.year(),
            reflection.prompt_used,
        ],
    )?;
    Ok(())
}

fn insert_weekly_on(conn: &Connection, selection: &WeeklySelection) -> Result<()> {
    conn.execute(
        "INSERT INTO weekly_selections \
         (id, user_id, week, year, memory_id, reflection_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (user_id, week, year) DO UPDATE SET \
            memory_id = excluded.memory_id, \
            reflection_id = excluded.reflection_id, \
            created_at = excluded.created_at",
        rusqlite::params![
            selection.id,
            selection.user_id,
            selection.week,
            selection.year,
            selection.memory_id,
            selection.reflection_id,
            fmt_dt(&selection.created_at),
        ],
    )?;
    Ok(())
}

fn insert_monthly_on(conn: &Connection, selection: &MonthlySelection) -> Result<()> {
    conn.execute(
        "INSERT INTO monthly_selections \
         (id, user_id, month, year, weekly_reflection_id, reflection_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (user_id, month, year) DO UPDATE SET \
            weekly_reflection_id = excluded.weekly_reflection_id, \
            reflection_id = excluded.reflection_id, \
            created_at = excluded.created_at",
        rusqlite::params![
            selection.id,
            selection.user_id,
            selection.month,
            selection.year,
            selection.weekly_reflection_id,
            selection.reflection_id,
            fmt_dt(&selection.created_at),
        ],
    )?;
    Ok(())
}

fn key_parts(period: &Period) -> (u32, u32) {
    (period.week().unwrap_or(0), period.month().unwrap_or(0))
}

fn memory_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Memory> {
    let mood: Option<String> = row.get(base + 4)?;
    Ok(Memory {
        id: row.get(base)?,
        user_id: row.get(base + 1)?,
        date: parse_date(base + 2, row.get(base + 2)?)?,
        text: row.get(base + 3)?,
        mood: mood.as_deref().and_then(Mood::from_str),
        prompt: row.get(base + 5)?,
        word_count: row.get(base + 6)?,
        created_at: parse_dt(row.get::<_, String>(base + 7)?),
        updated_at: parse_dt(row.get::<_, String>(base + MEMORY_WIDTH - 1)?),
    })
}

fn reflection_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Reflection> {
    let tier_str: String = row.get(base + 2)?;
    let tier = Tier::from_str(&tier_str)
        .ok_or_else(|| bad_column(base + 2, format!("unknown tier '{}'", tier_str)))?;
    let tone_str: String = row.get(base + 5)?;
    let tone = Tone::from_str(&tone_str)
        .ok_or_else(|| bad_column(base + 5, format!("unknown tone '{}'", tone_str)))?;
    let period = Period::from_parts(
        tier,
        row.get(base + 7)?,
        row.get(base + 8)?,
        row.get(base + 9)?,
    )
        .ok_or_else(|| bad_column(base + 7, format!("{} reflection without period", tier_str)))?;

    Ok(Reflection {
        id: row.get(base)?,
        user_id: row.get(base + 1)?,
        tier,
        seed_memory_id: row.get(base + 3)?,
        narrative: row.get(base + 4)?,
        tone,
        created_at: parse_dt(row.get::<_, String>(base + 6)?),
        period,
        prompt_used: row.get(base + REFLECTION_WIDTH - 1)?,
    })
}

fn trigger_from_row(row: &Row<'_>) -> rusqlite::Result<Trigger> {
    let tier_str: String = row.get(2)?;
    let tier = Tier::from_str(&tier_str)
        .ok_or_else(|| bad_column(2, format!("unknown tier '{}'", tier_str)))?;
    let week: u32 = row.get(3)?;
    let month: u32 = row.get(4)?;
    let period = Period::from_parts(
        tier,
        Some(week).filter(|w| *w > 0),
        Some(month).filter(|m| *m > 0),
        row.get(5)?,
    )
    .ok_or_else(|| bad_column(3, format!("{} trigger without period", tier_str)))?;

    Ok(Trigger {
        id: row.get(0)?,
        user_id: row.get(1)?,
        period,
        completed: row.get::<_, i64>(6)? != 0,
        trigger_date: parse_date(7, row.get(7)?)?,
    })
}

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn parse_date(idx: usize, s: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&s, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn fmt_dt(dt: &chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

fn parse_dt(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
