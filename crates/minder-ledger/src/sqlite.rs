//! SQLite-based ledger implementation

use chrono::{Duration as ChronoDuration, NaiveDate};
use minder_api::UsageSegment;
use minder_util::{week_start, ItemId, ProfileId};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{Ledger, LedgerResult};

/// SQLite-based ledger
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create a ledger at the given path
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    /// Create an in-memory ledger (for testing)
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- Usage segments (append-only; duplicates keyed away)
            CREATE TABLE IF NOT EXISTS usage_segments (
                profile_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                day TEXT NOT NULL,
                PRIMARY KEY (profile_id, item_id, started_at)
            );

            -- Bonus grants (append-only)
            CREATE TABLE IF NOT EXISTS bonus_grants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id TEXT NOT NULL,
                minutes INTEGER NOT NULL,
                granted_at TEXT NOT NULL,
                day TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_segments_day
                ON usage_segments(profile_id, item_id, day);
            CREATE INDEX IF NOT EXISTS idx_bonus_day
                ON bonus_grants(profile_id, day);
            "#,
        )?;

        debug!("Ledger schema initialized");
        Ok(())
    }
}

impl Ledger for SqliteLedger {
    fn append_segment(&self, profile: &ProfileId, segment: &UsageSegment) -> LedgerResult<bool> {
        // Sub-second spans carry no budget and are dropped outright
        if segment.duration_seconds < 1 {
            debug!(
                profile = %profile,
                item = %segment.item_id,
                "Sub-second segment discarded"
            );
            return Ok(false);
        }

        let conn = self.conn.lock().unwrap();
        let day = segment.started_at.date_naive().format("%Y-%m-%d").to_string();

        // Blind re-sends after reconnects hit the primary key and are ignored
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO usage_segments
                (profile_id, item_id, started_at, ended_at, duration_secs, day)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                profile.as_str(),
                segment.item_id.as_str(),
                segment.started_at.to_rfc3339(),
                segment.ended_at.to_rfc3339(),
                segment.duration_seconds as i64,
                day,
            ],
        )?;

        if inserted > 0 {
            debug!(
                profile = %profile,
                item = %segment.item_id,
                secs = segment.duration_seconds,
                "Segment recorded"
            );
        } else {
            debug!(
                profile = %profile,
                item = %segment.item_id,
                "Duplicate segment ignored"
            );
        }

        Ok(inserted > 0)
    }

    fn usage_on(&self, profile: &ProfileId, item: &ItemId, day: NaiveDate) -> LedgerResult<u64> {
        let conn = self.conn.lock().unwrap();
        let day_str = day.format("%Y-%m-%d").to_string();

        let secs: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(duration_secs), 0) FROM usage_segments
            WHERE profile_id = ? AND item_id = ? AND day = ?
            "#,
            params![profile.as_str(), item.as_str(), day_str],
            |row| row.get(0),
        )?;

        Ok(secs as u64)
    }

    fn usage_in_week(
        &self,
        profile: &ProfileId,
        item: &ItemId,
        day: NaiveDate,
    ) -> LedgerResult<u64> {
        let conn = self.conn.lock().unwrap();
        let monday = week_start(day);
        let sunday = monday + ChronoDuration::days(6);

        let secs: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(duration_secs), 0) FROM usage_segments
            WHERE profile_id = ? AND item_id = ? AND day BETWEEN ? AND ?
            "#,
            params![
                profile.as_str(),
                item.as_str(),
                monday.format("%Y-%m-%d").to_string(),
                sunday.format("%Y-%m-%d").to_string(),
            ],
            |row| row.get(0),
        )?;

        Ok(secs as u64)
    }

    fn grant_bonus(&self, profile: &ProfileId, minutes: u32) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = minder_util::now();
        let day = now.date_naive().format("%Y-%m-%d").to_string();

        conn.execute(
            "INSERT INTO bonus_grants (profile_id, minutes, granted_at, day) VALUES (?, ?, ?, ?)",
            params![profile.as_str(), minutes as i64, now.to_rfc3339(), day],
        )?;

        debug!(profile = %profile, minutes, "Bonus granted");
        Ok(())
    }

    fn bonus_minutes_on(&self, profile: &ProfileId, day: NaiveDate) -> LedgerResult<u64> {
        let conn = self.conn.lock().unwrap();
        let day_str = day.format("%Y-%m-%d").to_string();

        let minutes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(minutes), 0) FROM bonus_grants WHERE profile_id = ? AND day = ?",
            params![profile.as_str(), day_str],
            |row| row.get(0),
        )?;

        Ok(minutes as u64)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Ledger lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use minder_budget::{remaining, LimitSet, Remaining};

    fn segment(item: &str, started: chrono::DateTime<Local>, secs: u64) -> UsageSegment {
        UsageSegment {
            item_id: ItemId::new(item),
            started_at: started,
            ended_at: started + ChronoDuration::seconds(secs as i64),
            duration_seconds: secs,
        }
    }

    #[test]
    fn test_in_memory_ledger() {
        let ledger = SqliteLedger::in_memory().unwrap();
        assert!(ledger.is_healthy());
    }

    #[test]
    fn test_append_and_sum() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");
        let start = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();

        assert!(ledger.append_segment(&profile, &segment("minecraft", start, 60)).unwrap());
        assert!(ledger
            .append_segment(
                &profile,
                &segment("minecraft", start + ChronoDuration::seconds(60), 45)
            )
            .unwrap());

        let day = start.date_naive();
        assert_eq!(ledger.usage_on(&profile, &item, day).unwrap(), 105);
    }

    #[test]
    fn test_duplicate_segment_ignored() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");
        let start = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();
        let seg = segment("minecraft", start, 60);

        assert!(ledger.append_segment(&profile, &seg).unwrap());
        // Re-sent after a reconnect: ignored, never double-counted
        assert!(!ledger.append_segment(&profile, &seg).unwrap());

        assert_eq!(
            ledger.usage_on(&profile, &item, start.date_naive()).unwrap(),
            60
        );
    }

    #[test]
    fn test_sub_second_segment_discarded() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");
        let start = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();

        assert!(!ledger.append_segment(&profile, &segment("minecraft", start, 0)).unwrap());
        assert_eq!(
            ledger.usage_on(&profile, &item, start.date_naive()).unwrap(),
            0
        );
    }

    #[test]
    fn test_day_scoping() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");

        let tue = Local.with_ymd_and_hms(2026, 8, 18, 15, 0, 0).unwrap();
        let wed = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();

        ledger.append_segment(&profile, &segment("minecraft", tue, 300)).unwrap();
        ledger.append_segment(&profile, &segment("minecraft", wed, 120)).unwrap();

        assert_eq!(ledger.usage_on(&profile, &item, wed.date_naive()).unwrap(), 120);
        assert_eq!(ledger.usage_on(&profile, &item, tue.date_naive()).unwrap(), 300);
    }

    #[test]
    fn test_week_scoping() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");

        // 2026-08-19 is a Wednesday; its ISO week runs Mon 08-17 .. Sun 08-23
        let monday = Local.with_ymd_and_hms(2026, 8, 17, 10, 0, 0).unwrap();
        let wednesday = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();
        let prev_sunday = Local.with_ymd_and_hms(2026, 8, 16, 15, 0, 0).unwrap();

        ledger.append_segment(&profile, &segment("minecraft", monday, 100)).unwrap();
        ledger.append_segment(&profile, &segment("minecraft", wednesday, 200)).unwrap();
        ledger.append_segment(&profile, &segment("minecraft", prev_sunday, 999)).unwrap();

        assert_eq!(
            ledger
                .usage_in_week(&profile, &item, wednesday.date_naive())
                .unwrap(),
            300
        );
    }

    #[test]
    fn test_items_do_not_share_budget() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let start = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();

        ledger.append_segment(&profile, &segment("minecraft", start, 600)).unwrap();
        ledger.append_segment(&profile, &segment("roblox", start, 60)).unwrap();

        let day = start.date_naive();
        assert_eq!(
            ledger.usage_on(&profile, &ItemId::new("minecraft"), day).unwrap(),
            600
        );
        assert_eq!(
            ledger.usage_on(&profile, &ItemId::new("roblox"), day).unwrap(),
            60
        );
    }

    #[test]
    fn test_bonus_grants_accumulate() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let today = minder_util::now().date_naive();

        ledger.grant_bonus(&profile, 10).unwrap();
        ledger.grant_bonus(&profile, 5).unwrap();

        assert_eq!(ledger.bonus_minutes_on(&profile, today).unwrap(), 15);
    }

    #[test]
    fn test_snapshot_feeds_budget() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");
        let now = minder_util::now();

        ledger.append_segment(&profile, &segment("minecraft", now, 1800)).unwrap();
        ledger.grant_bonus(&profile, 10).unwrap();

        let limits = LimitSet {
            daily_limit_minutes: Some(60),
            weekly_limit_minutes: None,
            max_daily_minutes: 0,
        };
        let snapshot = ledger
            .snapshot(&profile, &item, limits, now.date_naive())
            .unwrap();

        assert_eq!(snapshot.today_seconds, 1800);
        assert_eq!(snapshot.bonus_minutes_today, 10);
        assert_eq!(remaining(&snapshot), Remaining::Seconds(2400));
    }

    #[test]
    fn test_persistence_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let profile = ProfileId::new("kid-a");
        let item = ItemId::new("minecraft");
        let start = Local.with_ymd_and_hms(2026, 8, 19, 15, 0, 0).unwrap();

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.append_segment(&profile, &segment("minecraft", start, 500)).unwrap();
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        assert_eq!(
            reopened.usage_on(&profile, &item, start.date_naive()).unwrap(),
            500
        );
    }
}
