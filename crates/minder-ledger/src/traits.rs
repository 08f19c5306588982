//! Ledger trait definitions

use chrono::NaiveDate;
use minder_api::UsageSegment;
use minder_budget::{LimitSet, UsageSnapshot};
use minder_util::{ItemId, ProfileId};

use crate::LedgerResult;

/// Main ledger trait
pub trait Ledger: Send + Sync {
    // Usage segments

    /// Append one usage segment. Returns `true` if the segment was recorded,
    /// `false` if it was discarded (shorter than one second) or already
    /// present. Both are defined outcomes: surfaces flush blindly and may
    /// re-send after reconnects.
    fn append_segment(&self, profile: &ProfileId, segment: &UsageSegment) -> LedgerResult<bool>;

    /// Total recorded seconds for (profile, item) on one calendar day
    fn usage_on(&self, profile: &ProfileId, item: &ItemId, day: NaiveDate) -> LedgerResult<u64>;

    /// Total recorded seconds for (profile, item) in the ISO week
    /// containing `day` (Monday start)
    fn usage_in_week(
        &self,
        profile: &ProfileId,
        item: &ItemId,
        day: NaiveDate,
    ) -> LedgerResult<u64>;

    // Bonus grants

    /// Record a bonus grant for a profile
    fn grant_bonus(&self, profile: &ProfileId, minutes: u32) -> LedgerResult<()>;

    /// Total bonus minutes granted to a profile on one calendar day
    fn bonus_minutes_on(&self, profile: &ProfileId, day: NaiveDate) -> LedgerResult<u64>;

    // Snapshot assembly

    /// Assemble the usage snapshot the budget calculator consumes. Every
    /// reader goes through this one path so predictive and authoritative
    /// sides see identical figures.
    fn snapshot(
        &self,
        profile: &ProfileId,
        item: &ItemId,
        limits: LimitSet,
        day: NaiveDate,
    ) -> LedgerResult<UsageSnapshot> {
        Ok(UsageSnapshot {
            today_seconds: self.usage_on(profile, item, day)?,
            week_seconds: self.usage_in_week(profile, item, day)?,
            bonus_minutes_today: self.bonus_minutes_on(profile, day)?,
            limits,
        })
    }

    // Health

    /// Check if the ledger is healthy
    fn is_healthy(&self) -> bool;
}
