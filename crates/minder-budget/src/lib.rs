//! Time budget calculation for minder
//!
//! One pure function converts a usage snapshot into an authoritative
//! "remaining seconds" figure. The daemon uses it when answering usage
//! queries; the session tracker uses the same function to seed its
//! predictive countdown, so the two sides can never drift apart.
//!
//! Several independently-configured limits apply simultaneously; the most
//! restrictive one wins:
//! - daily limit: extended by today's bonus minutes
//! - weekly limit: a hard ceiling that bonus minutes never extend
//! - daily hard cap: a device-level ceiling that bonus minutes never extend

use serde::{Deserialize, Serialize};

/// Configured limits for one (profile, item) pair.
///
/// `None` means the limit is not configured; `max_daily_minutes = 0` means
/// the hard cap is off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSet {
    pub daily_limit_minutes: Option<u32>,
    pub weekly_limit_minutes: Option<u32>,
    #[serde(default)]
    pub max_daily_minutes: u32,
}

impl LimitSet {
    /// True when no limit of any kind is configured
    pub fn is_unlimited(&self) -> bool {
        self.daily_limit_minutes.is_none()
            && self.weekly_limit_minutes.is_none()
            && self.max_daily_minutes == 0
    }
}

/// Point-in-time read of accumulated usage plus configured limits for one
/// (profile, item) pair. Immutable value; re-fetch to observe change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Seconds recorded today (local calendar day)
    pub today_seconds: u64,
    /// Seconds recorded this ISO week (Monday start)
    pub week_seconds: u64,
    /// Bonus minutes granted today (parent- or challenge-granted)
    pub bonus_minutes_today: u64,
    #[serde(flatten)]
    pub limits: LimitSet,
}

/// Remaining budget for a snapshot.
///
/// `Unlimited` is a dedicated variant rather than a sentinel value, so
/// boundary comparisons are only ever written against `Seconds(_)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remaining {
    Unlimited,
    Seconds(u64),
}

impl Remaining {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Seconds(0))
    }

    pub fn as_secs(&self) -> Option<u64> {
        match self {
            Remaining::Unlimited => None,
            Remaining::Seconds(s) => Some(*s),
        }
    }
}

/// Compute the remaining budget for a snapshot.
///
/// One candidate per *configured* limit; the result is the minimum of the
/// candidates, floored at zero. No configured limits means unlimited.
pub fn remaining(snapshot: &UsageSnapshot) -> Remaining {
    let today = snapshot.today_seconds as i64;
    let week = snapshot.week_seconds as i64;
    let bonus = snapshot.bonus_minutes_today as i64 * 60;

    let mut candidates: Vec<i64> = Vec::with_capacity(3);

    if let Some(daily) = snapshot.limits.daily_limit_minutes {
        candidates.push(daily as i64 * 60 + bonus - today);
    }

    // Weekly is a hard ceiling: daily bonuses must not defeat it
    if let Some(weekly) = snapshot.limits.weekly_limit_minutes {
        candidates.push(weekly as i64 * 60 - week);
    }

    // The hard cap is likewise immune to grants
    if snapshot.limits.max_daily_minutes > 0 {
        candidates.push(snapshot.limits.max_daily_minutes as i64 * 60 - today);
    }

    match candidates.into_iter().min() {
        None => Remaining::Unlimited,
        Some(min) => Remaining::Seconds(min.max(0) as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        today: u64,
        week: u64,
        bonus: u64,
        daily: Option<u32>,
        weekly: Option<u32>,
        max_daily: u32,
    ) -> UsageSnapshot {
        UsageSnapshot {
            today_seconds: today,
            week_seconds: week,
            bonus_minutes_today: bonus,
            limits: LimitSet {
                daily_limit_minutes: daily,
                weekly_limit_minutes: weekly,
                max_daily_minutes: max_daily,
            },
        }
    }

    #[test]
    fn no_limits_is_unlimited() {
        let s = snapshot(100_000, 500_000, 30, None, None, 0);
        assert_eq!(remaining(&s), Remaining::Unlimited);
    }

    #[test]
    fn daily_limit_with_bonus() {
        // 60 min daily + 10 min bonus - 1800s used = 2400s
        let s = snapshot(1800, 5000, 10, Some(60), None, 0);
        assert_eq!(remaining(&s), Remaining::Seconds(2400));
    }

    #[test]
    fn hard_cap_ignores_bonus() {
        // daily candidate: 3600 - 3000 = 600; hard cap: 3000 - 3000 = 0
        let s = snapshot(3000, 3000, 0, Some(60), None, 50);
        assert_eq!(remaining(&s), Remaining::Seconds(0));
        assert!(remaining(&s).is_exhausted());
    }

    #[test]
    fn weekly_limit_excludes_bonus() {
        // weekly: 100*60 - 5900 = 100; a huge bonus doesn't change it
        let s = snapshot(0, 5900, 500, None, Some(100), 0);
        assert_eq!(remaining(&s), Remaining::Seconds(100));
    }

    #[test]
    fn most_restrictive_wins() {
        // daily: 3600+600-1000 = 3200; weekly: 6000-5000 = 1000; cap: 7200-1000 = 6200
        let s = snapshot(1000, 5000, 10, Some(60), Some(100), 120);
        assert_eq!(remaining(&s), Remaining::Seconds(1000));
    }

    #[test]
    fn floors_at_zero() {
        let s = snapshot(10_000, 10_000, 0, Some(60), None, 0);
        assert_eq!(remaining(&s), Remaining::Seconds(0));
    }

    #[test]
    fn bonus_can_revive_exhausted_daily() {
        // 30 min used against a 30 min limit, then 15 bonus minutes granted
        let exhausted = snapshot(1800, 1800, 0, Some(30), None, 0);
        assert!(remaining(&exhausted).is_exhausted());

        let granted = snapshot(1800, 1800, 15, Some(30), None, 0);
        assert_eq!(remaining(&granted), Remaining::Seconds(900));
    }

    #[test]
    fn zero_minute_daily_limit_is_configured() {
        // A configured 0-minute limit is exhaustion, not unlimited
        let s = snapshot(0, 0, 0, Some(0), None, 0);
        assert_eq!(remaining(&s), Remaining::Seconds(0));
    }

    #[test]
    fn snapshot_serializes_flat() {
        let s = snapshot(1800, 5000, 10, Some(60), None, 0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("daily_limit_minutes"));
        assert!(!json.contains("limits"));

        let parsed: UsageSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, s);
    }
}
