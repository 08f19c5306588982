//! Session state machine
//!
//! One tracker per surface, owned by its driver. At most one session is live
//! at a time: starting a new session flushes the previous one first.
//!
//! All enforcement timing uses monotonic instants seeded once at start.
//! Pausing stops usage accrual but does not move the deadlines; the budget
//! keeps draining in real time while the session exists.

use chrono::{DateTime, Local};
use minder_api::UsageSegment;
use minder_budget::{remaining, Remaining, UsageSnapshot};
use minder_util::{ItemId, MonotonicInstant, SessionId};
use std::time::Duration;
use tracing::debug;

/// How often an active, unpaused session rotates its segment out for a
/// heartbeat append
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// How far before enforcement the single warning fires
pub const WARNING_LEAD: Duration = Duration::from_secs(60);

/// Cap on how far out a deadline is scheduled. Misconfigured limits can put
/// the budget thousands of years out, past what `Instant` arithmetic can
/// represent on some platforms; no session outlives a year anyway.
const MAX_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Outcome of a start attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { remaining: Remaining },
    /// Budget already spent; no session was created
    Exhausted,
}

/// Events produced by `tick`
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// One minute left; fires at most once per session
    Warning { item_id: ItemId, remaining: Duration },

    /// A heartbeat segment is due for appending
    HeartbeatDue { item_id: ItemId, segment: UsageSegment },

    /// The enforcement deadline passed. Ends the session; carries the final
    /// segment when at least one unpaused second accrued.
    LimitReached {
        item_id: ItemId,
        final_segment: Option<UsageSegment>,
    },
}

#[derive(Debug)]
struct ActiveSession {
    session_id: SessionId,
    item_id: ItemId,
    paused: bool,

    /// Wall-clock start of the current (un-flushed) segment
    segment_started_at: DateTime<Local>,
    /// Monotonic accrual origin of the current segment
    segment_origin: MonotonicInstant,

    /// Absolute monotonic deadlines, seeded once at start
    warning_at: Option<MonotonicInstant>,
    enforce_at: Option<MonotonicInstant>,
    warning_issued: bool,

    next_heartbeat: MonotonicInstant,

    /// Predictive countdown shown between authoritative reads. None while
    /// unlimited.
    display_remaining: Option<Duration>,
    last_tick: MonotonicInstant,
}

impl ActiveSession {
    /// Rotate the current segment out, restarting accrual at `now`
    fn rotate_segment(
        &mut self,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> UsageSegment {
        let duration = now_mono.duration_since(self.segment_origin);
        let segment = UsageSegment {
            item_id: self.item_id.clone(),
            started_at: self.segment_started_at,
            ended_at: now,
            duration_seconds: duration.as_secs(),
        };

        self.segment_started_at = now;
        self.segment_origin = now_mono;

        segment
    }
}

/// Per-surface session tracker
#[derive(Debug, Default)]
pub struct SessionTracker {
    session: Option<ActiveSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.paused)
    }

    pub fn item_id(&self) -> Option<&ItemId> {
        self.session.as_ref().map(|s| &s.item_id)
    }

    /// Predictive remaining time for display. `None` when idle or unlimited.
    pub fn display_remaining(&self) -> Option<Duration> {
        self.session.as_ref().and_then(|s| s.display_remaining)
    }

    /// Start a session against an authoritative snapshot.
    ///
    /// Any live session is flushed first; its segment is returned alongside
    /// the outcome so the caller can append it.
    pub fn start(
        &mut self,
        item_id: ItemId,
        snapshot: &UsageSnapshot,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> (StartOutcome, Option<UsageSegment>) {
        let flushed = self.finish(now, now_mono);

        let budget = remaining(snapshot);
        if budget.is_exhausted() {
            debug!(item_id = %item_id, "Start refused: budget exhausted");
            return (StartOutcome::Exhausted, flushed);
        }

        let (warning_at, enforce_at, display) = match budget {
            Remaining::Unlimited => (None, None, None),
            Remaining::Seconds(n) => {
                let capped = Duration::from_secs(n).min(MAX_DEADLINE);
                let enforce = now_mono + capped;
                // No warning when less than the lead remains; the session
                // just ends at the deadline
                let warning =
                    (capped > WARNING_LEAD).then(|| now_mono + (capped - WARNING_LEAD));
                (warning, Some(enforce), Some(Duration::from_secs(n)))
            }
        };

        let session = ActiveSession {
            session_id: SessionId::new(),
            item_id: item_id.clone(),
            paused: false,
            segment_started_at: now,
            segment_origin: now_mono,
            warning_at,
            enforce_at,
            warning_issued: false,
            next_heartbeat: now_mono + HEARTBEAT_INTERVAL,
            display_remaining: display,
            last_tick: now_mono,
        };

        debug!(
            session_id = %session.session_id,
            item_id = %item_id,
            remaining = ?budget,
            "Session started"
        );

        self.session = Some(session);
        (StartOutcome::Started { remaining: budget }, flushed)
    }

    /// Advance the tracker. Driven roughly every second.
    ///
    /// Enforcement is checked before the heartbeat so that when both fall
    /// due in the same tick exactly one `LimitReached` comes out, carrying
    /// the final segment.
    pub fn tick(
        &mut self,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<TrackerEvent> {
        let mut events = Vec::new();

        let Some(session) = &mut self.session else {
            return events;
        };

        // Predictive countdown only moves while unpaused
        if !session.paused {
            let since_last = now_mono.duration_since(session.last_tick);
            if let Some(display) = &mut session.display_remaining {
                *display = display.saturating_sub(since_last);
            }
        }
        session.last_tick = now_mono;

        if let Some(enforce_at) = session.enforce_at
            && now_mono >= enforce_at
        {
            let item_id = session.item_id.clone();
            let final_segment = self.finish(now, now_mono);
            events.push(TrackerEvent::LimitReached {
                item_id,
                final_segment,
            });
            return events;
        }

        if let Some(warning_at) = session.warning_at
            && !session.warning_issued
            && now_mono >= warning_at
        {
            session.warning_issued = true;
            let remaining = session
                .enforce_at
                .map(|e| e.saturating_duration_until(now_mono))
                .unwrap_or_default();
            events.push(TrackerEvent::Warning {
                item_id: session.item_id.clone(),
                remaining,
            });
        }

        if !session.paused && now_mono >= session.next_heartbeat {
            let segment = session.rotate_segment(now, now_mono);
            session.next_heartbeat = now_mono + HEARTBEAT_INTERVAL;
            events.push(TrackerEvent::HeartbeatDue {
                item_id: session.item_id.clone(),
                segment,
            });
        }

        events
    }

    /// Correct the predictive countdown from an authoritative snapshot.
    /// Never reschedules the deadlines.
    pub fn apply_snapshot(&mut self, snapshot: &UsageSnapshot) {
        if let Some(session) = &mut self.session {
            session.display_remaining = remaining(snapshot)
                .as_secs()
                .map(Duration::from_secs);
        }
    }

    /// Pause accrual. Emits the segment accumulated so far. Deadlines keep
    /// running.
    pub fn pause(
        &mut self,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Option<UsageSegment> {
        let session = self.session.as_mut()?;
        if session.paused {
            return None;
        }

        let segment = session.rotate_segment(now, now_mono);
        session.paused = true;
        debug!(session_id = %session.session_id, "Session paused");
        Some(segment)
    }

    /// Resume accrual from now
    pub fn resume(&mut self, now: DateTime<Local>, now_mono: MonotonicInstant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.paused {
            return;
        }

        session.paused = false;
        session.segment_started_at = now;
        session.segment_origin = now_mono;
        session.next_heartbeat = now_mono + HEARTBEAT_INTERVAL;
        debug!(session_id = %session.session_id, "Session resumed");
    }

    /// End the session and return its final segment. Idempotent: finishing
    /// an idle tracker is a no-op, so a heartbeat racing teardown can never
    /// double-count.
    pub fn finish(
        &mut self,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Option<UsageSegment> {
        let mut session = self.session.take()?;

        debug!(session_id = %session.session_id, "Session finished");

        if session.paused {
            // Accrual already stopped at pause; nothing new to flush
            return None;
        }

        let segment = session.rotate_segment(now, now_mono);
        (segment.duration_seconds >= 1).then_some(segment)
    }
}
