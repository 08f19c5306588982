//! Async session driver
//!
//! One task per surface. Owns the tracker, drives it from a 1s interval,
//! maps navigation events to session transitions, and publishes display
//! state over a watch channel for the surface chrome (countdown pill,
//! warning toast, limit banner).

use minder_api::UsageSegment;
use minder_budget::{Remaining, UsageSnapshot};
use minder_util::{ItemId, MonotonicInstant, ProfileId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{SessionError, SessionTracker, StartOutcome, TrackerEvent};

/// Upper bound on authoritative snapshot reads. On expiry the surface shows
/// a manual-retry error instead of backing off automatically.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the warning toast and limit banner stay asserted before the
/// tick loop clears them. They inform, they do not block.
pub const BANNER_WINDOW: Duration = Duration::from_secs(5);

/// Reads and writes against the usage ledger, typically over the daemon
/// socket.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    async fn fetch_snapshot(
        &self,
        profile: &ProfileId,
        item: &ItemId,
    ) -> Result<UsageSnapshot, SessionError>;

    async fn append_segment(
        &self,
        profile: &ProfileId,
        segment: &UsageSegment,
    ) -> Result<bool, SessionError>;
}

/// Final-flush sender used at teardown. Implementations must hand the
/// segment off without awaiting a reply; the process may be exiting.
pub trait ExitSender: Send + Sync {
    fn send_final(&self, profile: &ProfileId, segment: UsageSegment);
}

/// Navigation events from the surface's content host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// The user opened a restricted item
    Entered(ItemId),
    /// The surface lost visibility (app backgrounded, screen off)
    Hidden,
    /// The surface regained visibility
    Revealed,
    /// The user navigated away from the item
    Left,
}

/// What the surface chrome should show right now
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub item_id: Option<ItemId>,
    /// Predictive countdown; `None` while idle or unlimited
    pub remaining: Option<Duration>,
    pub unlimited: bool,
    /// Set when the one-minute warning fires; cleared after `BANNER_WINDOW`
    pub warning: Option<Duration>,
    /// Asserted for `BANNER_WINDOW` after enforcement or a refused entry
    pub limit_reached: bool,
    /// Snapshot read failed; the user retries by re-entering
    pub load_error: Option<String>,
}

/// Monotonic now from the same clock the tokio timers run on
fn mono_now() -> MonotonicInstant {
    tokio::time::Instant::now().into_std().into()
}

/// Per-surface session driver
pub struct SessionDriver<L, E> {
    profile: ProfileId,
    ledger: Arc<L>,
    exit: Arc<E>,
    tracker: SessionTracker,
    nav_rx: mpsc::Receiver<NavEvent>,
    display_tx: watch::Sender<DisplayState>,

    /// Banner expiry deadlines, cleared by the tick loop
    warning_until: Option<MonotonicInstant>,
    limit_until: Option<MonotonicInstant>,
}

impl<L: LedgerClient, E: ExitSender> SessionDriver<L, E> {
    pub fn new(
        profile: ProfileId,
        ledger: Arc<L>,
        exit: Arc<E>,
    ) -> (Self, mpsc::Sender<NavEvent>, watch::Receiver<DisplayState>) {
        let (nav_tx, nav_rx) = mpsc::channel(16);
        let (display_tx, display_rx) = watch::channel(DisplayState::default());

        let driver = Self {
            profile,
            ledger,
            exit,
            tracker: SessionTracker::new(),
            nav_rx,
            display_tx,
            warning_until: None,
            limit_until: None,
        };

        (driver, nav_tx, display_rx)
    }

    /// Run until the navigation channel closes, then flush and exit
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick().await;
                }
                nav = self.nav_rx.recv() => {
                    match nav {
                        Some(event) => self.on_nav(event).await,
                        None => break,
                    }
                }
            }
        }

        self.teardown();
    }

    async fn on_nav(&mut self, event: NavEvent) {
        let now = minder_util::now();
        let now_mono = mono_now();

        match event {
            NavEvent::Entered(item_id) => {
                let snapshot = match self.fetch_snapshot(&item_id).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(item_id = %item_id, error = %e, "Usage read failed");
                        self.display_tx.send_modify(|d| {
                            d.load_error = Some(e.to_string());
                        });
                        return;
                    }
                };

                let (outcome, flushed) =
                    self.tracker.start(item_id.clone(), &snapshot, now, now_mono);
                if let Some(segment) = flushed {
                    self.append(&segment).await;
                }

                match outcome {
                    StartOutcome::Started { remaining } => {
                        info!(item_id = %item_id, remaining = ?remaining, "Entered item");
                        self.warning_until = None;
                        self.limit_until = None;
                        self.display_tx.send_modify(|d| {
                            *d = DisplayState {
                                item_id: Some(item_id),
                                remaining: remaining.as_secs().map(Duration::from_secs),
                                unlimited: remaining == Remaining::Unlimited,
                                ..Default::default()
                            };
                        });
                    }
                    StartOutcome::Exhausted => {
                        info!(item_id = %item_id, "Entry refused: budget exhausted");
                        self.limit_until = Some(now_mono + BANNER_WINDOW);
                        self.display_tx.send_modify(|d| {
                            *d = DisplayState {
                                limit_reached: true,
                                ..Default::default()
                            };
                        });
                    }
                }
            }
            NavEvent::Hidden => {
                if let Some(segment) = self.tracker.pause(now, now_mono) {
                    self.append(&segment).await;
                }
            }
            NavEvent::Revealed => {
                self.tracker.resume(now, now_mono);
            }
            NavEvent::Left => {
                if let Some(segment) = self.tracker.finish(now, now_mono) {
                    self.append(&segment).await;
                }
                self.warning_until = None;
                self.limit_until = None;
                self.display_tx.send_modify(|d| *d = DisplayState::default());
            }
        }
    }

    async fn on_tick(&mut self) {
        let now = minder_util::now();
        let now_mono = mono_now();

        for event in self.tracker.tick(now, now_mono) {
            match event {
                TrackerEvent::Warning { item_id, remaining } => {
                    info!(item_id = %item_id, remaining_secs = remaining.as_secs(), "Time warning");
                    self.warning_until = Some(now_mono + BANNER_WINDOW);
                    self.display_tx.send_modify(|d| d.warning = Some(remaining));
                }
                TrackerEvent::HeartbeatDue { item_id, segment } => {
                    // A failed heartbeat is superseded by the next one;
                    // at most one interval of usage is at risk
                    if self.append(&segment).await {
                        match self.fetch_snapshot(&item_id).await {
                            Ok(snapshot) => self.tracker.apply_snapshot(&snapshot),
                            Err(e) => {
                                debug!(error = %e, "Snapshot refresh after heartbeat failed")
                            }
                        }
                    }
                }
                TrackerEvent::LimitReached {
                    item_id,
                    final_segment,
                } => {
                    info!(item_id = %item_id, "Limit reached");
                    if let Some(segment) = final_segment {
                        self.append(&segment).await;
                    }
                    self.limit_until = Some(now_mono + BANNER_WINDOW);
                    self.display_tx.send_modify(|d| {
                        *d = DisplayState {
                            limit_reached: true,
                            ..Default::default()
                        };
                    });
                }
            }
        }

        if let Some(until) = self.warning_until
            && now_mono >= until
        {
            self.warning_until = None;
            self.display_tx.send_modify(|d| d.warning = None);
        }
        if let Some(until) = self.limit_until
            && now_mono >= until
        {
            self.limit_until = None;
            self.display_tx.send_modify(|d| d.limit_reached = false);
        }

        if self.tracker.is_active() {
            let remaining = self.tracker.display_remaining();
            self.display_tx.send_if_modified(|d| {
                if d.remaining != remaining {
                    d.remaining = remaining;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Flush the live session through the non-blocking exit path
    fn teardown(&mut self) {
        if let Some(segment) = self.tracker.finish(minder_util::now(), mono_now()) {
            debug!(secs = segment.duration_seconds, "Final flush at teardown");
            self.exit.send_final(&self.profile, segment);
        }
    }

    async fn fetch_snapshot(&self, item_id: &ItemId) -> Result<UsageSnapshot, SessionError> {
        match tokio::time::timeout(
            SNAPSHOT_TIMEOUT,
            self.ledger.fetch_snapshot(&self.profile, item_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout),
        }
    }

    async fn append(&self, segment: &UsageSegment) -> bool {
        match self.ledger.append_segment(&self.profile, segment).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, secs = segment.duration_seconds, "Segment append failed");
                false
            }
        }
    }
}
