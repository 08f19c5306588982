//! Integration tests for minderd
//!
//! These tests verify the end-to-end behavior of the daemon.

use chrono::{Duration as ChronoDuration, Local};
use minder_api::{
    Command, ErrorCode, ResponsePayload, ResponseResult, SurfaceRole, SyncEvent, UsageSegment,
};
use minder_budget::{Remaining, remaining};
use minder_config::parse_config;
use minder_ledger::{Ledger, SqliteLedger};
use minder_session::{SessionTracker, StartOutcome, TrackerEvent};
use minder_util::{ItemId, MonotonicInstant, ProfileId};
use std::time::Duration;

const TEST_CONFIG: &str = r#"
    config_version = 1

    [[service.credentials]]
    token = "tok-kiosk"
    device_id = "kid-tablet"
    role = "kiosk"

    [[service.credentials]]
    token = "tok-admin"
    device_id = "parent-phone"
    role = "admin"

    [[profiles]]
    id = "kid-a"
    display_name = "Kid A"

    [[items]]
    id = "minecraft"
    label = "Minecraft"

    [[limits]]
    profile = "kid-a"
    item = "minecraft"
    daily_limit_minutes = 60
    weekly_limit_minutes = 300
"#;

fn segment(item: &str, offset_secs: i64, duration_secs: u64) -> UsageSegment {
    // Anchor at noon so offsets never cross a day boundary
    let noon = Local::now()
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_local_timezone(Local)
        .unwrap();
    let started_at = noon + ChronoDuration::seconds(offset_secs);
    UsageSegment {
        item_id: ItemId::new(item),
        started_at,
        ended_at: started_at + ChronoDuration::seconds(duration_secs as i64),
        duration_seconds: duration_secs,
    }
}

#[test]
fn test_config_loading() {
    let catalog = parse_config(TEST_CONFIG).unwrap();

    assert_eq!(catalog.profiles.len(), 1);
    assert_eq!(catalog.items.len(), 1);

    let kiosk = catalog.resolve_token("tok-kiosk").unwrap();
    assert_eq!(kiosk.role, SurfaceRole::Kiosk);
    assert!(kiosk.role.can_record_usage());
    assert!(!kiosk.role.can_grant_bonus());

    let admin = catalog.resolve_token("tok-admin").unwrap();
    assert_eq!(admin.role, SurfaceRole::Admin);
    assert!(admin.role.can_publish());

    assert!(catalog.resolve_token("tok-revoked").is_none());

    let limits = catalog.limit_set(&ProfileId::new("kid-a"), &ItemId::new("minecraft"));
    assert_eq!(limits.daily_limit_minutes, Some(60));
}

#[test]
fn test_usage_accounting() {
    let catalog = parse_config(TEST_CONFIG).unwrap();
    let ledger = SqliteLedger::in_memory().unwrap();
    let profile = ProfileId::new("kid-a");
    let item = ItemId::new("minecraft");
    let today = Local::now().date_naive();

    assert!(ledger.append_segment(&profile, &segment("minecraft", -3600, 1200)).unwrap());
    assert!(ledger.append_segment(&profile, &segment("minecraft", -1800, 600)).unwrap());

    let limits = catalog.limit_set(&profile, &item);
    let snapshot = ledger.snapshot(&profile, &item, limits, today).unwrap();

    assert_eq!(snapshot.today_seconds, 1800);
    // 60 min daily - 30 min used
    assert_eq!(remaining(&snapshot), Remaining::Seconds(1800));
}

#[test]
fn test_duplicate_flush_ignored() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let profile = ProfileId::new("kid-a");
    let seg = segment("minecraft", -600, 300);

    // Surfaces flush blindly after reconnects; the re-send is a no-op
    assert!(ledger.append_segment(&profile, &seg).unwrap());
    assert!(!ledger.append_segment(&profile, &seg).unwrap());

    let today = Local::now().date_naive();
    let usage = ledger
        .usage_on(&profile, &ItemId::new("minecraft"), today)
        .unwrap();
    assert_eq!(usage, 300);
}

#[test]
fn test_bonus_extends_daily_budget_only() {
    let catalog = parse_config(TEST_CONFIG).unwrap();
    let ledger = SqliteLedger::in_memory().unwrap();
    let profile = ProfileId::new("kid-a");
    let item = ItemId::new("minecraft");
    let today = Local::now().date_naive();

    // 50 of the 60 daily minutes already spent
    ledger
        .append_segment(&profile, &segment("minecraft", -7200, 3000))
        .unwrap();
    ledger.grant_bonus(&profile, 30).unwrap();

    let limits = catalog.limit_set(&profile, &item);
    let snapshot = ledger.snapshot(&profile, &item, limits, today).unwrap();

    assert_eq!(snapshot.bonus_minutes_today, 30);
    // Daily: 60 + 30 bonus - 50 used = 40 min. Weekly: 300 - 50 = 250 min.
    assert_eq!(remaining(&snapshot), Remaining::Seconds(2400));
}

#[test]
fn test_session_enforcement_against_ledger() {
    let catalog = parse_config(TEST_CONFIG).unwrap();
    let ledger = SqliteLedger::in_memory().unwrap();
    let profile = ProfileId::new("kid-a");
    let item = ItemId::new("minecraft");
    let today = Local::now().date_naive();

    // Two minutes of budget left
    ledger
        .append_segment(&profile, &segment("minecraft", -7200, 3480))
        .unwrap();

    let limits = catalog.limit_set(&profile, &item);
    let snapshot = ledger.snapshot(&profile, &item, limits, today).unwrap();
    assert_eq!(remaining(&snapshot), Remaining::Seconds(120));

    let mut tracker = SessionTracker::new();
    let now = Local::now();
    let now_mono = MonotonicInstant::now();

    let (outcome, _) = tracker.start(item.clone(), &snapshot, now, now_mono);
    assert!(matches!(outcome, StartOutcome::Started { .. }));

    // Warning and the first heartbeat both land at one minute out
    let at_60 = now_mono + Duration::from_secs(60);
    let events = tracker.tick(now + ChronoDuration::seconds(60), at_60);
    assert!(events.iter().any(|e| matches!(e, TrackerEvent::Warning { .. })));
    for event in &events {
        if let TrackerEvent::HeartbeatDue { segment, .. } = event {
            ledger.append_segment(&profile, segment).unwrap();
        }
    }

    // Deadline reached; the final segment flushes into the ledger
    let at_121 = now_mono + Duration::from_secs(121);
    let events = tracker.tick(now + ChronoDuration::seconds(121), at_121);
    let final_segment = events
        .iter()
        .find_map(|e| match e {
            TrackerEvent::LimitReached { final_segment, .. } => final_segment.clone(),
            _ => None,
        })
        .expect("Expected LimitReached with a final segment");
    assert!(ledger.append_segment(&profile, &final_segment).unwrap());

    // The next start attempt is refused
    let snapshot = ledger.snapshot(&profile, &item, limits, today).unwrap();
    assert!(remaining(&snapshot).is_exhausted());
    let (outcome, _) = tracker.start(
        item,
        &snapshot,
        now + ChronoDuration::seconds(122),
        now_mono + Duration::from_secs(122),
    );
    assert_eq!(outcome, StartOutcome::Exhausted);
}

/// Spawned daemon process, killed on drop
struct DaemonGuard(std::process::Child);

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

async fn spawn_daemon(dir: &std::path::Path) -> (DaemonGuard, std::path::PathBuf) {
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, TEST_CONFIG).unwrap();
    let socket_path = dir.join("minderd.sock");
    let data_dir = dir.join("data");

    let child = std::process::Command::new(env!("CARGO_BIN_EXE_minderd"))
        .arg("--config")
        .arg(&config_path)
        .arg("--socket")
        .arg(&socket_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .env_remove("MINDER_SOCKET")
        .env_remove("MINDER_DATA_DIR")
        .spawn()
        .expect("Failed to spawn minderd");

    // Wait for the socket to appear
    for _ in 0..100 {
        if socket_path.exists() {
            return (DaemonGuard(child), socket_path);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Daemon socket never appeared");
}

#[tokio::test]
async fn test_daemon_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (_daemon, socket_path) = spawn_daemon(dir.path()).await;

    // Unknown token is rejected outright
    let mut conn = minder_sync::Connection::connect(&socket_path).await.unwrap();
    let err = conn.hello("tok-revoked").await.unwrap_err();
    assert!(matches!(err, minder_sync::SyncError::CredentialRejected));

    // Admin surface subscribes to the bus
    let mut admin = minder_sync::Connection::connect(&socket_path).await.unwrap();
    let role = admin.hello("tok-admin").await.unwrap();
    assert_eq!(role, SurfaceRole::Admin);
    let mut frames = admin.subscribe().await.unwrap();

    // Kiosk surface reads and spends budget
    let mut kiosk = minder_sync::Connection::connect(&socket_path).await.unwrap();
    kiosk.hello("tok-kiosk").await.unwrap();

    let response = kiosk
        .send(Command::GetUsage {
            profile_id: ProfileId::new("kid-a"),
            item_id: ItemId::new("minecraft"),
        })
        .await
        .unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::Usage(snapshot)) => {
            assert_eq!(snapshot.today_seconds, 0);
            assert_eq!(remaining(&snapshot), Remaining::Seconds(3600));
        }
        other => panic!("Unexpected GetUsage reply: {:?}", other),
    }

    let response = kiosk
        .send(Command::AppendSegment {
            profile_id: ProfileId::new("kid-a"),
            segment: segment("minecraft", -300, 60),
        })
        .await
        .unwrap();
    assert!(matches!(
        response.result,
        ResponseResult::Ok(ResponsePayload::Appended { recorded: true })
    ));

    // The write fans out as a broad refresh to subscribed surfaces
    let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("Timed out waiting for frame")
        .unwrap();
    assert_eq!(frame.event, SyncEvent::Refresh);

    // A kiosk may not grant bonus time
    let response = kiosk
        .send(Command::GrantBonus {
            profile_id: ProfileId::new("kid-a"),
            minutes: 15,
        })
        .await
        .unwrap();
    match response.result {
        ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::PermissionDenied),
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_daemon_requires_hello() {
    let dir = tempfile::tempdir().unwrap();
    let (_daemon, socket_path) = spawn_daemon(dir.path()).await;

    let mut conn = minder_sync::Connection::connect(&socket_path).await.unwrap();
    let response = conn.send(Command::Ping).await.unwrap();

    match response.result {
        ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::PermissionDenied),
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }
}
