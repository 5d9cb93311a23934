//! Tests for autotelos-graph: SQLite store, session pool, consumption rules

use autotelos_core::*;
use autotelos_graph::*;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteGraphStore {
    let config = GraphConfig {
        path: dir.path().join("graph.db"),
        max_sessions: 4,
    };
    SqliteGraphStore::open(&config).unwrap()
}

fn verified_goal(desc: &str, intensity: f64, domain: &str) -> Goal {
    Goal::new(desc, intensity, Some(domain.to_string())).verified()
}

fn attempt_for(goal: &Goal, success: bool) -> Attempt {
    let mut attempt = Attempt::new(goal.id, goal.domain.clone().unwrap_or_default());
    attempt.problem = format!("problem for {}", goal.description);
    attempt.solution = "def solve(): pass".into();
    attempt.approach = "direct".into();
    attempt.success = success;
    attempt
}

// ===========================================================================
// Open / pool
// ===========================================================================

#[test]
fn open_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let config = GraphConfig {
        path: dir.path().join("nested/deeper/graph.db"),
        max_sessions: 2,
    };
    let store = SqliteGraphStore::open(&config).unwrap();
    assert!(config.path.exists());
    assert_eq!(store.pool().max_sessions(), 2);
}

#[test]
fn open_fails_fast_on_unreachable_path() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be opened as a database file.
    let config = GraphConfig {
        path: dir.path().to_path_buf(),
        max_sessions: 2,
    };
    assert!(SqliteGraphStore::open(&config).is_err());
}

#[test]
fn open_rejects_zero_sessions() {
    let dir = TempDir::new().unwrap();
    let config = GraphConfig {
        path: dir.path().join("graph.db"),
        max_sessions: 0,
    };
    assert!(matches!(SqliteGraphStore::open(&config), Err(GraphError::Pool(_))));
}

#[test]
fn graph_config_defaults() {
    let config = GraphConfig::default();
    assert_eq!(config.max_sessions, 20);
    assert_eq!(config.path.to_str(), Some("autotelos.db"));
}

#[tokio::test]
async fn pool_tracks_active_sessions() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let pool = store.pool().clone();
    assert_eq!(pool.active_sessions(), 0);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(pool.active_sessions(), 2);
    drop(a);
    assert_eq!(pool.active_sessions(), 1);
    drop(b);
    assert_eq!(pool.active_sessions(), 0);
}

#[tokio::test]
async fn pool_blocks_at_capacity() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let pool = store.pool().clone();

    let held: Vec<_> = {
        let mut v = Vec::new();
        for _ in 0..4 {
            v.push(pool.acquire().await.unwrap());
        }
        v
    };
    let waiting = tokio::time::timeout(std::time::Duration::from_millis(50), pool.acquire()).await;
    assert!(waiting.is_err(), "fifth session should wait");

    drop(held);
    let session = tokio::time::timeout(std::time::Duration::from_secs(1), pool.acquire()).await;
    assert!(session.is_ok());
}

// ===========================================================================
// Goals
// ===========================================================================

#[tokio::test]
async fn goal_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let goal = verified_goal("Implement stable sort", 0.8, "code");
    store.store_goal(&goal).await.unwrap();

    let back = store.get_goal(goal.id).await.unwrap().unwrap();
    assert_eq!(back, goal);
    assert!(store.get_goal(uuid::Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn pending_goals_exclude_unverified() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let unverified = Goal::new("not checked yet", 0.9, Some("code".into()));
    let verified = verified_goal("checked", 0.4, "code");
    store.store_goal(&unverified).await.unwrap();
    store.store_goal(&verified).await.unwrap();

    let pending = store.get_pending_goals(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, verified.id);
}

#[tokio::test]
async fn pending_goals_order_by_intensity_then_age() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let now = Utc::now();

    let mut low = verified_goal("low", 0.3, "code");
    low.created_at = now - Duration::seconds(30);
    let mut tie_newer = verified_goal("tie newer", 0.7, "code");
    tie_newer.created_at = now - Duration::seconds(5);
    let mut tie_older = verified_goal("tie older", 0.7, "code");
    tie_older.created_at = now - Duration::seconds(20);
    let mut high = verified_goal("high", 0.95, "math");
    high.created_at = now;

    for goal in [&low, &tie_newer, &tie_older, &high] {
        store.store_goal(goal).await.unwrap();
    }

    let pending = store.get_pending_goals(10).await.unwrap();
    let order: Vec<_> = pending.iter().map(|g| g.description.as_str()).collect();
    assert_eq!(order, vec!["high", "tie older", "tie newer", "low"]);

    let limited = store.get_pending_goals(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].description, "high");
}

#[tokio::test]
async fn pending_in_domain_filters_before_limit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for i in 0..5 {
        store.store_goal(&verified_goal(&format!("math {}", i), 0.9, "math")).await.unwrap();
        store
            .store_goal(&Goal::new(format!("untagged {}", i), 0.9, None).verified())
            .await
            .unwrap();
    }
    let low = verified_goal("code low", 0.2, "code");
    let high = verified_goal("code high", 0.6, "code");
    let consumed = verified_goal("code consumed", 0.8, "code");
    let unverified = Goal::new("code unverified", 1.0, Some("code".into()));
    for goal in [&low, &high, &consumed, &unverified] {
        store.store_goal(goal).await.unwrap();
    }
    store.store_attempt(&attempt_for(&consumed, true)).await.unwrap();

    let top = store.get_pending_goals_in_domain("code", 1).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, high.id);

    let all = store.get_pending_goals_in_domain("code", 10).await.unwrap();
    let order: Vec<_> = all.iter().map(|g| g.description.as_str()).collect();
    assert_eq!(order, vec!["code high", "code low"]);
    assert!(store.get_pending_goals_in_domain("art", 10).await.unwrap().is_empty());
}

// ===========================================================================
// Attempts and consumption
// ===========================================================================

#[tokio::test]
async fn attempt_consumes_goal() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let goal = verified_goal("Implement stable sort", 0.8, "code");
    store.store_goal(&goal).await.unwrap();
    assert_eq!(store.get_pending_goals(10).await.unwrap().len(), 1);

    store.store_attempt(&attempt_for(&goal, false)).await.unwrap();
    assert!(store.get_pending_goals(10).await.unwrap().is_empty());

    // A failed attempt still consumes the goal.
    let attempts = store.get_attempts(Some("code"), 10).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
}

#[tokio::test]
async fn attempt_for_missing_goal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let ghost = verified_goal("never stored", 0.5, "code");

    let err = store.store_attempt(&attempt_for(&ghost, true)).await.unwrap_err();
    assert!(matches!(err, GraphError::GoalNotFound(id) if id == ghost.id));
    assert!(store.get_attempts(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_attempt_on_same_goal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let goal = verified_goal("x", 0.5, "code");
    store.store_goal(&goal).await.unwrap();

    store.store_attempt(&attempt_for(&goal, true)).await.unwrap();
    let err = store.store_attempt(&attempt_for(&goal, true)).await.unwrap_err();
    assert!(matches!(err, GraphError::AlreadyFulfilled(id) if id == goal.id));

    // The rejected attempt left nothing behind.
    assert_eq!(store.get_attempts(None, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_consumers_fulfill_exactly_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    let goal = verified_goal("contended", 0.9, "code");
    store.store_goal(&goal).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let attempt = attempt_for(&goal, true);
        handles.push(tokio::spawn(async move { store.store_attempt(&attempt).await }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.get_attempts(None, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn attempts_filter_by_domain_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let now = Utc::now();

    for (i, domain) in ["code", "math", "code"].iter().enumerate() {
        let goal = verified_goal(&format!("g{}", i), 0.5, domain);
        store.store_goal(&goal).await.unwrap();
        let mut attempt = attempt_for(&goal, true);
        attempt.created_at = now + Duration::seconds(i as i64);
        store.store_attempt(&attempt).await.unwrap();
    }

    let code = store.get_attempts(Some("code"), 10).await.unwrap();
    assert_eq!(code.len(), 2);
    assert!(code[0].created_at > code[1].created_at);
    assert_eq!(store.get_attempts(None, 10).await.unwrap().len(), 3);
    assert_eq!(store.get_attempts(None, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn successful_attempts_respect_bootstrap_flag() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for (i, (success, bootstrap)) in [(true, true), (true, false), (false, false)].iter().enumerate() {
        let goal = verified_goal(&format!("g{}", i), 0.5, "code");
        store.store_goal(&goal).await.unwrap();
        let mut attempt = attempt_for(&goal, *success);
        attempt.is_bootstrap = *bootstrap;
        store.store_attempt(&attempt).await.unwrap();
    }

    assert_eq!(store.get_successful_attempts("code", 10, true).await.unwrap().len(), 2);
    let mature_only = store.get_successful_attempts("code", 10, false).await.unwrap();
    assert_eq!(mature_only.len(), 1);
    assert!(!mature_only[0].is_bootstrap);

    assert_eq!(store.get_attempt_count("code", false).await.unwrap(), 3);
    assert_eq!(store.get_attempt_count("code", true).await.unwrap(), 2);
    assert_eq!(store.get_attempt_count("math", false).await.unwrap(), 0);
}

#[tokio::test]
async fn inactive_bootstrap_attempts_drop_out_of_evidence() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for i in 0..3 {
        let goal = verified_goal(&format!("boot{}", i), 0.5, "code");
        store.store_goal(&goal).await.unwrap();
        let mut attempt = attempt_for(&goal, true);
        attempt.is_bootstrap = true;
        store.store_attempt(&attempt).await.unwrap();
    }
    let goal = verified_goal("other domain", 0.5, "math");
    store.store_goal(&goal).await.unwrap();
    let mut other = attempt_for(&goal, true);
    other.is_bootstrap = true;
    store.store_attempt(&other).await.unwrap();

    assert_eq!(store.mark_bootstrap_attempts_inactive("code").await.unwrap(), 3);
    assert_eq!(store.mark_bootstrap_attempts_inactive("code").await.unwrap(), 0);

    assert_eq!(store.get_attempt_count("code", true).await.unwrap(), 0);
    assert!(store.get_successful_attempts("code", 10, true).await.unwrap().is_empty());
    assert_eq!(store.get_attempt_count("math", true).await.unwrap(), 1);

    // Inactive attempts are retained for audit.
    assert_eq!(store.get_attempts(Some("code"), 10).await.unwrap().len(), 3);
}

// ===========================================================================
// Principles
// ===========================================================================

#[tokio::test]
async fn principles_order_by_confidence_then_usage() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let weak = Principle::new("code", "weak", 10, 0.8);
    let strong = Principle::new("code", "strong", 10, 0.95);
    let mut popular = Principle::new("code", "popular", 10, 0.8);
    popular.usage_count = 7;
    let elsewhere = Principle::new("math", "elsewhere", 10, 0.99);

    for p in [&weak, &strong, &popular, &elsewhere] {
        store.store_principle(p).await.unwrap();
    }

    let list = store.get_principles_by_domain("code", 10).await.unwrap();
    let order: Vec<_> = list.iter().map(|p| p.statement.as_str()).collect();
    assert_eq!(order, vec!["strong", "popular", "weak"]);
    assert_eq!(store.get_principles_by_domain("code", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn increment_usage() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let p = Principle::new("code", "Prefer small functions", 10, 0.9);
    store.store_principle(&p).await.unwrap();

    store.increment_principle_usage(p.id).await.unwrap();
    store.increment_principle_usage(p.id).await.unwrap();
    let list = store.get_principles_by_domain("code", 10).await.unwrap();
    assert_eq!(list[0].usage_count, 2);

    let missing = store.increment_principle_usage(uuid::Uuid::new_v4()).await;
    assert!(matches!(missing, Err(GraphError::NotFound { kind: "principle", .. })));
}

// ===========================================================================
// Domain phase
// ===========================================================================

#[tokio::test]
async fn unknown_domain_is_bootstrap() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert_eq!(store.get_domain_phase("code").await.unwrap(), DomainPhase::Bootstrap);
}

#[tokio::test]
async fn domain_phase_is_monotonic() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.set_domain_phase("code", DomainPhase::Bootstrap).await.unwrap();
    assert_eq!(store.get_domain_phase("code").await.unwrap(), DomainPhase::Bootstrap);

    store.set_domain_phase("code", DomainPhase::Mature).await.unwrap();
    assert_eq!(store.get_domain_phase("code").await.unwrap(), DomainPhase::Mature);

    store.set_domain_phase("code", DomainPhase::Bootstrap).await.unwrap();
    assert_eq!(store.get_domain_phase("code").await.unwrap(), DomainPhase::Mature);
    assert_eq!(store.get_domain_phase("math").await.unwrap(), DomainPhase::Bootstrap);
}

#[tokio::test]
async fn domain_phase_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        store.set_domain_phase("code", DomainPhase::Mature).await.unwrap();
    }
    let store = open_store(&dir);
    assert_eq!(store.get_domain_phase("code").await.unwrap(), DomainPhase::Mature);
}

// ===========================================================================
// Cycle records and aggregates
// ===========================================================================

fn record(kind: AgentKind, phase: &str, generated: u32, verified: u32, error: Option<&str>) -> CycleRecord {
    let mut r = CycleRecord::new(format!("{}-1", kind), kind);
    r.phase_reached = phase.to_string();
    r.goals_generated = generated;
    r.goals_verified = verified;
    r.duration_seconds = 1.5;
    r.error = error.map(str::to_string);
    r
}

#[tokio::test]
async fn cycle_records_roundtrip_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut first = record(AgentKind::Reflector, PHASE_COMPLETE, 3, 2, None);
    first.created_at = Utc::now() - Duration::seconds(10);
    let second = record(AgentKind::Practitioner, "testing", 0, 0, Some("timeout"));

    store.store_cycle_record(&first).await.unwrap();
    store.store_cycle_record(&second).await.unwrap();

    let records = store.get_cycle_records(10).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], second);
    assert_eq!(records[1], first);
}

#[tokio::test]
async fn aggregate_counts_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert_eq!(store.get_aggregate_metrics().await.unwrap(), AggregateCounts::default());
}

#[tokio::test]
async fn aggregate_counts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let consumed = verified_goal("consumed", 0.8, "code");
    let pending = verified_goal("pending", 0.6, "code");
    let unverified = Goal::new("unverified", 0.2, Some("code".into()));
    for goal in [&consumed, &pending, &unverified] {
        store.store_goal(goal).await.unwrap();
    }
    store.store_attempt(&attempt_for(&consumed, true)).await.unwrap();
    store.store_principle(&Principle::new("code", "p", 10, 0.9)).await.unwrap();

    store.store_cycle_record(&record(AgentKind::Reflector, PHASE_COMPLETE, 4, 2, None)).await.unwrap();
    store.store_cycle_record(&record(AgentKind::Reflector, PHASE_COMPLETE, 3, 1, None)).await.unwrap();
    store
        .store_cycle_record(&record(AgentKind::Practitioner, "testing", 0, 0, Some("boom")))
        .await
        .unwrap();
    store
        .store_cycle_record(&record(AgentKind::Crystallizer, PHASE_COMPLETE, 0, 0, None))
        .await
        .unwrap();

    let counts = store.get_aggregate_metrics().await.unwrap();
    assert_eq!(
        counts,
        AggregateCounts {
            total_goals: 3,
            pending_goals: 1,
            total_attempts: 1,
            successful_attempts: 1,
            total_principles: 1,
            total_reflections: 7,
            verified_goals: 3,
            total_cycles: 4,
            complete_cycles: 3,
        }
    );
}
