//! SQLite-backed GraphStore

use crate::error::{GraphError, GraphResult};
use crate::pool::SessionPool;
use crate::schema::{self, REL_FULFILLS};
use crate::store::GraphStore;
use autotelos_core::{
    AggregateCounts, AgentKind, Attempt, CycleRecord, DomainPhase, Goal, Principle,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

/// Graph store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// SQLite database file. Created if missing.
    pub path: PathBuf,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("autotelos.db"),
            max_sessions: 20,
        }
    }
}

pub struct SqliteGraphStore {
    pool: SessionPool,
}

impl SqliteGraphStore {
    /// Open the store, create the schema, and verify connectivity. Fails
    /// fast when the database cannot be opened.
    pub fn open(config: &GraphConfig) -> GraphResult<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::Pool(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let pool = SessionPool::open(&config.path, config.max_sessions, schema::init_schema)?;
        info!(
            "graph store open at {} (max {} sessions)",
            config.path.display(),
            config.max_sessions
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn count_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    Ok(raw.max(0) as u64)
}

const GOAL_COLUMNS: &str = "id, description, intensity, domain, verified, created_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: uuid_col(row, 0)?,
        description: row.get(1)?,
        intensity: row.get(2)?,
        domain: row.get(3)?,
        verified: row.get(4)?,
        created_at: time_col(row, 5)?,
    })
}

const ATTEMPT_COLUMNS: &str = "id, goal_id, domain, problem, solution, approach, success, \
     is_bootstrap, attempts_used, error, created_at";

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<Attempt> {
    Ok(Attempt {
        id: uuid_col(row, 0)?,
        goal_id: uuid_col(row, 1)?,
        domain: row.get(2)?,
        problem: row.get(3)?,
        solution: row.get(4)?,
        approach: row.get(5)?,
        success: row.get(6)?,
        is_bootstrap: row.get(7)?,
        attempts_used: count_col(row, 8)? as u32,
        error: row.get(9)?,
        created_at: time_col(row, 10)?,
    })
}

const PRINCIPLE_COLUMNS: &str =
    "id, domain, statement, source_count, confidence, usage_count, created_at";

fn principle_from_row(row: &Row<'_>) -> rusqlite::Result<Principle> {
    Ok(Principle {
        id: uuid_col(row, 0)?,
        domain: row.get(1)?,
        statement: row.get(2)?,
        source_count: count_col(row, 3)? as u32,
        confidence: row.get(4)?,
        usage_count: count_col(row, 5)?,
        created_at: time_col(row, 6)?,
    })
}

const CYCLE_COLUMNS: &str = "id, agent_id, agent_kind, phase_reached, goals_generated, \
     goals_verified, attempt_succeeded, principle_extracted, duration_seconds, error, created_at";

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<CycleRecord> {
    let kind: String = row.get(2)?;
    Ok(CycleRecord {
        id: uuid_col(row, 0)?,
        agent_id: row.get(1)?,
        agent_kind: kind.parse::<AgentKind>().map_err(|e| conversion_err(2, e))?,
        phase_reached: row.get(3)?,
        goals_generated: count_col(row, 4)? as u32,
        goals_verified: count_col(row, 5)? as u32,
        attempt_succeeded: row.get(6)?,
        principle_extracted: row.get(7)?,
        duration_seconds: row.get(8)?,
        error: row.get(9)?,
        created_at: time_col(row, 10)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl GraphStore for SqliteGraphStore {
    async fn store_goal(&self, goal: &Goal) -> GraphResult<()> {
        let goal = goal.clone();
        self.pool
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO goals (id, description, intensity, domain, verified, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        goal.id.to_string(),
                        goal.description,
                        goal.intensity,
                        goal.domain,
                        goal.verified,
                        ts(&goal.created_at),
                    ],
                )?;
                debug!("stored goal {}", goal.id);
                Ok(())
            })
            .await
    }

    async fn get_goal(&self, id: Uuid) -> GraphResult<Option<Goal>> {
        self.pool
            .run(move |conn| {
                let sql = format!("SELECT {} FROM goals WHERE id = ?1", GOAL_COLUMNS);
                let goal = conn
                    .query_row(&sql, params![id.to_string()], goal_from_row)
                    .optional()?;
                Ok(goal)
            })
            .await
    }

    async fn get_pending_goals(&self, limit: usize) -> GraphResult<Vec<Goal>> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM goals g \
                     WHERE g.verified = 1 \
                       AND NOT EXISTS (SELECT 1 FROM edges e WHERE e.rel = ?1 AND e.dst = g.id) \
                     ORDER BY g.intensity DESC, g.created_at ASC \
                     LIMIT ?2",
                    GOAL_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let goals = stmt
                    .query_map(params![REL_FULFILLS, limit as i64], goal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(goals)
            })
            .await
    }

    async fn get_pending_goals_in_domain(&self, domain: &str, limit: usize) -> GraphResult<Vec<Goal>> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM goals g \
                     WHERE g.verified = 1 AND g.domain = ?1 \
                       AND NOT EXISTS (SELECT 1 FROM edges e WHERE e.rel = ?2 AND e.dst = g.id) \
                     ORDER BY g.intensity DESC, g.created_at ASC \
                     LIMIT ?3",
                    GOAL_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let goals = stmt
                    .query_map(params![domain, REL_FULFILLS, limit as i64], goal_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(goals)
            })
            .await
    }

    async fn store_attempt(&self, attempt: &Attempt) -> GraphResult<()> {
        let attempt = attempt.clone();
        self.pool
            .run(move |conn| {
                // Immediate so concurrent consumers serialize on the write lock
                // and the loser sees the edge instead of a stale snapshot.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let goal_exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM goals WHERE id = ?1)",
                    params![attempt.goal_id.to_string()],
                    |row| row.get(0),
                )?;
                if !goal_exists {
                    return Err(GraphError::GoalNotFound(attempt.goal_id));
                }

                tx.execute(
                    "INSERT INTO attempts (id, goal_id, domain, problem, solution, approach, \
                     success, is_bootstrap, attempts_used, error, inactive, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
                    params![
                        attempt.id.to_string(),
                        attempt.goal_id.to_string(),
                        attempt.domain,
                        attempt.problem,
                        attempt.solution,
                        attempt.approach,
                        attempt.success,
                        attempt.is_bootstrap,
                        attempt.attempts_used as i64,
                        attempt.error,
                        ts(&attempt.created_at),
                    ],
                )?;

                let edge = tx.execute(
                    "INSERT INTO edges (src, rel, dst, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        attempt.id.to_string(),
                        REL_FULFILLS,
                        attempt.goal_id.to_string(),
                        ts(&attempt.created_at),
                    ],
                );
                match edge {
                    Ok(_) => {}
                    Err(e) if is_constraint_violation(&e) => {
                        return Err(GraphError::AlreadyFulfilled(attempt.goal_id));
                    }
                    Err(e) => return Err(e.into()),
                }

                tx.commit()?;
                debug!(
                    "stored attempt {} fulfilling goal {} (success={})",
                    attempt.id, attempt.goal_id, attempt.success
                );
                Ok(())
            })
            .await
    }

    async fn get_attempts(&self, domain: Option<&str>, limit: usize) -> GraphResult<Vec<Attempt>> {
        let domain = domain.map(str::to_string);
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM attempts \
                     WHERE (?1 IS NULL OR domain = ?1) \
                     ORDER BY created_at DESC LIMIT ?2",
                    ATTEMPT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let attempts = stmt
                    .query_map(params![domain, limit as i64], attempt_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(attempts)
            })
            .await
    }

    async fn get_successful_attempts(
        &self,
        domain: &str,
        limit: usize,
        include_bootstrap: bool,
    ) -> GraphResult<Vec<Attempt>> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM attempts \
                     WHERE domain = ?1 AND success = 1 AND inactive = 0 \
                       AND (?2 OR is_bootstrap = 0) \
                     ORDER BY created_at DESC LIMIT ?3",
                    ATTEMPT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let attempts = stmt
                    .query_map(params![domain, include_bootstrap, limit as i64], attempt_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(attempts)
            })
            .await
    }

    async fn get_attempt_count(&self, domain: &str, success_only: bool) -> GraphResult<u64> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM attempts \
                     WHERE domain = ?1 AND inactive = 0 AND (?2 = 0 OR success = 1)",
                    params![domain, success_only],
                    |row| count_col(row, 0),
                )?;
                Ok(count)
            })
            .await
    }

    async fn store_principle(&self, principle: &Principle) -> GraphResult<()> {
        let principle = principle.clone();
        self.pool
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO principles (id, domain, statement, source_count, confidence, \
                     usage_count, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        principle.id.to_string(),
                        principle.domain,
                        principle.statement,
                        principle.source_count as i64,
                        principle.confidence,
                        principle.usage_count as i64,
                        ts(&principle.created_at),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn get_principles_by_domain(&self, domain: &str, limit: usize) -> GraphResult<Vec<Principle>> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM principles WHERE domain = ?1 \
                     ORDER BY confidence DESC, usage_count DESC LIMIT ?2",
                    PRINCIPLE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let principles = stmt
                    .query_map(params![domain, limit as i64], principle_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(principles)
            })
            .await
    }

    async fn increment_principle_usage(&self, id: Uuid) -> GraphResult<()> {
        self.pool
            .run(move |conn| {
                let changed = conn.execute(
                    "UPDATE principles SET usage_count = usage_count + 1 WHERE id = ?1",
                    params![id.to_string()],
                )?;
                if changed == 0 {
                    return Err(GraphError::not_found("principle", id));
                }
                Ok(())
            })
            .await
    }

    async fn store_cycle_record(&self, record: &CycleRecord) -> GraphResult<()> {
        let record = record.clone();
        self.pool
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO cycle_records (id, agent_id, agent_kind, phase_reached, \
                     goals_generated, goals_verified, attempt_succeeded, principle_extracted, \
                     duration_seconds, error, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        record.id.to_string(),
                        record.agent_id,
                        record.agent_kind.as_str(),
                        record.phase_reached,
                        record.goals_generated as i64,
                        record.goals_verified as i64,
                        record.attempt_succeeded,
                        record.principle_extracted,
                        record.duration_seconds,
                        record.error,
                        ts(&record.created_at),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn get_cycle_records(&self, limit: usize) -> GraphResult<Vec<CycleRecord>> {
        self.pool
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM cycle_records ORDER BY created_at DESC LIMIT ?1",
                    CYCLE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params![limit as i64], cycle_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
    }

    async fn mark_bootstrap_attempts_inactive(&self, domain: &str) -> GraphResult<u64> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let changed = conn.execute(
                    "UPDATE attempts SET inactive = 1 \
                     WHERE domain = ?1 AND is_bootstrap = 1 AND inactive = 0",
                    params![domain],
                )?;
                info!("marked {} bootstrap attempts inactive in {}", changed, domain);
                Ok(changed as u64)
            })
            .await
    }

    async fn get_domain_phase(&self, domain: &str) -> GraphResult<DomainPhase> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT phase FROM domain_phases WHERE domain = ?1",
                        params![domain],
                        |row| row.get(0),
                    )
                    .optional()?;
                match raw {
                    Some(phase) => phase
                        .parse::<DomainPhase>()
                        .map_err(|e| GraphError::Corrupt(format!("domain {}: {}", domain, e))),
                    None => Ok(DomainPhase::Bootstrap),
                }
            })
            .await
    }

    async fn set_domain_phase(&self, domain: &str, phase: DomainPhase) -> GraphResult<()> {
        let domain = domain.to_string();
        self.pool
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO domain_phases (domain, phase, updated_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(domain) DO UPDATE \
                     SET phase = excluded.phase, updated_at = excluded.updated_at \
                     WHERE domain_phases.phase <> 'mature'",
                    params![domain, phase.as_str(), ts(&Utc::now())],
                )?;
                Ok(())
            })
            .await
    }

    async fn get_aggregate_metrics(&self) -> GraphResult<AggregateCounts> {
        self.pool
            .run(move |conn| {
                let count = |sql: &str| -> rusqlite::Result<u64> {
                    conn.query_row(sql, [], |row| count_col(row, 0))
                };

                let pending_sql = format!(
                    "SELECT COUNT(*) FROM goals g WHERE g.verified = 1 AND NOT EXISTS \
                     (SELECT 1 FROM edges e WHERE e.rel = '{}' AND e.dst = g.id)",
                    REL_FULFILLS
                );

                Ok(AggregateCounts {
                    total_goals: count("SELECT COUNT(*) FROM goals")?,
                    pending_goals: count(&pending_sql)?,
                    total_attempts: count("SELECT COUNT(*) FROM attempts")?,
                    successful_attempts: count("SELECT COUNT(*) FROM attempts WHERE success = 1")?,
                    total_principles: count("SELECT COUNT(*) FROM principles")?,
                    total_reflections: count(
                        "SELECT COALESCE(SUM(goals_generated), 0) FROM cycle_records \
                         WHERE agent_kind = 'reflector'",
                    )?,
                    verified_goals: count(
                        "SELECT COALESCE(SUM(goals_verified), 0) FROM cycle_records \
                         WHERE agent_kind = 'reflector'",
                    )?,
                    total_cycles: count("SELECT COUNT(*) FROM cycle_records")?,
                    complete_cycles: count(
                        "SELECT COUNT(*) FROM cycle_records \
                         WHERE phase_reached = 'complete' AND error IS NULL",
                    )?,
                })
            })
            .await
    }
}
