//! Graph schema
//!
//! Node tables plus one `edges` table. A goal can be the target of at most
//! one FULFILLS edge, which is what makes consumption exactly-once.

use crate::error::GraphResult;
use rusqlite::Connection;

pub const REL_FULFILLS: &str = "FULFILLS";

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    id          TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    intensity   REAL NOT NULL CHECK (intensity >= 0.0 AND intensity <= 1.0),
    domain      TEXT,
    verified    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_goals_pending ON goals(verified, intensity DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS idx_goals_domain_pending ON goals(domain, verified, intensity DESC, created_at ASC);

CREATE TABLE IF NOT EXISTS attempts (
    id            TEXT PRIMARY KEY,
    goal_id       TEXT NOT NULL,
    domain        TEXT NOT NULL,
    problem       TEXT NOT NULL,
    solution      TEXT NOT NULL,
    approach      TEXT NOT NULL,
    success       INTEGER NOT NULL,
    is_bootstrap  INTEGER NOT NULL DEFAULT 0,
    attempts_used INTEGER NOT NULL DEFAULT 0,
    error         TEXT,
    inactive      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_domain ON attempts(domain, success, inactive, created_at);

CREATE TABLE IF NOT EXISTS edges (
    src        TEXT NOT NULL,
    rel        TEXT NOT NULL,
    dst        TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (src, rel, dst)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_fulfills_once ON edges(dst) WHERE rel = 'FULFILLS';

CREATE TABLE IF NOT EXISTS principles (
    id           TEXT PRIMARY KEY,
    domain       TEXT NOT NULL,
    statement    TEXT NOT NULL,
    source_count INTEGER NOT NULL,
    confidence   REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
    usage_count  INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_principles_domain ON principles(domain, confidence DESC, usage_count DESC);

CREATE TABLE IF NOT EXISTS cycle_records (
    id                  TEXT PRIMARY KEY,
    agent_id            TEXT NOT NULL,
    agent_kind          TEXT NOT NULL,
    phase_reached       TEXT NOT NULL,
    goals_generated     INTEGER NOT NULL DEFAULT 0,
    goals_verified      INTEGER NOT NULL DEFAULT 0,
    attempt_succeeded   INTEGER NOT NULL DEFAULT 0,
    principle_extracted INTEGER NOT NULL DEFAULT 0,
    duration_seconds    REAL NOT NULL,
    error               TEXT,
    created_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cycle_records_created ON cycle_records(created_at);

CREATE TABLE IF NOT EXISTS domain_phases (
    domain     TEXT PRIMARY KEY,
    phase      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub fn init_schema(conn: &Connection) -> GraphResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
