//! Agent lifecycle contract
//!
//! Every agent owns an [`AgentCore`] (identity, ephemeral status, stop
//! token) and implements one cycle. The [`Agent`] trait supplies the
//! scheduling loop: one cycle per tick, never overlapping, with
//! cancellation taking priority over a pending tick.

use crate::error::AgentResult;
use autotelos_core::{AgentKind, AgentStatus, CycleRecord, PHASE_IDLE};
use autotelos_graph::GraphStore;
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Result of one cycle that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Work was done; the cycle record is persisted.
    Done,
    /// Nothing to do this tick; no record is written.
    Skipped,
}

/// Identity, status and stop channel shared by all agents.
pub struct AgentCore {
    id: String,
    kind: AgentKind,
    status: RwLock<AgentStatus>,
    stop: CancellationToken,
}

impl AgentCore {
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        let id = id.into();
        Self {
            status: RwLock::new(AgentStatus::new(id.clone(), kind)),
            id,
            kind,
            stop: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn status(&self) -> AgentStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut AgentStatus)) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }

    /// Record a named step. Observability only.
    pub fn enter(&self, record: &mut CycleRecord, phase: &str) {
        record.phase_reached = phase.to_string();
        self.set_phase(phase);
    }

    /// Update the status phase without touching a cycle record.
    pub fn set_phase(&self, phase: &str) {
        self.update(|s| s.current_phase = phase.to_string());
        debug!("{} -> {}", self.id, phase);
    }

    pub fn current_phase(&self) -> String {
        self.status().current_phase
    }

    /// Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    fn set_running(&self, running: bool) {
        self.update(|s| s.running = running);
    }

    fn finish_cycle(&self, record: &CycleRecord) {
        self.update(|s| {
            s.cycles_run += 1;
            s.last_cycle_at = Some(record.created_at);
            s.current_phase = PHASE_IDLE.to_string();
            s.error = record.error.clone();
        });
    }
}

#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn core(&self) -> &AgentCore;

    fn graph(&self) -> &Arc<dyn GraphStore>;

    /// One pass through the agent's states. Steps should be announced with
    /// [`AgentCore::enter`].
    async fn run_cycle(&self, record: &mut CycleRecord) -> AgentResult<Cycle>;

    fn id(&self) -> &str {
        self.core().id()
    }

    fn status(&self) -> AgentStatus {
        self.core().status()
    }

    fn stop(&self) {
        self.core().stop()
    }

    /// Run exactly one cycle, update status, and persist its record.
    async fn tick(&self) -> CycleRecord {
        let core = self.core();
        let mut record = CycleRecord::new(core.id(), core.kind());
        let started = Instant::now();

        let span = info_span!("cycle", agent = %core.id());
        let result = self.run_cycle(&mut record).instrument(span).await;

        record.duration_seconds = started.elapsed().as_secs_f64();
        record.created_at = Utc::now();

        let persist = match result {
            Ok(Cycle::Done) => true,
            Ok(Cycle::Skipped) => {
                debug!("{}: nothing to do", core.id());
                false
            }
            Err(e) => {
                warn!("{}: cycle failed in {}: {}", core.id(), record.phase_reached, e);
                record.error = Some(e.to_string());
                true
            }
        };

        core.finish_cycle(&record);

        if persist {
            if let Err(e) = self.graph().store_cycle_record(&record).await {
                error!("{}: failed to persist cycle record: {}", core.id(), e);
            }
        }
        record
    }

    /// Tick until `cancel` fires or [`Agent::stop`] is called. A cycle in
    /// flight finishes before the loop exits.
    async fn run(&self, cancel: CancellationToken, interval: Duration) {
        let core = self.core();
        if cancel.is_cancelled() || core.is_stopped() {
            info!("{}: stopped before start", core.id());
            return;
        }

        core.set_running(true);
        info!("{} running every {:?}", core.id(), interval);

        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = core.stop.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        core.set_running(false);
        info!("{} stopped", core.id());
    }
}
