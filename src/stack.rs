//! Agent stack: builds every configured agent and drives them
//!
//! One reflector, one practitioner per domain, one crystallizer. Each runs
//! in its own task on its own interval; they only meet through the graph.

use crate::config::AutotelosConfig;
use autotelos_agent::{
    Agent, CrystallizerAgent, PractitionerAgent, PractitionerConfig, ReflectorAgent,
    SubprocessRunner, TestRunner,
};
use autotelos_core::CycleRecord;
use autotelos_entropy::EntropyPool;
use autotelos_graph::GraphStore;
use autotelos_llm::Generator;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

struct Member {
    agent: Arc<dyn Agent>,
    interval: Duration,
}

pub struct AgentStack {
    members: Vec<Member>,
}

impl AgentStack {
    /// Practitioners run their tests as real subprocesses.
    pub fn build(
        config: &AutotelosConfig,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        entropy: Option<EntropyPool>,
    ) -> Self {
        Self::build_with(config, graph, generator, entropy, |p| {
            Arc::new(SubprocessRunner::new(p.runner.clone())) as Arc<dyn TestRunner>
        })
    }

    pub fn build_with<F>(
        config: &AutotelosConfig,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        entropy: Option<EntropyPool>,
        make_runner: F,
    ) -> Self
    where
        F: Fn(&PractitionerConfig) -> Arc<dyn TestRunner>,
    {
        let mut members = Vec::new();

        let mut reflector = ReflectorAgent::new(
            "reflector",
            graph.clone(),
            generator.clone(),
            config.reflector.clone(),
        );
        if let Some(pool) = entropy {
            reflector = reflector.with_entropy(pool);
        }
        members.push(Member {
            agent: Arc::new(reflector),
            interval: config.intervals.reflector(),
        });

        for p in config.practitioners() {
            let agent = PractitionerAgent::new(
                format!("practitioner-{}", p.domain),
                graph.clone(),
                generator.clone(),
                make_runner(&p),
                p,
            );
            members.push(Member {
                agent: Arc::new(agent),
                interval: config.intervals.practitioner(),
            });
        }

        members.push(Member {
            agent: Arc::new(CrystallizerAgent::new(
                "crystallizer",
                graph,
                generator,
                config.crystallizer.clone(),
            )),
            interval: config.intervals.crystallizer(),
        });

        Self { members }
    }

    pub fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.members.iter().map(|m| m.agent.clone()).collect()
    }

    /// One cycle per agent, in pipeline order.
    pub async fn run_once(&self) -> Vec<CycleRecord> {
        let mut records = Vec::with_capacity(self.members.len());
        for member in &self.members {
            records.push(member.agent.tick().await);
        }
        records
    }

    /// Start every agent loop. Tasks end when `cancel` fires.
    pub fn spawn(&self, cancel: &CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for member in &self.members {
            let agent = member.agent.clone();
            let interval = member.interval;
            let cancel = cancel.child_token();
            info!("spawning {} (every {:?})", agent.id(), interval);
            tasks.spawn(async move { agent.run(cancel, interval).await });
        }
        tasks
    }

    pub fn stop_all(&self) {
        for member in &self.members {
            member.agent.stop();
        }
    }
}
