//! # Capability Agents
//!
//! Each agent is a capability-bound handler for one task kind. The contract
//! is `can_handle` + `execute`; dispatch order and fallback matching live in
//! the [`AgentRegistry`](crate::engine::AgentRegistry). Agents hold no
//! shared state beyond an execution counter and creation timestamp used for
//! reporting.

pub mod etl;
pub mod profiling;
pub mod query;

pub use etl::EtlAgent;
pub use profiling::ProfilingAgent;
pub use query::QueryAgent;

use crate::engine::context::SharedContext;
use crate::engine::result::ExecutionResult;
use crate::engine::task::Task;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Capability contract implemented by every agent
#[async_trait]
pub trait Agent: Send + Sync {
    fn info(&self) -> &AgentInfo;

    /// Whether this agent can handle the given task
    fn can_handle(&self, task: &Task) -> bool;

    /// Execute the task against a merged context snapshot
    ///
    /// Always returns an envelope; agent-internal errors are folded into a
    /// failed [`ExecutionResult`], never raised.
    async fn execute(&self, task: &Task, context: &SharedContext) -> ExecutionResult;

    fn name(&self) -> &str {
        &self.info().name
    }

    fn stats(&self) -> AgentStats {
        self.info().stats()
    }
}

/// Identity and reporting counters shared by all agent variants
#[derive(Debug)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    execution_count: AtomicU64,
}

impl AgentInfo {
    pub fn new<S: Into<String>, D: Into<String>>(name: S, description: D) -> Self {
        let name = name.into();
        info!("Initialized agent: {name}");
        Self {
            name,
            description: description.into(),
            created_at: Utc::now(),
            execution_count: AtomicU64::new(0),
        }
    }

    /// Count and log one execution
    pub fn record(&self, task: &Task, result: &ExecutionResult) {
        self.execution_count.fetch_add(1, Ordering::Relaxed);
        let status = if result.success { "SUCCESS" } else { "FAILED" };
        info!("[{}] {} - Task: {}", self.name, status, task.kind());
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            name: self.name.clone(),
            description: self.description.clone(),
            execution_count: self.execution_count.load(Ordering::Relaxed),
            created_at: self.created_at,
        }
    }
}

/// Snapshot of one agent's reporting counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub name: String,
    pub description: String,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Case-insensitive keyword substring match against a task description
pub(crate) fn description_matches(description: &str, keywords: &[&str]) -> bool {
    let description = description.to_lowercase();
    keywords.iter().any(|keyword| description.contains(keyword))
}
