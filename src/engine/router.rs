use crate::engine::agents::Agent;
use crate::engine::task::Task;
use log::{debug, info};
use std::sync::Arc;

/// Ordered collection of agents with first-match routing
///
/// Registration order is dispatch order; a task is handed to the first agent
/// whose `can_handle` accepts it. Keyword fallbacks in the agents mean
/// ordering matters, so callers register the most specific agents first.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        info!("Registered agent: {}", agent.name());
        self.agents.push(agent);
    }

    /// First registered agent that accepts the task, if any
    pub fn route(&self, task: &Task) -> Option<Arc<dyn Agent>> {
        let agent = self.agents.iter().find(|agent| agent.can_handle(task));
        match &agent {
            Some(agent) => debug!("Routing {} task to {}", task.kind(), agent.name()),
            None => debug!("No agent accepts {} task", task.kind()),
        }
        agent.cloned()
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn names(&self) -> Vec<String> {
        self.agents
            .iter()
            .map(|agent| agent.name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
