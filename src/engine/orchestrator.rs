use crate::engine::agents::{AgentStats, EtlAgent, ProfilingAgent, QueryAgent};
use crate::engine::config::EngineConfig;
use crate::engine::context::SharedContext;
use crate::engine::error::AgentError;
use crate::engine::llm::InferenceClient;
use crate::engine::planner::NaturalLanguagePlanner;
use crate::engine::report::ProfileReporter;
use crate::engine::result::{ExecutionResult, TaskData};
use crate::engine::router::AgentRegistry;
use crate::engine::store::DatasetStore;
use crate::engine::task::Task;
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Drives workflows end to end: planning, routing, execution, and the
/// shared context carried between tasks
///
/// Tasks run strictly in order. After every successful task that produced
/// data, the runner stores that data in the active-dataset slot of the
/// shared context, so later tasks see the latest produced state. A failed
/// task marked critical aborts the remaining workflow.
pub struct WorkflowRunner {
    registry: AgentRegistry,
    planner: NaturalLanguagePlanner,
    context: SharedContext,
}

impl WorkflowRunner {
    /// Wire up the standard agent set in routing order
    pub fn new(
        client: Arc<dyn InferenceClient>,
        store: Arc<dyn DatasetStore>,
        reporter: Option<Arc<dyn ProfileReporter>>,
        config: &EngineConfig,
    ) -> Self {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(EtlAgent::new(store)));
        registry.register(Arc::new(QueryAgent::new(client.clone(), config)));
        registry.register(Arc::new(ProfilingAgent::new(reporter)));
        Self::with_registry(registry, client, config)
    }

    /// Build a runner over a caller-assembled registry
    ///
    /// Registration order is dispatch order; a task no registered agent
    /// accepts yields a failed routing result.
    pub fn with_registry(
        registry: AgentRegistry,
        client: Arc<dyn InferenceClient>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            planner: NaturalLanguagePlanner::new(client, &config.default_model),
            context: SharedContext::new(),
        }
    }

    /// Route and execute one task against the shared context
    ///
    /// `overrides` are task-local context entries layered over the shared
    /// context for this execution only; they are not written back.
    pub async fn execute_task(
        &mut self,
        task: &Task,
        overrides: &HashMap<String, TaskData>,
    ) -> ExecutionResult {
        let Some(agent) = self.registry.route(task) else {
            let err = AgentError::Routing(format!(
                "No agent available to handle task kind: {}",
                task.kind()
            ));
            error!("{err}");
            return ExecutionResult::from_error(&err);
        };

        info!("Dispatching {} task to {}", task.kind(), agent.name());
        let merged = self.context.merged(overrides);
        let result = agent.execute(task, &merged).await;

        if result.success {
            if let Some(data) = &result.data {
                self.context.set_active(data.clone());
            }
        }
        result
    }

    /// Execute a task list in order, stopping early if a critical task fails
    pub async fn execute_workflow(&mut self, tasks: &[Task]) -> Vec<ExecutionResult> {
        let run_id = Uuid::new_v4();
        info!("Starting workflow {run_id} with {} task(s)", tasks.len());

        let mut results = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            let result = self
                .execute_task(task, &HashMap::new())
                .await
                .with_metadata("run_id", run_id.to_string())
                .with_metadata("task_index", index);

            let failed = !result.success;
            results.push(result);
            if failed && task.critical {
                error!("Critical task {index} failed, aborting workflow {run_id}");
                break;
            }
        }

        info!(
            "Workflow {run_id} finished: {}/{} task(s) succeeded",
            results.iter().filter(|r| r.success).count(),
            results.len()
        );
        results
    }

    /// Break a free-text request into an ordered task list
    pub async fn plan_request(&self, request: &str) -> Vec<Task> {
        self.planner.plan(request, &self.registry.names()).await
    }

    /// Plan and execute a free-text request in one call
    pub async fn run_request(&mut self, request: &str) -> Vec<ExecutionResult> {
        let tasks = self.plan_request(request).await;
        self.execute_workflow(&tasks).await
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn clear_context(&mut self) {
        info!("Clearing shared context");
        self.context.clear();
    }

    /// Reporting counters for every registered agent
    pub fn agent_stats(&self) -> Vec<AgentStats> {
        self.registry
            .agents()
            .iter()
            .map(|agent| agent.stats())
            .collect()
    }
}
