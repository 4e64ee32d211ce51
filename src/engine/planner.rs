use crate::engine::llm::InferenceClient;
use crate::engine::prompts;
use crate::engine::task::{EtlOperation, FilterSpec, Task, TaskSpec};
use log::{info, warn};
use regex::Regex;
use std::sync::Arc;

/// Turns a free-text request into an ordered task list
///
/// The breakdown itself comes from a structured inference call; each step is
/// then classified by keyword into a concrete task. If the inference call
/// fails or returns an unusable breakdown, the whole request is forwarded
/// verbatim as a single query task so the pipeline always has work to route.
pub struct NaturalLanguagePlanner {
    client: Arc<dyn InferenceClient>,
    model: String,
    path_pattern: Regex,
}

impl NaturalLanguagePlanner {
    pub fn new(client: Arc<dyn InferenceClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            path_pattern: Regex::new(r"[\w./-]+\.(?:csv|json|parquet|xlsx)")
                .expect("Failed to compile path pattern"),
        }
    }

    /// Plan a workflow for the request, given the registered agent names
    pub async fn plan(&self, request: &str, agent_names: &[String]) -> Vec<Task> {
        let prompt = prompts::routing_prompt(request, agent_names);
        let steps = match self.client.complete_structured(&prompt, &self.model).await {
            Ok(response) => response["task_breakdown"]
                .as_array()
                .map(|steps| {
                    steps
                        .iter()
                        .filter_map(|step| step.as_str())
                        .map(str::trim)
                        .filter(|step| !step.is_empty())
                        .map(String::from)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            Err(e) => {
                warn!("Planning request failed, falling back to a single query: {e}");
                return vec![Task::query(request)];
            }
        };

        if steps.is_empty() {
            warn!("Planner returned no usable breakdown, falling back to a single query");
            return vec![Task::query(request)];
        }

        info!("Planned {} task(s) for request", steps.len());
        steps.iter().map(|step| self.classify(step)).collect()
    }

    /// Map one breakdown step to a concrete task by keyword priority
    fn classify(&self, step: &str) -> Task {
        let lowered = step.to_lowercase();
        let contains_any =
            |keywords: &[&str]| keywords.iter().any(|keyword| lowered.contains(keyword));

        let spec = if contains_any(&["load", "read", "import"]) {
            TaskSpec::Etl(EtlOperation::Load {
                file_path: self.extract_path(step),
            })
        } else if contains_any(&["filter", "select", "where"]) {
            TaskSpec::Etl(EtlOperation::Filter {
                filters: FilterSpec::default(),
            })
        } else if contains_any(&["save", "export", "write"]) {
            TaskSpec::Etl(EtlOperation::Save {
                output_path: self.extract_path(step),
            })
        } else if contains_any(&["profile", "report", "summary"]) {
            TaskSpec::Profile { output_path: None }
        } else {
            TaskSpec::Query {
                query: Some(step.to_string()),
                model: None,
            }
        };

        Task {
            description: step.to_string(),
            critical: false,
            spec,
        }
    }

    /// Pull a file path out of a step, if the step names one
    fn extract_path(&self, step: &str) -> Option<String> {
        self.path_pattern
            .find(step)
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{AgentError, Result};
    use crate::engine::task::TaskKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StructuredClient {
        response: Result<Value>,
    }

    #[async_trait]
    impl InferenceClient for StructuredClient {
        async fn complete(&self, _prompt: &str, _model: &str, _temperature: f64) -> Result<String> {
            Ok(String::new())
        }

        async fn complete_structured(&self, _prompt: &str, _model: &str) -> Result<Value> {
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(AgentError::Unknown(e.to_string())),
            }
        }
    }

    fn planner_with(response: Result<Value>) -> NaturalLanguagePlanner {
        NaturalLanguagePlanner::new(Arc::new(StructuredClient { response }), "test-model")
    }

    #[tokio::test]
    async fn test_breakdown_is_classified_in_order() {
        let planner = planner_with(Ok(json!({
            "task_breakdown": [
                "Load data/sales.csv",
                "Filter rows for the West region",
                "What are the total sales?",
                "Save the result to out/west.csv",
            ]
        })));

        let tasks = planner.plan("analyze west sales", &[]).await;
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].kind(), TaskKind::Etl);
        assert_eq!(tasks[1].kind(), TaskKind::Etl);
        assert_eq!(tasks[2].kind(), TaskKind::Query);
        assert_eq!(tasks[3].kind(), TaskKind::Etl);

        match &tasks[0].spec {
            TaskSpec::Etl(EtlOperation::Load { file_path }) => {
                assert_eq!(file_path.as_deref(), Some("data/sales.csv"));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
        match &tasks[3].spec {
            TaskSpec::Etl(EtlOperation::Save { output_path }) => {
                assert_eq!(output_path.as_deref(), Some("out/west.csv"));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_profile_step() {
        let planner = planner_with(Ok(json!({
            "task_breakdown": ["Generate a data quality report"]
        })));
        let tasks = planner.plan("report", &[]).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind(), TaskKind::Profile);
    }

    #[tokio::test]
    async fn test_unmatched_step_becomes_query() {
        let planner = planner_with(Ok(json!({
            "task_breakdown": ["Correlate revenue with temperature"]
        })));
        let tasks = planner.plan("correlate", &[]).await;
        assert_eq!(tasks[0].kind(), TaskKind::Query);
        assert_eq!(tasks[0].description, "Correlate revenue with temperature");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_single_query() {
        let planner = planner_with(Err(AgentError::Timeout("slow".to_string())));
        let tasks = planner.plan("what is the mean?", &[]).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind(), TaskKind::Query);
        assert_eq!(tasks[0].description, "what is the mean?");
    }

    #[tokio::test]
    async fn test_empty_breakdown_falls_back() {
        let planner = planner_with(Ok(json!({"task_breakdown": []})));
        let tasks = planner.plan("do something", &[]).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind(), TaskKind::Query);
    }

    #[tokio::test]
    async fn test_malformed_breakdown_falls_back() {
        let planner = planner_with(Ok(json!({"steps": "not the right key"})));
        let tasks = planner.plan("do something", &[]).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind(), TaskKind::Query);
    }
}
