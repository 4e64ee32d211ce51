use crate::engine::agents::{description_matches, Agent, AgentInfo};
use crate::engine::config::EngineConfig;
use crate::engine::context::SharedContext;
use crate::engine::llm::InferenceClient;
use crate::engine::prompts;
use crate::engine::result::{ExecutionResult, TaskData};
use crate::engine::sandbox::{CodeExtractor, SafetyValidator, Sandbox};
use crate::engine::task::{Task, TaskKind, TaskSpec};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

const QUERY_KEYWORDS: &[&str] = &[
    "query", "question", "analyze", "what", "how", "show", "find", "get",
];

/// Agent answering free-text questions about the active dataset
///
/// The pipeline is: build an analysis prompt from the dataset, ask the
/// inference client for an answer, extract fenced code candidates, vet each
/// one statically, and run the first approved candidate in the sandbox.
/// Nothing the model wrote ever executes without passing the vetting step.
pub struct QueryAgent {
    info: AgentInfo,
    client: Arc<dyn InferenceClient>,
    extractor: CodeExtractor,
    validator: SafetyValidator,
    sandbox: Sandbox,
    default_model: String,
    temperature: f64,
    sample_rows: usize,
}

impl QueryAgent {
    pub fn new(client: Arc<dyn InferenceClient>, config: &EngineConfig) -> Self {
        Self {
            info: AgentInfo::new(
                "Query Agent",
                "Answers natural language questions about the active dataset",
            ),
            client,
            extractor: CodeExtractor::new(),
            validator: SafetyValidator::new(config.allowed_modules.clone()),
            sandbox: Sandbox::new(config),
            default_model: config.default_model.clone(),
            temperature: config.temperature,
            sample_rows: config.sample_rows,
        }
    }

    async fn answer(&self, task: &Task, context: &SharedContext) -> ExecutionResult {
        let Some(frame) = context.frame() else {
            return ExecutionResult::failure("no dataset in context");
        };

        let (query, model) = match &task.spec {
            TaskSpec::Query { query, model } => (
                query.clone().unwrap_or_else(|| task.description.clone()),
                model.clone().unwrap_or_else(|| self.default_model.clone()),
            ),
            _ => (task.description.clone(), self.default_model.clone()),
        };
        if query.trim().is_empty() {
            return ExecutionResult::failure("no query given");
        }

        info!("Processing query: {query}");
        let prompt = prompts::analysis_prompt(frame, &query, self.sample_rows);
        let response = match self.client.complete(&prompt, &model, self.temperature).await {
            Ok(response) => response,
            Err(e) => {
                return ExecutionResult::failure(format!("Inference request failed: {e}"));
            }
        };

        let candidates = self.extractor.extract(&response);
        if candidates.is_empty() {
            return ExecutionResult::failure("no code block in model response")
                .with_llm_response(response);
        }

        // Run the first candidate that passes vetting; remember why the
        // others were rejected in case none does.
        let mut rejections: Vec<String> = Vec::new();
        for candidate in &candidates {
            let verdict = self.validator.check(candidate);
            if !verdict.is_safe {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "unspecified rejection".to_string());
                warn!("Rejected unsafe code candidate: {reason}");
                rejections.push(reason);
                continue;
            }

            let outcome = self.sandbox.execute(candidate, Some(frame), &[]);
            let mut result = if outcome.success {
                ExecutionResult::success(outcome.result.map(TaskData::Value))
            } else {
                ExecutionResult::failure(format!(
                    "Code execution failed: {}",
                    outcome.error.unwrap_or_else(|| "unknown error".to_string())
                ))
            };
            result = result
                .with_llm_response(response)
                .with_output(outcome.output)
                .with_metadata("model", model)
                .with_metadata("query", query);
            return result;
        }

        ExecutionResult::failure(format!(
            "All code candidates were rejected as unsafe: {}",
            rejections.join("; ")
        ))
        .with_llm_response(response)
    }
}

#[async_trait]
impl Agent for QueryAgent {
    fn info(&self) -> &AgentInfo {
        &self.info
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.kind() == TaskKind::Query || description_matches(&task.description, QUERY_KEYWORDS)
    }

    async fn execute(&self, task: &Task, context: &SharedContext) -> ExecutionResult {
        let result = self.answer(task, context).await;
        self.info.record(task, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{AgentError, Result};
    use crate::engine::frame::Frame;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Canned inference client returning scripted responses
    struct ScriptedClient {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedClient {
        fn returning(response: &str) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(response.to_string())]),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(vec![Err(AgentError::Timeout(
                    "request timed out".to_string(),
                ))]),
            }
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn complete(&self, _prompt: &str, _model: &str, _temperature: f64) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }

        async fn complete_structured(&self, _prompt: &str, _model: &str) -> Result<Value> {
            Ok(json!({}))
        }
    }

    fn agent_with(response: &str) -> QueryAgent {
        QueryAgent::new(
            Arc::new(ScriptedClient::returning(response)),
            &EngineConfig::default(),
        )
    }

    fn context_with_sales() -> SharedContext {
        let frame = Frame::from_records(&[
            json!({"region": "West", "sales": 100}),
            json!({"region": "East", "sales": 250}),
        ])
        .unwrap();
        let mut context = SharedContext::new();
        context.set_active(TaskData::Frame(frame));
        context
    }

    #[tokio::test]
    async fn test_can_handle_kind_and_keywords() {
        let agent = agent_with("");
        assert!(agent.can_handle(&Task::query("anything")));
        assert!(agent.can_handle(&Task::etl_load("x.csv").with_description("show top rows")));
        assert!(!agent.can_handle(&Task::etl_load("x.csv").with_description("load dataset")));
    }

    #[tokio::test]
    async fn test_requires_dataset() {
        let agent = agent_with("irrelevant");
        let result = agent
            .execute(&Task::query("total sales?"), &SharedContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no dataset in context"));
    }

    #[tokio::test]
    async fn test_executes_extracted_code() {
        let response = "Sum the column.\n```rhai\nresult = df[\"sales\"].sum();\n```\n";
        let agent = agent_with(response);
        let result = agent
            .execute(&Task::query("total sales?"), &context_with_sales())
            .await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.data, Some(TaskData::Value(json!(350))));
        assert_eq!(result.llm_response.as_deref(), Some(response));
        // A script that printed nothing still carries an (empty) output
        assert_eq!(result.output.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_print_output_reaches_the_envelope() {
        let response = "```rhai\nprint(\"checking\"); result = 1;\n```";
        let agent = agent_with(response);
        let result = agent
            .execute(&Task::query("print something"), &context_with_sales())
            .await;
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("checking\n"));
    }

    #[tokio::test]
    async fn test_no_code_block_fails_with_response_attached() {
        let agent = agent_with("The total is 350, no code needed.");
        let result = agent
            .execute(&Task::query("total sales?"), &context_with_sales())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no code block in model response"));
        assert!(result.llm_response.is_some());
    }

    #[tokio::test]
    async fn test_unsafe_candidate_is_rejected_without_running() {
        let response = "```rhai\nlet x = open(\"/etc/passwd\");\nresult = x;\n```";
        let agent = agent_with(response);
        let result = agent
            .execute(&Task::query("read secrets"), &context_with_sales())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("rejected as unsafe"));
    }

    #[tokio::test]
    async fn test_first_safe_candidate_wins() {
        let response = concat!(
            "```rhai\neval(\"1\");\n```\n",
            "```rhai\nresult = df.rows;\n```\n",
        );
        let agent = agent_with(response);
        let result = agent
            .execute(&Task::query("how many rows?"), &context_with_sales())
            .await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.data, Some(TaskData::Value(json!(2))));
    }

    #[tokio::test]
    async fn test_inference_failure_is_enveloped() {
        let agent = QueryAgent::new(
            Arc::new(ScriptedClient::failing()),
            &EngineConfig::default(),
        );
        let result = agent
            .execute(&Task::query("total sales?"), &context_with_sales())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Inference request failed"));
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_response() {
        let response = "```rhai\nresult = df[\"missing\"].sum();\n```";
        let agent = agent_with(response);
        let result = agent
            .execute(&Task::query("sum missing"), &context_with_sales())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Code execution failed"));
        assert!(result.llm_response.is_some());
    }
}
