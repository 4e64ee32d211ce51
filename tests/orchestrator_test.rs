use agentflow_rs::engine::error::Result;
use agentflow_rs::engine::task::{CustomFilter, FilterSpec, TaskSpec};
use agentflow_rs::engine::{
    AgentError, EngineConfig, FileDatasetStore, Frame, HtmlReportWriter, InferenceClient, Task,
    TaskData, WorkflowRunner,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Inference client with canned completions, recording every prompt
struct MockClient {
    completion: Mutex<Result<String>>,
    structured: Mutex<Result<Value>>,
    prompts: Mutex<Vec<String>>,
}

impl MockClient {
    fn new(completion: Result<String>, structured: Result<Value>) -> Arc<Self> {
        Arc::new(Self {
            completion: Mutex::new(completion),
            structured: Mutex::new(structured),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn completing(response: &str) -> Arc<Self> {
        Self::new(Ok(response.to_string()), Ok(json!({})))
    }
}

#[async_trait]
impl InferenceClient for MockClient {
    async fn complete(&self, prompt: &str, _model: &str, _temperature: f64) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completion.lock().unwrap().clone()
    }

    async fn complete_structured(&self, prompt: &str, _model: &str) -> Result<Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.structured.lock().unwrap().clone()
    }
}

fn write_sales_csv(dir: &std::path::Path) -> String {
    let path = dir.join("sales.csv");
    fs::write(
        &path,
        "date,region,sales\n2024-01-05,West,100\n2024-02-10,East,250\n2024-03-15,West,300\n",
    )
    .unwrap();
    path.display().to_string()
}

fn runner_with(client: Arc<dyn InferenceClient>) -> WorkflowRunner {
    let _ = env_logger::builder().is_test(true).try_init();
    WorkflowRunner::new(
        client,
        Arc::new(FileDatasetStore::new()),
        Some(Arc::new(HtmlReportWriter::new())),
        &EngineConfig::default(),
    )
}

#[tokio::test]
async fn load_query_pipeline_shares_one_context() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());

    let client = MockClient::completing(
        "Sum the sales column.\n```rhai\nresult = df[\"sales\"].sum();\n```\n",
    );
    let mut runner = runner_with(client.clone());

    let results = runner
        .execute_workflow(&[
            Task::etl_load(&csv).with_critical(true),
            Task::query("What are the total sales?"),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(results[1].success, "error: {:?}", results[1].error);
    assert_eq!(results[1].data, Some(TaskData::Value(json!(650))));
    assert!(results[1].llm_response.is_some());

    // The analysis prompt described the loaded dataset
    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Total Rows: 3"));
    assert!(prompts[0].contains("What are the total sales?"));
}

#[tokio::test]
async fn filter_and_save_produce_a_new_file() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());
    let out = dir.path().join("west.json").display().to_string();

    let mut runner = runner_with(MockClient::completing(""));
    let results = runner
        .execute_workflow(&[
            Task::etl_load(&csv),
            Task::etl_filter(FilterSpec {
                region: Some("West".to_string()),
                custom: vec![CustomFilter {
                    column: "sales".to_string(),
                    operator: agentflow_rs::engine::frame::FilterOp::Gt,
                    value: json!(150),
                }],
                ..Default::default()
            }),
            Task::etl_save(&out),
        ])
        .await;

    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[1].metadata["filtered_rows"], json!(1));

    let saved: Vec<Value> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["region"], json!("West"));
    assert_eq!(saved[0]["sales"], json!(300));
}

#[tokio::test]
async fn critical_failure_aborts_the_workflow() {
    let mut runner = runner_with(MockClient::completing(""));
    let results = runner
        .execute_workflow(&[
            Task::etl_load("does/not/exist.csv").with_critical(true),
            Task::query("never reached"),
        ])
        .await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(results[0].error.as_deref().unwrap().contains("Failed to load data"));
}

#[tokio::test]
async fn noncritical_failure_continues_and_results_carry_run_metadata() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());

    let mut runner = runner_with(MockClient::completing(""));
    let results = runner
        .execute_workflow(&[Task::etl_load("does/not/exist.csv"), Task::etl_load(&csv)])
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].success);
    assert!(results[1].success);
    assert_eq!(results[0].metadata["run_id"], results[1].metadata["run_id"]);
    assert_eq!(results[1].metadata["task_index"], json!(1));
}

#[tokio::test]
async fn unsafe_model_code_never_runs() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());
    let secret = dir.path().join("secret.txt");
    fs::write(&secret, "untouched").unwrap();

    let response = format!(
        "```rhai\nlet x = remove_file(\"{}\");\nresult = x;\n```",
        secret.display()
    );
    let mut runner = runner_with(MockClient::completing(&response));

    let results = runner
        .execute_workflow(&[Task::etl_load(&csv), Task::query("delete things")])
        .await;

    assert!(!results[1].success);
    assert!(results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("rejected as unsafe"));
    assert_eq!(fs::read_to_string(&secret).unwrap(), "untouched");
}

#[tokio::test]
async fn query_without_dataset_fails_with_envelope() {
    let mut runner = runner_with(MockClient::completing("irrelevant"));
    let results = runner.execute_workflow(&[Task::query("anything")]).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].error.as_deref(), Some("no dataset in context"));
}

#[tokio::test]
async fn profile_writes_report_and_returns_stats() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());
    let report = dir.path().join("reports").join("profile.html");

    let mut runner = runner_with(MockClient::completing(""));
    let results = runner
        .execute_workflow(&[
            Task::etl_load(&csv),
            Task::profile(Some(report.display().to_string())),
        ])
        .await;

    assert!(results[1].success);
    let stats = results[1].data.as_ref().unwrap().as_value().unwrap();
    assert_eq!(stats["shape"]["rows"], json!(3));
    assert_eq!(stats["numeric_summary"]["sales"]["max"], json!(300.0));
    assert!(report.is_file());
}

#[tokio::test]
async fn planner_breakdown_drives_the_workflow() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());

    let client = MockClient::new(
        Ok("```rhai\nresult = df.rows;\n```".to_string()),
        Ok(json!({
            "task_breakdown": [format!("Load {csv}"), "How many rows are there?"]
        })),
    );
    let mut runner = runner_with(client);

    let tasks = runner.plan_request("count the rows of the sales file").await;
    assert_eq!(tasks.len(), 2);
    assert!(matches!(tasks[0].spec, TaskSpec::Etl(_)));
    assert!(matches!(tasks[1].spec, TaskSpec::Query { .. }));

    let results = runner.execute_workflow(&tasks).await;
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[1].data, Some(TaskData::Value(json!(3))));
}

#[tokio::test]
async fn planner_failure_falls_back_to_a_verbatim_query() {
    let client = MockClient::new(
        Ok(String::new()),
        Err(AgentError::Timeout("planner timed out".to_string())),
    );
    let runner = runner_with(client);

    let tasks = runner.plan_request("what is the average order value?").await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "what is the average order value?");
    match &tasks[0].spec {
        TaskSpec::Query { query, .. } => {
            assert_eq!(query.as_deref(), Some("what is the average order value?"));
        }
        other => panic!("unexpected spec: {other:?}"),
    }
}

#[tokio::test]
async fn successful_query_result_becomes_the_active_context() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());

    let mut runner = runner_with(MockClient::completing(
        "```rhai\nresult = df[\"sales\"].mean();\n```",
    ));
    runner
        .execute_workflow(&[Task::etl_load(&csv), Task::query("average sales")])
        .await;

    // The scalar result replaced the dataset in the active slot
    assert!(runner.context().frame().is_none());
    let active = runner.context().get("df").unwrap();
    assert_eq!(active.as_value(), Some(&json!(650.0 / 3.0)));
}

#[tokio::test]
async fn inference_outage_is_enveloped_not_raised() {
    let dir = tempdir().unwrap();
    let csv = write_sales_csv(dir.path());

    let client = MockClient::new(
        Err(AgentError::http(0, "Connection error: refused")),
        Ok(json!({})),
    );
    let mut runner = runner_with(client);
    let results = runner
        .execute_workflow(&[Task::etl_load(&csv), Task::query("total?")])
        .await;

    assert!(!results[1].success);
    assert!(results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("Inference request failed"));
}

#[tokio::test]
async fn frame_round_trip_survives_transformations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.json");
    fs::write(
        &path,
        serde_json::to_string(&json!([
        {"name": "a", "score": 1, "note": null},
        {"name": "b", "score": null, "note": "keep"},
        {"name": "c", "score": 3, "note": "keep"}
        ]))
        .unwrap(),
    )
    .unwrap();

    let mut runner = runner_with(MockClient::completing(""));
    let results = runner
        .execute_workflow(&[
            Task::etl_load(path.display().to_string()),
            Task::etl_transform(vec![agentflow_rs::engine::task::Transformation::DropNulls {
                columns: Some(vec!["score".to_string()]),
            }]),
        ])
        .await;

    assert!(results.iter().all(|r| r.success));
    let frame: &Frame = results[1].frame().unwrap();
    assert_eq!(frame.n_rows(), 2);
}
