use crate::engine::agents::{description_matches, Agent, AgentInfo};
use crate::engine::context::SharedContext;
use crate::engine::frame::{Dtype, Frame};
use crate::engine::report::ProfileReporter;
use crate::engine::result::{ExecutionResult, TaskData};
use crate::engine::task::{Task, TaskKind, TaskSpec};
use async_trait::async_trait;
use log::warn;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

const PROFILING_KEYWORDS: &[&str] = &[
    "profile", "quality", "summary", "statistics", "report", "describe",
];

const DEFAULT_REPORT_PATH: &str = "data/reports/profile.html";
const TOP_VALUES: usize = 5;

/// Agent producing data quality statistics and an optional full report
///
/// The quick statistics are computed in-process and always returned; the
/// heavyweight report is delegated to the configured reporter and a render
/// failure only logs a warning.
pub struct ProfilingAgent {
    info: AgentInfo,
    reporter: Option<Arc<dyn ProfileReporter>>,
}

impl ProfilingAgent {
    pub fn new(reporter: Option<Arc<dyn ProfileReporter>>) -> Self {
        Self {
            info: AgentInfo::new(
                "Profiling Agent",
                "Generates data quality reports and summary statistics",
            ),
            reporter,
        }
    }

    fn quick_stats(frame: &Frame) -> Value {
        let rows = frame.n_rows();
        let dtypes = frame.dtypes();

        let mut dtype_map = Map::new();
        for (name, dtype) in &dtypes {
            dtype_map.insert(name.clone(), json!(dtype.to_string()));
        }

        let mut missing = Map::new();
        let mut missing_pct = Map::new();
        for (name, count) in frame.missing_counts() {
            let pct = if rows == 0 {
                0.0
            } else {
                count as f64 * 100.0 / rows as f64
            };
            missing.insert(name.clone(), json!(count));
            missing_pct.insert(name, json!(pct));
        }

        let mut numeric_summary = Map::new();
        let mut categorical_info = Map::new();
        for (name, dtype) in &dtypes {
            match dtype {
                Dtype::Int | Dtype::Float => {
                    if let Some(summary) = frame.numeric_summary(name) {
                        numeric_summary.insert(
                            name.clone(),
                            json!({
                                "count": summary.count,
                                "mean": summary.mean,
                                "std": summary.std,
                                "min": summary.min,
                                "max": summary.max,
                            }),
                        );
                    }
                }
                Dtype::Str => {
                    let unique = frame.unique_count(name).unwrap_or(0);
                    let top: Map<String, Value> = frame
                        .value_counts(name, TOP_VALUES)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(value, count)| (value, json!(count)))
                        .collect();
                    categorical_info.insert(
                        name.clone(),
                        json!({"unique_count": unique, "top_values": top}),
                    );
                }
                _ => {}
            }
        }

        json!({
            "shape": {"rows": rows, "columns": frame.n_cols()},
            "columns": frame.columns(),
            "dtypes": dtype_map,
            "missing_values": missing,
            "missing_percentage": missing_pct,
            "memory_usage_mb": frame.memory_estimate() as f64 / (1024.0 * 1024.0),
            "numeric_summary": numeric_summary,
            "categorical_info": categorical_info,
        })
    }

    fn profile(&self, task: &Task, context: &SharedContext) -> ExecutionResult {
        let Some(frame) = context.frame() else {
            return ExecutionResult::failure("no dataset in context");
        };

        let output_path = match &task.spec {
            TaskSpec::Profile { output_path } => output_path
                .clone()
                .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string()),
            _ => DEFAULT_REPORT_PATH.to_string(),
        };

        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.render(frame, Path::new(&output_path)) {
                warn!("Full report generation failed, returning quick stats only: {e}");
            }
        }

        let stats = Self::quick_stats(frame);
        ExecutionResult::success(Some(TaskData::Value(stats)))
            .with_metadata("report_path", output_path)
            .with_metadata("rows", frame.n_rows())
            .with_metadata("columns", frame.n_cols())
    }
}

#[async_trait]
impl Agent for ProfilingAgent {
    fn info(&self) -> &AgentInfo {
        &self.info
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.kind() == TaskKind::Profile
            || description_matches(&task.description, PROFILING_KEYWORDS)
    }

    async fn execute(&self, task: &Task, context: &SharedContext) -> ExecutionResult {
        let result = self.profile(task, context);
        self.info.record(task, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{AgentError, Result};

    struct FailingReporter;

    impl ProfileReporter for FailingReporter {
        fn render(&self, _frame: &Frame, _output_path: &Path) -> Result<()> {
            Err(AgentError::Io("disk full".to_string()))
        }
    }

    fn context_with_sales() -> SharedContext {
        let frame = Frame::from_records(&[
            json!({"region": "West", "sales": 100, "ratio": 0.5}),
            json!({"region": "East", "sales": 250, "ratio": null}),
            json!({"region": "West", "sales": 300, "ratio": 1.5}),
        ])
        .unwrap();
        let mut context = SharedContext::new();
        context.set_active(TaskData::Frame(frame));
        context
    }

    #[tokio::test]
    async fn test_can_handle_kind_and_keywords() {
        let agent = ProfilingAgent::new(None);
        assert!(agent.can_handle(&Task::profile(None)));
        assert!(agent.can_handle(&Task::query("q").with_description("data quality report")));
        assert!(!agent.can_handle(&Task::etl_load("x.csv").with_description("load dataset")));
    }

    #[tokio::test]
    async fn test_requires_dataset() {
        let agent = ProfilingAgent::new(None);
        let result = agent
            .execute(&Task::profile(None), &SharedContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no dataset in context"));
    }

    #[tokio::test]
    async fn test_quick_stats_shape() {
        let agent = ProfilingAgent::new(None);
        let result = agent
            .execute(&Task::profile(None), &context_with_sales())
            .await;
        assert!(result.success);

        let stats = match result.data {
            Some(TaskData::Value(stats)) => stats,
            other => panic!("unexpected data: {other:?}"),
        };
        assert_eq!(stats["shape"], json!({"rows": 3, "columns": 3}));
        assert_eq!(stats["dtypes"]["region"], json!("str"));
        assert_eq!(stats["missing_values"]["ratio"], json!(1));
        assert_eq!(stats["numeric_summary"]["sales"]["min"], json!(100.0));
        assert_eq!(
            stats["categorical_info"]["region"]["unique_count"],
            json!(2)
        );
        assert_eq!(
            stats["categorical_info"]["region"]["top_values"]["West"],
            json!(2)
        );
    }

    #[tokio::test]
    async fn test_report_path_metadata() {
        let agent = ProfilingAgent::new(None);
        let result = agent
            .execute(
                &Task::profile(Some("out/custom.html".to_string())),
                &context_with_sales(),
            )
            .await;
        assert_eq!(result.metadata["report_path"], json!("out/custom.html"));

        let defaulted = agent
            .execute(&Task::profile(None), &context_with_sales())
            .await;
        assert_eq!(
            defaulted.metadata["report_path"],
            json!(DEFAULT_REPORT_PATH)
        );
    }

    #[tokio::test]
    async fn test_render_failure_does_not_invalidate_stats() {
        let agent = ProfilingAgent::new(Some(Arc::new(FailingReporter)));
        let result = agent
            .execute(&Task::profile(None), &context_with_sales())
            .await;
        assert!(result.success);
        assert!(result.data.is_some());
    }
}
