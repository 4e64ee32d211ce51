use crate::engine::agents::{description_matches, Agent, AgentInfo};
use crate::engine::context::SharedContext;
use crate::engine::result::{ExecutionResult, TaskData};
use crate::engine::store::{DataFormat, DatasetStore};
use crate::engine::task::{EtlOperation, Task, TaskKind, TaskSpec, Transformation};
use async_trait::async_trait;
use log::error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ETL_KEYWORDS: &[&str] = &[
    "load", "extract", "transform", "clean", "filter", "save", "export",
];

/// Agent specialized in extract, transform, and load operations
pub struct EtlAgent {
    info: AgentInfo,
    store: Arc<dyn DatasetStore>,
}

impl EtlAgent {
    pub fn new(store: Arc<dyn DatasetStore>) -> Self {
        Self {
            info: AgentInfo::new(
                "ETL Agent",
                "Handles data extraction, transformation, and loading operations",
            ),
            store,
        }
    }

    fn load_data(&self, file_path: Option<&str>) -> ExecutionResult {
        let Some(file_path) = file_path else {
            return ExecutionResult::failure("no file path given for load operation");
        };
        let path = Path::new(file_path);
        let Some(format) = DataFormat::from_path(path) else {
            return ExecutionResult::failure(format!("Unsupported file format: {file_path}"));
        };

        match self.store.load(path, format) {
            Ok(frame) => {
                let rows = frame.n_rows();
                let columns = frame.n_cols();
                ExecutionResult::success(Some(TaskData::Frame(frame)))
                    .with_metadata("rows", rows)
                    .with_metadata("columns", columns)
                    .with_metadata("file", file_path)
            }
            Err(e) => ExecutionResult::failure(format!("Failed to load data: {e}")),
        }
    }

    fn transform_data(
        &self,
        transformations: &[Transformation],
        context: &SharedContext,
    ) -> ExecutionResult {
        let Some(frame) = context.frame() else {
            return ExecutionResult::failure("no dataset in context");
        };

        let mut frame = frame.clone();
        for transformation in transformations {
            let applied = match transformation {
                Transformation::DropNulls { columns } => {
                    frame.drop_nulls(columns.as_deref())
                }
                Transformation::FillNulls { value } => Ok(frame.fill_nulls(value)),
                Transformation::ConvertType { column, dtype } => {
                    frame.convert_type(column, *dtype)
                }
                Transformation::Rename { mapping } => Ok(frame.rename(mapping)),
            };
            match applied {
                Ok(next) => frame = next,
                Err(e) => {
                    return ExecutionResult::failure(format!("Transformation failed: {e}"));
                }
            }
        }

        ExecutionResult::success(Some(TaskData::Frame(frame)))
    }

    fn filter_data(
        &self,
        filters: &crate::engine::task::FilterSpec,
        context: &SharedContext,
    ) -> ExecutionResult {
        let Some(frame) = context.frame() else {
            return ExecutionResult::failure("no dataset in context");
        };

        let mut frame = frame.clone();
        if filters.start_date.is_some() || filters.end_date.is_some() || filters.region.is_some() {
            match frame.filter_date_region(
                filters.start_date.as_deref(),
                filters.end_date.as_deref(),
                filters.region.as_deref(),
            ) {
                Ok(next) => frame = next,
                Err(e) => return ExecutionResult::failure(format!("Filtering failed: {e}")),
            }
        }

        for filter in &filters.custom {
            match frame.filter_compare(&filter.column, filter.operator, &filter.value) {
                Ok(next) => frame = next,
                Err(e) => return ExecutionResult::failure(format!("Filtering failed: {e}")),
            }
        }

        let filtered_rows = frame.n_rows();
        ExecutionResult::success(Some(TaskData::Frame(frame)))
            .with_metadata("filtered_rows", filtered_rows)
    }

    fn save_data(&self, output_path: Option<&str>, context: &SharedContext) -> ExecutionResult {
        let Some(frame) = context.frame() else {
            return ExecutionResult::failure("no dataset in context");
        };
        let Some(output_path) = output_path else {
            return ExecutionResult::failure("no output path given for save operation");
        };

        let path = Path::new(output_path);
        let saved = match DataFormat::from_path(path) {
            Some(format) => self.store.save(frame, path, format),
            // No recognized extension: write both canonical formats
            None => {
                let csv_path = PathBuf::from(format!("{output_path}.csv"));
                let json_path = PathBuf::from(format!("{output_path}.json"));
                self.store
                    .save(frame, &csv_path, DataFormat::Csv)
                    .and_then(|()| self.store.save(frame, &json_path, DataFormat::Json))
            }
        };

        match saved {
            Ok(()) => ExecutionResult::success(None).with_metadata("output_path", output_path),
            Err(e) => ExecutionResult::failure(format!("Save failed: {e}")),
        }
    }
}

#[async_trait]
impl Agent for EtlAgent {
    fn info(&self) -> &AgentInfo {
        &self.info
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.kind() == TaskKind::Etl || description_matches(&task.description, ETL_KEYWORDS)
    }

    async fn execute(&self, task: &Task, context: &SharedContext) -> ExecutionResult {
        // Keyword-routed tasks without an explicit ETL payload default to a
        // load with no source, which fails with a structured error.
        let operation = match &task.spec {
            TaskSpec::Etl(operation) => operation.clone(),
            _ => EtlOperation::Load { file_path: None },
        };

        let result = match &operation {
            EtlOperation::Load { file_path } => self.load_data(file_path.as_deref()),
            EtlOperation::Transform { transformations } => {
                self.transform_data(transformations, context)
            }
            EtlOperation::Filter { filters } => self.filter_data(filters, context),
            EtlOperation::Save { output_path } => {
                self.save_data(output_path.as_deref(), context)
            }
        };

        if let Some(error) = &result.error {
            error!("ETL execution failed: {error}");
        }
        self.info.record(task, &result);
        result
    }
}
