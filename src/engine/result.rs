use crate::engine::error::AgentError;
use crate::engine::frame::Frame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data produced by a task: either a dataset handle or a plain JSON value
/// (a sandbox result, profiling stats, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskData {
    Frame(Frame),
    Value(Value),
}

impl TaskData {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            TaskData::Frame(frame) => Some(frame),
            TaskData::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            TaskData::Value(value) => Some(value),
            TaskData::Frame(_) => None,
        }
    }
}

impl From<Frame> for TaskData {
    fn from(frame: Frame) -> Self {
        TaskData::Frame(frame)
    }
}

impl From<Value> for TaskData {
    fn from(value: Value) -> Self {
        TaskData::Value(value)
    }
}

/// Uniform success/data/error envelope returned by every task execution
///
/// Produced once per task and never mutated after return. Query results
/// additionally carry the raw model completion and the captured sandbox
/// stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Option<TaskData>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExecutionResult {
    /// Successful result, optionally carrying data
    pub fn success(data: Option<TaskData>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata: Map::new(),
            llm_response: None,
            output: None,
        }
    }

    /// Failed result with an error message
    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: Map::new(),
            llm_response: None,
            output: None,
        }
    }

    /// Failed result derived from a typed error; records the error code in
    /// metadata
    pub fn from_error(error: &AgentError) -> Self {
        let mut result = Self::failure(error.to_string());
        result
            .metadata
            .insert("error_code".to_string(), Value::from(error.code()));
        result
    }

    pub fn with_metadata<S: Into<String>, V: Into<Value>>(mut self, key: S, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_llm_response<S: Into<String>>(mut self, response: S) -> Self {
        self.llm_response = Some(response.into());
        self
    }

    pub fn with_output<S: Into<String>>(mut self, output: S) -> Self {
        self.output = Some(output.into());
        self
    }

    /// The produced dataset, if the result carries one
    pub fn frame(&self) -> Option<&Frame> {
        self.data.as_ref().and_then(TaskData::as_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let result = ExecutionResult::success(Some(TaskData::Value(json!(42))))
            .with_metadata("rows", 3);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.data.unwrap().as_value(), Some(&json!(42)));
        assert_eq!(result.metadata["rows"], json!(3));
    }

    #[test]
    fn test_failure_envelope() {
        let result = ExecutionResult::failure("no dataset in context");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error.as_deref(), Some("no dataset in context"));
    }

    #[test]
    fn test_from_error_records_code() {
        let result = ExecutionResult::from_error(&AgentError::Routing("no agent".into()));
        assert!(!result.success);
        assert_eq!(result.metadata["error_code"], json!("ROUTING_ERROR"));
    }

    #[test]
    fn test_task_data_round_trip() {
        let frame = Frame::from_records(&[json!({"a": 1})]).unwrap();
        let data = TaskData::from(frame.clone());
        let json_repr = serde_json::to_string(&data).unwrap();
        let back: TaskData = serde_json::from_str(&json_repr).unwrap();
        assert_eq!(back.as_frame(), Some(&frame));
    }
}
