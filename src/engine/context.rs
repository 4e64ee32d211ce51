use crate::engine::frame::Frame;
use crate::engine::result::TaskData;
use std::collections::HashMap;

/// Key under which the active dataset lives in the shared context
pub const DF_KEY: &str = "df";

/// Mutable mapping carried across the tasks of one workflow
///
/// Owned by exactly one [`WorkflowRunner`](crate::engine::WorkflowRunner);
/// only the runner writes to it, and only after a successful task that
/// produced data. Lives for the duration of one session and is torn down by
/// its owner.
#[derive(Debug, Clone, Default)]
pub struct SharedContext {
    values: HashMap<String, TaskData>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TaskData> {
        self.values.get(key)
    }

    pub fn insert<S: Into<String>>(&mut self, key: S, data: TaskData) {
        self.values.insert(key.into(), data);
    }

    /// The active dataset, if the `"df"` slot holds one
    pub fn frame(&self) -> Option<&Frame> {
        self.values.get(DF_KEY).and_then(TaskData::as_frame)
    }

    /// Store data in the active-dataset slot
    pub fn set_active(&mut self, data: TaskData) {
        self.values.insert(DF_KEY.to_string(), data);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of this context with task-local overrides layered on top;
    /// overriding keys win.
    pub fn merged(&self, overrides: &HashMap<String, TaskData>) -> SharedContext {
        let mut merged = self.clone();
        for (key, data) in overrides {
            merged.values.insert(key.clone(), data.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_dataset_slot() {
        let mut context = SharedContext::new();
        assert!(context.frame().is_none());

        let frame = Frame::from_records(&[json!({"a": 1})]).unwrap();
        context.set_active(TaskData::from(frame));
        assert!(context.frame().is_some());

        // A scalar in the slot is not a dataset
        context.set_active(TaskData::from(json!(7)));
        assert!(context.frame().is_none());
        assert!(context.get(DF_KEY).is_some());
    }

    #[test]
    fn test_merged_overrides_win() {
        let mut context = SharedContext::new();
        context.insert("df", TaskData::from(json!("base")));

        let mut overrides = HashMap::new();
        overrides.insert("df".to_string(), TaskData::from(json!("local")));
        overrides.insert("extra".to_string(), TaskData::from(json!(1)));

        let merged = context.merged(&overrides);
        assert_eq!(merged.get("df").unwrap().as_value(), Some(&json!("local")));
        assert!(merged.get("extra").is_some());
        // The base context is untouched
        assert_eq!(context.get("df").unwrap().as_value(), Some(&json!("base")));
    }

    #[test]
    fn test_clear() {
        let mut context = SharedContext::new();
        context.insert("df", TaskData::from(json!(1)));
        context.clear();
        assert!(context.is_empty());
    }
}
