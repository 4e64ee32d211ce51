use crate::engine::config::EngineConfig;
use crate::engine::frame::{cell_as_f64, is_null_cell, Frame};
use log::{debug, warn};
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Scope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Outcome of one sandboxed execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxOutcome {
    /// True iff execution completed without raising
    pub success: bool,
    /// Value bound to `result` after execution, if any
    pub result: Option<Value>,
    /// Everything the script printed
    pub output: String,
    pub error: Option<String>,
}

/// Read-only view of one dataset column, exposed to scripts
#[derive(Debug, Clone)]
pub struct ColumnView {
    name: String,
    values: Vec<Value>,
}

impl ColumnView {
    fn numbers(&self) -> Result<Vec<f64>, Box<EvalAltResult>> {
        let mut numbers = Vec::with_capacity(self.values.len());
        for value in self.values.iter().filter(|v| !is_null_cell(v)) {
            match cell_as_f64(value) {
                Some(n) => numbers.push(n),
                None => {
                    return Err(format!("column '{}' is not numeric", self.name).into());
                }
            }
        }
        Ok(numbers)
    }

    fn all_ints(&self) -> bool {
        self.values
            .iter()
            .filter(|v| !is_null_cell(v))
            .all(|v| v.as_i64().is_some())
    }

    fn sum(&mut self) -> Result<Dynamic, Box<EvalAltResult>> {
        let numbers = self.numbers()?;
        if self.all_ints() {
            Ok(Dynamic::from(numbers.iter().map(|n| *n as i64).sum::<i64>()))
        } else {
            Ok(Dynamic::from(numbers.iter().sum::<f64>()))
        }
    }

    fn mean(&mut self) -> Result<f64, Box<EvalAltResult>> {
        let numbers = self.numbers()?;
        if numbers.is_empty() {
            return Err(format!("column '{}' has no numeric values", self.name).into());
        }
        Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }

    fn min(&mut self) -> Result<Dynamic, Box<EvalAltResult>> {
        let numbers = self.numbers()?;
        if numbers.is_empty() {
            return Err(format!("column '{}' has no numeric values", self.name).into());
        }
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        if self.all_ints() {
            Ok(Dynamic::from(min as i64))
        } else {
            Ok(Dynamic::from(min))
        }
    }

    fn max(&mut self) -> Result<Dynamic, Box<EvalAltResult>> {
        let numbers = self.numbers()?;
        if numbers.is_empty() {
            return Err(format!("column '{}' has no numeric values", self.name).into());
        }
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if self.all_ints() {
            Ok(Dynamic::from(max as i64))
        } else {
            Ok(Dynamic::from(max))
        }
    }

    fn count(&mut self) -> i64 {
        self.values.iter().filter(|v| !is_null_cell(v)).count() as i64
    }

    fn unique(&mut self) -> i64 {
        let mut seen: Vec<&Value> = Vec::new();
        for value in self.values.iter().filter(|v| !is_null_cell(v)) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen.len() as i64
    }

    fn values_array(&mut self) -> Result<Array, Box<EvalAltResult>> {
        self.values.iter().map(to_dynamic).collect()
    }
}

/// Executes a safety-approved code string inside a restricted namespace
///
/// Every execution gets a fresh engine and scope: the context bindings
/// (dataset plus extras) form the only reachable globals, `import` and
/// `eval` are disabled at the symbol level, and the configured operation,
/// size, and call-depth limits apply. Output written via `print`/`debug`
/// is captured. A `result` binding is pre-pushed into the scope so both
/// `result = …` and `let result = …` are visible afterwards; a script that
/// never assigns it succeeds with no data.
pub struct Sandbox {
    max_operations: u64,
    max_array_size: usize,
    max_string_size: usize,
    max_call_levels: usize,
}

impl Sandbox {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_operations: config.sandbox_max_operations,
            max_array_size: config.sandbox_max_array_size,
            max_string_size: config.sandbox_max_string_size,
            max_call_levels: config.sandbox_max_call_levels,
        }
    }

    /// Execute `code` with the given context bindings
    pub fn execute(
        &self,
        code: &str,
        frame: Option<&Frame>,
        extra: &[(String, Value)],
    ) -> SandboxOutcome {
        let captured = Arc::new(Mutex::new(String::new()));
        let engine = self.build_engine(&captured);

        let mut scope = Scope::new();
        if let Some(frame) = frame {
            scope.push("df", frame.clone());
        }
        for (name, value) in extra {
            match to_dynamic(value) {
                Ok(dynamic) => {
                    scope.push(name.clone(), dynamic);
                }
                Err(e) => {
                    return SandboxOutcome {
                        success: false,
                        result: None,
                        output: String::new(),
                        error: Some(format!("cannot bind context variable '{name}': {e}")),
                    };
                }
            }
        }
        scope.push("result", Dynamic::UNIT);

        let eval = engine.eval_with_scope::<Dynamic>(&mut scope, code);
        let output = captured
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default();

        match eval {
            Ok(_) => {
                let result = scope
                    .get_value::<Dynamic>("result")
                    .filter(|d| !d.is_unit())
                    .map(dynamic_to_value);
                if result.is_none() {
                    warn!("script completed without assigning `result`");
                }
                SandboxOutcome {
                    success: true,
                    result,
                    output,
                    error: None,
                }
            }
            Err(e) => {
                debug!("sandboxed execution failed: {e}");
                SandboxOutcome {
                    success: false,
                    result: None,
                    output,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn build_engine(&self, captured: &Arc<Mutex<String>>) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_operations(self.max_operations);
        engine.set_max_array_size(self.max_array_size);
        engine.set_max_map_size(self.max_array_size);
        engine.set_max_string_size(self.max_string_size);
        engine.set_max_call_levels(self.max_call_levels);
        engine.disable_symbol("import");
        engine.disable_symbol("eval");

        let sink = Arc::clone(captured);
        engine.on_print(move |text| {
            if let Ok(mut buffer) = sink.lock() {
                buffer.push_str(text);
                buffer.push('\n');
            }
        });
        let sink = Arc::clone(captured);
        engine.on_debug(move |text, _source, _pos| {
            if let Ok(mut buffer) = sink.lock() {
                buffer.push_str(text);
                buffer.push('\n');
            }
        });

        register_frame_api(&mut engine);
        engine
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn dynamic_to_value(dynamic: Dynamic) -> Value {
    if let Some(frame) = dynamic.clone().try_cast::<Frame>() {
        return Value::Array(frame.to_records());
    }
    from_dynamic::<Value>(&dynamic).unwrap_or_else(|_| Value::String(dynamic.to_string()))
}

/// The whitelisted tabular surface reachable from scripts
fn register_frame_api(engine: &mut Engine) {
    engine.register_type_with_name::<Frame>("Frame");
    engine.register_type_with_name::<ColumnView>("Column");

    engine.register_get("rows", |frame: &mut Frame| frame.n_rows() as i64);
    engine.register_get("cols", |frame: &mut Frame| frame.n_cols() as i64);
    engine.register_fn("columns", |frame: &mut Frame| -> Array {
        frame
            .columns()
            .iter()
            .map(|name| Dynamic::from(name.clone()))
            .collect()
    });
    engine.register_indexer_get(
        |frame: &mut Frame, name: &str| -> Result<ColumnView, Box<EvalAltResult>> {
            frame
                .column(name)
                .map(|values| ColumnView {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
                .ok_or_else(|| format!("unknown column: {name}").into())
        },
    );

    engine.register_get("name", |column: &mut ColumnView| column.name.clone());
    engine.register_fn("sum", ColumnView::sum);
    engine.register_fn("mean", ColumnView::mean);
    engine.register_fn("min", ColumnView::min);
    engine.register_fn("max", ColumnView::max);
    engine.register_fn("count", ColumnView::count);
    engine.register_fn("unique", ColumnView::unique);
    engine.register_fn("values", ColumnView::values_array);
}
