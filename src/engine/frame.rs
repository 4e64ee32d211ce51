//! # Dataset Handle
//!
//! A small column-major table over JSON cells. This is the value that moves
//! between agents under the shared-context `"df"` key: the ETL agent
//! transforms and filters it, the profiling agent summarizes it, and the
//! sandbox exposes it to model-authored scripts.

use crate::engine::error::{AgentError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Inferred type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Float,
    Bool,
    Str,
    Date,
    Null,
    Mixed,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dtype::Int => "int",
            Dtype::Float => "float",
            Dtype::Bool => "bool",
            Dtype::Str => "str",
            Dtype::Date => "date",
            Dtype::Null => "null",
            Dtype::Mixed => "mixed",
        };
        write!(f, "{name}")
    }
}

/// Target type for a `convert_type` transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertTarget {
    Int,
    Float,
    String,
    Bool,
}

/// Column-major table of JSON cells
///
/// Invariant: `cells.len() == columns.len()` and every column holds the same
/// number of rows. Constructors validate this; operations preserve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    cells: Vec<Vec<Value>>,
}

/// Missing cells are JSON null or the empty string (the line-based CSV
/// loader produces empty strings for absent fields).
pub(crate) fn is_null_cell(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Numeric view of a cell, if it has one
pub(crate) fn cell_as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Parse a cell as a calendar date. Accepts ISO dates, a leading ISO date in
/// a timestamp, and US-style `m/d/Y`.
pub(crate) fn parse_date_cell(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    parse_date_str(s)
}

pub(crate) fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose equality used by custom filters: numbers compare numerically
/// across int/float, everything else by JSON equality.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (cell_as_f64(a), cell_as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering used by `>` / `<` filters: numeric when both sides are numbers,
/// lexicographic when both are strings (ISO dates order correctly this way).
fn loose_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (cell_as_f64(a), cell_as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

impl Frame {
    /// Build a frame from named columns. All columns must have equal length.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut cells = Vec::with_capacity(columns.len());
        let mut rows: Option<usize> = None;

        for (name, values) in columns {
            if let Some(expected) = rows {
                if values.len() != expected {
                    return Err(AgentError::Validation(format!(
                        "column '{}' has {} rows, expected {}",
                        name,
                        values.len(),
                        expected
                    )));
                }
            } else {
                rows = Some(values.len());
            }
            if names.contains(&name) {
                return Err(AgentError::Validation(format!("duplicate column '{name}'")));
            }
            names.push(name);
            cells.push(values);
        }

        Ok(Self {
            columns: names,
            cells,
        })
    }

    /// Build a frame from an array of JSON objects. Column order follows
    /// first appearance; missing keys become null cells.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let obj = record.as_object().ok_or_else(|| {
                AgentError::Deserialization("record is not a JSON object".to_string())
            })?;
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut cells: Vec<Vec<Value>> = columns
            .iter()
            .map(|_| Vec::with_capacity(records.len()))
            .collect();
        for record in records {
            let obj = record.as_object().unwrap();
            for (i, column) in columns.iter().enumerate() {
                cells[i].push(obj.get(column).cloned().unwrap_or(Value::Null));
            }
        }

        Ok(Self { columns, cells })
    }

    /// Render the frame back into an array of JSON objects
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.n_rows())
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (i, column) in self.columns.iter().enumerate() {
                    obj.insert(column.clone(), self.cells[i][row].clone());
                }
                Value::Object(obj)
            })
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cells of a named column
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(&self.cells[index])
    }

    /// Infer the dtype of a column by scanning its non-null cells
    pub fn dtype(&self, name: &str) -> Option<Dtype> {
        let values = self.column(name)?;
        let mut seen = None;
        for value in values.iter().filter(|v| !is_null_cell(v)) {
            let current = match value {
                Value::Bool(_) => Dtype::Bool,
                Value::Number(n) if n.is_i64() || n.is_u64() => Dtype::Int,
                Value::Number(_) => Dtype::Float,
                Value::String(s) if parse_date_str(s).is_some() => Dtype::Date,
                Value::String(_) => Dtype::Str,
                _ => Dtype::Mixed,
            };
            seen = Some(match seen {
                None => current,
                Some(prev) if prev == current => current,
                // Int and Float mix to Float; Date and Str mix to Str
                Some(Dtype::Int) if current == Dtype::Float => Dtype::Float,
                Some(Dtype::Float) if current == Dtype::Int => Dtype::Float,
                Some(Dtype::Date) if current == Dtype::Str => Dtype::Str,
                Some(Dtype::Str) if current == Dtype::Date => Dtype::Str,
                Some(_) => Dtype::Mixed,
            });
        }
        Some(seen.unwrap_or(Dtype::Null))
    }

    /// Dtypes of every column, in column order
    pub fn dtypes(&self) -> Vec<(String, Dtype)> {
        self.columns
            .iter()
            .map(|c| (c.clone(), self.dtype(c).unwrap_or(Dtype::Null)))
            .collect()
    }

    /// First `n` rows as a new frame
    pub fn head(&self, n: usize) -> Frame {
        let take = n.min(self.n_rows());
        Frame {
            columns: self.columns.clone(),
            cells: self
                .cells
                .iter()
                .map(|values| values[..take].to_vec())
                .collect(),
        }
    }

    /// First `n` rows rendered as CSV, used for prompt construction
    pub fn head_csv(&self, n: usize) -> String {
        let head = self.head(n);
        let mut out = head.columns.join(",");
        out.push('\n');
        for row in 0..head.n_rows() {
            let line: Vec<String> = head
                .cells
                .iter()
                .map(|values| cell_to_string(&values[row]))
                .collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AgentError::Validation(format!("unknown column: {name}")))
    }

    /// Keep only the rows where `mask` is true
    fn retain_rows(&self, mask: &[bool]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            cells: self
                .cells
                .iter()
                .map(|values| {
                    values
                        .iter()
                        .zip(mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| v.clone())
                        .collect()
                })
                .collect(),
        }
    }

    /// Drop rows containing null cells, optionally scoped to a subset of
    /// columns.
    pub fn drop_nulls(&self, subset: Option<&[String]>) -> Result<Frame> {
        let indices: Vec<usize> = match subset {
            Some(names) => names
                .iter()
                .map(|n| self.column_index(n))
                .collect::<Result<_>>()?,
            None => (0..self.columns.len()).collect(),
        };

        let mask: Vec<bool> = (0..self.n_rows())
            .map(|row| !indices.iter().any(|&i| is_null_cell(&self.cells[i][row])))
            .collect();
        Ok(self.retain_rows(&mask))
    }

    /// Replace null cells with a fill value, across every column
    pub fn fill_nulls(&self, fill: &Value) -> Frame {
        Frame {
            columns: self.columns.clone(),
            cells: self
                .cells
                .iter()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| if is_null_cell(v) { fill.clone() } else { v.clone() })
                        .collect()
                })
                .collect(),
        }
    }

    /// Convert a column to a target type. Nulls pass through; any cell that
    /// cannot be converted fails the whole operation.
    pub fn convert_type(&self, column: &str, target: ConvertTarget) -> Result<Frame> {
        let index = self.column_index(column)?;
        let mut converted = Vec::with_capacity(self.n_rows());
        for value in &self.cells[index] {
            if is_null_cell(value) {
                converted.push(Value::Null);
                continue;
            }
            converted.push(convert_cell(value, target).ok_or_else(|| {
                AgentError::Validation(format!(
                    "cannot convert value {value} in column '{column}' to {target:?}"
                ))
            })?);
        }

        let mut frame = self.clone();
        frame.cells[index] = converted;
        Ok(frame)
    }

    /// Rename columns according to a mapping; names not in the mapping are
    /// left alone.
    pub fn rename(&self, mapping: &HashMap<String, String>) -> Frame {
        Frame {
            columns: self
                .columns
                .iter()
                .map(|c| mapping.get(c).cloned().unwrap_or_else(|| c.clone()))
                .collect(),
            cells: self.cells.clone(),
        }
    }

    /// Convenience date-range/region filter.
    ///
    /// Date bounds apply to the first date-typed column; the region value
    /// matches case-insensitively against a column named `region`.
    pub fn filter_date_region(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        region: Option<&str>,
    ) -> Result<Frame> {
        let mut frame = self.clone();

        if start_date.is_some() || end_date.is_some() {
            let date_column = frame
                .columns
                .iter()
                .find(|c| frame.dtype(c) == Some(Dtype::Date))
                .cloned()
                .ok_or_else(|| {
                    AgentError::Validation("no date column available for date filter".to_string())
                })?;

            let start = start_date.map(parse_date_str).flatten();
            let end = end_date.map(parse_date_str).flatten();
            if start_date.is_some() && start.is_none() {
                return Err(AgentError::Validation(format!(
                    "invalid start_date: {}",
                    start_date.unwrap()
                )));
            }
            if end_date.is_some() && end.is_none() {
                return Err(AgentError::Validation(format!(
                    "invalid end_date: {}",
                    end_date.unwrap()
                )));
            }

            let values = frame.column(&date_column).unwrap();
            let mask: Vec<bool> = values
                .iter()
                .map(|v| match parse_date_cell(v) {
                    Some(d) => start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e),
                    None => false,
                })
                .collect();
            frame = frame.retain_rows(&mask);
        }

        if let Some(region) = region {
            let region_column = frame
                .columns
                .iter()
                .find(|c| c.eq_ignore_ascii_case("region"))
                .cloned()
                .ok_or_else(|| {
                    AgentError::Validation("no region column available for region filter".to_string())
                })?;
            let values = frame.column(&region_column).unwrap();
            let mask: Vec<bool> = values
                .iter()
                .map(|v| {
                    v.as_str()
                        .is_some_and(|s| s.eq_ignore_ascii_case(region))
                })
                .collect();
            frame = frame.retain_rows(&mask);
        }

        Ok(frame)
    }

    /// Apply one custom predicate against a named column
    pub fn filter_compare(&self, column: &str, op: FilterOp, value: &Value) -> Result<Frame> {
        let index = self.column_index(column)?;
        let values = &self.cells[index];

        let mask: Vec<bool> = match op {
            FilterOp::Eq => values.iter().map(|v| loose_eq(v, value)).collect(),
            FilterOp::Gt => values
                .iter()
                .map(|v| loose_cmp(v, value) == Some(std::cmp::Ordering::Greater))
                .collect(),
            FilterOp::Lt => values
                .iter()
                .map(|v| loose_cmp(v, value) == Some(std::cmp::Ordering::Less))
                .collect(),
            FilterOp::In => {
                let candidates = value.as_array().ok_or_else(|| {
                    AgentError::Validation(
                        "'in' filter requires an array value".to_string(),
                    )
                })?;
                values
                    .iter()
                    .map(|v| candidates.iter().any(|c| loose_eq(v, c)))
                    .collect()
            }
        };

        Ok(self.retain_rows(&mask))
    }

    /// Null cells per column, in column order
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .zip(&self.cells)
            .map(|(name, values)| {
                (
                    name.clone(),
                    values.iter().filter(|v| is_null_cell(v)).count(),
                )
            })
            .collect()
    }

    /// Rough in-memory footprint in bytes
    pub fn memory_estimate(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|values| values.iter())
            .map(|v| match v {
                Value::Null => 8,
                Value::Bool(_) => 8,
                Value::Number(_) => 16,
                Value::String(s) => 24 + s.len(),
                other => other.to_string().len(),
            })
            .sum()
    }

    /// Count/mean/std/min/max for a numeric column
    pub fn numeric_summary(&self, column: &str) -> Option<NumericSummary> {
        let values = self.column(column)?;
        let numbers: Vec<f64> = values.iter().filter_map(cell_as_f64).collect();
        if numbers.is_empty() {
            return None;
        }

        let count = numbers.len();
        let mean = numbers.iter().sum::<f64>() / count as f64;
        let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(NumericSummary {
            count,
            mean,
            std: variance.sqrt(),
            min,
            max,
        })
    }

    /// Distinct non-null values in a column
    pub fn unique_count(&self, column: &str) -> Option<usize> {
        let values = self.column(column)?;
        let mut seen: Vec<String> = Vec::new();
        for value in values.iter().filter(|v| !is_null_cell(v)) {
            let key = cell_to_string(value);
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        Some(seen.len())
    }

    /// The `top` most frequent non-null values in a column, most frequent
    /// first. Ties keep first-appearance order.
    pub fn value_counts(&self, column: &str, top: usize) -> Option<Vec<(String, usize)>> {
        let values = self.column(column)?;
        let mut counts: Vec<(String, usize)> = Vec::new();
        for value in values.iter().filter(|v| !is_null_cell(v)) {
            let key = cell_to_string(value);
            match counts.iter_mut().find(|(k, _)| *k == key) {
                Some((_, n)) => *n += 1,
                None => counts.push((key, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(top);
        Some(counts)
    }
}

/// Comparison operator of a custom filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "in")]
    In,
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

fn convert_cell(value: &Value, target: ConvertTarget) -> Option<Value> {
    match target {
        ConvertTarget::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::from),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
                .map(Value::from),
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            _ => None,
        },
        ConvertTarget::Float => match value {
            Value::Number(n) => n.as_f64().map(Value::from),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
            Value::Bool(b) => Some(Value::from(f64::from(u8::from(*b)))),
            _ => None,
        },
        ConvertTarget::String => Some(Value::String(cell_to_string(value))),
        ConvertTarget::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
    }
}
