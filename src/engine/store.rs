use crate::engine::error::{AgentError, Result};
use crate::engine::frame::Frame;
use log::info;
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Tabular formats recognized at the task boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
    Parquet,
    Xlsx,
}

impl DataFormat {
    /// Derive the format from a path extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            "parquet" => Some(DataFormat::Parquet),
            "xlsx" | "xls" => Some(DataFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
            DataFormat::Parquet => "parquet",
            DataFormat::Xlsx => "xlsx",
        }
    }
}

/// Dataset ingestion and persistence collaborator
///
/// The core routes load/save requests here; it never parses files itself.
pub trait DatasetStore: Send + Sync {
    fn load(&self, path: &Path, format: DataFormat) -> Result<Frame>;
    fn save(&self, frame: &Frame, path: &Path, format: DataFormat) -> Result<()>;
}

/// File-backed store handling JSON record arrays and simple CSV
///
/// CSV handling is line-based with scalar type inference; fields containing
/// separators are out of scope for this store.
#[derive(Debug, Default)]
pub struct FileDatasetStore;

impl FileDatasetStore {
    pub fn new() -> Self {
        Self
    }

    fn load_json(&self, path: &Path) -> Result<Frame> {
        let text = fs::read_to_string(path).map_err(AgentError::from_io)?;
        let records: Vec<Value> = serde_json::from_str(&text).map_err(AgentError::from_serde)?;
        Frame::from_records(&records)
    }

    fn load_csv(&self, path: &Path) -> Result<Frame> {
        let file = fs::File::open(path).map_err(AgentError::from_io)?;
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        let read = reader.read_line(&mut header).map_err(AgentError::from_io)?;
        if read == 0 {
            return Frame::from_columns(Vec::new());
        }
        let columns: Vec<String> = header
            .trim_end()
            .split(',')
            .map(|c| c.trim().to_string())
            .collect();

        let mut cells: Vec<Vec<Value>> = columns.iter().map(|_| Vec::new()).collect();
        for line in reader.lines() {
            let line = line.map_err(AgentError::from_io)?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.trim_end().split(',').collect();
            for (i, column_cells) in cells.iter_mut().enumerate() {
                column_cells.push(parse_csv_field(fields.get(i).copied().unwrap_or("")));
            }
        }

        Frame::from_columns(columns.into_iter().zip(cells).collect())
    }

    fn save_json(&self, frame: &Frame, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&frame.to_records())
            .map_err(AgentError::from_serde)?;
        fs::write(path, text).map_err(AgentError::from_io)
    }

    fn save_csv(&self, frame: &Frame, path: &Path) -> Result<()> {
        fs::write(path, frame.head_csv(frame.n_rows())).map_err(AgentError::from_io)
    }
}

fn parse_csv_field(field: &str) -> Value {
    let field = field.trim();
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = field.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Value::from(f);
    }
    match field {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}

impl DatasetStore for FileDatasetStore {
    fn load(&self, path: &Path, format: DataFormat) -> Result<Frame> {
        info!("Loading dataset from {}", path.display());
        match format {
            DataFormat::Json => self.load_json(path),
            DataFormat::Csv => self.load_csv(path),
            other => Err(AgentError::Validation(format!(
                "format '{}' is not supported by the file store",
                other.extension()
            ))),
        }
    }

    fn save(&self, frame: &Frame, path: &Path, format: DataFormat) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(AgentError::from_io)?;
            }
        }
        info!("Saving dataset to {}", path.display());
        match format {
            DataFormat::Json => self.save_json(frame, path),
            DataFormat::Csv => self.save_csv(frame, path),
            other => Err(AgentError::Validation(format!(
                "format '{}' is not supported by the file store",
                other.extension()
            ))),
        }
    }
}
