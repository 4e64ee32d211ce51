use crate::engine::frame::{ConvertTarget, FilterOp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Task represents a single unit of work routed to one agent
///
/// The wire shape is a flat JSON object discriminated by `kind` (and, for
/// ETL tasks, by `operation`); operation-specific fields are validated at
/// deserialization time rather than at point-of-use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub description: String,
    /// A failed critical task aborts the remaining workflow
    #[serde(default)]
    pub critical: bool,
    #[serde(flatten)]
    pub spec: TaskSpec,
}

/// Kind-discriminated task payload
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskSpec {
    Etl(EtlOperation),
    Query {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    Profile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
    },
}

/// ETL operations, discriminated by `operation`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum EtlOperation {
    Load {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
    Transform {
        #[serde(default)]
        transformations: Vec<Transformation>,
    },
    Filter {
        #[serde(default)]
        filters: FilterSpec,
    },
    Save {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
    },
}

/// One transformation step, applied in list order
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    DropNulls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
    FillNulls {
        #[serde(default = "default_fill_value")]
        value: Value,
    },
    ConvertType { column: String, dtype: ConvertTarget },
    Rename {
        #[serde(default)]
        mapping: HashMap<String, String>,
    },
}

fn default_fill_value() -> Value {
    Value::from(0)
}

/// Filter task payload: convenience date/region bounds plus ordered custom
/// predicates
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub custom: Vec<CustomFilter>,
}

/// A single column predicate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomFilter {
    pub column: String,
    #[serde(default = "default_operator")]
    pub operator: FilterOp,
    pub value: Value,
}

fn default_operator() -> FilterOp {
    FilterOp::Eq
}

/// Coarse task kind, used for routing and error messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Etl,
    Query,
    Profile,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Etl => "etl",
            TaskKind::Query => "query",
            TaskKind::Profile => "profile",
        };
        write!(f, "{name}")
    }
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self.spec {
            TaskSpec::Etl(_) => TaskKind::Etl,
            TaskSpec::Query { .. } => TaskKind::Query,
            TaskSpec::Profile { .. } => TaskKind::Profile,
        }
    }

    /// Query task carrying the request text in both `query` and
    /// `description`
    pub fn query<S: Into<String>>(query: S) -> Self {
        let query = query.into();
        Self {
            description: query.clone(),
            critical: false,
            spec: TaskSpec::Query {
                query: Some(query),
                model: None,
            },
        }
    }

    pub fn etl_load<S: Into<String>>(file_path: S) -> Self {
        Self {
            description: String::new(),
            critical: false,
            spec: TaskSpec::Etl(EtlOperation::Load {
                file_path: Some(file_path.into()),
            }),
        }
    }

    pub fn etl_transform(transformations: Vec<Transformation>) -> Self {
        Self {
            description: String::new(),
            critical: false,
            spec: TaskSpec::Etl(EtlOperation::Transform { transformations }),
        }
    }

    pub fn etl_filter(filters: FilterSpec) -> Self {
        Self {
            description: String::new(),
            critical: false,
            spec: TaskSpec::Etl(EtlOperation::Filter { filters }),
        }
    }

    pub fn etl_save<S: Into<String>>(output_path: S) -> Self {
        Self {
            description: String::new(),
            critical: false,
            spec: TaskSpec::Etl(EtlOperation::Save {
                output_path: Some(output_path.into()),
            }),
        }
    }

    pub fn profile(output_path: Option<String>) -> Self {
        Self {
            description: String::new(),
            critical: false,
            spec: TaskSpec::Profile { output_path },
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Load a task from its JSON wire shape
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
