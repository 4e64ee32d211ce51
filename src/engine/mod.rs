pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod result;
pub mod router;
pub mod sandbox;
pub mod store;
pub mod task;

// Re-export key types for easier access
pub use agents::{Agent, AgentInfo, AgentStats, EtlAgent, ProfilingAgent, QueryAgent};
pub use config::EngineConfig;
pub use context::SharedContext;
pub use error::{AgentError, Result};
pub use frame::Frame;
pub use llm::{InferenceClient, OllamaClient};
pub use orchestrator::WorkflowRunner;
pub use planner::NaturalLanguagePlanner;
pub use report::{HtmlReportWriter, ProfileReporter};
pub use result::{ExecutionResult, TaskData};
pub use router::AgentRegistry;
pub use sandbox::{CodeExtractor, SafetyValidator, Sandbox};
pub use store::{DataFormat, DatasetStore, FileDatasetStore};
pub use task::{Task, TaskKind, TaskSpec};
