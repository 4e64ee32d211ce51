/*!
# Agentflow-rs

A natural-language data analysis engine: free-text requests are broken into
task workflows, routed to specialized agents, and executed against a shared
dataset context. Model-authored analysis code runs through a
static-vet-then-sandbox pipeline so nothing the model wrote executes
unreviewed.

## Overview

The engine turns one user request into an ordered list of tasks, dispatches
each task to the first agent that accepts it, and carries produced data
forward in a shared context so later tasks operate on the latest state.
Every task returns the same success/data/error envelope regardless of how it
failed, so callers inspect results instead of catching errors.

## Key Components

* **WorkflowRunner**: Plans, routes, and executes workflows while owning the
  shared context
* **NaturalLanguagePlanner**: Breaks a free-text request into ordered tasks
  via a structured inference call, with a verbatim-query fallback
* **Agent**: The capability contract; built-in agents cover ETL, dataset
  queries, and profiling
* **Sandbox pipeline**: `CodeExtractor` → `SafetyValidator` → `Sandbox`,
  applied to every model-authored code candidate before it runs
* **ExecutionResult**: The uniform envelope carried by every task execution

## Usage Example

```rust,no_run
use agentflow_rs::engine::{
    EngineConfig, FileDatasetStore, HtmlReportWriter, OllamaClient, Task, WorkflowRunner,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = EngineConfig::from_env();
    let mut runner = WorkflowRunner::new(
        Arc::new(OllamaClient::new(&config)),
        Arc::new(FileDatasetStore::new()),
        Some(Arc::new(HtmlReportWriter::new())),
        &config,
    );

    // Explicit workflow
    let results = runner
        .execute_workflow(&[
            Task::etl_load("data/sales.csv").with_critical(true),
            Task::query("What are the total sales per region?"),
        ])
        .await;
    for result in &results {
        println!("success: {} data: {:?}", result.success, result.data);
    }

    // Or let the planner derive the workflow from free text
    let results = runner
        .run_request("load data/sales.csv and profile the data quality")
        .await;
    println!("{} task(s) executed", results.len());
}
```
*/

pub mod engine;

// Re-export commonly used types at the crate root
pub use engine::{
    AgentError, EngineConfig, ExecutionResult, Frame, Result, Task, TaskData, WorkflowRunner,
};
