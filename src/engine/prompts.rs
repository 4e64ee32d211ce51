//! Prompt construction for the analysis and planning calls.

use crate::engine::frame::Frame;

/// Prompt asking the model to answer a data question with a Rhai script
///
/// Describes the dataset (shape, column dtypes, a head sample) and the
/// script surface available inside the sandbox, and instructs the model to
/// leave its answer in a `result` variable inside a tagged fence.
pub fn analysis_prompt(frame: &Frame, question: &str, sample_rows: usize) -> String {
    let column_info: String = frame
        .dtypes()
        .iter()
        .map(|(name, dtype)| format!("- {name}: {dtype}\n"))
        .collect();
    let sample = frame.head_csv(sample_rows);

    format!(
        r#"You are a helpful data analyst assistant. Analyze the following dataset and answer the user's question.

Dataset Information:
- Total Rows: {rows}
- Total Columns: {cols}

Column Details:
{column_info}
Sample Data (first {sample_rows} rows):
```csv
{sample}```

IMPORTANT INSTRUCTIONS:
- A dataset named `df` is already available. DO NOT load or import anything.
- Access a column with `df["column name"]`; columns support `.sum()`, `.mean()`, `.min()`, `.max()`, `.count()`, `.unique()` and `.values()`.
- `df.rows` and `df.cols` give the dataset shape.
- Write a short Rhai script and store the final answer in a variable named `result`.
- Keep the script concise; use `print(...)` only for intermediate context.

User's Question:
{question}

Provide your answer in the following format:
1. Brief explanation of your approach
2. Rhai code in a ```rhai``` code block
3. Expected output description
"#,
        rows = frame.n_rows(),
        cols = frame.n_cols(),
    )
}

/// Prompt asking the model to break a free-text request into ordered steps
pub fn routing_prompt(request: &str, agents: &[String]) -> String {
    let agent_list: String = agents.iter().map(|name| format!("- {name}\n")).collect();

    format!(
        r#"You are a workflow planner for a data analysis system. Break the user's request into an ordered list of short task steps.

Available agents:
{agent_list}
Respond with a JSON object of exactly this shape:
{{"task_breakdown": ["first step", "second step", ...]}}

Each step must be a single short sentence describing one action (load, filter, save, profile, or query).

User's Request:
{request}
"#
    )
}
