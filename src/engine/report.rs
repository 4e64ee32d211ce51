use crate::engine::error::{AgentError, Result};
use crate::engine::frame::Frame;
use log::info;
use std::fs;
use std::path::Path;

/// Full-report rendering collaborator
///
/// The profiling agent delegates here for the heavyweight report; a render
/// failure never invalidates the quick stats it computes itself.
pub trait ProfileReporter: Send + Sync {
    fn render(&self, frame: &Frame, output_path: &Path) -> Result<()>;
}

/// Renders a small static HTML summary of the dataset
#[derive(Debug, Default)]
pub struct HtmlReportWriter;

impl HtmlReportWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ProfileReporter for HtmlReportWriter {
    fn render(&self, frame: &Frame, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(AgentError::from_io)?;
            }
        }

        let missing = frame.missing_counts();
        let mut rows = String::new();
        for (name, dtype) in frame.dtypes() {
            let missing_count = missing
                .iter()
                .find(|(n, _)| *n == name)
                .map_or(0, |(_, count)| *count);
            let unique = frame.unique_count(&name).unwrap_or(0);
            rows.push_str(&format!(
                "<tr><td>{name}</td><td>{dtype}</td><td>{missing_count}</td><td>{unique}</td></tr>\n"
            ));
        }

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Data Profile</title></head>
<body>
<h1>Data Profile</h1>
<p>{rows_count} rows &times; {cols_count} columns, ~{memory_kb} KB</p>
<table border="1">
<tr><th>Column</th><th>Type</th><th>Missing</th><th>Unique</th></tr>
{rows}</table>
</body>
</html>
"#,
            rows_count = frame.n_rows(),
            cols_count = frame.n_cols(),
            memory_kb = frame.memory_estimate() / 1024,
        );

        fs::write(output_path, html).map_err(AgentError::from_io)?;
        info!("Profile report written to {}", output_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_render_writes_html() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("profile.html");
        let frame = Frame::from_records(&[
            json!({"region": "West", "sales": 100}),
            json!({"region": "East", "sales": null}),
        ])
        .unwrap();

        HtmlReportWriter::new().render(&frame, &path).unwrap();
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("2 rows"));
        assert!(html.contains("<td>region</td>"));
        assert!(html.contains("<td>sales</td>"));
    }
}
