use regex::Regex;

/// Pulls fenced code candidates out of free-form model text
///
/// Only fences explicitly tagged as Rhai count; bare or differently-tagged
/// fences are ignored. Zero matches is "no code produced", not an error.
pub struct CodeExtractor {
    pattern: Regex,
}

impl CodeExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?s)```rhai[ \t]*\r?\n(.*?)```")
                .expect("fenced-block pattern is valid"),
        }
    }

    /// Inner text of every tagged fence, trimmed, in order of appearance
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures_iter(text)
            .map(|captures| captures[1].trim().to_string())
            .collect()
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}
