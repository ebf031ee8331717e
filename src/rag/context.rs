// Prompt assembly: fixed template + ranked context + the caller's original question
use std::path::Path;

use crate::errors::{PipelineError, Result};

/// Placeholder replaced by the joined context documents
pub const CONTEXT_PLACEHOLDER: &str = "{context_placeholder}";

/// Placeholder replaced by the original, unrefined query
pub const QUERY_PLACEHOLDER: &str = "{query_placeholder}";

/// Separator between context documents
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Stands in for the context block when nothing was retrieved
pub const NO_CONTEXT_SENTINEL: &str = "# No relevant documentation snippets found.";

/// Built-in Revit / IronPython code-generation template
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/revit_ironpython.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Context,
    Query,
}

/// A template parsed once into literal text and placeholder slots.
///
/// Substitution is single-pass: placeholder text that appears inside the
/// context or the query is never expanded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template; both placeholders must be present
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;

        loop {
            let next = [
                (CONTEXT_PLACEHOLDER, Segment::Context),
                (QUERY_PLACEHOLDER, Segment::Query),
            ]
            .into_iter()
            .filter_map(|(marker, slot)| rest.find(marker).map(|pos| (pos, marker, slot)))
            .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, marker, slot)) => {
                    if pos > 0 {
                        segments.push(Segment::Text(rest[..pos].to_string()));
                    }
                    segments.push(slot);
                    rest = &rest[pos + marker.len()..];
                }
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }

        let missing: Vec<&str> = [
            (CONTEXT_PLACEHOLDER, Segment::Context),
            (QUERY_PLACEHOLDER, Segment::Query),
        ]
        .iter()
        .filter(|(_, slot)| !segments.contains(slot))
        .map(|(marker, _)| *marker)
        .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Template(format!(
                "template is missing placeholder(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self { segments })
    }

    /// The built-in template
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_TEMPLATE)
    }

    /// Load a template file, or the built-in template when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Template(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::parse(&contents)
            }
            None => Self::builtin(),
        }
    }

    /// Render with context documents and the original query
    pub fn render(&self, context_docs: &[String], original_query: &str) -> String {
        let context = join_context(context_docs);
        let mut prompt = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => prompt.push_str(text),
                Segment::Context => prompt.push_str(&context),
                Segment::Query => prompt.push_str(original_query),
            }
        }
        prompt
    }
}

/// Join documents with the context separator, or the sentinel if none
pub fn join_context(context_docs: &[String]) -> String {
    if context_docs.is_empty() {
        NO_CONTEXT_SENTINEL.to_string()
    } else {
        context_docs.join(CONTEXT_SEPARATOR)
    }
}

/// Parse `template` and render it in one step
pub fn assemble(context_docs: &[String], original_query: &str, template: &str) -> Result<String> {
    Ok(PromptTemplate::parse(template)?.render(context_docs, original_query))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "CTX:\n{context_placeholder}\nQ: {query_placeholder}\n";

    #[test]
    fn test_builtin_template_is_valid() {
        assert!(PromptTemplate::builtin().is_ok());
    }

    #[test]
    fn test_render_joins_with_separator() {
        let docs = vec!["first".to_string(), "second".to_string()];
        let prompt = assemble(&docs, "change wall color", SMALL).unwrap();
        assert_eq!(prompt, "CTX:\nfirst\n\n---\n\nsecond\nQ: change wall color\n");
    }

    #[test]
    fn test_empty_context_uses_sentinel() {
        let prompt = assemble(&[], "X", SMALL).unwrap();
        assert!(prompt.contains(NO_CONTEXT_SENTINEL));
        assert!(prompt.contains("Q: X\n"));
    }

    #[test]
    fn test_missing_placeholder_is_template_error() {
        let err = assemble(&[], "X", "only {query_placeholder}").unwrap_err();
        assert_eq!(err.kind(), "Template");
        assert!(err.to_string().contains(CONTEXT_PLACEHOLDER));

        let err = PromptTemplate::parse("no slots at all").unwrap_err();
        assert!(err.to_string().contains(QUERY_PLACEHOLDER));
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let docs = vec!["doc mentions {query_placeholder}".to_string()];
        let prompt = assemble(&docs, "{context_placeholder}", SMALL).unwrap();
        assert_eq!(
            prompt,
            "CTX:\ndoc mentions {query_placeholder}\nQ: {context_placeholder}\n"
        );
    }

    #[test]
    fn test_query_before_context_and_repeated() {
        let template = "{query_placeholder}|{context_placeholder}|{query_placeholder}";
        let prompt = assemble(&["c".to_string()], "q", template).unwrap();
        assert_eq!(prompt, "q|c|q");
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = PromptTemplate::builtin().unwrap();
        let docs = vec!["Wall.Create".to_string()];
        assert_eq!(template.render(&docs, "make a wall"), template.render(&docs, "make a wall"));
    }

    #[test]
    fn test_load_missing_file_is_template_error() {
        let err = PromptTemplate::load(Some(Path::new("/nonexistent/template.txt"))).unwrap_err();
        assert_eq!(err.kind(), "Template");
    }
}
