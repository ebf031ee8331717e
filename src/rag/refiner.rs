// Query refinement: one free-form request in, several technical search strings out
use std::time::Duration;

use crate::cli::config::RefinerConfig;
use crate::errors::{PipelineError, RefinementError, Result};
use crate::models::{GeminiGenerator, OllamaGenerator, TextGenerator};

/// Ordered, non-empty list of retrieval queries
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedQueries {
    queries: Vec<String>,
    fallback_reason: Option<String>,
}

impl RefinedQueries {
    fn refined(queries: Vec<String>) -> Self {
        debug_assert!(!queries.is_empty());
        Self {
            queries,
            fallback_reason: None,
        }
    }

    fn fallback(original: &str, reason: String) -> Self {
        Self {
            queries: vec![original.to_string()],
            fallback_reason: Some(reason),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.queries
    }

    pub fn into_vec(self) -> Vec<String> {
        self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Always false; the list holds at least one query
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// True when the model was skipped or failed and the original query is used
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }
}

enum Backend {
    Disabled,
    MissingCredential(String),
    Unavailable(String),
    Model(Box<dyn TextGenerator>),
}

/// Rewrites a user request into API-identifier-rich search strings.
///
/// Holds no state between calls. Every model-side failure degrades to the
/// original query; only an empty query is rejected.
pub struct QueryRefiner {
    backend: Backend,
    max_queries: usize,
}

impl QueryRefiner {
    /// Refiner backed by a generative model
    pub fn new(generator: Box<dyn TextGenerator>, max_queries: usize) -> Self {
        Self {
            backend: Backend::Model(generator),
            max_queries: max_queries.max(1),
        }
    }

    /// Refiner that always returns the original query
    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
            max_queries: 1,
        }
    }

    /// Build from configuration; a missing credential is not an error here
    pub fn from_config(config: &RefinerConfig, api_key: Option<String>) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let base_url = config.base_url.as_deref();

        let backend = match config.provider.as_str() {
            "none" => Backend::Disabled,
            "gemini" => match api_key {
                None => Backend::MissingCredential(config.api_key_env.clone()),
                Some(key) => match GeminiGenerator::new(base_url, &config.model, key, timeout) {
                    Ok(client) => Backend::Model(Box::new(client)),
                    Err(e) => Backend::Unavailable(e.to_string()),
                },
            },
            "ollama" => match OllamaGenerator::new(base_url, &config.model, timeout) {
                Ok(client) => Backend::Model(Box::new(client)),
                Err(e) => Backend::Unavailable(e.to_string()),
            },
            other => Backend::Unavailable(format!("unknown provider {other}")),
        };

        Self {
            backend,
            max_queries: config.max_queries.max(1),
        }
    }

    /// Turn one query into a non-empty list of retrieval queries
    pub async fn refine(&self, original_query: &str) -> Result<RefinedQueries> {
        if original_query.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let generator = match &self.backend {
            Backend::Disabled => {
                tracing::info!("query refinement disabled; retrieving with the original query");
                return Ok(RefinedQueries::fallback(
                    original_query,
                    "refinement disabled".to_string(),
                ));
            }
            Backend::MissingCredential(var) => {
                let reason = RefinementError::MissingCredential(var.clone()).to_string();
                tracing::warn!(reason = %reason, "refinement degraded; using original query");
                return Ok(RefinedQueries::fallback(original_query, reason));
            }
            Backend::Unavailable(reason) => {
                tracing::warn!(reason = %reason, "refinement degraded; using original query");
                return Ok(RefinedQueries::fallback(original_query, reason.clone()));
            }
            Backend::Model(generator) => generator,
        };

        tracing::debug!(model = generator.name(), query = original_query, "refining query");

        match self.try_refine(generator.as_ref(), original_query).await {
            Ok(queries) => {
                tracing::info!(count = queries.len(), queries = ?queries, "model returned refined queries");
                Ok(RefinedQueries::refined(queries))
            }
            Err(e) => {
                tracing::warn!(reason = %e, "refinement degraded; using original query");
                Ok(RefinedQueries::fallback(original_query, e.to_string()))
            }
        }
    }

    async fn try_refine(
        &self,
        generator: &dyn TextGenerator,
        original_query: &str,
    ) -> std::result::Result<Vec<String>, RefinementError> {
        let prompt = build_refinement_prompt(original_query);
        let response = generator.generate(&prompt).await?;
        parse_refined_queries(&response, self.max_queries)
    }
}

/// Instruction prompt asking for a JSON array of search strings
pub fn build_refinement_prompt(original_query: &str) -> String {
    format!(
        r#"You are an Autodesk Revit API specialist. Rewrite a user's request into search strings for a vector similarity search over Revit API documentation and code samples.

Produce one or more specific, technical search strings. Prefer exact Revit API class names (FilteredElementCollector, Wall, Floor, Parameter, OverrideGraphicSettings), method names (Wall.Create, View.SetElementOverrides), properties and built-in parameters (HOST_AREA_COMPUTED, BuiltInParameter.WALL_USER_HEIGHT_PARAM) and common API concepts. Snippets are usually C# or IronPython for pyRevit / RevitPythonShell.

If the request is already precise, return it unchanged inside the list. If it is vague ("make a wall"), make it concrete ("Revit API create Wall element", "Wall.Create method example"). If it describes a UI action ("click the wall tool"), translate it to the API equivalent ("programmatically create Wall Revit API").

Answer ONLY with a JSON array of strings. No explanation, no markdown.

Example request: "how to get wall areas in the current view"
Example answer:
["Revit API Wall Area Parameter HOST_AREA_COMPUTED", "FilteredElementCollector get Wall area in view", "Iterate Walls get BuiltInParameter HOST_AREA_COMPUTED example", "Wall element area property view filter API"]

Example request: "change the color of selected elements"
Example answer:
["Revit API OverrideGraphicSettings SetProjectionColor", "View SetElementOverrides element color", "Override element graphics color API", "Autodesk.Revit.DB.OverrideGraphicSettings color change method"]

Example request: "create a floor using lines"
Example answer:
["Revit API Floor.Create method CurveLoop", "Create Floor element using CurveLoop profile API", "Floor.Create(Document, IList<CurveLoop>, ElementId, ElementId)", "Generate Floor geometry from lines Revit API"]

User request:
"{original_query}"

JSON array:
"#
    )
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = ["```json", "```JSON", "```"]
        .iter()
        .find_map(|fence| trimmed.strip_prefix(fence))
        .unwrap_or(trimmed);
    let without_close = without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open);
    without_close.trim()
}

/// Validate model output: a non-empty JSON array of non-empty strings
pub fn parse_refined_queries(
    text: &str,
    max_queries: usize,
) -> std::result::Result<Vec<String>, RefinementError> {
    let cleaned = strip_code_fences(text);

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| RefinementError::MalformedJson {
            error: e.to_string(),
            raw: text.to_string(),
        })?;

    let items = match value {
        serde_json::Value::Array(items) if !items.is_empty() => items,
        serde_json::Value::Array(_) => {
            return Err(RefinementError::InvalidShape("empty array".to_string()))
        }
        other => {
            return Err(RefinementError::InvalidShape(format!(
                "expected an array, got {}",
                json_type_name(&other)
            )))
        }
    };

    let mut queries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                queries.push(s.trim().to_string())
            }
            serde_json::Value::String(_) => {
                return Err(RefinementError::InvalidShape(format!(
                    "element {} is an empty string",
                    index
                )))
            }
            other => {
                return Err(RefinementError::InvalidShape(format!(
                    "element {} is {}, not a string",
                    index,
                    json_type_name(&other)
                )))
            }
        }
    }

    queries.truncate(max_queries.max(1));
    Ok(queries)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerationError;
    use async_trait::async_trait;

    struct Scripted(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(GenerationError::Status {
                    status,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    fn refiner(reply: std::result::Result<&'static str, u16>) -> QueryRefiner {
        QueryRefiner::new(Box::new(Scripted(reply)), 5)
    }

    #[test]
    fn test_prompt_embeds_query() {
        let prompt = build_refinement_prompt("change wall color");
        assert!(prompt.contains("\"change wall color\""));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fences("```\n[\"a\"]\n```  "), "[\"a\"]");
        assert_eq!(strip_code_fences("  [\"a\"]  "), "[\"a\"]");
    }

    #[test]
    fn test_parse_clean_array() {
        let queries = parse_refined_queries(r#"["Wall.Create", "FilteredElementCollector walls"]"#, 5).unwrap();
        assert_eq!(queries, vec!["Wall.Create", "FilteredElementCollector walls"]);
    }

    #[test]
    fn test_parse_truncates_to_max() {
        let queries = parse_refined_queries(r#"["a", "b", "c", "d"]"#, 2).unwrap();
        assert_eq!(queries, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_empty_array() {
        assert!(matches!(
            parse_refined_queries("[]", 5),
            Err(RefinementError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_string_elements() {
        assert!(matches!(
            parse_refined_queries(r#"["ok", 3]"#, 5),
            Err(RefinementError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_refined_queries(r#"["ok", "  "]"#, 5),
            Err(RefinementError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_rejects_object() {
        assert!(matches!(
            parse_refined_queries(r#"{"queries": ["a"]}"#, 5),
            Err(RefinementError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_refined_queries("Sure! Here are some queries.", 5),
            Err(RefinementError::MalformedJson { .. })
        ));
    }

    #[tokio::test]
    async fn test_refine_uses_model_output() {
        let refined = refiner(Ok("```json\n[\"OverrideGraphicSettings\", \"Wall color\"]\n```"))
            .refine("change wall color")
            .await
            .unwrap();
        assert!(!refined.is_fallback());
        assert_eq!(refined.as_slice(), ["OverrideGraphicSettings", "Wall color"]);
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_model_error() {
        let refined = refiner(Err(503)).refine("change wall color").await.unwrap();
        assert!(refined.is_fallback());
        assert_eq!(refined.as_slice(), ["change wall color"]);
        assert!(refined.fallback_reason().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_invalid_json() {
        let refined = refiner(Ok("not json")).refine("select doors").await.unwrap();
        assert_eq!(refined.into_vec(), vec!["select doors".to_string()]);
    }

    #[tokio::test]
    async fn test_refine_rejects_empty_query() {
        let err = refiner(Ok("[\"a\"]")).refine("   ").await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[tokio::test]
    async fn test_missing_credential_falls_back() {
        let config = RefinerConfig::default();
        let refined = QueryRefiner::from_config(&config, None)
            .refine("hide grids")
            .await
            .unwrap();
        assert_eq!(refined.as_slice(), ["hide grids"]);
        assert!(refined.fallback_reason().unwrap().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_disabled_refiner_returns_original() {
        let refined = QueryRefiner::disabled().refine("tag rooms").await.unwrap();
        assert_eq!(refined.as_slice(), ["tag rooms"]);
        assert!(refined.is_fallback());
    }
}
