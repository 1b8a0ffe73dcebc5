//! WASM entry points for the browser-based graph editor.

use wasm_bindgen::prelude::*;

use crate::error::{DslError, ParseError, ValidationProblem};
use crate::graph::Graph;

/// Parse a flow definition and return its graph form.
/// Returns `{status: "success", graph}` or `{status: "errors", errors: [...]}`.
#[wasm_bindgen]
pub fn parse_definition(name: &str, dsl: &str) -> JsValue {
    let result = parse_definition_inner(name, dsl);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn parse_definition_inner(name: &str, dsl: &str) -> GraphResult {
    match crate::parse::parse(name, dsl, true) {
        Ok(definition) => GraphResult::Success {
            graph: definition.to_graph(),
        },
        Err(DslError::Parse(e)) => GraphResult::Errors {
            errors: vec![ProblemDto::from(e)],
        },
        Err(DslError::Validation(v)) => {
            GraphResult::Errors {
                errors: v.problems.into_iter().map(ProblemDto::from).collect(),
            }
        }
    }
}

/// Parse without failing on semantic problems and return every problem found.
#[wasm_bindgen]
pub fn validate_definition(name: &str, dsl: &str) -> JsValue {
    let result = validate_definition_inner(name, dsl);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_definition_inner(name: &str, dsl: &str) -> Vec<ProblemDto> {
    match crate::parse::parse(name, dsl, false) {
        Ok(definition) => definition
            .validate()
            .into_iter()
            .map(ProblemDto::from)
            .collect(),
        Err(DslError::Parse(e)) => vec![ProblemDto::from(e)],
        Err(DslError::Validation(v)) => v.problems.into_iter().map(ProblemDto::from).collect(),
    }
}

/// Re-serialize an edited graph back to canonical DSL text.
/// Returns `{status: "success", dsl}` or `{status: "errors", errors: [...]}`.
#[wasm_bindgen]
pub fn graph_to_dsl(graph_json: &str) -> JsValue {
    let result = graph_to_dsl_inner(graph_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn graph_to_dsl_inner(graph_json: &str) -> DslResult {
    let graph = match Graph::from_json(graph_json) {
        Ok(g) => g,
        Err(e) => {
            return DslResult::Errors {
                errors: vec![ProblemDto {
                    code: 0,
                    position: 0,
                    message: format!("Failed to parse graph JSON: {}", e),
                }],
            };
        }
    };
    match graph.to_dsl_text() {
        Ok(dsl) => DslResult::Success { dsl },
        Err(e) => DslResult::Errors {
            errors: vec![ProblemDto {
                code: 0,
                position: 0,
                message: e.to_string(),
            }],
        },
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize)]
struct ProblemDto {
    code: u16,
    position: usize,
    message: String,
}

impl From<ParseError> for ProblemDto {
    fn from(e: ParseError) -> Self {
        ProblemDto {
            code: e.code.code(),
            position: e.position,
            message: e.message(),
        }
    }
}

impl From<ValidationProblem> for ProblemDto {
    fn from(p: ValidationProblem) -> Self {
        ProblemDto {
            code: p.code.code(),
            position: p.position,
            message: p.message(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum GraphResult {
    #[serde(rename = "success")]
    Success { graph: Graph },
    #[serde(rename = "errors")]
    Errors { errors: Vec<ProblemDto> },
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum DslResult {
    #[serde(rename = "success")]
    Success { dsl: String },
    #[serde(rename = "errors")]
    Errors { errors: Vec<ProblemDto> },
}
