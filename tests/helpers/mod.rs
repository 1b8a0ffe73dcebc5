#![allow(dead_code)]

use flowdsl::ast::FlowDefinition;
use flowdsl::error::{DslError, MessageCode, ParseError, ValidationProblem};

/// Parse with validation on; panics on any failure.
pub fn parse(dsl: &str) -> FlowDefinition {
    flowdsl::parse::parse("test", dsl, true)
        .unwrap_or_else(|e| panic!("should parse {:?}: {}", dsl, e))
}

pub fn parse_named(name: &str, dsl: &str) -> FlowDefinition {
    flowdsl::parse::parse(name, dsl, true)
        .unwrap_or_else(|e| panic!("should parse {:?}: {}", dsl, e))
}

/// Parse without running the validator, for definitions that are
/// syntactically fine but semantically incomplete.
pub fn parse_unvalidated(dsl: &str) -> FlowDefinition {
    match flowdsl::parse::parse("test", dsl, false) {
        Ok(d) => d,
        Err(e) => panic!("should parse {:?}: {}", dsl, e),
    }
}

/// The parse failure for a bad definition.
pub fn parse_error(dsl: &str) -> ParseError {
    match flowdsl::parse::parse("test", dsl, true) {
        Ok(d) => panic!("expected parse of {:?} to fail but got {}", dsl, d.stringify()),
        Err(DslError::Parse(e)) => e,
        Err(DslError::Validation(v)) => {
            panic!("expected a parse error for {:?} but got validation problems {:?}", dsl, v)
        }
    }
}

pub fn check_parse_error(dsl: &str, code: MessageCode, position: usize) {
    let e = parse_error(dsl);
    assert_eq!(e.code, code, "wrong code for {:?}: {}", dsl, e);
    assert_eq!(e.position, position, "wrong position for {:?}: {}", dsl, e);
}

pub fn check_parse_error_insert(dsl: &str, code: MessageCode, position: usize, insert: &str) {
    let e = parse_error(dsl);
    assert_eq!(e.code, code, "wrong code for {:?}: {}", dsl, e);
    assert_eq!(e.position, position, "wrong position for {:?}: {}", dsl, e);
    assert_eq!(e.inserts.first().map(String::as_str), Some(insert));
}

/// The validator's findings for a definition that must at least parse.
pub fn validation_problems(dsl: &str) -> Vec<ValidationProblem> {
    parse_unvalidated(dsl).validate()
}

pub fn assert_graph(expected: &str, dsl: &str) {
    let graph = parse(dsl).to_graph();
    assert_eq!(graph.to_verbose_string(), expected, "graph mismatch for {:?}", dsl);
}

pub fn assert_graph_unvalidated(expected: &str, dsl: &str) {
    let graph = parse_unvalidated(dsl).to_graph();
    assert_eq!(graph.to_verbose_string(), expected, "graph mismatch for {:?}", dsl);
}

/// Compile to a graph and reconstruct; the result must be the original text.
pub fn check_dsl_to_graph_and_back(dsl: &str) {
    let graph = parse(dsl).to_graph();
    let reconstructed = graph.to_dsl_text().expect("reconstruction should succeed");
    assert_eq!(reconstructed, dsl);
}

pub fn check_dsl_to_graph_and_back_unvalidated(dsl: &str) {
    let graph = parse_unvalidated(dsl).to_graph();
    let reconstructed = graph.to_dsl_text().expect("reconstruction should succeed");
    assert_eq!(reconstructed, dsl);
}
