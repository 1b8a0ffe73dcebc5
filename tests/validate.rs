//! Validator findings: codes, offsets, and the two message renderings.

mod helpers;

use flowdsl::error::{DslError, MessageCode};

use helpers::{parse, validation_problems};

#[test]
fn valid_definitions_have_no_problems() {
    assert!(validation_problems("appA").is_empty());
    assert!(validation_problems("appA;foo: appB").is_empty());
    assert!(validation_problems("appA && appB && appC").is_empty());
}

#[test]
fn secondary_sequences_must_be_named() {
    let problems = validation_problems("appA;appB");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::SecondarySequencesMustBeNamed);
    assert_eq!(problems[0].position, 5);
    assert_eq!(
        problems[0].message(),
        "158E:(pos 5): secondary sequences must have labels or are unreachable"
    );
    assert_eq!(
        problems[0].message_with_context(),
        "158E:(pos 5): secondary sequences must have labels or are unreachable\nappA;appB\n     ^\n"
    );
}

#[test]
fn unnamed_sequence_on_a_new_line() {
    let problems = validation_problems("appA;foo: appB\nappC");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::SecondarySequencesMustBeNamed);
    assert_eq!(problems[0].position, 15);
    assert_eq!(
        problems[0].message_with_context(),
        "158E:(pos 15): secondary sequences must have labels or are unreachable\nappC\n^\n"
    );
}

#[test]
fn duplicate_step_names_need_labels() {
    let problems = validation_problems("appA && appA");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::StepNameAlreadyInUse);
    assert_eq!(problems[0].position, 8);

    let problems = validation_problems("appA 'foo' -> appA");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::StepNameAlreadyInUse);
    assert_eq!(problems[0].position, 14);
}

#[test]
fn label_and_name_clashes() {
    let problems = validation_problems("appA 'foo' -> appA: appB");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::LabelClashesWithStepName);
    assert_eq!(problems[0].position, 14);

    let problems = validation_problems("label1: appA 'foo' -> label1");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::StepNameClashesWithLabel);
    assert_eq!(problems[0].position, 22);
}

#[test]
fn duplicate_labels() {
    let problems = validation_problems("label1: appA 'foo' -> label1: appB");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::LabelAlreadyInUse);
    assert_eq!(problems[0].position, 22);
}

#[test]
fn transition_target_label_undefined() {
    let problems = validation_problems("aa 'foo'->:split && bb && cc");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::TransitionTargetLabelUndefined);
    // The offset points at the reference token
    assert_eq!(problems[0].position, 11);

    let problems = validation_problems("<aa 'foo'->:split && bb && cc || dd>");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::TransitionTargetLabelUndefined);
    assert_eq!(problems[0].position, 12);
}

#[test]
fn forward_and_cross_sequence_references_resolve() {
    assert!(validation_problems("appA 'foo'->:bar && appB && bar: appC").is_empty());
    assert!(validation_problems("appA 'fail'->:two && appB;two: appD && appE").is_empty());
    // Backward reference
    assert!(validation_problems("bar: appC && appA 'foo'->:bar").is_empty());
}

#[test]
fn split_with_one_flow() {
    let problems = validation_problems("<aa>");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::SplitWithOneFlow);
    assert_eq!(problems[0].position, 0);

    let problems = validation_problems("appA && <aa> && appB");
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::SplitWithOneFlow);
    assert_eq!(problems[0].position, 8);
}

#[test]
fn unlabelled_duplicates_in_split_branches() {
    let problems = validation_problems(
        "<<jdbchdfs-local && spark-client || spark-cluster && spark-cluster> && timestamp || spark-yarn>",
    );
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MessageCode::StepNameAlreadyInUse);
    assert_eq!(problems[0].position, 53);
}

#[test]
fn several_problems_reported_together() {
    let problems = validation_problems(
        "<one: jdbchdfs-local && spark-client && timestamp || spark-cluster && spark-cluster && timestamp || spark-yarn>",
    );
    assert_eq!(problems.len(), 2);
    assert_eq!(problems[0].code, MessageCode::StepNameAlreadyInUse);
    assert_eq!(problems[0].position, 70);
    assert_eq!(problems[1].code, MessageCode::StepNameAlreadyInUse);
    assert_eq!(problems[1].position, 87);
}

#[test]
fn validating_parse_raises_all_problems() {
    match flowdsl::parse::parse("test", "appA;appB", true) {
        Err(DslError::Validation(failure)) => {
            assert_eq!(failure.problems.len(), 1);
            assert_eq!(
                failure.problems[0].code,
                MessageCode::SecondarySequencesMustBeNamed
            );
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    // The same definition still yields an AST without validation
    assert_eq!(
        flowdsl::parse::parse("test", "appA;appB", false)
            .unwrap()
            .sequences
            .len(),
        2
    );
}

#[test]
fn reserved_targets_never_clash() {
    assert!(validation_problems("aaa '1'->$END '2'->$END && bbb 'x'->$END").is_empty());
    assert!(validation_problems("aaa '1'->$FAIL && bbb '2'->$FAIL").is_empty());
}

#[test]
fn validate_is_reentrant() {
    let definition = parse("appA && appB");
    assert!(definition.validate().is_empty());
    assert!(definition.validate().is_empty());
}
