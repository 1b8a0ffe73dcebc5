//! Graph → DSL reconstruction: canonical text, split discovery, SYNC
//! collapsing, and the fixed-point round-trip property.

mod helpers;

use std::collections::BTreeMap;

use flowdsl::graph::{Graph, GraphLink, GraphNode};

use helpers::{check_dsl_to_graph_and_back, parse, parse_unvalidated};

#[test]
fn flows_round_trip() {
    check_dsl_to_graph_and_back("AppA");
    check_dsl_to_graph_and_back("AppA && AppB");
    check_dsl_to_graph_and_back("timestamp");
    check_dsl_to_graph_and_back("a-b-c && d-e-f");
}

#[test]
fn splits_round_trip() {
    check_dsl_to_graph_and_back("<AppA || AppB>");
    check_dsl_to_graph_and_back("<AppA && AppB || AppC>");
    check_dsl_to_graph_and_back("<AppA || AppB && AppC>");
    check_dsl_to_graph_and_back("<AppA && AppB || foo: AppB && AppC>");
    check_dsl_to_graph_and_back("AppA && <AppB || AppC>");
    check_dsl_to_graph_and_back("AppA && <AppB || AppC> && AppD");
    check_dsl_to_graph_and_back("<foojob || bbb && ccc>");
    check_dsl_to_graph_and_back("<a || b> && c");
    check_dsl_to_graph_and_back("a && <b || c>");
}

#[test]
fn sync_points_round_trip() {
    check_dsl_to_graph_and_back("<a || b> && <c || d>");
    check_dsl_to_graph_and_back("<AppA || AppB> && <AppC || AppD>");
    check_dsl_to_graph_and_back("<AppA && AppB || AppC> && <AppD || AppE && AppF>");
    // Here foo acts as the sync node and must be preserved
    check_dsl_to_graph_and_back("<a || b> && foo && <c || d>");
}

#[test]
fn transitions_round_trip() {
    check_dsl_to_graph_and_back("AppA 0->AppE && AppB");
    check_dsl_to_graph_and_back("AppA 0->AppE && AppB && AppC");
    check_dsl_to_graph_and_back("AppA 0->AppE && AppB && <AppC || AppD>");
    check_dsl_to_graph_and_back("aaa 'FOO'->XXX 'B'->bbb1 '*'->ccc1 && bbb2 && ccc2");
    check_dsl_to_graph_and_back("foo 'failed'->bbb && bar 'failed'->bbc");
    check_dsl_to_graph_and_back("aaa 'COMPLETED'->kill1 'FOO'->kill2");
    check_dsl_to_graph_and_back("aaa 'COMPLETED'->kill && bbb && ccc");
    check_dsl_to_graph_and_back("aaa 'COMPLETED'->kill1 && bbb 'COMPLETED'->kill2 && ccc");
    check_dsl_to_graph_and_back("aaa 'COMPLETED'->x: kill 'FOO'->bar && bbb 'COMPLETED'->y: kill && ccc");
}

#[test]
fn split_transitions_round_trip() {
    check_dsl_to_graph_and_back("<Foo 'failed'->Kill || Bar>");
    check_dsl_to_graph_and_back("<AppA 'failed'->Kill || AppB> && AppC");
    check_dsl_to_graph_and_back("<aaa 'COMPLETED'->kill || bbb> && ccc");
}

#[test]
fn reserved_targets_round_trip() {
    check_dsl_to_graph_and_back("aaa '*'->$END && bbb");
    check_dsl_to_graph_and_back("aaa '*'->$END && bbb && ccc");
    check_dsl_to_graph_and_back("aaa '*'->$END && <bbb || ccc>");
    check_dsl_to_graph_and_back("foo 'oranges'->$END");
    check_dsl_to_graph_and_back("foo 'oranges'->$FAIL");
    check_dsl_to_graph_and_back("<a || b> && foo 'wibble'->$END && <c || d>");
    check_dsl_to_graph_and_back("<a || b> && foo 'wibble'->$FAIL && <c || d>");
}

#[test]
fn nested_splits_round_trip() {
    check_dsl_to_graph_and_back("<aaa || ccc || ddd> && eee");
    check_dsl_to_graph_and_back("<aaa || bbb && <ccc || ddd>> && eee");
    check_dsl_to_graph_and_back("<aaa && <bbb || ccc> && foo || ddd && eee> && fff");
    check_dsl_to_graph_and_back("<aaa && <bbb || ccc> || ddd && eee> && fff");
    check_dsl_to_graph_and_back("<aaa || bbb && <ccc || ddd>> && <eee || fff>");
    check_dsl_to_graph_and_back("<aaa || bbb && <ccc || ddd>> && <eee || fff> && <ggg || hhh>");
    check_dsl_to_graph_and_back("<<AA || BB> && CC || DD>");
    check_dsl_to_graph_and_back("<<AA || BB> && CC && DD || EE>");
    check_dsl_to_graph_and_back("<<AC && AD || AE && AF> && AG || AB>");
    check_dsl_to_graph_and_back("<<AC && AD || AE 'jumpOut'->AH && AF> && AG || AB>");
    check_dsl_to_graph_and_back("<<AA || BB> && CC && DD || <EE || FF> && GG || HH>");
    check_dsl_to_graph_and_back("<<AA || BB> && CC || <DD || EE> && FF && GG || HH>");
    check_dsl_to_graph_and_back(
        "<<jdbchdfs-local && spark-client || spark-cluster && two: spark-cluster> && timestamp || spark-yarn>",
    );
}

#[test]
fn long_definitions_round_trip() {
    check_dsl_to_graph_and_back(
        "<aaa && fff || bbb && ggg && <ccc || ddd>> && eee && hhh && iii && <jjj || kkk && lll>",
    );
}

#[test]
fn single_branch_splits_collapse() {
    // The split around one transition-free branch carries no information and
    // disappears in the round trip.
    let graph = parse_unvalidated("<AppA>").to_graph();
    assert_eq!(graph.to_dsl_text().unwrap(), "AppA");
    let graph = parse_unvalidated("<AppA> && AppB").to_graph();
    assert_eq!(graph.to_dsl_text().unwrap(), "AppA && AppB");
    // With a transition in play the split is structural and is kept
    let graph = parse_unvalidated("<AppA 99->AppC> && AppB").to_graph();
    assert_eq!(graph.to_dsl_text().unwrap(), "<AppA 99->AppC> && AppB");
    check_dsl_to_graph_and_back("<AppA 99->AppC || AppD> && AppB");
}

#[test]
fn branching_step_keeps_its_continuation() {
    check_dsl_to_graph_and_back(
        "<Import: timestamp 'Error2'->T2: timestamp 'Error'->T1: timestamp> && Backwards: timestamp",
    );
    check_dsl_to_graph_and_back(
        "Import: timestamp 'Error2'->T2: timestamp 'Error'->T1: timestamp && Backwards: timestamp",
    );
}

#[test]
fn labels_round_trip() {
    check_dsl_to_graph_and_back("t1: timestamp 'FAILED'->t2: timestamp && t3: timestamp");
    check_dsl_to_graph_and_back(
        "t1: timestamp --format=aabbcc 'FAILED'->t2: timestamp && t3: timestamp --format=gghhii",
    );
    check_dsl_to_graph_and_back(
        "t1: timestamp --format=aabbcc 'FAILED'->t2: timestamp --format=ddeeff && t3: timestamp --format=gghhii",
    );
}

#[test]
fn properties_round_trip() {
    check_dsl_to_graph_and_back(
        "sql-executor-task --password=password --script-location=/dataflow/scripts/test.sql --url=jdbc:postgresql://127.0.0.1:5432/postgres --username=postgres",
    );
}

#[test]
fn edited_graph_properties_are_quoted_when_needed() {
    let mut graph = parse("aaa").to_graph();
    let mut properties = BTreeMap::new();
    properties.insert("one".to_string(), "bar".to_string());
    properties.insert("two".to_string(), "b ar".to_string());
    graph.nodes[1].properties = Some(properties);
    assert_eq!(graph.to_dsl_text().unwrap(), "aaa --one=bar --two='b ar'");

    graph.nodes.push(GraphNode::new(3, "bbb"));
    graph.links.push(GraphLink::transition(1, 3, "tname"));
    assert_eq!(
        graph.to_dsl_text().unwrap(),
        "aaa --one=bar --two='b ar' 'tname'->bbb"
    );

    graph.nodes.push(GraphNode::new(4, "ccc"));
    graph.links.push(GraphLink::transition(1, 4, "*"));
    assert_eq!(
        graph.to_dsl_text().unwrap(),
        "aaa --one=bar --two='b ar' 'tname'->bbb '*'->ccc"
    );

    graph.nodes.push(GraphNode::new(5, "ddd"));
    graph.links.push(GraphLink::transition(1, 5, "3"));
    assert_eq!(
        graph.to_dsl_text().unwrap(),
        "aaa --one=bar --two='b ar' 'tname'->bbb '*'->ccc 3->ddd"
    );
}

#[test]
fn quoted_values_and_statuses_unquote_into_the_graph() {
    let dsl = "aaa --one=bar --two='b ar' 'tname'->bbb '*'->ccc 3->ddd";
    let graph = parse_unvalidated(dsl).to_graph();
    assert_eq!(graph.nodes[1].properties.as_ref().unwrap()["two"], "b ar");
    assert_eq!(graph.links[1].transition_name.as_deref(), Some("tname"));
    assert_eq!(graph.links[2].transition_name.as_deref(), Some("*"));
    assert_eq!(graph.links[3].transition_name.as_deref(), Some("3"));
    assert_eq!(graph.to_dsl_text().unwrap(), dsl);
}

#[test]
fn compile_reconstruct_is_a_fixed_point() {
    let samples = [
        "AppA && AppB",
        "<a || b> && <c || d>",
        "aaa 'COMPLETED'->x: kill 'FOO'->bar && bbb 'COMPLETED'->y: kill && ccc",
        "<<AA || BB> && CC || DD>",
        "aaa '*'->$END && <bbb || ccc>",
    ];
    for dsl in samples {
        let first = parse(dsl).to_graph();
        let text = first.to_dsl_text().unwrap();
        let second = parse_unvalidated(&text).to_graph();
        assert_eq!(first, second, "fixed point failed for {:?}", dsl);
        assert_eq!(second.to_dsl_text().unwrap(), text);
    }
}

#[test]
fn reconstruction_requires_terminals() {
    let graph = Graph::new(vec![GraphNode::new(0, "foo")], Vec::new());
    assert!(graph.to_dsl_text().is_err());
}

#[test]
fn empty_property_maps_are_harmless() {
    // Editors may attach empty maps where the compiler would emit nothing.
    let mut graph = parse("timestamp").to_graph();
    for node in &mut graph.nodes {
        node.properties = Some(BTreeMap::new());
    }
    assert_eq!(graph.to_dsl_text().unwrap(), "timestamp");
}
