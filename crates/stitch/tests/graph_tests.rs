//! Graph lowering: record shapes, id assignment, edge sockets, cycles.

use pretty_assertions::assert_eq;
use stitch::{ConfigValue, Evaluator, Graph, NodeId, NodeType, Parser, Registry, Value};

fn snmp_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_node_type(NodeType::hosted(
        "snmp:get",
        vec!["oid".to_owned()],
        vec!["Input".to_owned()],
        vec!["Output".to_owned(), "Error".to_owned()],
    ));
    registry.register_node_type(NodeType::hosted(
        "snmp:walk",
        vec!["oid".to_owned()],
        vec!["Input".to_owned()],
        vec!["Output".to_owned(), "Error".to_owned()],
    ));
    registry.register_node_type(NodeType::hosted(
        "std:passthru",
        Vec::new(),
        vec!["Input".to_owned()],
        vec!["Output".to_owned()],
    ));
    registry
}

fn eval_source(source: &str) -> Evaluator {
    let ast = Parser::new(source.as_bytes()).parse().expect("parse failure");
    let mut eval = Evaluator::new(Box::new(snmp_registry()));
    let root = eval.root();
    eval.eval_program(&ast, root).expect("evaluation failure");
    eval
}

fn node_binding(eval: &Evaluator, name: &str) -> NodeId {
    match eval.envs.get(eval.root(), name) {
        Some(Value::Node(id)) => id,
        other => panic!("'{name}' is not a node binding: {other:?}"),
    }
}

#[test]
fn a_two_node_chain_emits_two_records_and_one_edge() {
    let source = "let get = internal \"snmp:get\"\nlet walk = internal \"snmp:walk\"\n\
                  let g = snmp:get(\"1.3\") -> snmp:walk(\"1.3.6\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    assert_eq!(eval.arena.get(g).node_type.name, "snmp:get");

    let graph = Graph::from_node(&eval.arena, g, "test").expect("emission failure");
    assert_eq!(graph.name, "test");
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].id, 0);
    assert_eq!(graph.nodes[0].node_type, "snmp:get");
    assert_eq!(graph.nodes[1].id, 1);
    assert_eq!(graph.nodes[1].node_type, "snmp:walk");

    assert_eq!(graph.connections.len(), 1);
    let edge = graph.connections[0];
    assert_eq!(edge.source.node, 0);
    assert_eq!(edge.source.socket, 0);
    assert_eq!(edge.destination.node, 1);
    assert_eq!(edge.destination.socket, 0);

    // argument values ride along in the configuration blob
    assert_eq!(
        graph.nodes[0].configuration.args.get("oid"),
        Some(&ConfigValue::Str("1.3".to_owned()))
    );
    assert_eq!(
        graph.nodes[1].configuration.args.get("oid"),
        Some(&ConfigValue::Str("1.3.6".to_owned()))
    );
    // the qualified-name spelling labelled both nodes
    assert_eq!(graph.nodes[0].configuration.tag.as_deref(), Some("snmp"));
}

#[test]
fn node_records_expose_one_input_and_all_output_sockets() {
    let source = "let get = internal \"snmp:get\"\nlet g = get(\"1.3\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    let graph = Graph::from_node(&eval.arena, g, "test").unwrap();

    let node = &graph.nodes[0];
    assert_eq!(node.inputs.id, 0);
    assert_eq!(node.inputs.name, "Input");
    let outputs: Vec<(u32, &str)> = node.outputs.iter().map(|s| (s.id, s.name.as_str())).collect();
    assert_eq!(outputs, vec![(0, "Output"), (1, "Error")]);
}

#[test]
fn field_names_surface_under_the_tag_key() {
    let source = "let get = internal \"snmp:get\"\nlet g = poller: get(\"1.3\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    let graph = Graph::from_node(&eval.arena, g, "test").unwrap();
    assert_eq!(graph.nodes[0].configuration.tag.as_deref(), Some("poller"));
}

#[test]
fn tag_names_surface_under_the_tag_key_too() {
    let source = "let get = internal \"snmp:get\"\nlet g = @edge: get(\"1.3\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    let graph = Graph::from_node(&eval.arena, g, "test").unwrap();
    assert_eq!(graph.nodes[0].configuration.tag.as_deref(), Some("edge"));
}

#[test]
fn edges_to_named_slots_use_the_output_position_of_the_slot_name() {
    // connecting into an output-named slot lands on that slot's position in
    // the destination's output list
    let source = "let get = internal \"snmp:get\"\nlet walk = internal \"snmp:walk\"\n\
                  let a = get(\"1\")\nlet b = walk(\"2\")\na.Output -> b.Error";
    let eval = eval_source(source);
    let a = node_binding(&eval, "a");
    let graph = Graph::from_node(&eval.arena, a, "test").unwrap();
    assert_eq!(graph.connections.len(), 1);
    assert_eq!(graph.connections[0].destination.socket, 1);
}

#[test]
fn re_emission_is_idempotent() {
    let source = "let get = internal \"snmp:get\"\nlet walk = internal \"snmp:walk\"\n\
                  let g = get(\"1\") -> walk(\"2\") -> walk(\"3\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    let first = Graph::from_node(&eval.arena, g, "test").unwrap();
    let second = Graph::from_node(&eval.arena, g, "test").unwrap();
    assert_eq!(first, second);
}

#[test]
fn cycles_terminate_through_the_visited_map() {
    let source = "let p = internal \"std:passthru\"\nlet a = p()\nlet b = p()\na -> b\nb -> a";
    let eval = eval_source(source);
    let a = node_binding(&eval, "a");
    let graph = Graph::from_node(&eval.arena, a, "cycle").unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.connections.len(), 2);
    let ids: Vec<u32> = graph.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn diamonds_emit_each_node_once() {
    let source = "let p = internal \"std:passthru\"\n\
                  let a = p()\nlet b = p()\nlet c = p()\nlet d = p()\n\
                  a -> b\na -> c\nb -> d\nc -> d";
    let eval = eval_source(source);
    let a = node_binding(&eval, "a");
    let graph = Graph::from_node(&eval.arena, a, "diamond").unwrap();
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.connections.len(), 4);
}

#[test]
fn non_primitive_arguments_fail_emission() {
    let source = "node[Input] Wrap(x) -> [Output] { x }\nlet n = Wrap([1, 2])";
    let eval = eval_source(source);
    let n = node_binding(&eval, "n");
    let err = Graph::from_node(&eval.arena, n, "test").expect_err("expected emission failure");
    assert_eq!(err.to_string(), "LIST not supported as node argument");
}

#[test]
fn boolean_and_integer_arguments_are_representable() {
    let source = "node[Input] Gate(enabled, limit) -> [Output] { enabled }\nlet n = Gate(true, 10)";
    let eval = eval_source(source);
    let n = node_binding(&eval, "n");
    let graph = Graph::from_node(&eval.arena, n, "test").unwrap();
    let args = &graph.nodes[0].configuration.args;
    assert_eq!(args.get("enabled"), Some(&ConfigValue::Bool(true)));
    assert_eq!(args.get("limit"), Some(&ConfigValue::Integer(10)));
}

#[test]
fn graphs_serialize_with_the_wire_field_names() {
    let source = "let get = internal \"snmp:get\"\nlet walk = internal \"snmp:walk\"\n\
                  let g = poller: get(\"1.3\") -> walk(\"1.3.6\")";
    let eval = eval_source(source);
    let g = node_binding(&eval, "g");
    let graph = Graph::from_node(&eval.arena, g, "wire").unwrap();
    let json = serde_json::to_value(&graph).unwrap();

    assert_eq!(json["name"], "wire");
    assert_eq!(json["nodes"][0]["type"], "snmp:get");
    assert_eq!(json["nodes"][0]["inputs"]["name"], "Input");
    assert_eq!(json["nodes"][0]["outputs"][0]["name"], "Output");
    assert_eq!(json["nodes"][0]["configuration"]["args"]["oid"], "1.3");
    assert_eq!(json["nodes"][0]["configuration"]["tag"], "poller");
    assert_eq!(json["connections"][0]["source"]["node"], 0);
    assert_eq!(json["connections"][0]["destination"]["node"], 1);
    // unnamed nodes and untagged configurations stay off the wire
    assert!(json["nodes"][1]["configuration"].get("tag").is_none());
    assert!(json["nodes"][0].get("name").is_none());
}
