//! Lowering the node graph to a flat, serialisable description.
//!
//! Emission walks depth-first from a root node, assigning sequential ids in
//! discovery order. Revisits short-circuit through the visited map, which is
//! also what makes cycles at the node-object level terminate. The emitter
//! only inspects values; it never mutates them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::EmitError,
    node::{NodeArena, NodeId},
    value::Value,
};

/// One socket on an emitted node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub id: u32,
    pub name: String,
}

/// A primitive argument value in a node's configuration. Only integers,
/// strings, and booleans survive emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Str(String),
    Bool(bool),
}

/// The configuration blob bundled with an emitted node: the argument values
/// by parameter name, and the node's label under `tag`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub args: IndexMap<String, ConfigValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// One emitted node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    /// The single anonymous input socket.
    pub inputs: Socket,
    pub outputs: Vec<Socket>,
    pub configuration: Configuration,
}

/// One endpoint of an emitted edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketRef {
    pub node: u32,
    pub socket: u32,
}

/// A directed edge between emitted sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConnection {
    pub source: SocketRef,
    pub destination: SocketRef,
}

/// The flat graph description consumed by the downstream runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub nodes: Vec<GraphNode>,
    pub connections: Vec<GraphConnection>,
}

impl Graph {
    /// Emits the graph reachable from `root`. Re-emitting from the same root
    /// yields records in identical id order.
    pub fn from_node(arena: &NodeArena, root: NodeId, name: impl Into<String>) -> Result<Self, EmitError> {
        let mut graph = Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        };
        let mut visited = IndexMap::new();
        visit(arena, root, &mut visited, &mut graph)?;
        Ok(graph)
    }
}

fn visit(
    arena: &NodeArena,
    node_id: NodeId,
    visited: &mut IndexMap<NodeId, u32>,
    graph: &mut Graph,
) -> Result<u32, EmitError> {
    if let Some(&id) = visited.get(&node_id) {
        return Ok(id);
    }
    let id = u32::try_from(visited.len()).expect("graph id overflow");
    visited.insert(node_id, id);

    let node = arena.get(node_id);
    let node_type = &node.node_type;

    let mut args = IndexMap::new();
    for (param, value) in node_type.params.iter().zip(&node.args) {
        let config = match value {
            Value::Integer(v) => ConfigValue::Integer(*v),
            Value::Str(v) => ConfigValue::Str(v.clone()),
            Value::Bool(v) => ConfigValue::Bool(*v),
            other => return Err(EmitError::UnsupportedArgument(other.type_tag())),
        };
        args.insert(param.clone(), config);
    }

    graph.nodes.push(GraphNode {
        id,
        name: None,
        node_type: node_type.name.clone(),
        inputs: Socket {
            id: 0,
            name: "Input".to_owned(),
        },
        outputs: node_type
            .output_slots
            .iter()
            .enumerate()
            .map(|(i, slot)| Socket {
                id: u32::try_from(i).expect("socket id overflow"),
                name: slot.clone(),
            })
            .collect(),
        configuration: Configuration {
            args,
            tag: node.field_name.clone().or_else(|| node.tag_name.clone()),
        },
    });

    for connection in node.connections(node_id) {
        let destination = visit(arena, connection.end.node, visited, graph)?;
        // the destination socket is the slot's position in the destination's
        // *output* list, falling back to 0; this mirrors the consumed format
        let socket = arena
            .get(connection.end.node)
            .node_type
            .output_slots
            .iter()
            .position(|slot| *slot == connection.end.name)
            .map_or(0, |i| u32::try_from(i).expect("socket id overflow"));
        graph.connections.push(GraphConnection {
            source: SocketRef { node: id, socket: 0 },
            destination: SocketRef {
                node: destination,
                socket,
            },
        });
    }

    Ok(id)
}
