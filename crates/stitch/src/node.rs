//! Node templates, node instances, and the arena that owns them.
//!
//! Node-to-node connections form an arbitrary directed graph, cycles
//! included, so instances never hold references to each other. The
//! [`NodeArena`] owns every instance created during one evaluation and hands
//! out copyable [`NodeId`]s; peers are recorded by id and resolved through
//! the arena.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::Block,
    env::EnvId,
    error::EvalErrorKind,
    value::{TypeTag, Value},
};

/// Identifier of a node instance inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("node arena overflow"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node template: the declared argument parameters, slot names, and, for
/// user-defined types, the body block and the environment it captured.
///
/// Hosted templates (registered through the resolver) have no body.
#[derive(Debug)]
pub struct NodeType {
    /// Template name, e.g. `snmp:get` or a user identifier.
    pub name: String,
    /// Declared argument parameter names, in order.
    pub params: Vec<String>,
    pub input_slots: Vec<String>,
    pub output_slots: Vec<String>,
    pub body: Option<Block>,
    pub env: Option<EnvId>,
}

impl NodeType {
    /// A hosted template: name, argument names, slot names, no body.
    pub fn hosted(
        name: impl Into<String>,
        params: Vec<String>,
        input_slots: Vec<String>,
        output_slots: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            input_slots,
            output_slots,
            body: None,
            env: None,
        }
    }

    pub fn inspect(&self) -> String {
        format!(
            "node {} {{Inputs:[{}],Outputs:[{}],Arguments:[{}]}}",
            self.name,
            self.input_slots.join(","),
            self.output_slots.join(","),
            self.params.join(","),
        )
    }
}

/// One attachment point on a node: the owning node, the slot name, and the
/// direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRef {
    pub node: NodeId,
    pub name: String,
    pub is_input: bool,
}

/// An ordered pair of slots: an outgoing edge from `start` to `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub start: SlotRef,
    pub end: SlotRef,
}

/// A live node: its template, argument values, slot sets, optional labels,
/// and the outgoing connections recorded so far.
#[derive(Debug)]
pub struct NodeInstance {
    pub node_type: Rc<NodeType>,
    pub args: Vec<Value>,
    pub input_slots: IndexSet<String>,
    pub output_slots: IndexSet<String>,
    /// Label from `field: expr`.
    pub field_name: Option<String>,
    /// Label from `@tag: expr`.
    pub tag_name: Option<String>,
    /// Source slot name → peer slots, in recording order.
    connections: IndexMap<String, Vec<SlotRef>>,
}

impl NodeInstance {
    /// Builds a new instance of a template with the given argument values;
    /// slot sets are initialised from the template's declared slot names.
    pub fn new(node_type: Rc<NodeType>, args: Vec<Value>) -> Self {
        let input_slots = node_type.input_slots.iter().cloned().collect();
        let output_slots = node_type.output_slots.iter().cloned().collect();
        Self {
            node_type,
            args,
            input_slots,
            output_slots,
            field_name: None,
            tag_name: None,
            connections: IndexMap::new(),
        }
    }

    /// Looks up a slot by name, inputs before outputs. `id` must be this
    /// instance's arena id.
    pub fn slot(&self, id: NodeId, name: &str) -> Option<SlotRef> {
        if self.input_slots.contains(name) {
            Some(SlotRef {
                node: id,
                name: name.to_owned(),
                is_input: true,
            })
        } else if self.output_slots.contains(name) {
            Some(SlotRef {
                node: id,
                name: name.to_owned(),
                is_input: false,
            })
        } else {
            None
        }
    }

    /// Records an outgoing edge from one of this node's slots.
    pub fn record_connection(&mut self, slot: &str, peer: SlotRef) {
        self.connections.entry(slot.to_owned()).or_default().push(peer);
    }

    /// All recorded connections, in recording order per slot. `id` must be
    /// this instance's arena id.
    pub fn connections(&self, id: NodeId) -> Vec<Connection> {
        let mut out = Vec::new();
        for (slot_name, peers) in &self.connections {
            for peer in peers {
                if let Some(start) = self.slot(id, slot_name) {
                    out.push(Connection {
                        start,
                        end: peer.clone(),
                    });
                }
            }
        }
        out
    }

    pub fn inspect(&self) -> String {
        let mut out = format!("Node {{Type={},Args=[", self.node_type.name);
        // argument inspect forms limited to primitives to avoid re-entering
        // the arena from inside a node
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| match arg {
                Value::Integer(v) => v.to_string(),
                Value::Str(v) => format!("\"{v}\""),
                Value::Bool(v) => v.to_string(),
                other => other.type_tag().to_string(),
            })
            .collect();
        out.push_str(&args.join(","));
        out.push_str("],InputSlots=[");
        out.push_str(&self.input_slots.iter().cloned().collect::<Vec<_>>().join(","));
        out.push_str("],OutputSlots=[");
        out.push_str(&self.output_slots.iter().cloned().collect::<Vec<_>>().join(","));
        out.push(']');
        if let Some(field) = &self.field_name {
            out.push_str(&format!(",Field=\"{field}\""));
        } else if let Some(tag) = &self.tag_name {
            out.push_str(&format!(",Tag=\"{tag}\""));
        }
        out.push('}');
        out
    }
}

/// Owns every node instance created during one evaluation.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<NodeInstance>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: NodeInstance) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &NodeInstance {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeInstance {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn slot(&self, id: NodeId, name: &str) -> Option<SlotRef> {
        self.get(id).slot(id, name)
    }
}

/// The connect protocol behind `A -> B`.
///
/// The peer's target slot comes first: a node peer contributes its `Input`
/// slot, a slot peer is used as-is, and a list peer is connected
/// element-wise. The source must offer an `Output` slot (an explicit slot
/// connects under its own name); the recorded edge lands in the source
/// node's connection map and the peer is returned so chains compose.
pub fn connect(arena: &mut NodeArena, left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    match left {
        Value::Node(id) => {
            let Some(peer) = resolve_peer(arena, left, right)? else {
                return Ok(right.clone());
            };
            let source = arena
                .slot(*id, "Output")
                .ok_or_else(|| EvalErrorKind::MissingSlot("Output".to_owned()))?;
            let peer_node = peer.node;
            arena.get_mut(*id).record_connection(&source.name, peer);
            Ok(Value::Node(peer_node))
        }
        Value::Slot(slot) => {
            let Some(peer) = resolve_peer(arena, left, right)? else {
                return Ok(right.clone());
            };
            let peer_node = peer.node;
            arena.get_mut(slot.node).record_connection(&slot.name, peer);
            Ok(Value::Node(peer_node))
        }
        Value::List(list) => {
            if !matches!(list.elem, TypeTag::Node | TypeTag::Slot) {
                return Err(EvalErrorKind::ConnectListElem(list.elem));
            }
            for item in &list.items {
                connect(arena, item, right)?;
            }
            Ok(right.clone())
        }
        other => Err(EvalErrorKind::ConnectPeer(other.type_tag())),
    }
}

/// Resolves the slot a connection should land on. Returns `None` when the
/// peer was a list and the connection was fanned out element-wise already.
fn resolve_peer(arena: &mut NodeArena, left: &Value, right: &Value) -> Result<Option<SlotRef>, EvalErrorKind> {
    match right {
        Value::Node(peer_id) => arena
            .slot(*peer_id, "Input")
            .map(Some)
            .ok_or_else(|| EvalErrorKind::MissingSlot("Input".to_owned())),
        Value::Slot(slot) => Ok(Some(slot.clone())),
        Value::List(list) => {
            for item in &list.items {
                if !item.is_connectable() {
                    return Err(EvalErrorKind::ConnectPeer(item.type_tag()));
                }
                connect(arena, left, item)?;
            }
            Ok(None)
        }
        other => Err(EvalErrorKind::ConnectPeer(other.type_tag())),
    }
}
