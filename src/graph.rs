//! Resolved schema graph
//!
//! An arena of [`ResolvedNode`]s indexed by canonical `(locator, pointer)`
//! key. References are edges between arena slots; a reference that re-entered
//! a node still being resolved is stored as an explicit [`GraphValue::Cycle`]
//! back-edge, so ownership stays acyclic and consumers decide how deep to
//! follow recursion.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::json;
use url::Url;

use crate::error::Location;
use crate::node::Scalar;
use crate::reference::JsonPointer;

/// Canonical identity of a node: document locator plus pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub locator: Url,
    pub pointer: JsonPointer,
}

impl NodeKey {
    pub fn new(locator: Url, pointer: JsonPointer) -> Self {
        Self { locator, pointer }
    }

    /// Parse the `Display` form, `<locator>#<pointer>`
    pub fn parse(key: &str) -> Option<Self> {
        let (locator, pointer) = key.split_once('#')?;
        let locator = Url::parse(locator).ok()?;
        let pointer = JsonPointer::parse(pointer, key).ok()?;
        Some(Self { locator, pointer })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.locator, self.pointer)
    }
}

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Content of a resolved node
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Scalar(Scalar),
    Array(Vec<GraphValue>),
    Object(BTreeMap<String, GraphValue>),
    /// A resolved reference
    Ref(NodeId),
    /// A reference that re-entered a node on the active resolution path
    Cycle(NodeId),
    /// A reference whose branch failed; see the resolution's failures
    Unresolved { reference: String },
}

/// A resolved reference target (or the root)
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub key: NodeKey,
    pub value: GraphValue,
    /// Set when some reference inside this node's own expansion points back to it
    pub cyclic: bool,
}

/// Back-edge annotation: the reference at `location` re-entered `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    pub target: NodeId,
    pub location: Location,
}

/// Immutable result of one resolution pass
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    nodes: Vec<ResolvedNode>,
    index: HashMap<NodeKey, NodeId>,
    cycles: Vec<CycleDetected>,
    root: NodeId,
}

impl SchemaGraph {
    pub fn get_root(&self) -> &ResolvedNode {
        &self.nodes[self.root.0]
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<&ResolvedNode> {
        self.index.get(key).map(|id| &self.nodes[id.0])
    }

    /// Look up a node by id. Ids are only meaningful for the graph that issued them.
    pub fn node(&self, id: NodeId) -> &ResolvedNode {
        &self.nodes[id.0]
    }

    pub fn is_cyclic(&self, node: &ResolvedNode) -> bool {
        self.nodes.get(node.id.0).is_some_and(|n| n.cyclic)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.iter()
    }

    /// Every back-edge recorded during resolution
    pub fn cycles(&self) -> &[CycleDetected] {
        &self.cycles
    }

    /// Follow alias chains: a node whose whole value is a reference to
    /// another node. Stops at the first node with content or at a back-edge.
    pub fn follow(&self, id: NodeId) -> &ResolvedNode {
        let mut current = id;
        let mut steps = 0;
        while let GraphValue::Ref(next) = self.nodes[current.0].value {
            // Alias chains cannot revisit a node without passing a back-edge
            if steps > self.nodes.len() {
                break;
            }
            current = next;
            steps += 1;
        }
        &self.nodes[current.0]
    }

    /// Inline the graph under `id` into a plain JSON tree.
    ///
    /// Each node may appear at most `recursion_limit + 1` times on one path
    /// through back-edges; beyond that a `{"$ref": "<key>"}` stub is emitted.
    pub fn materialize(&self, id: NodeId, recursion_limit: usize) -> serde_json::Value {
        let mut depth = HashMap::new();
        self.materialize_node(id, recursion_limit, &mut depth)
    }

    fn materialize_node(
        &self,
        id: NodeId,
        limit: usize,
        depth: &mut HashMap<NodeId, usize>,
    ) -> serde_json::Value {
        let entered = depth.entry(id).or_insert(0);
        if *entered > limit {
            return json!({ "$ref": self.nodes[id.0].key.to_string() });
        }
        *entered += 1;
        let value = self.materialize_value(&self.nodes[id.0].value, limit, depth);
        if let Some(entered) = depth.get_mut(&id) {
            *entered -= 1;
        }
        value
    }

    fn materialize_value(
        &self,
        value: &GraphValue,
        limit: usize,
        depth: &mut HashMap<NodeId, usize>,
    ) -> serde_json::Value {
        match value {
            GraphValue::Scalar(scalar) => scalar.to_json(),
            GraphValue::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.materialize_value(item, limit, depth))
                    .collect(),
            ),
            GraphValue::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.materialize_value(v, limit, depth)))
                    .collect(),
            ),
            GraphValue::Ref(target) | GraphValue::Cycle(target) => {
                self.materialize_node(*target, limit, depth)
            }
            GraphValue::Unresolved { reference } => json!({ "$ref": reference }),
        }
    }
}

/// Mutable arena used while a walk is in progress
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    nodes: Vec<ResolvedNode>,
    index: HashMap<NodeKey, NodeId>,
    cycles: Vec<CycleDetected>,
}

impl GraphBuilder {
    pub(crate) fn lookup(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Register `key` before its content is known so back-edges can point at it
    pub(crate) fn reserve(&mut self, key: NodeKey) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(key.clone(), id);
        self.nodes.push(ResolvedNode {
            id,
            key,
            value: GraphValue::Scalar(Scalar::Null),
            cyclic: false,
        });
        id
    }

    pub(crate) fn fill(&mut self, id: NodeId, value: GraphValue) {
        self.nodes[id.0].value = value;
    }

    pub(crate) fn mark_cycle(&mut self, target: NodeId, location: Location) {
        self.nodes[target.0].cyclic = true;
        self.cycles.push(CycleDetected { target, location });
    }

    pub(crate) fn finish(self, root: NodeId) -> SchemaGraph {
        SchemaGraph {
            nodes: self.nodes,
            index: self.index,
            cycles: self.cycles,
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pointer: &[&str]) -> NodeKey {
        NodeKey::new(
            Url::parse("file:///s.yaml").unwrap(),
            JsonPointer::from_tokens(pointer.iter().copied()),
        )
    }

    /// root -> Node, where Node.children.items points back to Node
    fn recursive_graph() -> SchemaGraph {
        let mut builder = GraphBuilder::default();
        let root = builder.reserve(key(&[]));
        let node = builder.reserve(key(&["Node"]));
        builder.mark_cycle(
            node,
            Location {
                locator: Url::parse("file:///s.yaml").unwrap(),
                pointer: "/Node/children/items".to_string(),
            },
        );
        builder.fill(
            node,
            GraphValue::Object(BTreeMap::from([(
                "children".to_string(),
                GraphValue::Object(BTreeMap::from([("items".to_string(), GraphValue::Cycle(node))])),
            )])),
        );
        builder.fill(
            root,
            GraphValue::Object(BTreeMap::from([("tree".to_string(), GraphValue::Ref(node))])),
        );
        builder.finish(root)
    }

    #[test]
    fn test_node_key_display_roundtrip() {
        let k = key(&["paths", "/teapot"]);
        assert_eq!(k.to_string(), "file:///s.yaml#/paths/~1teapot");
        assert_eq!(NodeKey::parse(&k.to_string()), Some(k));
    }

    #[test]
    fn test_lookup_and_cyclic_flag() {
        let graph = recursive_graph();
        let node = graph.get_node(&key(&["Node"])).unwrap();
        assert!(graph.is_cyclic(node));
        assert_eq!(node.id.index(), 1);
        assert_eq!(graph.get_root().id.index(), 0);
        assert!(!graph.is_cyclic(graph.get_root()));
        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(graph.cycles()[0].target, node.id);
    }

    #[test]
    fn test_materialize_bounds_recursion() {
        let graph = recursive_graph();
        let value = graph.materialize(graph.get_root().id, 1);
        assert_eq!(
            value,
            json!({
                "tree": {
                    "children": {
                        "items": {
                            "children": {
                                "items": { "$ref": "file:///s.yaml#/Node" }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_follow_alias_chain() {
        let mut builder = GraphBuilder::default();
        let root = builder.reserve(key(&[]));
        let alias = builder.reserve(key(&["alias"]));
        let target = builder.reserve(key(&["target"]));
        builder.fill(target, GraphValue::Scalar(Scalar::String("x".into())));
        builder.fill(alias, GraphValue::Ref(target));
        builder.fill(root, GraphValue::Ref(alias));
        let graph = builder.finish(root);

        assert_eq!(graph.follow(root).id, target);
    }
}
