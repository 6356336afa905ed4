//! Resolution engine
//!
//! Depth-first walk over a root document. Every reference object is parsed,
//! canonicalized to a `(locator, pointer)` key and replaced by an edge to the
//! arena node for that key:
//!
//! - a key already on the active path becomes a [`GraphValue::Cycle`] back-edge
//!   and is not descended into again
//! - a key resolved earlier in the walk is shared, never re-resolved
//! - otherwise the target is loaded, resolved and walked with the key pushed
//!   on the path
//!
//! The active path is an explicit stack of frames, one per key being
//! resolved, so reference chains of any length are walked without growing the
//! call stack. Every key is entered at most once per walk. A failing reference
//! aborts only its own branch and is reported with the chain of references
//! that led to it.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{AggregateResolutionError, Location, ResolveError, TraceFrame};
use crate::graph::{GraphBuilder, GraphValue, NodeId, NodeKey, SchemaGraph};
use crate::loader::{directory_locator, file_locator, Document, DocumentLoader};
use crate::node::Node;
use crate::pointer;
use crate::reference::{JsonPointer, Reference};

/// Outcome of one walk: the graph plus every branch that failed
#[derive(Debug, Clone)]
pub struct Resolution {
    pub graph: SchemaGraph,
    pub failures: Vec<AggregateResolutionError>,
    /// Every document the walk visited, sorted
    pub documents: Vec<Url>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&AggregateResolutionError> {
        self.failures.first()
    }

    /// The graph if no branch failed, otherwise the first failure
    pub fn into_result(self) -> Result<SchemaGraph, AggregateResolutionError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(self.graph),
        }
    }
}

/// Builds [`SchemaGraph`]s from root documents.
///
/// The engine only borrows its loader's cache; several engines (or threads
/// sharing one engine) can resolve against the same loaded documents.
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    loader: Arc<DocumentLoader>,
    config: ResolverConfig,
}

impl ResolutionEngine {
    pub fn new(loader: Arc<DocumentLoader>, config: ResolverConfig) -> Self {
        Self { loader, config }
    }

    /// Engine over the local file system with a fresh cache
    pub fn file_system(config: ResolverConfig) -> Self {
        Self::new(Arc::new(DocumentLoader::file_system()), config)
    }

    pub fn loader(&self) -> &Arc<DocumentLoader> {
        &self.loader
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Canonical key a reference string denotes when found in the document at `base`
    pub fn canonical_key(&self, reference: &str, base: &Url) -> Result<NodeKey, ResolveError> {
        canonical_key(&self.loader, reference, base)
    }

    /// Resolve a root document on the file system
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> Result<Resolution, ResolveError> {
        let locator = file_locator(path)?;
        self.resolve_url(&locator)
    }

    /// Resolve the root document at a canonical locator
    pub fn resolve_url(&self, locator: &Url) -> Result<Resolution, ResolveError> {
        let root = self.loader.load(locator)?;
        Ok(self.walk(root))
    }

    /// Resolve an already parsed root whose relative references point into `base_dir`
    pub fn resolve_value(
        &self,
        root: Node,
        base_dir: impl AsRef<Path>,
    ) -> Result<Resolution, ResolveError> {
        let locator = directory_locator(base_dir)?;
        let locator = self
            .loader
            .canonicalize(&self.config.inline_root_name, &locator)?;
        Ok(self.walk(Arc::new(Document::new(locator, root))))
    }

    fn walk(&self, root: Arc<Document>) -> Resolution {
        let walk = Walk {
            loader: &self.loader,
            config: &self.config,
            root,
            builder: GraphBuilder::default(),
            stack: Vec::new(),
            active: HashSet::new(),
            trace: Vec::new(),
            failures: Vec::new(),
            documents: BTreeSet::new(),
        };
        walk.run()
    }
}

fn canonical_key(
    loader: &DocumentLoader,
    reference: &str,
    base: &Url,
) -> Result<NodeKey, ResolveError> {
    let parsed = Reference::parse(reference)?;
    let locator = match &parsed.locator {
        Some(locator) => loader.canonicalize(locator, base)?,
        None => base.clone(),
    };
    Ok(NodeKey::new(locator, parsed.pointer))
}

/// A reference object found while copying a node
#[derive(Debug, Clone)]
struct Edge {
    reference: String,
    site: JsonPointer,
}

/// A key on the active path whose references are being followed
struct Frame {
    id: NodeId,
    key: NodeKey,
    doc: Arc<Document>,
    /// The node's content with an `Unresolved` placeholder at every edge
    template: GraphValue,
    /// Edges in template order
    edges: Vec<Edge>,
    /// Values for the edges followed so far
    resolved: Vec<GraphValue>,
}

/// State of a single resolution walk
struct Walk<'a> {
    loader: &'a DocumentLoader,
    config: &'a ResolverConfig,
    root: Arc<Document>,
    builder: GraphBuilder,
    stack: Vec<Frame>,
    /// Keys on the current path
    active: HashSet<NodeKey>,
    /// References followed to reach the current position
    trace: Vec<TraceFrame>,
    failures: Vec<AggregateResolutionError>,
    documents: BTreeSet<Url>,
}

impl Walk<'_> {
    fn run(mut self) -> Resolution {
        let root = Arc::clone(&self.root);
        let key = NodeKey::new(root.locator.clone(), JsonPointer::root());
        self.documents.insert(root.locator.clone());
        let root_id = self.enter(key, Arc::clone(&root), &root.root, None);

        while let Some(frame) = self.stack.last() {
            let Some(edge) = frame.edges.get(frame.resolved.len()).cloned() else {
                self.exit();
                continue;
            };
            let doc = Arc::clone(&frame.doc);
            if let Some(value) = self.follow(&doc, edge) {
                self.push_resolved(value);
            }
        }

        let graph = self.builder.finish(root_id);
        info!(
            root = %root.locator,
            documents = self.documents.len(),
            nodes = graph.len(),
            cycles = graph.cycles().len(),
            failures = self.failures.len(),
            "Resolved schema graph"
        );

        Resolution {
            graph,
            failures: self.failures,
            documents: self.documents.into_iter().collect(),
        }
    }

    /// Register `key`, copy its node and push it on the active path
    fn enter(
        &mut self,
        key: NodeKey,
        doc: Arc<Document>,
        node: &Node,
        via: Option<TraceFrame>,
    ) -> NodeId {
        let id = self.builder.reserve(key.clone());
        let mut edges = Vec::new();
        let mut site = key.pointer.clone();
        let template = self.copy_node(node, &mut site, &mut edges);

        self.active.insert(key.clone());
        if let Some(frame) = via {
            self.trace.push(frame);
        }
        self.stack.push(Frame {
            id,
            key,
            doc,
            template,
            edges,
            resolved: Vec::new(),
        });
        id
    }

    /// Pop the finished top frame and hand its edge to the parent
    fn exit(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Frame {
            id,
            key,
            mut template,
            resolved,
            ..
        } = frame;
        fill_edges(&mut template, &mut resolved.into_iter());
        self.builder.fill(id, template);
        self.active.remove(&key);
        // The root frame is the only one entered without a trace frame
        if !self.stack.is_empty() {
            self.trace.pop();
        }
        self.push_resolved(GraphValue::Ref(id));
    }

    fn push_resolved(&mut self, value: GraphValue) {
        if let Some(parent) = self.stack.last_mut() {
            parent.resolved.push(value);
        }
    }

    /// Copy plain content, leaving a placeholder for every reference object
    fn copy_node(&self, node: &Node, site: &mut JsonPointer, edges: &mut Vec<Edge>) -> GraphValue {
        if let Some(reference) = node.as_reference(&self.config.ref_keyword) {
            edges.push(Edge {
                reference: reference.to_string(),
                site: site.clone(),
            });
            return GraphValue::Unresolved {
                reference: reference.to_string(),
            };
        }

        match node {
            Node::Object(map) => GraphValue::Object(
                map.iter()
                    .map(|(key, child)| {
                        site.push(key.clone());
                        let value = self.copy_node(child, site, edges);
                        site.pop();
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            Node::Array(items) => GraphValue::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        site.push(index.to_string());
                        let value = self.copy_node(child, site, edges);
                        site.pop();
                        value
                    })
                    .collect(),
            ),
            Node::Scalar(scalar) => GraphValue::Scalar(scalar.clone()),
        }
    }

    /// Resolve one edge. `None` means a frame was pushed for its target and the
    /// value arrives when that frame exits.
    fn follow(&mut self, doc: &Arc<Document>, edge: Edge) -> Option<GraphValue> {
        let Edge { reference, site } = edge;
        let location = Location {
            locator: doc.locator.clone(),
            pointer: site.to_string(),
        };

        if self.config.fail_fast && !self.failures.is_empty() {
            return Some(GraphValue::Unresolved { reference });
        }

        let key = match canonical_key(self.loader, &reference, &doc.locator) {
            Ok(key) => key,
            Err(e) => return Some(self.fail(reference, location, e)),
        };

        if let Some(id) = self.builder.lookup(&key) {
            if self.active.contains(&key) {
                debug!(%key, at = %location, "Reference re-enters a node on the active path");
                self.builder.mark_cycle(id, location);
                return Some(GraphValue::Cycle(id));
            }
            debug!(%key, at = %location, "Sharing resolved node");
            return Some(GraphValue::Ref(id));
        }

        let target_doc = match self.load(&key.locator) {
            Ok(doc) => doc,
            Err(e) => return Some(self.fail(reference, location, e)),
        };
        let target = match pointer::resolve(&target_doc, &key.pointer) {
            Ok(node) => node,
            Err(e) => return Some(self.fail(reference, location, e.into())),
        };

        let via = TraceFrame {
            reference,
            location,
        };
        self.enter(key, Arc::clone(&target_doc), target, Some(via));
        None
    }

    fn load(&mut self, locator: &Url) -> Result<Arc<Document>, ResolveError> {
        let doc = if *locator == self.root.locator {
            Arc::clone(&self.root)
        } else {
            self.loader.load(locator)?
        };
        self.documents.insert(locator.clone());
        Ok(doc)
    }

    fn fail(&mut self, reference: String, location: Location, cause: ResolveError) -> GraphValue {
        let error = AggregateResolutionError {
            reference: reference.clone(),
            location,
            trace: self.trace.clone(),
            cause,
        };
        warn!("Aborted branch: {}", error);
        self.failures.push(error);
        GraphValue::Unresolved { reference }
    }
}

/// Replace placeholders with resolved edges, in the order they were copied
fn fill_edges(value: &mut GraphValue, resolved: &mut impl Iterator<Item = GraphValue>) {
    match value {
        GraphValue::Unresolved { .. } => {
            if let Some(edge) = resolved.next() {
                *value = edge;
            }
        }
        GraphValue::Object(map) => {
            for child in map.values_mut() {
                fill_edges(child, resolved);
            }
        }
        GraphValue::Array(items) => {
            for item in items {
                fill_edges(item, resolved);
            }
        }
        GraphValue::Scalar(_) | GraphValue::Ref(_) | GraphValue::Cycle(_) => {}
    }
}
