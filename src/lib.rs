//! refgraph: `$ref` resolution for multi-document schemas
//!
//! Turns a root document whose `$ref`s point at local pointers, sibling files
//! in other directories, and back into themselves, into one addressable,
//! cycle-safe [`SchemaGraph`]:
//! - Reference parsing (`<locator>#<json-pointer>`)
//! - Document loading with a per-session, single-flight cache
//! - JSON pointer navigation with exact missing-token errors
//! - Depth-first resolution with node sharing and explicit back-edges
//!
//! ```no_run
//! use refgraph::{ResolutionEngine, ResolverConfig};
//!
//! let engine = ResolutionEngine::file_system(ResolverConfig::default());
//! let graph = engine.resolve_path("schema/root.yaml")?.into_result()?;
//! for cycle in graph.cycles() {
//!     println!("{} re-enters {}", cycle.location, graph.node(cycle.target).key);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod node;
pub mod pointer;
pub mod reference;

// Re-export commonly used types
pub use config::ResolverConfig;
pub use engine::{Resolution, ResolutionEngine};
pub use error::{
    AggregateResolutionError, LoadError, Location, ParseError, PointerError, ResolveError,
    TraceFrame,
};
pub use graph::{CycleDetected, GraphValue, NodeId, NodeKey, ResolvedNode, SchemaGraph};
pub use loader::{
    file_locator, Document, DocumentCache, DocumentLoader, DocumentSource, FileSystemSource,
    InMemorySource,
};
pub use node::{Node, Scalar};
pub use reference::{JsonPointer, Reference};
