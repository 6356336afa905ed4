//! Document loading
//!
//! Documents are identified by canonical `Url`s. The [`DocumentLoader`]
//! canonicalizes locators against the containing document, fetches through an
//! injectable [`DocumentSource`] and caches the result in a [`DocumentCache`].
//!
//! The cache is single-flight: the first caller for a locator performs the
//! fetch, concurrent callers for the same locator block until it completes and
//! then share the result. Failed loads are cached as well.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};
use url::Url;

use crate::error::{LoadError, ParseError};
use crate::node::Node;

/// A loaded document. Immutable; identity is its locator.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub locator: Url,
    pub root: Node,
}

impl Document {
    pub fn new(locator: Url, root: Node) -> Self {
        Self { locator, root }
    }
}

/// Where document content comes from
pub trait DocumentSource: Send + Sync {
    /// Read and parse the document at `locator`
    fn fetch(&self, locator: &Url) -> Result<Node>;
}

/// Parse document text, choosing the format from the locator's extension
pub fn parse_document(locator: &Url, text: &str) -> Result<Node> {
    if locator.path().ends_with(".json") {
        Node::from_json_str(text)
    } else {
        Node::from_yaml_str(text)
    }
}

/// Reads `file://` documents from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemSource;

impl DocumentSource for FileSystemSource {
    fn fetch(&self, locator: &Url) -> Result<Node> {
        if locator.scheme() != "file" {
            bail!("unsupported scheme '{}'", locator.scheme());
        }
        let path = locator
            .to_file_path()
            .map_err(|_| anyhow!("not a local file path"))?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_document(locator, &text)
    }
}

/// Documents registered up front, keyed by locator
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    documents: HashMap<Url, Node>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locator: Url, root: Node) -> &mut Self {
        self.documents.insert(locator, root);
        self
    }

    /// Register raw text, parsed immediately
    pub fn insert_text(&mut self, locator: Url, text: &str) -> Result<&mut Self> {
        let root = parse_document(&locator, text)
            .with_context(|| format!("Failed to parse {}", locator))?;
        Ok(self.insert(locator, root))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentSource for InMemorySource {
    fn fetch(&self, locator: &Url) -> Result<Node> {
        self.documents
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("no such document"))
    }
}

type Slot = Arc<OnceLock<Result<Arc<Document>, LoadError>>>;

/// Per-session document cache keyed by canonical locator
#[derive(Debug, Default)]
pub struct DocumentCache {
    slots: RwLock<HashMap<Url, Slot>>,
    fetches: AtomicUsize,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of underlying fetches performed so far
    pub fn load_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of distinct locators with a cache entry
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successfully loaded documents, in no particular order
    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|slot| slot.get().and_then(|r| r.as_ref().ok()).cloned())
            .collect()
    }

    fn slot(&self, locator: &Url) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(locator.clone()).or_default())
    }

    fn get_or_load(
        &self,
        locator: &Url,
        fetch: impl FnOnce() -> Result<Node>,
    ) -> Result<Arc<Document>, LoadError> {
        let slot = self.slot(locator);
        if let Some(loaded) = slot.get() {
            debug!(%locator, "Document cache hit");
            return loaded.clone();
        }
        slot.get_or_init(|| {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match fetch() {
                Ok(root) => {
                    info!(%locator, "Loaded document");
                    Ok(Arc::new(Document::new(locator.clone(), root)))
                }
                Err(e) => Err(LoadError::new(locator, format!("{:#}", e))),
            }
        })
        .clone()
    }

    /// Register an already parsed document. An existing entry wins.
    fn insert(&self, document: Document) -> Arc<Document> {
        let slot = self.slot(&document.locator);
        let document = Arc::new(document);
        match slot.get_or_init(|| Ok(Arc::clone(&document))) {
            Ok(stored) => Arc::clone(stored),
            Err(_) => document,
        }
    }
}

/// Canonicalizes locators and loads documents through a shared cache
pub struct DocumentLoader {
    source: Arc<dyn DocumentSource>,
    cache: DocumentCache,
}

impl DocumentLoader {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            source,
            cache: DocumentCache::new(),
        }
    }

    /// Loader reading from the local file system
    pub fn file_system() -> Self {
        Self::new(Arc::new(FileSystemSource))
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Resolve `locator` against the locator of the referencing document.
    ///
    /// The result never carries a fragment.
    pub fn canonicalize(&self, locator: &str, base: &Url) -> Result<Url, ParseError> {
        let mut url = base.join(locator).map_err(|e| ParseError::InvalidLocator {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        url.set_fragment(None);
        Ok(url)
    }

    /// Load the document at a canonical locator
    pub fn load(&self, locator: &Url) -> Result<Arc<Document>, LoadError> {
        self.cache
            .get_or_load(locator, || self.source.fetch(locator))
    }

    /// Canonicalize `locator` relative to `base` and load it
    pub fn load_relative(&self, locator: &str, base: &Url) -> Result<Arc<Document>, LoadError> {
        let url = self
            .canonicalize(locator, base)
            .map_err(|e| LoadError {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        self.load(&url)
    }

    /// Make an in-memory tree addressable under `locator`
    pub fn preload(&self, locator: Url, root: Node) -> Arc<Document> {
        self.cache.insert(Document::new(locator, root))
    }
}

impl std::fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Convert a file system path to a canonical `file://` locator.
///
/// Relative paths are made absolute against the current directory once,
/// here; everything below the root is resolved against document locators.
pub fn file_locator(path: impl AsRef<Path>) -> Result<Url, ParseError> {
    let path = absolute_path(path.as_ref())?;
    Url::from_file_path(&path).map_err(|_| ParseError::InvalidLocator {
        locator: path.display().to_string(),
        reason: "not an absolute path".to_string(),
    })
}

/// Locator of a directory, with the trailing slash `Url::join` needs
pub fn directory_locator(path: impl AsRef<Path>) -> Result<Url, ParseError> {
    let path = absolute_path(path.as_ref())?;
    Url::from_directory_path(&path).map_err(|_| ParseError::InvalidLocator {
        locator: path.display().to_string(),
        reason: "not an absolute path".to_string(),
    })
}

/// Absolute, with `.` and `..` removed lexically
fn absolute_path(path: &Path) -> Result<PathBuf, ParseError> {
    let absolute = std::path::absolute(path).map_err(|e| ParseError::InvalidLocator {
        locator: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
