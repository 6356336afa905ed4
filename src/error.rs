//! Error types for reference resolution
//!
//! Parse, load and pointer failures are hard errors for the branch that hit
//! them. The engine wraps the first failure of each branch into an
//! [`AggregateResolutionError`] together with the chain of references that
//! led there. Cycles are not errors; see [`crate::graph::CycleDetected`].

use std::fmt;

use thiserror::Error;
use url::Url;

/// Malformed reference or pointer syntax
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("reference '{reference}' has no '#' fragment marker")]
    MissingFragment { reference: String },

    #[error("reference '{reference}' has a fragment that is not a JSON pointer")]
    NotAPointer { reference: String },

    #[error("invalid escape sequence '{sequence}' in reference '{reference}'")]
    InvalidEscape { reference: String, sequence: String },

    #[error("invalid document locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },
}

/// Document unreadable or its content unparsable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to load document '{locator}': {reason}")]
pub struct LoadError {
    pub locator: String,
    pub reason: String,
}

impl LoadError {
    pub fn new(locator: &Url, reason: impl fmt::Display) -> Self {
        Self {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A pointer token has no match in the target document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pointer '{pointer}' not found in '{locator}': no match for token '{missing_token}'")]
pub struct PointerError {
    pub locator: Url,
    pub pointer: String,
    pub missing_token: String,
}

/// Any failure that aborts one resolution branch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Pointer(#[from] PointerError),
}

/// Where a reference string was found: a document and the pointer to the
/// reference object inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub locator: Url,
    pub pointer: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.locator, self.pointer)
    }
}

/// One followed reference on the way to a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub reference: String,
    pub location: Location,
}

/// A branch failure together with its reference trace
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unresolvable reference '{reference}' at {location}: {cause}{}", render_trace(.trace))]
pub struct AggregateResolutionError {
    /// The reference string that could not be resolved
    pub reference: String,
    /// Where that reference string appears
    pub location: Location,
    /// References followed from the root to reach `location`, outermost first
    pub trace: Vec<TraceFrame>,
    #[source]
    pub cause: ResolveError,
}

/// One `via` line per followed reference, innermost first
fn render_trace(trace: &[TraceFrame]) -> String {
    trace
        .iter()
        .rev()
        .map(|frame| format!("\n  via '{}' at {}", frame.reference, frame.location))
        .collect()
}
