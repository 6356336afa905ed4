//! JSON pointer navigation over loaded documents

use crate::error::PointerError;
use crate::loader::Document;
use crate::node::Node;
use crate::reference::JsonPointer;

/// Walk `pointer` through `document`, failing on the first token without a match
pub fn resolve<'d>(document: &'d Document, pointer: &JsonPointer) -> Result<&'d Node, PointerError> {
    let mut current = &document.root;
    for token in pointer.tokens() {
        let next = match current {
            Node::Object(map) => map.get(token),
            Node::Array(items) => array_index(token).and_then(|index| items.get(index)),
            Node::Scalar(_) => None,
        };
        current = next.ok_or_else(|| PointerError {
            locator: document.locator.clone(),
            pointer: pointer.to_string(),
            missing_token: token.clone(),
        })?;
    }
    Ok(current)
}

/// RFC 6901 array index: `0` or a decimal without leading zeros
fn array_index(token: &str) -> Option<usize> {
    let digits = token.bytes().all(|b| b.is_ascii_digit());
    if token.is_empty() || !digits || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    token.parse().ok()
}
