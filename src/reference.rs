//! Reference parsing
//!
//! Splits `<locator>#<pointer>` strings and unescapes JSON pointer tokens.

use std::fmt;

use crate::error::ParseError;

/// An unescaped JSON pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    /// The empty pointer, addressing a whole document
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Parse an escaped pointer such as `/components/schemas/Node`.
    ///
    /// `reference` is only used for error messages.
    pub fn parse(escaped: &str, reference: &str) -> Result<Self, ParseError> {
        if escaped.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = escaped.strip_prefix('/') else {
            return Err(ParseError::NotAPointer {
                reference: reference.to_string(),
            });
        };
        rest.split('/')
            .map(|token| unescape(token, reference))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

fn unescape(token: &str, reference: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                return Err(ParseError::InvalidEscape {
                    reference: reference.to_string(),
                    sequence: other.map_or_else(|| "~".to_string(), |c| format!("~{c}")),
                })
            }
        }
    }
    Ok(out)
}

/// A parsed `$ref` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Document part, `None` for same-document references
    pub locator: Option<String>,
    pub pointer: JsonPointer,
}

impl Reference {
    /// Parse `path/to/doc.yaml#/Pointer` or `#/Pointer`
    pub fn parse(reference: &str) -> Result<Self, ParseError> {
        let Some((locator, fragment)) = reference.split_once('#') else {
            return Err(ParseError::MissingFragment {
                reference: reference.to_string(),
            });
        };
        let pointer = JsonPointer::parse(fragment, reference)?;
        let locator = (!locator.is_empty()).then(|| locator.to_string());
        Ok(Self { locator, pointer })
    }

    pub fn is_local(&self) -> bool {
        self.locator.is_none()
    }
}
