//! Namespace declaration stack

use crate::{Error, Result};

/// Prefix to URI binding declared on one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// `None` binds the default namespace
    pub prefix: Option<String>,
    pub uri: String,
}

impl NamespaceDeclaration {
    pub fn new(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }
    }
}

/// Namespace declarations in scope, one frame per open element.
///
/// Callers push a (possibly empty) frame for every element they open and
/// pop it when the element closes, so lookups see exactly the bindings of
/// the enclosing elements.
#[derive(Debug, Default)]
pub struct NamespaceDeclarationStack {
    frames: Vec<Vec<NamespaceDeclaration>>,
}

impl NamespaceDeclarationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, declarations: Vec<NamespaceDeclaration>) {
        self.frames.push(declarations);
    }

    pub fn pop(&mut self) -> Result<Vec<NamespaceDeclaration>> {
        self.frames.pop().ok_or(Error::NamespaceUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Prefix bound to `uri` by the innermost declaring element.
    ///
    /// `Some(None)` means `uri` is the default namespace.
    pub fn prefix_for(&self, uri: &str) -> Option<Option<&str>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|d| d.uri == uri)
            .map(|d| d.prefix.as_deref())
    }

    /// URI bound to `prefix` by the innermost declaring element
    pub fn uri_for(&self, prefix: Option<&str>) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
    }
}
