//! Structural event model
//!
//! Parsers report documents as a forward-only sequence of events, in the
//! manner of a SAX content handler.

use crate::Result;
use std::fmt;

/// Qualified element name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, if the element is namespaced
    pub namespace: Option<String>,
    /// Prefix bound to the namespace at the point of emission
    pub prefix: Option<String>,
    pub local_name: String,
}

impl QName {
    /// An element name without namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local_name: local_name.into(),
        }
    }

    /// An element name in a namespace; the prefix is resolved on emission
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            prefix: None,
            local_name: local_name.into(),
        }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// `prefix:local` or just `local` without a prefix
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) if !p.is_empty() => format!("{p}:{}", self.local_name),
            _ => self.local_name.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Element attribute, named by its qualified name (e.g. `xmlns:env`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Namespace declaration attribute for `prefix` (default namespace when `None`)
    pub fn namespace_declaration(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        let name = match prefix {
            Some(p) if !p.is_empty() => format!("xmlns:{p}"),
            _ => "xmlns".to_string(),
        };
        Self::new(name, uri)
    }
}

/// Receiver of structural events, in strict document order.
///
/// Producers never re-enter an element that has been closed, and every
/// `start_element` is matched by an `end_element` with the same name.
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<()>;

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()>;

    fn characters(&mut self, text: &str) -> Result<()>;

    fn end_element(&mut self, name: &QName) -> Result<()>;

    fn end_document(&mut self) -> Result<()>;
}

impl<H: ContentHandler + ?Sized> ContentHandler for &mut H {
    fn start_document(&mut self) -> Result<()> {
        (**self).start_document()
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()> {
        (**self).start_element(name, attributes)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        (**self).characters(text)
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        (**self).end_element(name)
    }

    fn end_document(&mut self) -> Result<()> {
        (**self).end_document()
    }
}
