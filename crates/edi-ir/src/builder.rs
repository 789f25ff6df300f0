//! Content handler that materializes events into a [`Node`] tree

use crate::event::{Attribute, ContentHandler, QName};
use crate::node::Node;
use crate::{Error, Result};
use tracing::trace;

/// Builds a [`Node`] tree and checks that events are balanced.
///
/// Whitespace-only character events are dropped, so indentation emitted
/// for pretty output does not end up in element text.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<Node>,
    root: Option<Node>,
    started: bool,
    ended: bool,
    events: usize,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events received
    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Number of elements currently open
    pub fn open_elements(&self) -> usize {
        self.stack.len()
    }

    /// The finished tree.
    ///
    /// Fails when the document was not ended or elements are still open.
    pub fn finish(self) -> Result<Node> {
        if !self.stack.is_empty() {
            return Err(Error::IncompleteDocument {
                open: self.stack.len(),
            });
        }
        if !self.ended {
            return Err(Error::IncompleteDocument { open: 0 });
        }
        let root = self.root.ok_or(Error::EmptyDocument)?;
        trace!(
            elements = root.element_count(),
            events = self.events,
            "Built event tree"
        );
        Ok(root)
    }
}

impl ContentHandler for TreeBuilder {
    fn start_document(&mut self) -> Result<()> {
        self.events += 1;
        if self.started {
            return Err(Error::InvalidEvent("document started twice".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()> {
        self.events += 1;
        if !self.started || self.ended {
            return Err(Error::InvalidEvent(format!(
                "element {name} outside of document"
            )));
        }
        if self.stack.is_empty() && self.root.is_some() {
            return Err(Error::InvalidEvent(format!("second root element {name}")));
        }

        let mut node = Node::new(name.qualified_name());
        node.local_name.clone_from(&name.local_name);
        node.namespace.clone_from(&name.namespace);
        for attr in attributes {
            node.set_attribute(attr.name.clone(), attr.value.clone());
        }
        self.stack.push(node);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.events += 1;
        if text.trim().is_empty() {
            return Ok(());
        }
        match self.stack.last_mut() {
            Some(node) => {
                node.text.push_str(text);
                Ok(())
            }
            None => Err(Error::InvalidEvent("text outside of any element".to_string())),
        }
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.events += 1;
        let node = self.stack.pop().ok_or(Error::NoOpenElement)?;
        if node.name != name.qualified_name() {
            return Err(Error::Unbalanced {
                expected: node.name,
                found: name.qualified_name(),
            });
        }
        match self.stack.last_mut() {
            Some(parent) => {
                parent.add_child(node);
            }
            None => self.root = Some(node),
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events += 1;
        if !self.stack.is_empty() {
            return Err(Error::IncompleteDocument {
                open: self.stack.len(),
            });
        }
        self.ended = true;
        Ok(())
    }
}
