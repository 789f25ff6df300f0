//! Element tree built from structural events

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An element in a materialized event tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Qualified name as emitted (e.g. `env:UNB`)
    pub name: String,

    /// Name without prefix
    pub local_name: String,

    /// Namespace URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Concatenated character content
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a node without namespace
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            local_name: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Find the first child by local name
    pub fn find_child(&self, local_name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    /// Find all children by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Node> {
        self.children
            .iter()
            .filter(|c| c.local_name == local_name)
            .collect()
    }

    /// Total number of elements in this subtree, including this one
    pub fn element_count(&self) -> usize {
        1 + self.children.iter().map(Node::element_count).sum::<usize>()
    }

    /// Navigate by local names, e.g. `interchange/interchangeMessage[1]/UNH`.
    ///
    /// An `[n]` suffix selects the n-th (zero based) child of that name.
    pub fn navigate(&self, path: &str) -> Result<&Node> {
        let mut current = self;
        let mut walked: Vec<&str> = Vec::new();

        for step in path.split('/') {
            if step.is_empty() {
                continue;
            }

            let (name, index) = match step.find('[') {
                Some(open) => {
                    let close = step
                        .find(']')
                        .ok_or_else(|| Error::invalid_path(path, format!("unclosed bracket in {step}")))?;
                    let index: usize = step[open + 1..close]
                        .parse()
                        .map_err(|_| Error::invalid_path(path, format!("invalid index in {step}")))?;
                    (&step[..open], index)
                }
                None => (step, 0),
            };

            walked.push(step);
            current = current
                .children
                .iter()
                .filter(|c| c.local_name == name)
                .nth(index)
                .ok_or_else(|| Error::node_not_found(walked.join("/")))?;
        }

        Ok(current)
    }

    /// Text of the element reached by `path`
    pub fn text_at(&self, path: &str) -> Result<&str> {
        self.navigate(path).map(|n| n.text.as_str())
    }
}
