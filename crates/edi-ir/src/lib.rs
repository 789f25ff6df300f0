#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-ir
//!
//! Structural event model for EDI readers.
//!
//! Readers report documents as a forward-only stream of start element,
//! character and end element events through the [`ContentHandler`] trait.
//! This crate provides that trait plus the pieces around it: qualified
//! names, a namespace declaration stack, a tree builder that materializes
//! events into [`Node`]s, and an XML writer.

/// Content handler that materializes events into a tree.
pub mod builder;
/// Event vocabulary and the content handler trait.
pub mod event;
/// Namespace declaration bookkeeping for element scopes.
pub mod namespace;
/// Element tree with path navigation.
pub mod node;
/// Content handler that writes XML text.
pub mod writer;

pub use builder::TreeBuilder;
pub use event::{Attribute, ContentHandler, QName};
pub use namespace::{NamespaceDeclaration, NamespaceDeclarationStack};
pub use node::Node;
pub use writer::XmlWriter;

use thiserror::Error;

/// Errors raised by content handlers and tree navigation
#[derive(Error, Debug)]
pub enum Error {
    #[error("Node not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unbalanced events: expected end of {expected}, found end of {found}")]
    Unbalanced { expected: String, found: String },

    #[error("End element received with no open element")]
    NoOpenElement,

    #[error("Document incomplete: {open} elements still open")]
    IncompleteDocument { open: usize },

    #[error("Document has no root element")]
    EmptyDocument,

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Namespace stack underflow")]
    NamespaceUnderflow,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }

    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for event handling.
pub type Result<T> = std::result::Result<T, Error>;
