//! # edi-schema
//!
//! Delimiter model and mapping models for EDI message parsing.
//!
//! A mapping model ([`Edimap`]) describes how the segments of one message
//! type map to structural output: segment groups, segments, fields,
//! components and sub-components, with occurrence bounds and value
//! constraints. Models are loaded from JSON or YAML, may import segments
//! from other models, and are served to parsers through a
//! [`MappingsRegistry`].

pub mod delimiters;
pub mod edimap;
pub mod imports;
pub mod loader;
pub mod model;
pub mod registry;

pub use delimiters::{DelimiterStack, DelimiterType, Delimiters, DelimitersBuilder};
pub use edimap::{
    ComponentNode, Edimap, FieldNode, GroupNode, MappingNode, NodeId, NodeKind, SegmentNode,
    ValueNode,
};
pub use loader::{EdimapLoader, MODEL_LIST_FILE};
pub use model::{
    ComponentDef, DataType, Description, EdimapDef, FieldDef, ImportDef, MaxOccurs, SegmentDef,
    SegmentGroupDef, SegmentItem, SubComponentDef, ValueDef,
};
pub use registry::{LazyMappingsRegistry, MappingsRegistry, StaticMappingsRegistry};

use thiserror::Error;

/// Errors that can occur when working with delimiters and mapping models
#[derive(Error, Debug)]
pub enum Error {
    #[error("Mapping model not found: {0}")]
    NotFound(String),

    #[error("Invalid mapping model format: {0}")]
    InvalidFormat(String),

    #[error("Invalid mapping model: {0}")]
    InvalidModel(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid delimiters: {0}")]
    Delimiters(String),

    #[error("Delimiter stack underflow: no pushed delimiters to pop")]
    DelimiterUnderflow,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
