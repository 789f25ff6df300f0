//! # edi-adapter-edifact
//!
//! Streaming UN/EDIFACT reader.
//!
//! The reader turns an interchange into a stream of structural events on
//! an [`edi_ir::ContentHandler`]. Service segments (UNA, UNB/UNZ,
//! UNG/UNE, UNH/UNT) are handled by pluggable control block handlers;
//! message bodies are decoded against mapping models looked up in an
//! [`edi_schema::MappingsRegistry`] by the message identifier in UNH.
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_adapter_edifact::InterchangeParser;
//! use edi_ir::TreeBuilder;
//! use edi_schema::StaticMappingsRegistry;
//! use std::sync::Arc;
//!
//! let input = "UNB+UNOC:3+SENDER+RECEIVER+240101:1200+1'\
//!              UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+3+1'\
//!              UNZ+1+1'";
//! let parser = InterchangeParser::new(Arc::new(StaticMappingsRegistry::new())).unwrap();
//! let mut tree = TreeBuilder::new();
//! let report = parser.parse(input.as_bytes(), &mut tree).unwrap();
//! assert_eq!(report.messages().count(), 1);
//! ```

pub mod config;
pub mod emitter;
pub mod envelopes;
pub mod interchange;
pub mod mapper;
pub mod message;
pub mod reader;
pub mod report;
pub mod syntax;
pub mod tokenizer;

pub use config::ReaderConfig;
pub use emitter::Emitter;
pub use interchange::{
    AbortHandle, ControlBlockHandler, ControlBlockHandlerFactory, InterchangeContext,
    InterchangeParser, UnEdifact41HandlerFactory,
};
pub use message::MessageParser;
pub use reader::BufferedSegmentReader;
pub use report::{GroupSummary, InterchangeSummary, MessageSummary, ParseReport, ParseStatus};

use edi_ir::ContentHandler;
use edi_schema::MappingsRegistry;
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;

/// Errors that end a parse
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope or segment structure is broken
    #[error("Structure error at segment {segment_number} ({segment_code}), offset {offset}: {message}")]
    Structure {
        segment_code: String,
        segment_number: usize,
        offset: u64,
        message: String,
    },

    /// The body does not fit the mapping model
    #[error("Mapping error at segment {segment_number} ({segment_code}): {message}")]
    Mapping {
        segment_code: String,
        segment_number: usize,
        message: String,
    },

    /// Field value rejected in strict mode
    #[error("Validation error at {path}: {message}")]
    Validation { path: String, message: String },

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] edi_schema::Error),

    #[error(transparent)]
    Content(#[from] edi_ir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse `input` with the default UN/EDIFACT 4.1 handlers
pub fn parse<R: BufRead>(
    input: R,
    registry: Arc<dyn MappingsRegistry>,
    config: ReaderConfig,
    handler: &mut dyn ContentHandler,
) -> Result<ParseReport> {
    InterchangeParser::new(registry)?
        .with_config(config)
        .parse(input, handler)
}
