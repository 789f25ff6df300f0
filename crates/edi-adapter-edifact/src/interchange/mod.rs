//! Control-block dispatcher for interchanges
//!
//! The parser peeks at the three character code of every segment. Codes
//! known to the [`ControlBlockHandlerFactory`] are dispatched to their
//! handler; inside a message every other segment is body data. Open
//! envelopes live on an explicit scope stack in the
//! [`InterchangeContext`], so cancellation and depth limits apply at
//! every segment boundary.

pub mod context;
pub mod handlers;

pub use context::{InterchangeContext, MessageMode, Scope, ScopeKind};
pub use handlers::{ControlBlockHandler, ControlBlockHandlerFactory, UnEdifact41HandlerFactory};

use crate::config::ReaderConfig;
use crate::emitter::Emitter;
use crate::mapper::Output;
use crate::reader::BufferedSegmentReader;
use crate::report::{ParseReport, ParseStatus};
use crate::Result;
use edi_ir::ContentHandler;
use edi_schema::MappingsRegistry;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Length of a segment code
const SEGMENT_CODE_LENGTH: usize = 3;

/// Cooperative cancellation flag shared with a running parse
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Ask the parser to stop at the next segment boundary.
    ///
    /// The request is consumed by the parse it stops; a request made
    /// before `parse` is called stops that parse at its first segment.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the parser can be reused
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Parses interchanges into structural events.
///
/// A parser is configured once and may run any number of parses; each
/// `parse` call owns its session state.
pub struct InterchangeParser {
    registry: Arc<dyn MappingsRegistry>,
    config: ReaderConfig,
    factory: Arc<dyn ControlBlockHandlerFactory>,
    abort: AbortHandle,
}

impl InterchangeParser {
    /// Parser with the default configuration and UN/EDIFACT 4.1 handlers
    pub fn new(registry: Arc<dyn MappingsRegistry>) -> Result<Self> {
        Ok(Self {
            registry,
            config: ReaderConfig::default(),
            factory: Arc::new(UnEdifact41HandlerFactory::new()?),
            abort: AbortHandle::default(),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the control block handlers, e.g. for another EDI standard
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn ControlBlockHandlerFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Handle for cancelling a parse from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Parse every interchange in `input`, sending events to `handler`.
    ///
    /// Recoverable problems are collected in the returned report; the first
    /// fatal one ends the parse with an error.
    pub fn parse<R: BufRead>(
        &self,
        input: R,
        handler: &mut dyn ContentHandler,
    ) -> Result<ParseReport> {
        let reader = BufferedSegmentReader::new(input, self.config.delimiters)
            .ignore_newlines(self.config.ignore_newlines);
        let out = Output::new(Emitter::new(handler, self.config.indent));
        let mut ctx = InterchangeContext::new(
            reader,
            out,
            self.registry.as_ref(),
            &self.config,
            self.factory.envelope(),
        );

        ctx.out.emitter.start_document()?;
        ctx.open_root()?;

        let status = self.dispatch(&mut ctx)?;
        if status == ParseStatus::Aborted {
            info!(segment = ctx.reader.segment_number(), "Parse aborted");
            self.abort.reset();
            ctx.out.emitter.close_to(0)?;
        } else {
            if let Some(scope) = ctx.scope() {
                let message = format!("End of input inside an open {}", scope.name());
                return Err(ctx.structure_error("", message));
            }
            ctx.out.emitter.end_element()?;
        }
        ctx.out.emitter.end_document()?;

        let segment_count = ctx.reader.segment_number();
        debug!(segments = segment_count, issues = ctx.out.diagnostics.len(), "Parse finished");
        Ok(ParseReport {
            status,
            diagnostics: ctx.out.diagnostics,
            interchanges: ctx.interchanges,
            segment_count,
        })
    }

    fn dispatch(&self, ctx: &mut InterchangeContext<'_>) -> Result<ParseStatus> {
        loop {
            if self.abort.is_aborted() {
                return Ok(ParseStatus::Aborted);
            }

            let code = ctx.reader.peek(SEGMENT_CODE_LENGTH, true)?.to_string();
            if code.is_empty() {
                return Ok(ParseStatus::Completed);
            }
            if code.chars().count() < SEGMENT_CODE_LENGTH {
                return Err(ctx.structure_error(&code, "Truncated segment at end of input"));
            }

            match self.factory.handler(&code) {
                Some(handler) => handler.process(ctx)?,
                None if ctx.in_message() => ctx.body_segment()?,
                None => {
                    return Err(ctx.structure_error(
                        &code,
                        format!("Unknown or out-of-place segment '{code}'"),
                    ));
                }
            }
        }
    }
}
