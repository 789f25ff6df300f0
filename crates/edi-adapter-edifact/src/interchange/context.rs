//! Per-interchange parsing session

use crate::config::ReaderConfig;
use crate::envelopes::{ENVELOPE_NAMESPACE, ENVELOPE_PREFIX};
use crate::mapper::{FieldMapper, MessageMapper, Output, SegmentLocation};
use crate::reader::BufferedSegmentReader;
use crate::report::{InterchangeSummary, MessageSummary};
use crate::tokenizer::unescape;
use crate::{Error, Result};
use edi_ir::{Attribute, NamespaceDeclaration};
use edi_schema::{Delimiters, Description, Edimap, MappingsRegistry};
use edi_validation::{IssueKind, Severity, ValidationIssue};
use tracing::{debug, trace, warn};

/// How the body of the current message is handled
pub enum MessageMode {
    /// Decoded against a mapping model
    Mapped(Box<MessageMapper>),
    /// No model; segments copied through verbatim
    PassThrough,
    /// No model in validating mode; segments dropped
    Skip,
}

pub struct MessageScope {
    pub message_ref: String,
    pub description: Description,
    /// Segment number of the UNH
    pub first_segment: usize,
    pub mode: MessageMode,
}

pub enum ScopeKind {
    Interchange,
    Group { group_ref: String },
    Message(MessageScope),
}

/// One open envelope on the scope stack
pub struct Scope {
    pub kind: ScopeKind,
    /// Open elements before the scope element was started
    pub element_depth: usize,
    /// Whether the scope pushed delimiters that its trailer must pop
    pub pushed_delimiters: bool,
    /// `interchange[i]/group[j]/message[k]`
    pub path: String,
}

impl Scope {
    pub fn name(&self) -> &'static str {
        match self.kind {
            ScopeKind::Interchange => "interchange",
            ScopeKind::Group { .. } => "group",
            ScopeKind::Message(_) => "message",
        }
    }
}

/// State of one `parse` call, handed to every control block handler
pub struct InterchangeContext<'a> {
    pub reader: BufferedSegmentReader<'a>,
    pub out: Output<'a>,
    pub registry: &'a dyn MappingsRegistry,
    pub config: &'a ReaderConfig,
    pub envelope: &'a Edimap,
    pub scopes: Vec<Scope>,
    /// Delimiters announced by UNA, waiting for the UNB
    pub pending_advice: Option<Delimiters>,
    pub interchanges: Vec<InterchangeSummary>,
}

impl<'a> InterchangeContext<'a> {
    pub fn new(
        reader: BufferedSegmentReader<'a>,
        out: Output<'a>,
        registry: &'a dyn MappingsRegistry,
        config: &'a ReaderConfig,
        envelope: &'a Edimap,
    ) -> Self {
        Self {
            reader,
            out,
            registry,
            config,
            envelope,
            scopes: Vec::new(),
            pending_advice: None,
            interchanges: Vec::new(),
        }
    }

    /// The innermost open scope
    pub fn scope(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    pub fn in_message(&self) -> bool {
        matches!(self.scope().map(|s| &s.kind), Some(ScopeKind::Message(_)))
    }

    /// Location of the segment in the buffer, relative to the current scope
    pub fn location(&self, code: &str) -> SegmentLocation {
        let scope_path = self.scope().map_or("", |s| s.path.as_str());
        SegmentLocation::new(
            scope_path,
            code,
            self.reader.segment_number(),
            self.reader.offset(),
        )
    }

    /// Structural error at the current segment
    pub fn structure_error(&self, code: &str, message: impl Into<String>) -> Error {
        self.location(code).structure_error(message)
    }

    /// Complete the buffered control segment and return its field tokens
    pub fn read_control_segment(&mut self, code: &str) -> Result<Vec<String>> {
        if !self.reader.move_to_next_segment()? {
            return Err(self.structure_error(code, "Unexpected end of input"));
        }
        let fields = self.reader.current_segment_fields().to_vec();
        trace!(segment = code, number = self.reader.segment_number(), "Control segment");
        Ok(fields)
    }

    /// Open the document root that carries the envelope namespace
    pub fn open_root(&mut self) -> Result<()> {
        let root = self.envelope.node(self.envelope.root());
        self.out.emitter.start_element(
            Some(ENVELOPE_NAMESPACE),
            &root.xmltag,
            Vec::new(),
            vec![NamespaceDeclaration::new(Some(ENVELOPE_PREFIX), ENVELOPE_NAMESPACE)],
        )
    }

    /// Open an envelope element such as `env:interchange`
    pub fn open_envelope_element(&mut self, local_name: &str) -> Result<()> {
        self.out
            .emitter
            .start_element(Some(ENVELOPE_NAMESPACE), local_name, Vec::new(), Vec::new())
    }

    /// Map a control segment through the envelope model
    pub fn map_control_segment(&mut self, code: &str, fields: &[String]) -> Result<()> {
        let segment = self
            .envelope
            .top_level_segment(code)
            .ok_or_else(|| self.structure_error(code, "No envelope definition for segment"))?;
        let location = self.location(code);
        let delimiters = *self.reader.delimiters();
        let mapper = FieldMapper::new(self.envelope, self.config, delimiters);
        mapper.open_segment(&mut self.out, segment, fields, &location)?;
        self.out.emitter.end_element()
    }

    /// Push a scope, enforcing the nesting limit
    pub fn push_scope(&mut self, code: &str, scope: Scope) -> Result<()> {
        if self.scopes.len() + 1 > self.config.max_depth {
            return Err(self.structure_error(
                code,
                format!("Nesting depth exceeds the limit of {}", self.config.max_depth),
            ));
        }
        debug!(scope = scope.name(), path = %scope.path, "Entering scope");
        self.scopes.push(scope);
        Ok(())
    }

    /// Pop the innermost scope, closing its elements and restoring delimiters
    pub fn pop_scope(&mut self) -> Result<Option<Scope>> {
        let Some(scope) = self.scopes.pop() else {
            return Ok(None);
        };
        self.out.emitter.close_to(scope.element_depth)?;
        if scope.pushed_delimiters {
            self.reader.pop_delimiters()?;
        }
        debug!(scope = scope.name(), path = %scope.path, "Leaving scope");
        Ok(Some(scope))
    }

    /// Map, pass through or drop the body segment in the buffer
    pub fn body_segment(&mut self) -> Result<()> {
        if !self.reader.move_to_next_segment()? {
            return Ok(());
        }
        let fields = self.reader.current_segment_fields().to_vec();
        let delimiters = *self.reader.delimiters();
        let code = fields
            .first()
            .map(|c| unescape(c, delimiters.escape()))
            .unwrap_or_default();
        let location = self.location(&code);

        let Some(Scope {
            kind: ScopeKind::Message(message),
            ..
        }) = self.scopes.last_mut()
        else {
            return Err(location.structure_error("Body segment outside of a message"));
        };

        match &mut message.mode {
            MessageMode::Mapped(mapper) => mapper.feed(
                &mut self.out,
                self.config,
                &delimiters,
                self.reader.current_segment(),
                &fields,
                &location,
            ),
            MessageMode::PassThrough => {
                let raw = self.reader.current_segment().to_string();
                self.out.emitter.start_element(
                    Some(ENVELOPE_NAMESPACE),
                    "segment",
                    vec![Attribute::new("segcode", code)],
                    Vec::new(),
                )?;
                self.out.emitter.characters(&raw)?;
                self.out.emitter.end_element()
            }
            MessageMode::Skip => {
                trace!(segment = %code, "Dropping segment of unmapped message");
                Ok(())
            }
        }
    }

    /// Record a control count or reference mismatch
    pub fn control_count_issue(&mut self, code: &str, message: String) -> Result<()> {
        let location = self.location(code);
        if self.config.strict {
            return Err(location.structure_error(message));
        }
        warn!(segment = code, %message, "Control count mismatch");
        self.out.diagnostics.push(ValidationIssue::new(
            Severity::Error,
            IssueKind::ControlCount,
            location.path,
            location.number,
            message,
        ));
        Ok(())
    }

    /// Record a diagnostic scoped to the current segment
    pub fn report(&mut self, code: &str, severity: Severity, kind: IssueKind, message: String) {
        let location = self.location(code);
        self.out.diagnostics.push(ValidationIssue::new(
            severity,
            kind,
            location.path,
            location.number,
            message,
        ));
    }

    /// Summary of the interchange being parsed
    pub fn current_interchange(&mut self) -> Option<&mut InterchangeSummary> {
        self.interchanges.last_mut()
    }

    pub fn record_message(&mut self, summary: MessageSummary) {
        let in_group = self
            .scopes
            .iter()
            .any(|s| matches!(s.kind, ScopeKind::Group { .. }));
        if let Some(interchange) = self.interchanges.last_mut() {
            interchange.message_count += 1;
            if in_group {
                if let Some(group) = interchange.groups.last_mut() {
                    group.message_count += 1;
                }
            }
            interchange.messages.push(summary);
        }
    }
}
