//! Segment and field mapping against an [`Edimap`]
//!
//! [`FieldMapper`] turns the tokens of one segment into elements for its
//! fields, components and sub-components. [`MessageMapper`] walks the
//! segment tree of a message model with an explicit frame stack, one frame
//! per open group or parent segment, deciding for every incoming segment
//! which definition it belongs to.

use crate::config::ReaderConfig;
use crate::emitter::Emitter;
use crate::tokenizer::{concat_and_truncate, split_on, unescape};
use crate::{Error, Result};
use edi_ir::NamespaceDeclaration;
use edi_schema::{DelimiterType, Delimiters, Edimap, MaxOccurs, NodeId, NodeKind, ValueNode};
use edi_validation::{IssueKind, Severity, ValidationIssue, ValidationReport, validate_value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Event and diagnostics sink shared by the mappers
pub struct Output<'h> {
    pub emitter: Emitter<'h>,
    pub diagnostics: ValidationReport,
}

impl<'h> Output<'h> {
    pub fn new(emitter: Emitter<'h>) -> Self {
        Self {
            emitter,
            diagnostics: ValidationReport::new(),
        }
    }
}

/// Position of the segment being mapped
#[derive(Debug, Clone)]
pub struct SegmentLocation {
    pub code: String,
    pub number: usize,
    pub offset: u64,
    /// `.../segment[n:CODE]`
    pub path: String,
}

impl SegmentLocation {
    pub fn new(scope_path: &str, code: &str, number: usize, offset: u64) -> Self {
        Self {
            code: code.to_string(),
            number,
            offset,
            path: format!("{scope_path}/segment[{number}:{code}]"),
        }
    }

    pub(crate) fn mapping_error(&self, message: impl Into<String>) -> Error {
        Error::Mapping {
            segment_code: self.code.clone(),
            segment_number: self.number,
            message: message.into(),
        }
    }

    pub(crate) fn structure_error(&self, message: impl Into<String>) -> Error {
        Error::Structure {
            segment_code: self.code.clone(),
            segment_number: self.number,
            offset: self.offset,
            message: message.into(),
        }
    }
}

/// The segment currently being mapped
struct SegmentScope<'l> {
    location: &'l SegmentLocation,
    ignore_unmapped_fields: bool,
}

/// Maps the fields of single segments
pub struct FieldMapper<'m> {
    model: &'m Edimap,
    config: &'m ReaderConfig,
    delimiters: Delimiters,
}

impl<'m> FieldMapper<'m> {
    pub fn new(model: &'m Edimap, config: &'m ReaderConfig, delimiters: Delimiters) -> Self {
        Self {
            model,
            config,
            delimiters,
        }
    }

    fn namespace(&self) -> Option<&'m str> {
        self.model.namespace()
    }

    /// Open the element of `segment_id` and map `fields` into it.
    ///
    /// `fields[0]` is the segment code. The segment element is left open.
    pub fn open_segment(
        &self,
        out: &mut Output<'_>,
        segment_id: NodeId,
        fields: &[String],
        location: &SegmentLocation,
    ) -> Result<()> {
        let node = self.model.node(segment_id);
        let segment = node.as_segment().ok_or_else(|| {
            location.mapping_error(format!("'{}' is not a segment definition", node.xmltag))
        })?;
        let scope = SegmentScope {
            location,
            ignore_unmapped_fields: segment.ignore_unmapped_fields,
        };

        out.emitter
            .start_element(self.namespace(), &node.xmltag, Vec::new(), Vec::new())?;

        let values = fields.get(1..).unwrap_or_default();
        self.check_unmapped(values, segment.fields.len(), DelimiterType::Field, &scope)?;

        for (i, field_id) in segment.fields.iter().enumerate() {
            let path = format!("{}/field[{}]", location.path, i + 1);
            match values.get(i) {
                Some(raw) => self.field(out, *field_id, raw, &path, &scope)?,
                None if segment.truncatable => self.check_missing(out, *field_id, &path, &scope)?,
                None => self.field(out, *field_id, "", &path, &scope)?,
            }
        }
        Ok(())
    }

    fn field(
        &self,
        out: &mut Output<'_>,
        field_id: NodeId,
        raw: &str,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let repetitions = match self.delimiters.field_repeat() {
            Some(repeat) if !raw.is_empty() => split_on(raw, repeat, self.delimiters.escape()),
            _ => vec![raw.to_string()],
        };
        for repetition in &repetitions {
            self.field_occurrence(out, field_id, repetition, path, scope)?;
        }
        Ok(())
    }

    fn field_occurrence(
        &self,
        out: &mut Output<'_>,
        field_id: NodeId,
        raw: &str,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let node = self.model.node(field_id);
        let Some(field) = node.as_field() else {
            return Err(scope
                .location
                .mapping_error(format!("'{}' is not a field", node.xmltag)));
        };

        if field.components.is_empty() {
            return self.leaf(out, &node.xmltag, &field.value, raw, path, scope);
        }
        if raw.is_empty() && self.config.ignore_empty_nodes {
            return Ok(());
        }

        out.emitter
            .start_element(self.namespace(), &node.xmltag, Vec::new(), Vec::new())?;
        let tokens = split_on(raw, self.delimiters.component(), self.delimiters.escape());
        self.check_unmapped(&tokens, field.components.len(), DelimiterType::Component, scope)?;

        for (i, component_id) in field.components.iter().enumerate() {
            let path = format!("{path}/component[{}]", i + 1);
            match tokens.get(i) {
                Some(token) => self.component(out, *component_id, token, &path, scope)?,
                None if field.truncatable => self.check_missing(out, *component_id, &path, scope)?,
                None => self.component(out, *component_id, "", &path, scope)?,
            }
        }
        out.emitter.end_element()
    }

    fn component(
        &self,
        out: &mut Output<'_>,
        component_id: NodeId,
        raw: &str,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let node = self.model.node(component_id);
        let Some(component) = node.as_component() else {
            return Err(scope
                .location
                .mapping_error(format!("'{}' is not a component", node.xmltag)));
        };

        if component.sub_components.is_empty() {
            return self.leaf(out, &node.xmltag, &component.value, raw, path, scope);
        }
        if raw.is_empty() && self.config.ignore_empty_nodes {
            return Ok(());
        }

        out.emitter
            .start_element(self.namespace(), &node.xmltag, Vec::new(), Vec::new())?;
        let tokens = match self.delimiters.sub_component() {
            Some(sub) => split_on(raw, sub, self.delimiters.escape()),
            None => vec![raw.to_string()],
        };
        self.check_unmapped(
            &tokens,
            component.sub_components.len(),
            DelimiterType::SubComponent,
            scope,
        )?;

        for (i, sub_id) in component.sub_components.iter().enumerate() {
            let path = format!("{path}/sub-component[{}]", i + 1);
            let sub = self.model.node(*sub_id);
            let NodeKind::SubComponent(value) = &sub.kind else {
                return Err(scope
                    .location
                    .mapping_error(format!("'{}' is not a sub-component", sub.xmltag)));
            };
            match tokens.get(i) {
                Some(token) => self.leaf(out, &sub.xmltag, value, token, &path, scope)?,
                None if component.truncatable => self.check_value(out, value, "", &path, scope)?,
                None => self.leaf(out, &sub.xmltag, value, "", &path, scope)?,
            }
        }
        out.emitter.end_element()
    }

    fn leaf(
        &self,
        out: &mut Output<'_>,
        xmltag: &str,
        value: &ValueNode,
        raw: &str,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let text = unescape(raw, self.delimiters.escape());
        self.check_value(out, value, &text, path, scope)?;
        if text.is_empty() && self.config.ignore_empty_nodes {
            return Ok(());
        }
        out.emitter.element(self.namespace(), xmltag, &text)
    }

    /// A truncated field or component still has to satisfy `required`
    fn check_missing(
        &self,
        out: &mut Output<'_>,
        id: NodeId,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let value = match &self.model.node(id).kind {
            NodeKind::Field(f) => &f.value,
            NodeKind::Component(c) => &c.value,
            NodeKind::SubComponent(v) => v,
            _ => return Ok(()),
        };
        self.check_value(out, value, "", path, scope)
    }

    fn check_value(
        &self,
        out: &mut Output<'_>,
        value: &ValueNode,
        text: &str,
        path: &str,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        if !self.config.validate {
            return Ok(());
        }
        for message in validate_value(text, value, self.delimiters.decimal()) {
            if self.config.strict {
                return Err(Error::Validation {
                    path: path.to_string(),
                    message,
                });
            }
            debug!(path, %message, "Field value failed validation");
            out.diagnostics.push(ValidationIssue::new(
                Severity::Error,
                IssueKind::Validation,
                path,
                scope.location.number,
                message,
            ));
        }
        Ok(())
    }

    /// Tokens beyond the mapped ones must carry no data at `level`
    fn check_unmapped(
        &self,
        tokens: &[String],
        mapped: usize,
        level: DelimiterType,
        scope: &SegmentScope<'_>,
    ) -> Result<()> {
        let Some(extra) = tokens.get(mapped..).filter(|e| !e.is_empty()) else {
            return Ok(());
        };
        let remainder = concat_and_truncate(extra, level, &self.delimiters);
        if remainder.is_empty() {
            return Ok(());
        }
        if scope.ignore_unmapped_fields {
            trace!(segment = %scope.location.code, %remainder, "Ignoring unmapped {level} data");
            return Ok(());
        }
        Err(scope.location.mapping_error(format!(
            "{} unmapped {level} token(s) with data: '{remainder}'",
            extra.len()
        )))
    }
}

/// Position inside one group or parent segment
#[derive(Debug, Clone, Copy)]
struct Frame {
    container: NodeId,
    /// Child definition currently being matched
    index: usize,
    /// Occurrences of that child so far
    count: u32,
}

enum Step {
    Close,
    OpenGroup(NodeId),
    Segment { id: NodeId, has_children: bool },
}

enum Resolution {
    Matched { steps: Vec<Step>, frames: Vec<Frame> },
    Unexpected,
    MissingMandatory(NodeId),
}

/// Maps the body segments of one message
pub struct MessageMapper {
    model: Arc<Edimap>,
    frames: Vec<Frame>,
    base_depth: usize,
    max_depth: usize,
    mapped: usize,
    skipped: usize,
}

impl MessageMapper {
    /// `base_depth` is the nesting already used by enclosing scopes
    pub fn new(model: Arc<Edimap>, base_depth: usize, max_depth: usize) -> Self {
        Self {
            model,
            frames: Vec::new(),
            base_depth,
            max_depth,
            mapped: 0,
            skipped: 0,
        }
    }

    pub fn model(&self) -> &Edimap {
        &self.model
    }

    /// Body segments mapped so far
    pub fn mapped_segments(&self) -> usize {
        self.mapped
    }

    /// Unexpected segments skipped under `ignore_unmapped_segments`
    pub fn skipped_segments(&self) -> usize {
        self.skipped
    }

    /// Open the message root element, declaring the model namespace
    pub fn start(&mut self, out: &mut Output<'_>) -> Result<()> {
        let root = self.model.node(self.model.root());
        let declarations = self
            .model
            .namespace()
            .map(|ns| vec![NamespaceDeclaration::new(self.model.namespace_prefix(), ns)])
            .unwrap_or_default();
        out.emitter
            .start_element(self.model.namespace(), &root.xmltag, Vec::new(), declarations)?;
        self.frames = vec![Frame {
            container: self.model.root(),
            index: 0,
            count: 0,
        }];
        Ok(())
    }

    /// Map one body segment.
    ///
    /// `raw` is the unsplit segment text, `fields` its field tokens.
    pub fn feed(
        &mut self,
        out: &mut Output<'_>,
        config: &ReaderConfig,
        delimiters: &Delimiters,
        raw: &str,
        fields: &[String],
        location: &SegmentLocation,
    ) -> Result<()> {
        let (steps, frames) = match self.resolve(raw, delimiters.field(), location)? {
            Resolution::Matched { steps, frames } => (steps, frames),
            Resolution::Unexpected if self.model.ignore_unmapped_segments() => {
                debug!(segment = %location.code, number = location.number, "Skipping unmapped segment");
                self.skipped += 1;
                return Ok(());
            }
            Resolution::Unexpected => {
                return Err(location.mapping_error(format!(
                    "Unexpected segment '{}' for message model {}",
                    location.code,
                    self.model.description()
                )));
            }
            Resolution::MissingMandatory(_) if self.model.ignore_unmapped_segments() => {
                debug!(segment = %location.code, number = location.number, "Skipping unmapped segment");
                self.skipped += 1;
                return Ok(());
            }
            Resolution::MissingMandatory(id) => {
                return Err(location.mapping_error(format!(
                    "Mandatory segment '{}' missing before '{}'",
                    self.model.path(id),
                    location.code
                )));
            }
        };

        let mapper = FieldMapper::new(&self.model, config, *delimiters);
        for step in steps {
            match step {
                Step::Close => out.emitter.end_element()?,
                Step::OpenGroup(id) => {
                    let group = self.model.node(id);
                    out.emitter.start_element(
                        self.model.namespace(),
                        &group.xmltag,
                        Vec::new(),
                        Vec::new(),
                    )?;
                }
                Step::Segment { id, has_children } => {
                    trace!(segment = %location.code, node = %self.model.path(id), "Mapped segment");
                    mapper.open_segment(out, id, fields, location)?;
                    if !has_children {
                        out.emitter.end_element()?;
                    }
                }
            }
        }
        self.frames = frames;
        self.mapped += 1;
        Ok(())
    }

    /// Find where `raw` fits without touching the live frames
    fn resolve(&self, raw: &str, field_separator: char, location: &SegmentLocation) -> Result<Resolution> {
        let model = &self.model;
        let mut frames = self.frames.clone();
        let mut steps = Vec::new();

        loop {
            let Some(top) = frames.len().checked_sub(1) else {
                return Ok(Resolution::Unexpected);
            };
            let frame = frames[top];
            let children = model.node(frame.container).segment_children();

            let Some(&child) = children.get(frame.index) else {
                if top == 0 {
                    return Ok(Resolution::Unexpected);
                }
                frames.pop();
                steps.push(Step::Close);
                continue;
            };

            let node = model.node(child);
            let (min, max) = node.occurs().unwrap_or((0, MaxOccurs::Bounded(1)));
            let matched = model
                .first_segment(child)
                .and_then(|id| model.node(id).as_segment())
                .is_some_and(|s| s.matches(raw, field_separator));

            if matched && max.allows_more(frame.count) {
                frames[top].count += 1;
                match &node.kind {
                    NodeKind::Group(_) => {
                        steps.push(Step::OpenGroup(child));
                        self.push_frame(&mut frames, child, location)?;
                        continue;
                    }
                    NodeKind::Segment(segment) => {
                        let has_children = !segment.children.is_empty();
                        if has_children {
                            self.push_frame(&mut frames, child, location)?;
                        }
                        steps.push(Step::Segment { id: child, has_children });
                        return Ok(Resolution::Matched { steps, frames });
                    }
                    _ => return Ok(Resolution::Unexpected),
                }
            }

            if frame.count < min {
                return Ok(Resolution::MissingMandatory(child));
            }
            frames[top].index += 1;
            frames[top].count = 0;
        }
    }

    fn push_frame(&self, frames: &mut Vec<Frame>, container: NodeId, location: &SegmentLocation) -> Result<()> {
        if self.base_depth + frames.len() + 1 > self.max_depth {
            return Err(location.structure_error(format!(
                "Nesting depth exceeds the limit of {}",
                self.max_depth
            )));
        }
        frames.push(Frame {
            container,
            index: 0,
            count: 0,
        });
        Ok(())
    }

    /// Check for unmet mandatory segments and close every open element
    pub fn finish(&mut self, out: &mut Output<'_>, location: &SegmentLocation) -> Result<()> {
        for frame in self.frames.iter().rev() {
            let children = self.model.node(frame.container).segment_children();
            for (i, child) in children.iter().enumerate().skip(frame.index) {
                let count = if i == frame.index { frame.count } else { 0 };
                let min = self.model.node(*child).occurs().map_or(0, |(min, _)| min);
                if count >= min {
                    continue;
                }
                let path = self.model.path(*child);
                if self.model.ignore_unmapped_segments() {
                    debug!(%path, "Mandatory segment missing at end of message");
                    continue;
                }
                return Err(location.mapping_error(format!(
                    "Mandatory segment '{path}' missing at end of message"
                )));
            }
        }

        for _ in self.frames.drain(..) {
            out.emitter.end_element()?;
        }
        Ok(())
    }
}
