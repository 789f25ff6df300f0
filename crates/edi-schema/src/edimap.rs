//! Compiled mapping model
//!
//! An [`Edimap`] stores its nodes in a flat arena. Children are held as
//! ordered [`NodeId`] lists and every node keeps a non-owning index back
//! to its parent, used for path lookups in diagnostics.

use crate::model::{
    ComponentDef, DataType, Description, EdimapDef, FieldDef, MaxOccurs, SegmentDef,
    SegmentGroupDef, SegmentItem, SubComponentDef, ValueDef,
};
use crate::{Delimiters, Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Index of a node inside its [`Edimap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Common node attributes plus the kind-specific payload
#[derive(Debug, Clone)]
pub struct MappingNode {
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl MappingNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn as_segment(&self) -> Option<&SegmentNode> {
        match &self.kind {
            NodeKind::Segment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldNode> {
        match &self.kind {
            NodeKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentNode> {
        match &self.kind {
            NodeKind::Component(c) => Some(c),
            _ => None,
        }
    }

    /// Occurrence bounds for segments and groups
    pub fn occurs(&self) -> Option<(u32, MaxOccurs)> {
        match &self.kind {
            NodeKind::Group(g) => Some((g.min_occurs, g.max_occurs)),
            NodeKind::Segment(s) => Some((s.min_occurs, s.max_occurs)),
            _ => None,
        }
    }

    /// Ordered segment/group children of a group or segment
    pub fn segment_children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group(g) => &g.children,
            NodeKind::Segment(s) => &s.children,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group(GroupNode),
    Segment(SegmentNode),
    Field(FieldNode),
    Component(ComponentNode),
    SubComponent(ValueNode),
}

#[derive(Debug, Clone)]
pub struct GroupNode {
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SegmentNode {
    pub segcode: String,
    pub description: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub truncatable: bool,
    pub ignore_unmapped_fields: bool,
    pub fields: Vec<NodeId>,
    pub children: Vec<NodeId>,
}

impl SegmentNode {
    /// Whether a raw segment belongs to this definition.
    ///
    /// The segment code may carry qualifier fields (`NAD+BY`); a raw
    /// segment matches when it equals the code or continues with a field
    /// separator after it.
    pub fn matches(&self, raw_segment: &str, field_separator: char) -> bool {
        match raw_segment.strip_prefix(self.segcode.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(field_separator),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub value: ValueNode,
    pub truncatable: bool,
    pub components: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ComponentNode {
    pub value: ValueNode,
    pub truncatable: bool,
    pub sub_components: Vec<NodeId>,
}

/// Constraints on a terminal value
#[derive(Debug, Clone, Default)]
pub struct ValueNode {
    pub required: bool,
    pub data_type: Option<DataType>,
    pub parameters: BTreeMap<String, String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

impl ValueNode {
    fn compile(required: bool, def: ValueDef) -> Result<Self> {
        let pattern = def
            .pattern
            .map(|p| {
                Regex::new(&format!("^(?:{p})$"))
                    .map_err(|e| Error::InvalidModel(format!("Invalid pattern {p:?}: {e}")))
            })
            .transpose()?;

        if let (Some(min), Some(max)) = (def.min_length, def.max_length) {
            if min > max {
                return Err(Error::InvalidModel(format!(
                    "min_length {min} exceeds max_length {max}"
                )));
            }
        }

        Ok(Self {
            required,
            data_type: def.data_type,
            parameters: def.parameters,
            min_length: def.min_length,
            max_length: def.max_length,
            pattern,
        })
    }
}

/// Immutable, compiled mapping model for one message type
#[derive(Debug, Clone)]
pub struct Edimap {
    description: Description,
    delimiters: Option<Delimiters>,
    override_delimiters: bool,
    namespace_prefix: Option<String>,
    ignore_unmapped_segments: bool,
    nodes: Vec<MappingNode>,
    root: NodeId,
}

impl Edimap {
    /// Compile a definition into the arena form.
    ///
    /// Imports must already be resolved; a segment still carrying a
    /// `segref` is rejected.
    pub fn compile(def: EdimapDef) -> Result<Self> {
        let mut compiler = Compiler { nodes: Vec::new() };
        let root = compiler.group(def.segments, None)?;

        Ok(Self {
            description: def.description,
            delimiters: def.delimiters,
            override_delimiters: def.override_delimiters,
            namespace_prefix: def.namespace_prefix,
            ignore_unmapped_segments: def.ignore_unmapped_segments,
            nodes: compiler.nodes,
            root,
        })
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn delimiters(&self) -> Option<&Delimiters> {
        self.delimiters.as_ref()
    }

    /// Delimiters to push for the message body, when the model asks for it
    pub fn body_delimiters(&self) -> Option<&Delimiters> {
        self.delimiters.as_ref().filter(|_| self.override_delimiters)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.description.namespace.as_deref()
    }

    pub fn namespace_prefix(&self) -> Option<&str> {
        self.namespace_prefix.as_deref()
    }

    pub fn ignore_unmapped_segments(&self) -> bool {
        self.ignore_unmapped_segments
    }

    /// The root segment group
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node.
    ///
    /// Ids are only produced by this model, so an id from a different
    /// model is a programming error and panics on out-of-range access.
    pub fn node(&self, id: NodeId) -> &MappingNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slash-separated xmltag path from the root to `id`
    pub fn path(&self, id: NodeId) -> String {
        let mut tags = vec![self.node(id).xmltag.as_str()];
        let mut current = self.parent(id);
        while let Some(parent) = current {
            tags.push(self.node(parent).xmltag.as_str());
            current = self.parent(parent);
        }
        tags.reverse();
        tags.join("/")
    }

    /// First segment reachable from `id` through leading group children
    pub fn first_segment(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            match &self.node(current).kind {
                NodeKind::Segment(_) => return Some(current),
                NodeKind::Group(g) => current = *g.children.first()?,
                _ => return None,
            }
        }
    }

    /// Top-level segment by code, searching the root group's direct children
    pub fn top_level_segment(&self, segcode: &str) -> Option<NodeId> {
        self.node(self.root)
            .segment_children()
            .iter()
            .copied()
            .find(|id| {
                self.node(*id)
                    .as_segment()
                    .is_some_and(|s| s.segcode == segcode)
            })
    }
}

struct Compiler {
    nodes: Vec<MappingNode>,
}

impl Compiler {
    fn alloc(
        &mut self,
        xmltag: String,
        node_type_ref: Option<String>,
        documentation: Option<String>,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MappingNode {
            xmltag,
            node_type_ref,
            documentation,
            parent,
            kind,
        });
        id
    }

    fn set_children(&mut self, id: NodeId, ids: Vec<NodeId>) {
        match &mut self.nodes[id.0].kind {
            NodeKind::Group(g) => g.children = ids,
            NodeKind::Segment(s) => s.children = ids,
            _ => {}
        }
    }

    fn check_occurs(xmltag: &str, min: u32, max: MaxOccurs) -> Result<()> {
        if let MaxOccurs::Bounded(max) = max {
            if max == 0 || min > max {
                return Err(Error::InvalidModel(format!(
                    "{xmltag}: invalid occurrence bounds {min}..{max}"
                )));
            }
        }
        Ok(())
    }

    fn items(&mut self, items: Vec<SegmentItem>, parent: NodeId) -> Result<Vec<NodeId>> {
        items
            .into_iter()
            .map(|item| match item {
                SegmentItem::Segment(s) => self.segment(s, parent),
                SegmentItem::Group(g) => self.group(g, Some(parent)),
            })
            .collect()
    }

    fn group(&mut self, def: SegmentGroupDef, parent: Option<NodeId>) -> Result<NodeId> {
        Self::check_occurs(&def.xmltag, def.min_occurs, def.max_occurs)?;
        if parent.is_some() && def.segments.is_empty() {
            return Err(Error::InvalidModel(format!(
                "Segment group {} has no segments",
                def.xmltag
            )));
        }

        let id = self.alloc(
            def.xmltag,
            def.node_type_ref,
            def.documentation,
            parent,
            NodeKind::Group(GroupNode {
                min_occurs: def.min_occurs,
                max_occurs: def.max_occurs,
                children: Vec::new(),
            }),
        );
        let children = self.items(def.segments, id)?;
        self.set_children(id, children);
        Ok(id)
    }

    fn segment(&mut self, def: SegmentDef, parent: NodeId) -> Result<NodeId> {
        if def.segcode.trim().is_empty() {
            return Err(Error::InvalidModel(format!(
                "Segment {} has no segment code",
                def.xmltag
            )));
        }
        if let Some(segref) = &def.segref {
            return Err(Error::Import(format!(
                "Unresolved segment reference {segref} on {}",
                def.segcode
            )));
        }
        Self::check_occurs(&def.segcode, def.min_occurs, def.max_occurs)?;

        let id = self.alloc(
            def.xmltag,
            def.node_type_ref,
            def.documentation,
            Some(parent),
            NodeKind::Segment(SegmentNode {
                segcode: def.segcode,
                description: def.description,
                min_occurs: def.min_occurs,
                max_occurs: def.max_occurs,
                truncatable: def.truncatable,
                ignore_unmapped_fields: def.ignore_unmapped_fields,
                fields: Vec::new(),
                children: Vec::new(),
            }),
        );

        let fields = def
            .fields
            .into_iter()
            .map(|f| self.field(f, id))
            .collect::<Result<Vec<_>>>()?;
        let children = self.items(def.segments, id)?;

        if let NodeKind::Segment(s) = &mut self.nodes[id.0].kind {
            s.fields = fields;
        }
        self.set_children(id, children);
        Ok(id)
    }

    fn field(&mut self, def: FieldDef, parent: NodeId) -> Result<NodeId> {
        let value = ValueNode::compile(def.required, def.value)?;
        let id = self.alloc(
            def.xmltag,
            def.node_type_ref,
            def.documentation,
            Some(parent),
            NodeKind::Field(FieldNode {
                value,
                truncatable: def.truncatable,
                components: Vec::new(),
            }),
        );
        let components = def
            .components
            .into_iter()
            .map(|c| self.component(c, id))
            .collect::<Result<Vec<_>>>()?;
        if let NodeKind::Field(f) = &mut self.nodes[id.0].kind {
            f.components = components;
        }
        Ok(id)
    }

    fn component(&mut self, def: ComponentDef, parent: NodeId) -> Result<NodeId> {
        let value = ValueNode::compile(def.required, def.value)?;
        let id = self.alloc(
            def.xmltag,
            def.node_type_ref,
            def.documentation,
            Some(parent),
            NodeKind::Component(ComponentNode {
                value,
                truncatable: def.truncatable,
                sub_components: Vec::new(),
            }),
        );
        let subs = def
            .sub_components
            .into_iter()
            .map(|s| self.sub_component(s, id))
            .collect::<Result<Vec<_>>>()?;
        if let NodeKind::Component(c) = &mut self.nodes[id.0].kind {
            c.sub_components = subs;
        }
        Ok(id)
    }

    fn sub_component(&mut self, def: SubComponentDef, parent: NodeId) -> Result<NodeId> {
        let value = ValueNode::compile(def.required, def.value)?;
        Ok(self.alloc(
            def.xmltag,
            def.node_type_ref,
            def.documentation,
            Some(parent),
            NodeKind::SubComponent(value),
        ))
    }
}
