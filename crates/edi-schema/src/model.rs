//! Mapping model definitions as written in model files
//!
//! These owned, nested types are what the loader deserializes and what
//! code builds programmatically. They are compiled into an [`Edimap`]
//! arena before use.
//!
//! [`Edimap`]: crate::edimap::Edimap

use crate::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Identity of one message mapping model.
///
/// Two descriptions are equal when name and version match; the namespace
/// is carried along but not compared. Loose, name-only matching is a
/// separate operation ([`Description::matches_name`]).
#[derive(Debug, Clone, Deserialize)]
pub struct Description {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Description {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Name-only comparison against a bare lookup key
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }

    /// Registry key, `name:version`
    pub fn lookup_name(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

impl PartialEq for Description {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Description {}

impl Hash for Description {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Declared datatype of a value node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Date,
    Time,
    Boolean,
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "an" | "a" => Ok(DataType::String),
            "int" | "integer" | "long" | "short" => Ok(DataType::Integer),
            "decimal" | "double" | "float" | "bigdecimal" | "dabigdecimal" | "n" => {
                Ok(DataType::Decimal)
            }
            "date" | "calendar" => Ok(DataType::Date),
            "time" => Ok(DataType::Time),
            "boolean" | "bool" => Ok(DataType::Boolean),
            other => Err(Error::InvalidModel(format!("Unknown data type: {other}"))),
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Upper bound on repetitions of a segment or group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    /// Whether `count` occurrences still leave room for another
    pub fn allows_more(&self, count: u32) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count < *max,
            MaxOccurs::Unbounded => true,
        }
    }
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl<'de> Deserialize<'de> for MaxOccurs {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(i64),
            Word(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(-1) => Ok(MaxOccurs::Unbounded),
            Repr::Count(n) => u32::try_from(n)
                .map(MaxOccurs::Bounded)
                .map_err(|_| serde::de::Error::custom(format!("invalid max_occurs: {n}"))),
            Repr::Word(w) if w.eq_ignore_ascii_case("unbounded") => Ok(MaxOccurs::Unbounded),
            Repr::Word(w) => Err(serde::de::Error::custom(format!("invalid max_occurs: {w}"))),
        }
    }
}

/// Value constraints shared by fields, components and sub-components
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValueDef {
    pub data_type: Option<DataType>,
    pub parameters: BTreeMap<String, String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

/// A terminal sub-component
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubComponentDef {
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    pub required: bool,
    #[serde(flatten)]
    pub value: ValueDef,
}

impl SubComponentDef {
    pub fn new(xmltag: impl Into<String>) -> Self {
        Self {
            xmltag: xmltag.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComponentDef {
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    pub required: bool,
    pub truncatable: bool,
    #[serde(flatten)]
    pub value: ValueDef,
    pub sub_components: Vec<SubComponentDef>,
}

impl ComponentDef {
    pub fn new(xmltag: impl Into<String>) -> Self {
        Self {
            xmltag: xmltag.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.value.data_type = Some(data_type);
        self
    }

    pub fn sub_component(mut self, sub: SubComponentDef) -> Self {
        self.sub_components.push(sub);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldDef {
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    pub required: bool,
    pub truncatable: bool,
    #[serde(flatten)]
    pub value: ValueDef,
    pub components: Vec<ComponentDef>,
}

impl FieldDef {
    pub fn new(xmltag: impl Into<String>) -> Self {
        Self {
            xmltag: xmltag.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn truncatable(mut self, truncatable: bool) -> Self {
        self.truncatable = truncatable;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.value.data_type = Some(data_type);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.value.parameters.insert(key.into(), value.into());
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.value.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.value.pattern = Some(pattern.into());
        self
    }

    pub fn component(mut self, component: ComponentDef) -> Self {
        self.components.push(component);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SegmentDef {
    pub segcode: String,
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    pub description: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub truncatable: bool,
    pub ignore_unmapped_fields: bool,
    /// `namespace:SEGCODE` reference into an imported model
    pub segref: Option<String>,
    pub fields: Vec<FieldDef>,
    pub segments: Vec<SegmentItem>,
}

impl SegmentDef {
    pub fn new(segcode: impl Into<String>, xmltag: impl Into<String>) -> Self {
        Self {
            segcode: segcode.into(),
            xmltag: xmltag.into(),
            ..Default::default()
        }
    }

    pub fn occurs(mut self, min: u32, max: MaxOccurs) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    pub fn truncatable(mut self, truncatable: bool) -> Self {
        self.truncatable = truncatable;
        self
    }

    pub fn ignore_unmapped_fields(mut self, ignore: bool) -> Self {
        self.ignore_unmapped_fields = ignore;
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn child(mut self, item: impl Into<SegmentItem>) -> Self {
        self.segments.push(item.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SegmentGroupDef {
    pub xmltag: String,
    pub node_type_ref: Option<String>,
    pub documentation: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub segments: Vec<SegmentItem>,
}

impl SegmentGroupDef {
    pub fn new(xmltag: impl Into<String>) -> Self {
        Self {
            xmltag: xmltag.into(),
            ..Default::default()
        }
    }

    pub fn occurs(mut self, min: u32, max: MaxOccurs) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    pub fn child(mut self, item: impl Into<SegmentItem>) -> Self {
        self.segments.push(item.into());
        self
    }
}

/// Child of a group or segment: either a segment or a nested group
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentItem {
    Segment(SegmentDef),
    Group(SegmentGroupDef),
}

impl From<SegmentDef> for SegmentItem {
    fn from(segment: SegmentDef) -> Self {
        SegmentItem::Segment(segment)
    }
}

impl From<SegmentGroupDef> for SegmentItem {
    fn from(group: SegmentGroupDef) -> Self {
        SegmentItem::Group(group)
    }
}

/// Import of another model's segments under a namespace
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDef {
    pub namespace: String,
    pub resource: String,
    #[serde(default)]
    pub truncatable_segments: Option<bool>,
    #[serde(default)]
    pub truncatable_fields: Option<bool>,
    #[serde(default)]
    pub truncatable_components: Option<bool>,
}

/// A complete, uncompiled mapping model
#[derive(Debug, Clone, Deserialize)]
pub struct EdimapDef {
    pub description: Description,
    #[serde(default)]
    pub delimiters: Option<crate::Delimiters>,
    /// Push the model's delimiters for the message body
    #[serde(default)]
    pub override_delimiters: bool,
    #[serde(default)]
    pub namespace_prefix: Option<String>,
    #[serde(default)]
    pub ignore_unmapped_segments: bool,
    #[serde(default)]
    pub imports: Vec<ImportDef>,
    pub segments: SegmentGroupDef,
}

impl EdimapDef {
    pub fn new(description: Description, segments: SegmentGroupDef) -> Self {
        Self {
            description,
            delimiters: None,
            override_delimiters: false,
            namespace_prefix: None,
            ignore_unmapped_segments: false,
            imports: Vec::new(),
            segments,
        }
    }
}
