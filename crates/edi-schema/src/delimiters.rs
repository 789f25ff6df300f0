//! Delimiter model and the per-session delimiter stack

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use tracing::trace;

/// Which separator a token sequence was split on.
///
/// Levels are ordered from coarsest to finest; truncation rules in the
/// tokenizer select the separators removable at a given level from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelimiterType {
    Segment,
    Field,
    FieldRepeat,
    Component,
    SubComponent,
    DecimalSeparator,
}

impl fmt::Display for DelimiterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DelimiterType::Segment => "SEGMENT",
            DelimiterType::Field => "FIELD",
            DelimiterType::FieldRepeat => "FIELD_REPEAT",
            DelimiterType::Component => "COMPONENT",
            DelimiterType::SubComponent => "SUB_COMPONENT",
            DelimiterType::DecimalSeparator => "DECIMAL_SEPARATOR",
        };
        f.write_str(name)
    }
}

/// Active separator characters for one parsing scope.
///
/// Instances are immutable and validated on construction: no two
/// configured characters may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "DelimitersFile")]
pub struct Delimiters {
    segment: char,
    field: char,
    field_repeat: Option<char>,
    component: char,
    sub_component: Option<char>,
    decimal: char,
    escape: Option<char>,
    ignore_crlf: bool,
}

impl Delimiters {
    /// UN/EDIFACT default set: `'` `+` `:` `.` with `?` as release character
    pub const UN_EDIFACT: Delimiters = Delimiters {
        segment: '\'',
        field: '+',
        field_repeat: None,
        component: ':',
        sub_component: None,
        decimal: '.',
        escape: Some('?'),
        ignore_crlf: false,
    };

    /// Start building a delimiter set from the UN/EDIFACT defaults
    pub fn builder() -> DelimitersBuilder {
        DelimitersBuilder {
            inner: Self::UN_EDIFACT,
        }
    }

    pub fn segment(&self) -> char {
        self.segment
    }

    pub fn field(&self) -> char {
        self.field
    }

    pub fn field_repeat(&self) -> Option<char> {
        self.field_repeat
    }

    pub fn component(&self) -> char {
        self.component
    }

    pub fn sub_component(&self) -> Option<char> {
        self.sub_component
    }

    pub fn decimal(&self) -> char {
        self.decimal
    }

    pub fn escape(&self) -> Option<char> {
        self.escape
    }

    /// Whether CR/LF characters between segments are dropped
    pub fn ignore_crlf(&self) -> bool {
        self.ignore_crlf
    }

    /// The separator character for a delimiter level, if configured
    pub fn get(&self, kind: DelimiterType) -> Option<char> {
        match kind {
            DelimiterType::Segment => Some(self.segment),
            DelimiterType::Field => Some(self.field),
            DelimiterType::FieldRepeat => self.field_repeat,
            DelimiterType::Component => Some(self.component),
            DelimiterType::SubComponent => self.sub_component,
            DelimiterType::DecimalSeparator => Some(self.decimal),
        }
    }

    /// True when `c` is one of the separator characters (not the decimal mark)
    pub fn is_separator(&self, c: char) -> bool {
        c == self.segment
            || c == self.field
            || c == self.component
            || self.field_repeat == Some(c)
            || self.sub_component == Some(c)
    }

    /// Escape every separator and escape character in `text`.
    ///
    /// Without an escape character the text is returned unchanged.
    pub fn escape_text(&self, text: &str) -> String {
        let Some(escape) = self.escape else {
            return text.to_string();
        };

        let mut escaped = String::with_capacity(text.len() + 4);
        for c in text.chars() {
            if c == escape || self.is_separator(c) {
                escaped.push(escape);
            }
            escaped.push(c);
        }
        escaped
    }

    fn validate(&self) -> Result<()> {
        let mut named: Vec<(&str, char)> = vec![
            ("segment", self.segment),
            ("field", self.field),
            ("component", self.component),
            ("decimal", self.decimal),
        ];
        if let Some(c) = self.field_repeat {
            named.push(("field repeat", c));
        }
        if let Some(c) = self.sub_component {
            named.push(("sub-component", c));
        }
        if let Some(c) = self.escape {
            named.push(("escape", c));
        }

        for (i, (name_a, a)) in named.iter().enumerate() {
            for (name_b, b) in &named[i + 1..] {
                if a == b {
                    return Err(Error::Delimiters(format!(
                        "{name_a} and {name_b} delimiters are both {a:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::UN_EDIFACT
    }
}

/// Builder for [`Delimiters`]
#[derive(Debug, Clone)]
pub struct DelimitersBuilder {
    inner: Delimiters,
}

impl DelimitersBuilder {
    pub fn segment(mut self, c: char) -> Self {
        self.inner.segment = c;
        self
    }

    pub fn field(mut self, c: char) -> Self {
        self.inner.field = c;
        self
    }

    pub fn field_repeat(mut self, c: Option<char>) -> Self {
        self.inner.field_repeat = c;
        self
    }

    pub fn component(mut self, c: char) -> Self {
        self.inner.component = c;
        self
    }

    pub fn sub_component(mut self, c: Option<char>) -> Self {
        self.inner.sub_component = c;
        self
    }

    pub fn decimal(mut self, c: char) -> Self {
        self.inner.decimal = c;
        self
    }

    pub fn escape(mut self, c: Option<char>) -> Self {
        self.inner.escape = c;
        self
    }

    pub fn ignore_crlf(mut self, ignore: bool) -> Self {
        self.inner.ignore_crlf = ignore;
        self
    }

    /// Validate and build the delimiter set
    pub fn build(self) -> Result<Delimiters> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

/// Delimiters as written in model and config files
#[derive(Debug, Deserialize)]
struct DelimitersFile {
    #[serde(default = "default_segment")]
    segment: String,
    #[serde(default = "default_field")]
    field: String,
    #[serde(default)]
    field_repeat: Option<String>,
    #[serde(default = "default_component")]
    component: String,
    #[serde(default)]
    sub_component: Option<String>,
    #[serde(default = "default_decimal")]
    decimal: String,
    #[serde(default)]
    escape: Option<String>,
    #[serde(default)]
    ignore_crlf: bool,
}

fn default_segment() -> String {
    "'".to_string()
}

fn default_field() -> String {
    "+".to_string()
}

fn default_component() -> String {
    ":".to_string()
}

fn default_decimal() -> String {
    ".".to_string()
}

fn single_char(name: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Delimiters(format!(
            "{name} delimiter must be exactly one character, got {value:?}"
        ))),
    }
}

fn optional_char(name: &str, value: Option<&str>) -> Result<Option<char>> {
    match value {
        None | Some("") => Ok(None),
        Some(v) => single_char(name, v).map(Some),
    }
}

impl TryFrom<DelimitersFile> for Delimiters {
    type Error = Error;

    fn try_from(file: DelimitersFile) -> Result<Self> {
        // A "!$" suffix on the segment terminator asks for CR/LF to be ignored
        let (segment, suffix_ignore) = match file.segment.strip_suffix("!$") {
            Some(stripped) => (stripped.to_string(), true),
            None => (file.segment, false),
        };

        Delimiters::builder()
            .segment(single_char("segment", &segment)?)
            .field(single_char("field", &file.field)?)
            .field_repeat(optional_char("field repeat", file.field_repeat.as_deref())?)
            .component(single_char("component", &file.component)?)
            .sub_component(optional_char(
                "sub-component",
                file.sub_component.as_deref(),
            )?)
            .decimal(single_char("decimal", &file.decimal)?)
            .escape(optional_char("escape", file.escape.as_deref())?)
            .ignore_crlf(file.ignore_crlf || suffix_ignore)
            .build()
    }
}

/// Stack of delimiter sets owned by one parsing session.
///
/// The base set can never be popped. Popping restores the exact set that
/// was active before the matching push.
#[derive(Debug, Clone)]
pub struct DelimiterStack {
    base: Delimiters,
    pushed: Vec<Delimiters>,
}

impl DelimiterStack {
    pub fn new(base: Delimiters) -> Self {
        Self {
            base,
            pushed: Vec::new(),
        }
    }

    /// The active delimiter set
    pub fn current(&self) -> &Delimiters {
        self.pushed.last().unwrap_or(&self.base)
    }

    /// Make `delimiters` active until the matching [`pop`](Self::pop)
    pub fn push(&mut self, delimiters: Delimiters) {
        trace!(depth = self.pushed.len() + 1, "Pushing delimiters");
        self.pushed.push(delimiters);
    }

    /// Restore the previously active set
    pub fn pop(&mut self) -> Result<Delimiters> {
        let popped = self.pushed.pop().ok_or(Error::DelimiterUnderflow)?;
        trace!(depth = self.pushed.len(), "Popped delimiters");
        Ok(popped)
    }

    /// Number of sets pushed above the base
    pub fn depth(&self) -> usize {
        self.pushed.len()
    }
}

impl Default for DelimiterStack {
    fn default() -> Self {
        Self::new(Delimiters::UN_EDIFACT)
    }
}
