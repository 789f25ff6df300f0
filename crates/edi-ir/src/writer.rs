//! Content handler that serializes events as XML text

use crate::event::{Attribute, ContentHandler, QName};
use crate::{Error, Result};
use std::io::Write;

/// Writes events as XML to any [`Write`] sink
pub struct XmlWriter<W: Write> {
    out: W,
    declaration: bool,
    open: usize,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            declaration: true,
            open: 0,
        }
    }

    /// Skip the `<?xml ...?>` declaration
    pub fn without_declaration(mut self) -> Self {
        self.declaration = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Escape text content or attribute values
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl<W: Write> ContentHandler for XmlWriter<W> {
    fn start_document(&mut self) -> Result<()> {
        if self.declaration {
            writeln!(self.out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        }
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<()> {
        write!(self.out, "<{}", name.qualified_name())?;
        for attr in attributes {
            write!(self.out, " {}=\"{}\"", attr.name, escape_xml(&attr.value))?;
        }
        write!(self.out, ">")?;
        self.open += 1;
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        write!(self.out, "{}", escape_xml(text))?;
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.open = self.open.checked_sub(1).ok_or(Error::NoOpenElement)?;
        write!(self.out, "</{}>", name.qualified_name())?;
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        if self.open > 0 {
            return Err(Error::IncompleteDocument { open: self.open });
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
