//! Element bookkeeping on top of a [`ContentHandler`]
//!
//! The emitter tracks which elements are open so scopes can be unwound to
//! a known depth, resolves namespace prefixes through a declaration stack
//! pushed per element, and optionally writes indentation text.

use crate::Result;
use edi_ir::{Attribute, ContentHandler, NamespaceDeclaration, NamespaceDeclarationStack, QName};

struct OpenElement {
    name: QName,
    has_children: bool,
}

pub struct Emitter<'h> {
    handler: &'h mut dyn ContentHandler,
    namespaces: NamespaceDeclarationStack,
    open: Vec<OpenElement>,
    indent: bool,
}

impl<'h> Emitter<'h> {
    pub fn new(handler: &'h mut dyn ContentHandler, indent: bool) -> Self {
        Self {
            handler,
            namespaces: NamespaceDeclarationStack::new(),
            open: Vec::new(),
            indent,
        }
    }

    pub fn start_document(&mut self) -> Result<()> {
        Ok(self.handler.start_document()?)
    }

    pub fn end_document(&mut self) -> Result<()> {
        Ok(self.handler.end_document()?)
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open an element in `namespace`.
    ///
    /// `declarations` are in scope for this element and its descendants;
    /// the element's prefix is resolved against them.
    pub fn start_element(
        &mut self,
        namespace: Option<&str>,
        local_name: &str,
        mut attributes: Vec<Attribute>,
        declarations: Vec<NamespaceDeclaration>,
    ) -> Result<()> {
        for decl in &declarations {
            attributes.push(Attribute::namespace_declaration(
                decl.prefix.as_deref(),
                decl.uri.clone(),
            ));
        }
        self.namespaces.push(declarations);

        let name = match namespace {
            Some(uri) => {
                let prefix = self.namespaces.prefix_for(uri).flatten().map(str::to_string);
                QName::namespaced(uri, local_name).with_prefix(prefix)
            }
            None => QName::local(local_name),
        };

        // No text outside the root element
        if let Some(parent) = self.open.last_mut() {
            parent.has_children = true;
            self.write_indent()?;
        }
        self.handler.start_element(&name, &attributes)?;
        self.open.push(OpenElement {
            name,
            has_children: false,
        });
        Ok(())
    }

    pub fn characters(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        Ok(self.handler.characters(text)?)
    }

    /// Close the innermost open element
    pub fn end_element(&mut self) -> Result<()> {
        let element = self.open.pop().ok_or(edi_ir::Error::NoOpenElement)?;
        self.namespaces.pop()?;
        if element.has_children {
            self.write_indent()?;
        }
        Ok(self.handler.end_element(&element.name)?)
    }

    /// Close elements until only `depth` remain open
    pub fn close_to(&mut self, depth: usize) -> Result<()> {
        while self.open.len() > depth {
            self.end_element()?;
        }
        Ok(())
    }

    /// Write a leaf element holding `text`
    pub fn element(&mut self, namespace: Option<&str>, local_name: &str, text: &str) -> Result<()> {
        self.start_element(namespace, local_name, Vec::new(), Vec::new())?;
        self.characters(text)?;
        self.end_element()
    }

    fn write_indent(&mut self) -> Result<()> {
        if !self.indent {
            return Ok(());
        }
        let mut text = String::with_capacity(self.open.len() + 1);
        text.push('\n');
        text.extend(std::iter::repeat_n('\t', self.open.len()));
        Ok(self.handler.characters(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::TreeBuilder;

    #[test]
    fn test_prefix_resolution_and_close_to() {
        let mut builder = TreeBuilder::new();
        {
            let mut emitter = Emitter::new(&mut builder, false);
            emitter.start_document().unwrap();
            emitter
                .start_element(
                    Some("urn:env"),
                    "root",
                    Vec::new(),
                    vec![NamespaceDeclaration::new(Some("env"), "urn:env")],
                )
                .unwrap();
            emitter
                .start_element(
                    Some("urn:body"),
                    "order",
                    Vec::new(),
                    vec![NamespaceDeclaration::new(None, "urn:body")],
                )
                .unwrap();
            emitter.element(Some("urn:body"), "number", "42").unwrap();
            emitter.element(Some("urn:env"), "note", "x").unwrap();
            assert_eq!(emitter.depth(), 2);
            emitter.close_to(0).unwrap();
            emitter.end_document().unwrap();
        }

        let tree = builder.finish().unwrap();
        assert_eq!(tree.name, "env:root");
        assert_eq!(tree.attribute("xmlns:env"), Some("urn:env"));
        let order = tree.find_child("order").unwrap();
        assert_eq!(order.name, "order");
        assert_eq!(order.attribute("xmlns"), Some("urn:body"));
        assert_eq!(order.find_child("note").unwrap().name, "env:note");
        assert_eq!(tree.text_at("order/number").unwrap(), "42");
    }

    #[test]
    fn test_indentation_is_whitespace_text() {
        let mut out = Vec::new();
        {
            let mut writer = edi_ir::XmlWriter::new(&mut out).without_declaration();
            let mut emitter = Emitter::new(&mut writer, true);
            emitter.start_document().unwrap();
            emitter.start_element(None, "a", Vec::new(), Vec::new()).unwrap();
            emitter.element(None, "b", "1").unwrap();
            emitter.end_element().unwrap();
            emitter.end_document().unwrap();
        }
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<a>\n\t<b>1</b>\n</a>"), "{xml}");
    }

    #[test]
    fn test_end_without_open_element() {
        let mut builder = TreeBuilder::new();
        let mut emitter = Emitter::new(&mut builder, false);
        assert!(emitter.end_element().is_err());
    }
}
