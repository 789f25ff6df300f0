//! Import resolution for mapping models
//!
//! A model can import another model under a namespace and reference its
//! segments with `segref: "namespace:SEGCODE"`. Referenced definitions are
//! copied into the importing model before compilation.

use crate::model::{EdimapDef, ImportDef, SegmentDef, SegmentGroupDef, SegmentItem};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Tracks import edges between model resources to detect cycles
#[derive(Debug, Default)]
pub struct ImportGraph {
    edges: Vec<(String, String)>, // (importer, imported)
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an import edge, rejecting it if it closes a cycle
    pub fn add_edge(&mut self, importer: impl Into<String>, imported: impl Into<String>) -> Result<()> {
        let importer = importer.into();
        let imported = imported.into();
        if self.would_create_cycle(&importer, &imported) {
            return Err(Error::Import(format!(
                "Circular import detected: {importer} -> {imported}"
            )));
        }
        self.edges.push((importer, imported));
        Ok(())
    }

    /// Whether `imported` already depends on `importer`, directly or transitively
    pub fn would_create_cycle(&self, importer: &str, imported: &str) -> bool {
        if importer == imported {
            return true;
        }

        let mut to_visit = vec![imported.to_string()];
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            if current == importer {
                return true;
            }
            if visited.insert(current.clone()) {
                for (from, to) in &self.edges {
                    if from == &current {
                        to_visit.push(to.clone());
                    }
                }
            }
        }

        false
    }
}

/// Find a segment by code anywhere in a group tree
pub fn find_segment<'a>(group: &'a SegmentGroupDef, segcode: &str) -> Option<&'a SegmentDef> {
    group.segments.iter().find_map(|item| match item {
        SegmentItem::Segment(s) if s.segcode == segcode => Some(s),
        SegmentItem::Segment(s) => s
            .segments
            .iter()
            .find_map(|child| find_in_item(child, segcode)),
        SegmentItem::Group(g) => find_segment(g, segcode),
    })
}

fn find_in_item<'a>(item: &'a SegmentItem, segcode: &str) -> Option<&'a SegmentDef> {
    match item {
        SegmentItem::Segment(s) if s.segcode == segcode => Some(s),
        SegmentItem::Segment(s) => s.segments.iter().find_map(|c| find_in_item(c, segcode)),
        SegmentItem::Group(g) => find_segment(g, segcode),
    }
}

/// Replace every `segref` in `def` with the referenced imported segment.
///
/// `imported` maps each import namespace to its already resolved model.
pub fn resolve_segrefs(def: &mut EdimapDef, imported: &HashMap<String, EdimapDef>) -> Result<()> {
    let imports: HashMap<String, ImportDef> = def
        .imports
        .iter()
        .map(|i| (i.namespace.clone(), i.clone()))
        .collect();
    resolve_group(&mut def.segments, &imports, imported)
}

fn resolve_group(
    group: &mut SegmentGroupDef,
    imports: &HashMap<String, ImportDef>,
    imported: &HashMap<String, EdimapDef>,
) -> Result<()> {
    for item in &mut group.segments {
        resolve_item(item, imports, imported)?;
    }
    Ok(())
}

fn resolve_item(
    item: &mut SegmentItem,
    imports: &HashMap<String, ImportDef>,
    imported: &HashMap<String, EdimapDef>,
) -> Result<()> {
    match item {
        SegmentItem::Group(g) => resolve_group(g, imports, imported),
        SegmentItem::Segment(s) => {
            if let Some(segref) = s.segref.take() {
                *s = resolve_segref(s, &segref, imports, imported)?;
            }
            for child in &mut s.segments {
                resolve_item(child, imports, imported)?;
            }
            Ok(())
        }
    }
}

fn resolve_segref(
    local: &SegmentDef,
    segref: &str,
    imports: &HashMap<String, ImportDef>,
    imported: &HashMap<String, EdimapDef>,
) -> Result<SegmentDef> {
    let (namespace, segcode) = segref
        .split_once(':')
        .ok_or_else(|| Error::Import(format!("Malformed segment reference: {segref}")))?;

    let import = imports
        .get(namespace)
        .ok_or_else(|| Error::Import(format!("Unknown import namespace in {segref}")))?;
    let model = imported
        .get(namespace)
        .ok_or_else(|| Error::Import(format!("Import {namespace} was not loaded")))?;
    let source = find_segment(&model.segments, segcode).ok_or_else(|| {
        Error::Import(format!(
            "Segment {segcode} not found in import {}",
            import.resource
        ))
    })?;

    trace!("Resolved segment reference {}", segref);

    let mut resolved = source.clone();
    resolved.min_occurs = local.min_occurs;
    resolved.max_occurs = local.max_occurs;
    if !local.xmltag.is_empty() {
        resolved.xmltag = local.xmltag.clone();
    }
    if !local.segments.is_empty() {
        resolved.segments = local.segments.clone();
    }
    apply_truncation(&mut resolved, import);
    Ok(resolved)
}

fn apply_truncation(segment: &mut SegmentDef, import: &ImportDef) {
    if let Some(t) = import.truncatable_segments {
        segment.truncatable = t;
    }
    for field in &mut segment.fields {
        if let Some(t) = import.truncatable_fields {
            field.truncatable = t;
        }
        if let Some(t) = import.truncatable_components {
            for component in &mut field.components {
                component.truncatable = t;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Description, FieldDef, MaxOccurs};

    fn common() -> EdimapDef {
        EdimapDef::new(
            Description::new("COMMON", "1"),
            SegmentGroupDef::new("common").child(
                SegmentDef::new("NAD", "NameAndAddress")
                    .field(FieldDef::new("partyQualifier"))
                    .field(FieldDef::new("partyId")),
            ),
        )
    }

    fn importer(segref: &str) -> EdimapDef {
        let mut nad = SegmentDef::new("NAD", "").occurs(0, MaxOccurs::Bounded(99));
        nad.segref = Some(segref.to_string());
        let mut def = EdimapDef::new(
            Description::new("ORDERS", "D:96A:UN"),
            SegmentGroupDef::new("Order").child(nad),
        );
        def.imports.push(ImportDef {
            namespace: "common".to_string(),
            resource: "common.json".to_string(),
            truncatable_segments: Some(true),
            truncatable_fields: Some(true),
            truncatable_components: None,
        });
        def
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = ImportGraph::new();
        graph.add_edge("a.json", "b.json").unwrap();
        graph.add_edge("b.json", "c.json").unwrap();
        assert!(graph.would_create_cycle("c.json", "a.json"));
        assert!(graph.add_edge("c.json", "a.json").is_err());
        assert!(graph.add_edge("a.json", "a.json").is_err());
        assert!(!graph.would_create_cycle("a.json", "c.json"));
    }

    #[test]
    fn test_resolve_segref_copies_fields_and_overrides() {
        let mut def = importer("common:NAD");
        let imported: HashMap<_, _> = [("common".to_string(), common())].into_iter().collect();
        resolve_segrefs(&mut def, &imported).unwrap();

        let SegmentItem::Segment(nad) = &def.segments.segments[0] else {
            panic!("expected segment");
        };
        assert_eq!(nad.xmltag, "NameAndAddress");
        assert_eq!(nad.fields.len(), 2);
        assert_eq!(nad.max_occurs, MaxOccurs::Bounded(99));
        assert!(nad.truncatable);
        assert!(nad.fields.iter().all(|f| f.truncatable));
        assert!(nad.segref.is_none());
    }

    #[test]
    fn test_resolve_segref_unknown_segment() {
        let mut def = importer("common:FTX");
        let imported: HashMap<_, _> = [("common".to_string(), common())].into_iter().collect();
        let err = resolve_segrefs(&mut def, &imported).unwrap_err();
        assert!(err.to_string().contains("FTX"));
    }

    #[test]
    fn test_resolve_segref_unknown_namespace() {
        let mut def = importer("other:NAD");
        let result = resolve_segrefs(&mut def, &HashMap::new());
        assert!(matches!(result, Err(Error::Import(_))));
    }
}
