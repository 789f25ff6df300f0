//! Integration tests for interchange parsing

use std::sync::Arc;

use edi_adapter_edifact::{
    AbortHandle, Error, InterchangeParser, ParseStatus, ReaderConfig,
};
use edi_ir::{Attribute, ContentHandler, Node, QName, TreeBuilder};
use edi_schema::{
    ComponentDef, Delimiters, Description, Edimap, EdimapDef, FieldDef, MaxOccurs, SegmentDef,
    SegmentGroupDef, StaticMappingsRegistry,
};
use edi_validation::{IssueKind, Severity};

/// ORDERS model with a header, dates and a repeating party group
fn orders_model() -> Edimap {
    let group = SegmentGroupDef::new("order")
        .child(
            SegmentDef::new("BGM", "header")
                .occurs(1, MaxOccurs::Bounded(1))
                .truncatable(true)
                .field(FieldDef::new("docType").component(ComponentDef::new("code")))
                .field(FieldDef::new("number"))
                .field(FieldDef::new("function")),
        )
        .child(
            SegmentDef::new("DTM", "date")
                .occurs(0, MaxOccurs::Unbounded)
                .field(
                    FieldDef::new("period")
                        .truncatable(true)
                        .component(ComponentDef::new("qualifier"))
                        .component(ComponentDef::new("value"))
                        .component(ComponentDef::new("format")),
                ),
        )
        .child(
            SegmentGroupDef::new("party")
                .occurs(0, MaxOccurs::Unbounded)
                .child(
                    SegmentDef::new("NAD", "nameAndAddress")
                        .occurs(1, MaxOccurs::Bounded(1))
                        .truncatable(true)
                        .field(FieldDef::new("function"))
                        .field(
                            FieldDef::new("id")
                                .truncatable(true)
                                .component(ComponentDef::new("code"))
                                .component(ComponentDef::new("list"))
                                .component(ComponentDef::new("agency")),
                        ),
                ),
        );
    let description = Description::new("ORDERS", "D:96A:UN").with_namespace("urn:example:orders");
    Edimap::compile(EdimapDef::new(description, group)).unwrap()
}

fn parser(config: ReaderConfig) -> InterchangeParser {
    let registry = StaticMappingsRegistry::from_models([orders_model()]);
    InterchangeParser::new(Arc::new(registry))
        .unwrap()
        .with_config(config)
}

fn parse(input: &str, config: ReaderConfig) -> (edi_adapter_edifact::ParseReport, Node) {
    let mut tree = TreeBuilder::new();
    let report = parser(config).parse(input.as_bytes(), &mut tree).unwrap();
    (report, tree.finish().unwrap())
}

const ORDERS_INTERCHANGE: &str = "UNA:+.? '\n\
    UNB+UNOC:3+SENDER:14+RECEIVER:14+240101:1200+REF001'\n\
    UNH+ME1+ORDERS:D:96A:UN'\n\
    BGM+220+PO1+9'\n\
    DTM+137:20240101:102'\n\
    NAD+BY+5412345000013::9'\n\
    NAD+SU+4012345500004::9'\n\
    UNT+6+ME1'\n\
    UNH+ME2+ORDERS:D:96A:UN'\n\
    BGM+220+PO2'\n\
    UNT+3+ME2'\n\
    UNZ+2+REF001'\n";

#[test]
fn test_orders_interchange() {
    let (report, root) = parse(ORDERS_INTERCHANGE, ReaderConfig::default());

    assert_eq!(report.status, ParseStatus::Completed);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.segment_count, 11);

    let interchange = &report.interchanges[0];
    assert_eq!(interchange.control_ref, "REF001");
    assert_eq!(interchange.message_count, 2);
    assert_eq!(interchange.declared_count, Some(2));
    let counts: Vec<_> = report.messages().map(|m| m.segment_count).collect();
    assert_eq!(counts, vec![6, 3]);
    assert!(report.messages().all(|m| m.mapped));

    assert_eq!(root.local_name, "unEdifact");
    assert_eq!(root.name, "env:unEdifact");
    assert_eq!(root.text_at("interchange/UNB/controlRef").unwrap(), "REF001");
    assert_eq!(root.text_at("interchange/UNB/sender/id").unwrap(), "SENDER");
    assert_eq!(
        root.text_at("interchange/interchangeMessage/UNH/messageIdentifier/id").unwrap(),
        "ORDERS"
    );

    let order = root.navigate("interchange/interchangeMessage/order").unwrap();
    assert_eq!(order.namespace.as_deref(), Some("urn:example:orders"));
    assert_eq!(order.text_at("header/number").unwrap(), "PO1");
    assert_eq!(order.text_at("date/period/value").unwrap(), "20240101");
    assert_eq!(order.find_children("party").len(), 2);
    assert_eq!(order.text_at("party[1]/nameAndAddress/function").unwrap(), "SU");

    let second = root.navigate("interchange/interchangeMessage[1]").unwrap();
    assert_eq!(second.text_at("order/header/number").unwrap(), "PO2");
    assert_eq!(second.text_at("UNT/segmentCount").unwrap(), "3");
    assert_eq!(root.text_at("interchange/UNZ/controlCount").unwrap(), "2");
}

#[test]
fn test_custom_service_string_advice() {
    let input = "UNA:*.? ~\
        UNB*UNOC:3*SENDER*RECEIVER*240101:1200*77~\
        UNH*1*ORDERS:D:96A:UN~\
        BGM*220*PO?*1~\
        UNT*3*1~\
        UNZ*1*77~";
    let (report, root) = parse(input, ReaderConfig::default());

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(
        root.text_at("interchange/interchangeMessage/order/header/number").unwrap(),
        "PO*1"
    );
}

#[test]
fn test_default_delimiters_without_advice() {
    let input = "UNB+UNOA:2+S+R+240101:1200+9'UNH+1+ORDERS:D:96A:UN'BGM+220+A?'B'UNT+3+1'UNZ+1+9'";
    let (report, root) = parse(input, ReaderConfig::default());

    assert!(report.diagnostics.is_empty());
    assert_eq!(
        root.text_at("interchange/interchangeMessage/order/header/number").unwrap(),
        "A'B"
    );
}

#[test]
fn test_functional_group() {
    let input = "UNB+UNOC:3+S+R+240101:1200+IC1'\
        UNG+ORDERS+APP1:ZZ+APP2:ZZ+240101:1200+G1+UN+D:96A'\
        UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+3+1'\
        UNH+2+ORDERS:D:96A:UN'BGM+220+PO2'UNT+3+2'\
        UNE+2+G1'\
        UNZ+1+IC1'";
    let (report, root) = parse(input, ReaderConfig::default());

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    let interchange = &report.interchanges[0];
    assert_eq!(interchange.group_count, 1);
    assert_eq!(interchange.groups[0].group_ref, "G1");
    assert_eq!(interchange.groups[0].message_count, 2);
    assert_eq!(interchange.groups[0].declared_count, Some(2));
    assert_eq!(interchange.control_count(), 1);

    assert_eq!(root.text_at("interchange/group/UNG/groupRef").unwrap(), "G1");
    assert_eq!(
        root.text_at("interchange/group/interchangeMessage[1]/order/header/number")
            .unwrap(),
        "PO2"
    );
    assert_eq!(root.text_at("interchange/group/UNE/controlCount").unwrap(), "2");
}

#[test]
fn test_unknown_message_passes_through() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'\
        UNH+1+INVOIC:D:96A:UN'BGM+380+INV1'DTM+137:20240101:102'UNT+4+1'\
        UNZ+1+1'";
    let (report, root) = parse(input, ReaderConfig::default());

    assert!(!report.diagnostics.has_fatal());
    let lookups: Vec<_> = report.diagnostics.of_kind(IssueKind::Lookup).collect();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].severity, Severity::Warning);
    assert!(!report.interchanges[0].messages[0].mapped);

    let message = root.navigate("interchange/interchangeMessage").unwrap();
    let segments = message.find_children("segment");
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].attribute("segcode"), Some("BGM"));
    assert_eq!(segments[0].text, "BGM+380+INV1");
    assert_eq!(segments[1].text, "DTM+137:20240101:102");
}

#[test]
fn test_unknown_message_is_fatal_when_validating() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'\
        UNH+1+INVOIC:D:96A:UN'BGM+380+INV1'UNT+3+1'\
        UNH+2+ORDERS:D:96A:UN'BGM+220+PO1'UNT+3+2'\
        UNZ+2+1'";
    let (report, root) = parse(input, ReaderConfig::new().validate(true));

    let fatal: Vec<_> = report.diagnostics.with_severity(Severity::Fatal).collect();
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].kind, IssueKind::Lookup);
    assert!(fatal[0].path.starts_with("interchange[1]/message[1]"));

    // The body of the skipped message produces no events
    let skipped = root.navigate("interchange/interchangeMessage").unwrap();
    assert!(skipped.find_child("segment").is_none());
    assert!(skipped.find_child("UNT").is_some());

    // Parsing continues with the next message
    assert_eq!(report.messages().count(), 2);
    assert_eq!(
        root.text_at("interchange/interchangeMessage[1]/order/header/number").unwrap(),
        "PO1"
    );
}

#[test]
fn test_control_count_mismatch() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'\
        UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+9+1'\
        UNZ+1+2'";
    let (report, _) = parse(input, ReaderConfig::default());

    let issues: Vec<_> = report.diagnostics.of_kind(IssueKind::ControlCount).collect();
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.severity == Severity::Error));
    assert!(issues[0].path.ends_with("segment[4:UNT]"));
    assert_eq!(report.interchanges[0].messages[0].declared_segment_count, Some(9));
}

#[test]
fn test_control_count_mismatch_is_error_in_strict_mode() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'\
        UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+9+1'\
        UNZ+1+1'";
    let mut tree = TreeBuilder::new();
    let result = parser(ReaderConfig::new().strict(true)).parse(input.as_bytes(), &mut tree);

    match result {
        Err(Error::Structure { segment_code, segment_number, .. }) => {
            assert_eq!(segment_code, "UNT");
            assert_eq!(segment_number, 4);
        }
        other => panic!("expected a structure error, got {other:?}"),
    }
}

#[test]
fn test_body_outside_message() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'BGM+220+PO1'UNZ+0+1'";
    let mut tree = TreeBuilder::new();
    let result = parser(ReaderConfig::default()).parse(input.as_bytes(), &mut tree);
    assert!(matches!(
        result,
        Err(Error::Structure { ref segment_code, .. }) if segment_code == "BGM"
    ));
}

#[test]
fn test_unterminated_interchange() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'";
    let mut tree = TreeBuilder::new();
    let result = parser(ReaderConfig::default()).parse(input.as_bytes(), &mut tree);
    assert!(matches!(result, Err(Error::Structure { .. })));
}

#[test]
fn test_unknown_syntax_identifier() {
    let input = "UNB+XXXX:3+S+R+240101:1200+1'UNZ+0+1'";
    let mut tree = TreeBuilder::new();
    let result = parser(ReaderConfig::default()).parse(input.as_bytes(), &mut tree);
    assert!(matches!(result, Err(Error::Structure { .. })));
}

#[test]
fn test_inexact_repertoire_is_reported() {
    let input = "UNB+UNOE:3+S+R+240101:1200+1'UNZ+0+1'";
    let (report, _) = parse(input, ReaderConfig::default());
    let syntax: Vec<_> = report.diagnostics.of_kind(IssueKind::Syntax).collect();
    assert_eq!(syntax.len(), 1);
    assert_eq!(syntax[0].severity, Severity::Warning);
}

#[test]
fn test_unexpected_body_segment() {
    let input = "UNB+UNOC:3+S+R+240101:1200+1'\
        UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'LIN+1'UNT+4+1'\
        UNZ+1+1'";
    let mut tree = TreeBuilder::new();
    let result = parser(ReaderConfig::default()).parse(input.as_bytes(), &mut tree);
    assert!(matches!(
        result,
        Err(Error::Mapping { ref segment_code, .. }) if segment_code == "LIN"
    ));
}

#[test]
fn test_consecutive_interchanges() -> anyhow::Result<()> {
    let single = "UNB+UNOC:3+S+R+240101:1200+A'UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+3+1'UNZ+1+A'";
    let input = format!("{single}\n{}", single.replace("+A'", "+B'"));
    let mut tree = TreeBuilder::new();
    let report = parser(ReaderConfig::default()).parse(input.as_bytes(), &mut tree)?;
    let root = tree.finish()?;

    assert_eq!(report.interchanges.len(), 2);
    assert_eq!(report.interchanges[1].control_ref, "B");
    assert!(report.diagnostics.is_empty());
    assert_eq!(root.find_children("interchange").len(), 2);
    assert_eq!(root.text_at("interchange[1]/UNZ/controlRef")?, "B");
    Ok(())
}

#[test]
fn test_indentation_does_not_change_tree() {
    let (_, plain) = parse(ORDERS_INTERCHANGE, ReaderConfig::default());
    let (_, indented) = parse(ORDERS_INTERCHANGE, ReaderConfig::new().indent(true));
    assert_eq!(plain, indented);
}

/// Records events and aborts once a given element starts
struct AbortOnElement {
    tree: TreeBuilder,
    handle: AbortHandle,
    trigger: &'static str,
}

impl ContentHandler for AbortOnElement {
    fn start_document(&mut self) -> edi_ir::Result<()> {
        self.tree.start_document()
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> edi_ir::Result<()> {
        if name.local_name == self.trigger {
            self.handle.abort();
        }
        self.tree.start_element(name, attributes)
    }

    fn characters(&mut self, text: &str) -> edi_ir::Result<()> {
        self.tree.characters(text)
    }

    fn end_element(&mut self, name: &QName) -> edi_ir::Result<()> {
        self.tree.end_element(name)
    }

    fn end_document(&mut self) -> edi_ir::Result<()> {
        self.tree.end_document()
    }
}

#[test]
fn test_abort_closes_open_elements() {
    let parser = parser(ReaderConfig::default());
    let mut handler = AbortOnElement {
        tree: TreeBuilder::new(),
        handle: parser.abort_handle(),
        trigger: "header",
    };
    let report = parser.parse(ORDERS_INTERCHANGE.as_bytes(), &mut handler).unwrap();

    assert!(report.is_aborted());
    assert_eq!(report.messages().count(), 0);
    let root = handler.tree.finish().unwrap();
    let order = root.navigate("interchange/interchangeMessage/order").unwrap();
    assert!(order.find_child("header").is_some());
    assert!(order.find_child("date").is_none());
}

#[test]
fn test_parser_is_reusable_after_abort() {
    let parser = parser(ReaderConfig::default());
    let mut handler = AbortOnElement {
        tree: TreeBuilder::new(),
        handle: parser.abort_handle(),
        trigger: "header",
    };
    let aborted = parser.parse(ORDERS_INTERCHANGE.as_bytes(), &mut handler).unwrap();
    assert!(aborted.is_aborted());
    assert!(!parser.abort_handle().is_aborted());

    let mut tree = TreeBuilder::new();
    let report = parser.parse(ORDERS_INTERCHANGE.as_bytes(), &mut tree).unwrap();
    assert_eq!(report.status, ParseStatus::Completed);
    assert_eq!(report.messages().count(), 2);
    assert!(tree.finish().is_ok());
}

/// Header-only model whose body may use its own delimiters
fn header_model(name: &str, tag: &str, body: Option<Delimiters>) -> Edimap {
    let group = SegmentGroupDef::new(tag).child(
        SegmentDef::new("BGM", "header")
            .truncatable(true)
            .field(
                FieldDef::new("docType")
                    .component(ComponentDef::new("code"))
                    .component(ComponentDef::new("list")),
            )
            .field(FieldDef::new("number")),
    );
    let mut def = EdimapDef::new(Description::new(name, "D:96A:UN"), group);
    def.override_delimiters = body.is_some();
    def.delimiters = body;
    Edimap::compile(def).unwrap()
}

#[test]
fn test_model_delimiters_apply_to_message_body_only() {
    let body = Delimiters::builder().field('*').component('^').build().unwrap();
    let registry = StaticMappingsRegistry::from_models([
        header_model("ORDERS", "order", Some(body)),
        header_model("INVOIC", "invoice", None),
    ]);
    let parser = InterchangeParser::new(Arc::new(registry)).unwrap();
    let input = "UNB+UNOC:3+SENDER+RECEIVER+240101:1200+REF9'\
        UNH+1+ORDERS:D:96A:UN'\
        BGM*220^X+Y*PO1'\
        UNT*3*1'\
        UNH+2+INVOIC:D:96A:UN'\
        BGM+380:Z*W+INV1'\
        UNT+3+2'\
        UNZ+2+REF9'";

    let mut tree = TreeBuilder::new();
    let report = parser.parse(input.as_bytes(), &mut tree).unwrap();
    assert_eq!(report.status, ParseStatus::Completed);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.messages().count(), 2);

    let root = tree.finish().unwrap();
    let order = root.navigate("interchange/interchangeMessage/order").unwrap();
    assert_eq!(order.text_at("header/docType/code").unwrap(), "220");
    assert_eq!(order.text_at("header/docType/list").unwrap(), "X+Y");
    assert_eq!(order.text_at("header/number").unwrap(), "PO1");
    assert_eq!(
        root.text_at("interchange/interchangeMessage/UNT/segmentCount").unwrap(),
        "3"
    );

    let invoice = root.navigate("interchange/interchangeMessage[1]/invoice").unwrap();
    assert_eq!(invoice.text_at("header/docType/code").unwrap(), "380");
    assert_eq!(invoice.text_at("header/docType/list").unwrap(), "Z*W");
    assert_eq!(invoice.text_at("header/number").unwrap(), "INV1");
    assert_eq!(root.text_at("interchange/UNZ/controlCount").unwrap(), "2");
}
