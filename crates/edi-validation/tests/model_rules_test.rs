//! Value rules applied to nodes of a loaded mapping model

use edi_schema::{Edimap, EdimapLoader, NodeId, ValueNode};
use edi_validation::{IssueKind, Severity, ValidationIssue, ValidationReport, validate_value};

const INVOIC_MODEL: &str = r#"
{
    "description": {"name": "INVOIC", "version": "D:96A:UN"},
    "segments": {
        "xmltag": "invoice",
        "segments": [
            {"segment": {
                "segcode": "BGM",
                "xmltag": "header",
                "fields": [
                    {"xmltag": "docType", "components": [
                        {"xmltag": "code", "required": true, "pattern": "[0-9]{3}"}
                    ]},
                    {"xmltag": "number", "max_length": 10}
                ]
            }},
            {"segment": {
                "segcode": "DTM",
                "xmltag": "date",
                "fields": [
                    {"xmltag": "period", "components": [
                        {"xmltag": "qualifier"},
                        {"xmltag": "value", "data_type": "Date", "parameters": {"format": "yyMMdd"}}
                    ]}
                ]
            }},
            {"segment": {
                "segcode": "MOA",
                "xmltag": "amount",
                "fields": [
                    {"xmltag": "monetary", "components": [
                        {"xmltag": "qualifier", "data_type": "Integer"},
                        {"xmltag": "value", "data_type": "Decimal"}
                    ]}
                ]
            }}
        ]
    }
}
"#;

fn model() -> Edimap {
    EdimapLoader::new().load_from_json(INVOIC_MODEL).unwrap()
}

fn segment_field(model: &Edimap, segcode: &str, index: usize) -> NodeId {
    let segment = model.top_level_segment(segcode).unwrap();
    model.node(segment).as_segment().unwrap().fields[index]
}

fn component_value<'m>(model: &'m Edimap, segcode: &str, field: usize, component: usize) -> &'m ValueNode {
    let field = segment_field(model, segcode, field);
    let component = model.node(field).as_field().unwrap().components[component];
    &model.node(component).as_component().unwrap().value
}

#[test]
fn test_component_rules() {
    let model = model();
    let code = component_value(&model, "BGM", 0, 0);

    assert!(validate_value("380", code, '.').is_empty());
    assert_eq!(validate_value("", code, '.'), vec!["Required value is missing"]);
    assert_eq!(validate_value("38A", code, '.').len(), 1);
}

#[test]
fn test_field_length() {
    let model = model();
    let number = &model.node(segment_field(&model, "BGM", 1)).as_field().unwrap().value;

    assert!(validate_value("INV0001", number, '.').is_empty());
    assert_eq!(validate_value("INV000000001", number, '.').len(), 1);
    assert!(validate_value("", number, '.').is_empty());
}

#[test]
fn test_date_layout_parameter() {
    let model = model();
    let value = component_value(&model, "DTM", 0, 1);

    assert!(validate_value("240131", value, '.').is_empty());
    assert_eq!(validate_value("20240131", value, '.').len(), 1);
    assert_eq!(validate_value("241331", value, '.').len(), 1);
}

#[test]
fn test_decimal_mark() {
    let model = model();
    let qualifier = component_value(&model, "MOA", 0, 0);
    let value = component_value(&model, "MOA", 0, 1);

    assert!(validate_value("79", qualifier, '.').is_empty());
    assert!(validate_value("1250.75", value, '.').is_empty());
    assert!(validate_value("1250,75", value, ',').is_empty());
    assert_eq!(validate_value("1250.75", value, ',').len(), 1);
}

#[test]
fn test_collecting_failures() {
    let model = model();
    let checks = [
        ("BGM", 0, 0, "3X0"),
        ("DTM", 0, 1, "240230"),
        ("MOA", 0, 1, "12.5"),
    ];

    let mut report = ValidationReport::new();
    for (number, (segcode, field, component, text)) in checks.into_iter().enumerate() {
        let node = component_value(&model, segcode, field, component);
        for message in validate_value(text, node, '.') {
            report.push(ValidationIssue::new(
                Severity::Error,
                IssueKind::Validation,
                format!("message[1]/segment[{}:{segcode}]/field[{}]", number + 1, field + 1),
                number + 1,
                message,
            ));
        }
    }

    assert_eq!(report.len(), 2);
    assert!(report.has_errors());
    assert!(!report.has_fatal());
    let paths: Vec<_> = report.issues().iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["message[1]/segment[1:BGM]/field[1]", "message[1]/segment[2:DTM]/field[1]"]);
}
