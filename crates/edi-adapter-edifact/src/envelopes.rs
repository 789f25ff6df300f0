//! UN/EDIFACT service segments (UNB/UNZ, UNG/UNE, UNH/UNT)
//!
//! The envelope is described with the same mapping model as message
//! bodies, so control segments are mapped by the ordinary field mapper.
//! This module also pulls the control values (references, counts, message
//! identifier) out of tokenized service segments.

use crate::tokenizer::{split_on, unescape};
use crate::Result;
use edi_schema::{
    ComponentDef, Delimiters, Description, Edimap, EdimapDef, FieldDef, SegmentDef,
    SegmentGroupDef,
};

/// Namespace of envelope elements
pub const ENVELOPE_NAMESPACE: &str = "urn:edi:unedifact:v41";

/// Prefix bound to [`ENVELOPE_NAMESPACE`] on the root element
pub const ENVELOPE_PREFIX: &str = "env";

fn simple(xmltag: &str) -> FieldDef {
    FieldDef::new(xmltag)
}

fn composite(xmltag: &str, components: &[&str]) -> FieldDef {
    components
        .iter()
        .fold(FieldDef::new(xmltag).truncatable(true), |field, c| {
            field.component(ComponentDef::new(*c))
        })
}

fn service_segment(code: &str, fields: Vec<FieldDef>) -> SegmentDef {
    fields.into_iter().fold(
        SegmentDef::new(code, code)
            .truncatable(true)
            .ignore_unmapped_fields(true),
        SegmentDef::field,
    )
}

/// Envelope model for syntax version 4.1
pub fn un_edifact_v41() -> Result<Edimap> {
    let party = ["id", "codeQualifier", "internalId", "internalSubId"];
    let application = ["id", "codeQualifier"];
    let date_time = ["date", "time"];

    let unb = service_segment(
        "UNB",
        vec![
            composite(
                "syntaxIdentifier",
                &["id", "versionNum", "serviceCodeListDirVersion", "charEncoding"],
            ),
            composite("sender", &party),
            composite("recipient", &party),
            composite("dateTime", &date_time),
            simple("controlRef"),
            composite("recipientRef", &["ref", "refQualifier"]),
            simple("applicationRef"),
            simple("processingPriorityCode"),
            simple("ackRequest"),
            simple("agreementId"),
            simple("testIndicator"),
        ],
    );
    let unz = service_segment("UNZ", vec![simple("controlCount"), simple("controlRef")]);
    let ung = service_segment(
        "UNG",
        vec![
            simple("messageGroupId"),
            composite("senderApp", &application),
            composite("recipientApp", &application),
            composite("dateTime", &date_time),
            simple("groupRef"),
            simple("controllingAgencyCode"),
            composite("messageVersion", &["versionNum", "releaseNum", "associationCode"]),
            simple("password"),
        ],
    );
    let une = service_segment("UNE", vec![simple("controlCount"), simple("groupRef")]);
    let unh = service_segment(
        "UNH",
        vec![
            simple("messageRef"),
            composite(
                "messageIdentifier",
                &[
                    "id",
                    "versionNum",
                    "releaseNum",
                    "controllingAgencyCode",
                    "associationAssignedCode",
                    "codeListDirVersion",
                    "typeSubFunctionId",
                ],
            ),
            simple("commonAccessRef"),
            composite("transferStatus", &["sequence", "firstAndLast"]),
        ],
    );
    let unt = service_segment("UNT", vec![simple("segmentCount"), simple("messageRef")]);

    let root = [unb, unz, ung, une, unh, unt]
        .into_iter()
        .fold(SegmentGroupDef::new("unEdifact"), SegmentGroupDef::child);

    let description = Description::new("UN-EDIFACT-ENVELOPE", "4.1").with_namespace(ENVELOPE_NAMESPACE);
    let mut def = EdimapDef::new(description, root);
    def.namespace_prefix = Some(ENVELOPE_PREFIX.to_string());
    Ok(Edimap::compile(def)?)
}

/// Unescaped component `component` of field `field` (0 is the segment code)
pub fn component_value(
    fields: &[String],
    field: usize,
    component: usize,
    delimiters: &Delimiters,
) -> Option<String> {
    let raw = fields.get(field)?;
    let components = split_on(raw, delimiters.component(), delimiters.escape());
    components
        .get(component)
        .map(|c| unescape(c, delimiters.escape()))
        .filter(|v| !v.is_empty())
}

/// Simple field value, unescaped
pub fn field_value(fields: &[String], field: usize, delimiters: &Delimiters) -> Option<String> {
    fields
        .get(field)
        .map(|f| unescape(f, delimiters.escape()))
        .filter(|v| !v.is_empty())
}

/// Numeric control count
pub fn count_value(fields: &[String], field: usize, delimiters: &Delimiters) -> Option<usize> {
    field_value(fields, field, delimiters)?.trim().parse().ok()
}

/// Message type identifier from the UNH S009 composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIdentifier {
    /// e.g. `ORDERS`
    pub message_type: String,
    /// e.g. `D`
    pub version: String,
    /// e.g. `96A`
    pub release: String,
    /// e.g. `UN`
    pub agency: String,
}

impl MessageIdentifier {
    /// Read the identifier from UNH field tokens
    pub fn from_unh(fields: &[String], delimiters: &Delimiters) -> Option<Self> {
        let part = |i| component_value(fields, 2, i, delimiters).unwrap_or_default();
        let message_type = component_value(fields, 2, 0, delimiters)?;
        Some(Self {
            message_type,
            version: part(1),
            release: part(2),
            agency: part(3),
        })
    }

    /// Registry key: name is the message type, version is
    /// `version:release:agency`
    pub fn description(&self) -> Description {
        Description::new(
            self.message_type.clone(),
            format!("{}:{}:{}", self.version, self.release, self.agency),
        )
    }
}
