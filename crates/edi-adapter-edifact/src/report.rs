//! Outcome of a parse: status, diagnostics and envelope summaries

use edi_schema::Description;
use edi_validation::ValidationReport;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    /// All input was consumed
    Completed,
    /// Stopped at a segment boundary on request
    Aborted,
}

/// Control information for one UNB..UNZ interchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterchangeSummary {
    pub control_ref: String,
    /// Count declared in the UNZ trailer
    pub declared_count: Option<usize>,
    pub message_count: usize,
    pub group_count: usize,
    pub groups: Vec<GroupSummary>,
    pub messages: Vec<MessageSummary>,
}

impl InterchangeSummary {
    /// The count UNZ must carry: groups when groups are used, else messages
    pub fn control_count(&self) -> usize {
        if self.group_count > 0 {
            self.group_count
        } else {
            self.message_count
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group_ref: String,
    /// Message count declared in the UNE trailer
    pub declared_count: Option<usize>,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub message_ref: String,
    #[serde(serialize_with = "serialize_description")]
    pub description: Description,
    /// Segment count declared in the UNT trailer
    pub declared_segment_count: Option<usize>,
    /// Segments from UNH to UNT inclusive
    pub segment_count: usize,
    /// Whether a mapping model decoded the body
    pub mapped: bool,
}

fn serialize_description<S: serde::Serializer>(
    description: &Description,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(description)
}

#[derive(Debug, Clone)]
pub struct ParseReport {
    pub status: ParseStatus,
    pub diagnostics: ValidationReport,
    pub interchanges: Vec<InterchangeSummary>,
    /// Segments read, envelope segments included
    pub segment_count: usize,
}

impl ParseReport {
    pub fn is_aborted(&self) -> bool {
        self.status == ParseStatus::Aborted
    }

    /// Messages across all interchanges
    pub fn messages(&self) -> impl Iterator<Item = &MessageSummary> {
        self.interchanges.iter().flat_map(|i| i.messages.iter())
    }
}
