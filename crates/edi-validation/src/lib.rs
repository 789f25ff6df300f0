#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Field value rules and diagnostics for EDI parsing.
//!
//! This crate decodes field values against the datatypes declared in a
//! mapping model (integer, decimal with a configurable decimal mark,
//! dates and times with layouts, booleans), checks length and pattern
//! constraints, and provides the issue types parsers use to report
//! recoverable problems.
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_schema::DataType;
//! use edi_validation::{DecodedValue, decode};
//!
//! let value = decode("12,5", DataType::Decimal, ',', None).unwrap();
//! assert_eq!(value, DecodedValue::Decimal(12.5));
//! ```

pub mod reporter;
pub mod rules;

pub use reporter::{IssueKind, Severity, ValidationIssue, ValidationReport};
pub use rules::{
    DecodedValue, RuleResult, decode, validate_length, validate_pattern, validate_required,
    validate_value,
};
