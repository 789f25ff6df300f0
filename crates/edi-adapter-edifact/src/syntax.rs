//! EDIFACT service string advice (UNA) and syntax identifiers
//!
//! The UNA segment, when present, is the first thing in an interchange and
//! redefines the separators for everything up to the matching UNZ. The UNB
//! syntax identifier selects the character repertoire the reader decodes.

use crate::{Error, Result};
use edi_schema::Delimiters;

/// Segment code of the service string advice
pub const SERVICE_STRING_ADVICE: &str = "UNA";

/// Number of characters following `UNA`
pub const UNA_ADVICE_LENGTH: usize = 6;

/// Parse the six advice characters following `UNA`.
///
/// Positions: component separator, field separator, decimal mark, release
/// character, repetition separator, segment terminator. A space in the
/// release or repetition position means the feature is not used.
pub fn delimiters_from_una(advice: &str) -> Result<Delimiters> {
    let advice = advice.strip_prefix(SERVICE_STRING_ADVICE).unwrap_or(advice);
    let chars: Vec<char> = advice.chars().take(UNA_ADVICE_LENGTH).collect();
    let &[component, field, decimal, release, repeat, segment] = chars.as_slice() else {
        return Err(Error::Syntax(format!(
            "UNA service string advice needs {UNA_ADVICE_LENGTH} characters, got '{advice}'"
        )));
    };

    let optional = |c: char| (c != ' ').then_some(c);

    Delimiters::builder()
        .component(component)
        .field(field)
        .decimal(decimal)
        .escape(optional(release))
        .field_repeat(optional(repeat))
        .segment(segment)
        .build()
        .map_err(|e| Error::Syntax(format!("UNA service string advice '{advice}': {e}")))
}

/// Create a UNA segment (without trailing newline) from a delimiter set
#[cfg(test)]
fn to_una(delimiters: &Delimiters) -> String {
    let mut una = String::from(SERVICE_STRING_ADVICE);
    una.push(delimiters.component());
    una.push(delimiters.field());
    una.push(delimiters.decimal());
    una.push(delimiters.escape().unwrap_or(' '));
    una.push(delimiters.field_repeat().unwrap_or(' '));
    una.push(delimiters.segment());
    una
}

/// Character decoding used by the segment reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// 7-bit; bytes above 0x7F decode to U+FFFD
    Ascii,
    /// ISO-8859-1
    Latin1,
    #[default]
    Utf8,
}

/// Decoding selected by a UNB syntax identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repertoire {
    pub encoding: Encoding,
    /// `false` when the repertoire is known but only approximated
    pub exact: bool,
}

/// Resolve a syntax identifier (`UNOA`, `UNOC`, ...) to its decoding.
///
/// Returns `None` for identifiers that are not EDIFACT repertoires.
pub fn repertoire(syntax_identifier: &str) -> Option<Repertoire> {
    let exact = |encoding| Some(Repertoire { encoding, exact: true });
    match syntax_identifier {
        "UNOA" | "UNOB" => exact(Encoding::Ascii),
        "UNOC" => exact(Encoding::Latin1),
        "UNOW" | "UNOY" => exact(Encoding::Utf8),
        "UNOD" | "UNOE" | "UNOF" | "UNOG" | "UNOH" | "UNOI" | "UNOJ" | "UNOK" | "UNOX" => {
            Some(Repertoire {
                encoding: Encoding::Utf8,
                exact: false,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_una_parsing() {
        let d = delimiters_from_una("UNA:+.? '").unwrap();
        assert_eq!(d, Delimiters::UN_EDIFACT);
    }

    #[test]
    fn test_una_custom_separators() {
        let d = delimiters_from_una("*=,#^~").unwrap();
        assert_eq!(d.component(), '*');
        assert_eq!(d.field(), '=');
        assert_eq!(d.decimal(), ',');
        assert_eq!(d.escape(), Some('#'));
        assert_eq!(d.field_repeat(), Some('^'));
        assert_eq!(d.segment(), '~');
    }

    #[test]
    fn test_una_without_release_character() {
        let d = delimiters_from_una(":+.  '").unwrap();
        assert_eq!(d.escape(), None);
        assert_eq!(d.field_repeat(), None);
    }

    #[test]
    fn test_una_malformed() {
        assert!(matches!(delimiters_from_una("UNA:+."), Err(Error::Syntax(_))));
        assert!(matches!(delimiters_from_una("::.? '"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_una_round_trip() {
        let d = delimiters_from_una("*=,#^~").unwrap();
        assert_eq!(to_una(&d), "UNA*=,#^~");
        assert_eq!(to_una(&Delimiters::UN_EDIFACT), "UNA:+.? '");
    }

    #[test]
    fn test_repertoire_codes() {
        assert_eq!(repertoire("UNOA").unwrap().encoding, Encoding::Ascii);
        assert_eq!(repertoire("UNOC").unwrap().encoding, Encoding::Latin1);
        assert_eq!(repertoire("UNOY").unwrap().encoding, Encoding::Utf8);
        assert!(!repertoire("UNOE").unwrap().exact);
        assert!(repertoire("ABCD").is_none());
    }
}
