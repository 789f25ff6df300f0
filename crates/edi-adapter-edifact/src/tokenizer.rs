//! Escape-aware tokenizer and its inverse
//!
//! `split` breaks a segment, field or component into tokens on one
//! delimiter while honouring the release (escape) sequence. Escapes in
//! front of anything but the split delimiter are kept in the token, so a
//! later split at a finer level still sees them; [`unescape`] removes them
//! once a leaf value is reached.

use edi_schema::{DelimiterType, Delimiters};

enum Run {
    Plain(String),
    Escape,
    Delimiter,
}

/// Split `value` on `delimiter`, honouring `escape`.
///
/// `None` input yields `None`. Without a delimiter the input is split on
/// runs of whitespace and the escape is ignored. Empty tokens, including a
/// trailing one after a final delimiter, are preserved.
pub fn split(value: Option<&str>, delimiter: Option<&str>, escape: Option<&str>) -> Option<Vec<String>> {
    let value = value?;
    if value.is_empty() {
        return Some(Vec::new());
    }

    match delimiter.filter(|d| !d.is_empty()) {
        None => Some(value.split_whitespace().map(str::to_string).collect()),
        Some(delimiter) => Some(split_escaped(value, delimiter, escape.filter(|e| !e.is_empty()))),
    }
}

/// [`split`] on single characters, the form used by the reader and mapper
pub fn split_on(value: &str, delimiter: char, escape: Option<char>) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    let mut delimiter_buf = [0u8; 4];
    let mut escape_buf = [0u8; 4];
    let escape = escape.map(|e| &*e.encode_utf8(&mut escape_buf));
    split_escaped(value, delimiter.encode_utf8(&mut delimiter_buf), escape)
}

fn split_escaped(value: &str, delimiter: &str, escape: Option<&str>) -> Vec<String> {
    let runs = scan_runs(value, delimiter, escape);
    let escape = escape.unwrap_or_default();

    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut escaping = false;
    let mut delimiter_last = false;

    for run in runs {
        delimiter_last = false;

        // An escape only takes effect in front of a delimiter; anywhere
        // else it stays in the token for the next level down.
        if escaping && !matches!(run, Run::Delimiter) {
            token.push_str(escape);
        }

        match run {
            Run::Plain(text) => token.push_str(&text),
            Run::Delimiter if escaping => token.push_str(delimiter),
            Run::Delimiter => {
                tokens.push(std::mem::take(&mut token));
                delimiter_last = true;
            }
            Run::Escape if escaping => token.push_str(escape),
            Run::Escape => {
                escaping = true;
                continue;
            }
        }
        escaping = false;
    }

    if !token.is_empty() || delimiter_last {
        tokens.push(token);
    }
    tokens
}

/// Break `value` into plain text, delimiter and escape runs.
///
/// The delimiter is recognised before the escape when both end at the
/// same position.
fn scan_runs(value: &str, delimiter: &str, escape: Option<&str>) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut buffer = String::new();

    for c in value.chars() {
        buffer.push(c);

        let marker = if buffer.ends_with(delimiter) {
            Some((delimiter.len(), Run::Delimiter))
        } else {
            escape
                .filter(|e| buffer.ends_with(e))
                .map(|e| (e.len(), Run::Escape))
        };

        if let Some((len, run)) = marker {
            buffer.truncate(buffer.len() - len);
            if !buffer.is_empty() {
                runs.push(Run::Plain(std::mem::take(&mut buffer)));
            }
            runs.push(run);
        }
    }

    if !buffer.is_empty() {
        runs.push(Run::Plain(buffer));
    }
    runs
}

/// Remove release characters from a leaf value.
///
/// Each escape takes the following character literally; a trailing lone
/// escape is dropped.
pub fn unescape(value: &str, escape: Option<char>) -> String {
    let Some(escape) = escape else {
        return value.to_string();
    };
    if !value.contains(escape) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Separators that count as "empty" when truncating at `level`
fn removable_separators(level: DelimiterType, delimiters: &Delimiters) -> Vec<char> {
    let levels: &[DelimiterType] = match level {
        DelimiterType::Segment => &[
            DelimiterType::Segment,
            DelimiterType::Field,
            DelimiterType::FieldRepeat,
            DelimiterType::Component,
            DelimiterType::SubComponent,
        ],
        DelimiterType::Field => &[
            DelimiterType::Field,
            DelimiterType::FieldRepeat,
            DelimiterType::Component,
            DelimiterType::SubComponent,
        ],
        DelimiterType::FieldRepeat => &[
            DelimiterType::FieldRepeat,
            DelimiterType::Component,
            DelimiterType::SubComponent,
        ],
        DelimiterType::Component => &[DelimiterType::Component, DelimiterType::SubComponent],
        DelimiterType::SubComponent => &[DelimiterType::SubComponent],
        DelimiterType::DecimalSeparator => &[],
    };
    levels.iter().filter_map(|l| delimiters.get(*l)).collect()
}

fn is_removable(token: &str, level: DelimiterType, separators: &[char]) -> bool {
    if level == DelimiterType::DecimalSeparator {
        return false;
    }
    token.chars().all(|c| separators.contains(&c))
}

/// Join tokens, dropping the trailing tokens that carry no data at `level`.
///
/// A trailing token is dropped while it is empty or made only of
/// separators at or below `level`; truncation stops at the first token
/// holding anything else. Nothing is truncated at the decimal separator
/// level, and the decimal mark never counts as a separator.
pub fn concat_and_truncate<S: AsRef<str>>(
    tokens: &[S],
    level: DelimiterType,
    delimiters: &Delimiters,
) -> String {
    let separators = removable_separators(level, delimiters);
    let keep = tokens
        .iter()
        .rposition(|t| !is_removable(t.as_ref(), level, &separators))
        .map_or(0, |i| i + 1);

    tokens[..keep].iter().map(AsRef::as_ref).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str, delimiter: &str, escape: Option<&str>) -> Vec<String> {
        split(Some(value), Some(delimiter), escape).unwrap()
    }

    #[test]
    fn test_split_none_propagation() {
        assert_eq!(split(None, Some(":"), Some("?")), None);
        assert_eq!(split(Some(""), None, None), Some(vec![]));
        assert_eq!(split(Some(""), Some(":"), None), Some(vec![]));
    }

    #[test]
    fn test_split_whitespace() {
        assert_eq!(
            split(Some("abc def"), None, None),
            Some(vec!["abc".to_string(), "def".to_string()])
        );
        assert_eq!(
            split(Some("  abc \t def \n"), None, Some("?")),
            Some(vec!["abc".to_string(), "def".to_string()])
        );
        assert_eq!(s("abc  def", " ", None), vec!["abc", "", "def"]);
    }

    #[test]
    fn test_split_preserves_empty_tokens() {
        assert_eq!(s("ab:cd:ef::", ":", None), vec!["ab", "cd", "ef", "", ""]);
        assert_eq!(s(":cd:ef:", ":", None), vec!["", "cd", "ef", ""]);
        assert_eq!(s("::cd:ef", ":", None), vec!["", "", "cd", "ef"]);
        assert_eq!(s("ab::", ":", None), vec!["ab", "", ""]);
        assert_eq!(s(":", ":", None), vec![""]);
    }

    #[test]
    fn test_split_escape_golden_vectors() {
        assert_eq!(
            s("first?::second??:third", ":", Some("?")),
            vec!["first:", "second??", "third"]
        );
        assert_eq!(
            s("ATS+hep:iee+hai??+kai=haikai+slut", "+", Some("?")),
            vec!["ATS", "hep:iee", "hai??", "kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS+hep:iee+hai?#?#+kai=haikai+slut", "+", Some("?#")),
            vec!["ATS", "hep:iee", "hai?#?#", "kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS+#hep:iee+#hai?#?#+#kai=haikai+#slut", "+#", Some("?#")),
            vec!["ATS", "hep:iee", "hai?#?#", "kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS+#hep:iee+#hai??+#kai=haikai+#slut", "+#", Some("?")),
            vec!["ATS", "hep:iee", "hai??", "kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS+#hep:iee+#hai??+#kai=haikai+#slut", "+#", None),
            vec!["ATS", "hep:iee", "hai??", "kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS+hep:iee+hai??#+kai=haikai+slut", "+", Some("?#")),
            vec!["ATS", "hep:iee", "hai?+kai=haikai", "slut"]
        );
        assert_eq!(
            s("ATS++#hep:iee+#hai?+#kai=haikai+#slut", "+#", Some("?")),
            vec!["ATS+", "hep:iee", "hai+#kai=haikai", "slut"]
        );
    }

    #[test]
    fn test_split_escape_before_other_character_is_kept() {
        assert_eq!(s("a?:b+c", "+", Some("?")), vec!["a?:b", "c"]);
        assert_eq!(split_on("a?:b:c", ':', Some('?')), vec!["a:b", "c"]);
    }

    #[test]
    fn test_split_trailing_lone_escape_dropped() {
        assert_eq!(s("ab?", ":", Some("?")), vec!["ab"]);
        // A dangling escape also cancels the empty token after a final delimiter
        assert_eq!(s("ab:?", ":", Some("?")), vec!["ab"]);
        assert_eq!(s("ab:??", ":", Some("?")), vec!["ab", "??"]);
    }

    #[test]
    fn test_split_escape_runs() {
        // Pairs of escapes stay in the token; only an odd escape directly in
        // front of the delimiter protects it.
        for n in 0..8 {
            let escapes = "?".repeat(n);
            let input = format!("a{escapes}:b");
            let tokens = s(&input, ":", Some("?"));
            if n % 2 == 0 {
                assert_eq!(tokens, vec![format!("a{escapes}"), "b".to_string()], "n = {n}");
            } else {
                let kept = "?".repeat(n - 1);
                assert_eq!(tokens, vec![format!("a{kept}:b")], "n = {n}");
            }
        }
    }

    #[test]
    fn test_split_escape_run_then_unescape_round_trips() {
        let d = Delimiters::default();
        for text in ["plain", "a+b", "x?y", "q:'+?", "??::++''"] {
            let field = format!("{}+{}", d.escape_text(text), d.escape_text(text));
            let tokens = split_on(&field, '+', Some('?'));
            assert_eq!(tokens.len(), 2, "{field}");
            for token in tokens {
                let components = split_on(&token, ':', Some('?'));
                let joined: Vec<String> =
                    components.iter().map(|c| unescape(c, Some('?'))).collect();
                assert_eq!(joined.join(":"), text, "{field}");
            }
        }
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a?+b??c?", Some('?')), "a+b?c");
        assert_eq!(unescape("a?+b", None), "a?+b");
    }

    #[test]
    fn test_concat_and_truncate_golden_vectors() {
        let d = Delimiters::default();
        assert_eq!(concat_and_truncate(&["a", "b", "+:+"], DelimiterType::Segment, &d), "ab");
        assert_eq!(
            concat_and_truncate(&["a", "+:+", "b", "+:+"], DelimiterType::Segment, &d),
            "a+:+b"
        );
        assert_eq!(
            concat_and_truncate(&["a", "+:+", "b", "c+:+"], DelimiterType::Segment, &d),
            "a+:+bc+:+"
        );
        assert_eq!(concat_and_truncate(&["a", "b", "+:+"], DelimiterType::Field, &d), "ab");
        assert_eq!(
            concat_and_truncate(&["a", "b", "+:+'"], DelimiterType::Field, &d),
            "ab+:+'"
        );
        assert_eq!(
            concat_and_truncate(&["a", "b", "+:+"], DelimiterType::Component, &d),
            "ab+:+"
        );
    }

    #[test]
    fn test_concat_and_truncate_empty_tokens() {
        let d = Delimiters::default();
        assert_eq!(concat_and_truncate(&["a", "", ""], DelimiterType::Component, &d), "a");
        assert_eq!(concat_and_truncate::<&str>(&[], DelimiterType::Field, &d), "");
        assert_eq!(concat_and_truncate(&["", ":"], DelimiterType::Component, &d), "");
    }

    #[test]
    fn test_concat_and_truncate_decimal_is_data() {
        let d = Delimiters::default();
        assert_eq!(concat_and_truncate(&["1", "."], DelimiterType::Segment, &d), "1.");
        assert_eq!(concat_and_truncate(&["1", "."], DelimiterType::Field, &d), "1.");
        assert_eq!(concat_and_truncate(&["1", ":."], DelimiterType::Component, &d), "1:.");
        assert_eq!(
            concat_and_truncate(&["1", ""], DelimiterType::DecimalSeparator, &d),
            "1"
        );
    }
}
