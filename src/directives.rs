// src/directives.rs
//
// `<!-- beautify key:value ... -->` comments. The only directive the tokenizer
// acts on is `ignore:start`, which turns everything up to the matching
// `<!-- beautify ignore:end -->` into one verbatim comment token.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::scanner::InputScanner;

static DIRECTIVES_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- beautify( \w+[:]\w+)+ -->").unwrap());
static DIRECTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r" (\w+)[:](\w+)").unwrap());
static IGNORE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\sbeautify\signore:end\s-->").unwrap());

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directives {
    values: HashMap<String, String>,
}

impl Directives {
    /// Directives carried by `comment`, if it is a directive block.
    pub fn parse(comment: &str) -> Option<Directives> {
        let block = DIRECTIVES_BLOCK.find(comment)?;
        let values = DIRECTIVE
            .captures_iter(block.as_str())
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();
        Some(Directives { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn starts_ignore(&self) -> bool {
        self.get("ignore") == Some("start")
    }
}

/// Consume verbatim through the closing `ignore:end` comment (or to the end).
pub(crate) fn read_ignored<'a>(input: &mut InputScanner<'a>) -> &'a str {
    input.read_until_after(&IGNORE_END)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let d = Directives::parse("<!-- beautify ignore:start preserve:yes -->").unwrap();
        assert!(d.starts_ignore());
        assert_eq!(d.get("preserve"), Some("yes"));
    }

    #[test]
    fn plain_comment_has_no_directives() {
        assert_eq!(Directives::parse("<!-- just a note -->"), None);
        assert_eq!(Directives::parse("<!-- beautify -->"), None);
    }

    #[test]
    fn ignored_region_runs_through_end_marker() {
        let mut input = InputScanner::new("  a   b\n<!-- beautify ignore:end --><p>");
        assert_eq!(
            read_ignored(&mut input),
            "  a   b\n<!-- beautify ignore:end -->"
        );
        assert_eq!(input.rest(), "<p>");
    }
}
