// src/pattern.rs
//
// Composable readers over the scanner.
//
// - `Pattern`: optional sticky start, optional sticky match, then read until
//   (or until after) a terminator.
// - `WhitespacePattern`: eats whitespace and remembers how many line breaks it
//   saw and what inline whitespace followed the last one.
// - `TemplatablePattern`: reads like `Pattern::until`, but a template region
//   ({{ }}, {% %}, <?php ?>, ...) is always consumed whole, even when it
//   contains the terminator.

use memchr::memchr2;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::options::{Options, Templating};
use crate::scanner::InputScanner;

/* ================================ Pattern ================================ */

#[derive(Clone, Copy, Default)]
pub(crate) struct Pattern {
    starting: Option<&'static Regex>,
    matching: Option<&'static Regex>,
    until: Option<&'static Regex>,
    until_after: bool,
}

impl Pattern {
    pub(crate) fn new() -> Self {
        Pattern::default()
    }

    pub(crate) fn starting_with(mut self, pattern: &'static Regex) -> Self {
        self.starting = Some(pattern);
        self
    }

    pub(crate) fn matching(mut self, pattern: &'static Regex) -> Self {
        self.matching = Some(pattern);
        self
    }

    pub(crate) fn until(mut self, pattern: &'static Regex) -> Self {
        self.until = Some(pattern);
        self.until_after = false;
        self
    }

    pub(crate) fn until_after(mut self, pattern: &'static Regex) -> Self {
        self.until = Some(pattern);
        self.until_after = true;
        self
    }

    pub(crate) fn read(&self, input: &mut InputScanner<'_>) -> String {
        let mut result = input.read(self.starting, None, false);
        if self.starting.is_none() || !result.is_empty() {
            result.push_str(&input.read(self.matching, self.until, self.until_after));
        }
        result
    }
}

/* =========================== Whitespace reader =========================== */

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t ]+").unwrap());

#[derive(Default)]
pub(crate) struct WhitespacePattern {
    pub(crate) newline_count: usize,
    pub(crate) whitespace_before_token: String,
}

impl WhitespacePattern {
    pub(crate) fn read(&mut self, input: &mut InputScanner<'_>) -> String {
        self.newline_count = 0;
        self.whitespace_before_token.clear();

        let Some(read) = input.match_at(&WHITESPACE) else {
            return String::new();
        };
        if read == " " {
            self.whitespace_before_token.push(' ');
            return read.to_string();
        }

        // "\r\n" counts as one break
        let bytes = read.as_bytes();
        let mut last_break_end = 0usize;
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    self.newline_count += 1;
                    last_break_end = i + 1;
                }
                b'\n' => {
                    self.newline_count += 1;
                    last_break_end = i + 1;
                }
                _ => {}
            }
            i += 1;
        }
        self.whitespace_before_token.push_str(&read[last_break_end..]);
        read.to_string()
    }
}

/* ============================ Template dialects ========================== */

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Dialects {
    pub(crate) php: bool,
    pub(crate) erb: bool,
    /// `{{ }}` interpolation; shares its delimiters with handlebars.
    pub(crate) angular: bool,
    pub(crate) handlebars: bool,
    pub(crate) django: bool,
    pub(crate) smarty: bool,
}

impl Dialects {
    #[cfg(test)]
    fn all() -> Self {
        Dialects {
            php: true,
            erb: true,
            angular: true,
            handlebars: true,
            django: true,
            smarty: true,
        }
    }
}

static PHP_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?(?:[= ]|php)").unwrap());
static PHP_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?>").unwrap());
static ERB_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<%[^%]").unwrap());
static ERB_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^%]%>").unwrap());
pub(crate) static HANDLEBARS_COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{!--").unwrap());
pub(crate) static HANDLEBARS_COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"--\}\}").unwrap());
static HANDLEBARS_UNESCAPED_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\{").unwrap());
static HANDLEBARS_UNESCAPED_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\}\}").unwrap());
pub(crate) static HANDLEBARS_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{").unwrap());
pub(crate) static HANDLEBARS_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\}").unwrap());
static DJANGO_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{%").unwrap());
static DJANGO_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"%\}").unwrap());
static DJANGO_COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{#").unwrap());
static DJANGO_COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\}").unwrap());
static SMARTY_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{").unwrap());
static SMARTY_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s]\}").unwrap());
static SMARTY_COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\*").unwrap());
static SMARTY_COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\}").unwrap());
static SMARTY_LITERAL_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{literal\}").unwrap());
static SMARTY_LITERAL_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{/literal\}").unwrap());

fn region(start: &'static Regex, end: &'static Regex) -> Pattern {
    Pattern::new().starting_with(start).until_after(end)
}

/// Does a template region of an enabled dialect start at byte `i`?
/// Exclusions do not apply here: an excluded dialect still ends a read.
fn template_starts_at(bytes: &[u8], i: usize, disabled: Dialects) -> bool {
    let at = |k: usize| bytes.get(i + k).copied();
    match bytes[i] {
        b'<' => {
            (!disabled.php
                && at(1) == Some(b'?')
                && (matches!(at(2), Some(b'=') | Some(b' ')) || bytes[i + 1..].starts_with(b"?php")))
                || (!disabled.erb && at(1) == Some(b'%') && at(2).is_some_and(|c| c != b'%'))
        }
        b'{' => {
            ((!disabled.handlebars || !disabled.angular) && at(1) == Some(b'{'))
                || (!disabled.django && matches!(at(1), Some(b'%') | Some(b'{') | Some(b'#')))
                || (!disabled.smarty
                    && at(1).is_some_and(|c| c != b'}' && c != b'{' && !c.is_ascii_whitespace()))
        }
        _ => false,
    }
}

/* ========================== Template-aware reader ======================== */

#[derive(Clone, Copy)]
pub(crate) struct TemplatablePattern {
    until: &'static Regex,
    until_after: bool,
    disabled: Dialects,
    excluded: Dialects,
}

impl TemplatablePattern {
    /// Reader stopping before `until`, with dialects enabled from `options`.
    pub(crate) fn until(until: &'static Regex, options: &Options) -> Self {
        TemplatablePattern {
            until,
            until_after: false,
            disabled: Dialects {
                php: !options.templating_enabled(Templating::Php),
                erb: !options.templating_enabled(Templating::Erb),
                angular: !options.templating_enabled(Templating::Angular),
                handlebars: !options.templating_enabled(Templating::Handlebars),
                django: !options.templating_enabled(Templating::Django),
                smarty: !options.templating_enabled(Templating::Smarty),
            },
            excluded: Dialects::default(),
        }
    }

    pub(crate) fn until_after(until: &'static Regex, options: &Options) -> Self {
        TemplatablePattern {
            until_after: true,
            ..TemplatablePattern::until(until, options)
        }
    }

    /// Stop at handlebars (and angular) regions instead of swallowing them.
    pub(crate) fn exclude_handlebars(mut self) -> Self {
        self.excluded.handlebars = true;
        self.excluded.angular = true;
        self
    }

    #[cfg(test)]
    fn with_all_disabled(mut self) -> Self {
        self.disabled = Dialects::all();
        self
    }

    pub(crate) fn read(&self, input: &mut InputScanner<'_>) -> String {
        let mut result = self.read_plain(input).to_string();
        let mut next = self.read_template(input);
        while !next.is_empty() {
            next.push_str(&self.read_plain(input));
            result.push_str(&next);
            next = self.read_template(input);
        }
        if self.until_after {
            result.push_str(input.read_until_after(self.until));
        }
        result
    }

    /// Read up to the terminator or the next template start, whichever is first.
    fn read_plain<'a>(&self, input: &mut InputScanner<'a>) -> &'a str {
        let rest = input.rest();
        let limit = self
            .until
            .find(rest)
            .map_or(rest.len(), |m| m.start());
        let bytes = rest.as_bytes();
        let mut stop = limit;
        let mut from = 0usize;
        while let Some(off) = memchr2(b'<', b'{', &bytes[from..limit]) {
            let i = from + off;
            if template_starts_at(bytes, i, self.disabled) {
                stop = i;
                break;
            }
            from = i + 1;
        }
        input.advance(stop)
    }

    fn read_template(&self, input: &mut InputScanner<'_>) -> String {
        let on = |d: fn(&Dialects) -> bool| !d(&self.disabled) && !d(&self.excluded);
        let mut result = String::new();
        match input.peek(0) {
            Some('<') => {
                let peek1 = input.peek(1);
                if on(|d| d.php) && peek1 == Some('?') {
                    result = region(&PHP_START, &PHP_END).read(input);
                }
                if result.is_empty() && on(|d| d.erb) && peek1 == Some('%') {
                    result = region(&ERB_START, &ERB_END).read(input);
                }
            }
            Some('{') => {
                if on(|d| d.handlebars) {
                    for (start, end) in [
                        (&HANDLEBARS_COMMENT_START, &HANDLEBARS_COMMENT_END),
                        (&HANDLEBARS_UNESCAPED_START, &HANDLEBARS_UNESCAPED_END),
                        (&HANDLEBARS_START, &HANDLEBARS_END),
                    ] {
                        if result.is_empty() {
                            result = region(start, end).read(input);
                        }
                    }
                }
                if result.is_empty() && on(|d| d.angular) {
                    result = region(&HANDLEBARS_START, &HANDLEBARS_END).read(input);
                }
                if !self.disabled.django {
                    // {{ }} belongs to handlebars when that dialect is excluded
                    if result.is_empty() && !self.excluded.django && !self.excluded.handlebars {
                        result = region(&HANDLEBARS_START, &HANDLEBARS_END).read(input);
                    }
                    if !self.excluded.django {
                        if result.is_empty() {
                            result = region(&DJANGO_COMMENT_START, &DJANGO_COMMENT_END).read(input);
                        }
                        if result.is_empty() {
                            result = region(&DJANGO_START, &DJANGO_END).read(input);
                        }
                    }
                }
                if !self.disabled.smarty && self.disabled.django && self.disabled.handlebars {
                    if result.is_empty() {
                        result = region(&SMARTY_COMMENT_START, &SMARTY_COMMENT_END).read(input);
                    }
                    if result.is_empty() {
                        result = region(&SMARTY_LITERAL_START, &SMARTY_LITERAL_END).read(input);
                    }
                    let opens_smarty = input
                        .peek(1)
                        .is_some_and(|c| c != '}' && c != '{' && !c.is_whitespace());
                    if result.is_empty() && opens_smarty {
                        result = region(&SMARTY_START, &SMARTY_END).read(input);
                    }
                }
            }
            _ => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static WORD_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t <]").unwrap());
    static QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"""#).unwrap());
    static GT: Lazy<Regex> = Lazy::new(|| Regex::new(r">").unwrap());

    #[test]
    fn whitespace_counts_breaks_and_trailing_indent() {
        let mut ws = WhitespacePattern::default();
        let mut input = InputScanner::new("\n\n   \t<a>");
        assert_eq!(ws.read(&mut input), "\n\n   \t");
        assert_eq!(ws.newline_count, 2);
        assert_eq!(ws.whitespace_before_token, "   \t");

        let mut input = InputScanner::new(" x");
        ws.read(&mut input);
        assert_eq!(ws.newline_count, 0);
        assert_eq!(ws.whitespace_before_token, " ");

        let mut input = InputScanner::new("x");
        assert_eq!(ws.read(&mut input), "");
        assert_eq!(ws.whitespace_before_token, "");
    }

    #[test]
    fn pattern_starting_with_gates_the_read() {
        let mut input = InputScanner::new("{{!-- note --}} rest");
        let comment = region(&HANDLEBARS_COMMENT_START, &HANDLEBARS_COMMENT_END);
        assert_eq!(comment.read(&mut input), "{{!-- note --}}");
        assert_eq!(comment.read(&mut input), "");
    }

    #[test]
    fn template_region_is_not_split() {
        let opts = Options::default().normalize();
        let word = TemplatablePattern::until(&WORD_END, &opts);
        let mut input = InputScanner::new("{% it's the <b> %}tail next");
        assert_eq!(word.read(&mut input), "{% it's the <b> %}tail");
    }

    #[test]
    fn excluded_handlebars_ends_the_word() {
        let opts = Options::default().normalize();
        let word = TemplatablePattern::until(&WORD_END, &opts).exclude_handlebars();
        let mut input = InputScanner::new("abc{{x y}}");
        assert_eq!(word.read(&mut input), "abc");
    }

    #[test]
    fn disabled_dialects_are_plain_text() {
        let opts = Options::default().normalize();
        let word = TemplatablePattern::until(&WORD_END, &opts).with_all_disabled();
        let mut input = InputScanner::new("{{a b}}");
        assert_eq!(word.read(&mut input), "{{a");
    }

    #[test]
    fn angular_interpolation_ends_the_word() {
        let opts = Options {
            templating: vec![Templating::Angular],
            ..Options::default()
        }
        .normalize();
        let word = TemplatablePattern::until(&WORD_END, &opts).exclude_handlebars();
        let mut input = InputScanner::new("abc{{ a }}");
        assert_eq!(word.read(&mut input), "abc");

        // without the exclusion the interpolation stays inside the word
        let word = TemplatablePattern::until(&WORD_END, &opts);
        let mut input = InputScanner::new("abc{{a}}def ghi");
        assert_eq!(word.read(&mut input), "abc{{a}}def");
    }

    #[test]
    fn template_regions_join_the_plain_text_around_them() {
        let opts = Options::default().normalize();
        let word = TemplatablePattern::until(&WORD_END, &opts);
        let mut input = InputScanner::new("a{%x%}b<?php y ?>c d");
        assert_eq!(word.read(&mut input), "a{%x%}b<?php y ?>c");
    }

    #[test]
    fn until_after_includes_terminator_past_templates() {
        let opts = Options::default().normalize();
        let value = TemplatablePattern::until_after(&QUOTE, &opts);
        let mut input = InputScanner::new(r#"a {{ "b" }} c" d"#);
        assert_eq!(value.read(&mut input), r#"a {{ "b" }} c""#);
    }

    #[test]
    fn php_region_inside_attribute() {
        let opts = Options::default().normalize();
        let attr = TemplatablePattern::until(&GT, &opts);
        let mut input = InputScanner::new("a <?php echo '>'; ?> b>");
        assert_eq!(attr.read(&mut input), "a <?php echo '>'; ?> b");
    }
}
