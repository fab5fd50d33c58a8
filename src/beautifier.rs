// src/beautifier.rs
//
// Formatting engine.
//
// - Walks the token stream once. Every start tag gets a `TagInfo` in an arena;
//   the tag stack holds arena ids so end tags (written or implied) can restore
//   the indent level their start tag saw.
// - Line breaks come from three places: preserved input newlines, block-level
//   tag placement, and wrapping at wrap points in the output sink.
// - Unformatted elements and their end tags are copied verbatim; script/style
//   bodies go to a registered sub-formatter (or are just reindented), and
//   embedded html re-enters this engine one level deeper.

use std::borrow::Cow;

use memchr::memchr;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::embedded::{self, Body, EmbeddedLanguage};
use crate::error::{Error, Result};
use crate::optional_end::{self, Parent};
use crate::options::{IndentScripts, Options, WrapAttributes};
use crate::output::Output;
use crate::tag_stack::{TagId, TagStack};
use crate::tokenizer::{Token, TokenId, TokenKind, TokenStream, Tokenizer};

/// Formatter for an embedded language. Receives the body already prefixed with
/// the indentation of its first line, and options with `eol` set to `"\n"`.
pub trait SubFormatter {
    fn format(&self, source: &str, options: &Options) -> String;
}

impl<F> SubFormatter for F
where
    F: Fn(&str, &Options) -> String,
{
    fn format(&self, source: &str, options: &Options) -> String {
        self(source, options)
    }
}

/* ================================= Printer =============================== */

struct Printer {
    output: Output,
    indent_level: usize,
    alignment_size: usize,
    preserve_newlines: bool,
    max_preserve_newlines: usize,
}

impl Printer {
    fn new(options: &Options, base_indent: &str) -> Self {
        Printer {
            output: Output::new(options, base_indent),
            indent_level: 0,
            alignment_size: 0,
            preserve_newlines: options.preserve_newlines,
            max_preserve_newlines: options.max_preserve_newlines,
        }
    }

    fn set_space_before_token(&mut self, value: bool, non_breaking: bool) {
        self.output.space_before_token = value;
        self.output.non_breaking_space = non_breaking;
    }

    fn set_wrap_point(&mut self) {
        self.output
            .set_indent(self.indent_level as isize, self.alignment_size);
        self.output.set_wrap_point();
    }

    fn add_raw_token(&mut self, token: &Token) {
        self.output
            .add_raw_token(token.newlines, &token.whitespace_before, &token.text);
    }

    /// Re-emit the line breaks in front of `token`. Without
    /// `preserve_newlines` only a single break survives, and none around text.
    fn print_preserved_newlines(&mut self, token: &Token, previous: TokenKind) -> bool {
        let mut newlines = 0;
        if token.kind != TokenKind::Text && previous != TokenKind::Text {
            newlines = usize::from(token.newlines > 0);
        }
        if self.preserve_newlines {
            newlines = token.newlines.min(self.max_preserve_newlines.saturating_add(1));
        }
        for n in 0..newlines {
            self.print_newline(n > 0);
        }
        newlines != 0
    }

    /// Whitespace before `token` becomes preserved newlines or a single space.
    fn traverse_whitespace(&mut self, token: &Token, previous: TokenKind) -> bool {
        if token.whitespace_before.is_empty() && token.newlines == 0 {
            return false;
        }
        if !self.print_preserved_newlines(token, previous) {
            self.output.space_before_token = true;
        }
        true
    }

    fn print_newline(&mut self, force: bool) {
        self.output.add_new_line(force);
    }

    fn print_token(&mut self, text: &str) {
        if !text.is_empty() {
            self.output
                .set_indent(self.indent_level as isize, self.alignment_size);
            self.output.add_token(text);
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn deindent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
            self.output
                .set_indent(self.indent_level as isize, self.alignment_size);
        }
    }

    /// Indentation `level` units away from the current level.
    fn get_full_indent(&mut self, level: isize) -> String {
        let level = self.indent_level as isize + level;
        if level < 1 {
            return String::new();
        }
        self.output.get_indent_string(level)
    }
}

/* ================================ Tag info =============================== */

static ANGLE_TAG_CHECK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([^\s>]*)").unwrap());
static HANDLEBARS_TAG_CHECK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{~?(?:[\^]|#\*?)?([^\s}]+)").unwrap());

/// What the engine knows about one tag (or comment).
#[derive(Clone, Debug, Default)]
struct TagInfo {
    parent: Option<TagId>,
    text: String,
    /// Lowercased name as written, `/` included for end tags.
    tag_check: String,
    tag_name: String,
    start_char: Option<char>,
    is_start: bool,
    is_end: bool,
    is_empty: bool,
    is_inline: bool,
    is_unformatted: bool,
    is_content_unformatted: bool,
    tag_complete: bool,
    indent_content: bool,
    multiline_content: bool,
    language: Option<EmbeddedLanguage>,
    start_tag: Option<TagId>,
    attr_count: usize,
    has_wrapped_attrs: bool,
    alignment_size: usize,
}

impl TagInfo {
    fn starts_with(&self, c: char) -> bool {
        self.start_char == Some(c)
    }
}

fn first_capture(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(String::new, |m| m.as_str().to_string())
}

/* ================================= Engine ================================ */

/// Kind of the previously handled token, as far as placement decisions care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LastToken {
    Start,
    TagOpen,
    TagClose,
    Content,
    InsideTag,
    ControlFlow,
}

#[derive(Clone, Copy, Debug)]
struct EngineState {
    last_token: LastToken,
    last_tag: TagId,
}

struct Engine<'a> {
    beautifier: &'a Beautifier,
    options: &'a Options,
    depth: usize,
    tokens: &'a TokenStream,
    tags: Vec<TagInfo>,
    stack: TagStack,
    printer: Printer,
}

impl<'a> Engine<'a> {
    fn new(
        beautifier: &'a Beautifier,
        options: &'a Options,
        depth: usize,
        tokens: &'a TokenStream,
        base_indent: &str,
    ) -> Self {
        // slot 0 stands in for "no tag seen yet"
        let sentinel = TagInfo {
            tag_complete: true,
            ..TagInfo::default()
        };
        Engine {
            beautifier,
            options,
            depth,
            tokens,
            tags: vec![sentinel],
            stack: TagStack::new(),
            printer: Printer::new(options, base_indent),
        }
    }

    fn run(mut self, eol: &str) -> String {
        let tokens = self.tokens;
        let mut state = EngineState {
            last_token: LastToken::Start,
            last_tag: 0,
        };
        for id in tokens.ids() {
            let token = &tokens[id];
            let tag_complete = self.tags[state.last_tag].tag_complete;
            state.last_token = match token.kind {
                TokenKind::Eof => break,
                TokenKind::TagOpen | TokenKind::Comment => {
                    state.last_tag = self.handle_tag_open(id, state);
                    LastToken::TagOpen
                }
                TokenKind::Attribute | TokenKind::Equals | TokenKind::Value => {
                    self.handle_inside_tag(token, state)
                }
                TokenKind::Text if !tag_complete => self.handle_inside_tag(token, state),
                TokenKind::TagClose => self.handle_tag_close(token, state),
                TokenKind::Text => self.handle_text(token, state),
                TokenKind::ControlFlowOpen => self.handle_control_flow_open(token),
                TokenKind::ControlFlowClose => self.handle_control_flow_close(token),
                TokenKind::Start | TokenKind::Raw | TokenKind::Unknown => {
                    self.handle_raw(token, state)
                }
            };
        }
        self.printer.output.get_code(eol)
    }

    fn previous_kind(&self, token: &Token) -> TokenKind {
        token
            .previous
            .map_or(TokenKind::Start, |id| self.tokens[id].kind)
    }

    /* -------------------------- tag construction ------------------------- */

    fn tag_info(&self, raw: &Token) -> TagInfo {
        let options = self.options;
        let text = raw.text.as_str();
        let start_char = text.chars().next();

        let tag_check = if start_char == Some('<') {
            first_capture(&ANGLE_TAG_CHECK, text)
        } else {
            let check = first_capture(&HANDLEBARS_TAG_CHECK, text);
            // partial blocks: {{#> name}} and {{~#> name}}
            if (text.starts_with("{{#>") || text.starts_with("{{~#>")) && check.starts_with('>') {
                match raw.next.map(|id| &self.tokens[id]) {
                    Some(next) if check == ">" => {
                        next.text.split(' ').next().unwrap_or_default().to_string()
                    }
                    _ => text.split('>').nth(1).unwrap_or_default().to_string(),
                }
            } else {
                check
            }
        };
        let tag_check = tag_check.to_lowercase();

        let tag_complete = raw.kind == TokenKind::Comment;
        let is_start = !tag_check.starts_with('/');
        let tag_name = if is_start {
            tag_check.clone()
        } else {
            tag_check[1..].to_string()
        };

        let self_closed = raw.closed.is_some_and(|id| self.tokens[id].text == "/>");
        let mut is_end = !is_start || self_closed;
        if start_char == Some('{') {
            // {{~#if}}: the whitespace marker shifts the helper prefix
            let helper_at = if text.as_bytes().get(2) == Some(&b'~') { 3 } else { 2 };
            // only #block and ^inverse helpers open a block
            let single = !options.indent_handlebars
                || text.len() < 3
                || text
                    .as_bytes()
                    .get(helper_at)
                    .is_some_and(|&b| b != b'#' && b != b'^');
            is_end = is_end || single;
        }
        is_end = is_end || options.is_void(&tag_check);

        let is_empty = tag_complete || (is_start && is_end);
        let is_unformatted = !tag_complete && options.is_unformatted(&tag_check);
        let is_content_unformatted = !is_empty && options.is_content_unformatted(&tag_check);
        let is_inline = options.is_inline(&tag_name)
            || (options.inline_custom_elements && tag_name.contains('-'))
            || start_char == Some('{');

        TagInfo {
            parent: self.stack.current(),
            text: raw.text.clone(),
            tag_check,
            tag_name,
            start_char,
            is_start,
            is_end,
            is_empty,
            is_inline,
            is_unformatted,
            is_content_unformatted,
            tag_complete,
            alignment_size: options.wrap_attributes_indent_size(),
            ..TagInfo::default()
        }
    }

    /// Raw text of the `type` attribute between a start tag and its `>`.
    fn type_attribute(&self, start: &Token, closed: TokenId) -> Option<&'a str> {
        let tokens: &'a TokenStream = self.tokens;
        let mut cursor = start.next;
        while let Some(id) = cursor {
            let token = &tokens[id];
            if token.kind == TokenKind::Eof || id == closed {
                break;
            }
            if token.kind == TokenKind::Attribute && token.text == "type" {
                let equals = token
                    .next
                    .map(|n| &tokens[n])
                    .filter(|t| t.kind == TokenKind::Equals)?;
                let value = equals
                    .next
                    .map(|n| &tokens[n])
                    .filter(|t| t.kind == TokenKind::Value)?;
                return Some(value.text.as_str());
            }
            cursor = token.next;
        }
        None
    }

    fn embedded_language(&self, tid: TagId, raw: &Token) -> Option<EmbeddedLanguage> {
        // an unclosed start tag has no body to hand over
        let closed = raw.closed?;
        let type_attribute = self.type_attribute(raw, closed);
        embedded::language_of(&self.tags[tid].tag_check, type_attribute)
    }

    /* ------------------------------ handlers ----------------------------- */

    fn handle_tag_open(&mut self, id: TokenId, state: EngineState) -> TagId {
        let tokens = self.tokens;
        let raw = &tokens[id];
        let tid = self.tags.len();
        let info = self.tag_info(raw);
        self.tags.push(info);

        let last = &self.tags[state.last_tag];
        let closes_unformatted = (last.is_unformatted || last.is_content_unformatted)
            && !last.is_empty
            && raw.kind == TokenKind::TagOpen
            && !self.tags[tid].is_start;

        if closes_unformatted {
            // keep newlines inside unformatted content exactly as written
            self.printer.add_raw_token(raw);
            let start = self.stack.try_pop(
                &self.tags[tid].tag_name,
                &[],
                &mut self.printer.indent_level,
            );
            self.tags[tid].start_tag = start;
        } else {
            let previous = self.previous_kind(raw);
            self.printer.traverse_whitespace(raw, previous);
            self.set_tag_position(tid, raw, state);
            if !self.tags[tid].is_inline {
                self.printer.set_wrap_point();
            }
            self.printer.print_token(&raw.text);
        }

        let wrap = self.options.wrap_attributes;
        if self.tags[tid].is_start && wrap.is_force() {
            let mut count = 0;
            let mut next = id + 1;
            while let Some(token) = tokens.get(next) {
                if token.kind == TokenKind::Attribute {
                    count += 1;
                }
                if matches!(token.kind, TokenKind::Eof | TokenKind::TagClose) {
                    break;
                }
                next += 1;
            }
            self.tags[tid].attr_count = count;
        }

        if wrap.is_aligned() {
            self.tags[tid].alignment_size = raw.text.chars().count() + 1;
        }

        let info = &self.tags[tid];
        if !info.tag_complete && !info.is_unformatted {
            self.printer.alignment_size = info.alignment_size;
        }
        tid
    }

    fn handle_inside_tag(&mut self, raw: &Token, state: EngineState) -> LastToken {
        let last = state.last_tag;
        let mut wrapped = self.tags[last].has_wrapped_attrs;
        self.printer
            .set_space_before_token(raw.newlines > 0 || !raw.whitespace_before.is_empty(), true);

        if self.tags[last].is_unformatted {
            self.printer.add_raw_token(raw);
        } else if self.tags[last].starts_with('{') && raw.kind == TokenKind::Text {
            // inside {{ }} keep the line breaks, or a single space
            let previous = self.previous_kind(raw);
            if self.printer.print_preserved_newlines(raw, previous) {
                self.printer
                    .output
                    .add_raw_token(0, &raw.whitespace_before, &raw.text);
            } else {
                self.printer.print_token(&raw.text);
            }
        } else {
            let previous = self.previous_kind(raw);
            match raw.kind {
                TokenKind::Attribute => self.printer.set_space_before_token(true, false),
                TokenKind::Equals => self.printer.set_space_before_token(false, false),
                TokenKind::Value if previous == TokenKind::Equals => {
                    self.printer.set_space_before_token(false, false)
                }
                _ => {}
            }

            if raw.kind == TokenKind::Attribute && self.tags[last].starts_with('<') {
                let wrap = self.options.wrap_attributes;
                if wrap.is_preserve() {
                    self.printer.traverse_whitespace(raw, previous);
                    wrapped = wrapped || raw.newlines != 0;
                }
                // force: every attribute after the first goes on its own line,
                // the first one too under force-expand-multiline
                if wrap.is_force()
                    && self.tags[last].attr_count >= self.options.wrap_attributes_min_attrs
                    && (state.last_token != LastToken::TagOpen
                        || wrap == WrapAttributes::ForceExpandMultiline)
                {
                    self.printer.print_newline(false);
                    wrapped = true;
                }
            }
            self.printer.print_token(&raw.text);
            wrapped = wrapped || self.printer.output.previous_token_wrapped;
            self.tags[last].has_wrapped_attrs = wrapped;
        }
        LastToken::InsideTag
    }

    fn handle_tag_close(&mut self, raw: &Token, state: EngineState) -> LastToken {
        let last = state.last_tag;
        self.printer.alignment_size = 0;
        self.tags[last].tag_complete = true;

        self.printer
            .set_space_before_token(raw.newlines > 0 || !raw.whitespace_before.is_empty(), true);
        if self.tags[last].is_unformatted {
            self.printer.add_raw_token(raw);
        } else {
            if self.tags[last].starts_with('<') {
                // space before `/>`, none before `>`
                self.printer
                    .set_space_before_token(raw.text.starts_with('/'), true);
                if self.options.wrap_attributes == WrapAttributes::ForceExpandMultiline
                    && self.tags[last].has_wrapped_attrs
                {
                    self.printer.print_newline(false);
                }
            }
            self.printer.print_token(&raw.text);
        }

        let info = &self.tags[last];
        let verbatim = info.is_unformatted || info.is_content_unformatted;
        if info.indent_content && !verbatim {
            self.printer.indent();
            self.tags[last].indent_content = false;
        }
        if !self.tags[last].is_inline && !verbatim {
            self.printer.set_wrap_point();
        }
        LastToken::TagClose
    }

    fn handle_text(&mut self, raw: &Token, state: EngineState) -> LastToken {
        let last = &self.tags[state.last_tag];
        if let Some(language) = last.language {
            self.print_embedded(raw, language);
        } else if last.is_unformatted || last.is_content_unformatted {
            self.printer.add_raw_token(raw);
        } else {
            let previous = self.previous_kind(raw);
            self.printer.traverse_whitespace(raw, previous);
            self.printer.print_token(&raw.text);
        }
        LastToken::Content
    }

    /// Copy a token no handler claims. Placement context is left as it was.
    fn handle_raw(&mut self, raw: &Token, state: EngineState) -> LastToken {
        self.printer.add_raw_token(raw);
        state.last_token
    }

    fn handle_control_flow_open(&mut self, raw: &Token) -> LastToken {
        let spaced = raw.newlines > 0 || !raw.whitespace_before.is_empty();
        self.printer.set_space_before_token(spaced, true);
        if raw.newlines > 0 {
            let previous = self.previous_kind(raw);
            self.printer.print_preserved_newlines(raw, previous);
        }
        self.printer.print_token(&raw.text);
        self.printer.indent();
        LastToken::ControlFlow
    }

    fn handle_control_flow_close(&mut self, raw: &Token) -> LastToken {
        self.printer.deindent();
        if raw.newlines > 0 {
            let previous = self.previous_kind(raw);
            self.printer.print_preserved_newlines(raw, previous);
        } else {
            self.printer
                .set_space_before_token(!raw.whitespace_before.is_empty(), true);
        }
        self.printer.print_token(&raw.text);
        LastToken::ControlFlow
    }

    /* --------------------------- tag placement --------------------------- */

    fn set_tag_position(&mut self, tid: TagId, raw: &Token, state: EngineState) {
        let options = self.options;
        let is_empty = self.tags[tid].is_empty;
        let is_end = self.tags[tid].is_end;

        if !is_empty {
            if is_end {
                let start = self.stack.try_pop(
                    &self.tags[tid].tag_name,
                    &[],
                    &mut self.printer.indent_level,
                );
                self.tags[tid].start_tag = start;
            } else {
                if self.close_optional_end(tid) && !self.tags[tid].is_inline {
                    self.printer.print_newline(false);
                }
                self.stack
                    .record(&self.tags[tid].tag_name, tid, self.printer.indent_level);

                let info = &self.tags[tid];
                if (info.tag_name == "script" || info.tag_name == "style")
                    && !(info.is_unformatted || info.is_content_unformatted)
                {
                    let language = self.embedded_language(tid, raw);
                    self.tags[tid].language = language;
                }
            }
        }

        if options.is_extra_liner(&self.tags[tid].tag_check) {
            self.printer.print_newline(false);
            if !self.printer.output.just_added_blankline() {
                self.printer.print_newline(true);
            }
        }

        let last = &self.tags[state.last_tag];
        let (last_is_end, last_is_inline, last_is_unformatted) =
            (last.is_end, last.is_inline, last.is_unformatted);
        let info = &self.tags[tid];
        let is_inline = info.is_inline;
        let is_unformatted = info.is_unformatted;
        let is_content_unformatted = info.is_content_unformatted;

        if is_empty {
            if info.starts_with('{') && info.tag_check == "else" {
                // {{else}} lines up with its {{#if}} and opens a new block
                self.stack
                    .indent_to(&["if", "unless", "each"], &mut self.printer.indent_level);
                self.tags[tid].indent_content = true;
                if !self.printer.output.current_line_contains("{{#if") {
                    self.printer.print_newline(false);
                }
            }

            let info = &self.tags[tid];
            let comment_stays = info.tag_name == "!--"
                && state.last_token == LastToken::TagClose
                && last_is_end
                && !info.text.contains('\n');
            if !comment_stays {
                if !(is_inline || is_unformatted) {
                    self.printer.print_newline(false);
                }
                self.calculate_parent_multiline(tid);
            }
        } else if is_end {
            let start_tag = info.start_tag;
            let mut expand = start_tag.is_some_and(|s| self.tags[s].multiline_content);
            expand = expand
                || (!is_inline
                    && !(last_is_inline || last_is_unformatted)
                    && !(state.last_token == LastToken::TagClose
                        && start_tag == Some(state.last_tag))
                    && state.last_token != LastToken::Content);
            if expand && !(is_content_unformatted || is_unformatted) {
                self.printer.print_newline(false);
            }
        } else {
            let mut indent_content = info.language.is_none();
            if info.starts_with('<') {
                indent_content = match info.tag_name.as_str() {
                    "html" => options.indent_inner_html,
                    "head" => options.indent_head_inner_html,
                    "body" => options.indent_body_inner_html,
                    _ => indent_content,
                };
            }
            self.tags[tid].indent_content = indent_content;

            if !(is_inline || is_unformatted)
                && (state.last_token != LastToken::Content || is_content_unformatted)
            {
                self.printer.print_newline(false);
            }
            self.calculate_parent_multiline(tid);
        }
    }

    fn calculate_parent_multiline(&mut self, tid: TagId) {
        let info = &self.tags[tid];
        let Some(parent) = info.parent else {
            return;
        };
        let inline_in_inline =
            (info.is_inline || info.is_unformatted) && self.tags[parent].is_inline;
        if self.printer.output.just_added_newline() && !inline_in_inline {
            self.tags[parent].multiline_content = true;
        }
    }

    /// Apply an implied end tag for the start tag `tid`, then re-resolve its
    /// parent from the stack.
    fn close_optional_end(&mut self, tid: TagId) -> bool {
        let info = &self.tags[tid];
        if info.is_empty || !info.is_start {
            return false;
        }
        let Some(parent_id) = info.parent else {
            return false;
        };
        let parent = &self.tags[parent_id];
        let grandparent = parent.parent.map(|g| self.tags[g].tag_name.as_str());
        let closed = optional_end::close_implied(
            &info.tag_name,
            Parent {
                tag_name: &parent.tag_name,
                grandparent,
            },
            &mut self.stack,
            &mut self.printer.indent_level,
        );
        self.tags[tid].parent = self.stack.current();
        closed.is_some()
    }

    /* ------------------------------ embedded ----------------------------- */

    fn print_embedded(&mut self, raw: &Token, language: EmbeddedLanguage) {
        if raw.text.is_empty() {
            return;
        }
        let script_indent_level = match self.options.indent_scripts {
            IndentScripts::Normal => 1,
            IndentScripts::Keep => 0,
            IndentScripts::Separate => -(self.printer.indent_level as isize),
        };
        let indentation = self.printer.get_full_indent(script_indent_level);

        let mut text = embedded::strip_trailing_blank_line(&raw.text);
        let mut white = raw.whitespace_before.as_str();
        let mut wrapper = None;
        if language != EmbeddedLanguage::Html {
            match embedded::split_body(text) {
                Body::Plain(_) => {}
                Body::Unterminated => {
                    self.printer.add_raw_token(raw);
                    return;
                }
                Body::Wrapped(w) => {
                    text = w.body;
                    if let Some(indent) = w.body_indent {
                        white = indent;
                    }
                    wrapper = Some((
                        format!("{indentation}{}\n", w.open),
                        format!("{indentation}{}", w.close),
                    ));
                }
            }
        }

        let mut formatted = String::new();
        if !text.is_empty() {
            formatted = self.format_embedded(text, white, &indentation, language);
        }
        if let Some((pre, post)) = wrapper {
            formatted = if formatted.is_empty() {
                pre + &post
            } else {
                format!("{pre}{formatted}\n{post}")
            };
        }

        self.printer.print_newline(false);
        if !formatted.is_empty() {
            self.printer.output.add_raw_token(0, "", &formatted);
            self.printer.print_newline(true);
        }
    }

    fn format_embedded(
        &self,
        text: &str,
        white: &str,
        indentation: &str,
        language: EmbeddedLanguage,
    ) -> String {
        let child_options = Options {
            eol: "\n".to_string(),
            ..self.options.clone()
        };
        let source = format!("{indentation}{text}");
        let formatter = match language {
            EmbeddedLanguage::Javascript => self.beautifier.js_formatter.as_deref(),
            EmbeddedLanguage::Css => self.beautifier.css_formatter.as_deref(),
            EmbeddedLanguage::Html => {
                log::debug!("formatting embedded html at depth {}", self.depth + 1);
                return match self
                    .beautifier
                    .beautify_nested(&source, &child_options, self.depth + 1)
                {
                    Ok(html) => html,
                    Err(err) => {
                        log::warn!("{err}; reindenting embedded html as is");
                        embedded::reindent(text, white, indentation)
                    }
                };
            }
        };
        match formatter {
            Some(formatter) => {
                log::debug!("formatting embedded {language:?}");
                formatter.format(&source, &child_options)
            }
            None => embedded::reindent(text, white, indentation),
        }
    }
}

/* =============================== Beautifier ============================== */

/// Markup beautifier with optional formatters for embedded scripts and styles.
pub struct Beautifier {
    options: Options,
    js_formatter: Option<Box<dyn SubFormatter>>,
    css_formatter: Option<Box<dyn SubFormatter>>,
}

impl Beautifier {
    pub fn new(options: &Options) -> Self {
        Beautifier {
            options: options.clone().normalize(),
            js_formatter: None,
            css_formatter: None,
        }
    }

    pub fn with_js_formatter(mut self, formatter: impl SubFormatter + 'static) -> Self {
        self.js_formatter = Some(Box::new(formatter));
        self
    }

    pub fn with_css_formatter(mut self, formatter: impl SubFormatter + 'static) -> Self {
        self.css_formatter = Some(Box::new(formatter));
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Format `source`. Never fails: malformed markup gets best-effort output.
    pub fn beautify(&self, source: &str) -> String {
        if self.options.disabled {
            return source.to_string();
        }
        self.format(source, &self.options, 0)
    }

    fn beautify_nested(&self, source: &str, options: &Options, depth: usize) -> Result<String> {
        if depth > options.max_nesting_depth {
            return Err(Error::NestingTooDeep {
                depth,
                limit: options.max_nesting_depth,
            });
        }
        Ok(self.format(source, options, depth))
    }

    fn format(&self, source: &str, options: &Options, depth: usize) -> String {
        let eol = options.resolve_eol(source);
        let source = normalize_line_breaks(source);
        let base_indent = leading_indent(&source);
        let tokens = Tokenizer::new(&source, options).tokenize();
        Engine::new(self, options, depth, &tokens, base_indent).run(&eol)
    }
}

/// `\r\n` and lone `\r` become `\n`.
fn normalize_line_breaks(source: &str) -> Cow<'_, str> {
    if memchr(b'\r', source.as_bytes()).is_none() {
        return Cow::Borrowed(source);
    }
    Cow::Owned(source.replace("\r\n", "\n").replace('\r', "\n"))
}

fn leading_indent(source: &str) -> &str {
    let rest = source.trim_start_matches([' ', '\t']);
    &source[..source.len() - rest.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beautify(source: &str) -> String {
        Beautifier::new(&Options::default()).beautify(source)
    }

    #[test]
    fn line_breaks_are_normalized() {
        assert_eq!(normalize_line_breaks("a\r\nb\rc"), "a\nb\nc");
        assert!(matches!(normalize_line_breaks("a\nb"), Cow::Borrowed(_)));
        assert_eq!(leading_indent("\t  <p>"), "\t  ");
        assert_eq!(leading_indent("<p>"), "");
    }

    #[test]
    fn nested_blocks_are_indented() {
        assert_eq!(
            beautify("<div><section><p>text</p></section></div>"),
            "<div>\n    <section>\n        <p>text</p>\n    </section>\n</div>"
        );
    }

    #[test]
    fn inline_elements_stay_on_the_line() {
        assert_eq!(
            beautify("<p>some <b>bold</b> and <i>italic</i> text</p>"),
            "<p>some <b>bold</b> and <i>italic</i> text</p>"
        );
    }

    #[test]
    fn tag_info_for_handlebars_helpers() {
        let opts = Options::default().normalize();
        let beautifier = Beautifier::new(&opts);
        let tokens = Tokenizer::new("{{#each xs}}{{~^if y}}{{/each}}{{name}}", &opts).tokenize();
        let engine = Engine::new(&beautifier, &opts, 0, &tokens, "");

        let each = engine.tag_info(&tokens[1]);
        assert_eq!(each.tag_name, "each");
        assert!(each.is_start && !each.is_end);

        let inverse = engine.tag_info(&tokens[4]);
        assert_eq!(inverse.tag_check, "if");
        assert!(!inverse.is_end);

        let close = engine.tag_info(&tokens[7]);
        assert_eq!(close.tag_check, "/each");
        assert!(close.is_end && !close.is_start);

        let variable = engine.tag_info(&tokens[9]);
        assert!(variable.is_empty && variable.is_inline);
    }

    #[test]
    fn partial_block_takes_name_from_next_token() {
        let opts = Options::default().normalize();
        let beautifier = Beautifier::new(&opts);
        let tokens = Tokenizer::new("{{#> layout}}x{{/layout}}", &opts).tokenize();
        let engine = Engine::new(&beautifier, &opts, 0, &tokens, "");
        assert_eq!(engine.tag_info(&tokens[1]).tag_name, "layout");
    }

    #[test]
    fn void_and_self_closing_tags_are_empty() {
        let opts = Options::default().normalize();
        let beautifier = Beautifier::new(&opts);
        let tokens = Tokenizer::new("<BR><x-icon/>", &opts).tokenize();
        let engine = Engine::new(&beautifier, &opts, 0, &tokens, "");
        let br = engine.tag_info(&tokens[1]);
        assert_eq!(br.tag_name, "br");
        assert!(br.is_empty);
        let icon = engine.tag_info(&tokens[3]);
        assert!(icon.is_empty && icon.is_inline);
    }

    #[test]
    fn type_attribute_is_read_up_to_the_close() {
        let opts = Options::default().normalize();
        let beautifier = Beautifier::new(&opts);
        let tokens =
            Tokenizer::new("<script async type='module'>x</script>", &opts).tokenize();
        let engine = Engine::new(&beautifier, &opts, 0, &tokens, "");
        let closed = tokens[1].closed.unwrap();
        assert_eq!(engine.type_attribute(&tokens[1], closed), Some("'module'"));
    }

    #[test]
    fn raw_token_keeps_the_previous_context() {
        let opts = Options::default().normalize();
        let beautifier = Beautifier::new(&opts);
        let tokens = Tokenizer::new("<p>x</p>", &opts).tokenize();
        let mut engine = Engine::new(&beautifier, &opts, 0, &tokens, "");
        let state = EngineState {
            last_token: LastToken::Content,
            last_tag: 0,
        };
        let stray = Token::new(TokenKind::Unknown, "}");
        assert_eq!(engine.handle_raw(&stray, state), LastToken::Content);
    }

    #[test]
    fn unbounded_blank_line_limit_keeps_newlines() {
        let opts = Options {
            max_preserve_newlines: usize::MAX,
            ..Options::default()
        };
        assert_eq!(
            Beautifier::new(&opts).beautify("<p>a</p>\n\n<p>b</p>"),
            "<p>a</p>\n\n<p>b</p>"
        );
    }

    #[test]
    fn nesting_guard_reports_depth() {
        let opts = Options {
            max_nesting_depth: 2,
            ..Options::default()
        };
        let beautifier = Beautifier::new(&opts);
        let err = beautifier
            .beautify_nested("<p>", beautifier.options(), 3)
            .unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { depth: 3, limit: 2 }));
        assert!(beautifier.beautify_nested("<p>", beautifier.options(), 2).is_ok());
    }
}
