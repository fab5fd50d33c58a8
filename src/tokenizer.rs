// src/tokenizer.rs
//
// Markup tokenizer.
//
// - Tokens live in an arena (`TokenStream`) and refer to each other by index:
//   `previous`/`next` in stream order, `opened`/`closed` between an opener and
//   the bracket that closes it, `parent` for the enclosing open context.
// - Which reader applies depends on the nearest unmatched opener: inside `<tag`
//   we read attributes, inside `{{` raw helper text, inside `@if (...) {` words
//   stop at `}`.
// - Script/style bodies and unformatted element contents are read verbatim up
//   to their case-insensitive end tag.
// - Every call makes progress; unknown input becomes a one-char UNKNOWN token.

use std::ops::Index;

use memchr::memchr;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::directives::{self, Directives};
use crate::options::{Options, Templating};
use crate::pattern::{
    Pattern, TemplatablePattern, WhitespacePattern, HANDLEBARS_COMMENT_END,
    HANDLEBARS_COMMENT_START, HANDLEBARS_END, HANDLEBARS_START,
};
use crate::scanner::InputScanner;

pub type TokenId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Start,
    Raw,
    Eof,
    TagOpen,
    TagClose,
    ControlFlowOpen,
    ControlFlowClose,
    Attribute,
    Equals,
    Value,
    Comment,
    Text,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Line breaks in the whitespace preceding the token.
    pub newlines: usize,
    /// Inline whitespace after the last of those line breaks.
    pub whitespace_before: String,
    pub parent: Option<TokenId>,
    pub previous: Option<TokenId>,
    pub next: Option<TokenId>,
    /// For a closer: the opener it closes.
    pub opened: Option<TokenId>,
    /// For an opener: the closer that closed it.
    pub closed: Option<TokenId>,
    pub directives: Option<Directives>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token {
            kind,
            text: text.into(),
            newlines: 0,
            whitespace_before: String::new(),
            parent: None,
            previous: None,
            next: None,
            opened: None,
            closed: None,
            directives: None,
        }
    }

    fn starts_with(&self, c: char) -> bool {
        self.text.starts_with(c)
    }
}

/* ============================== Token stream ============================= */

/// Arena of tokens. Slot 0 is the synthetic START token; the last token is EOF.
#[derive(Clone, Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Ids of every real token, EOF included.
    pub fn ids(&self) -> impl Iterator<Item = TokenId> {
        1..self.tokens.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, token: Token) -> TokenId {
        self.tokens.push(token);
        self.tokens.len() - 1
    }
}

impl Index<TokenId> for TokenStream {
    type Output = Token;

    fn index(&self, id: TokenId) -> &Token {
        &self.tokens[id]
    }
}

/* ================================ Patterns =============================== */

static WORD_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t <]").unwrap());
static WORD_OR_BRACE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t <}]").unwrap());
static SINGLE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'").unwrap());
static DOUBLE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"""#).unwrap());
static ATTRIBUTE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t =>]|/>").unwrap());
static ELEMENT_NAME_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t >/]").unwrap());
static CONTROL_FLOW_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[a-zA-Z]+[^({]*[({]").unwrap());
static HANDLEBARS_OPEN_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t }]").unwrap());
static COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--").unwrap());
static COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"-->").unwrap());
static CDATA_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!\[CDATA\[").unwrap());
static CDATA_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\]>").unwrap());
static CONDITIONAL_COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!\[").unwrap());
static CONDITIONAL_COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]>").unwrap());
static PROCESSING_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?").unwrap());
static PROCESSING_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?>").unwrap());

struct TokenizerPatterns {
    word: TemplatablePattern,
    word_control_flow_close_excluded: TemplatablePattern,
    single_quote: TemplatablePattern,
    double_quote: TemplatablePattern,
    attribute: TemplatablePattern,
    element_name: TemplatablePattern,
    angular_control_flow_start: Pattern,
    handlebars_comment: Pattern,
    handlebars: Pattern,
    handlebars_open: Pattern,
    handlebars_raw_close: Pattern,
    comment: Pattern,
    cdata: Pattern,
    conditional_comment: Pattern,
    processing: Pattern,
}

impl TokenizerPatterns {
    fn new(options: &Options) -> Self {
        let mut word = TemplatablePattern::until(&WORD_END, options);
        let mut word_control_flow_close_excluded =
            TemplatablePattern::until(&WORD_OR_BRACE_END, options);
        // indented handlebars are tokens of their own, not part of a word
        if options.indent_handlebars {
            word = word.exclude_handlebars();
            word_control_flow_close_excluded = word_control_flow_close_excluded.exclude_handlebars();
        }
        TokenizerPatterns {
            word,
            word_control_flow_close_excluded,
            single_quote: TemplatablePattern::until_after(&SINGLE_QUOTE, options),
            double_quote: TemplatablePattern::until_after(&DOUBLE_QUOTE, options),
            attribute: TemplatablePattern::until(&ATTRIBUTE_END, options),
            element_name: TemplatablePattern::until(&ELEMENT_NAME_END, options),
            angular_control_flow_start: Pattern::new().matching(&CONTROL_FLOW_START),
            handlebars_comment: Pattern::new()
                .starting_with(&HANDLEBARS_COMMENT_START)
                .until_after(&HANDLEBARS_COMMENT_END),
            handlebars: Pattern::new()
                .starting_with(&HANDLEBARS_START)
                .until_after(&HANDLEBARS_END),
            handlebars_open: Pattern::new().until(&HANDLEBARS_OPEN_END),
            handlebars_raw_close: Pattern::new().until(&HANDLEBARS_END),
            comment: Pattern::new()
                .starting_with(&COMMENT_START)
                .until_after(&COMMENT_END),
            cdata: Pattern::new()
                .starting_with(&CDATA_START)
                .until_after(&CDATA_END),
            conditional_comment: Pattern::new()
                .starting_with(&CONDITIONAL_COMMENT_START)
                .until_after(&CONDITIONAL_COMMENT_END),
            processing: Pattern::new()
                .starting_with(&PROCESSING_START)
                .until_after(&PROCESSING_END),
        }
    }
}

/* ============================ Raw text helpers =========================== */

#[inline]
fn is_tag_space(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\n' || b == b'\r'
}

/// Byte offset in `s` of the first `</name[ \t\r\n]*>`, compared
/// case-insensitively, or `s.len()` when there is none.
fn find_end_tag(s: &str, name: &str) -> usize {
    let bytes = s.as_bytes();
    let name = name.as_bytes();
    let mut i = 0usize;
    while let Some(off) = memchr(b'<', &bytes[i..]) {
        let lt = i + off;
        let name_start = lt + 2;
        let name_end = name_start + name.len();
        if bytes.get(lt + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(name)
        {
            let mut j = name_end;
            while j < bytes.len() && is_tag_space(bytes[j]) {
                j += 1;
            }
            if bytes.get(j) == Some(&b'>') {
                return lt;
            }
        }
        i = lt + 1;
    }
    bytes.len()
}

/* ================================ Tokenizer ============================== */

pub struct Tokenizer<'a> {
    input: InputScanner<'a>,
    options: &'a Options,
    whitespace: WhitespacePattern,
    patterns: TokenizerPatterns,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, options: &'a Options) -> Self {
        Tokenizer {
            input: InputScanner::new(source),
            options,
            whitespace: WhitespacePattern::default(),
            patterns: TokenizerPatterns::new(options),
        }
    }

    pub fn tokenize(mut self) -> TokenStream {
        let mut stream = TokenStream {
            tokens: vec![Token::new(TokenKind::Start, "")],
        };
        let mut previous: TokenId = 0;
        let mut open_token: Option<TokenId> = None;
        let mut open_stack: Vec<Option<TokenId>> = Vec::new();

        loop {
            let mut current = self.next_token(&stream, previous, open_token);
            current.parent = open_token;
            current.previous = Some(previous);
            let kind = current.kind;
            log::trace!(
                target: "markup_beautify::tokenizer",
                "emit token: {:?} {:?}",
                kind,
                current.text
            );

            let closes = open_token.is_some_and(|open| is_closing(&current, &stream[open]));
            let id = stream.push(current);
            stream.tokens[previous].next = Some(id);

            if is_opening(kind) {
                open_stack.push(open_token);
                open_token = Some(id);
            } else if closes {
                if let Some(open) = open_token {
                    stream.tokens[id].opened = Some(open);
                    stream.tokens[open].closed = Some(id);
                }
                open_token = open_stack.pop().flatten();
                stream.tokens[id].parent = open_token;
            }

            previous = id;
            if kind == TokenKind::Eof {
                break;
            }
        }
        stream
    }

    fn create_token(&self, kind: TokenKind, text: impl Into<String>) -> Token {
        Token {
            newlines: self.whitespace.newline_count,
            whitespace_before: self.whitespace.whitespace_before_token.clone(),
            ..Token::new(kind, text)
        }
    }

    fn next_token(
        &mut self,
        stream: &TokenStream,
        previous: TokenId,
        open_token: Option<TokenId>,
    ) -> Token {
        self.whitespace.read(&mut self.input);
        let Some(c) = self.input.peek(0) else {
            return self.create_token(TokenKind::Eof, "");
        };
        let previous = &stream[previous];
        let open = open_token.map(|id| &stream[id]);
        let opened_by_previous = previous.opened.map(|id| &stream[id]);

        if let Some(token) = self.read_open_handlebars(c, open) {
            return token;
        }
        if let Some(token) = self.read_attribute(c, previous, open) {
            return token;
        }
        if let Some(token) = self.read_close(c, open) {
            return token;
        }
        if let Some(token) = self.read_script_and_style(c, previous, opened_by_previous) {
            return token;
        }
        if let Some(token) = self.read_control_flows(c, open) {
            return token;
        }
        if let Some(token) = self.read_raw_content(previous, opened_by_previous, open) {
            return token;
        }
        if let Some(token) = self.read_content_word(c, open) {
            return token;
        }
        if let Some(token) = self.read_comment_or_cdata(c) {
            return token;
        }
        if let Some(token) = self.read_processing(c) {
            return token;
        }
        if let Some(token) = self.read_open(c, open) {
            return token;
        }
        let unknown = self.input.next().map(String::from).unwrap_or_default();
        self.create_token(TokenKind::Unknown, unknown)
    }

    fn read_comment_or_cdata(&mut self, c: char) -> Option<Token> {
        if c != '<' || self.input.peek(1) != Some('!') {
            return None;
        }
        let mut directives = None;
        let mut text = self.patterns.comment.read(&mut self.input);
        if !text.is_empty() {
            directives = Directives::parse(&text);
            if directives.as_ref().is_some_and(Directives::starts_ignore) {
                text.push_str(directives::read_ignored(&mut self.input));
            }
        } else {
            text = self.patterns.cdata.read(&mut self.input);
        }
        if text.is_empty() {
            return None;
        }
        let mut token = self.create_token(TokenKind::Comment, text);
        token.directives = directives;
        Some(token)
    }

    fn read_processing(&mut self, c: char) -> Option<Token> {
        if c != '<' || !matches!(self.input.peek(1), Some('!') | Some('?')) {
            return None;
        }
        let mut text = self.patterns.conditional_comment.read(&mut self.input);
        if text.is_empty() {
            text = self.patterns.processing.read(&mut self.input);
        }
        (!text.is_empty()).then(|| self.create_token(TokenKind::Comment, text))
    }

    fn read_open(&mut self, c: char, open: Option<&Token>) -> Option<Token> {
        if !outside_tag(open) || c != '<' {
            return None;
        }
        let mut text = String::new();
        text.extend(self.input.next());
        if self.input.peek(0) == Some('/') {
            text.extend(self.input.next());
        }
        text.push_str(&self.patterns.element_name.read(&mut self.input));
        Some(self.create_token(TokenKind::TagOpen, text))
    }

    fn read_open_handlebars(&mut self, c: char, open: Option<&Token>) -> Option<Token> {
        let enabled =
            self.options.templating_enabled(Templating::Angular) || self.options.indent_handlebars;
        if !outside_tag(open)
            || !enabled
            || c != '{'
            || self.input.peek(1) != Some('{')
        {
            return None;
        }
        if self.options.indent_handlebars && self.input.peek(2) == Some('!') {
            let mut text = self.patterns.handlebars_comment.read(&mut self.input);
            if text.is_empty() {
                text = self.patterns.handlebars.read(&mut self.input);
            }
            return Some(self.create_token(TokenKind::Comment, text));
        }
        let text = self.patterns.handlebars_open.read(&mut self.input);
        Some(self.create_token(TokenKind::TagOpen, text))
    }

    fn read_control_flows(&mut self, c: char, open: Option<&Token>) -> Option<Token> {
        if !self.options.templating_enabled(Templating::Angular) {
            return None;
        }
        if c == '@' {
            let mut text = self.patterns.angular_control_flow_start.read(&mut self.input);
            if text.is_empty() {
                return None;
            }
            let mut opening = usize::from(text.ends_with('('));
            let mut closing = 0usize;
            // the block brace is the first `{` reached with balanced parentheses,
            // e.g. @if({value: true} !== null) {
            while !(text.ends_with('{') && opening == closing) {
                let Some(next) = self.input.next() else {
                    break;
                };
                match next {
                    '(' => opening += 1,
                    ')' => closing += 1,
                    _ => {}
                }
                text.push(next);
            }
            return Some(self.create_token(TokenKind::ControlFlowOpen, text));
        }
        if c == '}' && open.is_some_and(|t| t.kind == TokenKind::ControlFlowOpen) {
            let text = self.input.next().map(String::from).unwrap_or_default();
            return Some(self.create_token(TokenKind::ControlFlowClose, text));
        }
        None
    }

    fn read_close(&mut self, c: char, open: Option<&Token>) -> Option<Token> {
        let open = open.filter(|t| t.kind == TokenKind::TagOpen)?;
        if open.starts_with('<') && (c == '>' || (c == '/' && self.input.peek(1) == Some('>'))) {
            let mut text = String::new();
            text.extend(self.input.next());
            if c == '/' {
                text.extend(self.input.next());
            }
            return Some(self.create_token(TokenKind::TagClose, text));
        }
        if open.starts_with('{') && c == '}' && self.input.peek(1) == Some('}') {
            self.input.next();
            self.input.next();
            return Some(self.create_token(TokenKind::TagClose, "}}"));
        }
        None
    }

    fn read_attribute(
        &mut self,
        c: char,
        previous: &Token,
        open: Option<&Token>,
    ) -> Option<Token> {
        if !open.is_some_and(|t| t.starts_with('<')) {
            return None;
        }
        match c {
            '=' => {
                let text = self.input.next().map(String::from).unwrap_or_default();
                Some(self.create_token(TokenKind::Equals, text))
            }
            '"' | '\'' => {
                let mut text = String::new();
                text.extend(self.input.next());
                let rest = if c == '"' {
                    self.patterns.double_quote.read(&mut self.input)
                } else {
                    self.patterns.single_quote.read(&mut self.input)
                };
                text.push_str(&rest);
                Some(self.create_token(TokenKind::Value, text))
            }
            _ => {
                let text = self.patterns.attribute.read(&mut self.input);
                if text.is_empty() {
                    return None;
                }
                let kind = if previous.kind == TokenKind::Equals {
                    TokenKind::Value
                } else {
                    TokenKind::Attribute
                };
                Some(self.create_token(kind, text))
            }
        }
    }

    /// Contents read verbatim: never for void elements, always for
    /// unformatted and content-unformatted ones.
    fn is_content_unformatted(&self, tag_name: &str) -> bool {
        !self.options.is_void(tag_name)
            && (self.options.is_content_unformatted(tag_name)
                || self.options.is_unformatted(tag_name))
    }

    /// Name of the element whose start tag `previous` (a `>`) just closed.
    fn element_just_opened(previous: &Token, opened: Option<&Token>) -> Option<String> {
        let opened = opened?;
        if previous.kind != TokenKind::TagClose
            || !opened.starts_with('<')
            || previous.starts_with('/')
        {
            return None;
        }
        Some(opened.text[1..].to_lowercase())
    }

    fn read_raw_content(
        &mut self,
        previous: &Token,
        opened: Option<&Token>,
        open: Option<&Token>,
    ) -> Option<Token> {
        let text = if open.is_some_and(|t| t.starts_with('{')) {
            self.patterns.handlebars_raw_close.read(&mut self.input)
        } else {
            match Self::element_just_opened(previous, opened) {
                Some(name) if self.is_content_unformatted(&name) => {
                    let end = find_end_tag(self.input.rest(), &name);
                    self.input.advance(end).to_string()
                }
                _ => String::new(),
            }
        };
        (!text.is_empty()).then(|| self.create_token(TokenKind::Text, text))
    }

    fn read_script_and_style(
        &mut self,
        c: char,
        previous: &Token,
        opened: Option<&Token>,
    ) -> Option<Token> {
        let name = Self::element_just_opened(previous, opened)?;
        if name != "script" && name != "style" {
            return None;
        }
        // the body may be wrapped in a comment or CDATA section
        if let Some(mut token) = self.read_comment_or_cdata(c) {
            token.kind = TokenKind::Text;
            return Some(token);
        }
        let end = find_end_tag(self.input.rest(), &name);
        let text = self.input.advance(end);
        (!text.is_empty()).then(|| self.create_token(TokenKind::Text, text))
    }

    fn read_content_word(&mut self, c: char, open: Option<&Token>) -> Option<Token> {
        let mut text = String::new();
        let delimiter = self.options.unformatted_content_delimiter.as_str();
        if delimiter.starts_with(c) && self.input.rest().starts_with(delimiter) {
            text.push_str(self.input.advance(delimiter.len()));
            let rest = self.input.rest();
            let end = rest.find(delimiter).map_or(rest.len(), |i| i + delimiter.len());
            text.push_str(self.input.advance(end));
        }
        if text.is_empty() {
            text = if open.is_some_and(|t| t.kind == TokenKind::ControlFlowOpen) {
                self.patterns.word_control_flow_close_excluded.read(&mut self.input)
            } else {
                self.patterns.word.read(&mut self.input)
            };
        }
        (!text.is_empty()).then(|| self.create_token(TokenKind::Text, text))
    }
}

fn is_opening(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::TagOpen | TokenKind::ControlFlowOpen)
}

fn is_closing(current: &Token, open: &Token) -> bool {
    match current.kind {
        TokenKind::TagClose => {
            ((current.text == ">" || current.text == "/>") && open.starts_with('<'))
                || (current.text == "}}" && open.text.starts_with("{{"))
        }
        TokenKind::ControlFlowClose => current.text == "}" && open.text.ends_with('{'),
        _ => false,
    }
}

/// No open context, or only an enclosing control-flow block.
fn outside_tag(open: Option<&Token>) -> bool {
    open.map_or(true, |t| t.kind == TokenKind::ControlFlowOpen)
}
