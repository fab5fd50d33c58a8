// src/options.rs
//
// Beautifier configuration. Options are plain data: the engine only reads them.
// Loading accepts js-beautify style JSON (dashed or underscored keys, numbers as
// strings, comma-separated lists, an optional "html" section overriding the
// top level). `normalize` resolves the derived values and is idempotent.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/* ============================== Enumerations ============================= */

/// Attribute wrapping policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapAttributes {
    #[default]
    Auto,
    Force,
    ForceAligned,
    ForceExpandMultiline,
    AlignedMultiple,
    Preserve,
    PreserveAligned,
}

impl WrapAttributes {
    pub fn is_force(self) -> bool {
        matches!(
            self,
            WrapAttributes::Force | WrapAttributes::ForceAligned | WrapAttributes::ForceExpandMultiline
        )
    }

    pub fn is_preserve(self) -> bool {
        matches!(self, WrapAttributes::Preserve | WrapAttributes::PreserveAligned)
    }

    /// Wrapped attributes line up with the first one instead of a fixed indent.
    pub fn is_aligned(self) -> bool {
        matches!(
            self,
            WrapAttributes::ForceAligned
                | WrapAttributes::AlignedMultiple
                | WrapAttributes::PreserveAligned
        )
    }

    fn name(self) -> &'static str {
        match self {
            WrapAttributes::Auto => "auto",
            WrapAttributes::Force => "force",
            WrapAttributes::ForceAligned => "force-aligned",
            WrapAttributes::ForceExpandMultiline => "force-expand-multiline",
            WrapAttributes::AlignedMultiple => "aligned-multiple",
            WrapAttributes::Preserve => "preserve",
            WrapAttributes::PreserveAligned => "preserve-aligned",
        }
    }
}

impl FromStr for WrapAttributes {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "auto" => WrapAttributes::Auto,
            "force" => WrapAttributes::Force,
            "force-aligned" => WrapAttributes::ForceAligned,
            "force-expand-multiline" => WrapAttributes::ForceExpandMultiline,
            "aligned-multiple" => WrapAttributes::AlignedMultiple,
            "preserve" => WrapAttributes::Preserve,
            "preserve-aligned" => WrapAttributes::PreserveAligned,
            _ => return Err(invalid("wrap_attributes", s)),
        })
    }
}

impl fmt::Display for WrapAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where embedded script/style bodies are indented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndentScripts {
    /// One level deeper than the script tag.
    #[default]
    Normal,
    /// Same level as the script tag.
    Keep,
    /// Flush left.
    Separate,
}

impl FromStr for IndentScripts {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "normal" => IndentScripts::Normal,
            "keep" => IndentScripts::Keep,
            "separate" => IndentScripts::Separate,
            _ => return Err(invalid("indent_scripts", s)),
        })
    }
}

impl fmt::Display for IndentScripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndentScripts::Normal => "normal",
            IndentScripts::Keep => "keep",
            IndentScripts::Separate => "separate",
        })
    }
}

/// Template dialects recognized inside markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Templating {
    Auto,
    None,
    Angular,
    Django,
    Erb,
    Handlebars,
    Php,
    Smarty,
}

impl FromStr for Templating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "auto" => Templating::Auto,
            "none" => Templating::None,
            "angular" => Templating::Angular,
            "django" => Templating::Django,
            "erb" => Templating::Erb,
            "handlebars" => Templating::Handlebars,
            "php" => Templating::Php,
            "smarty" => Templating::Smarty,
            other => return Err(invalid("templating", other)),
        })
    }
}

impl fmt::Display for Templating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Templating::Auto => "auto",
            Templating::None => "none",
            Templating::Angular => "angular",
            Templating::Django => "django",
            Templating::Erb => "erb",
            Templating::Handlebars => "handlebars",
            Templating::Php => "php",
            Templating::Smarty => "smarty",
        })
    }
}

fn invalid(name: &'static str, value: &str) -> Error {
    Error::InvalidOption {
        name,
        value: value.to_string(),
    }
}

/* ================================ Defaults =============================== */

const INLINE: &[&str] = &[
    "a", "abbr", "area", "audio", "b", "bdi", "bdo", "br", "button", "canvas", "cite", "code",
    "data", "datalist", "del", "dfn", "em", "embed", "i", "iframe", "img", "input", "ins", "kbd",
    "keygen", "label", "map", "mark", "math", "meter", "noscript", "object", "output", "progress",
    "q", "ruby", "s", "samp", "select", "small", "span", "strong", "sub", "sup", "svg", "template",
    "textarea", "time", "u", "var", "video", "wbr", "text", "acronym", "big", "strike", "tt",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr", "!doctype", "?xml", "basefont", "isindex",
];

const EXTRA_LINERS: &[&str] = &["head", "body", "/html"];

const CONTENT_UNFORMATTED: &[&str] = &["pre", "textarea"];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/* ================================= Options =============================== */

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Return the input untouched.
    pub disabled: bool,
    /// "auto" or a literal line ending.
    pub eol: String,
    pub end_with_newline: bool,
    #[serde(deserialize_with = "number")]
    pub indent_size: usize,
    pub indent_char: String,
    /// Base indentation in units; overrides the first line's leading whitespace.
    #[serde(deserialize_with = "number")]
    pub indent_level: usize,
    pub indent_with_tabs: Option<bool>,
    pub preserve_newlines: bool,
    #[serde(deserialize_with = "number")]
    pub max_preserve_newlines: usize,
    #[serde(alias = "max_line_length", deserialize_with = "number")]
    pub wrap_line_length: usize,
    pub indent_empty_lines: bool,
    #[serde(deserialize_with = "list")]
    pub templating: Vec<Templating>,
    pub indent_inner_html: bool,
    pub indent_body_inner_html: bool,
    pub indent_head_inner_html: bool,
    pub indent_handlebars: bool,
    pub wrap_attributes: WrapAttributes,
    #[serde(deserialize_with = "number")]
    pub wrap_attributes_min_attrs: usize,
    pub wrap_attributes_indent_size: Option<usize>,
    #[serde(deserialize_with = "list")]
    pub extra_liners: Vec<String>,
    #[serde(deserialize_with = "list")]
    pub inline: Vec<String>,
    pub inline_custom_elements: bool,
    #[serde(deserialize_with = "list")]
    pub void_elements: Vec<String>,
    #[serde(deserialize_with = "list")]
    pub unformatted: Vec<String>,
    #[serde(deserialize_with = "list")]
    pub content_unformatted: Vec<String>,
    pub unformatted_content_delimiter: String,
    pub indent_scripts: IndentScripts,
    /// Limit for embedded html recursing into the beautifier.
    #[serde(deserialize_with = "number")]
    pub max_nesting_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            disabled: false,
            eol: "auto".to_string(),
            end_with_newline: false,
            indent_size: 4,
            indent_char: " ".to_string(),
            indent_level: 0,
            indent_with_tabs: None,
            preserve_newlines: true,
            max_preserve_newlines: 32786,
            wrap_line_length: 0,
            indent_empty_lines: false,
            templating: vec![Templating::Auto],
            indent_inner_html: false,
            indent_body_inner_html: true,
            indent_head_inner_html: true,
            indent_handlebars: true,
            wrap_attributes: WrapAttributes::Auto,
            wrap_attributes_min_attrs: 2,
            wrap_attributes_indent_size: None,
            extra_liners: owned(EXTRA_LINERS),
            inline: owned(INLINE),
            inline_custom_elements: true,
            void_elements: owned(VOID_ELEMENTS),
            unformatted: Vec::new(),
            content_unformatted: owned(CONTENT_UNFORMATTED),
            unformatted_content_delimiter: String::new(),
            indent_scripts: IndentScripts::Normal,
            max_nesting_depth: 32,
        }
    }
}

impl Options {
    /// Parse a js-beautify style options object.
    pub fn from_json(text: &str) -> Result<Options> {
        let value: Value = serde_json::from_str(text)?;
        let merged = match value {
            Value::Object(map) => Value::Object(merge_html_section(map)),
            other => other,
        };
        Ok(serde_json::from_value(merged)?)
    }

    pub fn from_file(path: &Path) -> Result<Options> {
        let text = fs::read_to_string(path)?;
        Options::from_json(&text)
    }

    /// Resolve derived settings. Safe to call more than once.
    pub fn normalize(mut self) -> Options {
        let tabs = self.indent_with_tabs.unwrap_or(self.indent_char == "\t");
        if tabs {
            self.indent_char = "\t".to_string();
            if self.indent_size == 1 {
                self.indent_size = 4;
            }
        }
        self.indent_with_tabs = Some(tabs);

        if !self.preserve_newlines {
            self.max_preserve_newlines = 0;
        }

        if self.templating.is_empty() || self.templating == [Templating::Auto] {
            self.templating = vec![
                Templating::Django,
                Templating::Erb,
                Templating::Handlebars,
                Templating::Php,
            ];
        }

        if self.wrap_attributes_indent_size.is_none() {
            self.wrap_attributes_indent_size = Some(self.indent_size);
        }
        self
    }

    pub fn templating_enabled(&self, dialect: Templating) -> bool {
        self.templating.contains(&dialect)
    }

    pub fn indent_with_tabs(&self) -> bool {
        self.indent_with_tabs.unwrap_or(self.indent_char == "\t")
    }

    pub fn wrap_attributes_indent_size(&self) -> usize {
        self.wrap_attributes_indent_size.unwrap_or(self.indent_size)
    }

    /// Line ending to emit for `source`.
    pub fn resolve_eol(&self, source: &str) -> String {
        if self.eol != "auto" {
            return self.eol.clone();
        }
        let bytes = source.as_bytes();
        match memchr::memchr2(b'\r', b'\n', bytes) {
            Some(i) if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') => "\r\n".to_string(),
            Some(i) if bytes[i] == b'\r' => "\r".to_string(),
            _ => "\n".to_string(),
        }
    }

    pub(crate) fn is_void(&self, tag: &str) -> bool {
        in_list(&self.void_elements, tag)
    }

    pub(crate) fn is_inline(&self, tag: &str) -> bool {
        in_list(&self.inline, tag)
    }

    pub(crate) fn is_unformatted(&self, tag: &str) -> bool {
        in_list(&self.unformatted, tag)
    }

    pub(crate) fn is_content_unformatted(&self, tag: &str) -> bool {
        in_list(&self.content_unformatted, tag)
    }

    pub(crate) fn is_extra_liner(&self, tag: &str) -> bool {
        in_list(&self.extra_liners, tag)
    }
}

fn in_list(list: &[String], name: &str) -> bool {
    list.iter().any(|s| s == name)
}

/* ============================ JSON normalization ========================= */

/// Dashed keys become underscored, and the "html" section wins over the top
/// level. Sections for other languages are dropped.
fn merge_html_section(map: Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    let mut html = None;
    for (key, value) in map {
        let key = key.replace('-', "_");
        match key.as_str() {
            "html" => html = Some(value),
            "js" | "css" => {}
            _ => {
                merged.insert(key, value);
            }
        }
    }
    if let Some(Value::Object(section)) = html {
        for (key, value) in section {
            merged.insert(key.replace('-', "_"), value);
        }
    }
    merged
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(usize),
    Text(String),
}

fn number<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let items = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(v) => v,
    };
    items
        .iter()
        .map(|s| s.parse::<T>().map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_normalize_templating_auto() {
        let opts = Options::default().normalize();
        assert_eq!(
            opts.templating,
            vec![
                Templating::Django,
                Templating::Erb,
                Templating::Handlebars,
                Templating::Php
            ]
        );
        assert_eq!(opts.wrap_attributes_indent_size, Some(4));
        assert_eq!(opts.indent_with_tabs, Some(false));
    }

    #[test]
    fn normalize_is_idempotent() {
        let opts = Options {
            indent_char: "\t".to_string(),
            indent_size: 1,
            preserve_newlines: false,
            ..Options::default()
        };
        let once = opts.normalize();
        let twice = once.clone().normalize();
        assert_eq!(once, twice);
        assert_eq!(once.indent_size, 4);
        assert_eq!(once.max_preserve_newlines, 0);
    }

    #[test]
    fn json_accepts_dashes_strings_and_html_section() {
        let opts = Options::from_json(
            r#"{
                "indent_size": "2",
                "wrap-attributes": "force-aligned",
                "templating": "angular, handlebars",
                "brace_style": "collapse",
                "html": { "indent-size": 3, "extra_liners": [] }
            }"#,
        )
        .unwrap();
        assert_eq!(opts.indent_size, 3);
        assert_eq!(opts.wrap_attributes, WrapAttributes::ForceAligned);
        assert_eq!(
            opts.templating,
            vec![Templating::Angular, Templating::Handlebars]
        );
        assert!(opts.extra_liners.is_empty());
    }

    #[test]
    fn json_rejects_unknown_enum_value() {
        let err = Options::from_json(r#"{"indent_scripts": "sideways"}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn from_str_reports_option_name() {
        let err = "diagonal".parse::<WrapAttributes>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value \"diagonal\" for option `wrap_attributes`"
        );
    }

    #[test]
    fn eol_detection() {
        let opts = Options::default();
        assert_eq!(opts.resolve_eol("<a>\r\n</a>"), "\r\n");
        assert_eq!(opts.resolve_eol("<a>\r</a>"), "\r");
        assert_eq!(opts.resolve_eol("<a></a>"), "\n");
        let fixed = Options {
            eol: "\r\n".to_string(),
            ..Options::default()
        };
        assert_eq!(fixed.resolve_eol("a\nb"), "\r\n");
    }
}
