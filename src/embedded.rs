// src/embedded.rs
//
// Text handling for <script> and <style> bodies: which language a body is,
// peeling off a wrapping `<!-- ... -->` or `<![CDATA[ ... ]]>`, and plain
// reindentation when no formatter is registered for the language.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EmbeddedLanguage {
    Javascript,
    Css,
    Html,
}

static JAVASCRIPT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"module|((text|application|dojo)/(x-)?(javascript|ecmascript|jscript|livescript|(ld\+)?json|method|aspect))",
    )
    .unwrap()
});
static HTML_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(text|application|dojo)/(x-)?(html)").unwrap());
static WRAPPED_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(<!--[^\n]*|<!\[CDATA\[)(\n?)([ \t\n]*)([\s\S]*)(-->|]]>)$").unwrap()
});

/// Language of a `script`/`style` body. `type_attribute` is the raw attribute
/// value, quotes included; without one the element's default applies.
pub(crate) fn language_of(tag: &str, type_attribute: Option<&str>) -> Option<EmbeddedLanguage> {
    let default = match tag {
        "script" => "text/javascript",
        "style" => "text/css",
        _ => "",
    };
    let mime = type_attribute.unwrap_or(default);
    if mime.contains("text/css") {
        Some(EmbeddedLanguage::Css)
    } else if JAVASCRIPT_TYPE.is_match(mime) {
        Some(EmbeddedLanguage::Javascript)
    } else if HTML_TYPE.is_match(mime) {
        Some(EmbeddedLanguage::Html)
    } else {
        None
    }
}

/// Drop one final line break and the blanks after it.
pub(crate) fn strip_trailing_blank_line(text: &str) -> &str {
    let trimmed = text.trim_end_matches([' ', '\t']);
    match trimmed.strip_suffix('\n') {
        Some(stripped) => stripped,
        None => text,
    }
}

/// A body wrapped in a comment or CDATA section.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Wrapped<'a> {
    pub(crate) open: &'a str,
    pub(crate) body: &'a str,
    pub(crate) close: &'a str,
    /// Indentation of the body's first line, when the body starts on a line
    /// of its own.
    pub(crate) body_indent: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Body<'a> {
    Plain(&'a str),
    Wrapped(Wrapped<'a>),
    /// Starts like a wrapper but never closes it.
    Unterminated,
}

pub(crate) fn split_body(text: &str) -> Body<'_> {
    if !(text.starts_with("<!--") || text.starts_with("<![CDATA[")) {
        return Body::Plain(text);
    }
    let Some(caps) = WRAPPED_BODY.captures(text) else {
        return Body::Unterminated;
    };
    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
    let leading = group(3);
    let body_indent = if !group(2).is_empty() || leading.contains('\n') {
        let indent = &leading[leading.trim_end_matches([' ', '\t']).len()..];
        Some(indent).filter(|s| !s.is_empty())
    } else {
        None
    };
    Body::Wrapped(Wrapped {
        open: group(1),
        body: strip_trailing_blank_line(group(4)),
        close: group(5),
        body_indent,
    })
}

/// Strip `white` from the start of every continuation line, then prefix every
/// line with `indentation`.
pub(crate) fn reindent(text: &str, white: &str, indentation: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, mut line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !white.is_empty() {
                line = line.strip_prefix(white).unwrap_or(line);
            }
        }
        out.push_str(indentation);
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_tag_and_type() {
        use EmbeddedLanguage::*;
        assert_eq!(language_of("script", None), Some(Javascript));
        assert_eq!(language_of("style", None), Some(Css));
        assert_eq!(language_of("script", Some("\"module\"")), Some(Javascript));
        assert_eq!(language_of("script", Some("'application/ld+json'")), Some(Javascript));
        assert_eq!(language_of("script", Some("\"text/x-html\"")), Some(Html));
        assert_eq!(language_of("script", Some("\"text/template\"")), None);
        assert_eq!(language_of("style", Some("text/css")), Some(Css));
    }

    #[test]
    fn trailing_blank_line() {
        assert_eq!(strip_trailing_blank_line("a\n  "), "a");
        assert_eq!(strip_trailing_blank_line("a\n\n"), "a\n");
        assert_eq!(strip_trailing_blank_line("a  "), "a  ");
    }

    #[test]
    fn comment_wrapped_body() {
        let body = split_body("<!--\n    var a;\n    b();\n//-->");
        assert_eq!(
            body,
            Body::Wrapped(Wrapped {
                open: "<!--",
                body: "var a;\n    b();\n//",
                close: "-->",
                body_indent: Some("    "),
            })
        );
    }

    #[test]
    fn cdata_and_unterminated() {
        let body = split_body("<![CDATA[x]]>");
        assert_eq!(
            body,
            Body::Wrapped(Wrapped {
                open: "<![CDATA[",
                body: "x",
                close: "]]>",
                body_indent: None,
            })
        );
        assert_eq!(split_body("<!-- never closed"), Body::Unterminated);
        assert_eq!(split_body("var x;"), Body::Plain("var x;"));
    }

    #[test]
    fn reindent_strips_first_line_indent() {
        assert_eq!(reindent("a();\n  b();\n c();", "  ", "\t"), "\ta();\n\tb();\n\t c();");
        assert_eq!(reindent("x", "", ""), "x");
    }
}
