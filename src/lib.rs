// src/lib.rs
//
// markup-beautify — HTML / Handlebars / Angular template beautifier
//
// - `tokenizer`: context-sensitive lexer (tags, attributes, comments, raw
//   script/style bodies, template regions, Angular control flow).
// - `beautifier`: single-pass engine deciding line breaks and indentation from
//   a stack of open tags, including HTML5 optional end tags.
// - `options`: js-beautify compatible configuration, loadable from JSON.
//
// The transform is text to text and never fails on malformed markup.

mod beautifier;
pub mod directives;
mod embedded;
mod error;
mod optional_end;
pub mod options;
mod output;
mod pattern;
mod scanner;
mod tag_stack;
pub mod tokenizer;

pub use beautifier::{Beautifier, SubFormatter};
pub use error::{Error, Result};
pub use options::{IndentScripts, Options, Templating, WrapAttributes};

/// Beautify `source` with `options` and no embedded-language formatters.
pub fn beautify(source: &str, options: &Options) -> String {
    Beautifier::new(options).beautify(source)
}
