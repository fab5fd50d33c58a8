// src/main.rs
//
// markup-beautify — reindent HTML and template markup in place
//
// - Reads the input file, beautifies it and writes the result to OUTPUT, or
//   back over the input when no OUTPUT is given.
// - Options come from an optional js-beautify style JSON file (`--config`);
//   command line flags override the file.
// - Line endings follow the input unless `--eol` says otherwise.
//
// CLI flags:
//   --config <FILE>                   : JSON options file ("html" section honored)
//   --indent-size <N>                 : spaces per indent level
//   --indent-with-tabs                : indent with tabs
//   --wrap-line-length <N>            : wrap lines longer than N (0 = never)
//   --wrap-attributes <MODE>          : auto, force, force-aligned, ...
//   --wrap-attributes-min-attrs <N>   : attribute count that triggers force wrapping
//   --indent-scripts <MODE>           : normal, keep, separate
//   --templating <LIST>               : comma separated dialects (auto, none, angular, ...)
//   --max-preserve-newlines <N>       : cap on preserved blank lines
//   --no-preserve-newlines            : drop blank lines from the input
//   --indent-inner-html               : indent <head> and <body> inside <html>
//   --end-with-newline                : terminate output with a newline
//   --eol <STR>                       : line ending for the output

use clap::{ArgAction, Parser};
use markup_beautify::{IndentScripts, Options, Result, Templating, WrapAttributes};
use std::fs;
use std::path::PathBuf;

/// CLI flags
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON options file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Spaces per indent level
    #[arg(long)]
    indent_size: Option<usize>,

    /// Indent with tabs
    #[arg(long, action = ArgAction::SetTrue)]
    indent_with_tabs: bool,

    /// Wrap lines longer than this (0 disables wrapping)
    #[arg(long)]
    wrap_line_length: Option<usize>,

    /// Attribute wrapping mode
    #[arg(long)]
    wrap_attributes: Option<WrapAttributes>,

    /// Minimum attribute count before force modes wrap
    #[arg(long)]
    wrap_attributes_min_attrs: Option<usize>,

    /// Indentation of script and style bodies
    #[arg(long)]
    indent_scripts: Option<IndentScripts>,

    /// Template dialects to recognize
    #[arg(long, value_delimiter = ',')]
    templating: Option<Vec<Templating>>,

    /// Maximum number of consecutive blank lines kept
    #[arg(long)]
    max_preserve_newlines: Option<usize>,

    /// Do not keep blank lines from the input
    #[arg(long = "no-preserve-newlines", action = ArgAction::SetTrue)]
    no_preserve_newlines: bool,

    /// Indent <head> and <body> inside <html>
    #[arg(long, action = ArgAction::SetTrue)]
    indent_inner_html: bool,

    /// End the output with a newline
    #[arg(long, action = ArgAction::SetTrue)]
    end_with_newline: bool,

    /// Line ending for the output ("auto" follows the input)
    #[arg(long)]
    eol: Option<String>,

    /// Input file
    input: PathBuf,

    /// Output file (default: overwrite input)
    output: Option<PathBuf>,
}

impl Cli {
    /// Config file first, then flags on top.
    fn options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => Options::from_file(path)?,
            None => Options::default(),
        };
        if let Some(n) = self.indent_size {
            options.indent_size = n;
        }
        if self.indent_with_tabs {
            options.indent_with_tabs = Some(true);
        }
        if let Some(n) = self.wrap_line_length {
            options.wrap_line_length = n;
        }
        if let Some(mode) = self.wrap_attributes {
            options.wrap_attributes = mode;
        }
        if let Some(n) = self.wrap_attributes_min_attrs {
            options.wrap_attributes_min_attrs = n;
        }
        if let Some(mode) = self.indent_scripts {
            options.indent_scripts = mode;
        }
        if let Some(list) = &self.templating {
            options.templating = list.clone();
        }
        if let Some(n) = self.max_preserve_newlines {
            options.max_preserve_newlines = n;
        }
        if self.no_preserve_newlines {
            options.preserve_newlines = false;
        }
        if self.indent_inner_html {
            options.indent_inner_html = true;
        }
        if self.end_with_newline {
            options.end_with_newline = true;
        }
        if let Some(eol) = &self.eol {
            options.eol = eol.clone();
        }
        Ok(options.normalize())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = cli.options()?;

    let src = fs::read_to_string(&cli.input)?;
    let out = markup_beautify::beautify(&src, &options);

    let out_path = cli.output.as_ref().unwrap_or(&cli.input);
    fs::write(out_path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_config_file() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        write!(config, r#"{{"indent_size": 2, "wrap-line-length": "80"}}"#).unwrap();
        let path = config.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from([
            "markup-beautify",
            "--config",
            path.as_str(),
            "--indent-size",
            "3",
            "--templating",
            "angular,handlebars",
            "--wrap-attributes",
            "force-aligned",
            "in.html",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.indent_size, 3);
        assert_eq!(options.wrap_line_length, 80);
        assert_eq!(options.templating, vec![Templating::Angular, Templating::Handlebars]);
        assert_eq!(options.wrap_attributes, WrapAttributes::ForceAligned);
        assert!(cli.output.is_none());
    }

    #[test]
    fn rejects_unknown_mode() {
        let parsed = Cli::try_parse_from(["markup-beautify", "--indent-scripts", "nope", "in.html"]);
        assert!(parsed.is_err());
    }
}
