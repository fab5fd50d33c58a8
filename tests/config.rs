use std::io::Write;

use markup_beautify::{beautify, Error, IndentScripts, Options, Templating};
use tempfile::NamedTempFile;

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn loads_js_beautify_style_file() {
    let file = config_file(
        r#"{
            "indent_size": 2,
            "indent-scripts": "separate",
            "css": { "indent_size": 8 },
            "html": { "templating": ["angular"], "end_with_newline": true }
        }"#,
    );
    let options = Options::from_file(file.path()).unwrap();
    assert_eq!(options.indent_size, 2);
    assert_eq!(options.indent_scripts, IndentScripts::Separate);
    assert_eq!(options.templating, vec![Templating::Angular]);
    assert_eq!(
        beautify("<div><p>x</p></div>", &options),
        "<div>\n  <p>x</p>\n</div>\n"
    );
}

#[test]
fn tabs_from_config() {
    let file = config_file(r#"{"indent_with_tabs": true}"#);
    let options = Options::from_file(file.path()).unwrap();
    assert_eq!(beautify("<div><p>x</p></div>", &options), "<div>\n\t<p>x</p>\n</div>");
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Options::from_file(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn malformed_json_is_json_error() {
    let file = config_file("{ indent_size: ");
    let err = Options::from_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
    assert!(err.to_string().starts_with("Invalid options file"));
}
