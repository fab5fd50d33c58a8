use std::fs;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_markup-beautify"))
}

#[test]
fn overwrites_input_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<div><p>x</p></div>").unwrap();

    let status = bin().arg(&input).status().unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&input).unwrap(), "<div>\n    <p>x</p>\n</div>");
}

#[test]
fn writes_to_output_with_flags() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.html");
    let output = dir.path().join("out.html");
    fs::write(&input, "<div><p>x</p></div>").unwrap();

    let status = bin()
        .args(["--indent-size", "2", "--end-with-newline"])
        .arg(&input)
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&input).unwrap(), "<div><p>x</p></div>");
    assert_eq!(fs::read_to_string(&output).unwrap(), "<div>\n  <p>x</p>\n</div>\n");
}

#[test]
fn bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.html");
    let config = dir.path().join("opts.json");
    fs::write(&input, "<p>x</p>").unwrap();
    fs::write(&config, r#"{"wrap_attributes": "sideways"}"#).unwrap();

    let status = bin().arg("--config").arg(&config).arg(&input).status().unwrap();
    assert!(!status.success());
    assert_eq!(fs::read_to_string(&input).unwrap(), "<p>x</p>");
}
