use markup_beautify::{beautify, Options, WrapAttributes};
use proptest::prelude::*;

/// Leaf content: words, inline and void elements, comments, handlebars.
fn atom() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        Just("<br>".to_string()),
        Just("<img src=\"a.png\" alt=\"\">".to_string()),
        Just("<!-- note -->".to_string()),
        Just("{{name}}".to_string()),
        "[a-z]{1,6}".prop_map(|w| format!("<b>{w}</b>")),
        "[a-z]{1,6}".prop_map(|w| format!("<span class=\"x\">{w}</span>")),
    ]
}

/// Nested markup with attributes. `p` and `li` may leave out their end tag.
fn markup() -> impl Strategy<Value = String> {
    let leaf = prop::collection::vec(atom(), 1..5).prop_map(|atoms| atoms.join(" "));
    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            prop::sample::select(vec!["div", "section", "article", "p", "ul", "li"]),
            prop::sample::select(vec!["", " id=\"main\"", " class=\"a b\" data-x=\"1\""]),
            prop::collection::vec(inner, 1..4),
            any::<bool>(),
        )
            .prop_map(|(tag, attrs, children, close)| {
                let end = if close || !matches!(tag, "p" | "li") {
                    format!("</{tag}>")
                } else {
                    String::new()
                };
                format!("<{tag}{attrs}>{}{end}", children.join(" "))
            })
    })
}

/// Balanced blocks with paragraphs of words at the leaves.
fn blocks() -> impl Strategy<Value = String> {
    let paragraph = prop::collection::vec("[a-z]{1,8}", 1..5)
        .prop_map(|words| format!("<p>{}</p>", words.join(" ")));
    paragraph.prop_recursive(4, 32, 4, |inner| {
        (
            prop::sample::select(vec!["div", "section", "article"]),
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()))
    })
}

fn wrap_mode() -> impl Strategy<Value = WrapAttributes> {
    prop::sample::select(vec![
        WrapAttributes::Auto,
        WrapAttributes::Force,
        WrapAttributes::Preserve,
        WrapAttributes::ForceExpandMultiline,
    ])
}

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #[test]
    fn beautify_is_idempotent(source in markup(), wrap_attributes in wrap_mode()) {
        let options = Options { wrap_attributes, ..Options::default() };
        let once = beautify(&source, &options);
        let twice = beautify(&once, &options);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn only_whitespace_changes(source in markup(), wrap_attributes in wrap_mode()) {
        let options = Options { wrap_attributes, ..Options::default() };
        let out = beautify(&source, &options);
        prop_assert_eq!(squeeze(&out), squeeze(&source));
    }

    #[test]
    fn no_trailing_whitespace(source in blocks(), indent_size in 1usize..8) {
        let options = Options { indent_size, ..Options::default() };
        let out = beautify(&source, &options);
        for line in out.lines() {
            prop_assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn arbitrary_input_never_panics(source in "[<>/a-z{}\"'= !\n-]{0,64}") {
        let _ = beautify(&source, &Options::default());
    }
}
