// src/optional_end.rs
//
// HTML5 optional end tags: a start tag may imply the end of an open sibling
// (`<li>` after `<li>`, `<td>` after `<td>`, a block after an open `<p>`...).
// Elements whose end tag is implied by the parent closing need nothing here:
// popping the parent pops them too.

use crate::tag_stack::{TagId, TagStack};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Condition {
    Always,
    /// The direct parent is a `p` that is not itself inside one of
    /// `P_PARENT_EXCLUDES`.
    ParentIsP,
}

struct Rule {
    triggers: &'static [&'static str],
    /// Tried in order; the first successful pop ends the rule.
    pops: &'static [&'static str],
    stop_at: &'static [&'static str],
    condition: Condition,
}

const P_CLOSERS: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
];

const P_PARENT_EXCLUDES: &[&str] = &["a", "audio", "del", "ins", "map", "noscript", "video"];

const TABLE_SECTIONS: &[&str] = &["table", "thead", "tbody", "tfoot"];
const TABLE_CELL_STOPS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr"];

static RULES: &[Rule] = &[
    Rule {
        triggers: &["body"],
        pops: &["head"],
        stop_at: &[],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["li"],
        pops: &["li"],
        stop_at: &["ol", "ul", "menu"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["dd", "dt"],
        pops: &["dt", "dd"],
        stop_at: &["dl"],
        condition: Condition::Always,
    },
    Rule {
        triggers: P_CLOSERS,
        pops: &["p"],
        stop_at: &[],
        condition: Condition::ParentIsP,
    },
    Rule {
        triggers: &["rp", "rt"],
        pops: &["rt", "rp"],
        stop_at: &["ruby", "rtc"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["optgroup"],
        pops: &["optgroup"],
        stop_at: &["select"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["option"],
        pops: &["option"],
        stop_at: &["select", "datalist", "optgroup"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["colgroup"],
        pops: &["caption"],
        stop_at: &["table"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["thead"],
        pops: &["caption", "colgroup"],
        stop_at: &["table"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["tbody", "tfoot"],
        pops: &["caption", "colgroup", "thead", "tbody"],
        stop_at: &["table"],
        condition: Condition::Always,
    },
    Rule {
        triggers: &["tr"],
        pops: &["caption", "colgroup", "tr"],
        stop_at: TABLE_SECTIONS,
        condition: Condition::Always,
    },
    Rule {
        triggers: &["th", "td"],
        pops: &["td", "th"],
        stop_at: TABLE_CELL_STOPS,
        condition: Condition::Always,
    },
];

/// The element a start tag opens inside.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Parent<'a> {
    pub(crate) tag_name: &'a str,
    /// Tag name of the parent's own parent, if any.
    pub(crate) grandparent: Option<&'a str>,
}

impl Condition {
    fn holds(self, parent: Parent<'_>) -> bool {
        match self {
            Condition::Always => true,
            Condition::ParentIsP => {
                parent.tag_name == "p"
                    && parent
                        .grandparent
                        .map_or(true, |g| !P_PARENT_EXCLUDES.contains(&g))
            }
        }
    }
}

/// Close whatever element the start tag `tag_name` implicitly ends. Returns
/// the tag that was closed, restoring `indent_level` to its level.
pub(crate) fn close_implied(
    tag_name: &str,
    parent: Parent<'_>,
    stack: &mut TagStack,
    indent_level: &mut usize,
) -> Option<TagId> {
    let rule = RULES
        .iter()
        .find(|r| r.triggers.contains(&tag_name) && r.condition.holds(parent))?;
    let closed = rule
        .pops
        .iter()
        .find_map(|pop| stack.try_pop(pop, rule.stop_at, indent_level).map(|id| (*pop, id)));
    if let Some((pop, _)) = closed {
        log::debug!("<{tag_name}> implies </{pop}>");
    }
    closed.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(tags: &[&str]) -> TagStack {
        let mut stack = TagStack::new();
        for (i, tag) in tags.iter().enumerate() {
            stack.record(tag, i, i);
        }
        stack
    }

    fn parent<'a>(tag_name: &'a str, grandparent: Option<&'a str>) -> Parent<'a> {
        Parent {
            tag_name,
            grandparent,
        }
    }

    #[test]
    fn li_closes_open_li() {
        let mut s = stack(&["ul", "li"]);
        let mut level = 2;
        let closed = close_implied("li", parent("li", Some("ul")), &mut s, &mut level);
        assert_eq!(closed, Some(1));
        assert_eq!(level, 1);
        assert_eq!(s.current(), Some(0));
    }

    #[test]
    fn nested_list_stops_the_search() {
        let mut s = stack(&["ul", "li", "ol"]);
        let mut level = 3;
        assert_eq!(close_implied("li", parent("ol", Some("li")), &mut s, &mut level), None);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn block_closes_p_unless_inside_excluded_parent() {
        let mut s = stack(&["body", "p"]);
        let mut level = 2;
        assert_eq!(close_implied("div", parent("p", Some("body")), &mut s, &mut level), Some(1));

        let mut s = stack(&["a", "p"]);
        let mut level = 2;
        assert_eq!(close_implied("div", parent("p", Some("a")), &mut s, &mut level), None);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn p_rule_needs_direct_p_parent() {
        let mut s = stack(&["p", "span"]);
        let mut level = 2;
        assert_eq!(close_implied("div", parent("span", Some("p")), &mut s, &mut level), None);
    }

    #[test]
    fn first_successful_pop_ends_the_rule() {
        let mut s = stack(&["table", "thead", "tbody"]);
        let mut level = 3;
        // thead is popped (taking tbody with it); the tbody candidate is not tried
        let closed = close_implied("tbody", parent("tbody", Some("thead")), &mut s, &mut level);
        assert_eq!(closed, Some(1));
        assert_eq!(s.current(), Some(0));
    }

    #[test]
    fn cells_and_rows() {
        let mut s = stack(&["table", "tr", "td"]);
        let mut level = 3;
        assert_eq!(close_implied("th", parent("td", Some("tr")), &mut s, &mut level), Some(2));
        let mut s = stack(&["table", "tr", "td"]);
        assert_eq!(close_implied("tr", parent("td", Some("tr")), &mut s, &mut level), Some(1));
        assert_eq!(s.current(), Some(0));
    }

    #[test]
    fn unrelated_tag_closes_nothing() {
        let mut s = stack(&["div", "span"]);
        let mut level = 2;
        assert_eq!(close_implied("em", parent("span", Some("div")), &mut s, &mut level), None);
    }
}
