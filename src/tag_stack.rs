// src/tag_stack.rs
//
// Stack of open elements, innermost last. Each frame remembers the indent level
// that was current when the element opened, so popping it restores that level.

/// Index of a tag in the engine's tag arena.
pub type TagId = usize;

#[derive(Clone, Debug)]
struct Frame {
    tag: String,
    indent_level: usize,
    tag_id: TagId,
}

#[derive(Debug, Default)]
pub(crate) struct TagStack {
    frames: Vec<Frame>,
}

impl TagStack {
    pub(crate) fn new() -> Self {
        TagStack::default()
    }

    pub(crate) fn record(&mut self, tag: &str, tag_id: TagId, indent_level: usize) {
        self.frames.push(Frame {
            tag: tag.to_string(),
            indent_level,
            tag_id,
        });
    }

    pub(crate) fn current(&self) -> Option<TagId> {
        self.frames.last().map(|f| f.tag_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    /// Innermost frame whose tag is in `tags`, unless a `stop` tag comes first.
    fn find(&self, tags: &[&str], stop: &[&str]) -> Option<usize> {
        for (i, frame) in self.frames.iter().enumerate().rev() {
            if tags.contains(&frame.tag.as_str()) {
                return Some(i);
            }
            if stop.contains(&frame.tag.as_str()) {
                return None;
            }
        }
        None
    }

    /// Close the innermost `tag` and everything opened inside it, restoring
    /// `indent_level` to what it was when `tag` opened.
    pub(crate) fn try_pop(
        &mut self,
        tag: &str,
        stop: &[&str],
        indent_level: &mut usize,
    ) -> Option<TagId> {
        let i = self.find(&[tag], stop)?;
        let frame = self.frames.drain(i..).next()?;
        *indent_level = frame.indent_level;
        Some(frame.tag_id)
    }

    /// Adopt the indent level of the innermost frame in `tags`, popping nothing.
    pub(crate) fn indent_to(&self, tags: &[&str], indent_level: &mut usize) {
        if let Some(i) = self.find(tags, &[]) {
            *indent_level = self.frames[i].indent_level;
        }
    }
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

    #[test]
    fn pop_discards_inner_frames_and_restores_indent() {
        let mut s = stack(&["html", "body", "div", "span"]);
        let mut level = 9;
        assert_eq!(s.try_pop("body", &[], &mut level), Some(1));
        assert_eq!(level, 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.current(), Some(0));
    }

    #[test]
    fn stop_list_blocks_the_search() {
        let mut s = stack(&["ul", "li", "ol"]);
        let mut level = 3;
        assert_eq!(s.try_pop("li", &["ol", "ul"], &mut level), None);
        assert_eq!(level, 3);
        assert_eq!(s.len(), 3);
        assert_eq!(s.try_pop("li", &[], &mut level), Some(1));
    }

    #[test]
    fn unmatched_pop_is_a_no_op() {
        let mut s = stack(&["div"]);
        let mut level = 1;
        assert_eq!(s.try_pop("span", &[], &mut level), None);
        assert_eq!(s.len(), 1);
        assert_eq!(TagStack::new().try_pop("div", &[], &mut level), None);
    }

    #[test]
    fn indent_to_keeps_frames() {
        let s = stack(&["if", "div", "each", "p"]);
        let mut level = 7;
        s.indent_to(&["if", "unless", "each"], &mut level);
        assert_eq!(level, 2);
        assert_eq!(s.len(), 4);
    }
}
