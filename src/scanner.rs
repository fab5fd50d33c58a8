// src/scanner.rs
//
// Character cursor over the line-ending-normalized input. Positions are byte
// offsets into the source; `peek`/`next` step by chars so multi-byte text is
// never split. Past the end every read yields `None` or an empty string.

use regex::Regex;

pub(crate) struct InputScanner<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> InputScanner<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        InputScanner { input, position: 0 }
    }

    /// Unread remainder of the input.
    pub(crate) fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Consume `len` bytes; `len` must land on a char boundary.
    pub(crate) fn advance(&mut self, len: usize) -> &'a str {
        let start = self.position;
        self.position = (start + len).min(self.input.len());
        &self.input[start..self.position]
    }

    /// Char `offset` positions ahead of the cursor.
    pub(crate) fn peek(&self, offset: usize) -> Option<char> {
        self.input[self.position..].chars().nth(offset)
    }

    pub(crate) fn next(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// Match `pattern` exactly at the cursor and consume it.
    pub(crate) fn match_at(&mut self, pattern: &Regex) -> Option<&'a str> {
        let m = pattern.find_at(self.input, self.position)?;
        if m.start() != self.position || m.is_empty() {
            return None;
        }
        self.position = m.end();
        Some(m.as_str())
    }

    /// Consume up to (not including) the next match of `pattern`, or to the end.
    #[cfg(test)]
    pub(crate) fn read_until(&mut self, pattern: &Regex) -> &'a str {
        self.read_until_impl(pattern, false)
    }

    /// Consume through the end of the next match of `pattern`, or to the end.
    pub(crate) fn read_until_after(&mut self, pattern: &Regex) -> &'a str {
        self.read_until_impl(pattern, true)
    }

    fn read_until_impl(&mut self, pattern: &Regex, until_after: bool) -> &'a str {
        let start = self.position;
        let end = match pattern.find_at(self.input, start) {
            Some(m) if until_after => m.end(),
            Some(m) => m.start(),
            None => self.input.len(),
        };
        self.position = end;
        &self.input[start..end]
    }

    /// Optional sticky `starting` match, then an optional read up to `until`.
    /// The `until` part only runs when there was no `starting` pattern or it
    /// matched.
    pub(crate) fn read(
        &mut self,
        starting: Option<&Regex>,
        until: Option<&Regex>,
        until_after: bool,
    ) -> String {
        let mut val = String::new();
        let mut matched = false;
        if let Some(pattern) = starting {
            if let Some(s) = self.match_at(pattern) {
                val.push_str(s);
                matched = true;
            }
        }
        if let Some(pattern) = until {
            if matched || starting.is_none() {
                val.push_str(self.read_until_impl(pattern, until_after));
            }
        }
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_and_next_walk_chars() {
        let mut s = InputScanner::new("añb");
        assert_eq!(s.peek(1), Some('ñ'));
        assert_eq!(s.next(), Some('a'));
        assert_eq!(s.next(), Some('ñ'));
        assert_eq!(s.next(), Some('b'));
        assert_eq!(s.next(), None);
        assert_eq!(s.peek(0), None);
        assert_eq!(s.rest(), "");
    }

    #[test]
    fn read_until_stops_before_match() {
        let re = Regex::new("-->").unwrap();
        let mut s = InputScanner::new("abc-->def");
        assert_eq!(s.read_until(&re), "abc");
        assert_eq!(s.read_until_after(&re), "-->");
        assert_eq!(s.read_until(&re), "def");
        assert_eq!(s.read_until(&re), "");
    }

    #[test]
    fn match_at_is_sticky() {
        let re = Regex::new("b+").unwrap();
        let mut s = InputScanner::new("abb");
        assert_eq!(s.match_at(&re), None);
        s.next();
        assert_eq!(s.match_at(&re), Some("bb"));
    }

    #[test]
    fn read_gates_until_on_starting() {
        let start = Regex::new("<!--").unwrap();
        let end = Regex::new("-->").unwrap();
        let mut s = InputScanner::new("<p><!-- x -->");
        assert_eq!(s.read(Some(&start), Some(&end), true), "");
        s.next();
        s.next();
        s.next();
        assert_eq!(s.read(Some(&start), Some(&end), true), "<!-- x -->");
    }
}
