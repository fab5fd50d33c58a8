// src/output.rs
//
// Line-oriented output sink.
//
// - Each line keeps its items, an indent count (in indent units, -1 means
//   "column 0, no base indent"), an alignment in columns and a running
//   character count used for wrapping.
// - A wrap point remembers where the last breakable space went in; when a line
//   overflows `wrap_line_length` the tail after it moves to a fresh line.
// - Indentation strings are built once per column and cached.

use crate::options::Options;

/* ============================== Indent cache ============================= */

struct IndentCache {
    base: String,
    base_len: isize,
    unit: String,
    indent_size: usize,
    cache: Vec<String>,
}

impl IndentCache {
    fn new(options: &Options, base_indent: &str) -> Self {
        let unit = if options.indent_with_tabs() {
            options.indent_char.clone()
        } else {
            options.indent_char.repeat(options.indent_size)
        };
        let base = if options.indent_level > 0 {
            unit.repeat(options.indent_level)
        } else {
            base_indent.to_string()
        };
        IndentCache {
            base_len: base.chars().count() as isize,
            base,
            unit,
            indent_size: options.indent_size,
            cache: vec![String::new()],
        }
    }

    /// Width in columns of `indent` units plus `column` alignment.
    fn size(&self, indent: isize, column: usize) -> isize {
        let base = if indent < 0 { 0 } else { self.base_len };
        base + indent * self.indent_size as isize + column as isize
    }

    fn string(&mut self, indent: isize, column: usize) -> String {
        let (mut result, indent) = if indent < 0 {
            (String::new(), 0)
        } else {
            (self.base.clone(), indent as usize)
        };
        let column = column + indent * self.indent_size;
        while self.cache.len() <= column {
            self.add_column();
        }
        result.push_str(&self.cache[column]);
        result
    }

    fn add_column(&mut self) {
        let mut column = self.cache.len();
        let mut result = String::new();
        if self.indent_size > 0 && column >= self.indent_size {
            let units = column / self.indent_size;
            column -= units * self.indent_size;
            result = self.unit.repeat(units);
        }
        result.push_str(&" ".repeat(column));
        self.cache.push(result);
    }
}

/* =============================== Output line ============================= */

#[derive(Clone, Debug)]
struct OutputLine {
    character_count: isize,
    indent_count: isize,
    alignment_count: usize,
    wrap_point_index: usize,
    wrap_point_character_count: isize,
    wrap_point_indent_count: isize,
    wrap_point_alignment_count: usize,
    items: Vec<String>,
}

impl OutputLine {
    fn new() -> Self {
        OutputLine {
            character_count: 0,
            indent_count: -1,
            alignment_count: 0,
            wrap_point_index: 0,
            wrap_point_character_count: 0,
            wrap_point_indent_count: -1,
            wrap_point_alignment_count: 0,
            items: Vec::new(),
        }
    }

    fn clone_empty(&self, cache: &IndentCache) -> Self {
        let mut line = OutputLine::new();
        line.set_indent(self.indent_count, self.alignment_count, cache);
        line
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Only an empty line can be re-indented.
    fn set_indent(&mut self, indent: isize, alignment: usize, cache: &IndentCache) {
        if self.is_empty() {
            self.indent_count = indent;
            self.alignment_count = alignment;
            self.character_count = cache.size(indent, alignment);
        }
    }

    fn push(&mut self, item: &str) {
        match item.rfind('\n') {
            Some(i) => self.character_count = item[i..].chars().count() as isize,
            None => self.character_count += item.chars().count() as isize,
        }
        self.items.push(item.to_string());
    }

    fn pop(&mut self) -> Option<String> {
        let item = self.items.pop()?;
        self.character_count -= item.chars().count() as isize;
        Some(item)
    }

    fn trim(&mut self) {
        while self.items.last().is_some_and(|s| s == " ") {
            self.items.pop();
            self.character_count -= 1;
        }
    }

    fn render(&self, cache: &mut IndentCache, indent_empty_lines: bool) -> String {
        if self.is_empty() {
            if indent_empty_lines {
                return cache.string(self.indent_count, 0);
            }
            return String::new();
        }
        let mut result = cache.string(self.indent_count, self.alignment_count);
        for item in &self.items {
            result.push_str(item);
        }
        result
    }
}

/* ================================= Output ================================ */

pub(crate) struct Output {
    indent_cache: IndentCache,
    end_with_newline: bool,
    wrap_line_length: usize,
    indent_empty_lines: bool,
    lines: Vec<OutputLine>,
    /// Template for the next line: carries the indent set most recently.
    next_line: OutputLine,
    pub(crate) space_before_token: bool,
    pub(crate) non_breaking_space: bool,
    pub(crate) previous_token_wrapped: bool,
}

impl Output {
    pub(crate) fn new(options: &Options, base_indent: &str) -> Self {
        let mut output = Output {
            indent_cache: IndentCache::new(options, base_indent),
            end_with_newline: options.end_with_newline,
            wrap_line_length: options.wrap_line_length,
            indent_empty_lines: options.indent_empty_lines,
            lines: Vec::new(),
            next_line: OutputLine::new(),
            space_before_token: false,
            non_breaking_space: false,
            previous_token_wrapped: false,
        };
        output.add_output_line();
        output
    }

    fn add_output_line(&mut self) {
        let line = self.next_line.clone_empty(&self.indent_cache);
        self.lines.push(line);
    }

    fn current(&mut self) -> &mut OutputLine {
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn current_ref(&self) -> &OutputLine {
        &self.lines[self.lines.len() - 1]
    }

    pub(crate) fn get_indent_string(&mut self, indent: isize) -> String {
        self.indent_cache.string(indent, 0)
    }

    /// Nothing has been written yet.
    pub(crate) fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.current_ref().is_empty()
    }

    pub(crate) fn just_added_newline(&self) -> bool {
        self.current_ref().is_empty()
    }

    pub(crate) fn just_added_blankline(&self) -> bool {
        self.is_empty()
            || (self.current_ref().is_empty()
                && self.lines.len() > 1
                && self.lines[self.lines.len() - 2].is_empty())
    }

    pub(crate) fn current_line_contains(&self, needle: &str) -> bool {
        self.current_ref().items.iter().any(|item| item.contains(needle))
    }

    pub(crate) fn add_new_line(&mut self, force: bool) -> bool {
        if self.is_empty() || (!force && self.just_added_newline()) {
            return false;
        }
        self.add_output_line();
        true
    }

    /// Indent for the current line (if still empty) and every line after it.
    /// The very first line of output stays at the base indent.
    pub(crate) fn set_indent(&mut self, indent: isize, alignment: usize) -> bool {
        self.next_line.set_indent(indent, alignment, &self.indent_cache);
        let last = self.lines.len() - 1;
        if self.lines.len() > 1 {
            self.lines[last].set_indent(indent, alignment, &self.indent_cache);
            return true;
        }
        self.lines[last].set_indent(0, 0, &self.indent_cache);
        false
    }

    pub(crate) fn set_wrap_point(&mut self) {
        if self.wrap_line_length == 0 {
            return;
        }
        let indent = self.next_line.indent_count;
        let alignment = self.next_line.alignment_count;
        let line = self.current();
        line.wrap_point_index = line.items.len();
        line.wrap_point_character_count = line.character_count;
        line.wrap_point_indent_count = indent;
        line.wrap_point_alignment_count = alignment;
    }

    /// Emit `newlines` line breaks, then whitespace and text verbatim.
    pub(crate) fn add_raw_token(&mut self, newlines: usize, whitespace_before: &str, text: &str) {
        for _ in 0..newlines {
            self.add_output_line();
        }
        let cache = &self.indent_cache;
        let last = self.lines.len() - 1;
        let line = &mut self.lines[last];
        line.set_indent(-1, 0, cache);
        line.push(whitespace_before);
        line.push(text);
        self.space_before_token = false;
        self.non_breaking_space = false;
        self.previous_token_wrapped = false;
    }

    pub(crate) fn add_token(&mut self, text: &str) {
        if self.space_before_token && !self.just_added_newline() {
            if !self.non_breaking_space {
                self.set_wrap_point();
            }
            self.current().push(" ");
        }
        self.current().push(text);
        self.space_before_token = false;
        self.non_breaking_space = false;
        self.previous_token_wrapped = self.allow_wrap();
    }

    fn should_wrap(&self) -> bool {
        let line = self.current_ref();
        line.wrap_point_index > 0
            && line.character_count > self.wrap_line_length as isize
            && line.wrap_point_character_count > self.next_line.character_count
    }

    /// Move everything after the wrap point onto a new line.
    fn allow_wrap(&mut self) -> bool {
        if !self.should_wrap() {
            return false;
        }
        let from = self.lines.len() - 1;
        self.add_new_line(false);
        let (head, tail) = self.lines.split_at_mut(from + 1);
        let line = &mut head[from];
        let next = &mut tail[0];
        next.set_indent(
            line.wrap_point_indent_count,
            line.wrap_point_alignment_count,
            &self.indent_cache,
        );
        next.items = line.items.split_off(line.wrap_point_index);
        next.character_count += line.character_count - line.wrap_point_character_count;
        line.character_count = line.wrap_point_character_count;
        if next.items.first().is_some_and(|s| s == " ") {
            next.items.remove(0);
            next.character_count -= 1;
        }
        true
    }

    /// Drop trailing spaces, and with `eat_newlines` trailing empty lines too.
    pub(crate) fn trim(&mut self, eat_newlines: bool) {
        self.current().trim();
        while eat_newlines && self.lines.len() > 1 && self.current_ref().is_empty() {
            self.lines.pop();
            self.current().trim();
        }
    }

    pub(crate) fn get_code(&mut self, eol: &str) -> String {
        self.trim(true);
        if let Some(last) = self.current().pop() {
            let last = last.trim_end_matches('\n');
            self.current().push(last);
        }
        if self.end_with_newline {
            self.add_output_line();
        }

        let mut code = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                code.push('\n');
            }
            code.push_str(&line.render(&mut self.indent_cache, self.indent_empty_lines));
        }
        if eol != "\n" {
            code = code.replace('\n', eol);
        }
        code
    }
}
