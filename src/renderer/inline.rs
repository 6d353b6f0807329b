//! The inline renderer: an alternative diff strategy for non-fullscreen
//! output that rewrites N lines in place rather than using the alternate
//! screen buffer.

use std::fmt::Write as _;

use crate::cell::CellBuffer;

use super::ansi::ESC;

/// Rewrites a block of `prev_line_count` lines in place on each render.
pub struct InlineRenderer {
    prev_line_count: u16,
}

impl InlineRenderer {
    pub fn new() -> Self {
        Self { prev_line_count: 0 }
    }

    /// Render `buf`, returning the ANSI byte string to write.
    pub fn render(&mut self, buf: &CellBuffer) -> String {
        let next_lines: Vec<String> = (0..buf.rows()).map(|r| materialize_line(buf, r)).collect();
        let out = self.diff_lines(&next_lines);
        self.prev_line_count = next_lines.len() as u16;
        out
    }

    fn diff_lines(&self, next_lines: &[String]) -> String {
        let mut out = String::new();

        if self.prev_line_count > 0 {
            let _ = write!(out, "{ESC}{}A\r", self.prev_line_count);
        }

        let total = self.prev_line_count.max(next_lines.len() as u16);
        for i in 0..total {
            out.push_str(ESC);
            out.push_str("2K\r");
            if let Some(line) = next_lines.get(i as usize) {
                out.push_str(line);
            }
            if i + 1 < total {
                out.push_str("\r\n");
            }
        }
        out
    }

    /// Clear the currently occupied lines, used on cleanup.
    pub fn clear(&mut self) -> String {
        let mut out = String::new();
        if self.prev_line_count > 0 {
            let _ = write!(out, "{ESC}{}A\r", self.prev_line_count);
            for i in 0..self.prev_line_count {
                out.push_str(ESC);
                out.push_str("2K\r");
                if i + 1 < self.prev_line_count {
                    out.push_str("\r\n");
                }
            }
        }
        self.prev_line_count = 0;
        out
    }
}

impl Default for InlineRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one row's line, with embedded SGR sequences, right-trimmed of
/// plain spaces while preserving any escape sequences in the trimmed tail.
fn materialize_line(buf: &CellBuffer, row: u16) -> String {
    let mut out = String::new();
    let mut current_fg: Option<&crate::cell::StyleToken> = None;
    let mut current_bg: Option<&crate::cell::StyleToken> = None;
    let mut content_end = 0usize;
    let mut style_dirty = false;

    for col in 0..buf.cols() {
        let cell = buf.get(row, col).expect("row/col within bounds");
        if cell.width == 0 {
            continue; // continuation, already drawn by its base
        }

        if cell.fg.as_ref() != current_fg {
            match &cell.fg {
                Some(tok) => out.push_str(tok.as_str()),
                None => {
                    out.push_str(ESC);
                    out.push_str("39m");
                }
            }
            current_fg = cell.fg.as_ref();
            style_dirty = true;
        }
        if cell.bg.as_ref() != current_bg {
            match &cell.bg {
                Some(tok) => out.push_str(tok.as_str()),
                None => {
                    out.push_str(ESC);
                    out.push_str("49m");
                }
            }
            current_bg = cell.bg.as_ref();
            style_dirty = true;
        }

        out.push_str(&cell.glyph);
        if cell.glyph != " " {
            content_end = out.len();
        }
    }

    if style_dirty {
        out.push_str(ESC);
        out.push_str("0m");
    }

    strip_trailing_plain_spaces(out, content_end)
}

/// Drop literal trailing space characters from `out[content_end..]` while
/// keeping any escape sequences found there (e.g. a closing `ESC[0m`).
fn strip_trailing_plain_spaces(out: String, content_end: usize) -> String {
    if content_end >= out.len() {
        return out;
    }
    let (head, tail) = out.split_at(content_end);
    let mut kept = String::new();
    let mut chars = tail.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            kept.push(c);
            for c2 in chars.by_ref() {
                kept.push(c2);
                if c2 == 'm' {
                    break;
                }
            }
        } else if c != ' ' {
            kept.push(c);
        }
    }
    format!("{head}{kept}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StyleToken;

    #[test]
    fn first_render_has_no_leading_cursor_up() {
        let buf = CellBuffer::new(1, 3);
        let mut r = InlineRenderer::new();
        let out = r.render(&buf);
        assert!(!out.starts_with("\u{1b}[0A"));
        assert!(out.starts_with("\u{1b}[2K\r"));
    }

    #[test]
    fn second_render_moves_cursor_up_by_previous_line_count() {
        let buf = CellBuffer::new(2, 3);
        let mut r = InlineRenderer::new();
        r.render(&buf);
        let out = r.render(&buf);
        assert!(out.starts_with("\u{1b}[2A\r"));
    }

    #[test]
    fn last_line_has_no_trailing_crlf() {
        let buf = CellBuffer::new(2, 3);
        let mut r = InlineRenderer::new();
        let out = r.render(&buf);
        assert!(!out.ends_with("\r\n"));
    }

    #[test]
    fn trailing_plain_spaces_trimmed() {
        let mut buf = CellBuffer::new(1, 5);
        buf.set(0, 0, "h", None, None);
        buf.set(0, 1, "i", None, None);
        let line = materialize_line(&buf, 0);
        assert_eq!(line, "hi");
    }

    #[test]
    fn trailing_escape_preserved_even_though_spaces_trimmed() {
        let mut buf = CellBuffer::new(1, 3);
        buf.set(0, 0, "h", Some(StyleToken::from_escape("\u{1b}[31m".to_string())), None);
        let line = materialize_line(&buf, 0);
        assert!(line.starts_with("\u{1b}[31mh"));
        assert!(line.ends_with("\u{1b}[0m"));
        assert!(!line.contains("h "));
    }

    #[test]
    fn growing_then_shrinking_clears_extra_lines() {
        let tall = CellBuffer::new(3, 2);
        let short = CellBuffer::new(1, 2);
        let mut r = InlineRenderer::new();
        r.render(&tall);
        let out = r.render(&short);
        // Must still rewrite all 3 previously-occupied lines even though
        // only 1 line of new content exists.
        assert_eq!(out.matches("2K\r").count(), 3);
    }
}
