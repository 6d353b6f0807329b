//! The diff-to-ANSI renderer: produces the shortest correct ANSI byte
//! string that turns the terminal's current display (`prev`, by
//! construction) into `next`.
//!
//! The renderer never fails. Any unrecognized condition degrades to
//! emitting more bytes, never fewer — a full-screen redraw is always a
//! safe fallback.

use crate::cell::CellBuffer;
use crate::config;

use super::ansi;

/// Per-frame diff statistics, also folded into the profiler's frame record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiffStats {
    pub ops: usize,
    pub cursor_moves: usize,
    pub style_changes: usize,
    pub resets: usize,
    pub full_redraw: bool,
    pub scroll_accelerated: bool,
}

/// A caller-supplied hint that a contiguous, full-width row band may have
/// scrolled. Also settable implicitly via `BTUIN_DECSTBM_AUTO`.
#[derive(Clone, Copy, Debug)]
pub struct ScrollHint {
    pub top: u16,
    pub bottom: u16,
}

#[derive(Clone, Debug, Default)]
pub struct DiffOptions {
    pub scroll_hint: Option<ScrollHint>,
}

const SCROLL_DY_RANGE: i32 = 5;
const SCROLL_MIN_ROWS_MATCHED: u16 = 6;
const SCROLL_MIN_MATCH_RATIO: f32 = 0.75;
const SCROLL_MIN_BAND_HEIGHT: u16 = 8;

/// Produce the ANSI byte string that transforms `prev` into `next`.
pub fn render_diff(prev: &CellBuffer, next: &CellBuffer, mut stats: Option<&mut DiffStats>, options: Option<&DiffOptions>) -> String {
    let mut out = String::new();

    if prev.rows() != next.rows() || prev.cols() != next.cols() {
        // Outer control: dimension change forces a full redraw against an
        // all-default scratch buffer, guaranteeing every cell is emitted.
        let scratch = CellBuffer::new(next.rows(), next.cols());
        if let Some(s) = stats.as_deref_mut() {
            s.full_redraw = true;
        }
        render_cell_walk(&scratch, next, None, &mut out, stats);
        return out;
    }

    let scroll = if config::scroll_fastpath_enabled() {
        detect_scroll(prev, next, options)
    } else {
        None
    };

    if let Some((dy, top, bottom)) = scroll {
        if let Some(s) = stats.as_deref_mut() {
            s.scroll_accelerated = true;
        }
        ansi::reset(&mut out);
        ansi::set_scroll_region(&mut out, top, bottom.saturating_sub(1));
        ansi::cursor_to(&mut out, top, 0);
        if dy > 0 {
            ansi::scroll_up(&mut out, dy as u16);
        } else {
            ansi::scroll_down(&mut out, (-dy) as u16);
        }
        ansi::clear_scroll_region(&mut out);
        render_cell_walk(prev, next, Some((dy, top, bottom)), &mut out, stats);
        return out;
    }

    render_cell_walk(prev, next, None, &mut out, stats);
    out
}

/// Force a full redraw with no diffing: used after resize or when the
/// screen is corrupted.
pub fn render_full(next: &CellBuffer) -> String {
    let scratch = CellBuffer::new(next.rows(), next.cols());
    let mut out = String::new();
    ansi::cursor_home(&mut out);
    render_cell_walk(&scratch, next, None, &mut out, None);
    out
}

/// Row-major walk from (0,0) to (rows-1, cols-1), skipping the bottom-right
/// cell (printing there triggers implicit scrolling on many terminals).
/// `scroll_band` remaps the comparison source for rows inside
/// `[top, bottom)` to `prev[r + dy]`, as used by the scroll fast path.
fn render_cell_walk(prev: &CellBuffer, next: &CellBuffer, scroll_band: Option<(i32, u16, u16)>, out: &mut String, mut stats: Option<&mut DiffStats>) {
    let rows = next.rows();
    let cols = next.cols();
    let last = (rows.saturating_sub(1), cols.saturating_sub(1));

    let mut current_fg: Option<&crate::cell::StyleToken> = None;
    let mut current_bg: Option<&crate::cell::StyleToken> = None;
    let mut style_dirty = false;

    for row in 0..rows {
        for col in 0..cols {
            if (row, col) == last {
                continue;
            }

            let ni = row as usize * cols as usize + col as usize;
            if next.raw_width(ni) == 0 {
                continue; // continuation, handled by its base
            }

            let unchanged = match scroll_band {
                Some((dy, top, bottom)) if row >= top && row < bottom => {
                    let src_row = row as i32 + dy;
                    if src_row >= top as i32 && src_row < bottom as i32 {
                        cells_equal(prev, index_of(prev, src_row as u16, col), next, ni)
                    } else {
                        false // exposed row: nothing to compare against
                    }
                }
                _ => cells_equal(prev, index_of(prev, row, col), next, ni),
            };

            if unchanged {
                continue;
            }

            emit_cell(out, next, ni, row, col, &mut current_fg, &mut current_bg, &mut style_dirty);
            if let Some(s) = stats.as_deref_mut() {
                s.ops += 1;
                s.cursor_moves += 1;
            }
        }
    }

    if style_dirty {
        ansi::reset(out);
        if let Some(s) = stats.as_deref_mut() {
            s.resets += 1;
        }
    }
}

fn index_of(buf: &CellBuffer, row: u16, col: u16) -> usize {
    row as usize * buf.cols() as usize + col as usize
}

#[allow(clippy::too_many_arguments)]
fn emit_cell<'a>(
    out: &mut String,
    next: &'a CellBuffer,
    ni: usize,
    row: u16,
    col: u16,
    current_fg: &mut Option<&'a crate::cell::StyleToken>,
    current_bg: &mut Option<&'a crate::cell::StyleToken>,
    style_dirty: &mut bool,
) {
    ansi::cursor_to(out, row, col);

    let fg = next.raw_fg(ni);
    if fg != *current_fg {
        match fg {
            Some(tok) => out.push_str(tok.as_str()),
            None => ansi::default_fg(out),
        }
        *current_fg = fg;
        *style_dirty = true;
    }

    let bg = next.raw_bg(ni);
    if bg != *current_bg {
        match bg {
            Some(tok) => out.push_str(tok.as_str()),
            None => ansi::default_bg(out),
        }
        *current_bg = bg;
        *style_dirty = true;
    }

    let cp = next.raw_code_point(ni);
    if cp == u32::MAX {
        if let Some(extra) = next.raw_extra(ni) {
            out.push_str(extra);
        }
    } else if let Some(c) = char::from_u32(cp) {
        out.push(c);
    }
}

fn cells_equal(a: &CellBuffer, ai: usize, b: &CellBuffer, bi: usize) -> bool {
    if a.raw_width(ai) != b.raw_width(bi) {
        return false;
    }
    if a.raw_code_point(ai) != b.raw_code_point(bi) {
        return false;
    }
    if a.raw_code_point(ai) == u32::MAX && a.raw_extra(ai) != b.raw_extra(bi) {
        return false;
    }
    a.raw_fg(ai) == b.raw_fg(bi) && a.raw_bg(ai) == b.raw_bg(bi)
}

/// Attempt to detect a vertical translation inside the hinted (or
/// full-buffer, when auto-detection is enabled) band.
fn detect_scroll(prev: &CellBuffer, next: &CellBuffer, options: Option<&DiffOptions>) -> Option<(i32, u16, u16)> {
    let hint = options.and_then(|o| o.scroll_hint);
    let (top, bottom) = match hint {
        Some(h) => (h.top, h.bottom),
        None if config::decstbm_auto() => (0, next.rows()),
        None => return None,
    };

    if bottom <= top || bottom - top < SCROLL_MIN_BAND_HEIGHT {
        return None;
    }
    if top == 0 && bottom == next.rows() {
        // Reject translations that would scroll the entire screen: unsafe
        // under terminal multiplexers.
        return None;
    }

    let band_height = bottom - top;
    let cols = next.cols();

    let mut best: Option<(i32, u16)> = None;

    for dy in (-SCROLL_DY_RANGE..=SCROLL_DY_RANGE).filter(|&d| d != 0) {
        let mut matched_rows: u16 = 0;
        for row in top..bottom {
            let src_row = row as i32 + dy;
            if src_row < top as i32 || src_row >= bottom as i32 {
                continue;
            }
            let mut row_matches = true;
            for col in 0..cols {
                if !cells_equal(prev, index_of(prev, src_row as u16, col), next, index_of(next, row, col)) {
                    row_matches = false;
                    break;
                }
            }
            if row_matches {
                matched_rows += 1;
            }
        }

        if matched_rows < SCROLL_MIN_ROWS_MATCHED {
            continue;
        }
        let ratio = matched_rows as f32 / band_height as f32;
        if ratio < SCROLL_MIN_MATCH_RATIO {
            continue;
        }

        let better = match best {
            None => true,
            Some((best_dy, best_rows)) => {
                matched_rows > best_rows || (matched_rows == best_rows && dy.abs() < best_dy.abs())
            }
        };
        if better {
            best = Some((dy, matched_rows));
        }
    }

    best.map(|(dy, _)| (dy, top, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StyleToken;

    fn tok(s: &str) -> StyleToken {
        StyleToken::from_escape(s.to_string())
    }

    #[test]
    fn identical_buffers_produce_empty_diff() {
        let mut a = CellBuffer::new(3, 10);
        a.set(1, 1, "x", None, None);
        let b = a.clone();
        assert_eq!(render_diff(&a, &b, None, None), "");
    }

    #[test]
    fn static_one_line_frame() {
        let prev = CellBuffer::new(24, 80);
        let mut next = CellBuffer::new(24, 80);
        for (i, c) in "Hello".chars().enumerate() {
            next.set_code_point(0, i as u16, c as u32, None, None);
        }
        let out = render_diff(&prev, &next, None, None);
        assert!(out.starts_with("\u{1b}[1;1H"));
        assert!(out.contains("Hello"));
        assert!(out.ends_with("\u{1b}[0m"));

        let out2 = render_diff(&next, &next, None, None);
        assert_eq!(out2, "");
    }

    #[test]
    fn color_change_emits_token_then_default_fg() {
        let mut a = CellBuffer::new(1, 2);
        a.set(0, 0, "a", None, None);
        a.set(0, 1, "b", None, None);

        let mut b = CellBuffer::new(1, 2);
        b.set(0, 0, "a", Some(tok("\u{1b}[31m")), None);
        b.set(0, 1, "b", None, None);

        let out = render_diff(&a, &b, None, None);
        assert_eq!(out, "\u{1b}[1;1H\u{1b}[31ma\u{1b}[1;2H\u{1b}[39mb\u{1b}[0m");
    }

    #[test]
    fn wide_char_preserves_grapheme() {
        let mut a = CellBuffer::new(1, 2);
        a.set(0, 0, "A", None, None);
        let mut b = CellBuffer::new(1, 2);
        b.set(0, 0, "餅", None, None);

        let out = render_diff(&a, &b, None, None);
        assert!(out.contains("餅"));
        assert_eq!(b.get(0, 0).unwrap().width, 2);
        assert_eq!(b.get(0, 1).unwrap().width, 0);
    }

    #[test]
    fn resize_forces_full_redraw_skipping_bottom_right() {
        let mut prev = CellBuffer::new(2, 5);
        prev.set(0, 0, "a", None, None);
        prev.set(0, 1, "b", None, None);

        let mut next = CellBuffer::new(3, 5);
        next.set(0, 0, "a", None, None);
        next.set(0, 1, "b", None, None);

        let mut stats = DiffStats::default();
        let out = render_diff(&prev, &next, Some(&mut stats), None);
        assert!(stats.full_redraw);
        // Bottom-right cell (2,4) must never be targeted.
        assert!(!out.contains("\u{1b}[3;5H"));
        // Every other cell should have been visited (cursor move count).
        assert_eq!(stats.cursor_moves, 3 * 5 - 1);
    }

    #[test]
    fn diff_of_identical_buffer_has_zero_ops() {
        let b = CellBuffer::new(4, 4);
        let mut stats = DiffStats::default();
        let out = render_diff(&b, &b.clone(), Some(&mut stats), None);
        assert_eq!(out, "");
        assert_eq!(stats.ops, 0);
    }

    #[test]
    fn scroll_fast_path_emits_prelude_and_only_exposed_row() {
        // 24-row buffer, band rows 2..21 (inclusive indices 2..20, 0-based
        // `top=2, bottom=21`), 10 stable full-width rows shifted up by one.
        let cols = 10u16;
        let rows = 24u16;
        let top = 2u16;
        let bottom = 21u16;

        let mut prev = CellBuffer::new(rows, cols);
        for r in top..bottom {
            for c in 0..cols {
                prev.set_code_point(r, c, b'a' as u32 + (r as u32 % 26), None, None);
            }
        }

        let mut next = CellBuffer::new(rows, cols);
        next.copy_from(&prev).unwrap();
        // Shift the band up by one: row r in next equals row r+1 in prev.
        next.scroll_rows_from(&prev, top, bottom, 1).unwrap();
        // New content appears on the exposed bottom row of the band.
        for c in 0..cols {
            next.set_code_point(bottom - 1, c, b'Z' as u32, None, None);
        }

        let options = DiffOptions {
            scroll_hint: Some(ScrollHint { top, bottom }),
        };
        let mut stats = DiffStats::default();
        let out = render_diff(&prev, &next, Some(&mut stats), Some(&options));

        assert!(stats.scroll_accelerated);
        assert!(out.starts_with("\u{1b}[0m\u{1b}[3;21r\u{1b}[3;1H\u{1b}[1S\u{1b}[r"));
        // Only the exposed row's cells should have been walked as changed,
        // not the full band.
        assert_eq!(stats.ops, cols as usize);
    }

    #[test]
    fn scroll_detection_rejects_full_screen_band() {
        let rows = 10u16;
        let cols = 5u16;
        let prev = CellBuffer::new(rows, cols);
        let next = CellBuffer::new(rows, cols);
        let options = DiffOptions {
            scroll_hint: Some(ScrollHint { top: 0, bottom: rows }),
        };
        assert!(detect_scroll(&prev, &next, Some(&options)).is_none());
    }

    #[test]
    fn scroll_detection_rejects_short_band() {
        let rows = 10u16;
        let cols = 5u16;
        let prev = CellBuffer::new(rows, cols);
        let next = CellBuffer::new(rows, cols);
        let options = DiffOptions {
            scroll_hint: Some(ScrollHint { top: 1, bottom: 5 }), // height 4 < 8
        };
        assert!(detect_scroll(&prev, &next, Some(&options)).is_none());
    }
}
