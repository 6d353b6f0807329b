//! Cell grid: a 2-D array of styled terminal cells plus the style-token
//! color model that feeds the diff renderer.
//!
//! A [`CellBuffer`] is four parallel arrays of length `rows*cols`
//! (code point, display width, fg style, bg style) plus a side table for
//! clusters that need more than one code point. Style resolution happens
//! once, at `set` time; after that the buffer only ever compares opaque
//! tokens, which is what keeps the diff renderer's inner loop cheap.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{BufferError, BufferResult};
use crate::grapheme;

/// A pre-formed ANSI SGR escape sequence for one color channel (fg or bg).
///
/// Comparing tokens is string equality; that identity is what the diff
/// renderer uses to decide whether a style transition needs to be emitted.
/// Wrapped in `Rc<str>` so cloning a cell (e.g. for continuation cells) is
/// a refcount bump, not an allocation.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StyleToken(Rc<str>);

impl StyleToken {
    /// Wrap an already-formed escape sequence. Callers are expected to go
    /// through [`crate::color`] rather than call this directly, but it is
    /// exposed for a pre-formed `ESC[`-prefixed escape passed through from
    /// user input (see the color-resolution rules in the external
    /// interfaces section of the design).
    pub fn from_escape(escape: impl Into<Rc<str>>) -> Self {
        Self(escape.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StyleToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One addressable cell, as returned by [`CellBuffer::get`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Displayed grapheme. Empty for a continuation cell.
    pub glyph: String,
    pub width: u8,
    pub fg: Option<StyleToken>,
    pub bg: Option<StyleToken>,
}

/// A 2-D grid of styled cells with grapheme-aware wide-glyph semantics.
///
/// Invariants upheld by every mutating method (see the data model's W1-W4):
/// a width-2 cell is always immediately followed by exactly one width-0
/// continuation; writes that would straddle the right edge are dropped
/// rather than truncated; overwriting any cell of a width-2 span first
/// clears the whole span; a continuation carries its own style copy so
/// partial overwrites behave correctly even though painting ignores its
/// glyph.
#[derive(Clone, Debug)]
pub struct CellBuffer {
    rows: u16,
    cols: u16,
    code_points: Vec<u32>,
    widths: Vec<u8>,
    fg: Vec<Option<StyleToken>>,
    bg: Vec<Option<StyleToken>>,
    /// Side table for clusters that don't fit in a single code point
    /// (combining marks, ZWJ sequences, regional indicators, ...).
    extras: HashMap<usize, String>,
    /// True as long as every written glyph has been width-1 ASCII; lets the
    /// diff renderer take a fast path that skips the grapheme side table.
    ascii_only: bool,
}

/// Sentinel marking "no extras entry, read `code_points[i]` as a scalar".
const NO_EXTRA: u32 = u32::MAX;

impl CellBuffer {
    /// Allocate a cleared buffer of the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        let len = rows as usize * cols as usize;
        Self {
            rows,
            cols,
            code_points: vec![' ' as u32; len],
            widths: vec![1; len],
            fg: vec![None; len],
            bg: vec![None; len],
            extras: HashMap::new(),
            ascii_only: true,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn ascii_only(&self) -> bool {
        self.ascii_only
    }

    #[inline]
    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    fn in_bounds(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }

    /// Reset every cell to a space, width 1, no style; resets `ascii_only`.
    pub fn clear(&mut self) {
        self.code_points.fill(' ' as u32);
        self.widths.fill(1);
        self.fg.fill(None);
        self.bg.fill(None);
        self.extras.clear();
        self.ascii_only = true;
    }

    /// Write one grapheme at `(row, col)`. Out-of-bounds is silently
    /// ignored. ASCII single-byte input takes a fast path (width 1, no
    /// segmentation). Otherwise the first cluster of `glyph` is segmented
    /// out, measured, and — if it fits — written via [`Self::write_glyph`].
    pub fn set(&mut self, row: u16, col: u16, glyph: &str, fg: Option<StyleToken>, bg: Option<StyleToken>) {
        if !self.in_bounds(row, col) {
            return;
        }

        if let Some(c) = ascii_fast_path(glyph) {
            self.set_code_point(row, col, c as u32, fg, bg);
            return;
        }

        let Some(cluster) = grapheme::segment(glyph).into_iter().next() else {
            return;
        };
        let width = grapheme::measure(cluster);

        if col as u32 + width as u32 > self.cols as u32 {
            return; // Invariant W2: dropped, never truncated.
        }

        self.write_glyph(row, col, cluster, width, fg, bg);
    }

    /// Fast path for a pre-segmented single code point; always width 1.
    pub fn set_code_point(&mut self, row: u16, col: u16, codepoint: u32, fg: Option<StyleToken>, bg: Option<StyleToken>) {
        if !self.in_bounds(row, col) {
            return;
        }
        let is_ascii = codepoint < 0x80;
        let ch_width = if is_ascii { 1u8 } else {
            char::from_u32(codepoint)
                .map(|c| grapheme::measure(&c.to_string()))
                .unwrap_or(1)
        };

        if col as u32 + ch_width as u32 > self.cols as u32 {
            return;
        }

        let cluster_owned;
        let cluster: &str = if let Some(c) = char::from_u32(codepoint) {
            cluster_owned = c.to_string();
            &cluster_owned
        } else {
            return;
        };

        self.write_glyph(row, col, cluster, ch_width, fg, bg);
        if !is_ascii {
            self.ascii_only = false;
        }
    }

    /// Returns the displayed string (empty for continuations) and its
    /// style. `None` if out of bounds.
    pub fn get(&self, row: u16, col: u16) -> Option<Cell> {
        if !self.in_bounds(row, col) {
            return None;
        }
        let i = self.index(row, col);
        let width = self.widths[i];
        let glyph = if width == 0 {
            String::new()
        } else {
            self.glyph_at(i)
        };
        Some(Cell {
            glyph,
            width,
            fg: self.fg[i].clone(),
            bg: self.bg[i].clone(),
        })
    }

    fn glyph_at(&self, i: usize) -> String {
        if self.code_points[i] == NO_EXTRA {
            self.extras.get(&i).cloned().unwrap_or_default()
        } else {
            char::from_u32(self.code_points[i]).map(String::from).unwrap_or_default()
        }
    }

    fn set_glyph_at(&mut self, i: usize, cluster: &str) {
        let mut chars = cluster.chars();
        let first = chars.next();
        if let (Some(c), None) = (first, chars.next()) {
            self.code_points[i] = c as u32;
            self.extras.remove(&i);
        } else {
            self.code_points[i] = NO_EXTRA;
            self.extras.insert(i, cluster.to_string());
        }
    }

    /// The width-2/width-0 write algorithm shared by `set` and
    /// `set_code_point`.
    fn write_glyph(&mut self, row: u16, col: u16, cluster: &str, width: u8, fg: Option<StyleToken>, bg: Option<StyleToken>) {
        let i = self.index(row, col);

        // (1) If the target is a continuation, clear its base span first.
        if self.widths[i] == 0 {
            self.clear_span_containing(row, col);
        }

        // (2) Clear any continuations immediately following the target so
        // they don't leak out of a previous wide glyph we're overwriting.
        self.clear_trailing_continuations(row, col);

        // (3) + (4) Store the cluster and width.
        self.set_glyph_at(i, cluster);
        self.widths[i] = width;
        self.fg[i] = fg.clone();
        self.bg[i] = bg.clone();

        if cluster.chars().next().map(|c| !c.is_ascii()).unwrap_or(false) {
            self.ascii_only = false;
        }

        // (5) Continuation cells: width 0, inherit style only if supplied.
        if width == 2 && col + 1 < self.cols {
            let j = self.index(row, col + 1);
            self.set_glyph_at(j, "");
            self.widths[j] = 0;
            self.fg[j] = fg;
            self.bg[j] = bg;
        }
    }

    /// If `(row, col)` falls inside a width-2 span (as base or
    /// continuation), clear the whole span to spaces.
    fn clear_span_containing(&mut self, row: u16, col: u16) {
        let i = self.index(row, col);
        if self.widths[i] == 0 && col > 0 {
            let base = self.index(row, col - 1);
            if self.widths[base] == 2 {
                self.blank(base);
                self.blank(i);
                return;
            }
        }
        self.blank(i);
    }

    fn clear_trailing_continuations(&mut self, row: u16, col: u16) {
        let mut c = col + 1;
        while c < self.cols {
            let i = self.index(row, c);
            if self.widths[i] == 0 {
                self.blank(i);
                c += 1;
            } else {
                break;
            }
        }
    }

    fn blank(&mut self, i: usize) {
        self.code_points[i] = ' ' as u32;
        self.extras.remove(&i);
        self.widths[i] = 1;
        self.fg[i] = None;
        self.bg[i] = None;
    }

    /// Full rectangular copy, including `ascii_only` state. Dimensions
    /// must match.
    pub fn copy_from(&mut self, other: &CellBuffer) -> BufferResult<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(BufferError::DimensionMismatch {
                expected: (self.rows, self.cols),
                actual: (other.rows, other.cols),
            });
        }
        self.code_points.copy_from_slice(&other.code_points);
        self.widths.copy_from_slice(&other.widths);
        self.fg.clone_from(&other.fg);
        self.bg.clone_from(&other.bg);
        self.extras = other.extras.clone();
        self.ascii_only = other.ascii_only;
        Ok(())
    }

    /// Copy the row band `[top..bottom)` from `src` into `self`, shifted by
    /// `dy` rows. Rows exposed by the shift are cleared. Used exclusively
    /// by the renderer's scroll fast path; dimension mismatches are a hard
    /// programmer error, not a silent no-op.
    pub fn scroll_rows_from(&mut self, src: &CellBuffer, top: u16, bottom: u16, dy: i32) -> BufferResult<()> {
        if self.rows != src.rows || self.cols != src.cols {
            return Err(BufferError::DimensionMismatch {
                expected: (self.rows, self.cols),
                actual: (src.rows, src.cols),
            });
        }

        for row in top..bottom {
            let src_row = row as i32 + dy;
            if src_row >= top as i32 && src_row < bottom as i32 {
                self.copy_row(src, src_row as u16, row);
            } else {
                self.clear_row(row);
            }
        }
        Ok(())
    }

    fn copy_row(&mut self, src: &CellBuffer, src_row: u16, dst_row: u16) {
        for col in 0..self.cols {
            let si = src.index(src_row, col);
            let di = self.index(dst_row, col);
            self.code_points[di] = src.code_points[si];
            self.widths[di] = src.widths[si];
            self.fg[di] = src.fg[si].clone();
            self.bg[di] = src.bg[si].clone();
            if src.code_points[si] == NO_EXTRA {
                if let Some(extra) = src.extras.get(&si) {
                    self.extras.insert(di, extra.clone());
                }
            } else {
                self.extras.remove(&di);
            }
        }
    }

    fn clear_row(&mut self, row: u16) {
        for col in 0..self.cols {
            let i = self.index(row, col);
            self.blank(i);
        }
    }

    /// Low-level readonly accessors the diff renderer walks directly,
    /// avoiding the `String` allocation that [`Self::get`] does.
    pub(crate) fn raw_width(&self, i: usize) -> u8 {
        self.widths[i]
    }
    pub(crate) fn raw_code_point(&self, i: usize) -> u32 {
        self.code_points[i]
    }
    pub(crate) fn raw_extra(&self, i: usize) -> Option<&str> {
        self.extras.get(&i).map(String::as_str)
    }
    pub(crate) fn raw_fg(&self, i: usize) -> Option<&StyleToken> {
        self.fg[i].as_ref()
    }
    pub(crate) fn raw_bg(&self, i: usize) -> Option<&StyleToken> {
        self.bg[i].as_ref()
    }
}

fn ascii_fast_path(glyph: &str) -> Option<char> {
    let mut chars = glyph.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !c.is_ascii_control() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> StyleToken {
        StyleToken::from_escape(s.to_string())
    }

    #[test]
    fn clear_resets_to_blank_ascii() {
        let mut b = CellBuffer::new(2, 2);
        b.set(0, 0, "x", None, None);
        b.clear();
        assert!(b.ascii_only());
        let c = b.get(0, 0).unwrap();
        assert_eq!(c.glyph, " ");
        assert_eq!(c.width, 1);
    }

    #[test]
    fn wide_glyph_creates_continuation() {
        let mut b = CellBuffer::new(1, 3);
        b.set(0, 0, "餅", None, None);
        let base = b.get(0, 0).unwrap();
        assert_eq!(base.width, 2);
        assert_eq!(base.glyph, "餅");
        let cont = b.get(0, 1).unwrap();
        assert_eq!(cont.width, 0);
        assert_eq!(cont.glyph, "");
        assert!(!b.ascii_only());
    }

    #[test]
    fn wide_glyph_at_right_edge_is_noop() {
        let mut b = CellBuffer::new(1, 2);
        b.set(0, 0, "A", None, None);
        b.set(0, 1, "餅", None, None); // cols-1, would straddle the edge
        let c = b.get(0, 1).unwrap();
        assert_eq!(c.glyph, " ");
        assert_eq!(c.width, 1);
    }

    #[test]
    fn overwriting_continuation_clears_whole_span() {
        let mut b = CellBuffer::new(1, 3);
        b.set(0, 0, "餅", None, None);
        b.set(0, 1, "x", None, None); // writes into the continuation cell
        assert_eq!(b.get(0, 0).unwrap().glyph, " ");
        assert_eq!(b.get(0, 1).unwrap().glyph, "x");
    }

    #[test]
    fn overwriting_base_clears_old_continuation() {
        let mut b = CellBuffer::new(1, 3);
        b.set(0, 0, "餅", None, None);
        b.set(0, 0, "x", None, None);
        assert_eq!(b.get(0, 0).unwrap().width, 1);
        assert_eq!(b.get(0, 1).unwrap().glyph, " ");
        assert_eq!(b.get(0, 1).unwrap().width, 1);
    }

    #[test]
    fn out_of_bounds_write_is_ignored() {
        let mut b = CellBuffer::new(1, 1);
        b.set(5, 5, "x", None, None);
        assert!(b.get(5, 5).is_none());
    }

    #[test]
    fn copy_from_round_trips() {
        let mut a = CellBuffer::new(2, 2);
        a.set(0, 0, "x", Some(tok("\u{1b}[31m")), None);
        let mut b = CellBuffer::new(2, 2);
        b.copy_from(&a).unwrap();
        assert_eq!(b.get(0, 0), a.get(0, 0));
        assert_eq!(b.ascii_only(), a.ascii_only());
    }

    #[test]
    fn copy_from_dimension_mismatch_is_error() {
        let a = CellBuffer::new(2, 2);
        let mut b = CellBuffer::new(3, 3);
        assert!(b.copy_from(&a).is_err());
    }

    #[test]
    fn scroll_rows_from_shifts_band_and_clears_exposed_rows() {
        let mut src = CellBuffer::new(4, 1);
        for r in 0..4 {
            src.set(r, 0, &r.to_string(), None, None);
        }
        let mut dst = CellBuffer::new(4, 1);
        dst.scroll_rows_from(&src, 0, 4, -1).unwrap();
        assert_eq!(dst.get(0, 0).unwrap().glyph, "1");
        assert_eq!(dst.get(2, 0).unwrap().glyph, "3");
        assert_eq!(dst.get(3, 0).unwrap().glyph, " "); // exposed row cleared
    }

    #[test]
    fn style_token_equality_is_string_equality() {
        assert_eq!(tok("\u{1b}[31m"), tok("\u{1b}[31m"));
        assert_ne!(tok("\u{1b}[31m"), tok("\u{1b}[32m"));
    }
}
