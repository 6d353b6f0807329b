//! Grapheme cluster segmentation and column-width measurement.
//!
//! Terminal rendering and layout both need to reason about *user-perceived*
//! characters rather than raw code points: `é` is one cell whether it is
//! encoded as a single precomposed code point or as `e` + combining acute,
//! and `👩🏽‍💻` is a single cluster that still occupies two columns.
//!
//! This module is pure and side-effect-free; it never touches a buffer or a
//! terminal, so it can be called from layout, drawing, or tests alike.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width of a grapheme cluster or string, in terminal columns.
pub type Width = u8;

/// Scan a cluster's code points and classify its column width.
///
/// Returns `0` if the cluster's first non-combining code point is a control
/// character, `2` if it falls in a wide range (Hangul, CJK, Hiragana/
/// Katakana, fullwidth forms, or an emoji-relevant supplementary plane), and
/// `1` otherwise.
pub fn measure(cluster: &str) -> Width {
    let Some(first) = cluster.chars().next() else {
        return 0;
    };

    if is_control(first) {
        return 0;
    }

    // unicode-width already implements UAX #11 east-asian-width plus the
    // emoji-presentation carve-outs; clamp to the {0,1,2} the buffer expects.
    match cluster.width() {
        0 => 0,
        1 => 1,
        _ => 2,
    }
}

fn is_control(c: char) -> bool {
    let code = c as u32;
    (0x0000..=0x001F).contains(&code) || (0x007F..=0x009F).contains(&code)
}

/// Split `s` into extended grapheme clusters, in order.
pub fn segment(s: &str) -> Vec<&str> {
    s.graphemes(true).collect()
}

/// Sum of cluster widths across the whole string.
pub fn measure_text(s: &str) -> usize {
    s.graphemes(true).map(|g| measure(g) as usize).sum()
}

/// Consume clusters greedily while total width plus the ellipsis's width
/// stays within `cap`. If `s` already fits, it is returned unchanged.
/// Never splits a cluster and never leaves a lone continuation behind.
pub fn truncate(s: &str, cap: usize, ellipsis: &str) -> String {
    if cap == 0 {
        return String::new();
    }

    if measure_text(s) <= cap {
        return s.to_string();
    }

    let ellipsis_width = measure_text(ellipsis);
    let budget = cap.saturating_sub(ellipsis_width);

    let mut out = String::new();
    let mut width = 0usize;
    for g in s.graphemes(true) {
        let w = measure(g) as usize;
        if width + w > budget {
            break;
        }
        out.push_str(g);
        width += w;
    }
    out.push_str(ellipsis);
    out
}

/// Word-wrap text to `cap` columns.
///
/// Hard newlines split logical lines first. Within a logical line, wrapping
/// is greedy on whitespace boundaries; a single word wider than `cap` is
/// hard-wrapped by grapheme width so no cluster is ever split.
pub fn wrap(s: &str, cap: usize) -> Vec<String> {
    if cap == 0 {
        return s.lines().map(str::to_string).collect();
    }

    let mut out = Vec::new();
    for logical_line in s.split('\n') {
        wrap_line(logical_line, cap, &mut out);
    }
    out
}

fn wrap_line(line: &str, cap: usize, out: &mut Vec<String>) {
    if line.is_empty() {
        out.push(String::new());
        return;
    }

    let mut current = String::new();
    let mut current_width = 0usize;

    for word in line.split(' ') {
        let word_width = measure_text(word);

        if word_width > cap {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_width = 0;
            }
            hard_wrap_word(word, cap, out);
            continue;
        }

        let sep_width = if current.is_empty() { 0 } else { 1 };
        if current_width + sep_width + word_width > cap {
            out.push(std::mem::take(&mut current));
            current_width = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }

    if !current.is_empty() {
        out.push(current);
    }
}

fn hard_wrap_word(word: &str, cap: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut width = 0usize;
    for g in word.graphemes(true) {
        let w = measure(g) as usize;
        if width + w > cap && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            width = 0;
        }
        current.push_str(g);
        width += w;
    }
    if !current.is_empty() {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_printable_is_width_one() {
        assert_eq!(measure("a"), 1);
        assert_eq!(measure("Z"), 1);
    }

    #[test]
    fn control_is_width_zero() {
        assert_eq!(measure("\u{0007}"), 0);
        assert_eq!(measure("\u{009F}"), 0);
    }

    #[test]
    fn cjk_is_width_two() {
        assert_eq!(measure("餅"), 2);
        assert_eq!(measure("あ"), 2);
    }

    #[test]
    fn combining_mark_is_one_cluster() {
        // "e" + combining acute accent
        let s = "e\u{0301}";
        let clusters = segment(s);
        assert_eq!(clusters.len(), 1);
        assert_eq!(measure(clusters[0]), 1);
    }

    #[test]
    fn measure_text_sums_clusters() {
        assert_eq!(measure_text("hello"), 5);
        assert_eq!(measure_text("餅餅"), 4);
    }

    #[test]
    fn truncate_zero_cap_is_empty() {
        assert_eq!(truncate("hello", 0, "…"), "");
    }

    #[test]
    fn truncate_fits_unchanged() {
        assert_eq!(truncate("hi", 10, "…"), "hi");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("hello world", 6, "…"), "hello…");
    }

    #[test]
    fn truncate_never_splits_wide_cluster() {
        // cap lands mid-kanji; the whole cluster must be dropped, not split
        let out = truncate("A餅B", 2, "");
        assert_eq!(measure_text(&out), 1);
        assert_eq!(out, "A");
    }

    #[test]
    fn wrap_one_column_never_splits_a_grapheme() {
        // A width-2 cluster can't fit in a 1-column cap; the invariant that
        // actually holds is "never split a cluster", not "every line fits
        // the cap" — a lone wide grapheme overflows it rather than being
        // torn in half.
        let lines = wrap("餅餅", 1);
        assert!(lines.iter().all(|l| l.graphemes(true).count() == 1));
        assert_eq!(lines, vec!["餅", "餅"]);
    }

    #[test]
    fn wrap_respects_hard_newlines() {
        let lines = wrap("a\nb\nc", 10);
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn wrap_greedy_word_wrap() {
        let lines = wrap("hello world", 5);
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn wrap_hard_wraps_overlong_word() {
        let lines = wrap("abcdefgh", 3);
        assert_eq!(lines, vec!["abc", "def", "gh"]);
    }
}
