//! The ANSI escape-sequence vocabulary the diff renderer is allowed to
//! emit. Deliberately narrow: only what the external-interfaces grammar
//! whitelists. No truecolor, no SGR attribute codes, no Kitty/focus/
//! hyperlink/title extensions — those belong to a richer renderer, not
//! this core.

use std::fmt::Write as _;

pub const ESC: &str = "\u{1b}[";

/// `ESC[<row>;<col>H`, 1-based.
pub fn cursor_to(out: &mut String, row: u16, col: u16) {
    let _ = write!(out, "{ESC}{};{}H", row + 1, col + 1);
}

/// `ESC[39m`
pub fn default_fg(out: &mut String) {
    out.push_str(ESC);
    out.push_str("39m");
}

/// `ESC[49m`
pub fn default_bg(out: &mut String) {
    out.push_str(ESC);
    out.push_str("49m");
}

/// `ESC[0m`
pub fn reset(out: &mut String) {
    out.push_str(ESC);
    out.push_str("0m");
}

/// `ESC[<top>;<bot>r` — set DECSTBM scroll region, 1-based inclusive rows.
pub fn set_scroll_region(out: &mut String, top: u16, bottom: u16) {
    let _ = write!(out, "{ESC}{};{}r", top + 1, bottom + 1);
}

/// `ESC[r` — clear the scroll region.
pub fn clear_scroll_region(out: &mut String) {
    out.push_str(ESC);
    out.push('r');
}

/// `ESC[<n>S` — scroll the region up by `n` rows.
pub fn scroll_up(out: &mut String, n: u16) {
    let _ = write!(out, "{ESC}{n}S");
}

/// `ESC[<n>T` — scroll the region down by `n` rows.
pub fn scroll_down(out: &mut String, n: u16) {
    let _ = write!(out, "{ESC}{n}T");
}

/// `ESC[2J`
pub fn clear_screen(out: &mut String) {
    out.push_str(ESC);
    out.push_str("2J");
}

/// `ESC[H`
pub fn cursor_home(out: &mut String) {
    out.push_str(ESC);
    out.push('H');
}

/// `ESC[?25l`
pub fn cursor_hide(out: &mut String) {
    out.push_str(ESC);
    out.push_str("?25l");
}

/// `ESC[?25h`
pub fn cursor_show(out: &mut String) {
    out.push_str(ESC);
    out.push_str("?25h");
}

/// `ESC[?2004h`
pub fn bracketed_paste_enable(out: &mut String) {
    out.push_str(ESC);
    out.push_str("?2004h");
}

/// `ESC[?2004l`
pub fn bracketed_paste_disable(out: &mut String) {
    out.push_str(ESC);
    out.push_str("?2004l");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_to_is_one_based() {
        let mut s = String::new();
        cursor_to(&mut s, 0, 0);
        assert_eq!(s, "\u{1b}[1;1H");
    }

    #[test]
    fn scroll_region_bytes() {
        let mut s = String::new();
        set_scroll_region(&mut s, 2, 21);
        assert_eq!(s, "\u{1b}[3;22r");
    }

    #[test]
    fn scroll_up_bytes() {
        let mut s = String::new();
        scroll_up(&mut s, 1);
        assert_eq!(s, "\u{1b}[1S");
    }
}
