//! Color resolution: turns the small set of user-facing color inputs into
//! pre-formed [`StyleToken`]s, once, at set-time.
//!
//! Accepted inputs (external interfaces, color resolution): one of the
//! eight named ANSI colors, a 256-palette index, or an already-formed SGR
//! escape beginning with `ESC[`. Everything downstream of this module only
//! ever compares tokens by string equality.

use crate::cell::StyleToken;

const ESC: &str = "\u{1b}[";

/// One of the eight base ANSI colors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl NamedColor {
    fn fg_code(self) -> u8 {
        30 + self.offset()
    }
    fn bg_code(self) -> u8 {
        40 + self.offset()
    }
    fn offset(self) -> u8 {
        match self {
            NamedColor::Black => 0,
            NamedColor::Red => 1,
            NamedColor::Green => 2,
            NamedColor::Yellow => 3,
            NamedColor::Blue => 4,
            NamedColor::Magenta => 5,
            NamedColor::Cyan => 6,
            NamedColor::White => 7,
        }
    }

    /// Parse a lowercase color name, per the accepted-inputs list.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "black" => NamedColor::Black,
            "red" => NamedColor::Red,
            "green" => NamedColor::Green,
            "yellow" => NamedColor::Yellow,
            "blue" => NamedColor::Blue,
            "magenta" => NamedColor::Magenta,
            "cyan" => NamedColor::Cyan,
            "white" => NamedColor::White,
            _ => return None,
        })
    }
}

/// A color as the application supplies it, before resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ColorInput {
    Named(NamedColor),
    Palette256(u8),
    /// A pre-formed escape, expected to begin with `ESC[`.
    Escape(String),
}

/// Resolve a foreground color input into a style token.
pub fn fg_token(input: &ColorInput) -> StyleToken {
    match input {
        ColorInput::Named(n) => StyleToken::from_escape(format!("{ESC}{}m", n.fg_code())),
        ColorInput::Palette256(n) => StyleToken::from_escape(format!("{ESC}38;5;{n}m")),
        ColorInput::Escape(s) => StyleToken::from_escape(s.clone()),
    }
}

/// Resolve a background color input into a style token.
///
/// A pre-formed fg escape is converted to its bg equivalent by replacing
/// the `38;` prefix with `48;`, per the color-resolution rules; other
/// pre-formed escapes are passed through unchanged (the caller is
/// responsible for supplying a bg-shaped escape in that case).
pub fn bg_token(input: &ColorInput) -> StyleToken {
    match input {
        ColorInput::Named(n) => StyleToken::from_escape(format!("{ESC}{}m", n.bg_code())),
        ColorInput::Palette256(n) => StyleToken::from_escape(format!("{ESC}48;5;{n}m")),
        ColorInput::Escape(s) => {
            if let Some(rest) = s.strip_prefix(&format!("{ESC}38;")) {
                StyleToken::from_escape(format!("{ESC}48;{rest}"))
            } else {
                StyleToken::from_escape(s.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_fg_and_bg_codes() {
        assert_eq!(fg_token(&ColorInput::Named(NamedColor::Red)).as_str(), "\u{1b}[31m");
        assert_eq!(bg_token(&ColorInput::Named(NamedColor::Red)).as_str(), "\u{1b}[41m");
    }

    #[test]
    fn palette_256() {
        assert_eq!(fg_token(&ColorInput::Palette256(200)).as_str(), "\u{1b}[38;5;200m");
        assert_eq!(bg_token(&ColorInput::Palette256(200)).as_str(), "\u{1b}[48;5;200m");
    }

    #[test]
    fn preformed_fg_escape_converts_to_bg() {
        let input = ColorInput::Escape("\u{1b}[38;5;9m".to_string());
        assert_eq!(bg_token(&input).as_str(), "\u{1b}[48;5;9m");
    }

    #[test]
    fn parse_named_color() {
        assert_eq!(NamedColor::parse("cyan"), Some(NamedColor::Cyan));
        assert_eq!(NamedColor::parse("chartreuse"), None);
    }
}
