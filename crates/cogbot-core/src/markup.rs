//! Legacy `§` formatting codes → markdown.
//!
//! Game servers and MOTDs use two-character codes (`§l` bold, `§o` italic,
//! `§r` reset, `§0`-`§f` colours, ...). Markdown has no colours, so only the
//! style codes produce output.

use std::sync::OnceLock;

use regex::Regex;

const MARKER: char = '§';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Bold,
    Italic,
    Underline,
    Strike,
}

impl Style {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'l' => Some(Self::Bold),
            'm' => Some(Self::Strike),
            'n' => Some(Self::Underline),
            'o' => Some(Self::Italic),
            _ => None,
        }
    }

    fn delimiter(self) -> &'static str {
        match self {
            Self::Bold => "**",
            Self::Italic => "*",
            Self::Underline => "__",
            Self::Strike => "~~",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    /// A recognised `§x` code.
    Code(char),
    /// `§` followed by an unknown character.
    Unknown,
    Text(&'a str),
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Leftmost-first: known code, unknown code, literal run, dangling marker.
        Regex::new(r"§([0-9a-fklmnor])|§.|[^§]+|§").expect("valid regex")
    })
}

fn tokenize(line: &str) -> impl Iterator<Item = Token<'_>> {
    token_re().captures_iter(line).map(|caps| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        if let Some(code) = caps.get(1).and_then(|m| m.as_str().chars().next()) {
            return Token::Code(code);
        }
        if whole.starts_with(MARKER) && whole.chars().count() == 2 {
            return Token::Unknown;
        }
        Token::Text(whole)
    })
}

/// Delimiters open on the current line, oldest first.
#[derive(Debug, Default)]
struct OpenStyles(Vec<Style>);

impl OpenStyles {
    fn contains(&self, style: Style) -> bool {
        self.0.contains(&style)
    }

    fn push(&mut self, style: Style, out: &mut String) {
        out.push_str(style.delimiter());
        self.0.push(style);
    }

    fn close_all(&mut self, out: &mut String) {
        while let Some(style) = self.0.pop() {
            out.push_str(style.delimiter());
        }
    }
}

fn convert_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut open = OpenStyles::default();

    for token in tokenize(line) {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Code('r') => {
                open.close_all(&mut out);
                out.push(' ');
            }
            Token::Code(code) => {
                // Re-opening an active style is a no-op, not a toggle.
                if let Some(style) = Style::from_code(code) {
                    if !open.contains(style) {
                        open.push(style, &mut out);
                    }
                }
            }
            Token::Unknown => {}
        }
    }

    open.close_all(&mut out);
    out
}

/// Convert `§`-coded text to markdown, line by line.
///
/// Styles never leak across lines: whatever is still open at a line break is
/// closed before it.
pub fn convert(text: &str) -> String {
    text.split('\n')
        .map(convert_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Alias kept for callers that know it by its old name.
pub fn mc_to_md(text: &str) -> String {
    convert(text)
}
