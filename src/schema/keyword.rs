//! Reserved words of the schema language.

use phf::{Map, phf_map};

/// Every reserved word. None of these may name a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    After,
    As,
    Any,
    Anything,
    Digit,
    End,
    Forever,
    None,
    Not,
    Optionally,
    Or,
    Space,
    Start,
    Times,
    To,
    Whitespace,
}

/// Keep sorted alphabetically.
const KEYWORDS: Map<&'static str, Keyword> = phf_map! {
    "after" => Keyword::After,
    "any" => Keyword::Any,
    "anything" => Keyword::Anything,
    "as" => Keyword::As,
    "digit" => Keyword::Digit,
    "end" => Keyword::End,
    "forever" => Keyword::Forever,
    "none" => Keyword::None,
    "not" => Keyword::Not,
    "optionally" => Keyword::Optionally,
    "or" => Keyword::Or,
    "space" => Keyword::Space,
    "start" => Keyword::Start,
    "times" => Keyword::Times,
    "to" => Keyword::To,
    "whitespace" => Keyword::Whitespace,
};

impl Keyword {
    /// Keywords are case-insensitive.
    pub fn lookup(word: &str) -> Option<Keyword> {
        KEYWORDS.get(word.to_ascii_lowercase().as_str()).copied()
    }
}

pub fn is_reserved(word: &str) -> bool {
    Keyword::lookup(word).is_some()
}

/// Characters allowed in symbol names, variable names and capture names.
pub fn is_symbol_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
