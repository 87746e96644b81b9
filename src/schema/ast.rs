//! Compiled tree for RegTracks schemas.
//!
//! The tree is built once by the compiler and is read-only afterwards, so a
//! single [`Schema`] can be shared between any number of concurrent matches.

use std::collections::BTreeMap;

use crate::error::{Result, RuntimeError, SymbolKind};

/// A compiled schema: every top-level symbol keyed by name.
///
/// Anonymous patterns are keyed `"0"`, `"1"`, ... in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub(crate) symbols: BTreeMap<String, Symbol>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Names of all symbols, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Look up a pattern, failing if the name is unknown or names a charset.
    pub fn pattern(&self, name: &str) -> Result<&Pattern> {
        match self.symbols.get(name) {
            Some(Symbol::Pattern(pattern)) => Ok(pattern),
            Some(Symbol::Charset(_)) => Err(RuntimeError::WrongSymbolKind {
                name: name.to_owned(),
                expected: SymbolKind::Pattern,
            }
            .into()),
            None => Err(RuntimeError::UnknownSymbol(name.to_owned()).into()),
        }
    }

    /// Look up a charset, failing if the name is unknown or names a pattern.
    pub fn charset(&self, name: &str) -> Result<&Charset> {
        match self.symbols.get(name) {
            Some(Symbol::Charset(charset)) => Ok(charset),
            Some(Symbol::Pattern(_)) => Err(RuntimeError::WrongSymbolKind {
                name: name.to_owned(),
                expected: SymbolKind::Charset,
            }
            .into()),
            None => Err(RuntimeError::UnknownSymbol(name.to_owned()).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Pattern(Pattern),
    Charset(Charset),
}

/// A top-level matchable unit, delimited by `||` in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: String,
    pub root: Block,
}

/// A named, ordered, first-match-wins list of criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    pub name: String,
    pub criteria: Vec<Criterion>,
}

/// An ordered group of sibling nodes that match as one unit.
///
/// The first child never forks, and a closed block always has a child.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub children: Vec<Node>,
}

/// One rule-level node plus the modifiers attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// `or`: an alternative to the previous sibling.
    pub forks: bool,
    /// `optionally`: failure does not fail the enclosing block.
    pub optional: bool,
    /// `not`: zero-width, succeeds only when the node does not match.
    pub negated: bool,
    /// `as <ident>`: capture buffer that collects every consumed character.
    pub collect_as: Option<String>,
    pub repeat: Option<Box<Repeat>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            forks: false,
            optional: false,
            negated: false,
            collect_as: None,
            repeat: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Block(Block),
    Rule(MatchingRule),
    /// Another pattern, resolved by name at match time.
    Reference(String),
}

/// An `any`/`none` set, a literal, or an endpoint assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingRule {
    /// `true` for `any` (and literals), `false` for `none`.
    pub inclusive: bool,
    pub criteria: Vec<Criterion>,
}

/// `times N to M`, with an optional separator tried between repetitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    pub min: u32,
    /// `None` is `forever`.
    pub max: Option<u32>,
    pub after: Option<Node>,
}

impl Repeat {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self {
            min,
            max,
            after: None,
        }
    }

    pub fn satisfied_by(&self, count: u32) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Literal(String),
    /// `$name`: a capture from this match, or a caller-supplied variable.
    Variable(String),
    /// Inclusive range, always stored low-to-high.
    Range(char, char),
    /// A builtin class or a user charset.
    Symbol(String),
    Endpoint(Endpoint),
}

impl Criterion {
    /// Build a range criterion, normalising the bounds.
    pub fn range(a: char, b: char) -> Self {
        if a <= b {
            Self::Range(a, b)
        } else {
            Self::Range(b, a)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}
