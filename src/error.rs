//! Error types for schema compilation and matching.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the crate.
///
/// None of these are recoverable internally: compilation aborts on the first
/// problem, and a match/test/replace call aborts without partial results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed schema text.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// The schema parsed, but the tree it describes is structurally illegal.
    #[error("Internal consistency error: {0}")]
    Internal(String),
    /// A lookup failed while matching.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// A syntax error with enough source context to point at the culprit.
///
/// `column` and `offset` count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    /// The full source line containing the error, without its newline.
    pub line: String,
    /// 1-based line number.
    pub line_number: usize,
    /// 0-based column within `line`.
    pub column: usize,
    /// 0-based offset from the start of the schema.
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Syntax error: {}", self.message)?;
        writeln!(f)?;
        writeln!(f, "{}", self.line)?;
        writeln!(f, "{}^", " ".repeat(self.column))?;
        write!(f, "At character {}", self.offset)
    }
}

impl std::error::Error for SyntaxError {}

/// The kind of top-level symbol a lookup expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Pattern,
    Charset,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "a pattern"),
            Self::Charset => write!(f, "a character set"),
        }
    }
}

/// Failures that can only be detected while matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Symbol '{0}' does not exist")]
    UnknownSymbol(String),
    #[error("Symbol '{name}' is not {expected}")]
    WrongSymbolKind { name: String, expected: SymbolKind },
    #[error("Must provide an entry point")]
    MissingEntryPoint,
    #[error("No variable '{0}' provided")]
    MissingVariable(String),
}
