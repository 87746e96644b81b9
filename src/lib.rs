//! RegTracks: readable, line-oriented text patterns with a backtracking matcher.
//!
//! A schema is compiled once into an immutable [`Schema`] and then used for
//! any number of searches, tests and replacements.
//!
//! # Example
//!
//! ```rust
//! use regtracks::{MatchOptions, compile};
//!
//! let schema = compile(
//!     "
//!     @version
//!     ||
//!     any digit as major
//!       times forever
//!     (.)
//!     any digit as minor
//!       times forever
//!     ||
//!     ",
//! )?;
//!
//! let options = MatchOptions::new().entry("version");
//! let found = schema.find("release 12.4 is out", &options)?.unwrap();
//! assert_eq!(found.text, "12.4");
//! assert_eq!(found.start, 8);
//! assert_eq!(found.get("major"), Some("12"));
//!
//! let swapped = schema.replace("1.2 and 3.4", "$(minor).$(major)", &options)?;
//! assert_eq!(swapped, "2.1 and 4.3");
//! # Ok::<(), regtracks::Error>(())
//! ```
//!
//! All positions are character (not byte) indices.

pub mod engine;
mod error;
pub mod schema;

pub use engine::{DEFAULT_ENTRY, Match, MatchOptions, Tracker};
pub use error::{Error, Result, RuntimeError, SymbolKind, SyntaxError};
pub use schema::{Schema, compile};
