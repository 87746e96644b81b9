//! Matching engine for compiled schemas.
//!
//! Evaluation is a recursive backtracking walk over the read-only tree in
//! [`crate::schema`]. All mutable state lives in a per-call
//! [`MatchCtx`](context::MatchCtx), and continuation state for `global`
//! searches lives in a [`Tracker`].

pub mod context;
pub mod criterion;
pub mod matcher;
pub mod search;
pub mod template;

pub use search::{DEFAULT_ENTRY, Match, MatchOptions, Tracker};
