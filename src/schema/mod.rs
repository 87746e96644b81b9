//! RegTracks schema language.
//!
//! A schema is a list of symbols. `@name` on its own line names the next
//! construct: either a pattern delimited by `||` lines, or a charset written
//! as a single comma-separated line. Unnamed patterns are keyed `0`, `1`, ...
//!
//! # Rule syntax
//!
//! One rule per line inside a pattern.
//!
//! | Construct            | Meaning                                          |
//! |----------------------|--------------------------------------------------|
//! | `(text)`             | Literal text                                     |
//! | `($name)`            | Text of a capture or caller-supplied variable    |
//! | `any a, b to z, set` | One character from any element                   |
//! | `none a, b to z`     | One character matching no element                |
//! | `start` / `end`      | Start or end of the text (zero width)            |
//! | `{ ... }`            | Block of rules matched as one unit               |
//! | `name`               | Another pattern                                  |
//!
//! | Modifier                   | Meaning                                    |
//! |----------------------------|--------------------------------------------|
//! | `or X`                     | Alternative to the previous sibling        |
//! | `optionally X`             | Failure of `X` is ignored                  |
//! | `not X`                    | Succeeds without consuming if `X` fails    |
//! | `times N`                  | Exactly N                                  |
//! | `times N to M`             | Between N and M                            |
//! | `times N to forever`       | At least N                                 |
//! | `times forever`            | At least once                              |
//! | `after X`                  | Separator tried between repetitions        |
//! | `as ident`                 | Collect consumed text under `ident`        |
//!
//! Builtin charsets: `anything`, `space`, `digit`, `whitespace`.
//! Keywords are case-insensitive. `#` starts a comment.

pub mod ast;
pub mod builder;
pub mod keyword;
pub mod parser;

pub use ast::{
    Block, Charset, Criterion, Endpoint, MatchingRule, Node, NodeKind, Pattern, Repeat, Schema,
    Symbol,
};
pub use parser::compile;
