//! Criterion evaluation and the builtin character classes.

use crate::error::{Result, RuntimeError};
use crate::schema::{Charset, Criterion, Endpoint};

use super::context::MatchCtx;

/// Character classes every schema can name without defining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Any character except a newline.
    Anything,
    /// The ASCII space only.
    Space,
    /// `0` to `9`.
    Digit,
    /// Any character at or below the space.
    Whitespace,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "anything" => Some(Self::Anything),
            "space" => Some(Self::Space),
            "digit" => Some(Self::Digit),
            "whitespace" => Some(Self::Whitespace),
            _ => None,
        }
    }

    pub fn matches(self, ch: char) -> bool {
        match self {
            Self::Anything => ch != '\n',
            Self::Space => ch == ' ',
            Self::Digit => ch.is_ascii_digit(),
            Self::Whitespace => ch <= ' ',
        }
    }
}

/// Try one criterion at the cursor. On failure nothing is consumed.
pub fn criterion<'a>(criterion: &'a Criterion, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    match criterion {
        Criterion::Literal(text) => Ok(text_matches(text, ctx)),
        Criterion::Variable(name) => {
            let Some(value) = ctx.variable(name) else {
                return Err(RuntimeError::MissingVariable(name.clone()).into());
            };
            // The value may be a capture that grows while it is compared.
            let value = value.to_owned();
            Ok(text_matches(&value, ctx))
        }
        Criterion::Range(lo, hi) => Ok(single(ctx, |ch| *lo <= ch && ch <= *hi)),
        Criterion::Symbol(name) => match Builtin::from_name(name) {
            Some(builtin) => Ok(single(ctx, |ch| builtin.matches(ch))),
            None => {
                let schema = ctx.schema;
                charset(schema.charset(name)?, ctx)
            }
        },
        Criterion::Endpoint(Endpoint::Start) => Ok(ctx.pos == 0),
        Criterion::Endpoint(Endpoint::End) => Ok(ctx.at_end()),
    }
}

/// First criterion to match wins.
pub fn charset<'a>(charset: &'a Charset, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    for c in &charset.criteria {
        if criterion(c, ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Compare `text` character by character, rolling back on a mismatch.
fn text_matches(text: &str, ctx: &mut MatchCtx<'_>) -> bool {
    let checkpoint = ctx.checkpoint();
    for expected in text.chars() {
        if ctx.current() != Some(expected) {
            ctx.restore(&checkpoint);
            return false;
        }
        ctx.advance();
    }
    true
}

/// Consume one character if it satisfies `test`.
fn single(ctx: &mut MatchCtx<'_>, test: impl FnOnce(char) -> bool) -> bool {
    match ctx.current() {
        Some(ch) if test(ch) => {
            ctx.advance();
            true
        }
        _ => false,
    }
}
