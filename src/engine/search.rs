//! Search, test and replace over whole strings.
//!
//! A [`Tracker`] owns the `global` continuation state: after a successful
//! global search the next one starts where the last match ended (one past it
//! for an empty match), and after a failed search it wraps back to the start
//! of the text.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{Error, Result, RuntimeError};
use crate::schema::{Pattern, Schema};

use super::context::MatchCtx;
use super::matcher;
use super::template;

/// Entry pattern used when none is named: the first anonymous pattern.
pub const DEFAULT_ENTRY: &str = "0";

/// Per-call options. Builder style:
///
/// ```
/// use regtracks::MatchOptions;
///
/// let options = MatchOptions::new()
///     .entry("list")
///     .global(true)
///     .variable("delim", ",");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Pattern to match. Defaults to [`DEFAULT_ENTRY`].
    pub entry: Option<String>,
    /// Unset means `false` for find/test and `true` for replace.
    pub global: Option<bool>,
    /// Values for `($name)` literals.
    pub variables: HashMap<String, String>,
}

impl MatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub text: String,
    /// Character index of the first matched character.
    pub start: usize,
    /// Character index just past the match.
    pub end: usize,
    /// Text collected under each `as <ident>`. Names that collected nothing
    /// are absent.
    pub captured: HashMap<String, String>,
}

impl Match {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captured.get(name).map(String::as_str)
    }
}

struct Found {
    start: usize,
    end: usize,
    captured: HashMap<String, String>,
}

/// Stateful matcher over a compiled schema.
#[derive(Debug, Clone)]
pub struct Tracker<'s> {
    schema: &'s Schema,
    last_index: usize,
}

impl<'s> Tracker<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            last_index: 0,
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Where the next `global` search starts.
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn reset(&mut self) {
        self.last_index = 0;
    }

    pub fn test(&mut self, text: &str, options: &MatchOptions) -> Result<bool> {
        let chars: Vec<char> = text.chars().collect();
        let global = options.global.unwrap_or(false);
        Ok(self.search(&chars, options, global)?.is_some())
    }

    pub fn find(&mut self, text: &str, options: &MatchOptions) -> Result<Option<Match>> {
        let chars: Vec<char> = text.chars().collect();
        let global = options.global.unwrap_or(false);
        let found = self.search(&chars, options, global)?;
        Ok(found.map(|found| Match {
            text: chars[found.start..found.end].iter().collect(),
            start: found.start,
            end: found.end,
            captured: found.captured,
        }))
    }

    /// Replace every non-overlapping match (only the first unless `global`)
    /// with `template`, expanding `$(name)` from that match's captures.
    pub fn replace(
        &mut self,
        text: &str,
        template: &str,
        options: &MatchOptions,
    ) -> Result<String> {
        let mut chars: Vec<char> = text.chars().collect();
        let global = options.global.unwrap_or(true);

        let mut spans: Vec<Found> = Vec::new();
        while let Some(found) = self.search(&chars, options, global)? {
            spans.push(found);
            if !global {
                break;
            }
        }

        for span in spans.iter().rev() {
            let replacement = template::expand(template, &span.captured);
            trace!(start = span.start, end = span.end, %replacement, "replacing");
            chars.splice(span.start..span.end, replacement.chars());
        }
        Ok(chars.into_iter().collect())
    }

    fn entry_pattern(&self, options: &MatchOptions) -> Result<&'s Pattern> {
        let schema = self.schema;
        match options.entry.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => schema.pattern(name),
            None => schema
                .pattern(DEFAULT_ENTRY)
                .map_err(|_| Error::from(RuntimeError::MissingEntryPoint)),
        }
    }

    /// Try the entry pattern at each offset from `last_index` on.
    fn search(
        &mut self,
        text: &[char],
        options: &MatchOptions,
        global: bool,
    ) -> Result<Option<Found>> {
        let pattern = self.entry_pattern(options)?;
        if !global {
            self.last_index = 0;
        }

        let mut ctx = MatchCtx::new(self.schema, text, &options.variables);
        for start in self.last_index..text.len() {
            trace!(entry = %pattern.name, start, "trying offset");
            ctx.reset(start);
            if matcher::pattern(pattern, &mut ctx)? {
                let end = ctx.pos;
                debug!(entry = %pattern.name, start, end, "match found");
                // An empty match would be found again at the same offset.
                self.last_index = if global && start == end { end + 1 } else { end };
                return Ok(Some(Found {
                    start,
                    end,
                    captured: std::mem::take(&mut ctx.captured),
                }));
            }
        }

        self.last_index = 0;
        Ok(None)
    }
}

impl Schema {
    /// A stateful matcher that carries `global` progress between calls.
    pub fn tracker(&self) -> Tracker<'_> {
        Tracker::new(self)
    }

    /// Test `text` with a fresh [`Tracker`].
    pub fn is_match(&self, text: &str, options: &MatchOptions) -> Result<bool> {
        self.tracker().test(text, options)
    }

    /// Find the first match in `text` with a fresh [`Tracker`].
    pub fn find(&self, text: &str, options: &MatchOptions) -> Result<Option<Match>> {
        self.tracker().find(text, options)
    }

    /// Replace matches in `text` with a fresh [`Tracker`].
    pub fn replace(&self, text: &str, template: &str, options: &MatchOptions) -> Result<String> {
        self.tracker().replace(text, template, options)
    }
}
