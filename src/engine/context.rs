//! Per-call matching state.
//!
//! A [`MatchCtx`] is created for every search and never shared, so one
//! compiled [`Schema`] can serve any number of concurrent matches.

use std::collections::HashMap;

use crate::schema::Schema;

/// Cursor, capture buffers and the capture names currently collecting.
///
/// All positions are character (not byte) indices into `text`.
pub struct MatchCtx<'a> {
    pub schema: &'a Schema,
    pub text: &'a [char],
    pub pos: usize,
    /// Text collected so far under each `as <ident>` name.
    pub captured: HashMap<String, String>,
    /// Caller-supplied values for `($name)` literals.
    pub variables: &'a HashMap<String, String>,
    /// Capture names of every node enclosing the one being evaluated.
    collecting: Vec<&'a str>,
}

/// A snapshot of cursor and captures to roll back to.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pos: usize,
    captured: HashMap<String, String>,
}

impl<'a> MatchCtx<'a> {
    pub fn new(
        schema: &'a Schema,
        text: &'a [char],
        variables: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            schema,
            text,
            pos: 0,
            captured: HashMap::new(),
            variables,
            collecting: Vec::new(),
        }
    }

    /// Prepare for a fresh attempt at `start`.
    pub fn reset(&mut self, start: usize) {
        self.pos = start;
        self.captured.clear();
        self.collecting.clear();
    }

    /// The character under the cursor, or `None` past the end.
    pub fn current(&self) -> Option<char> {
        self.text.get(self.pos).copied()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Consume one character, appending it to every active capture.
    pub fn advance(&mut self) {
        let Some(ch) = self.current() else {
            return;
        };
        for name in &self.collecting {
            self.captured
                .entry((*name).to_owned())
                .or_default()
                .push(ch);
        }
        self.pos += 1;
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            captured: self.captured.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        self.pos = checkpoint.pos;
        self.captured.clone_from(&checkpoint.captured);
    }

    /// Start collecting under `name`. Returns false if it already was, in
    /// which case there is nothing to [`end_capture`](Self::end_capture).
    pub fn begin_capture(&mut self, name: &'a str) -> bool {
        if self.collecting.contains(&name) {
            return false;
        }
        self.collecting.push(name);
        true
    }

    pub fn end_capture(&mut self) {
        self.collecting.pop();
    }

    /// Resolve `($name)`: this match's captures first, then supplied variables.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.captured
            .get(name)
            .or_else(|| self.variables.get(name))
            .map(String::as_str)
    }
}
