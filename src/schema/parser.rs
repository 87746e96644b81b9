//! Recursive descent compiler for RegTracks schemas.
//!
//! A single forward pass over the schema text. The scanner never re-reads
//! input; it only peeks ahead to recognise `to`, `forever` and two-character
//! symbol names.

use tracing::debug;

use super::ast::{Criterion, Endpoint, Schema};
use super::builder::{Prefix, TreeBuilder};
use super::keyword::{Keyword, is_symbol_char};
use crate::error::{Error, Result, SyntaxError};

/// Compile schema text into a [`Schema`].
pub fn compile(schema: &str) -> Result<Schema> {
    let mut parser = Parser {
        source: schema.chars().collect(),
        at: 0,
        builder: TreeBuilder::new(),
        pending_symbol: None,
    };
    parser.parse_schema()?;
    let compiled = parser.builder.finish()?;
    debug!(symbols = compiled.len(), "compiled schema");
    Ok(compiled)
}

struct Parser {
    source: Vec<char>,
    at: usize,
    builder: TreeBuilder,
    /// A `@name` waiting for its pattern or charset.
    pending_symbol: Option<String>,
}

impl Parser {
    fn parse_schema(&mut self) -> Result<()> {
        loop {
            self.skip_all_space();
            match self.peek() {
                None => break,
                Some('@') => self.parse_symbol_definition()?,
                Some('|') => self.parse_pattern()?,
                Some('#') => self.skip_comment(),
                Some(_) => match self.pending_symbol.take() {
                    Some(name) => {
                        self.builder.begin_charset(name)?;
                        self.parse_charset_body()?;
                    }
                    None => return Err(self.error("Unexpected character")),
                },
            }
        }
        if self.pending_symbol.is_some() {
            return Err(self.error("Expected a pattern or charset after symbol definition"));
        }
        Ok(())
    }

    /// `@name` on a line of its own.
    fn parse_symbol_definition(&mut self) -> Result<()> {
        self.expect('@')?;
        if self.pending_symbol.is_some() {
            return Err(self.error("Cannot define symbol here"));
        }
        let name = self.read_word();
        if name.chars().count() < 2 {
            return Err(self.error("Symbol name must be at least 2 characters long"));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("Symbol cannot begin with a number"));
        }
        if !self.builder.is_valid_symbol_name(&name) {
            return Err(self.error(
                "Symbol name is not allowed (either reserved or previously defined)",
            ));
        }
        self.finish_line()?;
        self.pending_symbol = Some(name);
        Ok(())
    }

    /// `||`, one rule per line, `||`.
    fn parse_pattern(&mut self) -> Result<()> {
        self.expect('|')?;
        self.expect('|')?;
        self.finish_line()?;
        self.builder.begin_pattern(self.pending_symbol.take())?;

        loop {
            self.skip_all_space();
            match self.peek() {
                None => return Err(self.error("Unclosed pattern, expected ||")),
                Some('|') => {
                    self.expect('|')?;
                    self.expect('|')?;
                    self.finish_line()?;
                    break;
                }
                Some('#') => self.skip_comment(),
                Some('}') => return Err(self.error("Unexpected '}' outside a block")),
                Some(_) => self.parse_rule_line()?,
            }
        }
        self.builder.end_pattern()
    }

    /// Parse one rule: prefix modifiers, exactly one construct, then an
    /// optional `times ...` and `as <ident>`.
    ///
    /// Stops before a `}` so the enclosing block can close on the same line.
    fn parse_rule_line(&mut self) -> Result<()> {
        let mut prefix = Prefix::default();
        let mut emitted = false;

        loop {
            self.skip_inline_space();
            match self.peek() {
                None | Some('\n') | Some('}') => break,
                Some('#') => {
                    self.skip_comment();
                    break;
                }
                Some('(') => {
                    self.check_single_construct(emitted)?;
                    self.builder.add_rule(prefix, true)?;
                    self.parse_literal()?;
                    prefix = Prefix::default();
                    emitted = true;
                }
                Some('{') => {
                    if emitted {
                        return Err(self.error("Cannot open block after rule on same line"));
                    }
                    self.parse_block(prefix)?;
                    prefix = Prefix::default();
                    emitted = true;
                }
                Some(c) if is_symbol_char(c) => {
                    let word = self.read_word();
                    self.parse_word(&word, &mut prefix, &mut emitted)?;
                }
                Some(_) => return Err(self.error("Unexpected character")),
            }
        }

        if !emitted {
            return Err(self.error("Invalid rule"));
        }
        if self.peek() == Some('\n') {
            self.bump();
        }
        Ok(())
    }

    fn parse_word(&mut self, word: &str, prefix: &mut Prefix, emitted: &mut bool) -> Result<()> {
        match Keyword::lookup(word) {
            Some(
                keyword @ (Keyword::Or | Keyword::Optionally | Keyword::After | Keyword::Not),
            ) => {
                if *emitted {
                    return Err(self.error("Modifiers must come before the rule they apply to"));
                }
                match keyword {
                    Keyword::Or => prefix.forks = true,
                    Keyword::Optionally => prefix.optional = true,
                    Keyword::After => prefix.after = true,
                    _ => prefix.negated = true,
                }
                self.verify_prefix(*prefix)?;
            }
            Some(keyword @ (Keyword::Any | Keyword::None)) => {
                self.check_single_construct(*emitted)?;
                self.builder.add_rule(*prefix, keyword == Keyword::Any)?;
                *prefix = Prefix::default();
                self.parse_charset_body()?;
                *emitted = true;
            }
            Some(keyword @ (Keyword::Start | Keyword::End)) => {
                self.check_single_construct(*emitted)?;
                self.builder.add_rule(*prefix, true)?;
                let endpoint = if keyword == Keyword::Start {
                    Endpoint::Start
                } else {
                    Endpoint::End
                };
                self.builder.add_criterion(Criterion::Endpoint(endpoint))?;
                *prefix = Prefix::default();
                *emitted = true;
            }
            Some(Keyword::Times) => {
                if !prefix.is_empty() {
                    return Err(self.error("Cannot apply prefix to repeat rule"));
                }
                let (min, max) = self.parse_repeat_range()?;
                self.builder.add_repeat(min, max)?;
                *emitted = true;
            }
            Some(Keyword::As) => {
                if !*emitted {
                    return Err(self.error("Collection must come after a rule"));
                }
                let ident = self.parse_collection_ident()?;
                self.builder.collect_as(ident)?;
            }
            Some(_) => {
                return Err(self.error(format!(
                    "Reserved word '{word}' cannot be used as a rule"
                )));
            }
            None => {
                self.check_single_construct(*emitted)?;
                self.builder.add_reference(word.to_owned(), *prefix)?;
                *prefix = Prefix::default();
                *emitted = true;
            }
        }
        Ok(())
    }

    fn check_single_construct(&self, emitted: bool) -> Result<()> {
        if emitted {
            Err(self.error("Invalid rule (too many symbols)"))
        } else {
            Ok(())
        }
    }

    fn verify_prefix(&self, prefix: Prefix) -> Result<()> {
        if prefix.after && prefix.forks {
            return Err(self.error("Cannot use after and or in conjunction"));
        }
        if prefix.negated && prefix.optional {
            return Err(self.error("Cannot use not and optionally in conjunction"));
        }
        Ok(())
    }

    /// `N`, `N to M`, `N to forever` or `forever` (after `times`).
    fn parse_repeat_range(&mut self) -> Result<(u32, Option<u32>)> {
        self.skip_inline_space();
        if self.at_word("forever") {
            self.read_word();
            return Ok((1, None));
        }
        let min = self.parse_count()?;
        if min < 1 {
            return Err(self.error("Start must be greater than 0"));
        }

        self.skip_inline_space();
        if !self.at_word("to") {
            return Ok((min, Some(min)));
        }
        self.read_word();
        self.skip_inline_space();
        if self.at_word("forever") {
            self.read_word();
            return Ok((min, None));
        }
        let max = self.parse_count()?;
        if max < min {
            return Err(self.error("Start of range cannot be greater than end"));
        }
        Ok((min, Some(max)))
    }

    fn parse_count(&mut self) -> Result<u32> {
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.bump();
        }
        if digits.is_empty() {
            return Err(self.error("Invalid range"));
        }
        digits
            .parse()
            .map_err(|_| self.error("Repeat count is too large"))
    }

    fn parse_collection_ident(&mut self) -> Result<String> {
        self.skip_inline_space();
        let ident = self.read_word();
        if ident.is_empty() {
            return Err(self.error("Expected an identifier after as"));
        }
        Ok(ident)
    }

    /// `{`, rules, `}`. Anything after the brace is left to the caller.
    fn parse_block(&mut self, prefix: Prefix) -> Result<()> {
        self.builder.open_block(prefix)?;
        self.expect('{')?;
        loop {
            self.skip_all_space();
            match self.peek() {
                None | Some('|') => return Err(self.error("Unclosed block, expected }")),
                Some('}') => break,
                Some('#') => self.skip_comment(),
                Some(_) => self.parse_rule_line()?,
            }
        }
        self.expect('}')?;
        self.builder.close_block()
    }

    /// `(text)` or `($variable)`.
    fn parse_literal(&mut self) -> Result<()> {
        self.expect('(')?;
        let mut text = String::new();
        let mut variable = None;

        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("Unterminated literal, expected )")),
                Some(')') => {
                    self.bump();
                    break;
                }
                Some('$') => {
                    if !text.is_empty() {
                        return Err(self.error("A variable must be alone inside literal brackets"));
                    }
                    self.bump();
                    let name = self.read_word();
                    if name.is_empty() {
                        return Err(self.error("Expected a variable name after $"));
                    }
                    self.expect(')')?;
                    variable = Some(name);
                    break;
                }
                Some('\\') => text.push(self.parse_escape()?),
                Some(c) if is_literal_char(c) => {
                    text.push(c);
                    self.bump();
                }
                Some(_) => return Err(self.error("Character must be escaped in literal")),
            }
        }

        let criterion = match variable {
            Some(name) => Criterion::Variable(name),
            None if text.is_empty() => {
                return Err(self.error("Must be at least one character inside literal brackets"));
            }
            None => Criterion::Literal(text),
        };
        self.builder.add_criterion(criterion)
    }

    /// Comma-separated charset elements, all on one line.
    fn parse_charset_body(&mut self) -> Result<()> {
        loop {
            self.skip_inline_space();
            self.parse_charset_element()?;
            self.skip_inline_space();
            if self.peek() != Some(',') {
                return Ok(());
            }
            self.bump();
        }
    }

    fn parse_charset_element(&mut self) -> Result<()> {
        match self.peek() {
            None | Some('\n') | Some('#') => Err(self.error("Expected a charset element")),
            Some(',') => Err(self.error("Expected a charset element between commas")),
            Some('(') => self.parse_literal(),
            Some(c) if is_symbol_char(c) && self.peek_at(1).is_some_and(is_symbol_char) => {
                let name = self.read_word();
                self.builder.add_criterion(Criterion::Symbol(name))
            }
            Some(c) if is_charset_char(c) => {
                let first = self.parse_charset_char()?;
                self.skip_inline_space();
                if !self.at_word("to") {
                    return self
                        .builder
                        .add_criterion(Criterion::Literal(first.to_string()));
                }
                self.read_word();
                self.skip_inline_space();
                match self.peek() {
                    Some(c) if c != ',' && is_charset_char(c) => {
                        let last = self.parse_charset_char()?;
                        self.builder.add_criterion(Criterion::range(first, last))
                    }
                    _ => Err(self.error("Expected a character to end the range")),
                }
            }
            Some(_) => Err(self.error("Character must be escaped")),
        }
    }

    fn parse_charset_char(&mut self) -> Result<char> {
        match self.peek() {
            Some('\\') => self.parse_escape(),
            Some(c) => {
                self.bump();
                Ok(c)
            }
            None => Err(self.error("Expected a character")),
        }
    }

    fn parse_escape(&mut self) -> Result<char> {
        self.expect('\\')?;
        let escaped = match self.peek() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('u') => {
                self.bump();
                return self.parse_unicode_escape();
            }
            Some(c) if "[]{}()#\\@$".contains(c) => c,
            _ => return Err(self.error("Tried to escape inescapable character")),
        };
        self.bump();
        Ok(escaped)
    }

    /// Four hex digits after `\u`.
    fn parse_unicode_escape(&mut self) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..4 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(digit) => code = code * 16 + digit,
                None => return Err(self.error("Invalid unicode hex")),
            }
            self.bump();
        }
        char::from_u32(code).ok_or_else(|| self.error("Invalid unicode code point"))
    }

    // ─── Scanner primitives ─────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.source.get(self.at).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.source.get(self.at + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.at += 1;
        }
        ch
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("Expected {expected:?}, found instead {c:?}"))),
            None => Err(self.error(format!("Expected {expected:?}, found end of schema"))),
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|&c| is_symbol_char(c)) {
            word.push(c);
            self.bump();
        }
        word
    }

    /// True if `word` (any case) starts here and is not part of a longer word.
    fn at_word(&self, word: &str) -> bool {
        let len = word.chars().count();
        word.chars()
            .enumerate()
            .all(|(i, w)| self.peek_at(i).is_some_and(|c| c.eq_ignore_ascii_case(&w)))
            && !self.peek_at(len).is_some_and(is_symbol_char)
    }

    /// Skip whitespace, but not newlines.
    fn skip_inline_space(&mut self) {
        while self.peek().is_some_and(|c| c <= ' ' && c != '\n') {
            self.bump();
        }
    }

    /// Skip whitespace including newlines.
    fn skip_all_space(&mut self) {
        while self.peek().is_some_and(|c| c <= ' ') {
            self.bump();
        }
    }

    /// Skip a `#` comment, stopping before the newline.
    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    /// Only blanks and a comment may remain on this line. Consumes the newline.
    fn finish_line(&mut self) -> Result<()> {
        self.skip_inline_space();
        if self.peek() == Some('#') {
            self.skip_comment();
        }
        match self.peek() {
            None => Ok(()),
            Some('\n') => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.error("Unexpected character")),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let at = self.at.min(self.source.len());
        let start = self.source[..at]
            .iter()
            .rposition(|&c| c == '\n')
            .map_or(0, |i| i + 1);
        let end = self.source[at..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.source.len(), |i| at + i);
        let line_number = self.source[..start].iter().filter(|&&c| c == '\n').count() + 1;
        SyntaxError {
            message: message.into(),
            line: self.source[start..end].iter().collect(),
            line_number,
            column: at - start,
            offset: at,
        }
        .into()
    }
}

/// Characters that may appear unescaped inside `( )`.
fn is_literal_char(c: char) -> bool {
    !"[]{}()#\\@$".contains(c)
}

/// Characters that may appear unescaped as a charset element.
fn is_charset_char(c: char) -> bool {
    c > ' ' && !"[]{}()#@$".contains(c)
}
