//! Incremental construction of a [`Schema`] tree.
//!
//! The compiler drives the builder one construct at a time. Every `add_*`
//! call checks its own legality against the current construction context and
//! fails with [`Error::Internal`] instead of producing an illegal tree.
//!
//! Open blocks live on an explicit stack. The most recent child of each open
//! block is kept apart, together with the chain of `after` separators hanging
//! off it, until the next sibling arrives or the block closes. All later
//! modifiers (`times`, `after`, `as`) only ever touch the end of that chain.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use super::ast::*;
use super::keyword::is_reserved;
use crate::error::{Error, Result};

/// Modifiers written before a construct on a rule line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prefix {
    pub forks: bool,
    pub optional: bool,
    pub after: bool,
    pub negated: bool,
}

impl Prefix {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn node(self, kind: NodeKind) -> Node {
        Node {
            forks: self.forks,
            optional: self.optional,
            negated: self.negated,
            ..Node::new(kind)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Root,
    Child,
    After,
}

#[derive(Debug)]
struct OpenBlock {
    prefix: Prefix,
    placement: Placement,
    /// Children before the most recent one.
    children: Vec<Node>,
    /// The most recent child followed by its `after` separators, outermost
    /// first. Each link except the last carries the repeat that owns the next.
    chain: Vec<Node>,
    /// The end of the chain is a matching rule that accepts criteria.
    accepts_criteria: bool,
    /// The end of the chain was just given a repeat, so `after` may follow.
    repeat_open: bool,
}

impl OpenBlock {
    fn new(prefix: Prefix, placement: Placement) -> Self {
        Self {
            prefix,
            placement,
            children: Vec::new(),
            chain: Vec::new(),
            accepts_criteria: false,
            repeat_open: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.chain.is_empty()
    }

    fn check_placement(&self, prefix: Prefix) -> Result<()> {
        if prefix.after {
            if !self.repeat_open {
                return Err(Error::internal("A separator must follow a repeat"));
            }
            if prefix.forks {
                return Err(Error::internal("A separator cannot fork"));
            }
        } else if prefix.forks && self.is_empty() {
            return Err(Error::internal("First rule in block cannot fork"));
        }
        Ok(())
    }

    fn place(&mut self, node: Node, after: bool) -> Result<()> {
        if !after {
            self.fold_chain()?;
        }
        self.chain.push(node);
        self.repeat_open = false;
        Ok(())
    }

    /// Move the most recent child, separators attached, into `children`.
    fn fold_chain(&mut self) -> Result<()> {
        let mut tail: Option<Node> = None;
        while let Some(mut node) = self.chain.pop() {
            if let Some(after) = tail.take() {
                let repeat = node
                    .repeat
                    .as_mut()
                    .ok_or_else(|| Error::internal("A separator must follow a repeat"))?;
                repeat.after = Some(after);
            }
            tail = Some(node);
        }
        self.children.extend(tail);
        Ok(())
    }

    fn into_block(mut self) -> Result<Block> {
        self.fold_chain()?;
        Ok(Block {
            children: self.children,
        })
    }
}

#[derive(Debug)]
enum Construction {
    Pattern { name: String, open: Vec<OpenBlock> },
    Charset(Charset),
}

/// Builds a [`Schema`] while the compiler scans the source.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    symbols: BTreeMap<String, Symbol>,
    next_anonymous: usize,
    current: Option<Construction>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A name may be defined if it is not reserved and not yet taken.
    pub fn is_valid_symbol_name(&self, name: &str) -> bool {
        let in_progress = match &self.current {
            Some(Construction::Pattern { name: current, .. }) => current == name,
            Some(Construction::Charset(charset)) => charset.name == name,
            None => false,
        };
        !is_reserved(name) && !in_progress && !self.symbols.contains_key(name)
    }

    /// Start a pattern. Unnamed patterns are numbered in source order.
    pub fn begin_pattern(&mut self, name: Option<String>) -> Result<()> {
        self.commit()?;
        let name = match name {
            Some(name) => {
                if !self.is_valid_symbol_name(&name) {
                    return Err(Error::internal(format!(
                        "Symbol '{name}' is reserved or already defined"
                    )));
                }
                name
            }
            None => {
                let name = self.next_anonymous.to_string();
                self.next_anonymous += 1;
                name
            }
        };
        self.current = Some(Construction::Pattern {
            name,
            open: vec![OpenBlock::new(Prefix::default(), Placement::Root)],
        });
        Ok(())
    }

    pub fn end_pattern(&mut self) -> Result<()> {
        match self.current.take() {
            Some(Construction::Pattern { name, mut open }) => {
                let root = match open.pop() {
                    Some(root) if open.is_empty() && root.placement == Placement::Root => root,
                    _ => return Err(Error::internal("Pattern ended inside a block")),
                };
                if root.is_empty() {
                    return Err(Error::internal(
                        "Must be at least one matching rule in pattern",
                    ));
                }
                let root = root.into_block()?;
                self.symbols
                    .insert(name.clone(), Symbol::Pattern(Pattern { name, root }));
                Ok(())
            }
            other => {
                self.current = other;
                Err(Error::internal("No pattern to end"))
            }
        }
    }

    /// Start a charset; criteria added next belong to it.
    pub fn begin_charset(&mut self, name: String) -> Result<()> {
        self.commit()?;
        if !self.is_valid_symbol_name(&name) {
            return Err(Error::internal(format!(
                "Symbol '{name}' is reserved or already defined"
            )));
        }
        self.current = Some(Construction::Charset(Charset {
            name,
            criteria: Vec::new(),
        }));
        Ok(())
    }

    pub fn open_block(&mut self, prefix: Prefix) -> Result<()> {
        let open = self.open_blocks()?;
        let parent = innermost(open)?;
        parent.check_placement(prefix)?;
        parent.accepts_criteria = false;
        let placement = if prefix.after {
            Placement::After
        } else {
            Placement::Child
        };
        open.push(OpenBlock::new(prefix, placement));
        Ok(())
    }

    pub fn close_block(&mut self) -> Result<()> {
        let open = self.open_blocks()?;
        if open.len() < 2 {
            return Err(Error::internal("No block to close"));
        }
        let Some(block) = open.pop() else {
            return Err(Error::internal("No block to close"));
        };
        if block.is_empty() {
            return Err(Error::internal("Must be at least one matching rule in block"));
        }
        let prefix = block.prefix;
        let after = block.placement == Placement::After;
        let node = prefix.node(NodeKind::Block(block.into_block()?));

        let parent = innermost(open)?;
        parent.place(node, after)?;
        parent.accepts_criteria = false;
        Ok(())
    }

    /// Add an `any`/`none` rule (literals and endpoints are inclusive rules).
    pub fn add_rule(&mut self, prefix: Prefix, inclusive: bool) -> Result<()> {
        let block = innermost(self.open_blocks()?)?;
        block.check_placement(prefix)?;
        let rule = MatchingRule {
            inclusive,
            criteria: Vec::new(),
        };
        block.place(prefix.node(NodeKind::Rule(rule)), prefix.after)?;
        block.accepts_criteria = true;
        Ok(())
    }

    pub fn add_reference(&mut self, name: String, prefix: Prefix) -> Result<()> {
        let block = innermost(self.open_blocks()?)?;
        block.check_placement(prefix)?;
        block.place(prefix.node(NodeKind::Reference(name)), prefix.after)?;
        block.accepts_criteria = false;
        Ok(())
    }

    /// Add a criterion to the rule just added, or to the charset being built.
    pub fn add_criterion(&mut self, criterion: Criterion) -> Result<()> {
        match &mut self.current {
            Some(Construction::Charset(charset)) => {
                if matches!(&criterion, Criterion::Symbol(name) if *name == charset.name) {
                    return Err(Error::internal("Cannot include charset in itself"));
                }
                charset.criteria.push(criterion);
                Ok(())
            }
            Some(Construction::Pattern { open, .. }) => {
                let block = innermost(open)?;
                if !block.accepts_criteria {
                    return Err(Error::internal("No matching rule to add a criterion to"));
                }
                match block.chain.last_mut().map(|node| &mut node.kind) {
                    Some(NodeKind::Rule(rule)) => {
                        rule.criteria.push(criterion);
                        Ok(())
                    }
                    _ => Err(Error::internal("No matching rule to add a criterion to")),
                }
            }
            None => Err(Error::internal("No rule or charset to add a criterion to")),
        }
    }

    /// Attach `times min to max` to the most recent rule, block or separator.
    pub fn add_repeat(&mut self, min: u32, max: Option<u32>) -> Result<()> {
        if min == 0 || max.is_some_and(|max| max < min) {
            return Err(Error::internal("Invalid repeat range"));
        }
        let block = innermost(self.open_blocks()?)?;
        let Some(target) = block.chain.last_mut() else {
            return Err(Error::internal("Repeat invalid in this position"));
        };
        if target.repeat.is_some() {
            return Err(Error::internal("Cannot repeat a repeat"));
        }
        if target.negated {
            return Err(Error::internal("Cannot repeat a negative match"));
        }
        target.repeat = Some(Box::new(Repeat::new(min, max)));
        block.repeat_open = true;
        Ok(())
    }

    /// Collect whatever the most recent rule or block consumes under `ident`.
    pub fn collect_as(&mut self, ident: String) -> Result<()> {
        let block = innermost(self.open_blocks()?)?;
        match block.chain.last_mut() {
            Some(target) => {
                target.collect_as = Some(ident);
                Ok(())
            }
            None => Err(Error::internal("Collection must come after a rule")),
        }
    }

    /// Seal the tree. Fails if a pattern is still open or charsets form a cycle.
    pub fn finish(mut self) -> Result<Schema> {
        if matches!(self.current, Some(Construction::Pattern { .. })) {
            return Err(Error::internal("Pattern was never closed"));
        }
        self.commit()?;
        check_charset_cycles(&self.symbols)?;
        Ok(Schema {
            symbols: self.symbols,
        })
    }

    /// Store a finished charset. Patterns are stored by `end_pattern`.
    fn commit(&mut self) -> Result<()> {
        match self.current.take() {
            None => Ok(()),
            Some(Construction::Charset(charset)) => {
                if charset.criteria.is_empty() {
                    return Err(Error::internal("Charset must contain at least one element"));
                }
                self.symbols
                    .insert(charset.name.clone(), Symbol::Charset(charset));
                Ok(())
            }
            Some(pattern @ Construction::Pattern { .. }) => {
                self.current = Some(pattern);
                Err(Error::internal("Pattern was never closed"))
            }
        }
    }

    fn open_blocks(&mut self) -> Result<&mut Vec<OpenBlock>> {
        match &mut self.current {
            Some(Construction::Pattern { open, .. }) => Ok(open),
            _ => Err(Error::internal("Rules can only appear inside a pattern")),
        }
    }
}

fn innermost(open: &mut [OpenBlock]) -> Result<&mut OpenBlock> {
    open.last_mut()
        .ok_or_else(|| Error::internal("No open block"))
}

/// Reject charsets that reach themselves through other charsets.
fn check_charset_cycles(symbols: &BTreeMap<String, Symbol>) -> Result<()> {
    let mut done = HashSet::new();
    for name in symbols.keys() {
        let mut path = Vec::new();
        visit_charset(symbols, name, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit_charset<'a>(
    symbols: &'a BTreeMap<String, Symbol>,
    name: &'a str,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<()> {
    let Some(Symbol::Charset(charset)) = symbols.get(name) else {
        return Ok(());
    };
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|seen| *seen == name) {
        let cycle = path[start..].iter().chain([&name]).join(" -> ");
        return Err(Error::internal(format!("Charset cycle: {cycle}")));
    }
    path.push(name);
    for criterion in &charset.criteria {
        if let Criterion::Symbol(next) = criterion {
            visit_charset(symbols, next, path, done)?;
        }
    }
    path.pop();
    done.insert(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Prefix {
        Prefix::default()
    }

    fn forks() -> Prefix {
        Prefix {
            forks: true,
            ..Prefix::default()
        }
    }

    fn after() -> Prefix {
        Prefix {
            after: true,
            ..Prefix::default()
        }
    }

    fn negated() -> Prefix {
        Prefix {
            negated: true,
            ..Prefix::default()
        }
    }

    fn literal(builder: &mut TreeBuilder, prefix: Prefix, text: &str) -> Result<()> {
        builder.add_rule(prefix, true)?;
        builder.add_criterion(Criterion::Literal(text.into()))
    }

    fn root(schema: &Schema, name: &str) -> Block {
        schema.pattern(name).unwrap().root.clone()
    }

    // --- Patterns ---

    #[test]
    fn anonymous_patterns_are_numbered() {
        let mut b = TreeBuilder::new();
        for _ in 0..3 {
            b.begin_pattern(None).unwrap();
            literal(&mut b, plain(), "a").unwrap();
            b.end_pattern().unwrap();
        }
        let schema = b.finish().unwrap();
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["0", "1", "2"]);
    }

    #[test]
    fn empty_pattern_rejected() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("empty".into())).unwrap();
        assert!(matches!(b.end_pattern(), Err(Error::Internal(_))));
    }

    #[test]
    fn unclosed_pattern_rejected() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        assert!(b.finish().is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("word".into())).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.end_pattern().unwrap();
        assert!(!b.is_valid_symbol_name("word"));
        assert!(b.begin_charset("word".into()).is_err());
    }

    #[test]
    fn reserved_name_rejected() {
        let b = TreeBuilder::new();
        assert!(!b.is_valid_symbol_name("digit"));
        assert!(!b.is_valid_symbol_name("Not"));
        assert!(b.is_valid_symbol_name("digits"));
    }

    // --- Blocks ---

    #[test]
    fn first_child_cannot_fork() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        assert!(literal(&mut b, forks(), "a").is_err());
        b.open_block(plain()).unwrap();
        assert!(b.open_block(forks()).is_err());
    }

    #[test]
    fn empty_block_rejected() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        b.open_block(plain()).unwrap();
        assert!(matches!(b.close_block(), Err(Error::Internal(_))));
    }

    #[test]
    fn root_cannot_be_closed() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        assert!(b.close_block().is_err());
    }

    #[test]
    fn nested_blocks_keep_order() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("nested".into())).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.open_block(plain()).unwrap();
        literal(&mut b, plain(), "b").unwrap();
        literal(&mut b, forks(), "c").unwrap();
        b.close_block().unwrap();
        b.collect_as("inner".into()).unwrap();
        literal(&mut b, plain(), "d").unwrap();
        b.end_pattern().unwrap();

        let root = root(&b.finish().unwrap(), "nested");
        assert_eq!(root.children.len(), 3);
        let inner = &root.children[1];
        assert_eq!(inner.collect_as.as_deref(), Some("inner"));
        match &inner.kind {
            NodeKind::Block(block) => {
                assert_eq!(block.children.len(), 2);
                assert!(block.children[1].forks);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    // --- Criteria ---

    #[test]
    fn charset_cannot_contain_itself() {
        let mut b = TreeBuilder::new();
        b.begin_charset("letters".into()).unwrap();
        b.add_criterion(Criterion::Range('a', 'z')).unwrap();
        assert!(b.add_criterion(Criterion::Symbol("letters".into())).is_err());
    }

    #[test]
    fn charset_cycle_rejected_on_finish() {
        let mut b = TreeBuilder::new();
        b.begin_charset("first".into()).unwrap();
        b.add_criterion(Criterion::Symbol("second".into())).unwrap();
        b.begin_charset("second".into()).unwrap();
        b.add_criterion(Criterion::Symbol("first".into())).unwrap();
        let err = b.finish().unwrap_err();
        assert_eq!(
            err,
            Error::Internal("Charset cycle: first -> second -> first".into())
        );
    }

    #[test]
    fn shared_charset_is_not_a_cycle() {
        let mut b = TreeBuilder::new();
        b.begin_charset("base".into()).unwrap();
        b.add_criterion(Criterion::Range('a', 'z')).unwrap();
        b.begin_charset("left".into()).unwrap();
        b.add_criterion(Criterion::Symbol("base".into())).unwrap();
        b.begin_charset("right".into()).unwrap();
        b.add_criterion(Criterion::Symbol("base".into())).unwrap();
        b.add_criterion(Criterion::Symbol("left".into())).unwrap();
        assert!(b.finish().is_ok());
    }

    #[test]
    fn criterion_needs_a_rule() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        assert!(b.add_criterion(Criterion::Literal("a".into())).is_err());
        b.add_reference("other".into(), plain()).unwrap();
        assert!(b.add_criterion(Criterion::Literal("a".into())).is_err());
    }

    // --- Repeats ---

    #[test]
    fn repeat_needs_a_target() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        assert!(b.add_repeat(3, Some(3)).is_err());
    }

    #[test]
    fn cannot_repeat_a_repeat() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.add_repeat(1, None).unwrap();
        assert_eq!(
            b.add_repeat(2, Some(2)),
            Err(Error::Internal("Cannot repeat a repeat".into()))
        );
    }

    #[test]
    fn cannot_repeat_a_negative_match() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        literal(&mut b, negated(), "a").unwrap();
        assert_eq!(
            b.add_repeat(1, None),
            Err(Error::Internal("Cannot repeat a negative match".into()))
        );
    }

    #[test]
    fn separator_needs_a_repeat() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        assert!(literal(&mut b, after(), ",").is_err());
        literal(&mut b, plain(), "a").unwrap();
        assert!(literal(&mut b, after(), ",").is_err());
    }

    #[test]
    fn separator_cannot_fork() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(None).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.add_repeat(1, None).unwrap();
        let both = Prefix {
            forks: true,
            after: true,
            ..Prefix::default()
        };
        assert!(literal(&mut b, both, ",").is_err());
    }

    #[test]
    fn separator_attaches_to_repeat() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("list".into())).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.add_repeat(1, None).unwrap();
        literal(&mut b, after(), ",").unwrap();
        b.end_pattern().unwrap();

        let root = root(&b.finish().unwrap(), "list");
        assert_eq!(root.children.len(), 1);
        let repeat = root.children[0].repeat.as_ref().unwrap();
        let sep = repeat.after.as_ref().unwrap();
        assert!(matches!(&sep.kind, NodeKind::Rule(rule)
            if rule.criteria == vec![Criterion::Literal(",".into())]));
    }

    #[test]
    fn repeat_walks_to_end_of_separator_chain() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("chain".into())).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.add_repeat(1, None).unwrap();
        literal(
            &mut b,
            Prefix {
                after: true,
                optional: true,
                ..Prefix::default()
            },
            " ",
        )
        .unwrap();
        b.add_repeat(1, Some(3)).unwrap();
        b.collect_as("gap".into()).unwrap();
        b.end_pattern().unwrap();

        let root = root(&b.finish().unwrap(), "chain");
        let outer = root.children[0].repeat.as_ref().unwrap();
        assert_eq!(outer.max, None);
        let sep = outer.after.as_ref().unwrap();
        assert!(sep.optional);
        assert_eq!(sep.collect_as.as_deref(), Some("gap"));
        assert_eq!(sep.repeat.as_ref().unwrap().max, Some(3));
    }

    #[test]
    fn separator_block_attaches_on_close() {
        let mut b = TreeBuilder::new();
        b.begin_pattern(Some("spaced".into())).unwrap();
        literal(&mut b, plain(), "a").unwrap();
        b.add_repeat(1, None).unwrap();
        b.open_block(after()).unwrap();
        literal(&mut b, plain(), ",").unwrap();
        literal(&mut b, plain(), " ").unwrap();
        b.close_block().unwrap();
        b.collect_as("sep".into()).unwrap();
        literal(&mut b, plain(), ".").unwrap();
        b.end_pattern().unwrap();

        let root = root(&b.finish().unwrap(), "spaced");
        assert_eq!(root.children.len(), 2);
        let sep = root.children[0]
            .repeat
            .as_ref()
            .and_then(|r| r.after.as_ref())
            .unwrap();
        assert_eq!(sep.collect_as.as_deref(), Some("sep"));
        assert!(matches!(&sep.kind, NodeKind::Block(block) if block.children.len() == 2));
    }
}
