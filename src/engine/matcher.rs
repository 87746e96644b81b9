//! Backtracking evaluation of patterns, blocks and rules.
//!
//! Every function returns whether its node matched. On success the cursor
//! is left after the consumed text; on failure everything the node consumed
//! has been rolled back. All positions are character indices.

use crate::error::Result;
use crate::schema::{Block, Criterion, Endpoint, MatchingRule, Node, NodeKind, Pattern, Repeat};

use super::context::MatchCtx;
use super::criterion::criterion;

// ─── Patterns and blocks ────────────────────────────────────────────────────

pub fn pattern<'a>(pattern: &'a Pattern, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    block(&pattern.root, ctx)
}

/// Children match in order. `or` children are alternatives to the previous
/// sibling and are skipped once it has matched. Any gap that no alternative
/// fills fails the whole block.
fn block<'a>(block: &'a Block, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    let entry = ctx.checkpoint();
    let mut status = true;

    for child in &block.children {
        if !status && !child.forks {
            ctx.restore(&entry);
            return Ok(false);
        }
        if status && child.forks {
            continue;
        }
        status = node(child, ctx)? || child.optional;
    }

    if !status {
        ctx.restore(&entry);
    }
    Ok(status)
}

// ─── Nodes ──────────────────────────────────────────────────────────────────

/// Evaluate a node with its `not` and `times` modifiers.
fn node<'a>(node: &'a Node, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    if node.negated {
        let checkpoint = ctx.checkpoint();
        let matched = node_repeated(node, ctx)?;
        ctx.restore(&checkpoint);
        return Ok(!matched);
    }
    node_repeated(node, ctx)
}

fn node_repeated<'a>(node: &'a Node, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    match &node.repeat {
        Some(repeat) => self::repeat(node, repeat, ctx),
        None => node_once(node, ctx),
    }
}

/// One evaluation of the node itself, collecting under its capture name.
fn node_once<'a>(node: &'a Node, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    let capturing = match &node.collect_as {
        Some(name) => ctx.begin_capture(name),
        None => false,
    };

    let matched = match &node.kind {
        NodeKind::Block(inner) => block(inner, ctx),
        NodeKind::Rule(rule) => matching_rule(rule, ctx),
        NodeKind::Reference(name) => {
            let schema = ctx.schema;
            schema
                .pattern(name)
                .and_then(|referenced| pattern(referenced, ctx))
        }
    };

    if capturing {
        ctx.end_capture();
    }
    matched
}

/// Match `node` between `repeat.min` and `repeat.max` times, trying the
/// separator between repetitions.
///
/// The separator is evaluated outside the node's own capture. Falling short
/// of `repeat.min` rolls back every repetition.
fn repeat<'a>(node: &'a Node, repeat: &'a Repeat, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    let entry = ctx.checkpoint();
    let mut count = 0u32;
    let mut before_separator = None;

    loop {
        let cycle_start = ctx.pos;
        if !node_once(node, ctx)? {
            if let Some(checkpoint) = &before_separator {
                ctx.restore(checkpoint);
            }
            break;
        }

        count += 1;
        if repeat.max == Some(count) {
            return Ok(true);
        }

        if let Some(separator) = &repeat.after {
            let checkpoint = ctx.checkpoint();
            let separated = self::node(separator, ctx)?;
            if !separated {
                ctx.restore(&checkpoint);
            }
            before_separator = Some(checkpoint);
            if !separated && !separator.optional {
                break;
            }
        }

        // Nothing consumed this cycle, so every further cycle is identical.
        if ctx.pos == cycle_start {
            count = count.max(repeat.min);
            break;
        }
    }

    if !repeat.satisfied_by(count) {
        ctx.restore(&entry);
        return Ok(false);
    }
    Ok(true)
}

// ─── Matching rules ─────────────────────────────────────────────────────────

fn matching_rule<'a>(rule: &'a MatchingRule, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    if ctx.at_end() {
        return Ok(matches!(
            rule.criteria.as_slice(),
            [Criterion::Endpoint(Endpoint::End)]
        ));
    }
    if rule.inclusive {
        inclusive(rule, ctx)
    } else {
        exclusive(rule, ctx)
    }
}

/// `any`: the first criterion to match wins.
fn inclusive<'a>(rule: &'a MatchingRule, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    for c in &rule.criteria {
        if criterion(c, ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `none`: fails if any criterion matches, otherwise consumes exactly one
/// character, even when the criteria are longer literals.
fn exclusive<'a>(rule: &'a MatchingRule, ctx: &mut MatchCtx<'a>) -> Result<bool> {
    let checkpoint = ctx.checkpoint();
    for c in &rule.criteria {
        let matched = criterion(c, ctx)?;
        ctx.restore(&checkpoint);
        if matched {
            return Ok(false);
        }
    }
    ctx.advance();
    Ok(true)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
