//! Flattening of record-path ASTs into ordered path segments.
//!
//! A parsed path such as `Person[0].name[1].head` reduces to the segment
//! list `Person, 0, name, 1, head`. Nested accessor and index expressions
//! contribute their children in source order; separators and empty groups
//! contribute nothing.

use crate::ast::{Expression, QueryExpression};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::parser::{Mode, Parser};

/// One atom of a flattened record path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Ident(String),
    Int(i64),
    Str(String),
}

/// The result of flattening a parsed query.
///
/// When the input parsed as more than one top-level expression, `segments`
/// holds the first expression and `too_many` is set; strict callers turn
/// that into [`Error::TooManyExpressions`] via [`CompiledPath::single`],
/// permissive callers read `segments` and move on.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPath {
    pub segments: Vec<PathSegment>,
    pub too_many: bool,
}

impl CompiledPath {
    pub fn single(self) -> Result<Vec<PathSegment>> {
        if self.too_many {
            return Err(Error::TooManyExpressions);
        }
        Ok(self.segments)
    }
}

/// Flatten a parsed query into its path segments.
pub fn compile(query: &QueryExpression) -> CompiledPath {
    let mut segments = Vec::new();
    if let Some(first) = query.expressions.first() {
        flatten(first, &mut segments);
    }
    CompiledPath {
        segments,
        too_many: query.expressions.len() > 1,
    }
}

fn flatten(expression: &Expression, out: &mut Vec<PathSegment>) {
    match expression {
        Expression::Statement(inner) => flatten(inner, out),
        Expression::Accessor { left, right } => {
            flatten(left, out);
            flatten(right, out);
        }
        Expression::Index { left, index } => {
            flatten(left, out);
            flatten(index, out);
        }
        Expression::Ident(token) => out.push(PathSegment::Ident(token.literal.clone())),
        Expression::Int { value, .. } => out.push(PathSegment::Int(*value)),
        Expression::Str(token) => out.push(PathSegment::Str(token.literal.clone())),
        Expression::Separator(_) | Expression::Empty(_) => {}
    }
}

/// Parse a complete record path. The whole input must form exactly one
/// expression.
pub fn parse(input: &str) -> Result<Vec<PathSegment>> {
    let (query, _) = Parser::new(Lexer::new(input), Mode::Greedy).run()?;
    compile(&query).single()
}

/// Parse the leading record path of `input`, stopping at the first
/// whitespace separator. Returns the segments together with the number of
/// bytes the path occupied.
pub fn parse_prefix(input: &str) -> Result<(Vec<PathSegment>, usize)> {
    let (query, consumed) = Parser::new(Lexer::new(input), Mode::Terminated).run()?;
    Ok((compile(&query).single()?, consumed))
}
