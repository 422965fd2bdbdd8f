//! Record-expression scanning.
//!
//! A record expression is a `{ ... }` span inside a statement, with one of
//! the forms
//!
//! ```text
//! { Person }
//! { name, age INTO Person }
//! { people.* INTO Person }
//! { "people.*" INTO Person }
//! ```
//!
//! Each expression is parsed into a [`RecordBinding`] carrying the target
//! type name, the optional table prefix, the explicit projection fields and
//! the byte span of the whole `{ ... }` so the statement compiler can splice
//! in the expanded column list.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{Error, Result};
use crate::path::{self, PathSegment};

const RECORD_EXPRESSION: &str = r"\{([^{}]*)\}";

/// A parsed record expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBinding {
    /// The target type name, e.g. `Person`.
    pub name: String,
    /// The table prefix projected columns are qualified with, if any.
    pub prefix: String,
    /// Explicitly listed projection fields, `*` included.
    pub fields: HashSet<String>,
    /// Project every column of the target type.
    pub wildcard: bool,
    /// Byte span of the `{ ... }` in the original statement, braces
    /// included.
    pub start: usize,
    pub end: usize,
}

/// Parse every record expression in `stmt`, in source order.
pub fn parse_records(stmt: &str) -> Result<Vec<RecordBinding>> {
    let pattern = Regex::new(RECORD_EXPRESSION)?;
    let mut records = Vec::new();
    for found in pattern.find_iter(stmt) {
        let body = &stmt[found.start() + 1..found.end() - 1];
        records.push(parse_record_body(body, found.start(), found.end())?);
    }
    Ok(records)
}

fn parse_record_body(body: &str, start: usize, end: usize) -> Result<RecordBinding> {
    let trimmed = body.trim();

    let mut binding = RecordBinding {
        name: String::new(),
        prefix: String::new(),
        fields: HashSet::new(),
        wildcard: false,
        start,
        end,
    };

    // A projection wrapped in quotes: `{'people.*' INTO Person}`.
    if let Some(quote) = trimmed.chars().next().filter(|&c| c == '\'' || c == '"') {
        let inner = &trimmed[1..];
        let close = match inner.find(quote) {
            Some(close) => close,
            None => {
                return Err(Error::UnterminatedQuote {
                    quote: quote.to_string(),
                    expression: inner.to_string(),
                })
            }
        };
        let projection = &inner[..close];
        let rest = inner[close + 1..].trim_start();
        let target = match rest.strip_prefix("INTO") {
            Some(after) if after.starts_with(char::is_whitespace) => after.trim(),
            _ => return Err(Error::RecordExpression(trimmed.to_string())),
        };

        binding.name = parse_target(target, trimmed)?;
        parse_projection(projection, trimmed, &mut binding)?;
        return Ok(binding);
    }

    if let Some(split) = find_into(trimmed) {
        let projection = trimmed[..split].trim_end();
        let target = trimmed[split + "INTO".len()..].trim();

        binding.name = parse_target(target, trimmed)?;
        parse_projection(projection, trimmed, &mut binding)?;
        return Ok(binding);
    }

    // A bare target: `{Person}` projects every column of the type.
    binding.name = parse_target(trimmed, trimmed)?;
    binding.wildcard = true;
    Ok(binding)
}

/// Locates an `INTO` keyword that stands alone between whitespace.
fn find_into(body: &str) -> Option<usize> {
    for (index, _) in body.match_indices("INTO") {
        let before = body[..index].chars().next_back();
        let after = body[index + "INTO".len()..].chars().next();
        if before.is_some_and(char::is_whitespace) && after.is_some_and(char::is_whitespace) {
            return Some(index);
        }
    }
    None
}

/// Parses a target type name; anything but a lone identifier spanning the
/// whole text is an error naming the offending body.
fn parse_target(text: &str, body: &str) -> Result<String> {
    match path::parse_prefix(text) {
        Ok((segments, consumed)) if consumed == text.len() => match segments.as_slice() {
            [PathSegment::Ident(name)] => Ok(name.clone()),
            _ => Err(Error::RecordExpression(body.to_string())),
        },
        _ => Err(Error::RecordExpression(body.to_string())),
    }
}

fn parse_projection(projection: &str, body: &str, binding: &mut RecordBinding) -> Result<()> {
    for item in projection.split(',') {
        let item = strip_quotes(item.trim())?;
        if item.is_empty() {
            return Err(Error::RecordExpression(body.to_string()));
        }

        let segments = match path::parse(item) {
            Ok(segments) => segments,
            Err(_) => return Err(Error::RecordExpression(body.to_string())),
        };

        let field = match segments.as_slice() {
            [PathSegment::Ident(field)] => field,
            [PathSegment::Ident(prefix), PathSegment::Ident(field)] => {
                binding.prefix = prefix.clone();
                field
            }
            _ => return Err(Error::RecordExpression(body.to_string())),
        };

        if field == "*" {
            binding.wildcard = true;
        }
        binding.fields.insert(field.clone());
    }
    Ok(())
}

fn strip_quotes(item: &str) -> Result<&str> {
    let quote = match item.chars().next() {
        Some(c @ ('\'' | '"')) => c,
        _ => return Ok(item),
    };
    let inner = &item[1..];
    match inner.strip_suffix(quote) {
        Some(inner) if !inner.contains(quote) => Ok(inner),
        _ => Err(Error::UnterminatedQuote {
            quote: quote.to_string(),
            expression: inner.to_string(),
        }),
    }
}
