//! The driver boundary.
//!
//! SQLite resolves named placeholders itself, but SQLx only binds
//! positionally, so the final statement handed to the driver has every
//! placeholder occurrence rewritten to `?` with its value bound in source
//! order. Named occurrences pull from the assembled named-argument list
//! (repeated names bind once per occurrence); bare `?` occurrences consume
//! the caller's verbatim positional arguments in order.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo};

use crate::error::{Error, Result};
use crate::names::{scan_placeholders, NamedValue};
use crate::value::{scan_kind, Value, ValueKind};

/// Type alias for an SQLx query with SQLite arguments.
pub type Q<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Rewrite `stmt` to positional placeholders and produce the bind list in
/// occurrence order.
pub(crate) fn build_query(
    stmt: &str,
    named: &[NamedValue],
    positional: &[Value],
) -> Result<(String, Vec<Value>)> {
    let placeholders = scan_placeholders(stmt)?;

    let mut sql = String::with_capacity(stmt.len());
    let mut binds = Vec::with_capacity(placeholders.len());
    let mut verbatim = positional.iter();
    let mut last = 0;

    for placeholder in &placeholders {
        sql.push_str(&stmt[last..placeholder.start]);
        sql.push('?');
        last = placeholder.end;

        if placeholder.name.is_empty() {
            // An unmatched bare `?` stays unbound; the driver reports the
            // arity mismatch.
            if let Some(value) = verbatim.next() {
                binds.push(value.clone());
            }
        } else {
            match named.iter().find(|nv| nv.name == placeholder.name) {
                Some(named_value) => binds.push(named_value.value.clone()),
                None => return Err(Error::MissingKey(placeholder.name.clone())),
            }
        }
    }
    sql.push_str(&stmt[last..]);

    // Surplus positionals pass through for the driver to judge.
    binds.extend(verbatim.cloned());

    Ok((sql, binds))
}

/// Bind one dynamic value onto an SQLx query.
pub(crate) fn bind_value(query: Q<'_>, value: Value) -> Q<'_> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(v) => query.bind(v),
        Value::Real(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Bool(v) => query.bind(v),
        Value::Blob(v) => query.bind(v),
    }
}

/// Column metadata as reported by the driver for one result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnInfo {
    pub name: String,
    pub declared: String,
}

pub(crate) fn column_info(row: &SqliteRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|column| ColumnInfo {
            name: column.name().to_string(),
            declared: column.type_info().name().to_string(),
        })
        .collect()
}

/// Decode one column of a row into a [`Value`], shaped by the column's
/// declared type.
pub(crate) fn decode_column(row: &SqliteRow, index: usize, declared: &str) -> Result<Value> {
    let kind = scan_kind(declared)
        .ok_or_else(|| Error::UnsupportedColumnType(declared.to_string()))?;

    let value = match kind {
        ValueKind::Text => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
        ValueKind::Integer => row.try_get::<Option<i64>, _>(index)?.map(Value::Integer),
        ValueKind::Bool => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        ValueKind::Real => row.try_get::<Option<f64>, _>(index)?.map(Value::Real),
        ValueKind::Blob => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Blob),
        ValueKind::Null => None,
    };
    Ok(value.unwrap_or(Value::Null))
}
