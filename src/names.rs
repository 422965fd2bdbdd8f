//! Named-parameter scanning and argument assembly.
//!
//! Statements may carry placeholders in the forms `:name`, `@name`,
//! `$name` and `?NNN` (see the SQLite bind documentation,
//! <https://www.sqlite.org/c3ref/bind_blob.html>). The scanner locates every
//! occurrence; bindings are reported sorted by name so the assembled
//! argument list is stable for a given statement.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::record::AnyRecord;
use crate::reflect::Reflector;
use crate::value::Value;

/// A placeholder occurrence, in statement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub prefix: char,
    /// Empty for a bare positional `?`.
    pub name: String,
    /// Byte span of the placeholder, prefix included.
    pub start: usize,
    pub end: usize,
}

/// A named binding extracted from a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameBinding {
    pub prefix: char,
    pub name: String,
}

/// A driver-level named argument.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

/// One positional argument to a query.
///
/// The first argument of a statement with name bindings must be the binding
/// source: either a map keyed by binding name or a record whose columns
/// cover the binding names. Any further arguments are plain values passed
/// through to the driver's bare `?` placeholders in order.
pub enum QueryArg<'a> {
    Map(&'a HashMap<String, Value>),
    Record(&'a dyn AnyRecord),
    Value(Value),
}

impl<'a> QueryArg<'a> {
    pub fn map(map: &'a HashMap<String, Value>) -> Self {
        QueryArg::Map(map)
    }

    pub fn record(record: &'a dyn AnyRecord) -> Self {
        QueryArg::Record(record)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        QueryArg::Value(value.into())
    }
}

fn alphanumeric(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn numeric(c: char) -> bool {
    c.is_numeric()
}

fn prefix_predicate(prefix: char) -> Option<fn(char) -> bool> {
    match prefix {
        ':' | '@' | '$' => Some(alphanumeric),
        '?' => Some(numeric),
        _ => None,
    }
}

fn is_name_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | '=' | ')')
}

/// Locate every placeholder occurrence in `stmt`, bare positional `?`s
/// included. A name that runs into a character outside its predicate and
/// outside the terminator set is an error carrying the whole statement.
pub(crate) fn scan_placeholders(stmt: &str) -> Result<Vec<Placeholder>> {
    let chars: Vec<(usize, char)> = stmt.char_indices().collect();
    let mut out = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let (start, prefix) = chars[i];
        let predicate = match prefix_predicate(prefix) {
            Some(predicate) => predicate,
            None => {
                i += 1;
                continue;
            }
        };

        // A prefix followed immediately by a terminator binds nothing; a
        // bare `?` is still a positional placeholder.
        let next = chars.get(i + 1).map(|&(_, c)| c);
        if next.map_or(true, is_name_terminator) {
            if prefix == '?' {
                out.push(Placeholder {
                    prefix,
                    name: String::new(),
                    start,
                    end: start + prefix.len_utf8(),
                });
            }
            i += 1;
            continue;
        }

        let mut name = String::new();
        let mut end = stmt.len();
        i += 1;
        while i < chars.len() {
            let (offset, c) = chars[i];
            if predicate(c) {
                name.push(c);
                i += 1;
                continue;
            }
            if is_name_terminator(c) {
                end = offset;
                break;
            }
            return Err(Error::NamedArgument(stmt.to_string()));
        }

        out.push(Placeholder {
            prefix,
            name,
            start,
            end,
        });

        // Jump ahead to the next candidate prefix so prefix-like characters
        // inside identifiers are not misread.
        while i < chars.len() && prefix_predicate(chars[i].1).is_none() {
            i += 1;
        }
    }

    Ok(out)
}

/// Extract the name bindings of `stmt`, sorted lexicographically by name.
/// Bare positional placeholders are suppressed.
pub fn parse_names(stmt: &str) -> Result<Vec<NameBinding>> {
    let mut names: Vec<NameBinding> = scan_placeholders(stmt)?
        .into_iter()
        .filter(|placeholder| !placeholder.name.is_empty())
        .map(|placeholder| NameBinding {
            prefix: placeholder.prefix,
            name: placeholder.name,
        })
        .collect();
    names.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(names)
}

/// Build the driver named-argument list from the first positional argument
/// and pass the remaining arguments through verbatim.
pub(crate) fn construct_named_args(
    args: &[QueryArg<'_>],
    names: &[NameBinding],
    reflector: &Reflector,
) -> Result<(Vec<NamedValue>, Vec<Value>)> {
    if names.is_empty() {
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(verbatim(arg)?);
        }
        return Ok((Vec::new(), positional));
    }

    let (first, rest) = match args.split_first() {
        Some(split) => split,
        None => return Err(Error::MissingArguments),
    };

    let named = match first {
        QueryArg::Map(map) => names
            .iter()
            .map(|binding| {
                map.get(&binding.name)
                    .cloned()
                    .map(|value| NamedValue {
                        name: binding.name.clone(),
                        value,
                    })
                    .ok_or_else(|| Error::MissingKey(binding.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?,

        QueryArg::Record(record) => {
            let schema = reflector.reflect_record(*record)?;
            names
                .iter()
                .map(|binding| {
                    let missing = || Error::MissingField {
                        field: binding.name.clone(),
                        record: schema.name.to_string(),
                    };
                    let column = schema.columns.get(&binding.name).ok_or_else(missing)?;
                    let value = record.read_field(column.field).ok_or_else(missing)?;
                    Ok(NamedValue {
                        name: binding.name.clone(),
                        value,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }

        QueryArg::Value(_) => return Err(Error::UnsupportedArgument("value")),
    };

    let mut positional = Vec::with_capacity(rest.len());
    for arg in rest {
        positional.push(verbatim(arg)?);
    }

    Ok((named, positional))
}

fn verbatim(arg: &QueryArg<'_>) -> Result<Value> {
    match arg {
        QueryArg::Value(value) => Ok(value.clone()),
        QueryArg::Map(_) => Err(Error::UnsupportedArgument("map")),
        QueryArg::Record(_) => Err(Error::UnsupportedArgument("record")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names_sorted_with_bare_positional_suppressed() {
        let names =
            parse_names("SELECT :name FROM @table WHERE $id=1 AND ?42=2 AND ?=3;").unwrap();
        assert_eq!(
            names,
            vec![
                NameBinding { prefix: '?', name: "42".to_string() },
                NameBinding { prefix: '$', name: "id".to_string() },
                NameBinding { prefix: ':', name: "name".to_string() },
                NameBinding { prefix: '@', name: "table".to_string() },
            ]
        );
    }

    #[test]
    fn scan_records_bare_positional_spans() {
        let placeholders = scan_placeholders("a=? AND b=:b;").unwrap();
        assert_eq!(
            placeholders,
            vec![
                Placeholder { prefix: '?', name: String::new(), start: 2, end: 3 },
                Placeholder { prefix: ':', name: "b".to_string(), start: 10, end: 12 },
            ]
        );
    }

    #[test]
    fn invalid_name_character_is_an_error() {
        let err = parse_names("SELECT :na%me FROM test;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected named argument found in statement \"SELECT :na%me FROM test;\""
        );
    }

    #[test]
    fn name_running_to_end_of_input() {
        let names = parse_names("SELECT * FROM test WHERE name=:name").unwrap();
        assert_eq!(
            names,
            vec![NameBinding { prefix: ':', name: "name".to_string() }]
        );
    }

    fn bindings(pairs: &[(char, &str)]) -> Vec<NameBinding> {
        pairs
            .iter()
            .map(|&(prefix, name)| NameBinding { prefix, name: name.to_string() })
            .collect()
    }

    #[test]
    fn construct_named_args_with_map() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from("meshuggah"));
        map.insert("age".to_string(), Value::from(42i64));

        let reflector = Reflector::new();
        let (named, positional) = construct_named_args(
            &[QueryArg::map(&map)],
            &bindings(&[(':', "name"), ('@', "age")]),
            &reflector,
        )
        .unwrap();

        assert!(positional.is_empty());
        assert_eq!(
            named,
            vec![
                NamedValue { name: "name".to_string(), value: Value::from("meshuggah") },
                NamedValue { name: "age".to_string(), value: Value::from(42i64) },
            ]
        );
    }

    #[test]
    fn construct_named_args_with_record() {
        crate::record! {
            #[derive(Debug, Default)]
            struct Person {
                name: String => "name",
                age: i64 => "age",
            }
        }

        let person = Person { name: "meshuggah".to_string(), age: 42 };
        let reflector = Reflector::new();
        let (named, _) = construct_named_args(
            &[QueryArg::record(&person)],
            &bindings(&[(':', "name"), ('@', "age")]),
            &reflector,
        )
        .unwrap();

        assert_eq!(
            named,
            vec![
                NamedValue { name: "name".to_string(), value: Value::from("meshuggah") },
                NamedValue { name: "age".to_string(), value: Value::from(42i64) },
            ]
        );
    }

    #[test]
    fn missing_key_is_an_error() {
        let map = HashMap::new();
        let reflector = Reflector::new();
        let err = construct_named_args(
            &[QueryArg::map(&map)],
            &bindings(&[(':', "name")]),
            &reflector,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "key \"name\" missing from map");
    }

    #[test]
    fn missing_arguments_is_an_error() {
        let reflector = Reflector::new();
        let err =
            construct_named_args(&[], &bindings(&[(':', "name")]), &reflector).unwrap_err();
        assert_eq!(err.to_string(), "expected arguments for named parameters");
    }

    #[test]
    fn scalar_first_argument_is_unsupported() {
        let reflector = Reflector::new();
        let err = construct_named_args(
            &[QueryArg::value(1i64)],
            &bindings(&[(':', "name")]),
            &reflector,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument value not supported for named parameters"
        );
    }
}
