//! Statement compilation: record expressions are replaced by their expanded
//! column projections, and the result is memoized per statement.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::expansion::{parse_records, RecordBinding};
use crate::reflect::RecordSchema;

/// Prefix used to encode the owning table into a column alias.
pub const ALIAS_PREFIX: &str = "_pfx_";
/// Separator between the encoded table prefix and the column name.
pub const ALIAS_SEPARATOR: &str = "_sfx_";

/// A compiled statement: the rewritten SQL plus the record bindings that
/// produced it.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStatement {
    pub stmt: String,
    pub bindings: Vec<RecordBinding>,
}

/// Expand every record expression in `stmt` against the destination
/// schemas. A statement without a `{` passes through untouched.
pub(crate) fn compile_statement(
    stmt: &str,
    schemas: &[Arc<RecordSchema>],
) -> Result<CompiledStatement> {
    if !stmt.contains('{') {
        return Ok(CompiledStatement {
            stmt: stmt.to_string(),
            bindings: Vec::new(),
        });
    }

    let bindings = parse_records(stmt)?;
    let intersections = field_intersections(schemas);
    let stmt = expand_records(stmt, &bindings, schemas, &intersections)?;
    Ok(CompiledStatement { stmt, bindings })
}

/// Group the destination schemas by shared column names. Only columns
/// declared by two or more schemas enter the result, keyed by schema name.
fn field_intersections<'a>(
    schemas: &'a [Arc<RecordSchema>],
) -> HashMap<&'a str, HashSet<&'a str>> {
    // A single schema can never overlap.
    if schemas.len() <= 1 {
        return HashMap::new();
    }

    let mut by_column: HashMap<&str, Vec<&'a RecordSchema>> = HashMap::new();
    for schema in schemas {
        for column in schema.columns.keys() {
            by_column
                .entry(column.as_str())
                .or_default()
                .push(schema.as_ref());
        }
    }

    let mut results: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (column, owners) in by_column {
        if owners.len() <= 1 {
            continue;
        }
        for schema in owners {
            results.entry(schema.name).or_default().insert(column);
        }
    }
    results
}

fn expand_records(
    stmt: &str,
    bindings: &[RecordBinding],
    schemas: &[Arc<RecordSchema>],
    intersections: &HashMap<&str, HashSet<&str>>,
) -> Result<String> {
    let mut out = String::with_capacity(stmt.len());
    let mut last = 0;

    for binding in bindings {
        let schema = schemas
            .iter()
            .find(|schema| schema.name == binding.name)
            .ok_or_else(|| Error::UnknownEntity(binding.name.clone()))?;
        let intersection = intersections.get(schema.name);

        let mut names: Vec<String>;
        if binding.wildcard {
            names = schema
                .columns
                .keys()
                .map(|column| field_name_alias(column, binding, intersection))
                .collect();
        } else {
            names = Vec::with_capacity(binding.fields.len());
            for field in &binding.fields {
                if !schema.columns.contains_key(field) {
                    return Err(Error::UnknownField {
                        field: field.clone(),
                        entity: schema.name.to_string(),
                    });
                }
                names.push(field_name_alias(field, binding, intersection));
            }
        }

        if names.is_empty() {
            return Err(Error::EmptyRecord(schema.name.to_string()));
        }
        names.sort();

        out.push_str(&stmt[last..binding.start]);
        out.push_str(&names.join(", "));
        last = binding.end;
    }

    out.push_str(&stmt[last..]);
    Ok(out)
}

/// Build one projected column token. Prefixed columns that collide across
/// destination types get an alias embedding the prefix, the only in-band
/// channel the scan planner has to recover the owning table.
fn field_name_alias(
    name: &str,
    binding: &RecordBinding,
    intersection: Option<&HashSet<&str>>,
) -> String {
    if binding.prefix.is_empty() {
        return name.to_string();
    }
    let mut out = format!("{}.{}", binding.prefix, name);
    if intersection.is_some_and(|set| set.contains(name)) {
        out.push_str(" AS ");
        out.push_str(ALIAS_PREFIX);
        out.push_str(&binding.prefix);
        out.push_str(ALIAS_SEPARATOR);
        out.push_str(name);
    }
    out
}

/// Memoizes compiled statements keyed by the original SQL text.
///
/// Entries are never mutated after insertion. Two callers may compile the
/// same statement under a race; compilation is pure, so the last writer
/// wins with identical content.
#[derive(Default)]
pub(crate) struct StatementCache {
    cache: Mutex<HashMap<String, Arc<CompiledStatement>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        StatementCache::default()
    }

    pub fn get(&self, stmt: &str) -> Option<Arc<CompiledStatement>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(stmt).cloned()
    }

    pub fn set(&self, stmt: String, compiled: Arc<CompiledStatement>) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(stmt, compiled);
    }

    #[cfg(test)]
    pub fn contains(&self, stmt: &str) -> bool {
        self.get(stmt).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::ColumnRef;

    fn schema(name: &'static str, columns: &[(&str, &'static str)]) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name,
            columns: columns
                .iter()
                .map(|&(column, field)| {
                    (
                        column.to_string(),
                        ColumnRef {
                            field,
                            omit_empty: false,
                        },
                    )
                })
                .collect(),
        })
    }

    #[test]
    fn passthrough_without_record_expressions() {
        let compiled = compile_statement("SELECT name, age FROM test;", &[]).unwrap();
        assert_eq!(compiled.stmt, "SELECT name, age FROM test;");
        assert!(compiled.bindings.is_empty());
    }

    #[test]
    fn expand_disjoint_types_without_aliases() {
        let schemas = vec![
            schema("Person", &[("name", "name"), ("age", "age")]),
            schema("Location", &[("city", "city")]),
        ];
        let compiled = compile_statement(
            "SELECT {people.* INTO Person}, {location.* INTO Location} FROM people INNER JOIN location ON people.location=location.id;",
            &schemas,
        )
        .unwrap();
        assert_eq!(
            compiled.stmt,
            "SELECT people.age, people.name, location.city FROM people INNER JOIN location ON people.location=location.id;"
        );
    }

    #[test]
    fn expand_colliding_types_with_aliases() {
        let schemas = vec![
            schema("Person", &[("name", "name"), ("age", "age")]),
            schema("Record", &[("name", "name")]),
        ];
        let compiled = compile_statement(
            "SELECT {\"test.*\" INTO Person}, {\"sqlite_master.*\" INTO Record} FROM test,sqlite_master WHERE test.name=:name;",
            &schemas,
        )
        .unwrap();
        assert_eq!(
            compiled.stmt,
            "SELECT test.age, test.name AS _pfx_test_sfx_name, sqlite_master.name AS _pfx_sqlite_master_sfx_name FROM test,sqlite_master WHERE test.name=:name;"
        );
    }

    #[test]
    fn expand_mixed_wildcard_and_explicit_fields() {
        let schemas = vec![
            schema("Person", &[("name", "name"), ("age", "age")]),
            schema("Other", &[("x", "x")]),
            schema("Another", &[("y", "y"), ("z", "z")]),
        ];
        let compiled = compile_statement(
            "SELECT {test.* INTO Person}, {x INTO Other}, {y INTO Another} FROM test WHERE test.name=:name;",
            &schemas,
        )
        .unwrap();
        assert_eq!(
            compiled.stmt,
            "SELECT test.age, test.name, x, y FROM test WHERE test.name=:name;"
        );
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let err = compile_statement("SELECT {test.* INTO Missing} FROM test;", &[]).unwrap_err();
        assert_eq!(err.to_string(), "no entity found with the name \"Missing\"");
    }

    #[test]
    fn unknown_field_is_an_error() {
        let schemas = vec![schema("Person", &[("name", "name")])];
        let err = compile_statement("SELECT {age INTO Person} FROM test;", &schemas).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field \"age\" not found in entity \"Person\""
        );
    }

    #[test]
    fn cache_round_trip() {
        let cache = StatementCache::new();
        assert!(cache.get("SELECT 1;").is_none());
        cache.set(
            "SELECT 1;".to_string(),
            Arc::new(CompiledStatement {
                stmt: "SELECT 1;".to_string(),
                bindings: Vec::new(),
            }),
        );
        assert!(cache.contains("SELECT 1;"));
    }
}
