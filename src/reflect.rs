use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::record::{AnyRecord, FieldSpec, Record, RecordList};

/// Column-level view of one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// The Rust field backing the column.
    pub field: &'static str,
    pub omit_empty: bool,
}

/// The reflected structural view of a record type: its name plus the map
/// from column name to backing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub columns: HashMap<String, ColumnRef>,
}

impl RecordSchema {
    /// The column names of the type, sorted.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.columns.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Derives [`RecordSchema`]s from record field specs and caches them by
/// type identity.
///
/// The cache is shared across every [`Querier`](crate::Querier) cloned from
/// the same root; reads and writes are serialized by a mutex.
#[derive(Default)]
pub struct Reflector {
    cache: Mutex<HashMap<TypeId, Arc<RecordSchema>>>,
}

impl Reflector {
    pub fn new() -> Self {
        Reflector::default()
    }

    /// Reflect a record type known at compile time.
    pub fn reflect<T: Record>(&self) -> Result<Arc<RecordSchema>> {
        self.reflect_parts(TypeId::of::<T>(), T::NAME, T::FIELDS)
    }

    /// Reflect a record behind its object-safe view.
    pub fn reflect_record(&self, record: &dyn AnyRecord) -> Result<Arc<RecordSchema>> {
        self.reflect_parts(
            record.record_type(),
            record.record_name(),
            record.record_fields(),
        )
    }

    /// Reflect the element type of a record list.
    pub fn reflect_list(&self, list: &dyn RecordList) -> Result<Arc<RecordSchema>> {
        self.reflect_parts(list.element_type(), list.element_name(), list.element_fields())
    }

    fn reflect_parts(
        &self,
        type_id: TypeId,
        name: &'static str,
        fields: &'static [FieldSpec],
    ) -> Result<Arc<RecordSchema>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(schema) = cache.get(&type_id) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(build_schema(name, fields)?);
        cache.insert(type_id, Arc::clone(&schema));
        Ok(schema)
    }
}

fn build_schema(name: &'static str, fields: &'static [FieldSpec]) -> Result<RecordSchema> {
    let mut columns = HashMap::new();
    for spec in fields {
        let (tag_name, omit_empty) = match spec.tag {
            None => (String::new(), false),
            Some(tag) => parse_tag(tag)?,
        };

        let column = if tag_name.is_empty() {
            spec.name.to_lowercase()
        } else {
            tag_name
        };

        columns.insert(
            column,
            ColumnRef {
                field: spec.name,
                omit_empty,
            },
        );
    }
    Ok(RecordSchema { name, columns })
}

/// Parses a column tag of the form `name[,omitempty]`.
fn parse_tag(tag: &str) -> Result<(String, bool)> {
    if tag.is_empty() {
        return Err(Error::EmptyTag);
    }

    let options: Vec<&str> = tag.split(',').collect();
    match options.as_slice() {
        [name] => Ok((name.to_string(), false)),
        [name, option] => {
            if !option.eq_ignore_ascii_case("omitempty") {
                return Err(Error::TagValue(option.to_string()));
            }
            Ok((name.to_string(), true))
        }
        [_, _, extra, ..] => Err(Error::TagValue(extra.to_string())),
        [] => Err(Error::EmptyTag),
    }
}
