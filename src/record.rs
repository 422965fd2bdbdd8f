use std::any::{Any, TypeId};

use crate::error::{Error, Result};
use crate::value::Value;

/// One field of a record type: the Rust field name plus its optional
/// column tag.
///
/// The tag carries the same grammar as the original column tags,
/// `name[,omitempty]`, and is parsed by the reflector rather than at the
/// definition site so malformed tags surface as reflection errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub tag: Option<&'static str>,
}

/// A destination or argument type with named fields.
///
/// Implementations are normally generated with the [`record!`](crate::record)
/// macro, which pairs each field with an optional column tag:
///
/// ```rust
/// use sqlx_record_bind::record;
///
/// record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Person {
///         pub name: String => "name",
///         pub age: i64 => "age",
///     }
/// }
/// ```
///
/// Untagged fields map to their lower-cased field name.
pub trait Record: Default + Send + 'static {
    /// The type name record expansions refer to, e.g. `Person` in
    /// `{people.* INTO Person}`.
    const NAME: &'static str;
    const FIELDS: &'static [FieldSpec];

    /// Read a field by its Rust field name.
    fn read(&self, field: &str) -> Option<Value>;

    /// Write a field by its Rust field name, converting from the scanned
    /// value.
    fn write(&mut self, field: &str, value: Value) -> Result<()>;
}

/// Object-safe view of a [`Record`], used wherever destinations of
/// different record types travel together.
pub trait AnyRecord: Send {
    fn record_type(&self) -> TypeId;
    fn record_name(&self) -> &'static str;
    fn record_fields(&self) -> &'static [FieldSpec];
    fn read_field(&self, field: &str) -> Option<Value>;
    fn write_field(&mut self, field: &str, value: Value) -> Result<()>;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Record> AnyRecord for T {
    fn record_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn record_name(&self) -> &'static str {
        T::NAME
    }

    fn record_fields(&self) -> &'static [FieldSpec] {
        T::FIELDS
    }

    fn read_field(&self, field: &str) -> Option<Value> {
        self.read(field)
    }

    fn write_field(&mut self, field: &str, value: Value) -> Result<()> {
        self.write(field, value)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Object-safe view of a growable sequence of records, the destination
/// shape behind [`Querier::for_many`](crate::Querier::for_many).
///
/// Each returned row allocates one fresh element per list via
/// [`RecordList::new_element`]; the filled element is handed back through
/// [`RecordList::push_element`], preserving driver row order.
pub trait RecordList: Send {
    fn element_type(&self) -> TypeId;
    fn element_name(&self) -> &'static str;
    fn element_fields(&self) -> &'static [FieldSpec];
    fn new_element(&self) -> Box<dyn AnyRecord>;
    fn push_element(&mut self, element: Box<dyn AnyRecord>) -> Result<()>;
}

impl<T: Record> RecordList for Vec<T> {
    fn element_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_name(&self) -> &'static str {
        T::NAME
    }

    fn element_fields(&self) -> &'static [FieldSpec] {
        T::FIELDS
    }

    fn new_element(&self) -> Box<dyn AnyRecord> {
        Box::new(T::default())
    }

    fn push_element(&mut self, element: Box<dyn AnyRecord>) -> Result<()> {
        match element.into_any().downcast::<T>() {
            Ok(element) => {
                self.push(*element);
                Ok(())
            }
            Err(_) => Err(Error::Binding(format!(
                "expected list element of type {:?}",
                T::NAME
            ))),
        }
    }
}

/// Defines a struct and derives its [`Record`] implementation.
///
/// Each field may carry a column tag after `=>`; the tag grammar is
/// `name[,omitempty]`. A field without a tag maps to its lower-cased field
/// name.
///
/// ```rust
/// use sqlx_record_bind::record;
///
/// record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Location {
///         pub city: String => "city",
///         pub id: i64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty $(=> $tag:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::Record for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [$crate::FieldSpec] = &[
                $(
                    $crate::FieldSpec {
                        name: stringify!($field),
                        tag: $crate::record!(@tag $($tag)?),
                    },
                )*
            ];

            fn read(&self, field: &str) -> Option<$crate::Value> {
                match field {
                    $(stringify!($field) => Some($crate::ToValue::to_value(&self.$field)),)*
                    _ => None,
                }
            }

            fn write(&mut self, field: &str, value: $crate::Value) -> $crate::Result<()> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FromValue::from_value(value)?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::Error::Binding(format!(
                        "no field {:?} on record {:?}",
                        field,
                        <Self as $crate::Record>::NAME
                    ))),
                }
            }
        }
    };
    (@tag) => {
        None
    };
    (@tag $tag:literal) => {
        Some($tag)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Person {
            name: String => "name",
            age: i64 => "age",
            nickname: Option<String>,
        }
    }

    #[test]
    fn field_specs_carry_tags() {
        assert_eq!(Person::NAME, "Person");
        assert_eq!(
            Person::FIELDS,
            &[
                FieldSpec { name: "name", tag: Some("name") },
                FieldSpec { name: "age", tag: Some("age") },
                FieldSpec { name: "nickname", tag: None },
            ]
        );
    }

    #[test]
    fn read_and_write_by_field_name() {
        let mut person = Person::default();
        person.write("name", Value::Text("fred".to_string())).unwrap();
        person.write("age", Value::Integer(21)).unwrap();
        assert_eq!(person.read("name"), Some(Value::Text("fred".to_string())));
        assert_eq!(person.read("nickname"), Some(Value::Null));
        assert!(person.read("missing").is_none());
        assert!(person.write("missing", Value::Null).is_err());
    }

    #[test]
    fn list_elements_round_trip() {
        let mut people: Vec<Person> = Vec::new();
        let mut element = people.new_element();
        element
            .write_field("name", Value::Text("frank".to_string()))
            .unwrap();
        people.push_element(element).unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "frank");
    }
}
