//! # sqlx-record-bind
//!
//! An SQLx extension that expands typed record expressions inside SQL and
//! binds named parameters, then routes the returned columns back into your
//! types.
//!
//! ## Features
//!
//! - **Record Expansion**: Write `{Person}` or `{people.* INTO Person}`
//!   instead of spelling out column lists; the projection is generated from
//!   the type's fields, with disambiguating aliases when joined types share
//!   column names
//! - **Named Placeholders**: Use `:name`, `@name`, `$name` or `?NNN` and
//!   supply the values once, as a map or a record
//! - **Typed Scanning**: Results land in scalars, a map, records, or
//!   growing `Vec`s of records, chosen per query
//! - **Statement Caching**: A statement is compiled once and memoized; the
//!   reflection cache is shared across [`Querier::copy`] clones
//! - **Generic Executor Support**: Works with `SqlitePool`, `Transaction`,
//!   and any SQLx SQLite `Executor`
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["sqlite", "runtime-tokio"] }
//! sqlx-record-bind = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Record expansion
//!
//! ```rust,no_run
//! use sqlx::{Connection, SqliteConnection};
//! use sqlx_record_bind::{record, Dest, Querier, QueryArg, Value};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Person {
//!         pub name: String => "name",
//!         pub age: i64 => "age",
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let querier = Querier::new();
//!
//! let mut person = Person::default();
//! let mut query = querier.for_one(vec![Dest::record(&mut person)])?;
//!
//! let mut args = std::collections::HashMap::new();
//! args.insert("name".to_string(), Value::from("fred"));
//!
//! // Expands to: SELECT age, name FROM people WHERE name=?
//! query
//!     .query(
//!         &mut conn,
//!         "SELECT {Person} FROM people WHERE name=:name;",
//!         &[QueryArg::map(&args)],
//!     )
//!     .await?;
//! drop(query);
//!
//! println!("{} is {}", person.name, person.age);
//! # Ok(())
//! # }
//! ```
//!
//! ### Joins into multiple records
//!
//! ```rust,no_run
//! use sqlx::{Connection, SqliteConnection};
//! use sqlx_record_bind::{record, Dest, Querier, QueryArg};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Person {
//!         pub name: String => "name",
//!         pub age: i64 => "age",
//!     }
//! }
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Location {
//!         pub city: String => "city",
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let querier = Querier::new();
//!
//! let mut person = Person::default();
//! let mut location = Location::default();
//! let mut query = querier.for_one(vec![
//!     Dest::record(&mut person),
//!     Dest::record(&mut location),
//! ])?;
//!
//! // Expands to: SELECT people.age, people.name, location.city FROM ...
//! query
//!     .query(
//!         &mut conn,
//!         "SELECT {people.* INTO Person}, {location.* INTO Location} \
//!          FROM people INNER JOIN location ON people.location=location.id;",
//!         &[],
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Accumulating rows
//!
//! ```rust,no_run
//! use sqlx::{Connection, SqliteConnection};
//! use sqlx_record_bind::{record, Dest, Querier, QueryArg, Value};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Person {
//!         pub name: String => "name",
//!         pub age: i64 => "age",
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let querier = Querier::new();
//!
//! let mut people: Vec<Person> = Vec::new();
//! let mut query = querier.for_many(vec![Dest::list(&mut people)])?;
//!
//! let mut args = std::collections::HashMap::new();
//! args.insert("age".to_string(), Value::from(20i64));
//!
//! query
//!     .query(
//!         &mut conn,
//!         "SELECT {test.* INTO Person} FROM test WHERE test.age>:age;",
//!         &[QueryArg::map(&args)],
//!     )
//!     .await?;
//! drop(query);
//!
//! println!("found {} people", people.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Statements without rows
//!
//! ```rust,no_run
//! use sqlx::{Connection, SqliteConnection};
//! use sqlx_record_bind::{Querier, QueryArg, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let querier = Querier::new();
//!
//! let mut args = std::collections::HashMap::new();
//! args.insert("name".to_string(), Value::from("fred"));
//! args.insert("age".to_string(), Value::from(21i64));
//!
//! let result = querier
//!     .exec(
//!         &mut conn,
//!         "INSERT INTO test(name, age) VALUES (:name, :age);",
//!         &[QueryArg::map(&args)],
//!     )
//!     .await?;
//! println!("inserted {} rows", result.rows_affected());
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Scan**: named placeholders are located and sorted by name; record
//!    expressions `{ ... }` are parsed into bindings carrying their target
//!    type, table prefix and projection
//! 2. **Compile**: each record expression is replaced by the projected
//!    column list of its target type. When two bound types share a column
//!    name, the prefixed column gains an alias of the form
//!    `_pfx_<table>_sfx_<column>` so the scanner can route it back to the
//!    right type. The compiled statement is cached keyed by the original
//!    SQL
//! 3. **Execute**: values are bound per placeholder occurrence and the
//!    statement runs on any SQLite executor
//! 4. **Scan**: returned columns are routed into the bound destinations by
//!    column name, alias prefix, and binding order
//!
//! ## Limitations
//!
//! - SQLite only
//! - Placeholder names must be alphanumeric/underscore (`:@$`) or numeric
//!   (`?`)
//! - The statement cache is keyed by the SQL text alone; use
//!   [`Querier::copy`] to isolate callers that reuse identical SQL against
//!   differently shaped destination sets
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at
//! your option.

pub mod ast;
pub mod builder;
pub mod compile;
pub mod error;
pub mod expansion;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod path;
pub mod querier;
pub mod record;
pub mod reflect;
pub mod token;
pub mod value;

pub use compile::{ALIAS_PREFIX, ALIAS_SEPARATOR};
pub use error::{Error, Result};
pub use expansion::RecordBinding;
pub use names::{parse_names, NameBinding, NamedValue, QueryArg};
pub use querier::{Dest, Hook, Querier, Query, ScalarTarget};
pub use record::{AnyRecord, FieldSpec, Record, RecordList};
pub use reflect::{ColumnRef, RecordSchema, Reflector};
pub use value::{FromValue, ToValue, Value};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::names::QueryArg;
    pub use crate::querier::{Dest, Querier, Query};
    pub use crate::record;
    pub use crate::record::Record;
    pub use crate::value::Value;
}
