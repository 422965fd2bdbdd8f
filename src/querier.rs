use std::collections::HashMap;
use std::sync::Arc;

use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::{Executor, Sqlite};

use crate::builder::{bind_value, build_query, column_info, decode_column, ColumnInfo};
use crate::compile::{
    compile_statement, CompiledStatement, StatementCache, ALIAS_PREFIX, ALIAS_SEPARATOR,
};
use crate::error::{Error, Result};
use crate::expansion::RecordBinding;
use crate::names::{construct_named_args, parse_names, NamedValue, QueryArg};
use crate::record::{AnyRecord, Record, RecordList};
use crate::reflect::{RecordSchema, Reflector};
use crate::value::{FromValue, Value};

/// Observer invoked with the compiled statement immediately before each
/// driver call.
pub type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// A writable scalar destination.
pub trait ScalarTarget: Send {
    fn store(&mut self, value: Value) -> Result<()>;
}

impl<T: FromValue + Send> ScalarTarget for T {
    fn store(&mut self, value: Value) -> Result<()> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

/// One caller-owned destination bound into a [`Query`].
///
/// Destinations bound together must be homogeneous: all scalars, all
/// records, a single map, or (via [`Querier::for_many`]) all record lists.
pub enum Dest<'a> {
    Scalar(&'a mut dyn ScalarTarget),
    Map(&'a mut HashMap<String, Value>),
    Record(&'a mut dyn AnyRecord),
    List(&'a mut dyn RecordList),
}

impl<'a> Dest<'a> {
    pub fn scalar<T: FromValue + Send>(target: &'a mut T) -> Self {
        Dest::Scalar(target)
    }

    pub fn map(map: &'a mut HashMap<String, Value>) -> Self {
        Dest::Map(map)
    }

    pub fn record<R: Record>(record: &'a mut R) -> Self {
        Dest::Record(record)
    }

    pub fn list<R: Record>(list: &'a mut Vec<R>) -> Self {
        Dest::List(list)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Scalars,
    Map,
    Records,
    Lists,
}

/// The entry point for building queries.
///
/// A `Querier` owns a statement cache and shares a reflection cache with
/// every querier cloned from it via [`Querier::copy`]. It is safe to use
/// from multiple tasks; the caches serialize internally.
pub struct Querier {
    reflector: Arc<Reflector>,
    stmt_cache: Arc<StatementCache>,
    hook: Option<Hook>,
}

impl Default for Querier {
    fn default() -> Self {
        Querier::new()
    }
}

impl Querier {
    pub fn new() -> Self {
        Querier {
            reflector: Arc::new(Reflector::new()),
            stmt_cache: Arc::new(StatementCache::new()),
            hook: None,
        }
    }

    /// Assigns the hook. Each hook call precedes the actual query and
    /// observes the compiled statement that is used for the query or exec.
    pub fn hook(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.hook = Some(Arc::new(hook));
    }

    /// Returns a new `Querier` with a fresh hook and statement cache, but
    /// keeping the existing reflection cache.
    ///
    /// The statement cache is keyed by the raw SQL alone, so callers that
    /// run identically shaped SQL against differently shaped destination
    /// sets should isolate themselves with a copy.
    pub fn copy(&self) -> Querier {
        Querier {
            reflector: Arc::clone(&self.reflector),
            stmt_cache: Arc::new(StatementCache::new()),
            hook: None,
        }
    }

    /// Creates a query for a set of given destinations, populated from a
    /// single result row once executed.
    ///
    /// The query can be called multiple times; the compiled statement is
    /// cached on first use.
    pub fn for_one<'a>(&self, dests: Vec<Dest<'a>>) -> Result<Query<'a>> {
        let plan = plan_for_one(&dests)?;

        let mut schemas = Vec::new();
        if plan == Plan::Records {
            for dest in &dests {
                if let Dest::Record(record) = dest {
                    schemas.push(self.reflector.reflect_record(&**record)?);
                }
            }
        }

        Ok(self.build_query_handle(dests, schemas, plan))
    }

    /// Creates a query over record-list destinations; every returned row
    /// appends one fresh element per list, in driver order.
    pub fn for_many<'a>(&self, dests: Vec<Dest<'a>>) -> Result<Query<'a>> {
        if dests.is_empty() {
            return Err(Error::Binding(
                "expected at least one list destination".to_string(),
            ));
        }

        let mut schemas = Vec::with_capacity(dests.len());
        for dest in &dests {
            match dest {
                Dest::List(list) => schemas.push(self.reflector.reflect_list(&**list)?),
                _ => {
                    return Err(Error::Binding(
                        "expected list destinations, got a non-list".to_string(),
                    ))
                }
            }
        }

        Ok(self.build_query_handle(dests, schemas, Plan::Lists))
    }

    /// Executes a statement that does not return rows. Named arguments can
    /// be used within the statement; record expressions cannot.
    pub async fn exec<'e, E>(
        &self,
        executor: E,
        stmt: &str,
        args: &[QueryArg<'_>],
    ) -> Result<SqliteQueryResult>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let names = parse_names(stmt)?;
        let (named, positional) = construct_named_args(args, &names, &self.reflector)?;

        if let Some(hook) = &self.hook {
            hook(stmt);
        }

        let (sql, binds) = build_query(stmt, &named, &positional)?;
        let mut query = sqlx::query::<Sqlite>(&sql);
        for value in binds {
            query = bind_value(query, value);
        }
        Ok(query.execute(executor).await?)
    }

    fn build_query_handle<'a>(
        &self,
        dests: Vec<Dest<'a>>,
        schemas: Vec<Arc<RecordSchema>>,
        plan: Plan,
    ) -> Query<'a> {
        Query {
            dests,
            schemas,
            plan,
            hook: self.hook.clone(),
            stmt_cache: Arc::clone(&self.stmt_cache),
            reflector: Arc::clone(&self.reflector),
        }
    }
}

fn plan_for_one(dests: &[Dest<'_>]) -> Result<Plan> {
    let first = match dests.first() {
        Some(first) => first,
        None => return Ok(Plan::Scalars),
    };

    match first {
        Dest::Scalar(_) => {
            if !dests.iter().all(|dest| matches!(dest, Dest::Scalar(_))) {
                return Err(Error::MixedDestinations);
            }
            Ok(Plan::Scalars)
        }
        Dest::Map(_) => {
            if dests.len() > 1 {
                return Err(Error::Binding(format!(
                    "expected one map for query, got {}",
                    dests.len()
                )));
            }
            Ok(Plan::Map)
        }
        Dest::Record(_) => {
            if !dests.iter().all(|dest| matches!(dest, Dest::Record(_))) {
                return Err(Error::MixedDestinations);
            }
            Ok(Plan::Records)
        }
        Dest::List(_) => Err(Error::Binding(
            "list destinations require for_many".to_string(),
        )),
    }
}

/// A query bound to caller destinations.
///
/// `Query::query` drives the whole pipeline: named parameters are scanned
/// and assembled, record expressions are expanded against the destination
/// types (with the result memoized), the driver executes, and the returned
/// columns are routed back into the destinations.
///
/// Record expressions are written `{Person}` for every column of the type,
/// or `{people.* INTO Person}` / `{name, age INTO Person}` for a prefixed
/// or explicit projection:
///
/// ```text
/// SELECT {people.* INTO Person}, {location.* INTO Location}
/// FROM people INNER JOIN location ON people.location=location.id
/// WHERE location.id=:loc_id AND people.name=:name;
/// ```
///
/// Named arguments are drawn from the first element of `args`, either a
/// map or a record; see [`QueryArg`].
pub struct Query<'a> {
    dests: Vec<Dest<'a>>,
    schemas: Vec<Arc<RecordSchema>>,
    plan: Plan,
    hook: Option<Hook>,
    stmt_cache: Arc<StatementCache>,
    reflector: Arc<Reflector>,
}

impl<'a> std::fmt::Debug for Query<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").finish_non_exhaustive()
    }
}

impl<'a> Query<'a> {
    /// Executes a statement that returns rows, populating the bound
    /// destinations.
    ///
    /// For scalar, map and record destinations the cursor is drained and
    /// the last row wins; for list destinations every row appends.
    pub async fn query<'e, E>(
        &mut self,
        executor: E,
        stmt: &str,
        args: &[QueryArg<'_>],
    ) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let names = parse_names(stmt)?;
        let (named, positional) = construct_named_args(args, &names, &self.reflector)?;

        match self.plan {
            Plan::Scalars => self.scalar_scan(executor, stmt, &named, &positional).await,
            Plan::Map => self.map_scan(executor, stmt, &named, &positional).await,
            Plan::Records => self.record_scan(executor, stmt, &named, &positional).await,
            Plan::Lists => self.list_scan(executor, stmt, &named, &positional).await,
        }
    }

    async fn fetch<'e, E>(
        &self,
        executor: E,
        stmt: &str,
        named: &[NamedValue],
        positional: &[Value],
    ) -> Result<Vec<SqliteRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        // The hook observes the compiled statement, before the positional
        // rewrite for the driver.
        if let Some(hook) = &self.hook {
            hook(stmt);
        }

        let (sql, binds) = build_query(stmt, named, positional)?;
        let mut query = sqlx::query::<Sqlite>(&sql);
        for value in binds {
            query = bind_value(query, value);
        }
        Ok(query.fetch_all(executor).await?)
    }

    async fn scalar_scan<'e, E>(
        &mut self,
        executor: E,
        stmt: &str,
        named: &[NamedValue],
        positional: &[Value],
    ) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = self.fetch(executor, stmt, named, positional).await?;

        for row in &rows {
            let columns = column_info(row);
            if columns.len() != self.dests.len() {
                return Err(Error::ColumnCount {
                    columns: columns.len(),
                    destinations: self.dests.len(),
                });
            }
            for (index, column) in columns.iter().enumerate() {
                let value = decode_column(row, index, &column.declared)?;
                match &mut self.dests[index] {
                    Dest::Scalar(target) => target.store(value)?,
                    _ => return Err(Error::MixedDestinations),
                }
            }
        }
        Ok(())
    }

    async fn map_scan<'e, E>(
        &mut self,
        executor: E,
        stmt: &str,
        named: &[NamedValue],
        positional: &[Value],
    ) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = self.fetch(executor, stmt, named, positional).await?;

        for row in &rows {
            let columns = column_info(row);
            for (index, column) in columns.iter().enumerate() {
                let value = decode_column(row, index, &column.declared)?;
                match &mut self.dests[0] {
                    Dest::Map(map) => {
                        map.insert(column.name.clone(), value);
                    }
                    _ => return Err(Error::MixedDestinations),
                }
            }
        }
        Ok(())
    }

    async fn record_scan<'e, E>(
        &mut self,
        executor: E,
        stmt: &str,
        named: &[NamedValue],
        positional: &[Value],
    ) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (compiled, was_cached) = self.compiled(stmt)?;
        let rows = self
            .fetch(executor, &compiled.stmt, named, positional)
            .await?;

        if let Some(first) = rows.first() {
            let columns = column_info(first);
            let routes = route_columns(&columns, &self.schemas, &compiled.bindings)?;

            for row in &rows {
                for (index, &(dest_index, field)) in routes.iter().enumerate() {
                    let value = decode_column(row, index, &columns[index].declared)?;
                    match &mut self.dests[dest_index] {
                        Dest::Record(record) => record.write_field(field, value)?,
                        _ => return Err(Error::MixedDestinations),
                    }
                }
            }
        }

        // Only cache the statement if compilation changed it.
        if !was_cached && compiled.stmt != stmt {
            self.stmt_cache.set(stmt.to_string(), compiled);
        }
        Ok(())
    }

    async fn list_scan<'e, E>(
        &mut self,
        executor: E,
        stmt: &str,
        named: &[NamedValue],
        positional: &[Value],
    ) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (compiled, was_cached) = self.compiled(stmt)?;
        let rows = self
            .fetch(executor, &compiled.stmt, named, positional)
            .await?;

        if let Some(first) = rows.first() {
            let columns = column_info(first);
            let routes = route_columns(&columns, &self.schemas, &compiled.bindings)?;

            for row in &rows {
                let mut fresh: Vec<Box<dyn AnyRecord>> = Vec::with_capacity(self.dests.len());
                for dest in &self.dests {
                    match dest {
                        Dest::List(list) => fresh.push(list.new_element()),
                        _ => return Err(Error::MixedDestinations),
                    }
                }

                for (index, &(dest_index, field)) in routes.iter().enumerate() {
                    let value = decode_column(row, index, &columns[index].declared)?;
                    fresh[dest_index].write_field(field, value)?;
                }

                for (dest, element) in self.dests.iter_mut().zip(fresh) {
                    match dest {
                        Dest::List(list) => list.push_element(element)?,
                        _ => return Err(Error::MixedDestinations),
                    }
                }
            }
        }

        if !was_cached && compiled.stmt != stmt {
            self.stmt_cache.set(stmt.to_string(), compiled);
        }
        Ok(())
    }

    fn compiled(&self, stmt: &str) -> Result<(Arc<CompiledStatement>, bool)> {
        if let Some(cached) = self.stmt_cache.get(stmt) {
            return Ok((cached, true));
        }
        Ok((Arc::new(compile_statement(stmt, &self.schemas)?), false))
    }
}

/// Route each returned column to `(destination index, field name)`.
///
/// An aliased column carries its owning table prefix in-band; the claiming
/// destination must then be bound to that prefix by a record expression.
/// Unprefixed columns go to the first destination declaring the name.
fn route_columns(
    columns: &[ColumnInfo],
    schemas: &[Arc<RecordSchema>],
    bindings: &[RecordBinding],
) -> Result<Vec<(usize, &'static str)>> {
    let mut routes = Vec::with_capacity(columns.len());

    for column in columns {
        let (prefix, name) = split_alias(&column.name);

        let mut found = None;
        for (dest_index, schema) in schemas.iter().enumerate() {
            let column_ref = match schema.columns.get(name) {
                Some(column_ref) => column_ref,
                None => continue,
            };
            if !prefix.is_empty() {
                let bound = bindings
                    .iter()
                    .any(|binding| binding.name == schema.name && binding.prefix == prefix);
                if !bound {
                    continue;
                }
            }
            found = Some((dest_index, column_ref.field));
            break;
        }

        match found {
            Some(route) => routes.push(route),
            None => {
                return Err(Error::MissingDestination {
                    column: column.name.clone(),
                    types: schemas.iter().map(|s| s.name.to_string()).collect(),
                })
            }
        }
    }

    Ok(routes)
}

fn split_alias(column: &str) -> (&str, &str) {
    if let Some(rest) = column.strip_prefix(ALIAS_PREFIX) {
        if let Some((prefix, name)) = rest.split_once(ALIAS_SEPARATOR) {
            return (prefix, name);
        }
    }
    ("", column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::ColumnRef;
    use sqlx::{Connection, SqliteConnection};

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Person {
            name: String => "name",
            age: i64 => "age",
        }
    }

    fn schema(name: &'static str, columns: &[(&str, &'static str)]) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name,
            columns: columns
                .iter()
                .map(|&(column, field)| {
                    (column.to_string(), ColumnRef { field, omit_empty: false })
                })
                .collect(),
        })
    }

    #[test]
    fn split_alias_recovers_prefix() {
        assert_eq!(split_alias("_pfx_test_sfx_name"), ("test", "name"));
        assert_eq!(split_alias("name"), ("", "name"));
        assert_eq!(split_alias("_pfx_dangling"), ("", "_pfx_dangling"));
    }

    #[test]
    fn route_aliased_columns_to_bound_destinations() {
        let schemas = vec![
            schema("Person", &[("name", "name"), ("age", "age")]),
            schema("Record", &[("name", "name")]),
        ];
        let bindings = vec![
            RecordBinding {
                name: "Person".to_string(),
                prefix: "test".to_string(),
                fields: Default::default(),
                wildcard: true,
                start: 0,
                end: 0,
            },
            RecordBinding {
                name: "Record".to_string(),
                prefix: "sqlite_master".to_string(),
                fields: Default::default(),
                wildcard: true,
                start: 0,
                end: 0,
            },
        ];
        let columns = vec![
            ColumnInfo { name: "age".to_string(), declared: "INTEGER".to_string() },
            ColumnInfo {
                name: "_pfx_test_sfx_name".to_string(),
                declared: "TEXT".to_string(),
            },
            ColumnInfo {
                name: "_pfx_sqlite_master_sfx_name".to_string(),
                declared: "TEXT".to_string(),
            },
        ];

        let routes = route_columns(&columns, &schemas, &bindings).unwrap();
        assert_eq!(routes, vec![(0, "age"), (0, "name"), (1, "name")]);
    }

    #[test]
    fn unroutable_column_is_an_error() {
        let schemas = vec![schema("Person", &[("name", "name")])];
        let columns = vec![ColumnInfo {
            name: "age".to_string(),
            declared: "INTEGER".to_string(),
        }];
        let err = route_columns(&columns, &schemas, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing destination name \"age\" in types [\"Person\"]"
        );
    }

    #[test]
    fn mixed_destinations_are_rejected() {
        let querier = Querier::new();
        let mut person = Person::default();
        let mut count = 0i64;
        let err = querier
            .for_one(vec![Dest::scalar(&mut count), Dest::record(&mut person)])
            .unwrap_err();
        assert_eq!(err.to_string(), "mixed destinations not supported");
    }

    #[test]
    fn for_many_rejects_non_lists() {
        let querier = Querier::new();
        let mut person = Person::default();
        assert!(querier.for_many(vec![Dest::record(&mut person)]).is_err());
        assert!(querier.for_many(vec![]).is_err());
    }

    #[tokio::test]
    async fn statement_cache_hit_compiles_once() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE test(name TEXT, age INTEGER);")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO test(name, age) VALUES ('fred', 21), ('frank', 42);")
            .execute(&mut conn)
            .await
            .unwrap();

        let stmt = "SELECT {test.* INTO Person} FROM test WHERE test.name=:name;";
        let expected = "SELECT test.age, test.name FROM test WHERE test.name=:name;";

        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let mut querier = Querier::new();
        let sink = Arc::clone(&seen);
        querier.hook(move |stmt| sink.lock().unwrap().push(stmt.to_string()));

        let mut person = Person::default();
        let mut query = querier.for_one(vec![Dest::record(&mut person)]).unwrap();

        let mut args = HashMap::new();
        args.insert("name".to_string(), Value::from("fred"));

        query
            .query(&mut conn, stmt, &[QueryArg::map(&args)])
            .await
            .unwrap();
        assert!(querier.stmt_cache.contains(stmt));

        query
            .query(&mut conn, stmt, &[QueryArg::map(&args)])
            .await
            .unwrap();
        drop(query);

        assert_eq!(person, Person { name: "fred".to_string(), age: 21 });
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[expected.to_string(), expected.to_string()]
        );
    }

    #[tokio::test]
    async fn unchanged_statements_are_not_cached() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE test(name TEXT, age INTEGER);")
            .execute(&mut conn)
            .await
            .unwrap();

        let querier = Querier::new();
        let mut person = Person::default();
        let mut query = querier.for_one(vec![Dest::record(&mut person)]).unwrap();

        let stmt = "SELECT name, age FROM test;";
        query.query(&mut conn, stmt, &[]).await.unwrap();
        drop(query);

        assert!(!querier.stmt_cache.contains(stmt));
    }
}
