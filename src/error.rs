/// Error types for sqlx-record-bind
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error compiling the record-expression pattern
    #[error("Failed to parse SQL template: {0}")]
    Parse(#[from] regex::Error),

    /// Lex or parse failure inside a record path, with positions
    #[error("{0}")]
    PathSyntax(String),

    /// A record path parsed as more than one top-level expression
    #[error("got more than one expression")]
    TooManyExpressions,

    /// Malformed `{ ... }` body
    #[error("unexpected record expression {0:?}")]
    RecordExpression(String),

    /// A quoted projection without a matching terminator quote
    #[error("missing quote {quote:?} terminator for record expression {expression:?}")]
    UnterminatedQuote { quote: String, expression: String },

    /// A record expansion names a type that was never bound as a destination
    #[error("no entity found with the name {0:?}")]
    UnknownEntity(String),

    /// An explicit projection field does not exist on the target type
    #[error("field {field:?} not found in entity {entity:?}")]
    UnknownField { field: String, entity: String },

    /// A record expansion projected nothing
    #[error("no fields found in record {0:?} expression")]
    EmptyRecord(String),

    /// Ill-formed placeholder in a statement
    #[error("unexpected named argument found in statement {0:?}")]
    NamedArgument(String),

    /// The statement has name bindings but no argument was supplied
    #[error("expected arguments for named parameters")]
    MissingArguments,

    /// A name binding has no matching key in the argument map
    #[error("key {0:?} missing from map")]
    MissingKey(String),

    /// A name binding has no matching field on the argument record
    #[error("field {field:?} missing from record {record:?}")]
    MissingField { field: String, record: String },

    /// The first positional argument is neither a map nor a record
    #[error("argument {0} not supported for named parameters")]
    UnsupportedArgument(&'static str),

    /// A field declared an empty column tag
    #[error("unexpected empty tag")]
    EmptyTag,

    /// A column tag carried an option other than `omitempty`
    #[error("unexpected tag value {0:?}")]
    TagValue(String),

    /// A returned column could not be routed to any destination field
    #[error("missing destination name {column:?} in types {types:?}")]
    MissingDestination { column: String, types: Vec<String> },

    /// Scalar and record destinations cannot be mixed in one query
    #[error("mixed destinations not supported")]
    MixedDestinations,

    /// Scalar destinations must match the returned columns one to one
    #[error("number of destinations does not match column length {columns}, got {destinations}")]
    ColumnCount { columns: usize, destinations: usize },

    /// Destination binding failure outside the cases above
    #[error("{0}")]
    Binding(String),

    /// A value could not be converted to the destination type
    #[error("cannot convert {value} into {target}")]
    Conversion {
        value: &'static str,
        target: &'static str,
    },

    /// A column declared a type outside the scan table
    #[error("unexpected column type {0:?}")]
    UnsupportedColumnType(String),

    /// Error from SQLx database operations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for sqlx-record-bind operations
pub type Result<T> = std::result::Result<T, Error>;
