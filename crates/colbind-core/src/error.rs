use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColbindError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("cannot parse column type `{declared}`: {reason}")]
    SchemaParse { declared: String, reason: String },
    #[error("unsupported column type: {0}")]
    UnsupportedType(String),
    #[error("type mismatch: column of type {expected} cannot accept a {actual} value")]
    TypeMismatch {
        expected: String,
        actual: &'static str,
    },
    #[error("null value for non-nullable column of type {expected}")]
    NullNotAllowed { expected: String },
    #[error("string of {length} bytes does not fit FixedString({capacity})")]
    FixedStringOverflow { length: usize, capacity: usize },
    #[error("value {value} is out of range for {target}")]
    NumericOverflow { value: String, target: String },
    #[error("table {table} (shard {shard}) row {row} column {column}: {source}")]
    Row {
        table: String,
        shard: String,
        row: usize,
        column: String,
        #[source]
        source: Box<ColbindError>,
    },
    #[error("batch targets table {actual} but reader tracks {expected}")]
    TableMismatch { expected: String, actual: String },
    #[error("table {table}: row {row} has {actual} values, schema has {expected} columns after refresh")]
    PersistentSchemaMismatch {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("block shape [{actual}] does not match schema [{expected}]")]
    BlockShapeMismatch { expected: String, actual: String },
    #[error("table {table} has no columns")]
    EmptySchema { table: String },
    #[error("schema fetch failed for table {table}: {reason}")]
    SchemaFetch { table: String, reason: String },
    #[error("schema fetch cancelled for table {table}")]
    Cancelled { table: String },
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl ColbindError {
    /// True for per-value conversion failures, the only errors a skip-row
    /// policy may step over.
    pub fn is_row_scoped(&self) -> bool {
        match self {
            ColbindError::TypeMismatch { .. }
            | ColbindError::NullNotAllowed { .. }
            | ColbindError::FixedStringOverflow { .. }
            | ColbindError::NumericOverflow { .. } => true,
            ColbindError::Row { source, .. } => source.is_row_scoped(),
            _ => false,
        }
    }

    pub(crate) fn numeric_overflow(value: impl ToString, target: impl ToString) -> Self {
        ColbindError::NumericOverflow {
            value: value.to_string(),
            target: target.to_string(),
        }
    }
}

pub type Result<T, E = ColbindError> = std::result::Result<T, E>;
