pub mod block;
pub mod catalog;
pub mod error;
pub mod helper;
pub mod schema;
pub mod serializer;
pub mod types;

pub use block::{Block, BlockColumn, Cell, ColumnData};
pub use catalog::SchemaCatalog;
pub use error::ColbindError;
pub use schema::{ColumnDefinition, ColumnDescriptor, TableSchemaDescription};
pub use serializer::{ColumnSerializer, ColumnSerializers};
pub use types::{BindingRow, DataType, IntegerType, ScalarValue};
