use colbind_core::catalog::SchemaCatalog;
use colbind_core::schema::TableSchemaDescription;
use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("table not found: {0}")]
    NotFound(String),
    #[error("schema source unreachable: {0}")]
    Unreachable(String),
}

pub type SchemaFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TableSchemaDescription, LoaderError>> + Send + 'a>>;

/// Source of authoritative table schemas, consulted when a batch no longer
/// matches the cached description.
pub trait SchemaLoader: Send + Sync {
    fn fetch_schema<'a>(&'a self, table: &'a str) -> SchemaFuture<'a>;
}

/// Serves descriptions from a shared in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSchemaLoader {
    catalog: Arc<RwLock<SchemaCatalog>>,
}

impl CatalogSchemaLoader {
    pub fn new(catalog: Arc<RwLock<SchemaCatalog>>) -> Self {
        Self { catalog }
    }
}

impl SchemaLoader for CatalogSchemaLoader {
    fn fetch_schema<'a>(&'a self, table: &'a str) -> SchemaFuture<'a> {
        Box::pin(async move {
            self.catalog
                .read()
                .get_table(table)
                .cloned()
                .ok_or_else(|| LoaderError::NotFound(table.to_string()))
        })
    }
}
