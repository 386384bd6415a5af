use crate::loader::SchemaLoader;
use crate::options::ReaderOptions;
use colbind_core::block::Block;
use colbind_core::error::ColbindError;
use colbind_core::helper;
use colbind_core::schema::{ColumnDefinition, TableSchemaDescription};
use colbind_core::serializer::ColumnSerializers;
use metrics::counter;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An installed schema: the description plus the serializers resolved from
/// it. Immutable; a refresh installs a new one.
#[derive(Debug)]
pub struct TrackedSchema {
    version: u64,
    description: Arc<TableSchemaDescription>,
    definitions: Vec<ColumnDefinition>,
    serializers: ColumnSerializers,
}

impl TrackedSchema {
    fn build(version: u64, description: TableSchemaDescription) -> Result<Self, ColbindError> {
        let definitions = description.full_column_types_and_names_definition();
        let serializers = helper::column_serializers(&definitions)?;
        Ok(Self {
            version,
            description: Arc::new(description),
            definitions,
            serializers,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn description(&self) -> &Arc<TableSchemaDescription> {
        &self.description
    }

    pub fn serializers(&self) -> &ColumnSerializers {
        &self.serializers
    }

    pub fn column_count(&self) -> usize {
        self.serializers.len()
    }

    /// Empty block aligned with [`Self::serializers`].
    pub fn empty_block(&self) -> Result<Block, ColbindError> {
        helper::block_definition(&self.definitions)
    }
}

/// Caches the authoritative schema of one table and refreshes it on demand.
///
/// Readers take a snapshot with [`current`](Self::current) and keep using it
/// for the whole batch. A refresh swaps the single `Arc`, so a reader sees
/// either the old or the new snapshot, never a mix. Refreshes are serialized
/// per tracker.
pub struct SchemaUpdateTracker {
    table: String,
    current: RwLock<Arc<TrackedSchema>>,
    refresh_lock: Mutex<()>,
    loader: Arc<dyn SchemaLoader>,
    fetch_timeout: Duration,
    fetches: AtomicU64,
}

impl SchemaUpdateTracker {
    pub fn new(
        table: impl Into<String>,
        description: TableSchemaDescription,
        loader: Arc<dyn SchemaLoader>,
        options: &ReaderOptions,
    ) -> Result<Self, ColbindError> {
        let table = table.into();
        if description.table() != table {
            return Err(ColbindError::TableMismatch {
                expected: table,
                actual: description.table().to_string(),
            });
        }
        if description.column_count() == 0 {
            return Err(ColbindError::EmptySchema { table });
        }
        let tracked = TrackedSchema::build(1, description)?;
        Ok(Self {
            table,
            current: RwLock::new(Arc::new(tracked)),
            refresh_lock: Mutex::new(()),
            loader,
            fetch_timeout: options.fetch_timeout,
            fetches: AtomicU64::new(0),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn current(&self) -> Arc<TrackedSchema> {
        self.current.read().clone()
    }

    pub fn current_description(&self) -> Arc<TableSchemaDescription> {
        self.current.read().description.clone()
    }

    /// Number of loader fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Fetches the live schema and installs it unconditionally.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Arc<TrackedSchema>, ColbindError> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled()),
            guard = self.refresh_lock.lock() => guard,
        };
        self.fetch_and_install(cancel).await
    }

    /// Refreshes unless a newer schema than `seen_version` was installed
    /// while waiting for the refresh lock, in which case that one is returned.
    pub async fn refresh_if_stale(
        &self,
        seen_version: u64,
        cancel: &CancellationToken,
    ) -> Result<Arc<TrackedSchema>, ColbindError> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled()),
            guard = self.refresh_lock.lock() => guard,
        };
        let current = self.current();
        if current.version > seen_version {
            debug!(
                table = %self.table,
                seen_version,
                version = current.version,
                "schema already refreshed by another reader"
            );
            return Ok(current);
        }
        self.fetch_and_install(cancel).await
    }

    async fn fetch_and_install(&self, cancel: &CancellationToken) -> Result<Arc<TrackedSchema>, ColbindError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        counter!("colbind_schema_refresh_total").increment(1);

        let fetch = tokio::time::timeout(self.fetch_timeout, self.loader.fetch_schema(&self.table));
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled()),
            result = fetch => result,
        };
        let description = match fetched {
            Ok(Ok(description)) => description,
            Ok(Err(err)) => {
                warn!(table = %self.table, "schema fetch failed: {err}");
                return Err(self.fetch_error(err.to_string()));
            }
            Err(_) => {
                warn!(table = %self.table, timeout = ?self.fetch_timeout, "schema fetch timed out");
                return Err(self.fetch_error(format!("timed out after {:?}", self.fetch_timeout)));
            }
        };
        if description.table() != self.table {
            return Err(self.fetch_error(format!(
                "loader returned schema for table {}",
                description.table()
            )));
        }
        if description.column_count() == 0 {
            return Err(self.fetch_error("loader returned a schema without columns".into()));
        }

        // The refresh lock is held, so no other writer can bump the version.
        let version = self.current().version + 1;
        let tracked = Arc::new(TrackedSchema::build(version, description)?);
        *self.current.write() = tracked.clone();
        info!(
            table = %self.table,
            version,
            columns = tracked.column_count(),
            "installed refreshed schema"
        );
        Ok(tracked)
    }

    fn fetch_error(&self, reason: String) -> ColbindError {
        ColbindError::SchemaFetch {
            table: self.table.clone(),
            reason,
        }
    }

    fn cancelled(&self) -> ColbindError {
        ColbindError::Cancelled {
            table: self.table.clone(),
        }
    }
}
