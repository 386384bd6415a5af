pub mod loader;
pub mod options;
pub mod reader;
pub mod tracker;

pub use loader::{CatalogSchemaLoader, LoaderError, SchemaLoader};
pub use options::{ErrorPolicy, ReaderOptions};
pub use reader::{BatchReader, BatchSummary, LoadedBatch};
pub use tracker::{SchemaUpdateTracker, TrackedSchema};

#[cfg(test)]
mod tests;
