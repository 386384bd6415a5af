use crate::config::Config;
use colbind_core::block::Block;
use colbind_core::catalog::SchemaCatalog;
use colbind_core::helper;
use colbind_ingest::{BatchReader, CatalogSchemaLoader, SchemaUpdateTracker};
use colbind_protocol::frame::{read_envelope, DEFAULT_MAX_FRAME_BYTES};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn describe(config: &Config) -> anyhow::Result<()> {
    for table in &config.tables {
        let (serializers, block) = helper::serializers_and_block(&table.columns)?;
        info!("table {} ({} columns)", table.name, serializers.len());
        for (def, serializer) in table.columns.iter().zip(&serializers) {
            info!(
                column = %def.name,
                declared = %def.declared_type,
                family = serializer.family_name(),
                display = %serializer.display_name(),
                "column"
            );
        }
        info!("names: {}", block.dump_names());
        info!("structure: {}", block.dump_structure());
    }
    Ok(())
}

/// One reader per configured table, all backed by the same catalog.
pub fn build_readers(config: &Config) -> anyhow::Result<HashMap<String, BatchReader>> {
    let mut catalog = SchemaCatalog::new();
    for table in &config.tables {
        catalog.create_table(table.description()?)?;
    }
    let loader = Arc::new(CatalogSchemaLoader::new(Arc::new(RwLock::new(catalog))));
    let options = config.reader_options();

    let mut readers = HashMap::new();
    for table in &config.tables {
        let tracker = SchemaUpdateTracker::new(&table.name, table.description()?, loader.clone(), &options)?;
        readers.insert(
            table.name.clone(),
            BatchReader::new(Arc::new(tracker), options.clone()),
        );
    }
    Ok(readers)
}

pub async fn load(config: &Config, files: &[PathBuf], print_rows: bool) -> anyhow::Result<()> {
    let readers = build_readers(config)?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling pending schema fetches");
                cancel.cancel();
            }
        });
    }

    let mut total_rows = 0usize;
    for path in files {
        let file = tokio::fs::File::open(path).await?;
        let mut stream = BufReader::new(file);
        let mut batches = 0usize;
        while let Some(envelope) = read_envelope(&mut stream, DEFAULT_MAX_FRAME_BYTES).await? {
            let reader = readers
                .get(&envelope.table)
                .ok_or_else(|| anyhow::anyhow!("{}: no table {} configured", path.display(), envelope.table))?;
            let mut block = Block::new();
            let summary = reader.apply_envelope(&envelope, &mut block, &cancel).await?;
            batches += 1;
            total_rows += summary.rows_applied;
            info!(
                file = %path.display(),
                table = %summary.table,
                shard = %summary.shard,
                rows = summary.rows_applied,
                skipped = summary.skipped.len(),
                version = summary.schema_version,
                refreshed = summary.refreshed,
                "loaded batch"
            );
            for err in &summary.skipped {
                warn!("skipped row: {err}");
            }
            info!("structure: {}", block.dump_structure());
            if print_rows {
                println!("{}", block.dump_names());
                for row in 0..block.rows() {
                    if let Some(cells) = block.format_row(row) {
                        println!("{}", cells.join("\t"));
                    }
                }
            }
        }
        info!("{}: {} batches", path.display(), batches);
    }
    info!("loaded {} rows from {} files", total_rows, files.len());
    Ok(())
}
