use crate::options::{ErrorPolicy, ReaderOptions};
use crate::tracker::{SchemaUpdateTracker, TrackedSchema};
use colbind_core::block::{Block, Cell};
use colbind_core::error::ColbindError;
use colbind_protocol::codec::decode_envelope;
use colbind_protocol::messages::BatchEnvelope;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    Decoding,
    SchemaCheck,
    Refreshing,
    RowApplying,
    Done,
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadPhase::Decoding => "decoding",
            ReadPhase::SchemaCheck => "schema_check",
            ReadPhase::Refreshing => "refreshing",
            ReadPhase::RowApplying => "row_applying",
            ReadPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of one batch applied to a block.
#[derive(Debug)]
pub struct BatchSummary {
    pub table: String,
    pub shard: String,
    pub rows_applied: usize,
    /// Row errors stepped over under [`ErrorPolicy::SkipRow`].
    pub skipped: Vec<ColbindError>,
    pub schema_version: u64,
    pub refreshed: bool,
}

#[derive(Debug)]
pub struct LoadedBatch {
    pub summary: BatchSummary,
    pub block: Block,
}

impl LoadedBatch {
    pub fn rows(&self) -> usize {
        self.block.rows()
    }
}

/// Turns insert envelopes into columnar blocks for one table.
pub struct BatchReader {
    tracker: Arc<SchemaUpdateTracker>,
    options: ReaderOptions,
}

impl BatchReader {
    pub fn new(tracker: Arc<SchemaUpdateTracker>, options: ReaderOptions) -> Self {
        Self { tracker, options }
    }

    pub async fn read(&self, payload: &[u8]) -> Result<LoadedBatch, ColbindError> {
        self.read_with_cancel(payload, &CancellationToken::new()).await
    }

    pub async fn read_with_cancel(
        &self,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<LoadedBatch, ColbindError> {
        let mut block = Block::new();
        let summary = self.read_into(payload, &mut block, cancel).await?;
        Ok(LoadedBatch { summary, block })
    }

    /// Decodes `payload` and appends its rows to `block`.
    ///
    /// An empty block is reshaped to the active schema first. A block that
    /// already holds rows must match that schema exactly.
    pub async fn read_into(
        &self,
        payload: &[u8],
        block: &mut Block,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, ColbindError> {
        counter!("colbind_batches_total").increment(1);
        let envelope = decode_envelope(payload).map_err(|err| {
            self.record_failure(ReadPhase::Decoding, &err);
            err
        })?;
        self.apply_recorded(&envelope, block, cancel).await
    }

    /// Same as [`read_into`](Self::read_into) for an already decoded envelope.
    pub async fn apply_envelope(
        &self,
        envelope: &BatchEnvelope,
        block: &mut Block,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, ColbindError> {
        counter!("colbind_batches_total").increment(1);
        self.apply_recorded(envelope, block, cancel).await
    }

    async fn apply_recorded(
        &self,
        envelope: &BatchEnvelope,
        block: &mut Block,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, ColbindError> {
        let result = self.apply_inner(envelope, block, cancel).await;
        if let Err(err) = &result {
            self.record_failure(failed_phase(err), err);
        }
        result
    }

    async fn apply_inner(
        &self,
        envelope: &BatchEnvelope,
        block: &mut Block,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, ColbindError> {
        if envelope.table != self.tracker.table() {
            return Err(ColbindError::TableMismatch {
                expected: self.tracker.table().to_string(),
                actual: envelope.table.clone(),
            });
        }

        let (schema, refreshed) = self.validated_schema(envelope, cancel).await?;
        self.shape_block(&schema, block)?;

        let start = block.rows();
        let skipped = self.apply_rows(envelope, &schema, block, start)?;
        let rows_applied = block.rows() - start;

        counter!("colbind_rows_applied_total").increment(rows_applied as u64);
        counter!("colbind_rows_skipped_total").increment(skipped.len() as u64);
        debug!(
            table = %envelope.table,
            shard = %envelope.shard,
            phase = %ReadPhase::Done,
            rows = rows_applied,
            skipped = skipped.len(),
            version = schema.version(),
            "batch applied"
        );
        Ok(BatchSummary {
            table: envelope.table.clone(),
            shard: envelope.shard.clone(),
            rows_applied,
            skipped,
            schema_version: schema.version(),
            refreshed,
        })
    }

    /// Returns a schema every row's arity agrees with, refreshing at most once.
    async fn validated_schema(
        &self,
        envelope: &BatchEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(Arc<TrackedSchema>, bool), ColbindError> {
        let schema = self.tracker.current();
        let Some((row, actual)) = arity_mismatch(envelope, schema.column_count()) else {
            return Ok((schema, false));
        };

        warn!(
            table = %envelope.table,
            shard = %envelope.shard,
            phase = %ReadPhase::SchemaCheck,
            row,
            actual,
            expected = schema.column_count(),
            version = schema.version(),
            "row arity differs from tracked schema, refreshing"
        );
        let schema = self.tracker.refresh_if_stale(schema.version(), cancel).await?;
        debug!(
            table = %envelope.table,
            phase = %ReadPhase::Refreshing,
            version = schema.version(),
            "schema refreshed"
        );

        if let Some((row, actual)) = arity_mismatch(envelope, schema.column_count()) {
            return Err(ColbindError::PersistentSchemaMismatch {
                table: envelope.table.clone(),
                row,
                expected: schema.column_count(),
                actual,
            });
        }
        Ok((schema, true))
    }

    fn shape_block(&self, schema: &TrackedSchema, block: &mut Block) -> Result<(), ColbindError> {
        if block.matches_schema(schema.description()) {
            return Ok(());
        }
        if block.is_empty() {
            *block = schema.empty_block()?;
            return Ok(());
        }
        Err(ColbindError::BlockShapeMismatch {
            expected: schema.empty_block()?.structure(),
            actual: block.structure(),
        })
    }

    fn apply_rows(
        &self,
        envelope: &BatchEnvelope,
        schema: &TrackedSchema,
        block: &mut Block,
        start: usize,
    ) -> Result<Vec<ColbindError>, ColbindError> {
        let columns = schema.description().columns();
        let mut skipped = Vec::new();

        for (row, binding) in envelope.rows.iter().enumerate() {
            let committed = binding
                .values
                .iter()
                .zip(schema.serializers())
                .zip(columns)
                .map(|((value, serializer), column)| {
                    serializer.convert(value).map_err(|source| ColbindError::Row {
                        table: envelope.table.clone(),
                        shard: envelope.shard.clone(),
                        row,
                        column: column.name.clone(),
                        source: Box::new(source),
                    })
                })
                .collect::<Result<Vec<Cell>, ColbindError>>()
                .and_then(|cells| block.append_row(cells));

            match committed {
                Ok(()) => {}
                Err(err) if self.options.error_policy == ErrorPolicy::SkipRow && err.is_row_scoped() => {
                    debug!(
                        table = %envelope.table,
                        shard = %envelope.shard,
                        row,
                        "skipping row: {err}"
                    );
                    skipped.push(err);
                }
                Err(err) => {
                    block.truncate(start);
                    return Err(err);
                }
            }
        }
        Ok(skipped)
    }

    fn record_failure(&self, phase: ReadPhase, err: &ColbindError) {
        counter!("colbind_batch_failures_total").increment(1);
        warn!(table = %self.tracker.table(), %phase, "batch failed: {err}");
    }
}

pub(crate) fn failed_phase(err: &ColbindError) -> ReadPhase {
    match err {
        ColbindError::MalformedEnvelope(_) => ReadPhase::Decoding,
        ColbindError::TableMismatch { .. }
        | ColbindError::PersistentSchemaMismatch { .. }
        | ColbindError::BlockShapeMismatch { .. } => ReadPhase::SchemaCheck,
        ColbindError::SchemaFetch { .. }
        | ColbindError::Cancelled { .. }
        | ColbindError::EmptySchema { .. }
        | ColbindError::SchemaParse { .. }
        | ColbindError::UnsupportedType(_) => ReadPhase::Refreshing,
        _ => ReadPhase::RowApplying,
    }
}

/// First row whose value count differs from `expected`.
fn arity_mismatch(envelope: &BatchEnvelope, expected: usize) -> Option<(usize, usize)> {
    envelope
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != expected)
        .map(|(row, binding)| (row, binding.len()))
}
