#[cfg(test)]
mod tests {
    use crate::loader::{CatalogSchemaLoader, LoaderError, SchemaFuture, SchemaLoader};
    use crate::options::{ErrorPolicy, ReaderOptions};
    use crate::reader::{failed_phase, BatchReader, ReadPhase};
    use crate::tracker::SchemaUpdateTracker;
    use colbind_core::block::{Block, Cell};
    use colbind_core::catalog::SchemaCatalog;
    use colbind_core::error::ColbindError;
    use colbind_core::helper::block_definition;
    use colbind_core::schema::{ColumnDefinition, TableSchemaDescription};
    use colbind_core::types::ScalarValue;
    use colbind_protocol::codec::encode_envelope;
    use colbind_protocol::messages::BatchEnvelope;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TABLE: &str = "simple_event_16";
    const SHARD: &str = "nudata.monstor.cdc.dev.marketing.1";

    const EVENT_COLUMNS: [(&str, &str); 3] = [
        ("Counter", "UInt64"),
        ("Host", "FixedString(12)"),
        ("Colo", "FixedString(12)"),
    ];

    const DATED_COLUMNS: [(&str, &str); 4] = [
        ("Counter", "UInt64"),
        ("Host", "FixedString(12)"),
        ("Colo", "FixedString(12)"),
        ("FlightDate", "Date"),
    ];

    fn description(columns: &[(&str, &str)]) -> TableSchemaDescription {
        let defs: Vec<ColumnDefinition> = columns
            .iter()
            .map(|(name, declared)| ColumnDefinition::new(*name, *declared))
            .collect();
        TableSchemaDescription::from_definitions(TABLE, &defs).expect("description")
    }

    fn envelope(rows: Vec<Vec<ScalarValue>>) -> BatchEnvelope {
        let mut envelope = BatchEnvelope::new(TABLE, SHARD, "insert into simple_event_16 values(?, ?, ?)");
        for row in rows {
            envelope.push_row(row);
        }
        envelope
    }

    fn frame(envelope: &BatchEnvelope) -> Vec<u8> {
        encode_envelope(envelope).expect("encode").to_vec()
    }

    fn event_row(counter: i64, host: &str, colo: &str) -> Vec<ScalarValue> {
        vec![
            ScalarValue::Int(counter),
            ScalarValue::string(host),
            ScalarValue::string(colo),
        ]
    }

    fn padded(value: &str) -> Cell {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(12, 0);
        Cell::FixedString(bytes)
    }

    /// Delegates to a catalog and counts fetches, optionally after a delay.
    struct CountingLoader {
        inner: CatalogSchemaLoader,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl SchemaLoader for CountingLoader {
        fn fetch_schema<'a>(&'a self, table: &'a str) -> SchemaFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.inner.fetch_schema(table).await
            })
        }
    }

    /// Never answers.
    struct StalledLoader;

    impl SchemaLoader for StalledLoader {
        fn fetch_schema<'a>(&'a self, _table: &'a str) -> SchemaFuture<'a> {
            Box::pin(std::future::pending::<Result<TableSchemaDescription, LoaderError>>())
        }
    }

    /// Answers every request with a schema for a different table.
    struct MisroutedLoader;

    impl SchemaLoader for MisroutedLoader {
        fn fetch_schema<'a>(&'a self, _table: &'a str) -> SchemaFuture<'a> {
            Box::pin(async {
                let defs = [ColumnDefinition::new("id", "UInt8")];
                TableSchemaDescription::from_definitions("other", &defs)
                    .map_err(|err| LoaderError::Unreachable(err.to_string()))
            })
        }
    }

    /// Keeps every counter by name so tests can read totals back.
    #[derive(Default)]
    struct CounterRecorder {
        counters: parking_lot::Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl CounterRecorder {
        fn total(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .get(name)
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    impl Recorder for CounterRecorder {
        fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
        fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
        fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
            let cell = self
                .counters
                .lock()
                .entry(key.name().to_string())
                .or_default()
                .clone();
            Counter::from_arc(cell)
        }

        fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    struct Harness {
        catalog: Arc<RwLock<SchemaCatalog>>,
        loader: Arc<CountingLoader>,
        tracker: Arc<SchemaUpdateTracker>,
        reader: BatchReader,
    }

    fn harness_with(
        tracked: &[(&str, &str)],
        live: Option<&[(&str, &str)]>,
        options: ReaderOptions,
        delay: Duration,
    ) -> Harness {
        let mut catalog = SchemaCatalog::new();
        if let Some(live) = live {
            catalog.create_table(description(live)).expect("create");
        }
        let catalog = Arc::new(RwLock::new(catalog));
        let loader = Arc::new(CountingLoader {
            inner: CatalogSchemaLoader::new(catalog.clone()),
            calls: AtomicUsize::new(0),
            delay,
        });
        let tracker = Arc::new(
            SchemaUpdateTracker::new(TABLE, description(tracked), loader.clone(), &options).expect("tracker"),
        );
        let reader = BatchReader::new(tracker.clone(), options);
        Harness {
            catalog,
            loader,
            tracker,
            reader,
        }
    }

    fn harness(tracked: &[(&str, &str)], live: &[(&str, &str)]) -> Harness {
        harness_with(tracked, Some(live), ReaderOptions::default(), Duration::ZERO)
    }

    fn stalled_tracker(fetch_timeout: Duration) -> Arc<SchemaUpdateTracker> {
        let options = ReaderOptions {
            fetch_timeout,
            ..ReaderOptions::default()
        };
        Arc::new(
            SchemaUpdateTracker::new(TABLE, description(&EVENT_COLUMNS), Arc::new(StalledLoader), &options)
                .expect("tracker"),
        )
    }

    #[tokio::test]
    async fn single_row_with_exact_fixed_strings() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let payload = frame(&envelope(vec![event_row(123456, "abc12345zzzz", "xyz12345zzzz")]));

        let batch = h.reader.read(&payload).await.expect("read");
        assert_eq!(batch.rows(), 1);
        assert_eq!(batch.summary.rows_applied, 1);
        assert_eq!(batch.summary.shard, SHARD);
        assert!(!batch.summary.refreshed);
        assert_eq!(batch.summary.schema_version, 1);

        let block = &batch.block;
        assert_eq!(block.dump_names(), "Counter, Host, Colo");
        assert_eq!(block.column_at(0).and_then(|c| c.cell(0)), Some(Cell::UInt64(123456)));
        assert_eq!(
            block.column("Host").and_then(|c| c.cell(0)),
            Some(Cell::FixedString(b"abc12345zzzz".to_vec()))
        );
        assert_eq!(
            block.column("Colo").and_then(|c| c.cell(0)),
            Some(Cell::FixedString(b"xyz12345zzzz".to_vec()))
        );
        assert_eq!(h.tracker.fetch_count(), 0);
    }

    #[tokio::test]
    async fn small_timestamps_land_on_day_zero() {
        let h = harness(&DATED_COLUMNS, &DATED_COLUMNS);
        let rows = (0..3)
            .map(|i| {
                let mut row = event_row(123456 + i, "abc12345zzzz", "xyz12345zzzz");
                row.push(ScalarValue::Timestamp(10));
                row
            })
            .collect();

        let batch = h.reader.read(&frame(&envelope(rows))).await.expect("read");
        assert_eq!(batch.rows(), 3);
        let dates = batch.block.column("FlightDate").expect("date column");
        for row in 0..3 {
            assert_eq!(dates.cell(row), Some(Cell::Date(0)));
        }
        assert_eq!(
            batch.block.dump_structure(),
            "Counter UInt64 UInt64(size = 3), Host FixedString(12) FixedString(size = 3), \
             Colo FixedString(12) FixedString(size = 3), FlightDate Date Date(size = 3)"
        );
    }

    #[tokio::test]
    async fn short_strings_are_zero_padded() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let rows = vec![
            event_row(1, "abc", "xyz"),
            event_row(2, "abc123", "xyz123"),
            event_row(3, "abc1234", "xyz1234"),
        ];

        let batch = h.reader.read(&frame(&envelope(rows))).await.expect("read");
        let hosts = batch.block.column("Host").expect("host");
        assert_eq!(hosts.cell(0), Some(padded("abc")));
        assert_eq!(hosts.cell(1), Some(padded("abc123")));
        assert_eq!(hosts.cell(2), Some(padded("abc1234")));
        let colos = batch.block.column("Colo").expect("colo");
        assert_eq!(colos.cell(2), Some(padded("xyz1234")));
    }

    #[tokio::test]
    async fn drifted_schema_is_refreshed_once() {
        let h = harness(&EVENT_COLUMNS, &DATED_COLUMNS);
        let mut row = event_row(7, "host", "colo");
        row.push(ScalarValue::Timestamp(1_593_475_200_000));
        let payload = frame(&envelope(vec![row.clone(), row]));

        let batch = h.reader.read(&payload).await.expect("read");
        assert!(batch.summary.refreshed);
        assert_eq!(batch.summary.schema_version, 2);
        assert_eq!(batch.rows(), 2);
        assert_eq!(
            batch.block.column("FlightDate").and_then(|c| c.cell(1)),
            Some(Cell::Date(18_443))
        );
        assert_eq!(h.tracker.fetch_count(), 1);
        assert_eq!(h.tracker.current_description().column_count(), 4);

        let again = h.reader.read(&payload).await.expect("read");
        assert!(!again.summary.refreshed);
        assert_eq!(h.tracker.fetch_count(), 1);
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn altered_table_is_picked_up_on_next_batch() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let first = frame(&envelope(vec![event_row(1, "a", "b")]));
        h.reader.read(&first).await.expect("first");

        h.catalog.write().replace_table(description(&DATED_COLUMNS));
        let mut row = event_row(2, "c", "d");
        row.push(ScalarValue::Timestamp(86_400_000));
        let batch = h.reader.read(&frame(&envelope(vec![row]))).await.expect("second");
        assert!(batch.summary.refreshed);
        assert_eq!(batch.block.dump_names(), "Counter, Host, Colo, FlightDate");
        assert_eq!(
            batch.block.column("FlightDate").and_then(|c| c.cell(0)),
            Some(Cell::Date(1))
        );

        let err = h.reader.read(&first).await.unwrap_err();
        assert!(matches!(err, ColbindError::PersistentSchemaMismatch { .. }));
        assert_eq!(h.tracker.fetch_count(), 2);
    }

    #[tokio::test]
    async fn mismatch_surviving_refresh_is_persistent() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let mut wide = event_row(1, "a", "b");
        wide.push(ScalarValue::Null);
        let payload = frame(&envelope(vec![event_row(0, "a", "b"), wide]));

        let err = h.reader.read(&payload).await.unwrap_err();
        match err {
            ColbindError::PersistentSchemaMismatch {
                table,
                row,
                expected,
                actual,
            } => {
                assert_eq!(table, TABLE);
                assert_eq!(row, 1);
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.tracker.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_table_is_a_fetch_error() {
        let h = harness_with(&EVENT_COLUMNS, None, ReaderOptions::default(), Duration::ZERO);
        let err = h.tracker.refresh(&CancellationToken::new()).await.unwrap_err();
        match err {
            ColbindError::SchemaFetch { table, reason } => {
                assert_eq!(table, TABLE);
                assert!(reason.contains("not found"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.tracker.current().version(), 1);
    }

    #[tokio::test]
    async fn schema_for_another_table_is_rejected() {
        let options = ReaderOptions::default();
        let tracker = SchemaUpdateTracker::new(
            TABLE,
            description(&EVENT_COLUMNS),
            Arc::new(MisroutedLoader),
            &options,
        )
        .expect("tracker");
        let err = tracker.refresh(&CancellationToken::new()).await.unwrap_err();
        match err {
            ColbindError::SchemaFetch { reason, .. } => assert!(reason.contains("other"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tracker.current().version(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out() {
        let tracker = stalled_tracker(Duration::from_millis(50));
        let err = tracker.refresh(&CancellationToken::new()).await.unwrap_err();
        match err {
            ColbindError::SchemaFetch { reason, .. } => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tracker.fetch_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_refresh() {
        let tracker = stalled_tracker(Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let err = tracker.refresh(&token).await.unwrap_err();
        assert!(matches!(err, ColbindError::Cancelled { ref table } if table == TABLE));
        assert_eq!(tracker.fetch_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_inflight_fetch() {
        let tracker = stalled_tracker(Duration::from_secs(60));
        let reader = BatchReader::new(tracker.clone(), ReaderOptions::default());
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                token.cancel();
            })
        };

        let mut wide = event_row(1, "a", "b");
        wide.push(ScalarValue::Null);
        let err = reader
            .read_with_cancel(&frame(&envelope(vec![wide])), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ColbindError::Cancelled { .. }));
        assert_eq!(tracker.fetch_count(), 1);
        assert_eq!(tracker.current().version(), 1);
        canceller.await.expect("join");
    }

    #[tokio::test]
    async fn skip_row_policy_keeps_going() {
        let options = ReaderOptions {
            error_policy: ErrorPolicy::SkipRow,
            ..ReaderOptions::default()
        };
        let h = harness_with(&EVENT_COLUMNS, Some(&EVENT_COLUMNS[..]), options, Duration::ZERO);
        let rows = vec![
            event_row(1, "a", "b"),
            event_row(2, "much-too-long-host", "b"),
            vec![ScalarValue::Null, ScalarValue::string("c"), ScalarValue::string("d")],
            event_row(4, "e", "f"),
        ];

        let batch = h.reader.read(&frame(&envelope(rows))).await.expect("read");
        assert_eq!(batch.rows(), 2);
        assert_eq!(batch.summary.rows_applied, 2);
        assert_eq!(batch.summary.skipped.len(), 2);
        match &batch.summary.skipped[0] {
            ColbindError::Row {
                row, column, source, ..
            } => {
                assert_eq!(*row, 1);
                assert_eq!(column, "Host");
                assert!(matches!(
                    **source,
                    ColbindError::FixedStringOverflow {
                        length: 18,
                        capacity: 12
                    }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match &batch.summary.skipped[1] {
            ColbindError::Row { row, column, source, .. } => {
                assert_eq!(*row, 2);
                assert_eq!(column, "Counter");
                assert!(matches!(**source, ColbindError::NullNotAllowed { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(batch.block.column("Counter").and_then(|c| c.cell(1)), Some(Cell::UInt64(4)));
        for column in batch.block.columns() {
            assert_eq!(column.len(), 2, "column {}", column.name);
        }
    }

    #[tokio::test]
    async fn abort_rolls_block_back_to_batch_start() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let token = CancellationToken::new();
        let mut block = Block::new();

        let first = frame(&envelope(vec![event_row(1, "a", "b")]));
        let summary = h.reader.read_into(&first, &mut block, &token).await.expect("first");
        assert_eq!(summary.rows_applied, 1);

        let second = frame(&envelope(vec![
            event_row(2, "c", "d"),
            event_row(-3, "e", "f"),
            event_row(4, "g", "h"),
        ]));
        let err = h.reader.read_into(&second, &mut block, &token).await.unwrap_err();
        match err {
            ColbindError::Row {
                table,
                shard,
                row,
                column,
                source,
            } => {
                assert_eq!(table, TABLE);
                assert_eq!(shard, SHARD);
                assert_eq!(row, 1);
                assert_eq!(column, "Counter");
                assert!(matches!(*source, ColbindError::NumericOverflow { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(block.rows(), 1);
        for column in block.columns() {
            assert_eq!(column.len(), 1, "column {}", column.name);
        }
        assert_eq!(block.column("Host").and_then(|c| c.cell(0)), Some(padded("a")));
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let mut payload = frame(&envelope(vec![event_row(1, "a", "b")]));
        payload.truncate(payload.len() - 3);
        let err = h.reader.read(&payload).await.unwrap_err();
        assert!(matches!(err, ColbindError::MalformedEnvelope(_)));
        assert!(matches!(
            h.reader.read(&[]).await.unwrap_err(),
            ColbindError::MalformedEnvelope(_)
        ));
    }

    #[tokio::test]
    async fn envelope_for_other_table_is_rejected() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let other = BatchEnvelope::new("other_table", SHARD, "").with_row(event_row(1, "a", "b"));
        let err = h.reader.read(&frame(&other)).await.unwrap_err();
        match err {
            ColbindError::TableMismatch { expected, actual } => {
                assert_eq!(expected, TABLE);
                assert_eq!(actual, "other_table");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.tracker.fetch_count(), 0);
    }

    #[tokio::test]
    async fn block_shape_is_checked_before_appending() {
        let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
        let token = CancellationToken::new();
        let payload = frame(&envelope(vec![event_row(1, "a", "b")]));

        let defs = [ColumnDefinition::new("id", "UInt8")];
        let mut reshaped = block_definition(&defs).expect("block");
        h.reader
            .read_into(&payload, &mut reshaped, &token)
            .await
            .expect("empty block is reshaped");
        assert_eq!(reshaped.dump_names(), "Counter, Host, Colo");

        let mut occupied = block_definition(&defs).expect("block");
        occupied.append_row(vec![Cell::UInt8(9)]).expect("row");
        let err = h.reader.read_into(&payload, &mut occupied, &token).await.unwrap_err();
        assert!(matches!(err, ColbindError::BlockShapeMismatch { .. }));
        assert_eq!(occupied.rows(), 1);
    }

    #[test]
    fn tracker_rejects_description_without_columns() {
        let loader = Arc::new(StalledLoader);
        let result = SchemaUpdateTracker::new(
            TABLE,
            TableSchemaDescription::new(TABLE),
            loader,
            &ReaderOptions::default(),
        );
        match result {
            Err(ColbindError::EmptySchema { table }) => assert_eq!(table, TABLE),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("tracker accepted a schema without columns"),
        }
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_batch() {
        let h = harness_with(&EVENT_COLUMNS, None, ReaderOptions::default(), Duration::ZERO);
        let mut wide = event_row(1, "a", "b");
        wide.push(ScalarValue::Timestamp(0));
        let payload = frame(&envelope(vec![wide]));

        let mut block = Block::new();
        let err = h
            .reader
            .read_into(&payload, &mut block, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ColbindError::SchemaFetch { table, reason } => {
                assert_eq!(table, TABLE);
                assert!(reason.contains("not found"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(block.is_empty());
        assert_eq!(block.column_count(), 0);
        assert_eq!(h.tracker.fetch_count(), 1);
        assert_eq!(h.tracker.current().version(), 1);
    }

    #[test]
    fn every_batch_attempt_is_counted_once() {
        let recorder = CounterRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            rt.block_on(async {
                let h = harness(&EVENT_COLUMNS, &EVENT_COLUMNS);
                let good = frame(&envelope(vec![event_row(1, "a", "b"), event_row(2, "c", "d")]));
                h.reader.read(&good).await.expect("read");
                assert!(h.reader.read(&[0xff]).await.is_err());

                let mut block = Block::new();
                let decoded = envelope(vec![event_row(-1, "a", "b")]);
                assert!(h
                    .reader
                    .apply_envelope(&decoded, &mut block, &CancellationToken::new())
                    .await
                    .is_err());
            });
        });
        assert_eq!(recorder.total("colbind_batches_total"), 3);
        assert_eq!(recorder.total("colbind_batch_failures_total"), 2);
        assert_eq!(recorder.total("colbind_rows_applied_total"), 2);
    }

    #[test]
    fn failures_are_attributed_to_their_phase() {
        let cases = [
            (ColbindError::MalformedEnvelope("short".into()), ReadPhase::Decoding),
            (
                ColbindError::BlockShapeMismatch {
                    expected: "a UInt8".into(),
                    actual: "b String".into(),
                },
                ReadPhase::SchemaCheck,
            ),
            (
                ColbindError::TableMismatch {
                    expected: "a".into(),
                    actual: "b".into(),
                },
                ReadPhase::SchemaCheck,
            ),
            (
                ColbindError::SchemaParse {
                    declared: "X".into(),
                    reason: "bad".into(),
                },
                ReadPhase::Refreshing,
            ),
            (ColbindError::UnsupportedType("Map".into()), ReadPhase::Refreshing),
            (
                ColbindError::SchemaFetch {
                    table: "a".into(),
                    reason: "down".into(),
                },
                ReadPhase::Refreshing,
            ),
            (
                ColbindError::NullNotAllowed {
                    expected: "UInt8".into(),
                },
                ReadPhase::RowApplying,
            ),
        ];
        for (err, phase) in cases {
            assert_eq!(failed_phase(&err), phase, "{err}");
        }
    }

    #[test]
    fn tracker_rejects_description_for_other_table() {
        let defs = [ColumnDefinition::new("id", "UInt8")];
        let other = TableSchemaDescription::from_definitions("other", &defs).expect("other");
        let loader = Arc::new(StalledLoader);
        let result = SchemaUpdateTracker::new(TABLE, other, loader, &ReaderOptions::default());
        assert!(matches!(result, Err(ColbindError::TableMismatch { .. })));
    }

    #[tokio::test]
    async fn snapshots_survive_refresh() {
        let h = harness(&EVENT_COLUMNS, &DATED_COLUMNS);
        let before = h.tracker.current();
        let after = h.tracker.refresh(&CancellationToken::new()).await.expect("refresh");
        assert_eq!(before.version(), 1);
        assert_eq!(before.column_count(), 3);
        assert_eq!(after.version(), 2);
        assert_eq!(after.column_count(), 4);
        assert_eq!(h.tracker.current().version(), 2);
        assert_eq!(after.empty_block().expect("block").column_count(), 4);
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_refresh() {
        let h = harness_with(
            &EVENT_COLUMNS,
            Some(&DATED_COLUMNS[..]),
            ReaderOptions::default(),
            Duration::from_millis(20),
        );
        let mut row = event_row(1, "a", "b");
        row.push(ScalarValue::Timestamp(0));
        let payload = frame(&envelope(vec![row]));

        let (left, right) = tokio::join!(h.reader.read(&payload), h.reader.read(&payload));
        let left = left.expect("left");
        let right = right.expect("right");
        assert_eq!(left.summary.schema_version, 2);
        assert_eq!(right.summary.schema_version, 2);
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.tracker.fetch_count(), 1);
    }

    #[tokio::test]
    async fn refresh_if_stale_skips_fetch_when_newer_installed() {
        let h = harness(&EVENT_COLUMNS, &DATED_COLUMNS);
        let token = CancellationToken::new();
        h.tracker.refresh(&token).await.expect("refresh");
        let current = h.tracker.refresh_if_stale(1, &token).await.expect("stale");
        assert_eq!(current.version(), 2);
        assert_eq!(h.tracker.fetch_count(), 1);
        let next = h.tracker.refresh_if_stale(2, &token).await.expect("fresh");
        assert_eq!(next.version(), 3);
        assert_eq!(h.tracker.fetch_count(), 2);
    }
}
