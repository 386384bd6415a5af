use colbind_core::catalog::SchemaCatalog;
use colbind_core::schema::{ColumnDefinition, TableSchemaDescription};
use colbind_core::types::ScalarValue;
use colbind_ingest::{BatchReader, CatalogSchemaLoader, ReaderOptions, SchemaUpdateTracker};
use colbind_protocol::codec::encode_envelope;
use colbind_protocol::messages::BatchEnvelope;
use criterion::{criterion_group, criterion_main, Criterion};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn reader_read_bench(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let defs = [
        ColumnDefinition::new("Counter", "UInt64"),
        ColumnDefinition::new("Host", "FixedString(12)"),
        ColumnDefinition::new("Colo", "FixedString(12)"),
        ColumnDefinition::new("FlightDate", "Date"),
    ];
    let description = TableSchemaDescription::from_definitions("simple_event_16", &defs).expect("schema");
    let mut catalog = SchemaCatalog::new();
    catalog.create_table(description.clone()).expect("create");
    let loader = Arc::new(CatalogSchemaLoader::new(Arc::new(RwLock::new(catalog))));
    let options = ReaderOptions::default();
    let tracker = SchemaUpdateTracker::new("simple_event_16", description, loader, &options).expect("tracker");
    let reader = BatchReader::new(Arc::new(tracker), options);

    let mut envelope = BatchEnvelope::new("simple_event_16", "bench", "");
    for i in 0..1024 {
        envelope.push_row(vec![
            ScalarValue::Int(i),
            ScalarValue::string(format!("host{i}")),
            ScalarValue::string("colo"),
            ScalarValue::Timestamp(i * 86_400_000),
        ]);
    }
    let payload = encode_envelope(&envelope).expect("encode");

    c.bench_function("reader_read_1024_rows", |b| {
        b.to_async(&rt).iter(|| async {
            let batch = reader.read(&payload).await.expect("read");
            assert_eq!(batch.rows(), 1024);
        });
    });
}

criterion_group!(reader_benches, reader_read_bench);
criterion_main!(reader_benches);
