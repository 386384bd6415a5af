use colbind_core::types::{BindingRow, ScalarValue};

/// Leading byte of every framed batch envelope.
pub const ENVELOPE_TAG: u8 = b'B';

/// Value kind bytes inside a row binding.
pub mod kind {
    pub const NULL: u8 = 0;
    pub const INT: u8 = 1;
    pub const UINT: u8 = 2;
    pub const FLOAT: u8 = 3;
    pub const STRING: u8 = 4;
    pub const TIMESTAMP: u8 = 5;
}

/// A batch of positionally bound insert rows for one table on one shard.
///
/// `sql` is carried for diagnostics only; column order comes from the
/// tracked table schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchEnvelope {
    pub table: String,
    pub shard: String,
    pub sql: String,
    pub rows: Vec<BindingRow>,
}

impl BatchEnvelope {
    pub fn new(table: impl Into<String>, shard: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            shard: shard.into(),
            sql: sql.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, values: Vec<ScalarValue>) -> Self {
        self.rows.push(BindingRow::new(values));
        self
    }

    pub fn push_row(&mut self, values: Vec<ScalarValue>) {
        self.rows.push(BindingRow::new(values));
    }
}
