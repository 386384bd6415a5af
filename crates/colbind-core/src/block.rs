use crate::error::ColbindError;
use crate::schema::TableSchemaDescription;
use crate::types::{DataType, IntegerType};
use chrono::{DateTime, Days, NaiveDate};

/// One converted value, ready to be appended to a column of the matching type.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Vec<u8>),
    /// Already padded to the column's fixed length.
    FixedString(Vec<u8>),
    Date(u16),
    DateTime64(i64),
    Null,
}

impl Cell {
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::UInt8(_) => "UInt8",
            Cell::UInt16(_) => "UInt16",
            Cell::UInt32(_) => "UInt32",
            Cell::UInt64(_) => "UInt64",
            Cell::Int8(_) => "Int8",
            Cell::Int16(_) => "Int16",
            Cell::Int32(_) => "Int32",
            Cell::Int64(_) => "Int64",
            Cell::Float32(_) => "Float32",
            Cell::Float64(_) => "Float64",
            Cell::String(_) => "String",
            Cell::FixedString(_) => "FixedString",
            Cell::Date(_) => "Date",
            Cell::DateTime64(_) => "DateTime64",
            Cell::Null => "Null",
        }
    }
}

/// Append-only storage of one column, laid out the way the columnar store
/// expects it: fixed strings as one flat byte run, nullable columns as a
/// null map (1 = null) next to a nested column of equal length.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<Vec<u8>>),
    FixedString { length: usize, chars: Vec<u8> },
    Date(Vec<u16>),
    DateTime64 { precision: u8, ticks: Vec<i64> },
    Nullable { null_map: Vec<u8>, nested: Box<ColumnData> },
}

impl ColumnData {
    pub fn for_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Integer(int) => match int {
                IntegerType::UInt8 => ColumnData::UInt8(Vec::new()),
                IntegerType::UInt16 => ColumnData::UInt16(Vec::new()),
                IntegerType::UInt32 => ColumnData::UInt32(Vec::new()),
                IntegerType::UInt64 => ColumnData::UInt64(Vec::new()),
                IntegerType::Int8 => ColumnData::Int8(Vec::new()),
                IntegerType::Int16 => ColumnData::Int16(Vec::new()),
                IntegerType::Int32 => ColumnData::Int32(Vec::new()),
                IntegerType::Int64 => ColumnData::Int64(Vec::new()),
            },
            DataType::Float32 => ColumnData::Float32(Vec::new()),
            DataType::Float64 => ColumnData::Float64(Vec::new()),
            DataType::String => ColumnData::String(Vec::new()),
            DataType::FixedString(length) => ColumnData::FixedString {
                length: *length,
                chars: Vec::new(),
            },
            DataType::Date => ColumnData::Date(Vec::new()),
            DataType::DateTime64(precision) => ColumnData::DateTime64 {
                precision: *precision,
                ticks: Vec::new(),
            },
            DataType::Nullable(inner) => ColumnData::Nullable {
                null_map: Vec::new(),
                nested: Box::new(ColumnData::for_type(inner)),
            },
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::UInt8(_) => DataType::Integer(IntegerType::UInt8),
            ColumnData::UInt16(_) => DataType::Integer(IntegerType::UInt16),
            ColumnData::UInt32(_) => DataType::Integer(IntegerType::UInt32),
            ColumnData::UInt64(_) => DataType::Integer(IntegerType::UInt64),
            ColumnData::Int8(_) => DataType::Integer(IntegerType::Int8),
            ColumnData::Int16(_) => DataType::Integer(IntegerType::Int16),
            ColumnData::Int32(_) => DataType::Integer(IntegerType::Int32),
            ColumnData::Int64(_) => DataType::Integer(IntegerType::Int64),
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::String(_) => DataType::String,
            ColumnData::FixedString { length, .. } => DataType::FixedString(*length),
            ColumnData::Date(_) => DataType::Date,
            ColumnData::DateTime64 { precision, .. } => DataType::DateTime64(*precision),
            ColumnData::Nullable { nested, .. } => DataType::Nullable(Box::new(nested.data_type())),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::UInt8(v) => v.len(),
            ColumnData::UInt16(v) => v.len(),
            ColumnData::UInt32(v) => v.len(),
            ColumnData::UInt64(v) => v.len(),
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::FixedString { length, chars } => chars.len().checked_div(*length).unwrap_or(0),
            ColumnData::Date(v) => v.len(),
            ColumnData::DateTime64 { ticks, .. } => ticks.len(),
            ColumnData::Nullable { null_map, .. } => null_map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one cell. A cell of the wrong kind leaves the column untouched.
    pub fn push(&mut self, cell: Cell) -> Result<(), ColbindError> {
        match (self, cell) {
            (ColumnData::UInt8(v), Cell::UInt8(x)) => v.push(x),
            (ColumnData::UInt16(v), Cell::UInt16(x)) => v.push(x),
            (ColumnData::UInt32(v), Cell::UInt32(x)) => v.push(x),
            (ColumnData::UInt64(v), Cell::UInt64(x)) => v.push(x),
            (ColumnData::Int8(v), Cell::Int8(x)) => v.push(x),
            (ColumnData::Int16(v), Cell::Int16(x)) => v.push(x),
            (ColumnData::Int32(v), Cell::Int32(x)) => v.push(x),
            (ColumnData::Int64(v), Cell::Int64(x)) => v.push(x),
            (ColumnData::Float32(v), Cell::Float32(x)) => v.push(x),
            (ColumnData::Float64(v), Cell::Float64(x)) => v.push(x),
            (ColumnData::String(v), Cell::String(x)) => v.push(x),
            (ColumnData::FixedString { length, chars }, Cell::FixedString(x)) if *length > 0 && x.len() == *length => {
                chars.extend_from_slice(&x)
            }
            (ColumnData::Date(v), Cell::Date(x)) => v.push(x),
            (ColumnData::DateTime64 { ticks, .. }, Cell::DateTime64(x)) => ticks.push(x),
            (ColumnData::Nullable { null_map, nested }, Cell::Null) => {
                nested.push_default();
                null_map.push(1);
            }
            (ColumnData::Nullable { null_map, nested }, cell) => {
                nested.push(cell)?;
                null_map.push(0);
            }
            (column, cell) => {
                return Err(ColbindError::TypeMismatch {
                    expected: column.data_type().to_string(),
                    actual: cell.kind(),
                })
            }
        }
        Ok(())
    }

    /// Appends the placeholder value used under a null flag.
    pub fn push_default(&mut self) {
        match self {
            ColumnData::UInt8(v) => v.push(0),
            ColumnData::UInt16(v) => v.push(0),
            ColumnData::UInt32(v) => v.push(0),
            ColumnData::UInt64(v) => v.push(0),
            ColumnData::Int8(v) => v.push(0),
            ColumnData::Int16(v) => v.push(0),
            ColumnData::Int32(v) => v.push(0),
            ColumnData::Int64(v) => v.push(0),
            ColumnData::Float32(v) => v.push(0.0),
            ColumnData::Float64(v) => v.push(0.0),
            ColumnData::String(v) => v.push(Vec::new()),
            ColumnData::FixedString { length, chars } => chars.resize(chars.len() + *length, 0),
            ColumnData::Date(v) => v.push(0),
            ColumnData::DateTime64 { ticks, .. } => ticks.push(0),
            ColumnData::Nullable { null_map, nested } => {
                nested.push_default();
                null_map.push(1);
            }
        }
    }

    pub fn truncate(&mut self, rows: usize) {
        match self {
            ColumnData::UInt8(v) => v.truncate(rows),
            ColumnData::UInt16(v) => v.truncate(rows),
            ColumnData::UInt32(v) => v.truncate(rows),
            ColumnData::UInt64(v) => v.truncate(rows),
            ColumnData::Int8(v) => v.truncate(rows),
            ColumnData::Int16(v) => v.truncate(rows),
            ColumnData::Int32(v) => v.truncate(rows),
            ColumnData::Int64(v) => v.truncate(rows),
            ColumnData::Float32(v) => v.truncate(rows),
            ColumnData::Float64(v) => v.truncate(rows),
            ColumnData::String(v) => v.truncate(rows),
            ColumnData::FixedString { length, chars } => chars.truncate(rows * *length),
            ColumnData::Date(v) => v.truncate(rows),
            ColumnData::DateTime64 { ticks, .. } => ticks.truncate(rows),
            ColumnData::Nullable { null_map, nested } => {
                null_map.truncate(rows);
                nested.truncate(rows);
            }
        }
    }

    pub fn cell(&self, row: usize) -> Option<Cell> {
        match self {
            ColumnData::UInt8(v) => v.get(row).copied().map(Cell::UInt8),
            ColumnData::UInt16(v) => v.get(row).copied().map(Cell::UInt16),
            ColumnData::UInt32(v) => v.get(row).copied().map(Cell::UInt32),
            ColumnData::UInt64(v) => v.get(row).copied().map(Cell::UInt64),
            ColumnData::Int8(v) => v.get(row).copied().map(Cell::Int8),
            ColumnData::Int16(v) => v.get(row).copied().map(Cell::Int16),
            ColumnData::Int32(v) => v.get(row).copied().map(Cell::Int32),
            ColumnData::Int64(v) => v.get(row).copied().map(Cell::Int64),
            ColumnData::Float32(v) => v.get(row).copied().map(Cell::Float32),
            ColumnData::Float64(v) => v.get(row).copied().map(Cell::Float64),
            ColumnData::String(v) => v.get(row).cloned().map(Cell::String),
            ColumnData::FixedString { length, chars } => chars
                .get(row * length..(row + 1) * length)
                .map(|bytes| Cell::FixedString(bytes.to_vec())),
            ColumnData::Date(v) => v.get(row).copied().map(Cell::Date),
            ColumnData::DateTime64 { ticks, .. } => ticks.get(row).copied().map(Cell::DateTime64),
            ColumnData::Nullable { null_map, nested } => match null_map.get(row)? {
                0 => nested.cell(row),
                _ => Some(Cell::Null),
            },
        }
    }

    /// Renders a cell for diagnostics: dates as `YYYY-MM-DD`, timestamps as
    /// RFC 3339, byte strings with non-printable bytes escaped.
    pub fn format_cell(&self, row: usize) -> Option<String> {
        let cell = self.cell(row)?;
        let rendered = match (self, cell) {
            (_, Cell::Null) => "NULL".to_string(),
            (_, Cell::String(bytes)) | (_, Cell::FixedString(bytes)) => bytes.escape_ascii().to_string(),
            (_, Cell::Date(days)) => format_date(days),
            (ColumnData::DateTime64 { precision, .. }, Cell::DateTime64(ticks)) => {
                format_datetime64(ticks, *precision)
            }
            (ColumnData::Nullable { nested, .. }, Cell::DateTime64(ticks)) => match nested.as_ref() {
                ColumnData::DateTime64 { precision, .. } => format_datetime64(ticks, *precision),
                _ => ticks.to_string(),
            },
            (_, Cell::DateTime64(ticks)) => ticks.to_string(),
            (_, Cell::UInt8(x)) => x.to_string(),
            (_, Cell::UInt16(x)) => x.to_string(),
            (_, Cell::UInt32(x)) => x.to_string(),
            (_, Cell::UInt64(x)) => x.to_string(),
            (_, Cell::Int8(x)) => x.to_string(),
            (_, Cell::Int16(x)) => x.to_string(),
            (_, Cell::Int32(x)) => x.to_string(),
            (_, Cell::Int64(x)) => x.to_string(),
            (_, Cell::Float32(x)) => x.to_string(),
            (_, Cell::Float64(x)) => x.to_string(),
        };
        Some(rendered)
    }
}

fn format_date(days: u16) -> String {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_days(Days::new(u64::from(days))))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days.to_string())
}

fn format_datetime64(ticks: i64, precision: u8) -> String {
    let Some(nano_scale) = 9u32.checked_sub(u32::from(precision)).map(|exp| 10i64.pow(exp)) else {
        return ticks.to_string();
    };
    let scale = 10i64.pow(u32::from(precision));
    let secs = ticks.div_euclid(scale);
    let nanos = ticks.rem_euclid(scale) * nano_scale;
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ticks.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockColumn {
    pub name: String,
    pub data_type: DataType,
    pub data: ColumnData,
}

impl BlockColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let data = ColumnData::for_type(&data_type);
        Self {
            name: name.into(),
            data_type,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn cell(&self, row: usize) -> Option<Cell> {
        self.data.cell(row)
    }
}

/// In-memory columnar block handed to the store for bulk loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    columns: Vec<BlockColumn>,
}

impl Block {
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    pub fn push_column(&mut self, column: BlockColumn) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[BlockColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&BlockColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_at(&self, index: usize) -> Option<&BlockColumn> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map(BlockColumn::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Appends one row, one cell per column in column order. Either every
    /// column grows by one or, on error, none does.
    pub fn append_row(&mut self, cells: Vec<Cell>) -> Result<(), ColbindError> {
        if cells.len() != self.columns.len() {
            return Err(ColbindError::BlockShapeMismatch {
                expected: self.structure(),
                actual: format!("row of {} cells", cells.len()),
            });
        }
        let rows = self.rows();
        for (idx, cell) in cells.into_iter().enumerate() {
            if let Err(err) = self.columns[idx].data.push(cell) {
                for column in &mut self.columns[..idx] {
                    column.data.truncate(rows);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drops every row at index `rows` and beyond.
    pub fn truncate(&mut self, rows: usize) {
        for column in &mut self.columns {
            column.data.truncate(rows);
        }
    }

    /// `name Type` pairs, comma separated.
    pub fn structure(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn matches_schema(&self, description: &TableSchemaDescription) -> bool {
        self.columns.len() == description.column_count()
            && self
                .columns
                .iter()
                .zip(description.columns())
                .all(|(column, descriptor)| column.name == descriptor.name && column.data_type == descriptor.data_type)
    }

    pub fn dump_names(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn dump_structure(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} {} {}(size = {})", c.name, c.data_type, c.data_type.family_name(), c.len()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn format_row(&self, row: usize) -> Option<Vec<String>> {
        self.columns.iter().map(|c| c.data.format_cell(row)).collect()
    }
}
