use crate::block::{Cell, ColumnData};
use crate::error::ColbindError;
use crate::types::{DataType, IntegerType, ScalarValue, DEFAULT_DATETIME64_PRECISION, MAX_DATETIME64_PRECISION};
use chrono::{DateTime, NaiveDate};

const MAX_DATE_DAYS: i64 = u16::MAX as i64;

/// Converts tagged scalar values into cells of one target column type.
///
/// Behavior is selected by exhaustive matching over [`DataType`], so every
/// family the schema parser accepts has exactly one conversion rule here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSerializer {
    data_type: DataType,
}

pub type ColumnSerializers = Vec<ColumnSerializer>;

impl ColumnSerializer {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn family_name(&self) -> &'static str {
        self.data_type.family_name()
    }

    pub fn display_name(&self) -> String {
        self.data_type.to_string()
    }

    pub fn serialize_into(&self, value: &ScalarValue, column: &mut ColumnData) -> Result<(), ColbindError> {
        let cell = self.convert(value)?;
        column.push(cell)
    }

    pub fn convert(&self, value: &ScalarValue) -> Result<Cell, ColbindError> {
        match &self.data_type {
            DataType::Nullable(inner) => match value {
                ScalarValue::Null => Ok(Cell::Null),
                other => convert_value(inner, other),
            },
            data_type => convert_value(data_type, value),
        }
    }
}

fn convert_value(data_type: &DataType, value: &ScalarValue) -> Result<Cell, ColbindError> {
    if value.is_null() {
        return Err(ColbindError::NullNotAllowed {
            expected: data_type.to_string(),
        });
    }
    match data_type {
        DataType::Integer(int) => convert_integer(*int, value),
        DataType::Float32 => match *value {
            ScalarValue::Float(v) => {
                if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                    Err(ColbindError::numeric_overflow(v, data_type))
                } else {
                    Ok(Cell::Float32(v as f32))
                }
            }
            ScalarValue::Int(v) => Ok(Cell::Float32(v as f32)),
            ScalarValue::UInt(v) => Ok(Cell::Float32(v as f32)),
            _ => Err(mismatch(data_type, value)),
        },
        DataType::Float64 => match *value {
            ScalarValue::Float(v) => Ok(Cell::Float64(v)),
            ScalarValue::Int(v) => Ok(Cell::Float64(v as f64)),
            ScalarValue::UInt(v) => Ok(Cell::Float64(v as f64)),
            _ => Err(mismatch(data_type, value)),
        },
        DataType::String => match value {
            ScalarValue::String(bytes) => Ok(Cell::String(bytes.clone())),
            _ => Err(mismatch(data_type, value)),
        },
        DataType::FixedString(capacity) => match value {
            ScalarValue::String(_) if *capacity == 0 => Err(ColbindError::UnsupportedType(data_type.to_string())),
            ScalarValue::String(bytes) => {
                if bytes.len() > *capacity {
                    return Err(ColbindError::FixedStringOverflow {
                        length: bytes.len(),
                        capacity: *capacity,
                    });
                }
                let mut padded = Vec::with_capacity(*capacity);
                padded.extend_from_slice(bytes);
                padded.resize(*capacity, 0);
                Ok(Cell::FixedString(padded))
            }
            _ => Err(mismatch(data_type, value)),
        },
        DataType::Date => match *value {
            ScalarValue::Timestamp(millis) => days_since_epoch(millis).map(Cell::Date),
            _ => Err(mismatch(data_type, value)),
        },
        DataType::DateTime64(precision) => match *value {
            ScalarValue::Timestamp(millis) => {
                if !(DEFAULT_DATETIME64_PRECISION..=MAX_DATETIME64_PRECISION).contains(precision) {
                    return Err(ColbindError::UnsupportedType(data_type.to_string()));
                }
                let scale = 10i64.pow(u32::from(*precision - DEFAULT_DATETIME64_PRECISION));
                millis
                    .checked_mul(scale)
                    .map(Cell::DateTime64)
                    .ok_or_else(|| ColbindError::numeric_overflow(millis, data_type))
            }
            _ => Err(mismatch(data_type, value)),
        },
        DataType::Nullable(_) => Err(ColbindError::UnsupportedType(format!("nested {data_type}"))),
    }
}

fn convert_integer(int: IntegerType, value: &ScalarValue) -> Result<Cell, ColbindError> {
    let overflow = |v: &dyn ToString| ColbindError::numeric_overflow(v.to_string(), int.name());
    match *value {
        ScalarValue::Int(v) => match int {
            IntegerType::UInt8 => u8::try_from(v).map(Cell::UInt8).map_err(|_| overflow(&v)),
            IntegerType::UInt16 => u16::try_from(v).map(Cell::UInt16).map_err(|_| overflow(&v)),
            IntegerType::UInt32 => u32::try_from(v).map(Cell::UInt32).map_err(|_| overflow(&v)),
            IntegerType::UInt64 => u64::try_from(v).map(Cell::UInt64).map_err(|_| overflow(&v)),
            IntegerType::Int8 => i8::try_from(v).map(Cell::Int8).map_err(|_| overflow(&v)),
            IntegerType::Int16 => i16::try_from(v).map(Cell::Int16).map_err(|_| overflow(&v)),
            IntegerType::Int32 => i32::try_from(v).map(Cell::Int32).map_err(|_| overflow(&v)),
            IntegerType::Int64 => Ok(Cell::Int64(v)),
        },
        ScalarValue::UInt(v) => match int {
            IntegerType::UInt8 => u8::try_from(v).map(Cell::UInt8).map_err(|_| overflow(&v)),
            IntegerType::UInt16 => u16::try_from(v).map(Cell::UInt16).map_err(|_| overflow(&v)),
            IntegerType::UInt32 => u32::try_from(v).map(Cell::UInt32).map_err(|_| overflow(&v)),
            IntegerType::UInt64 => Ok(Cell::UInt64(v)),
            IntegerType::Int8 => i8::try_from(v).map(Cell::Int8).map_err(|_| overflow(&v)),
            IntegerType::Int16 => i16::try_from(v).map(Cell::Int16).map_err(|_| overflow(&v)),
            IntegerType::Int32 => i32::try_from(v).map(Cell::Int32).map_err(|_| overflow(&v)),
            IntegerType::Int64 => i64::try_from(v).map(Cell::Int64).map_err(|_| overflow(&v)),
        },
        _ => Err(ColbindError::TypeMismatch {
            expected: int.name().to_string(),
            actual: value.kind(),
        }),
    }
}

/// Civil UTC date of a millisecond timestamp, as days since 1970-01-01.
fn days_since_epoch(millis: i64) -> Result<u16, ColbindError> {
    let overflow = || ColbindError::numeric_overflow(millis, DataType::Date);
    let date = DateTime::from_timestamp_millis(millis).ok_or_else(overflow)?.date_naive();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(overflow)?;
    let days = date.signed_duration_since(epoch).num_days();
    if !(0..=MAX_DATE_DAYS).contains(&days) {
        return Err(overflow());
    }
    Ok(days as u16)
}

fn mismatch(data_type: &DataType, value: &ScalarValue) -> ColbindError {
    ColbindError::TypeMismatch {
        expected: data_type.to_string(),
        actual: value.kind(),
    }
}
