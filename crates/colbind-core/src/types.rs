use std::fmt;

/// One bound parameter value as carried by the envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Raw bytes, not necessarily UTF-8.
    String(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
}

impl ScalarValue {
    pub fn string(value: impl Into<Vec<u8>>) -> Self {
        ScalarValue::String(value.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Int(_) => "int",
            ScalarValue::UInt(_) => "uint",
            ScalarValue::Float(_) => "float",
            ScalarValue::String(_) => "string",
            ScalarValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

/// Values bound to one statement, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingRow {
    pub values: Vec<ScalarValue>,
}

impl BindingRow {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<ScalarValue>> for BindingRow {
    fn from(values: Vec<ScalarValue>) -> Self {
        Self { values }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
}

impl IntegerType {
    pub fn name(self) -> &'static str {
        match self {
            IntegerType::UInt8 => "UInt8",
            IntegerType::UInt16 => "UInt16",
            IntegerType::UInt32 => "UInt32",
            IntegerType::UInt64 => "UInt64",
            IntegerType::Int8 => "Int8",
            IntegerType::Int16 => "Int16",
            IntegerType::Int32 => "Int32",
            IntegerType::Int64 => "Int64",
        }
    }
}

pub const DEFAULT_DATETIME64_PRECISION: u8 = 3;
pub const MAX_DATETIME64_PRECISION: u8 = 9;

/// Column type of the target store. The set is closed: adding a family means
/// extending this enum and every exhaustive match over it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer(IntegerType),
    Float32,
    Float64,
    String,
    FixedString(usize),
    /// Days since 1970-01-01, stored as `u16`.
    Date,
    /// Ticks since the epoch at 10^-precision seconds, stored as `i64`.
    DateTime64(u8),
    Nullable(Box<DataType>),
}

impl DataType {
    pub fn family_name(&self) -> &'static str {
        match self {
            DataType::Integer(int) => int.name(),
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::String => "String",
            DataType::FixedString(_) => "FixedString",
            DataType::Date => "Date",
            DataType::DateTime64(_) => "DateTime64",
            DataType::Nullable(_) => "Nullable",
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_))
    }

    pub fn parse(declared: &str) -> Result<Self, TypeParseError> {
        let trimmed = declared.trim();
        let (family, param) = match trimmed.find('(') {
            Some(open) => {
                let Some(inner) = trimmed[open + 1..].strip_suffix(')') else {
                    return Err(TypeParseError::malformed(declared, "missing closing parenthesis"));
                };
                (trimmed[..open].trim_end(), Some(inner.trim()))
            }
            None => {
                if trimmed.contains(')') {
                    return Err(TypeParseError::malformed(declared, "unbalanced parenthesis"));
                }
                (trimmed, None)
            }
        };
        if family.is_empty() {
            return Err(TypeParseError::malformed(declared, "empty type name"));
        }

        let integer = match family {
            "UInt8" => Some(IntegerType::UInt8),
            "UInt16" => Some(IntegerType::UInt16),
            "UInt32" => Some(IntegerType::UInt32),
            "UInt64" => Some(IntegerType::UInt64),
            "Int8" => Some(IntegerType::Int8),
            "Int16" => Some(IntegerType::Int16),
            "Int32" => Some(IntegerType::Int32),
            "Int64" => Some(IntegerType::Int64),
            _ => None,
        };
        if let Some(int) = integer {
            no_param(declared, param)?;
            return Ok(DataType::Integer(int));
        }

        match family {
            "Float32" => no_param(declared, param).map(|_| DataType::Float32),
            "Float64" => no_param(declared, param).map(|_| DataType::Float64),
            "String" => no_param(declared, param).map(|_| DataType::String),
            "Date" => no_param(declared, param).map(|_| DataType::Date),
            "FixedString" => {
                let param = param
                    .ok_or_else(|| TypeParseError::malformed(declared, "FixedString requires a length"))?;
                let length: usize = param.parse().map_err(|_| {
                    TypeParseError::malformed(declared, format!("invalid FixedString length `{param}`"))
                })?;
                if length == 0 {
                    return Err(TypeParseError::malformed(declared, "FixedString length must be positive"));
                }
                Ok(DataType::FixedString(length))
            }
            "DateTime64" => {
                let precision = match param {
                    None => DEFAULT_DATETIME64_PRECISION,
                    Some(p) => p.parse::<u8>().map_err(|_| {
                        TypeParseError::malformed(declared, format!("invalid DateTime64 precision `{p}`"))
                    })?,
                };
                if !(DEFAULT_DATETIME64_PRECISION..=MAX_DATETIME64_PRECISION).contains(&precision) {
                    return Err(TypeParseError::malformed(
                        declared,
                        format!("DateTime64 precision {precision} outside 3..=9"),
                    ));
                }
                Ok(DataType::DateTime64(precision))
            }
            "Nullable" => {
                let param = param
                    .ok_or_else(|| TypeParseError::malformed(declared, "Nullable requires a nested type"))?;
                let nested = DataType::parse(param)?;
                if nested.is_nullable() {
                    return Err(TypeParseError::malformed(declared, "Nullable cannot be nested"));
                }
                Ok(DataType::Nullable(Box::new(nested)))
            }
            other => Err(TypeParseError::UnknownFamily(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::FixedString(n) => write!(f, "FixedString({n})"),
            DataType::DateTime64(p) => write!(f, "DateTime64({p})"),
            DataType::Nullable(inner) => write!(f, "Nullable({inner})"),
            other => f.write_str(other.family_name()),
        }
    }
}

fn no_param(declared: &str, param: Option<&str>) -> Result<(), TypeParseError> {
    match param {
        None => Ok(()),
        Some(_) => Err(TypeParseError::malformed(declared, "type takes no parameters")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    UnknownFamily(String),
    Malformed { declared: String, reason: String },
}

impl TypeParseError {
    fn malformed(declared: &str, reason: impl Into<String>) -> Self {
        TypeParseError::Malformed {
            declared: declared.to_string(),
            reason: reason.into(),
        }
    }
}
