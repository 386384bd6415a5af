use crate::error::ColbindError;
use crate::types::{DataType, TypeParseError};
use serde::{Deserialize, Serialize};

/// A column as declared by the table DDL: name plus the type string exactly
/// as written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn family_name(&self) -> &'static str {
        self.data_type.family_name()
    }
}

/// Ordered column contract of one table. Column order is both the block
/// column order and the expected order of values in every bound row.
///
/// Columns are only ever appended. A changed schema is a new instance; shared
/// copies live behind `Arc` and are never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchemaDescription {
    table: String,
    columns: Vec<ColumnDescriptor>,
}

impl TableSchemaDescription {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn from_definitions(
        table: impl Into<String>,
        definitions: &[ColumnDefinition],
    ) -> Result<Self, ColbindError> {
        let mut description = Self::new(table);
        for def in definitions {
            description.add_column_description(&def.name, &def.declared_type)?;
        }
        Ok(description)
    }

    pub fn add_column_description(&mut self, name: &str, declared_type: &str) -> Result<(), ColbindError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ColbindError::SchemaParse {
                declared: declared_type.to_string(),
                reason: "column name is empty".into(),
            });
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(ColbindError::SchemaParse {
                declared: declared_type.to_string(),
                reason: format!("duplicate column `{name}` in table {}", self.table),
            });
        }
        let data_type = DataType::parse(declared_type).map_err(|err| match err {
            TypeParseError::UnknownFamily(family) => ColbindError::SchemaParse {
                declared: declared_type.to_string(),
                reason: format!("unknown type family `{family}`"),
            },
            TypeParseError::Malformed { declared, reason } => ColbindError::SchemaParse { declared, reason },
        })?;
        self.columns.push(ColumnDescriptor {
            name: name.to_string(),
            data_type,
            declared_type: declared_type.to_string(),
        });
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Ordered (name, declared type) pairs, the input of the serialization
    /// helper.
    pub fn full_column_types_and_names_definition(&self) -> Vec<ColumnDefinition> {
        self.columns
            .iter()
            .map(|c| ColumnDefinition::new(c.name.clone(), c.declared_type.clone()))
            .collect()
    }
}
