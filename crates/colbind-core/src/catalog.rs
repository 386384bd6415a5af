use crate::error::ColbindError;
use crate::schema::TableSchemaDescription;
use std::collections::HashMap;

/// Table descriptions keyed by table name.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, TableSchemaDescription>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, description: TableSchemaDescription) -> Result<(), ColbindError> {
        if self.tables.contains_key(description.table()) {
            return Err(ColbindError::Catalog(format!(
                "table already exists: {}",
                description.table()
            )));
        }
        self.tables.insert(description.table().to_string(), description);
        Ok(())
    }

    /// Installs a new description for a table, returning the previous one.
    pub fn replace_table(&mut self, description: TableSchemaDescription) -> Option<TableSchemaDescription> {
        self.tables.insert(description.table().to_string(), description)
    }

    pub fn drop_table(&mut self, name: &str) -> Option<TableSchemaDescription> {
        self.tables.remove(name)
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchemaDescription> {
        self.tables.get(name)
    }

    pub fn list_tables(&self) -> Vec<TableSchemaDescription> {
        let mut tables: Vec<_> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.table().cmp(b.table()));
        tables
    }
}
