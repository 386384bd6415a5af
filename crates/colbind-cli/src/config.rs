use colbind_core::schema::{ColumnDefinition, TableSchemaDescription};
use colbind_ingest::{ErrorPolicy, ReaderOptions};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableConfig {
    pub fn description(&self) -> anyhow::Result<TableSchemaDescription> {
        TableSchemaDescription::from_definitions(&self.name, &self.columns)
            .map_err(|err| anyhow::anyhow!("table {}: {err}", self.name))
    }
}

impl Config {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.tables.is_empty() {
            return Err(anyhow::anyhow!("no tables configured"));
        }
        if self.reader.fetch_timeout_ms == 0 {
            return Err(anyhow::anyhow!("reader.fetch_timeout_ms must be positive"));
        }
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(anyhow::anyhow!("table {} configured twice", table.name));
            }
            if table.columns.is_empty() {
                return Err(anyhow::anyhow!("table {} has no columns", table.name));
            }
            table.description()?;
        }
        Ok(())
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            error_policy: self.reader.error_policy,
            fetch_timeout: Duration::from_millis(self.reader.fetch_timeout_ms),
        }
    }
}
