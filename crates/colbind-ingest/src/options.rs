use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// What the reader does with a row whose values fail to convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail the batch and leave the block as it was before the batch.
    #[default]
    Abort,
    /// Drop the row, record its error and keep going.
    SkipRow,
}

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub error_policy: ErrorPolicy,
    pub fetch_timeout: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Abort,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}
