//! Per-grid configuration.
//!
//! A grid is one collection exposed through one schema. Configuration is plain serde
//! data: build it in code or load it from JSON.
//!
//! ```json
//! {
//!   "collection": "books",
//!   "strict": false,
//!   "timeout_ms": 5000,
//!   "schema": [
//!     { "path": "Title", "type": "text", "required": true },
//!     { "path": "PublisherInfo.Date", "type": "date", "alias": "Published" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::{
    error::{BridgeError, BridgeResult},
    schema::FieldSchema,
};

/// Store call deadline used when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Collection the grid reads and edits.
    pub collection: String,
    pub schema: FieldSchema,
    /// Reject submitted fields that are not in the schema.
    #[serde(default)]
    pub strict: bool,
    /// Deadline for each store call in milliseconds. `0` disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl GridConfig {
    pub fn new(collection: impl Into<String>, schema: FieldSchema) -> Self {
        Self {
            collection: collection.into(),
            schema,
            strict: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the store call deadline. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout
            .map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX).max(1))
            .unwrap_or(0);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        let config: GridConfig = serde_json::from_str(json)
            .map_err(|e| BridgeError::Validation(format!("invalid grid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Validation(format!("cannot read grid configuration {}: {e}", path.display()))
        })?;

        Self::from_json_str(&content)
    }

    fn validate(&self) -> BridgeResult<()> {
        if self.collection.trim().is_empty() {
            return Err(BridgeError::Validation("collection name is empty".to_string()));
        }

        Ok(())
    }
}
