//! Generated contract file metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generated contract file, as listed for the report collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub name: String,
    pub size_bytes: u64,
    pub interaction_count: usize,
    pub generated_at: DateTime<Utc>,
}
