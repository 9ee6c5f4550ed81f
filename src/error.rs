use std::path::PathBuf;

use thiserror::Error;

/// Problems with tuning values, layouts or config files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("beat map has no beats")]
    EmptyBeatMap,

    #[error("beat {index} is not scheduled after the previous beat")]
    UnorderedBeatMap { index: usize },

    #[error("stealth agent {agent_id} has no patrol waypoints")]
    NoPatrolPoints { agent_id: String },

    #[error("boss arena has no obstacle spawn points")]
    NoSpawnPoints,

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
