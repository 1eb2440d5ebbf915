use thiserror::Error;

use crate::aave::types::DataType;

/// Failures on the rate-history fetch path. Both variants carry the series
/// identity and the cursor at the point of failure so an aborted run names
/// where a rerun should resume instead of silently truncating.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport failure fetching {data_type} for {symbol} at cursor '{cursor}': {source}")]
    Transport {
        data_type: DataType,
        symbol: String,
        cursor: String,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("malformed page fetching {data_type} for {symbol} at cursor '{cursor}': {detail}")]
    Malformed {
        data_type: DataType,
        symbol: String,
        cursor: String,
        detail: String,
    },
}

impl FetchError {
    pub fn transport(
        data_type: DataType,
        symbol: &str,
        cursor: &str,
        source: reqwest_middleware::Error,
    ) -> Self {
        FetchError::Transport {
            data_type,
            symbol: symbol.to_string(),
            cursor: cursor.to_string(),
            source,
        }
    }

    pub fn malformed(
        data_type: DataType,
        symbol: &str,
        cursor: &str,
        detail: impl Into<String>,
    ) -> Self {
        FetchError::Malformed {
            data_type,
            symbol: symbol.to_string(),
            cursor: cursor.to_string(),
            detail: detail.into(),
        }
    }

    /// The cursor the failed request was issued with.
    pub fn cursor(&self) -> &str {
        match self {
            FetchError::Transport { cursor, .. } => cursor,
            FetchError::Malformed { cursor, .. } => cursor,
        }
    }
}
