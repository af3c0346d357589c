use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream signalled throttling. Retrying past this point risks a
    /// daily block, so the retry loop stops immediately and callers fall
    /// back to whatever the store already holds.
    #[error("upstream throttled the request (HTTP {status}), stale data available: {stale_available}")]
    Throttled { status: u16, stale_available: bool },
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed element payload: {0}")]
    Malformed(String),
    #[error("all {attempts} fetch attempts failed ({last}), stale data available: {stale_available}")]
    Unavailable {
        attempts: u32,
        last: String,
        stale_available: bool,
    },
}

impl FetchError {
    /// Whether the store still holds usable (if stale) data for the failed
    /// collection.
    pub fn stale_available(&self) -> bool {
        match self {
            FetchError::Throttled {
                stale_available, ..
            }
            | FetchError::Unavailable {
                stale_available, ..
            } => *stale_available,
            _ => false,
        }
    }
}
