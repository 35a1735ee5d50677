use thiserror::Error;

/// Why a single source request did not yield usable data.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Request(e) if e.is_timeout())
    }
}

/// Adapter failure, tagged by how the poll loop must treat it.
///
/// The market catalog drives liveness, so its failures are `Critical`. The
/// notice feed is informational and only ever fails `NonCritical`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("market catalog unavailable: {0}")]
    Critical(#[source] SourceError),

    #[error("notice feed unavailable: {0}")]
    NonCritical(#[source] SourceError),
}

impl FetchError {
    pub fn is_critical(&self) -> bool {
        matches!(self, FetchError::Critical(_))
    }

    pub fn source_error(&self) -> &SourceError {
        match self {
            FetchError::Critical(e) | FetchError::NonCritical(e) => e,
        }
    }
}
