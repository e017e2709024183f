use crate::search::session::SessionState;
use crate::search::types::SearchMode;

/// Errors raised by the search core.
///
/// Every variant leaves the session's previous results untouched.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search mode {0:?}, expected \"shallow\" or \"deep\"")]
    InvalidMode(String),

    #[error("scan more is not available in {mode} mode while {state}")]
    ScanMoreNotAvailable { state: SessionState, mode: SearchMode },

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("scan pass for generation {generation} was cancelled")]
    Cancelled { generation: u64 },
}

impl SearchError {
    /// Whether the caller can simply carry on with the current session
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SearchError::Pattern(_))
    }
}
