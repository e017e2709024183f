pub mod cancel;
pub mod cursor;
pub mod error;
pub mod matcher;
pub mod results;
pub mod session;
pub mod types;

pub use cancel::{CancelToken, ScanGeneration};
pub use cursor::ScanCursor;
pub use error::SearchError;
pub use matcher::{CompiledPattern, MatchEngine};
pub use results::ResultStore;
pub use session::{
    ResultsView, ScanPhase, SearchSession, SessionConfig, SessionSnapshot, SessionState,
};
pub use types::{Match, MatchKind, Query, RelatedTerm, SearchMode};
