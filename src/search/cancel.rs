//! Generation-based cancellation of scan passes.
//!
//! Each query change bumps the shared generation. A pass holds a token for the
//! generation it was started under and stops as soon as the two differ.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared generation counter, one per session
#[derive(Debug, Clone, Default)]
pub struct ScanGeneration {
    current: Arc<AtomicU64>,
}

impl ScanGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Start a new generation, cancelling every outstanding token
    pub fn bump(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Token for the current generation
    pub fn token(&self) -> CancelToken {
        self.token_for(self.current())
    }

    /// Token for a specific generation (cancelled already if it is stale)
    pub fn token_for(&self, generation: u64) -> CancelToken {
        CancelToken {
            current: Arc::clone(&self.current),
            generation,
        }
    }
}

/// Handle checked by a scan pass between chunks
#[derive(Debug, Clone)]
pub struct CancelToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        ScanGeneration::new().token()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_cancels_outstanding_tokens() {
        let generation = ScanGeneration::new();
        let token = generation.token();
        assert!(!token.is_cancelled());

        let next = generation.bump();
        assert_eq!(next, 1);
        assert!(token.is_cancelled());
        assert!(!generation.token().is_cancelled());
    }

    #[test]
    fn test_stale_token() {
        let generation = ScanGeneration::new();
        generation.bump();
        generation.bump();
        assert!(generation.token_for(1).is_cancelled());
        assert!(!generation.token_for(2).is_cancelled());
    }

    #[test]
    fn test_never_token() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
