//! Atomic batch-number allocation.
//!
//! One allocator call yields one unique, strictly increasing integer per
//! scope key (calendar year) plus the formatted issued code. The only path
//! to the counter row is the store's atomic increment; the allocator adds a
//! bounded mechanical retry around transient store conflicts and nothing
//! else. Business retries stay with the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AllocatorConfig;
use crate::error::{CoreError, Result};
use crate::storage::CounterStore;

/// One issued number with its formatted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub scope_key: String,
    pub sequence: i64,
    pub code: String,
}

pub struct SequenceAllocator<S: CounterStore + ?Sized> {
    store: Arc<S>,
    config: AllocatorConfig,
}

impl<S: CounterStore + ?Sized> SequenceAllocator<S> {
    pub fn new(store: Arc<S>, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    /// Issue the next number for `scope_key`.
    ///
    /// Retries the atomic increment a bounded number of times on transient
    /// store failures, then surfaces `AllocationExhausted`. Every successful
    /// return is a value no other caller has observed or will observe.
    pub async fn allocate(&self, scope_key: &str) -> Result<Allocation> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.store.increment_sequence(scope_key).await {
                Ok(sequence) => {
                    let code = self.config.format_code(sequence, scope_key);
                    tracing::info!(
                        scope_key = %scope_key,
                        sequence,
                        code = %code,
                        attempt,
                        "sequence allocated"
                    );
                    return Ok(Allocation {
                        scope_key: scope_key.to_string(),
                        sequence,
                        code,
                    });
                }
                Err(CoreError::Database(reason)) if attempt < self.config.max_attempts => {
                    tracing::warn!(
                        scope_key = %scope_key,
                        attempt,
                        error = %reason,
                        "retrying sequence allocation"
                    );
                    let delay = self.config.retry_delay_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(CoreError::Database(_)) => {
                    return Err(CoreError::AllocationExhausted {
                        scope_key: scope_key.to_string(),
                        attempts: attempt,
                    });
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Render the code an existing `(sequence, scope_key)` pair was issued
    /// under. Used by reprint paths; never allocates.
    pub fn format_code(&self, sequence: i64, scope_key: &str) -> String {
        self.config.format_code(sequence, scope_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SequenceCounter;
    use crate::storage::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_allocation_increments_and_formats() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_counter("2025", 4);
        let allocator = SequenceAllocator::new(store, AllocatorConfig::default());

        let allocation = allocator.allocate("2025").await.unwrap();
        assert_eq!(allocation.sequence, 5);
        assert_eq!(allocation.code, "973/5-UPT.PD.WIL.IV/2025");

        let next = allocator.allocate("2025").await.unwrap();
        assert_eq!(next.sequence, 6);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let store = Arc::new(InMemoryStore::new());
        let allocator = SequenceAllocator::new(store, AllocatorConfig::default());

        assert_eq!(allocator.allocate("2024").await.unwrap().sequence, 1);
        assert_eq!(allocator.allocate("2025").await.unwrap().sequence, 1);
        assert_eq!(allocator.allocate("2025").await.unwrap().sequence, 2);
    }

    /// Counter store that fails a fixed number of times before succeeding.
    struct FlakyCounter {
        inner: InMemoryStore,
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl CounterStore for FlakyCounter {
        async fn increment_sequence(&self, scope_key: &str) -> Result<i64> {
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CoreError::Database("simulated conflict".to_string()));
            }
            self.inner.increment_sequence(scope_key).await
        }

        async fn current_sequence(&self, scope_key: &str) -> Result<SequenceCounter> {
            self.inner.current_sequence(scope_key).await
        }
    }

    #[tokio::test]
    async fn test_bounded_retry_then_success() {
        let store = Arc::new(FlakyCounter {
            inner: InMemoryStore::new(),
            failures_remaining: AtomicU32::new(2),
        });
        let config = AllocatorConfig {
            max_attempts: 5,
            retry_delay_ms: 1,
            ..AllocatorConfig::default()
        };
        let allocator = SequenceAllocator::new(store, config);

        let allocation = allocator.allocate("2025").await.unwrap();
        assert_eq!(allocation.sequence, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_bounded_retries() {
        let store = Arc::new(FlakyCounter {
            inner: InMemoryStore::new(),
            failures_remaining: AtomicU32::new(u32::MAX),
        });
        let config = AllocatorConfig {
            max_attempts: 3,
            retry_delay_ms: 1,
            ..AllocatorConfig::default()
        };
        let allocator = SequenceAllocator::new(store, config);

        let err = allocator.allocate("2025").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::AllocationExhausted { attempts: 3, .. }
        ));
    }
}
