//! Rotating pool of completion clients, one per API key.

use crate::error::{ConfigError, Result};
use crate::llm::client::CompletionClient;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered set of interchangeable clients with a shared "current" cursor.
///
/// The cursor only moves forward and wraps modulo the pool size, so it is
/// always a valid index.
pub struct KeyPool {
    clients: Vec<Arc<dyn CompletionClient>>,
    cursor: AtomicUsize,
}

impl KeyPool {
    /// Build a pool. An empty client list is a configuration error.
    pub fn new(clients: Vec<Arc<dyn CompletionClient>>) -> Result<Self> {
        if clients.is_empty() {
            return Err(ConfigError::Invalid("key pool needs at least one API key".into()).into());
        }
        Ok(Self {
            clients,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Index of the active client.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// The active client and its index.
    pub fn current(&self) -> (usize, Arc<dyn CompletionClient>) {
        let index = self.cursor();
        (index, self.clients[index].clone())
    }

    /// Advance to the next client, wrapping around. Returns the new index.
    pub fn rotate(&self) -> usize {
        let len = self.clients.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                Some((cursor + 1) % len)
            })
            .unwrap_or_else(|cursor| cursor);
        let next = (previous + 1) % len;
        tracing::info!(key = next + 1, pool_size = len, "switched to API key");
        next
    }
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("size", &self.clients.len())
            .field("cursor", &self.cursor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::client::{Completion, CompletionRequest};

    struct NoopClient;

    #[async_trait::async_trait]
    impl CompletionClient for NoopClient {
        async fn complete(
            &self,
            _request: &CompletionRequest<'_>,
        ) -> std::result::Result<Completion, LlmError> {
            Ok(Completion { content: None })
        }
    }

    fn pool_of(size: usize) -> KeyPool {
        let clients: Vec<Arc<dyn CompletionClient>> = (0..size)
            .map(|_| Arc::new(NoopClient) as Arc<dyn CompletionClient>)
            .collect();
        KeyPool::new(clients).expect("pool should build")
    }

    #[test]
    fn cursor_after_k_rotations_is_k_mod_n() {
        for size in 1..=4 {
            let pool = pool_of(size);
            for k in 1..=9 {
                pool.rotate();
                assert_eq!(pool.cursor(), k % size, "size {size}, rotations {k}");
            }
        }
    }

    #[test]
    fn rotate_returns_new_index() {
        let pool = pool_of(3);
        assert_eq!(pool.rotate(), 1);
        assert_eq!(pool.rotate(), 2);
        assert_eq!(pool.rotate(), 0);
        assert_eq!(pool.current().0, 0);
    }

    #[test]
    fn empty_pool_is_rejected() {
        let error = KeyPool::new(Vec::new()).expect_err("empty pool must fail");
        assert!(error.to_string().contains("at least one API key"));
    }
}
