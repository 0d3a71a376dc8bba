//! Byte stores for generated payloads.
//!
//! The pipeline never holds a store open between operations. Each
//! generate or get opens a connection through the registered
//! [`StoreFactory`] and closes it when the operation completes, so
//! implementations backed by connection pools or remote services need no
//! extra lifetime management.

mod memory;
mod noop;

pub use memory::{MemoryStore, MemoryStoreStats};
pub use noop::NoOpStore;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

/// Errors reported by stores and by the pipeline's use of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No store constructor has been registered
    #[error("no store has been registered")]
    NotConfigured,

    /// A connection could not be opened
    #[error("store connection failed: {0}")]
    Connection(String),

    /// The requested key holds no value
    #[error("key `{0}` not found in store")]
    NotFound(String),

    /// The value exceeds what the store can hold
    #[error("value of {size} bytes exceeds store capacity of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A connection to a key/value byte store.
///
/// Methods take `&mut self` and may block; the pipeline calls them from the
/// blocking pool.
pub trait Store: Send {
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Returns the value under `key`, or `None` if absent.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns true if `key` holds a value.
    fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Releases the connection.
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Opens a new store connection.
pub type StoreFactory = Arc<dyn Fn() -> Result<Box<dyn Store>, StoreError> + Send + Sync>;

/// An open connection that is closed when dropped.
pub(crate) struct StoreConnection {
    store: Box<dyn Store>,
}

impl StoreConnection {
    pub(crate) fn open(factory: &StoreFactory) -> Result<Self, StoreError> {
        Ok(Self { store: factory()? })
    }

    pub(crate) fn store(&mut self) -> &mut dyn Store {
        self.store.as_mut()
    }
}

impl Drop for StoreConnection {
    fn drop(&mut self) {
        if let Err(e) = self.store.close() {
            warn!(error = %e, "Failed to close store connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        closed: Arc<AtomicUsize>,
    }

    impl Store for CountingStore {
        fn set(&mut self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
            Ok(())
        }

        fn get(&mut self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        fn exists(&mut self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn close(&mut self) -> Result<(), StoreError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("already closed".to_string()))
        }
    }

    #[test]
    fn test_connection_closes_on_drop() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let factory: StoreFactory = Arc::new(move || {
            Ok(Box::new(CountingStore {
                closed: Arc::clone(&counter),
            }) as Box<dyn Store>)
        });

        {
            let mut conn = StoreConnection::open(&factory).unwrap();
            assert!(!conn.store().exists("k").unwrap());
        }
        // close errors are logged, not propagated
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_error_is_returned() {
        let factory: StoreFactory =
            Arc::new(|| Err(StoreError::Connection("refused".to_string())));
        let err = StoreConnection::open(&factory).err().unwrap();
        assert_eq!(err.to_string(), "store connection failed: refused");
    }
}
