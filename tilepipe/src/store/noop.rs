use super::{Store, StoreError};

/// Store that keeps nothing.
///
/// Every generate runs the backend and every get misses. Useful when only
/// the side effects of generation matter, and for measuring pipeline
/// overhead without storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStore;

impl Store for NoOpStore {
    fn set(&mut self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
        Ok(())
    }

    fn get(&mut self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    fn exists(&mut self, _key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}
