use parking_lot::RwLock;
use std::sync::Arc;

/// Holds an immutable value that is replaced as a whole.
///
/// Readers get the `Arc` that was current when they asked; a writer swaps in
/// a fully built replacement under the write lock.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self { current: RwLock::new(Arc::new(value)) }
    }

    pub fn load(&self) -> Arc<T> {
        self.current.read().clone()
    }

    /// Returns the snapshot that was replaced.
    pub fn publish(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        std::mem::replace(&mut *self.current.write(), next)
    }
}
