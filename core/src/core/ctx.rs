// src/core/ctx.rs
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lock-protected context handed to every hook of a flow.
///
/// Cloning is cheap and shares the same underlying data. Guards are blocking
/// `parking_lot` guards and MUST be dropped before any `.await`.
#[derive(Debug)]
pub struct Ctx<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> Ctx<T> {
  pub fn new(data: T) -> Self {
    Ctx(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
    self.0.try_read()
  }

  pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
    self.0.try_write()
  }

  /// Read guard narrowed to one part of the context, e.g. `ctx.map_read(|c| &c.items)`.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }
}

impl<T: Send + Sync + 'static> Clone for Ctx<T> {
  fn clone(&self) -> Self {
    Ctx(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for Ctx<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}
