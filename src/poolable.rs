/// A trait for objects that can be managed by an [`ObjectPool`](crate::ObjectPool).
///
/// The recycled and locked flags of a pooled object are owned by the pool slot
/// holding it, and are only changed through the pool. See
/// [`ObjectPool::lock`](crate::ObjectPool::lock) and
/// [`ObjectPool::is_recycled`](crate::ObjectPool::is_recycled).
pub trait Poolable {
    /// Called exactly once each time the object goes back to the idle set.
    ///
    /// Use this to reset per-use state such as buffers or attached listeners.
    fn on_recycled(&mut self);
}

impl<T> Poolable for Vec<T> {
    #[inline(always)]
    fn on_recycled(&mut self) {
        self.clear()
    }
}

impl Poolable for String {
    #[inline(always)]
    fn on_recycled(&mut self) {
        self.clear()
    }
}
