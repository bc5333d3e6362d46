use crate::{
    DefaultFactory, EventDispatcher, ObjectFactory, ObjectPool, PoolConfig, PoolError, Poolable,
};
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
    rc::Rc,
};
use tracing::debug;

/// Type-erased view of an [`ObjectPool`], used by the registry to drive pools
/// of unrelated object types.
trait ManagedPool {
    fn auto_recycle(&mut self) -> Result<usize, PoolError>;
    fn destroy(&mut self) -> Result<usize, PoolError>;
    fn current_count(&self) -> usize;
    fn is_disposed(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T, F> ManagedPool for ObjectPool<T, F>
where
    T: Poolable + 'static,
    F: ObjectFactory<T> + 'static,
{
    fn auto_recycle(&mut self) -> Result<usize, PoolError> {
        ObjectPool::auto_recycle(self)
    }

    fn destroy(&mut self) -> Result<usize, PoolError> {
        ObjectPool::destroy(self)
    }

    fn current_count(&self) -> usize {
        ObjectPool::current_count(self)
    }

    fn is_disposed(&self) -> bool {
        ObjectPool::is_disposed(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns at most one pool per object type.
///
/// The registry is created and torn down explicitly and passed to whoever needs
/// it; it is also a [`Module`](crate::Module) that auto-recycles its pools on a
/// frame interval.
pub struct PoolRegistry {
    pools: HashMap<TypeId, Box<dyn ManagedPool>>,
    defaults: PoolConfig,
    pub(crate) auto_recycle_interval: u64,
    events: Option<Rc<EventDispatcher>>,
}

impl PoolRegistry {
    /// Creates an empty registry. Pools created on demand use `defaults`.
    pub fn new(defaults: PoolConfig) -> Self {
        PoolRegistry {
            pools: HashMap::new(),
            defaults,
            auto_recycle_interval: 0,
            events: None,
        }
    }

    /// Auto-recycles every pool once every `frames` runtime frames. `0`
    /// disables it.
    pub fn with_auto_recycle_interval(mut self, frames: u64) -> Self {
        self.auto_recycle_interval = frames;
        self
    }

    /// Attaches `events` to pools created on demand.
    pub fn with_events(mut self, events: Rc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Returns the number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Checks if no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Checks if a pool for `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<T>())
    }

    /// Registers `pool` as the pool for `T`.
    pub fn register<T, F>(&mut self, pool: ObjectPool<T, F>) -> Result<(), PoolError>
    where
        T: Poolable + 'static,
        F: ObjectFactory<T> + 'static,
    {
        let key = TypeId::of::<T>();
        if self.pools.contains_key(&key) {
            return Err(PoolError::AlreadyRegistered(type_name::<T>()));
        }
        debug!(pool = type_name::<T>(), "pool registered");
        self.pools.insert(key, Box::new(pool));
        Ok(())
    }

    /// Returns the pool for `T`, creating it with a [`DefaultFactory`] and the
    /// registry defaults if there is none yet.
    ///
    /// Fails with [`PoolError::AlreadyRegistered`] if `T` already has a pool
    /// built with another factory type.
    pub fn get_or_create<T>(&mut self) -> Result<&mut ObjectPool<T, DefaultFactory<T>>, PoolError>
    where
        T: Poolable + Default + 'static,
    {
        if !self.contains::<T>() {
            let mut pool =
                ObjectPool::with_config(DefaultFactory::<T>::new(), self.defaults.clone())?;
            if let Some(events) = &self.events {
                pool = pool.with_events(events.clone());
            }
            self.register(pool)?;
        }
        self.pool_mut::<T, DefaultFactory<T>>()
            .ok_or(PoolError::AlreadyRegistered(type_name::<T>()))
    }

    /// Returns the pool for `T` if it was built with factory type `F`.
    pub fn pool<T: 'static, F: 'static>(&self) -> Option<&ObjectPool<T, F>> {
        self.pools
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<ObjectPool<T, F>>()
    }

    /// Returns the pool for `T` mutably if it was built with factory type `F`.
    pub fn pool_mut<T: 'static, F: 'static>(&mut self) -> Option<&mut ObjectPool<T, F>> {
        self.pools
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<ObjectPool<T, F>>()
    }

    /// Destroys and removes the pool for `T`. Returns `false` if there was none.
    pub fn destroy_pool<T: 'static>(&mut self) -> Result<bool, PoolError> {
        match self.pools.remove(&TypeId::of::<T>()) {
            Some(mut pool) => {
                if !pool.is_disposed() {
                    pool.destroy()?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs [`ObjectPool::auto_recycle`] on every live pool and returns the
    /// total number of objects affected.
    pub fn auto_recycle_all(&mut self) -> Result<usize, PoolError> {
        let mut total = 0;
        for pool in self.pools.values_mut() {
            if !pool.is_disposed() {
                total += pool.auto_recycle()?;
            }
        }
        Ok(total)
    }

    /// Returns the number of objects owned by all pools.
    pub fn current_count(&self) -> usize {
        self.pools.values().map(|pool| pool.current_count()).sum()
    }

    /// Destroys and removes every pool. Returns the number of objects dropped.
    ///
    /// Pools that were already destroyed are removed without counting.
    pub fn destroy_all(&mut self) -> Result<usize, PoolError> {
        let mut released = 0;
        for (_, mut pool) in self.pools.drain() {
            if !pool.is_disposed() {
                released += pool.destroy()?;
            }
        }
        debug!(released, "all pools destroyed");
        Ok(released)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pools.len())
            .field("defaults", &self.defaults)
            .field("auto_recycle_interval", &self.auto_recycle_interval)
            .finish()
    }
}
