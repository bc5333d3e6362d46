use crate::{EventDispatcher, LifecycleEvent, ObjectFactory, PoolConfig, PoolError, Poolable};
use std::{any::type_name, fmt, rc::Rc};
use tracing::{debug, error, trace, warn};

/// A handle to an object checked out of an [`ObjectPool`].
///
/// Handles are cheap to copy. A handle goes stale as soon as its object leaves
/// the checked-out state (release, reclaim, detach or pool destruction); a stale
/// handle never aliases the object's next user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

impl Handle {
    /// Returns the slot index inside the owning pool.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    obj: Option<T>,
    recycled: bool,
    locked: bool,
}

/// A struct representing a single-threaded object pool.
///
/// The pool owns every object it created, idle or checked out, and hands out
/// [`Handle`]s to the checked-out ones. Idle objects are kept on a stack: the
/// most recently recycled object is the first one reused, since it is the one
/// most likely to still be warm in cache.
///
/// Every operation takes `&mut self`; share a pool between owners with an
/// external `RefCell` if needed.
pub struct ObjectPool<T, F> {
    factory: F,
    slots: Vec<Slot<T>>,
    idle: Vec<usize>,
    vacant: Vec<usize>,
    checked_out: usize,
    config: PoolConfig,
    disposed: bool,
    events: Option<Rc<EventDispatcher>>,
}

impl<T, F> ObjectPool<T, F> {
    /// Gets the number of objects owned by the pool, idle and checked out.
    ///
    /// This never exceeds [`Self::max_count`] when the pool is bounded.
    pub fn current_count(&self) -> usize {
        self.idle.len() + self.checked_out
    }

    /// Gets the number of idle objects ready to be reused.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Gets the number of objects currently checked out.
    pub fn checked_out_count(&self) -> usize {
        self.checked_out
    }

    /// Gets the number of objects created up front.
    pub fn init_count(&self) -> usize {
        self.config.init_count
    }

    /// Gets the hard cap on owned objects, or `None` when unbounded.
    pub fn max_count(&self) -> Option<usize> {
        self.config.bound()
    }

    /// Gets the configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Checks if the pool has been destroyed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Broadcasts recycle and destroy events on `events`.
    pub fn with_events(mut self, events: Rc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Returns the factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn ensure_alive(&self) -> Result<(), PoolError> {
        if self.disposed {
            error!(pool = type_name::<T>(), "operation on a destroyed pool");
            return Err(PoolError::Disposed);
        }
        Ok(())
    }

    fn is_full(&self) -> bool {
        self.config
            .bound()
            .is_some_and(|max| self.current_count() >= max)
    }

    /// Resolves a handle to the index of a checked-out slot.
    fn checked_out_index(&self, handle: Handle) -> Result<usize, PoolError> {
        self.ensure_alive()?;
        match self.slots.get(handle.index) {
            Some(slot)
                if slot.generation == handle.generation
                    && slot.obj.is_some()
                    && !slot.recycled =>
            {
                Ok(handle.index)
            }
            _ => Err(PoolError::StaleHandle(handle)),
        }
    }

    fn insert(&mut self, obj: T) -> usize {
        match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.obj = Some(obj);
                slot.recycled = true;
                slot.locked = false;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    obj: Some(obj),
                    recycled: true,
                    locked: false,
                });
                self.slots.len() - 1
            }
        }
    }

    fn vacate(&mut self, index: usize) -> Option<T> {
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        let obj = slot.obj.take();
        self.vacant.push(index);
        obj
    }

    fn notify(&self, event: LifecycleEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Gets a shared reference to a checked-out object.
    pub fn get(&self, handle: Handle) -> Result<&T, PoolError> {
        let index = self.checked_out_index(handle)?;
        self.slots[index]
            .obj
            .as_ref()
            .ok_or(PoolError::StaleHandle(handle))
    }

    /// Gets a mutable reference to a checked-out object.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, PoolError> {
        let index = self.checked_out_index(handle)?;
        self.slots[index]
            .obj
            .as_mut()
            .ok_or(PoolError::StaleHandle(handle))
    }

    /// Forbids recycling of a checked-out object until [`Self::unlock`].
    ///
    /// A locked object is skipped by [`Self::release`] and never reclaimed by
    /// [`Self::auto_recycle`].
    pub fn lock(&mut self, handle: Handle) -> Result<(), PoolError> {
        let index = self.checked_out_index(handle)?;
        self.slots[index].locked = true;
        trace!(pool = type_name::<T>(), index, "locked");
        Ok(())
    }

    /// Allows a checked-out object to be recycled again.
    pub fn unlock(&mut self, handle: Handle) -> Result<(), PoolError> {
        let index = self.checked_out_index(handle)?;
        self.slots[index].locked = false;
        trace!(pool = type_name::<T>(), index, "unlocked");
        Ok(())
    }

    /// Checks if a checked-out object is locked.
    pub fn is_locked(&self, handle: Handle) -> Result<bool, PoolError> {
        let index = self.checked_out_index(handle)?;
        Ok(self.slots[index].locked)
    }

    /// Checks if the object behind `handle` sits in the idle set.
    ///
    /// Unlike the other accessors this still answers after the handle was
    /// released, until the object is handed out again or dropped.
    pub fn is_recycled(&self, handle: Handle) -> Result<bool, PoolError> {
        self.ensure_alive()?;
        match self.slots.get(handle.index) {
            Some(slot) if slot.generation == handle.generation && slot.obj.is_some() => {
                Ok(slot.recycled)
            }
            _ => Err(PoolError::StaleHandle(handle)),
        }
    }

    /// Takes a checked-out object out of the pool for good.
    ///
    /// The object no longer counts against the pool's capacity and is never
    /// recycled. This should be used with caution, as the pool loses the
    /// instance it paid to create.
    pub fn detach(&mut self, handle: Handle) -> Result<T, PoolError> {
        let index = self.checked_out_index(handle)?;
        let obj = self.vacate(index).ok_or(PoolError::StaleHandle(handle))?;
        self.checked_out -= 1;
        debug!(pool = type_name::<T>(), index, "detached from pool");
        Ok(obj)
    }

    /// Drops every owned object, idle and checked out, and disables the pool.
    ///
    /// Returns the number of objects dropped. Any later operation fails with
    /// [`PoolError::Disposed`].
    pub fn destroy(&mut self) -> Result<usize, PoolError> {
        self.ensure_alive()?;
        let released = self.current_count();
        self.slots.clear();
        self.idle.clear();
        self.vacant.clear();
        self.checked_out = 0;
        self.disposed = true;
        debug!(pool = type_name::<T>(), released, "pool destroyed");
        self.notify(LifecycleEvent::PoolDestroyed {
            pool: type_name::<T>(),
            released,
        });
        Ok(released)
    }
}

impl<T: Poolable, F: ObjectFactory<T>> ObjectPool<T, F> {
    /// Creates a new pool with the given bounds. A `max_count` of `0` leaves
    /// the pool unbounded.
    ///
    /// This method immediately creates `init_count` idle objects with the
    /// factory.
    pub fn new(factory: F, init_count: usize, max_count: usize) -> Result<Self, PoolError> {
        Self::with_config(factory, PoolConfig::new(init_count, max_count))
    }

    /// Creates a new pool from a full configuration.
    pub fn with_config(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let mut pool = ObjectPool {
            factory,
            slots: Vec::with_capacity(config.init_count),
            idle: Vec::with_capacity(config.init_count),
            vacant: Vec::new(),
            checked_out: 0,
            config,
            disposed: false,
            events: None,
        };
        for _ in 0..pool.config.init_count {
            let obj = pool.factory.create(None)?;
            let index = pool.insert(obj);
            pool.idle.push(index);
        }
        debug!(
            pool = type_name::<T>(),
            init_count = pool.config.init_count,
            max_count = pool.config.max_count,
            "pool created"
        );
        Ok(pool)
    }

    /// Checks an object out of the pool.
    ///
    /// The most recently recycled idle object is reused if there is one, and
    /// `data` is ignored. Otherwise a new object is created from `data` by the
    /// factory, unless the pool is at capacity, which fails with
    /// [`PoolError::Exhausted`].
    pub fn acquire(&mut self, data: Option<&F::Data>) -> Result<Handle, PoolError> {
        self.ensure_alive()?;
        let index = match self.idle.pop() {
            Some(index) => index,
            None => {
                if self.is_full() {
                    let max_count = self.config.max_count;
                    warn!(pool = type_name::<T>(), max_count, "pool exhausted");
                    return Err(PoolError::Exhausted { max_count });
                }
                let obj = self.factory.create(data)?;
                trace!(pool = type_name::<T>(), "created new object");
                self.insert(obj)
            }
        };
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.recycled = false;
        slot.locked = false;
        self.checked_out += 1;
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    /// Returns a checked-out object to the idle set.
    ///
    /// A locked object is left untouched and `Ok(false)` is returned: the
    /// holder has to unlock it first. Otherwise the object's
    /// [`Poolable::on_recycled`] runs once and `Ok(true)` is returned.
    pub fn release(&mut self, handle: Handle) -> Result<bool, PoolError> {
        let index = self.checked_out_index(handle)?;
        if self.slots[index].locked {
            debug!(pool = type_name::<T>(), index, "release skipped, object is locked");
            return Ok(false);
        }
        self.recycle(index);
        self.notify(LifecycleEvent::Recycled {
            pool: type_name::<T>(),
            count: 1,
        });
        Ok(true)
    }

    /// Runs the retention policy and returns the number of objects affected.
    ///
    /// First, if [`PoolConfig::reclaim_checked_out`] is set, every checked-out
    /// object that is not locked is recycled. Locked objects are always
    /// skipped, however long they have been out. Then the idle set is trimmed
    /// to [`PoolConfig::retention`] by dropping the least recently recycled
    /// objects.
    pub fn auto_recycle(&mut self) -> Result<usize, PoolError> {
        self.ensure_alive()?;

        let mut reclaimed = 0;
        if self.config.reclaim_checked_out {
            for index in 0..self.slots.len() {
                let slot = &self.slots[index];
                if slot.obj.is_some() && !slot.recycled && !slot.locked {
                    self.recycle(index);
                    reclaimed += 1;
                }
            }
        }

        let excess = self.idle.len().saturating_sub(self.config.retention());
        let evicted: Vec<usize> = self.idle.drain(..excess).collect();
        for &index in &evicted {
            self.vacate(index);
        }

        if reclaimed + evicted.len() > 0 {
            debug!(
                pool = type_name::<T>(),
                reclaimed,
                evicted = evicted.len(),
                "auto-recycle"
            );
        }
        if reclaimed > 0 {
            self.notify(LifecycleEvent::Recycled {
                pool: type_name::<T>(),
                count: reclaimed,
            });
        }
        Ok(reclaimed + evicted.len())
    }

    fn recycle(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.recycled = true;
        if let Some(obj) = slot.obj.as_mut() {
            obj.on_recycled();
        }
        self.idle.push(index);
        self.checked_out -= 1;
    }
}

impl<T, F> fmt::Debug for ObjectPool<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("type", &type_name::<T>())
            .field("idle", &self.idle.len())
            .field("checked_out", &self.checked_out)
            .field("config", &self.config)
            .field("disposed", &self.disposed)
            .finish()
    }
}
