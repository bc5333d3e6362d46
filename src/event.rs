use std::{any::Any, borrow::Cow, cell::RefCell, fmt, rc::Rc};
use tracing::trace;

/// A registered event handler.
///
/// Handlers are compared by `Rc` identity, so keep a clone of the `Rc` around to
/// unregister it later.
pub type Listener<E = LifecycleEvent> = Rc<dyn Fn(&E)>;

/// Tag of a [`LifecycleEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Periodic frame notification.
    Tick,
    /// The driver started or stopped.
    RunStateChanged,
    /// Pooled instances went back to the idle set.
    Recycled,
    /// A pool was destroyed.
    PoolDestroyed,
    /// A state machine changed state.
    StateChanged,
    /// Application defined, see [`LifecycleEvent::Custom`].
    Custom(u32),
}

/// Events broadcast by pools, state machines and the runtime driver.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Sent once per driver frame, before modules update.
    Tick {
        /// Frame number, starting at 1.
        frame: u64,
    },
    /// Sent when the driver starts or shuts down.
    RunStateChanged {
        /// `true` after start, `false` after shutdown.
        running: bool,
    },
    /// Sent after release or auto-recycle put instances back in the idle set.
    Recycled {
        /// Type name of the pooled objects.
        pool: &'static str,
        /// Number of instances recycled by the operation.
        count: usize,
    },
    /// Sent after a pool dropped all its instances.
    PoolDestroyed {
        /// Type name of the pooled objects.
        pool: &'static str,
        /// Number of instances the pool owned.
        released: usize,
    },
    /// Sent after a state machine entered a new state.
    StateChanged {
        /// Name the machine was built with.
        machine: Cow<'static, str>,
        /// Debug rendering of the previous state key, if any.
        from: Option<String>,
        /// Debug rendering of the new state key.
        to: String,
    },
    /// Application defined event, tagged for filtering.
    Custom {
        /// Application defined tag.
        tag: u32,
        /// Optional payload, downcast by the receiver.
        payload: Option<Rc<dyn Any>>,
    },
}

impl LifecycleEvent {
    /// Returns the tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Tick { .. } => EventKind::Tick,
            LifecycleEvent::RunStateChanged { .. } => EventKind::RunStateChanged,
            LifecycleEvent::Recycled { .. } => EventKind::Recycled,
            LifecycleEvent::PoolDestroyed { .. } => EventKind::PoolDestroyed,
            LifecycleEvent::StateChanged { .. } => EventKind::StateChanged,
            LifecycleEvent::Custom { tag, .. } => EventKind::Custom(*tag),
        }
    }

    /// Builds a custom event.
    pub fn custom(tag: u32, payload: Option<Rc<dyn Any>>) -> Self {
        LifecycleEvent::Custom { tag, payload }
    }
}

/// In-process, synchronous publish/subscribe bus.
///
/// Delivery happens inside [`Self::dispatch`], in registration order. Nothing is
/// queued or retried. The dispatcher is meant to be shared through an `Rc` by the
/// pools and machines that publish on it.
pub struct EventDispatcher<E = LifecycleEvent> {
    listeners: RefCell<Vec<Listener<E>>>,
}

impl<E> EventDispatcher<E> {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        EventDispatcher {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Wraps the dispatcher in an `Rc` for sharing.
    pub fn into_rc(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// Registers a listener.
    ///
    /// A listener that is already registered is removed first and appended
    /// again, so it is never delivered to twice and moves to the end of the
    /// delivery order.
    pub fn register(&self, listener: &Listener<E>) {
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.push(listener.clone());
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, listener: &Listener<E>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    /// Delivers `event` to every listener registered when the call starts.
    ///
    /// Listeners may register or unregister handlers, themselves included,
    /// while being called; the change applies from the next dispatch on.
    /// Returns the number of listeners called.
    pub fn dispatch(&self, event: &E) -> usize {
        let snapshot = self.listeners.borrow().clone();
        for listener in snapshot.iter() {
            listener(event);
        }
        snapshot.len()
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Checks if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Unregisters every listener.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

impl EventDispatcher<LifecycleEvent> {
    pub(crate) fn publish(&self, event: LifecycleEvent) {
        trace!(kind = ?event.kind(), "dispatching lifecycle event");
        self.dispatch(&event);
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

// Data pointers only; vtable pointers of the same closure may differ.
fn same_listener<E>(a: &Listener<E>, b: &Listener<E>) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}
