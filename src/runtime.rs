use crate::{
    EventDispatcher, Fsm, LifecycleEvent, PoolRegistry, ProcedureFsm, RuntimeConfig,
    RuntimeError, State, StateKey,
};
use std::{any::Any, fmt, rc::Rc, time::Duration};
use tracing::{debug, error, info};

/// Timing of the frame being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Frame number, starting at 1.
    pub index: u64,
    /// Time elapsed since the previous frame.
    pub elapsed: Duration,
}

/// Upcast to [`Any`], implemented for every `'static` type.
///
/// Lets the [`Runtime`] hand back a module by its concrete type.
pub trait AsAny {
    /// Returns `self` as a shared [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as a mutable [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of work driven by the [`Runtime`] once per frame.
pub trait Module: AsAny {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Modules with a higher priority update first.
    fn priority(&self) -> i32 {
        0
    }

    /// Called once per frame while the runtime is running.
    fn update(&mut self, frame: &Frame) -> Result<(), RuntimeError>;

    /// Called once when the runtime shuts down.
    fn shutdown(&mut self) {}
}

/// Frame driver owning the modules of an application.
///
/// All state lives in this value: it is created at startup, passed to whoever
/// needs it and torn down with [`Self::shutdown`].
pub struct Runtime {
    config: RuntimeConfig,
    events: Rc<EventDispatcher>,
    modules: Vec<Box<dyn Module>>,
    frame: u64,
    running: bool,
}

impl Runtime {
    /// Creates a stopped runtime with its own dispatcher.
    pub fn new(config: RuntimeConfig) -> Self {
        Runtime {
            config,
            events: EventDispatcher::new().into_rc(),
            modules: Vec::new(),
            frame: 0,
            running: false,
        }
    }

    /// Returns the dispatcher shared by the runtime and its modules.
    pub fn events(&self) -> &Rc<EventDispatcher> {
        &self.events
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Creates a pool registry configured from the runtime config and wired
    /// to the runtime dispatcher. Add it with [`Self::add_module`].
    pub fn pool_registry(&self) -> PoolRegistry {
        PoolRegistry::new(self.config.pool.clone())
            .with_auto_recycle_interval(self.config.auto_recycle_interval)
            .with_events(self.events.clone())
    }

    /// Adds a module after every module of greater or equal priority.
    pub fn add_module(&mut self, module: Box<dyn Module>) {
        let at = self
            .modules
            .iter()
            .position(|m| module.priority() > m.priority())
            .unwrap_or(self.modules.len());
        debug!(module = module.name(), priority = module.priority(), "module added");
        self.modules.insert(at, module);
    }

    /// Returns the first module of type `M`.
    pub fn module<M: Module + 'static>(&self) -> Option<&M> {
        self.modules
            .iter()
            .find_map(|m| (**m).as_any().downcast_ref::<M>())
    }

    /// Returns the first module of type `M` mutably.
    ///
    /// This is how callers keep driving a module after handing it over, for
    /// example acquiring from a [`PoolRegistry`] or changing procedure.
    pub fn module_mut<M: Module + 'static>(&mut self) -> Option<&mut M> {
        self.modules
            .iter_mut()
            .find_map(|m| (**m).as_any_mut().downcast_mut::<M>())
    }

    /// Shuts down and removes the first module of type `M`. Returns `false`
    /// if there was none.
    pub fn shutdown_module<M: Module + 'static>(&mut self) -> bool {
        let Some(at) = self
            .modules
            .iter()
            .position(|m| (**m).as_any().is::<M>())
        else {
            return false;
        };
        let mut module = self.modules.remove(at);
        debug!(module = module.name(), "shutting down module");
        module.shutdown();
        true
    }

    /// Returns module names in update order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of the last frame processed.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Checks if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts the runtime. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        info!(modules = self.modules.len(), "runtime started");
        self.events
            .publish(LifecycleEvent::RunStateChanged { running: true });
    }

    /// Processes one frame: broadcasts [`LifecycleEvent::Tick`], then updates
    /// every module in priority order. Stops at the first module error.
    pub fn tick(&mut self, elapsed: Duration) -> Result<(), RuntimeError> {
        if !self.running {
            return Err(RuntimeError::NotRunning);
        }
        self.frame += 1;
        let frame = Frame {
            index: self.frame,
            elapsed,
        };
        self.events
            .publish(LifecycleEvent::Tick { frame: frame.index });
        for module in self.modules.iter_mut() {
            module.update(&frame)?;
        }
        Ok(())
    }

    /// Shuts every module down, in update order, and stops the runtime.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        for module in self.modules.iter_mut() {
            debug!(module = module.name(), "shutting down module");
            module.shutdown();
        }
        self.running = false;
        info!(frames = self.frame, "runtime stopped");
        self.events
            .publish(LifecycleEvent::RunStateChanged { running: false });
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("modules", &self.module_names())
            .field("frame", &self.frame)
            .field("running", &self.running)
            .finish()
    }
}

impl<K: StateKey, S: ?Sized + State<K> + 'static> Module for Fsm<K, S> {
    fn name(&self) -> &str {
        Fsm::name(self)
    }

    fn update(&mut self, _frame: &Frame) -> Result<(), RuntimeError> {
        Ok(self.tick()?)
    }

    fn shutdown(&mut self) {
        self.exit();
    }
}

impl<K: StateKey, SK: StateKey> Module for ProcedureFsm<K, SK> {
    fn name(&self) -> &str {
        ProcedureFsm::name(self)
    }

    // Procedures run after plain state machines.
    fn priority(&self) -> i32 {
        -1
    }

    fn update(&mut self, _frame: &Frame) -> Result<(), RuntimeError> {
        Ok(self.tick()?)
    }

    fn shutdown(&mut self) {
        self.exit();
    }
}

impl Module for PoolRegistry {
    fn name(&self) -> &str {
        "pools"
    }

    fn priority(&self) -> i32 {
        -2
    }

    fn update(&mut self, frame: &Frame) -> Result<(), RuntimeError> {
        let interval = self.auto_recycle_interval;
        if interval > 0 && frame.index % interval == 0 {
            self.auto_recycle_all()?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.destroy_all() {
            error!(%err, "failed to destroy pools on shutdown");
        }
    }
}
