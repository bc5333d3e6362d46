use crate::{EventDispatcher, FsmError, LifecycleEvent};
use std::{any::Any, borrow::Cow, collections::HashMap, fmt, hash::Hash, rc::Rc};
use tracing::{debug, error, trace};

/// Identifies a state inside a machine, usually a fieldless enum.
pub trait StateKey: Copy + Eq + Hash + fmt::Debug + 'static {}

impl<K> StateKey for K where K: Copy + Eq + Hash + fmt::Debug + 'static {}

/// What a state asks its machine to do after an update hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<K> {
    /// Keep the current state.
    Stay,
    /// Change to the given state once the hook has returned.
    To(K),
}

/// Behavior of one state. Every hook defaults to doing nothing.
///
/// States cannot reach their machine while a hook runs. Transitions are
/// requested by returning [`Transition::To`] from an update hook, so exit and
/// enter calls are never interleaved.
pub trait State<K> {
    /// Called once, when the state instance is built.
    fn on_init(&mut self) {}

    /// Called when the state becomes active. `previous` is `None` on the
    /// machine's first transition.
    fn on_enter(&mut self, _previous: Option<K>) {}

    /// Called instead of [`Self::on_enter`] when the state is entered through
    /// [`Fsm::change_state_with`]. Defaults to ignoring `args`.
    fn on_enter_with(&mut self, previous: Option<K>, _args: &dyn Any) {
        self.on_enter(previous)
    }

    /// Called by [`Fsm::tick`] while the state is active.
    fn on_update(&mut self) -> Transition<K> {
        Transition::Stay
    }

    /// Called by [`Fsm::fixed_tick`] while the state is active.
    fn on_fixed_update(&mut self) -> Transition<K> {
        Transition::Stay
    }

    /// Called when the state stops being active.
    fn on_exit(&mut self) {}
}

type Constructor<S> = Box<dyn FnOnce() -> Box<S>>;

struct Entry<S: ?Sized> {
    ctor: Option<Constructor<S>>,
    state: Option<Box<S>>,
}

/// Collects the closed set of states of an [`Fsm`].
pub struct FsmBuilder<K, S: ?Sized = dyn State<K>> {
    name: Cow<'static, str>,
    entries: Vec<(K, Entry<S>)>,
    events: Option<Rc<EventDispatcher>>,
}

impl<K: StateKey, S: ?Sized + State<K>> FsmBuilder<K, S> {
    pub(crate) fn new(name: impl Into<Cow<'static, str>>) -> Self {
        FsmBuilder {
            name: name.into(),
            entries: Vec::new(),
            events: None,
        }
    }

    /// Registers a state instance under `key`.
    pub fn state(mut self, key: K, state: Box<S>) -> Self {
        self.entries.push((
            key,
            Entry {
                ctor: None,
                state: Some(state),
            },
        ));
        self
    }

    /// Registers a state under `key` that is built on first entry and then
    /// reused for every later entry.
    pub fn state_with<C>(mut self, key: K, ctor: C) -> Self
    where
        C: FnOnce() -> Box<S> + 'static,
    {
        self.entries.push((
            key,
            Entry {
                ctor: Some(Box::new(ctor)),
                state: None,
            },
        ));
        self
    }

    /// Broadcasts state changes on `events`.
    pub fn events(mut self, events: Rc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the machine. No state is active until the first
    /// [`Fsm::change_state`].
    pub fn build(self) -> Result<Fsm<K, S>, FsmError> {
        let mut states = HashMap::with_capacity(self.entries.len());
        for (key, mut entry) in self.entries {
            if states.contains_key(&key) {
                return Err(FsmError::DuplicateState(format!("{key:?}")));
            }
            if let Some(state) = entry.state.as_mut() {
                state.on_init();
            }
            states.insert(key, entry);
        }
        debug!(machine = %self.name, states = states.len(), "state machine built");
        Ok(Fsm {
            name: self.name,
            states,
            current: None,
            events: self.events,
        })
    }
}

impl<K, S: ?Sized> fmt::Debug for FsmBuilder<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmBuilder")
            .field("name", &self.name)
            .field("states", &self.entries.len())
            .finish()
    }
}

/// A finite state machine with at most one active state.
///
/// The set of states is fixed when the machine is built. Each key maps to a
/// single instance that is reused across every entry into that state.
///
/// Changing to the state that is already active is a no-op: the state is
/// neither exited nor re-entered and [`Self::change_state`] returns
/// `Ok(false)`.
pub struct Fsm<K, S: ?Sized = dyn State<K>> {
    name: Cow<'static, str>,
    states: HashMap<K, Entry<S>>,
    current: Option<K>,
    events: Option<Rc<EventDispatcher>>,
}

impl<K: StateKey> Fsm<K> {
    /// Starts building a machine called `name`.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> FsmBuilder<K> {
        FsmBuilder::new(name)
    }
}

impl<K: StateKey, S: ?Sized + State<K>> Fsm<K, S> {
    /// Returns the name the machine was built with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key of the active state.
    pub fn current_state(&self) -> Option<K> {
        self.current
    }

    /// Checks if a state is active.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Checks if `key` is one of the registered states.
    pub fn contains(&self, key: K) -> bool {
        self.states.contains_key(&key)
    }

    /// Returns the number of registered states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Checks if the machine has no states at all.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns the active state.
    pub fn current_state_mut(&mut self) -> Option<&mut S> {
        let key = self.current?;
        self.states.get_mut(&key)?.state.as_deref_mut()
    }

    /// Returns a state that has already been built.
    pub fn state(&self, key: K) -> Option<&S> {
        self.states.get(&key)?.state.as_deref()
    }

    /// Returns a state that has already been built, active or not.
    pub fn state_mut(&mut self, key: K) -> Option<&mut S> {
        self.states.get_mut(&key)?.state.as_deref_mut()
    }

    /// Exits the active state, if any, then enters `to`.
    ///
    /// Returns `Ok(false)` when `to` is already active.
    pub fn change_state(&mut self, to: K) -> Result<bool, FsmError> {
        self.transition(to, None)
    }

    /// Like [`Self::change_state`], but hands `args` to the target's
    /// [`State::on_enter_with`].
    ///
    /// A self-transition is still a no-op and `args` is not delivered.
    pub fn change_state_with(&mut self, to: K, args: &dyn Any) -> Result<bool, FsmError> {
        self.transition(to, Some(args))
    }

    fn transition(&mut self, to: K, args: Option<&dyn Any>) -> Result<bool, FsmError> {
        if !self.states.contains_key(&to) {
            error!(machine = %self.name, state = ?to, "transition to unregistered state");
            return Err(FsmError::InvalidTransition(format!("{to:?}")));
        }
        if self.current == Some(to) {
            trace!(machine = %self.name, state = ?to, "self-transition ignored");
            return Ok(false);
        }

        let previous = self.exit();
        self.current = Some(to);
        let state = self.instantiate(to)?;
        match args {
            Some(args) => state.on_enter_with(previous, args),
            None => state.on_enter(previous),
        }

        debug!(machine = %self.name, from = ?previous, to = ?to, "state changed");
        if let Some(events) = &self.events {
            events.publish(LifecycleEvent::StateChanged {
                machine: self.name.clone(),
                from: previous.map(|k| format!("{k:?}")),
                to: format!("{to:?}"),
            });
        }
        Ok(true)
    }

    /// Exits the active state without entering another one.
    ///
    /// Returns the key of the state that was exited.
    pub fn exit(&mut self) -> Option<K> {
        let previous = self.current.take()?;
        if let Some(state) = self
            .states
            .get_mut(&previous)
            .and_then(|entry| entry.state.as_deref_mut())
        {
            state.on_exit();
        }
        Some(previous)
    }

    /// Runs the active state's [`State::on_update`] and applies the
    /// transition it returns.
    pub fn tick(&mut self) -> Result<(), FsmError> {
        self.drive(|state| Ok(state.on_update()))
    }

    /// Runs the active state's [`State::on_fixed_update`] and applies the
    /// transition it returns.
    pub fn fixed_tick(&mut self) -> Result<(), FsmError> {
        self.drive(|state| Ok(state.on_fixed_update()))
    }

    /// Runs `hook` on the active state and applies the transition it returns.
    pub(crate) fn drive<H>(&mut self, hook: H) -> Result<(), FsmError>
    where
        H: FnOnce(&mut S) -> Result<Transition<K>, FsmError>,
    {
        let transition = match self.current_state_mut() {
            Some(state) => hook(state)?,
            None => return Ok(()),
        };
        if let Transition::To(next) = transition {
            self.change_state(next)?;
        }
        Ok(())
    }

    fn instantiate(&mut self, key: K) -> Result<&mut S, FsmError> {
        let entry = self
            .states
            .get_mut(&key)
            .ok_or_else(|| FsmError::InvalidTransition(format!("{key:?}")))?;
        if let Some(ctor) = entry.ctor.take() {
            let mut state = ctor();
            state.on_init();
            trace!(state = ?key, "state built on first entry");
            entry.state = Some(state);
        }
        entry
            .state
            .as_deref_mut()
            .ok_or_else(|| FsmError::InvalidTransition(format!("{key:?}")))
    }
}

impl<K: fmt::Debug, S: ?Sized> fmt::Debug for Fsm<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("name", &self.name)
            .field("states", &self.states.len())
            .field("current", &self.current)
            .finish()
    }
}
