//! Procedures: top-level phases of an application, each owning an optional
//! nested sub-procedure.
//!
//! Leaving a procedure always tears its sub-procedure down first, so a
//! sub-phase never outlives the phase that owns it.

use crate::{EventDispatcher, Fsm, FsmBuilder, FsmError, State, StateKey, Transition};
use std::{any::Any, borrow::Cow, fmt, rc::Rc};
use tracing::trace;

/// Behavior of a procedure keyed by `K`, whose sub-procedures are keyed by `SK`.
///
/// The hooks receive the procedure's own sub-procedure machine, which they may
/// drive directly.
pub trait Procedure<K, SK> {
    /// Called once, when the procedure is registered.
    fn on_init(&mut self) {}

    /// Called when the procedure becomes active.
    fn on_enter(&mut self, _previous: Option<K>, _subs: &mut Fsm<SK>) {}

    /// Called instead of [`Self::on_enter`] when the procedure is entered
    /// through [`ProcedureFsm::change_state_with`]. Defaults to ignoring `args`.
    fn on_enter_with(&mut self, previous: Option<K>, _args: &dyn Any, subs: &mut Fsm<SK>) {
        self.on_enter(previous, subs)
    }

    /// Called once per [`ProcedureFsm::tick`], after the active sub-procedure
    /// has been updated.
    fn on_update(&mut self, _subs: &mut Fsm<SK>) -> Transition<K> {
        Transition::Stay
    }

    /// Called when the procedure stops being active, after its sub-procedure
    /// has been exited.
    fn on_exit(&mut self) {}
}

/// A procedure together with the sub-procedure machine it owns.
struct ProcedureNode<K, SK> {
    procedure: Box<dyn Procedure<K, SK>>,
    subs: Fsm<SK>,
}

impl<K: StateKey, SK: StateKey> ProcedureNode<K, SK> {
    fn update(&mut self) -> Result<Transition<K>, FsmError> {
        self.subs.tick()?;
        Ok(self.procedure.on_update(&mut self.subs))
    }
}

// Updates go through `ProcedureNode::update` so sub-procedure errors propagate.
impl<K: StateKey, SK: StateKey> State<K> for ProcedureNode<K, SK> {
    fn on_init(&mut self) {
        self.procedure.on_init();
    }

    fn on_enter(&mut self, previous: Option<K>) {
        self.procedure.on_enter(previous, &mut self.subs);
    }

    fn on_enter_with(&mut self, previous: Option<K>, args: &dyn Any) {
        self.procedure.on_enter_with(previous, args, &mut self.subs);
    }

    fn on_exit(&mut self) {
        if let Some(sub) = self.subs.exit() {
            trace!(sub = ?sub, "sub-procedure exited with its parent");
        }
        self.procedure.on_exit();
    }
}

type Pending<K, SK> = (K, Box<dyn Procedure<K, SK>>, FsmBuilder<SK>);

/// Builder of a [`ProcedureFsm`].
///
/// Sub-procedure machines are built together with the procedure machine, in
/// [`Self::build`].
pub struct ProcedureFsmBuilder<K, SK> {
    inner: FsmBuilder<K, ProcedureNode<K, SK>>,
    pending: Vec<Pending<K, SK>>,
    events: Option<Rc<EventDispatcher>>,
}

impl<K: StateKey, SK: StateKey> ProcedureFsmBuilder<K, SK> {
    /// Registers a procedure without sub-procedures.
    pub fn procedure<P>(self, key: K, procedure: P) -> Self
    where
        P: Procedure<K, SK> + 'static,
    {
        let name = format!("{key:?}");
        self.procedure_with(key, procedure, Fsm::builder(name))
    }

    /// Registers a procedure together with the states of its sub-procedure
    /// machine.
    pub fn procedure_with<P>(mut self, key: K, procedure: P, subs: FsmBuilder<SK>) -> Self
    where
        P: Procedure<K, SK> + 'static,
    {
        let procedure: Box<dyn Procedure<K, SK>> = Box::new(procedure);
        self.pending.push((key, procedure, subs));
        self
    }

    /// Broadcasts procedure and sub-procedure changes on `events`, for every
    /// procedure registered before or after this call.
    pub fn events(mut self, events: Rc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the machine. Fails if a key was registered twice, at either
    /// level.
    pub fn build(self) -> Result<ProcedureFsm<K, SK>, FsmError> {
        let mut inner = self.inner;
        for (key, procedure, subs) in self.pending {
            let subs = match &self.events {
                Some(events) => subs.events(events.clone()),
                None => subs,
            };
            let node = ProcedureNode {
                procedure,
                subs: subs.build()?,
            };
            inner = inner.state(key, Box::new(node));
        }
        if let Some(events) = self.events {
            inner = inner.events(events);
        }
        Ok(ProcedureFsm {
            fsm: inner.build()?,
        })
    }
}

impl<K, SK> fmt::Debug for ProcedureFsmBuilder<K, SK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureFsmBuilder")
            .field("inner", &self.inner)
            .field("procedures", &self.pending.len())
            .finish()
    }
}

/// A state machine over procedures.
///
/// On a change from `old` to `new`, the calls are strictly ordered:
/// the active sub-procedure of `old` exits, then `old` exits, then
/// `new` enters with `old` as its previous procedure.
pub struct ProcedureFsm<K, SK> {
    fsm: Fsm<K, ProcedureNode<K, SK>>,
}

impl<K: StateKey, SK: StateKey> ProcedureFsm<K, SK> {
    /// Starts building a procedure machine called `name`.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> ProcedureFsmBuilder<K, SK> {
        ProcedureFsmBuilder {
            inner: FsmBuilder::new(name),
            pending: Vec::new(),
            events: None,
        }
    }

    /// Returns the name the machine was built with.
    pub fn name(&self) -> &str {
        self.fsm.name()
    }

    /// Returns the active procedure.
    pub fn current_procedure(&self) -> Option<K> {
        self.fsm.current_state()
    }

    /// Returns the active sub-procedure of the active procedure.
    pub fn current_sub_procedure(&self) -> Option<SK> {
        let key = self.fsm.current_state()?;
        self.fsm.state(key)?.subs.current_state()
    }

    /// Changes procedure. See [`Fsm::change_state`] for the self-transition
    /// policy.
    pub fn change_state(&mut self, to: K) -> Result<bool, FsmError> {
        self.fsm.change_state(to)
    }

    /// Changes procedure, handing `args` to [`Procedure::on_enter_with`].
    pub fn change_state_with(&mut self, to: K, args: &dyn Any) -> Result<bool, FsmError> {
        self.fsm.change_state_with(to, args)
    }

    /// Changes the sub-procedure of the active procedure.
    pub fn change_sub_procedure(&mut self, to: SK) -> Result<bool, FsmError> {
        self.sub_procedures()?.change_state(to)
    }

    /// Changes the sub-procedure of the active procedure, handing `args` to
    /// [`State::on_enter_with`].
    pub fn change_sub_procedure_with(
        &mut self,
        to: SK,
        args: &dyn Any,
    ) -> Result<bool, FsmError> {
        self.sub_procedures()?.change_state_with(to, args)
    }

    fn sub_procedures(&mut self) -> Result<&mut Fsm<SK>, FsmError> {
        let node = self.fsm.current_state_mut().ok_or(FsmError::NoActiveState)?;
        Ok(&mut node.subs)
    }

    /// Exits the active sub-procedure, leaving the procedure without one.
    pub fn clear_sub_procedure(&mut self) -> Result<Option<SK>, FsmError> {
        Ok(self.sub_procedures()?.exit())
    }

    /// Updates the active sub-procedure, then the active procedure, then
    /// applies the transition the procedure returned.
    pub fn tick(&mut self) -> Result<(), FsmError> {
        self.fsm.drive(|node| node.update())
    }

    /// Exits the active procedure, sub-procedure first.
    pub fn exit(&mut self) -> Option<K> {
        self.fsm.exit()
    }
}

impl<K: fmt::Debug, SK> fmt::Debug for ProcedureFsm<K, SK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureFsm").field("fsm", &self.fsm).finish()
    }
}
