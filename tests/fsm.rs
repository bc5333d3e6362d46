use procpool::*;
use std::{cell::RefCell, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    A,
    B,
    C,
}

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
    next: Option<Key>,
}

impl Recorder {
    fn boxed(name: &'static str, log: &Log) -> Box<Self> {
        Box::new(Recorder {
            name,
            log: log.clone(),
            next: None,
        })
    }
}

impl State<Key> for Recorder {
    fn on_init(&mut self) {
        self.log.borrow_mut().push(format!("{}.init", self.name));
    }

    fn on_enter(&mut self, previous: Option<Key>) {
        self.log
            .borrow_mut()
            .push(format!("{}.enter({:?})", self.name, previous));
    }

    fn on_update(&mut self) -> Transition<Key> {
        self.log.borrow_mut().push(format!("{}.update", self.name));
        match self.next.take() {
            Some(key) => Transition::To(key),
            None => Transition::Stay,
        }
    }

    fn on_fixed_update(&mut self) -> Transition<Key> {
        self.log.borrow_mut().push(format!("{}.fixed", self.name));
        Transition::Stay
    }

    fn on_exit(&mut self) {
        self.log.borrow_mut().push(format!("{}.exit", self.name));
    }
}

fn machine(log: &Log) -> Fsm<Key> {
    Fsm::builder("test")
        .state(Key::A, Recorder::boxed("A", log))
        .state(Key::B, Recorder::boxed("B", log))
        .build()
        .unwrap()
}

fn take(log: &Log) -> Vec<String> {
    log.borrow_mut().drain(..).collect()
}

#[test]
fn test_no_state_before_first_transition() {
    let log = Log::default();
    let mut fsm = machine(&log);
    assert_eq!(fsm.current_state(), None);
    assert!(!fsm.is_active());
    assert_eq!(take(&log), ["A.init", "B.init"]);

    // ticking an idle machine does nothing
    fsm.tick().unwrap();
    assert!(take(&log).is_empty());
}

#[test]
fn test_exit_then_enter_with_previous() {
    let log = Log::default();
    let mut fsm = machine(&log);
    take(&log);

    assert_eq!(fsm.change_state(Key::A), Ok(true));
    assert_eq!(fsm.change_state(Key::B), Ok(true));
    assert_eq!(take(&log), ["A.enter(None)", "A.exit", "B.enter(Some(A))"]);
    assert_eq!(fsm.current_state(), Some(Key::B));
}

#[test]
fn test_self_transition_is_noop() {
    let log = Log::default();
    let mut fsm = machine(&log);
    fsm.change_state(Key::A).unwrap();
    take(&log);

    assert_eq!(fsm.change_state(Key::A), Ok(false));
    assert!(take(&log).is_empty());
    assert_eq!(fsm.current_state(), Some(Key::A));
}

#[test]
fn test_unregistered_state() {
    let log = Log::default();
    let mut fsm = machine(&log);
    fsm.change_state(Key::A).unwrap();
    take(&log);

    assert_eq!(
        fsm.change_state(Key::C),
        Err(FsmError::InvalidTransition("C".into()))
    );
    // the active state is untouched
    assert!(take(&log).is_empty());
    assert_eq!(fsm.current_state(), Some(Key::A));
}

#[test]
fn test_duplicate_state() {
    let log = Log::default();
    let err = Fsm::builder("dup")
        .state(Key::A, Recorder::boxed("A", &log))
        .state(Key::A, Recorder::boxed("A2", &log))
        .build()
        .unwrap_err();
    assert_eq!(err, FsmError::DuplicateState("A".into()));
}

#[test]
fn test_tick_applies_returned_transition() {
    let log = Log::default();
    let mut a = Recorder::boxed("A", &log);
    a.next = Some(Key::B);
    let mut fsm = Fsm::builder("tick")
        .state(Key::A, a)
        .state(Key::B, Recorder::boxed("B", &log))
        .build()
        .unwrap();
    fsm.change_state(Key::A).unwrap();
    take(&log);

    fsm.tick().unwrap();
    assert_eq!(take(&log), ["A.update", "A.exit", "B.enter(Some(A))"]);

    fsm.fixed_tick().unwrap();
    fsm.tick().unwrap();
    assert_eq!(take(&log), ["B.fixed", "B.update"]);
}

#[test]
fn test_tick_to_unregistered_state_fails() {
    let log = Log::default();
    let mut a = Recorder::boxed("A", &log);
    a.next = Some(Key::C);
    let mut fsm = Fsm::builder("bad").state(Key::A, a).build().unwrap();
    fsm.change_state(Key::A).unwrap();

    assert!(matches!(fsm.tick(), Err(FsmError::InvalidTransition(_))));
    assert_eq!(fsm.current_state(), Some(Key::A));
}

#[test]
fn test_lazy_state_is_built_once() {
    let log = Log::default();
    let built = Rc::new(RefCell::new(0));
    let counter = built.clone();
    let lazy_log = log.clone();
    let mut fsm = Fsm::builder("lazy")
        .state(Key::A, Recorder::boxed("A", &log))
        .state_with(Key::B, move || {
            *counter.borrow_mut() += 1;
            Recorder::boxed("B", &lazy_log) as Box<dyn State<Key>>
        })
        .build()
        .unwrap();
    assert_eq!(*built.borrow(), 0);
    assert!(fsm.state(Key::B).is_none());

    fsm.change_state(Key::B).unwrap();
    fsm.change_state(Key::A).unwrap();
    fsm.change_state(Key::B).unwrap();
    assert_eq!(*built.borrow(), 1);
    assert_eq!(
        take(&log),
        [
            "A.init",
            "B.init",
            "B.enter(None)",
            "B.exit",
            "A.enter(Some(B))",
            "A.exit",
            "B.enter(Some(A))",
        ]
    );
}

#[test]
fn test_exit_leaves_machine_idle() {
    let log = Log::default();
    let mut fsm = machine(&log);
    fsm.change_state(Key::A).unwrap();
    take(&log);

    assert_eq!(fsm.exit(), Some(Key::A));
    assert_eq!(fsm.exit(), None);
    assert_eq!(take(&log), ["A.exit"]);

    fsm.change_state(Key::B).unwrap();
    assert_eq!(take(&log), ["B.enter(None)"]);
}

#[test]
fn test_state_changed_events() {
    let events = EventDispatcher::new().into_rc();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let listener: Listener = Rc::new(move |event: &LifecycleEvent| {
        if let LifecycleEvent::StateChanged { machine, from, to } = event {
            sink.borrow_mut()
                .push(format!("{machine}: {from:?} -> {to}"));
        }
    });
    events.register(&listener);

    let log = Log::default();
    let mut fsm = Fsm::builder("hero")
        .state(Key::A, Recorder::boxed("A", &log))
        .state(Key::B, Recorder::boxed("B", &log))
        .events(events)
        .build()
        .unwrap();
    fsm.change_state(Key::A).unwrap();
    fsm.change_state(Key::A).unwrap();
    fsm.change_state(Key::B).unwrap();

    assert_eq!(
        *seen.borrow(),
        ["hero: None -> A", "hero: Some(\"A\") -> B"]
    );
}

struct Spawner {
    log: Log,
    wave: u32,
}

impl State<Key> for Spawner {
    fn on_enter(&mut self, previous: Option<Key>) {
        self.log
            .borrow_mut()
            .push(format!("spawn.enter({previous:?}) wave {}", self.wave));
    }

    fn on_enter_with(&mut self, previous: Option<Key>, args: &dyn std::any::Any) {
        if let Some(wave) = args.downcast_ref::<u32>() {
            self.wave = *wave;
        }
        self.on_enter(previous);
    }
}

#[test]
fn test_change_state_with_args() {
    let log = Log::default();
    let mut fsm = Fsm::builder("args")
        .state(Key::A, Recorder::boxed("A", &log))
        .state(
            Key::B,
            Box::new(Spawner {
                log: log.clone(),
                wave: 0,
            }),
        )
        .build()
        .unwrap();
    take(&log);

    // states that do not read arguments just enter
    assert_eq!(fsm.change_state_with(Key::A, &"ignored"), Ok(true));
    assert_eq!(fsm.change_state_with(Key::B, &3u32), Ok(true));
    assert_eq!(
        take(&log),
        ["A.enter(None)", "A.exit", "spawn.enter(Some(A)) wave 3"]
    );

    // a self-transition does not deliver arguments
    assert_eq!(fsm.change_state_with(Key::B, &9u32), Ok(false));
    assert!(take(&log).is_empty());

    fsm.change_state(Key::A).unwrap();
    fsm.change_state(Key::B).unwrap();
    assert_eq!(take(&log).last().unwrap(), "spawn.enter(Some(A)) wave 3");
}

#[test]
fn test_state_mut_reaches_inactive_states() {
    let log = Log::default();
    let mut fsm = machine(&log);
    fsm.change_state(Key::A).unwrap();
    take(&log);

    fsm.state_mut(Key::B).unwrap().on_init();
    assert_eq!(take(&log), ["B.init"]);
    assert!(fsm.state_mut(Key::C).is_none());
}
