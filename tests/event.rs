use procpool::*;
use std::{cell::RefCell, rc::Rc};

type Seen = Rc<RefCell<Vec<String>>>;

fn recorder(name: &'static str, seen: &Seen) -> Listener {
    let seen = seen.clone();
    Rc::new(move |event: &LifecycleEvent| {
        seen.borrow_mut().push(format!("{name}:{:?}", event.kind()));
    })
}

#[test]
fn test_dispatch_in_registration_order() {
    let seen = Seen::default();
    let events = EventDispatcher::new();
    let a = recorder("a", &seen);
    let b = recorder("b", &seen);
    events.register(&a);
    events.register(&b);

    assert_eq!(events.dispatch(&LifecycleEvent::Tick { frame: 1 }), 2);
    assert_eq!(*seen.borrow(), ["a:Tick", "b:Tick"]);
}

#[test]
fn test_register_twice_delivers_once() {
    let seen = Seen::default();
    let events = EventDispatcher::new();
    let a = recorder("a", &seen);
    let b = recorder("b", &seen);
    events.register(&a);
    events.register(&b);
    events.register(&a);
    assert_eq!(events.len(), 2);

    events.dispatch(&LifecycleEvent::RunStateChanged { running: true });
    // re-registering moves the listener to the back
    assert_eq!(*seen.borrow(), ["b:RunStateChanged", "a:RunStateChanged"]);
}

#[test]
fn test_unregister() {
    let seen = Seen::default();
    let events = EventDispatcher::new();
    let a = recorder("a", &seen);
    events.register(&a);

    assert!(events.unregister(&a));
    assert!(!events.unregister(&a));
    assert_eq!(events.dispatch(&LifecycleEvent::Tick { frame: 1 }), 0);
    assert!(seen.borrow().is_empty());
    assert!(events.is_empty());
}

#[test]
fn test_clones_of_one_listener_are_the_same_handler() {
    let seen = Seen::default();
    let events = EventDispatcher::new();
    let a = recorder("a", &seen);
    events.register(&a.clone());
    assert!(events.unregister(&a));
}

#[test]
fn test_unregister_during_dispatch() {
    let seen = Seen::default();
    let events = EventDispatcher::new().into_rc();
    let slot: Rc<RefCell<Option<Listener>>> = Rc::default();

    let bus = Rc::downgrade(&events);
    let me = slot.clone();
    let log = seen.clone();
    let once: Listener = Rc::new(move |_: &LifecycleEvent| {
        log.borrow_mut().push("once".into());
        if let (Some(bus), Some(me)) = (bus.upgrade(), me.borrow().as_ref()) {
            bus.unregister(me);
        }
    });
    *slot.borrow_mut() = Some(once.clone());

    let after = recorder("after", &seen);
    events.register(&once);
    events.register(&after);

    events.dispatch(&LifecycleEvent::Tick { frame: 1 });
    events.dispatch(&LifecycleEvent::Tick { frame: 2 });
    assert_eq!(*seen.borrow(), ["once", "after:Tick", "after:Tick"]);
    assert_eq!(events.len(), 1);
}

#[test]
fn test_listener_removing_a_later_one_keeps_current_delivery() {
    let seen = Seen::default();
    let events = EventDispatcher::new().into_rc();
    let later = recorder("later", &seen);

    let bus = Rc::downgrade(&events);
    let target = later.clone();
    let remover: Listener = Rc::new(move |_: &LifecycleEvent| {
        if let Some(bus) = bus.upgrade() {
            bus.unregister(&target);
        }
    });
    events.register(&remover);
    events.register(&later);

    events.dispatch(&LifecycleEvent::Tick { frame: 1 });
    events.dispatch(&LifecycleEvent::Tick { frame: 2 });
    assert_eq!(*seen.borrow(), ["later:Tick"]);
}

#[test]
fn test_custom_event_payload() {
    let events = EventDispatcher::new();
    let got = Rc::new(RefCell::new(None));
    let sink = got.clone();
    let listener: Listener = Rc::new(move |event: &LifecycleEvent| {
        if let LifecycleEvent::Custom { tag: 7, payload: Some(payload) } = event {
            *sink.borrow_mut() = payload.downcast_ref::<u32>().copied();
        }
    });
    events.register(&listener);

    let event = LifecycleEvent::custom(7, Some(Rc::new(42u32)));
    assert_eq!(event.kind(), EventKind::Custom(7));
    events.dispatch(&event);
    assert_eq!(*got.borrow(), Some(42));
}

#[test]
fn test_generic_event_type() {
    let events: EventDispatcher<String> = EventDispatcher::new();
    let seen = Rc::new(RefCell::new(String::new()));
    let sink = seen.clone();
    let listener: Listener<String> =
        Rc::new(move |event: &String| sink.borrow_mut().push_str(event));
    events.register(&listener);
    events.dispatch(&"hello".to_string());
    assert_eq!(*seen.borrow(), "hello");
}
