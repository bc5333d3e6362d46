use criterion::{black_box, criterion_group, criterion_main, Criterion};
use procpool::*;

const BUFFER_SIZE: usize = 64 * 1024;

fn buffer() -> Vec<u8> {
    Vec::with_capacity(BUFFER_SIZE)
}

fn acquire_release(c: &mut Criterion) {
    c.bench_function("procpool", |b| {
        let mut pool = ObjectPool::new(CustomFactory::from_fn(buffer), 1024, 1024).unwrap();
        b.iter(|| {
            let handle = pool.acquire(None).unwrap();
            black_box(pool.get(handle).unwrap().capacity());
            pool.release(handle).unwrap();
        })
    });
    c.bench_function("system", |b| {
        b.iter(|| {
            let obj = black_box(buffer());
            black_box(obj.capacity())
        })
    });
}

fn auto_recycle(c: &mut Criterion) {
    c.bench_function("procpool_auto_recycle", |b| {
        let mut pool = ObjectPool::new(CustomFactory::from_fn(buffer), 256, 0).unwrap();
        b.iter(|| {
            for _ in 0..256 {
                black_box(pool.acquire(None).unwrap());
            }
            black_box(pool.auto_recycle().unwrap())
        })
    });
}

fn state_machine(c: &mut Criterion) {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Ping,
        Pong,
    }

    struct Flip(Key);

    impl State<Key> for Flip {
        fn on_update(&mut self) -> Transition<Key> {
            Transition::To(self.0)
        }
    }

    c.bench_function("fsm_tick", |b| {
        let mut fsm = Fsm::builder("bench")
            .state(Key::Ping, Box::new(Flip(Key::Pong)))
            .state(Key::Pong, Box::new(Flip(Key::Ping)))
            .build()
            .unwrap();
        fsm.change_state(Key::Ping).unwrap();
        b.iter(|| fsm.tick().unwrap())
    });
}

criterion_group!(benches, acquire_release, auto_recycle, state_machine);
criterion_main!(benches);
