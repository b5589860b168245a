use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trivalent::{
    Clock, EngineConfig, EngineError, FixedEntropy, ManualClock, OwnerId, Reevaluate,
    TernaryEngine, TritState,
};

fn manual_engine(config: EngineConfig) -> (Arc<TernaryEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = TernaryEngine::with_capabilities(
        config,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Box::new(FixedEntropy(0)),
    );
    (Arc::new(engine), clock)
}

fn always(state: TritState) -> Arc<dyn Reevaluate> {
    Arc::new(move |_o: OwnerId| Some(state))
}

#[test]
fn single_deferral_resolves_on_first_due_tick() {
    // Owner "A": delay 0, priority 1, re-evaluation says One.
    let (engine, clock) = manual_engine(EngineConfig::default());
    let a = OwnerId::new(0xA);
    engine.register(a, always(TritState::One));
    engine.defer(a, Duration::ZERO, 1).unwrap();

    clock.advance(1);
    assert_eq!(engine.tick(), 1);
    assert_eq!(engine.pending_deferrals(), 0);
    assert_eq!(engine.owner_trit(a).unwrap().state(), TritState::One);

    // Nothing further due for this owner.
    clock.advance(1_000_000);
    assert_eq!(engine.tick(), 0);
}

#[test]
fn due_entries_process_in_time_priority_fifo_order() {
    let (engine, clock) = manual_engine(EngineConfig::default());
    let processed = Arc::new(Mutex::new(Vec::new()));

    let mut owners = Vec::new();
    for raw in 1..=3u64 {
        let owner = OwnerId::new(raw);
        let log = Arc::clone(&processed);
        let capability: Arc<dyn Reevaluate> = Arc::new(move |o: OwnerId| {
            log.lock().unwrap().push(o);
            Some(TritState::One)
        });
        engine.register(owner, capability);
        owners.push(owner);
    }

    // t1 < t2 == t3, with priority(2) > priority(3).
    engine.defer(owners[2], Duration::from_nanos(20), 1).unwrap();
    engine.defer(owners[0], Duration::from_nanos(10), 0).unwrap();
    engine.defer(owners[1], Duration::from_nanos(20), 9).unwrap();

    clock.set(20);
    assert_eq!(engine.tick(), 3);
    assert_eq!(*processed.lock().unwrap(), owners);
}

#[test]
fn undecided_entry_extends_by_fixed_backoff_indefinitely() {
    let backoff = Duration::from_nanos(500);
    let (engine, clock) = manual_engine(EngineConfig {
        backoff,
        ..EngineConfig::default()
    });

    let owner = OwnerId::new(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_cb = Arc::clone(&calls);
    engine.register(
        owner,
        Arc::new(move |_o: OwnerId| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            Some(TritState::Psi)
        }),
    );
    engine.defer(owner, Duration::ZERO, 0).unwrap();

    for round in 1..=10usize {
        clock.advance(500);
        assert_eq!(engine.tick(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), round);
        assert_eq!(engine.pending_deferrals(), 1, "round {round}");

        // Not due again until a full backoff elapses from the tick time.
        clock.advance(499);
        assert_eq!(engine.tick(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), round);
        clock.advance(1);
    }
}

#[test]
fn cancelled_owner_is_never_reevaluated() {
    let (engine, clock) = manual_engine(EngineConfig::default());
    let owner = OwnerId::new(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_cb = Arc::clone(&calls);
    engine.register(
        owner,
        Arc::new(move |_o: OwnerId| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            Some(TritState::One)
        }),
    );

    engine.defer(owner, Duration::ZERO, 0).unwrap();
    engine.defer(owner, Duration::from_nanos(5), 0).unwrap();

    // Both entries are already due when the cancel lands.
    clock.advance(100);
    assert_eq!(engine.cancel(owner), 2);
    assert_eq!(engine.tick(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn out_of_resources_leaves_engine_usable() {
    let (engine, clock) = manual_engine(EngineConfig {
        queue_capacity: 1,
        ..EngineConfig::default()
    });
    let owner = OwnerId::new(1);
    engine.register(owner, always(TritState::One));

    engine.defer(owner, Duration::ZERO, 0).unwrap();
    assert!(matches!(
        engine.defer(owner, Duration::ZERO, 0),
        Err(EngineError::OutOfResources { capacity: 1 })
    ));

    // The engine keeps working after the failure.
    clock.advance(1);
    assert_eq!(engine.tick(), 1);
    assert!(engine.defer(owner, Duration::ZERO, 0).is_ok());
}

#[test]
fn stats_reflect_the_full_lifecycle() {
    let (engine, clock) = manual_engine(EngineConfig::default());
    let owner = OwnerId::new(1);
    engine.register(owner, always(TritState::One));

    let snap = engine.stats();
    assert_eq!(snap.decisions_total + snap.deferrals_total, 0);
    assert!((snap.psi_ratio - 0.0).abs() < f64::EPSILON);

    engine.defer(owner, Duration::ZERO, 0).unwrap();
    clock.advance(1);
    engine.tick();

    let snap = engine.stats();
    assert_eq!(snap.deferrals_total, 1);
    assert_eq!(snap.decisions_total, 1);
    assert!((0.0..=1.0).contains(&snap.psi_ratio));

    // An immediate evaluation of a decided owner counts as immediate.
    engine.evaluate(owner).unwrap();
    let snap = engine.stats();
    assert_eq!(snap.immediate_total, 1);
    assert_eq!(snap.decisions_total, 2);
}

#[test]
fn multiple_outstanding_entries_per_owner_all_resolve() {
    let (engine, clock) = manual_engine(EngineConfig::default());
    let owner = OwnerId::new(1);
    engine.register(owner, always(TritState::Zero));

    engine.defer(owner, Duration::from_nanos(1), 0).unwrap();
    engine.defer(owner, Duration::from_nanos(2), 0).unwrap();
    engine.defer(owner, Duration::from_nanos(3), 0).unwrap();
    assert_eq!(engine.pending_deferrals(), 3);

    clock.advance(10);
    assert_eq!(engine.tick(), 3);
    assert_eq!(engine.pending_deferrals(), 0);
    assert_eq!(engine.owner_trit(owner).unwrap().state(), TritState::Zero);
}

#[test]
fn concurrent_defer_tick_cancel_do_not_corrupt_state() {
    let engine = Arc::new(TernaryEngine::new(EngineConfig {
        queue_capacity: 100_000,
        backoff: Duration::from_nanos(1),
        ..EngineConfig::default()
    }));

    for raw in 0..8u64 {
        engine.register(OwnerId::new(raw), always(TritState::One));
    }

    let mut handles = Vec::new();
    for raw in 0..8u64 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            let owner = OwnerId::new(raw);
            for i in 0..200 {
                let _ = engine.defer(owner, Duration::ZERO, 0);
                if i % 3 == 0 {
                    engine.tick();
                }
                if i % 7 == 0 {
                    engine.cancel(owner);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // Drain whatever is left; the queue must empty without panicking.
    while engine.tick() > 0 {}
    for raw in 0..8u64 {
        engine.cancel(OwnerId::new(raw));
    }
    assert_eq!(engine.pending_deferrals(), 0);
}
