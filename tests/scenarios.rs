//! Cross-module scenarios from the spec's testable-properties section, each driving a real
//! `ReactorSystem` end to end rather than poking at `Frame` directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Context;
use proptest::prelude::*;

use reactor_core::context::{self, SystemEvent};
use reactor_core::error::Error;
use reactor_core::frame::Frame;
use reactor_core::scheduler::Scheduler;
use reactor_core::{Proto, Reactor, ReactorInit, ReactorSystem};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Runs every batch on the calling thread and records scheduler-level errors, so a test can
/// drive a reactor deterministically without a background pool.
struct RecordingScheduler {
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordingScheduler {
    fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(RecordingScheduler {
                errors: errors.clone(),
            }),
            errors,
        )
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, frame: Arc<Frame>) {
        assert!(
            context::current_frame().is_none(),
            "test driver never calls send from inside a reactor"
        );
        frame.execute_batch();
    }

    fn handler(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn system_events_sink() -> (Arc<Mutex<Vec<&'static str>>>, impl FnMut(&SystemEvent) + Send + 'static) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let sink_for_handler = sink.clone();
    let handler = move |event: &SystemEvent| {
        let label = match event {
            SystemEvent::Started => "Started",
            SystemEvent::Scheduled => "Scheduled",
            SystemEvent::Preempted => "Preempted",
            SystemEvent::Died(_) => "Died",
            SystemEvent::Terminated => "Terminated",
        };
        sink_for_handler.lock().unwrap().push(label);
    };
    (sink, handler)
}

// ---- scenario A: spawn, send one event, self-seal, observe lifecycle ----

struct EchoOnce {
    sink: Arc<Mutex<Vec<String>>>,
}

impl Reactor for EchoOnce {
    type Event = String;

    fn new(init: ReactorInit<String>) -> Self {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let sink_for_handler = sink.clone();
        let main_uid = init.main.uid();
        init.main.subscribe(move |value: &String| {
            sink_for_handler.lock().unwrap().push(value.clone());
            context::current_frame()
                .expect("handlers always run with a frame bound")
                .seal_connector(main_uid);
        });
        EchoOnce { sink }
    }
}

#[test]
fn scenario_a_single_event_lifecycle() {
    init_tracing();
    let (scheduler, _errors) = RecordingScheduler::new();
    let system = ReactorSystem::new();

    let (system_sink, system_handler) = system_events_sink();
    let proto = Proto::<String>::new()
        .named("echo")
        .scheduled_with(scheduler)
        .with_system_subscriber(system_handler);
    let channel = system.spawn::<EchoOnce>(proto);

    channel.send("Hola!".to_string());

    assert_eq!(*system_sink.lock().unwrap(), vec!["Started", "Scheduled", "Preempted", "Terminated"]);
}

// ---- scenario B: two connectors, independent per-connector FIFO ----

struct TwoSource {
    main_sink: Arc<Mutex<Vec<i32>>>,
    aux_sink: Arc<Mutex<Vec<i32>>>,
}

static TWO_SOURCE_SINKS: OnceLock<(Arc<Mutex<Vec<i32>>>, Arc<Mutex<Vec<i32>>>)> = OnceLock::new();

impl Reactor for TwoSource {
    type Event = i32;

    fn new(init: ReactorInit<i32>) -> Self {
        let (main_sink, aux_sink) = TWO_SOURCE_SINKS
            .get_or_init(|| (Arc::new(Mutex::new(Vec::new())), Arc::new(Mutex::new(Vec::new()))))
            .clone();

        let main_sink_for_handler = main_sink.clone();
        init.main.subscribe(move |value: &i32| {
            main_sink_for_handler.lock().unwrap().push(*value);
        });

        let (aux_connector, _aux_channel) = context::current_frame()
            .expect("constructor runs with a frame bound")
            .open_connector::<i32>("aux", false, None)
            .expect("fresh frame accepts connectors");
        let aux_sink_for_handler = aux_sink.clone();
        aux_connector.subscribe(move |value: &i32| {
            aux_sink_for_handler.lock().unwrap().push(*value);
        });

        TwoSource { main_sink, aux_sink }
    }
}

#[test]
fn scenario_b_two_connectors_keep_independent_fifo_order() {
    init_tracing();
    let (scheduler, _errors) = RecordingScheduler::new();
    let system = ReactorSystem::new();

    let main_channel = system.spawn::<TwoSource>(Proto::<i32>::new().named("two-source").scheduled_with(scheduler));

    main_channel.send(1);
    main_channel.send(2);
    main_channel.send(3);

    let (main_sink, aux_sink) = TWO_SOURCE_SINKS.get().unwrap().clone();
    assert_eq!(*main_sink.lock().unwrap(), vec![1, 2, 3]);
    // aux was never sent to in this test; its sink stays empty, but it proves the two streams
    // are independently addressable.
    assert!(aux_sink.lock().unwrap().is_empty());
}

// ---- scenario C: throughput fan-in, serialised hub ----

struct Hub {
    counter: Arc<AtomicUsize>,
}

static HUB_COUNTER: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

impl Reactor for Hub {
    type Event = usize;

    fn new(init: ReactorInit<usize>) -> Self {
        let counter = HUB_COUNTER.get_or_init(|| Arc::new(AtomicUsize::new(0))).clone();
        let in_handler = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let counter_for_handler = counter.clone();
        init.main.subscribe(move |_value: &usize| {
            assert!(
                !in_handler.swap(true, Ordering::SeqCst),
                "hub handler invoked concurrently with itself"
            );
            counter_for_handler.fetch_add(1, Ordering::SeqCst);
            in_handler.store(false, Ordering::SeqCst);
        });
        Hub { counter }
    }
}

#[test]
fn scenario_c_fan_in_throughput_is_serialised() {
    init_tracing();
    const SENDERS: usize = 100;
    const PER_SENDER: usize = 1000;

    let system = ReactorSystem::new();
    let hub = system.spawn::<Hub>(Proto::<usize>::new().named("hub"));

    let mut senders = Vec::with_capacity(SENDERS);
    for _ in 0..SENDERS {
        let hub = hub.clone();
        senders.push(std::thread::spawn(move || {
            for i in 0..PER_SENDER {
                hub.send(i);
            }
        }));
    }
    for sender in senders {
        sender.join().unwrap();
    }

    // The default thread-pool scheduler drains asynchronously; poll briefly for the hub to
    // catch up rather than asserting immediately after the last send returns.
    let counter = HUB_COUNTER.get().unwrap().clone();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while counter.load(Ordering::SeqCst) < SENDERS * PER_SENDER && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    assert_eq!(counter.load(Ordering::SeqCst), SENDERS * PER_SENDER);
}

// ---- scenario D: handler panic on the 5th event ----

struct Sentinel {
    sink: Arc<Mutex<Vec<i32>>>,
}

impl Reactor for Sentinel {
    type Event = i32;

    fn new(init: ReactorInit<i32>) -> Self {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let sink_for_handler = sink.clone();
        init.main.subscribe(move |value: &i32| {
            sink_for_handler.lock().unwrap().push(*value);
            if *value == 5 {
                panic!("sentinel");
            }
        });
        Sentinel { sink }
    }
}

#[test]
fn scenario_d_handler_panic_terminates_the_reactor() {
    init_tracing();
    let (scheduler, errors) = RecordingScheduler::new();
    let system = ReactorSystem::new();

    let (system_sink, system_handler) = system_events_sink();
    let proto = Proto::<i32>::new()
        .named("sentinel")
        .scheduled_with(scheduler)
        .with_system_subscriber(system_handler);
    let channel = system.spawn::<Sentinel>(proto);

    for value in 1..=5 {
        channel.send(value);
    }
    // Dropped: the frame is already Terminated by the time this is sent.
    channel.send(6);

    // Events 1-4 were processed cleanly; event 5 was handed to the handler (and recorded) before
    // it panicked. With the recording scheduler running one batch per `send`, the exact number of
    // Scheduled/Preempted pairs tracks how many sends landed their own batch rather than the
    // budget, so only the ordering invariants from the scenario are asserted here.
    let system_sink = system_sink.lock().unwrap();
    assert_eq!(system_sink.first(), Some(&"Started"));
    assert_eq!(system_sink.last(), Some(&"Terminated"));
    assert_eq!(system_sink.iter().filter(|&&e| e == "Started").count(), 1);
    assert_eq!(system_sink.iter().filter(|&&e| e == "Died").count(), 1);
    assert_eq!(system_sink.iter().filter(|&&e| e == "Terminated").count(), 1);
    let died_at = system_sink.iter().position(|&e| e == "Died").unwrap();
    let terminated_at = system_sink.iter().position(|&e| e == "Terminated").unwrap();
    assert!(died_at < terminated_at);

    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(errors.lock().unwrap()[0].contains("handler panicked"));
}

// ---- scenario E: constructor panic ----

struct Doomed;

impl Reactor for Doomed {
    type Event = ();

    fn new(_init: ReactorInit<()>) -> Self {
        panic!("constructor sentinel");
    }
}

#[test]
fn scenario_e_constructor_panic_removes_the_frame() -> anyhow::Result<()> {
    init_tracing();
    let (scheduler, errors) = RecordingScheduler::new();
    let system = ReactorSystem::new();

    let _channel = system.spawn::<Doomed>(Proto::<()>::new().named("doomed").scheduled_with(scheduler));

    let errors = errors.lock().unwrap();
    let first = errors.first().context("constructor panic should have produced exactly one error")?;
    assert_eq!(errors.len(), 1);
    assert!(first.contains("constructor panicked"));
    assert!(system.find::<()>("doomed").is_none());
    Ok(())
}

// ---- scenario F: daemon-only reactor terminates after processing its one event ----

struct DaemonOnly {
    processed: Arc<AtomicUsize>,
}

static DAEMON_ONLY_COUNTER: OnceLock<Arc<AtomicUsize>> = OnceLock::new();
static DAEMON_ONLY_TICK: OnceLock<reactor_core::Channel<i32>> = OnceLock::new();

impl Reactor for DaemonOnly {
    type Event = ();

    fn new(init: ReactorInit<()>) -> Self {
        let processed = DAEMON_ONLY_COUNTER.get_or_init(|| Arc::new(AtomicUsize::new(0))).clone();
        let main_uid = init.main.uid();

        let frame = context::current_frame().expect("constructor runs with a frame bound");
        let (aux, aux_channel) = frame
            .open_connector::<i32>("tick", true, None)
            .expect("fresh frame accepts connectors");

        // `main` is non-daemon by construction (§4.3); this reactor only cares about its daemon
        // "tick" connector, so it seals `main` itself the moment its one piece of real work is
        // done, leaving only daemon connectors open from then on — the daemon rule then
        // terminates it at the next batch boundary.
        let processed_for_handler = processed.clone();
        aux.subscribe(move |_value: &i32| {
            processed_for_handler.fetch_add(1, Ordering::SeqCst);
            context::current_frame()
                .expect("handlers always run with a frame bound")
                .seal_connector(main_uid);
        });
        let _ = DAEMON_ONLY_TICK.set(aux_channel);

        DaemonOnly { processed }
    }
}

#[test]
fn scenario_f_daemon_only_reactor_self_terminates() {
    init_tracing();
    let (scheduler, _errors) = RecordingScheduler::new();
    let system = ReactorSystem::new();

    let (system_sink, system_handler) = system_events_sink();
    let proto = Proto::<()>::new()
        .named("daemon-only")
        .scheduled_with(scheduler)
        .with_system_subscriber(system_handler);
    let _channel = system.spawn::<DaemonOnly>(proto);

    // `main` stays open until the tick handler seals it, so spawning alone does not terminate
    // the reactor; send the one event through the daemon "tick" connector to trigger that.
    let tick = DAEMON_ONLY_TICK.get().expect("constructor publishes its tick channel").clone();
    tick.send(7);

    let processed = DAEMON_ONLY_COUNTER.get().unwrap().clone();
    assert_eq!(processed.load(Ordering::SeqCst), 1);
    assert_eq!(system_sink.lock().unwrap().last(), Some(&"Terminated"));
}

// ---- property: each connector preserves its own send order under arbitrary interleaving ----
//
// A hand-written table of interleavings under-covers the state space (§8 invariant 4); proptest
// instead generates arbitrary (channel, value) sequences and checks that, whatever order the two
// channels are interleaved in, each connector's own FIFO order survives independently.

struct FifoRecorder {
    main_sink: Arc<Mutex<Vec<i32>>>,
    aux_sink: Arc<Mutex<Vec<i32>>>,
}

type FifoFixture = (
    reactor_core::Channel<i32>,
    Arc<Mutex<Vec<i32>>>,
    Arc<Mutex<Vec<i32>>>,
);

static FIFO_REGISTRY: OnceLock<Mutex<HashMap<String, FifoFixture>>> = OnceLock::new();

impl Reactor for FifoRecorder {
    type Event = i32;

    fn new(init: ReactorInit<i32>) -> Self {
        let main_sink = Arc::new(Mutex::new(Vec::new()));
        let aux_sink = Arc::new(Mutex::new(Vec::new()));

        let main_sink_for_handler = main_sink.clone();
        init.main.subscribe(move |value: &i32| {
            main_sink_for_handler.lock().unwrap().push(*value);
        });

        let frame = context::current_frame().expect("constructor runs with a frame bound");
        let (aux_connector, aux_channel) = frame
            .open_connector::<i32>("aux", false, None)
            .expect("fresh frame accepts connectors");
        let aux_sink_for_handler = aux_sink.clone();
        aux_connector.subscribe(move |value: &i32| {
            aux_sink_for_handler.lock().unwrap().push(*value);
        });

        let registry = FIFO_REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        registry
            .lock()
            .unwrap()
            .insert(frame.name().to_string(), (aux_channel, main_sink.clone(), aux_sink.clone()));

        FifoRecorder { main_sink, aux_sink }
    }
}

#[test]
fn scenario_b_concurrent_senders_preserve_each_connectors_own_fifo_order() {
    init_tracing();
    let system = ReactorSystem::new();

    let name = "scenario-b-concurrent".to_string();
    let main_channel = system.spawn::<FifoRecorder>(Proto::<i32>::new().named(name.clone()));
    let (aux_channel, main_sink, aux_sink) = FIFO_REGISTRY
        .get()
        .expect("constructor always populates the registry first")
        .lock()
        .unwrap()
        .get(&name)
        .expect("registered under the name we just spawned with")
        .clone();

    const PER_THREAD: i32 = 500;
    let main_sender = {
        let main_channel = main_channel.clone();
        std::thread::spawn(move || {
            for i in 0..PER_THREAD {
                main_channel.send(i);
            }
        })
    };
    let aux_sender = {
        let aux_channel = aux_channel.clone();
        std::thread::spawn(move || {
            for i in 0..PER_THREAD {
                aux_channel.send(i);
            }
        })
    };
    main_sender.join().unwrap();
    aux_sender.join().unwrap();

    // The default thread-pool scheduler drains asynchronously; poll briefly rather than asserting
    // immediately after both sender threads join.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while (main_sink.lock().unwrap().len() < PER_THREAD as usize
        || aux_sink.lock().unwrap().len() < PER_THREAD as usize)
        && std::time::Instant::now() < deadline
    {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    // Each thread sent its own connector a strictly increasing sequence; whatever order the two
    // threads' sends actually interleaved in, each connector's own FIFO must reproduce its
    // sender's order exactly (spec §8 scenario B).
    let expected: Vec<i32> = (0..PER_THREAD).collect();
    assert_eq!(*main_sink.lock().unwrap(), expected);
    assert_eq!(*aux_sink.lock().unwrap(), expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scenario_g_per_connector_fifo_survives_arbitrary_interleaving(
        sends in prop::collection::vec((prop::bool::ANY, any::<i32>()), 0..64),
        seed in any::<u64>(),
    ) {
        init_tracing();
        let (scheduler, _errors) = RecordingScheduler::new();
        let system = ReactorSystem::new();

        let name = format!("fifo-{seed}");
        let main_channel = system.spawn::<FifoRecorder>(
            Proto::<i32>::new().named(name.clone()).scheduled_with(scheduler),
        );
        let (aux_channel, main_sink, aux_sink) = FIFO_REGISTRY
            .get()
            .expect("constructor always populates the registry first")
            .lock()
            .unwrap()
            .get(&name)
            .expect("registered under the name we just spawned with")
            .clone();

        let mut expected_main = Vec::new();
        let mut expected_aux = Vec::new();
        for (is_main, value) in &sends {
            if *is_main {
                main_channel.send(*value);
                expected_main.push(*value);
            } else {
                aux_channel.send(*value);
                expected_aux.push(*value);
            }
        }

        prop_assert_eq!(main_sink.lock().unwrap().clone(), expected_main);
        prop_assert_eq!(aux_sink.lock().unwrap().clone(), expected_aux);
    }
}
