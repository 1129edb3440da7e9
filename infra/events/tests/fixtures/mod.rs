use kff_event_bus::{
    BusCore, DispatchFault, Event, EventBus, EventBusError, EventType, ExceptionPolicy, Listener,
    ListenerRegistry, subscriber,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait ModBusEvent {}

#[derive(Debug, Default, Clone, PartialEq, Eq, Event)]
pub struct TestEvent(pub usize);

#[derive(Debug, Default, Event)]
pub struct ChatEvent {
    pub message: String,
    pub trace: Vec<&'static str>,
    #[event(canceled)]
    pub canceled: bool,
}

#[derive(Debug, Default, Event)]
#[event(marker = ModBusEvent)]
pub struct SetupEvent {
    pub trace: Vec<&'static str>,
}

impl ModBusEvent for SetupEvent {}

#[derive(Debug, Event)]
pub struct RegistryEvent {
    #[event(generic)]
    pub registry: EventType,
    pub hits: Vec<&'static str>,
}

impl RegistryEvent {
    pub fn of<T: 'static>() -> Self {
        Self { registry: EventType::of::<T>(), hits: Vec::new() }
    }
}

pub struct Block;
pub struct Item;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
pub struct Boom;

/// Writes its handler names into the chat trace, at three priorities.
#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: AtomicUsize,
}

#[subscriber]
impl Recorder {
    #[subscribe_event(priority = Low)]
    fn low(&self, event: &mut ChatEvent) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        event.trace.push("low");
    }

    #[subscribe_event(priority = Highest)]
    fn highest(&self, event: &mut ChatEvent) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        event.trace.push("highest");
    }

    #[subscribe_event]
    fn normal(&self, event: &mut ChatEvent) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        event.trace.push("normal");
    }
}

#[derive(Debug, Default)]
pub struct Canceller;

#[subscriber]
impl Canceller {
    #[subscribe_event(priority = High)]
    fn cancel(&self, event: &mut ChatEvent) -> Result<(), EventBusError> {
        event.trace.push("cancel");
        event.set_canceled(true)
    }
}

#[derive(Debug, Default)]
pub struct Announcer;

#[subscriber]
impl Announcer {
    #[subscribe_event(priority = Lowest, receive_cancelled)]
    fn announce(event: &mut ChatEvent) {
        event.trace.push("announce");
    }
}

#[derive(Debug, Default)]
pub struct SetupWatcher;

#[subscriber]
impl SetupWatcher {
    #[subscribe_event]
    fn on_setup(&self, event: &mut SetupEvent) {
        event.trace.push("setup");
    }
}

/// Handles one marked and one unmarked event.
#[derive(Debug, Default)]
pub struct MixedWatcher;

#[subscriber]
impl MixedWatcher {
    #[subscribe_event]
    fn on_setup(&self, event: &mut SetupEvent) {
        event.trace.push("mixed");
    }

    #[subscribe_event]
    fn on_chat(&self, event: &mut ChatEvent) {
        event.trace.push("mixed");
    }
}

/// `o` always fails before `p` gets a chance to run.
#[derive(Debug, Default)]
pub struct Faulty {
    pub p_calls: AtomicUsize,
}

#[subscriber]
impl Faulty {
    #[subscribe_event(priority = Highest)]
    fn o(&self, _event: &mut TestEvent) -> Result<(), Boom> {
        Err(Boom)
    }

    #[subscribe_event(priority = Normal)]
    fn p(&self, _event: &mut TestEvent) {
        self.p_calls.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fails at high priority. Registered next to a [`Tally`] as a separate target.
#[derive(Debug, Default)]
pub struct Thrower;

#[subscriber]
impl Thrower {
    #[subscribe_event(priority = High)]
    fn on_test(&self, _event: &mut TestEvent) -> Result<(), Boom> {
        Err(Boom)
    }
}

#[derive(Debug, Default)]
pub struct Tally {
    pub calls: AtomicUsize,
}

#[subscriber]
impl Tally {
    #[subscribe_event(priority = Low)]
    fn on_test(&self, _event: &mut TestEvent) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub event: &'static str,
    pub listeners: Vec<String>,
    pub index: usize,
    pub message: String,
    pub panic: bool,
}

#[derive(Debug, Default)]
pub struct RecordingPolicy {
    pub reports: Mutex<Vec<Report>>,
}

impl ExceptionPolicy for RecordingPolicy {
    fn handle_exception(
        &self,
        _bus: &BusCore,
        event: &dyn Event,
        listeners: &[Arc<Listener>],
        index: usize,
        fault: &DispatchFault,
    ) {
        self.reports.lock().push(Report {
            event: event.event_name(),
            listeners: listeners.iter().map(|listener| listener.name().to_owned()).collect(),
            index,
            message: fault.message().into_owned(),
            panic: fault.is_panic(),
        });
    }
}

/// A bus with its own registry, so tests never share slots.
pub fn isolated_bus() -> EventBus {
    EventBus::builder().name("TEST").registry(Arc::new(ListenerRegistry::new())).build()
}

pub fn bus_with_policy(policy: &Arc<RecordingPolicy>) -> EventBus {
    EventBus::builder()
        .name("TEST")
        .registry(Arc::new(ListenerRegistry::new()))
        .exception_policy(Arc::clone(policy) as Arc<dyn ExceptionPolicy>)
        .build()
}

pub fn counter() -> (Arc<AtomicUsize>, impl Fn(&mut TestEvent) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move |_: &mut TestEvent| {
        handle.fetch_add(1, Ordering::Relaxed);
    })
}
