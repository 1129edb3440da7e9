use kff::{Event, FORGE_BUS, HOST_BUS, HOST_BUS_NAME, HostBus, Priority, subscriber};
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default, Event)]
struct ServerTick {
    handled: Vec<&'static str>,
}

#[derive(Debug, Default)]
struct TickCounter {
    ticks: AtomicUsize,
}

#[subscriber]
impl TickCounter {
    #[subscribe_event(priority = High)]
    fn on_tick(&self, event: &mut ServerTick) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        event.handled.push("counter");
    }
}

#[test]
#[serial]
fn forge_bus_wraps_the_host_bus() {
    assert!(Arc::ptr_eq(FORGE_BUS.core(), HOST_BUS.core()));
    assert_eq!(FORGE_BUS.id(), HOST_BUS.id());
    assert_eq!(FORGE_BUS.name(), HOST_BUS_NAME);
}

#[test]
#[serial]
fn registrations_are_visible_from_both_sides() {
    let counter = Arc::new(TickCounter::default());
    FORGE_BUS.register(&counter).unwrap();
    let token = HOST_BUS
        .add_listener_with(Priority::Low, false, |event: &mut ServerTick| event.handled.push("host"))
        .unwrap();

    let mut event = ServerTick::default();
    HOST_BUS.post(&mut event).unwrap();
    assert_eq!(event.handled, ["counter", "host"]);

    let mut event = ServerTick::default();
    FORGE_BUS.post(&mut event).unwrap();
    assert_eq!(counter.ticks.load(Ordering::Relaxed), 2);

    assert!(HOST_BUS.unregister(&counter));
    assert!(FORGE_BUS.unregister(token));
    assert!(FORGE_BUS.listeners::<ServerTick>().is_empty());
}

#[test]
#[serial]
fn shutdown_through_the_adapter_suspends_the_host() {
    let counter = Arc::new(TickCounter::default());
    FORGE_BUS.register(&counter).unwrap();

    FORGE_BUS.shutdown();
    assert!(HOST_BUS.is_suspended());
    assert!(!HOST_BUS.post(&mut ServerTick::default()).unwrap());
    assert_eq!(counter.ticks.load(Ordering::Relaxed), 0);

    HOST_BUS.start();
    assert!(!FORGE_BUS.is_suspended());
    FORGE_BUS.post(&mut ServerTick::default()).unwrap();
    assert_eq!(counter.ticks.load(Ordering::Relaxed), 1);
    assert!(FORGE_BUS.unregister(&counter));
}
