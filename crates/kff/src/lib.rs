//! Facade crate for the event bus infrastructure.
//! Re-exports the bus API and macros and owns the process-wide default bus.
//! Keep this crate thin: it should compose other crates, not implement dispatch logic.
//!
//! ## Usage
//! - Register handlers on [`FORGE_BUS`], the default bus most code should use.
//! - Code that manages the host bus directly can reach it through [`HOST_BUS`];
//!   both sides share identity, listeners and the suspended flag.
//! - `#[derive(Event)]` and `#[subscriber]` expand to `::kff_event_bus` paths, so
//!   crates using them also depend on `kff-event-bus`.

use std::sync::{Arc, LazyLock};
use tracing::debug;

pub use kff_derive::kff_error;
pub use kff_event_bus as events;
pub use kff_event_bus::{
    ActiveModule, BusBuilder, BusCore, DynListener, Event, EventBus, EventBusError, EventType,
    ExceptionPolicy, HostBus, ListenerRegistry, ListenerToken, MarkerType, Priority,
    SharedBusAdapter, StaticSubscriber, Subscriber, TargetKey, subscriber,
};

/// Diagnostic name of the process-wide host bus.
pub const HOST_BUS_NAME: &str = "FORGE";

/// The process-wide primary bus, built on first use against the global registry.
pub static HOST_BUS: LazyLock<Arc<EventBus>> = LazyLock::new(|| {
    let bus = EventBus::builder().name(HOST_BUS_NAME).build();
    debug!(id = bus.id().index(), "Host event bus initialized");
    Arc::new(bus)
});

/// The default bus: a [`SharedBusAdapter`] over [`HOST_BUS`].
///
/// ```rust
/// use kff::FORGE_BUS;
/// use kff_event_bus::Event;
///
/// #[derive(Debug, Default, Event)]
/// struct WorldLoaded {
///     chunks: usize,
/// }
///
/// # fn main() -> Result<(), kff::EventBusError> {
/// let token = FORGE_BUS.add_listener(|event: &mut WorldLoaded| event.chunks += 1)?;
/// let mut event = WorldLoaded::default();
/// FORGE_BUS.post(&mut event)?;
/// assert_eq!(event.chunks, 1);
/// FORGE_BUS.unregister(token);
/// # Ok(())
/// # }
/// ```
pub static FORGE_BUS: LazyLock<SharedBusAdapter> =
    LazyLock::new(|| SharedBusAdapter::new(Arc::clone(&HOST_BUS)));
