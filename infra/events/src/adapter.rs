use crate::bus::{BusCore, EventBus, HostBus};
use crate::error::EventBusError;
use crate::event::Event;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A bus that borrows everything from an existing host bus.
///
/// Identity, listener storage, registered targets, exception policy and the
/// suspended flag all belong to the host; the adapter allocates nothing.
/// Listeners registered through either side see events posted through the
/// other, and `post` is delegated to the host's own [`HostBus::post`].
///
/// ```rust
/// use kff_event_bus::{Event, EventBus, SharedBusAdapter};
/// use std::sync::Arc;
///
/// #[derive(Debug, Default, Event)]
/// struct Loaded;
///
/// # fn main() -> Result<(), kff_event_bus::EventBusError> {
/// let host = Arc::new(EventBus::builder().build());
/// let adapter = SharedBusAdapter::new(Arc::clone(&host));
/// let _token = adapter.add_listener(|_: &mut Loaded| {})?;
///
/// assert_eq!(adapter.id(), host.id());
/// assert_eq!(host.listeners::<Loaded>().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SharedBusAdapter<H: HostBus = EventBus> {
    host: Arc<H>,
}

impl<H: HostBus> SharedBusAdapter<H> {
    #[must_use]
    pub const fn new(host: Arc<H>) -> Self {
        Self { host }
    }

    #[must_use]
    pub const fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Dispatches through the host bus.
    ///
    /// # Errors
    /// Whatever the host's `post` returns; see [`BusCore::post`].
    pub fn post(&self, event: &mut dyn Event) -> Result<bool, EventBusError> {
        self.host.post(event)
    }
}

impl<H: HostBus> Deref for SharedBusAdapter<H> {
    type Target = BusCore;

    fn deref(&self) -> &Self::Target {
        self.host.core()
    }
}

impl<H: HostBus> Clone for SharedBusAdapter<H> {
    fn clone(&self) -> Self {
        Self { host: Arc::clone(&self.host) }
    }
}

impl<H: HostBus> HostBus for SharedBusAdapter<H> {
    fn core(&self) -> &Arc<BusCore> {
        self.host.core()
    }

    fn post(&self, event: &mut dyn Event) -> Result<bool, EventBusError> {
        self.host.post(event)
    }
}

impl<H: HostBus> fmt::Debug for SharedBusAdapter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBusAdapter").field("host", self.host.core()).finish()
    }
}
