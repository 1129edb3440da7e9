use crate::event::{Event, EventType};
use crate::listener::{Listener, ListenerId};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::trace;

/// Immutable, ordered view of one listener slot, taken at the start of a dispatch.
pub type ListenerSnapshot = Arc<[Arc<Listener>]>;

static GLOBAL: LazyLock<Arc<ListenerRegistry>> = LazyLock::new(|| Arc::new(ListenerRegistry::new()));

/// Opaque handle a bus owns into a [`ListenerRegistry`].
///
/// Allocated once per primary bus and never recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusId(usize);

impl BusId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-event-type storage: one slot per bus identity.
struct ListenerList {
    event: EventType,
    slots: RwLock<Vec<ListenerSnapshot>>,
}

impl ListenerList {
    fn new(event: EventType, capacity: usize) -> Self {
        Self { event, slots: RwLock::new(empty_slots(capacity)) }
    }

    fn grow(&self, capacity: usize) {
        let mut slots = self.slots.write();
        if slots.len() < capacity {
            slots.resize_with(capacity, empty_snapshot);
        }
    }

    fn snapshot(&self, bus: BusId) -> ListenerSnapshot {
        self.slots.read().get(bus.0).cloned().unwrap_or_else(empty_snapshot)
    }

    fn insert(&self, bus: BusId, listener: Arc<Listener>) {
        let mut slots = self.slots.write();
        if slots.len() <= bus.0 {
            slots.resize_with(bus.0 + 1, empty_snapshot);
        }
        let slot = &mut slots[bus.0];
        let at = slot.partition_point(|existing| existing.priority() <= listener.priority());
        let mut next = Vec::with_capacity(slot.len() + 1);
        next.extend_from_slice(&slot[..at]);
        next.push(listener);
        next.extend_from_slice(&slot[at..]);
        *slot = next.into();
    }

    fn remove(&self, bus: BusId, id: ListenerId) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(bus.0) else {
            return false;
        };
        if !slot.iter().any(|listener| listener.id() == id) {
            return false;
        }
        *slot = slot.iter().filter(|listener| listener.id() != id).cloned().collect();
        true
    }
}

fn empty_snapshot() -> ListenerSnapshot {
    Arc::from(Vec::new())
}

fn empty_slots(capacity: usize) -> Vec<ListenerSnapshot> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, empty_snapshot);
    slots
}

/// Process-wide listener storage shared by every bus built against it.
///
/// Holds one listener list per event type, each with one ordered slot per
/// [`BusId`]. Identity allocation grows every slot array and is serialized
/// by a single mutex; the arrays never shrink.
pub struct ListenerRegistry {
    lists: RwLock<FxHashMap<TypeId, Arc<ListenerList>>>,
    next_id: Mutex<usize>,
    capacity: AtomicUsize,
}

impl ListenerRegistry {
    /// Creates an empty, standalone registry.
    ///
    /// Most callers want [`ListenerRegistry::global`]; a standalone registry has its
    /// own identity space and is useful for isolated tests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(FxHashMap::default()),
            next_id: Mutex::new(0),
            capacity: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry used by buses that are not given one explicitly.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Allocates the next bus identity and grows every listener list to hold it.
    pub fn allocate_identity(&self) -> BusId {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        self.capacity.store(id + 1, Ordering::Release);

        let lists: Vec<Arc<ListenerList>> = self.lists.read().values().cloned().collect();
        for list in &lists {
            list.grow(id + 1);
        }
        drop(next_id);

        trace!(bus = id, lists = lists.len(), "Allocated bus identity");
        BusId(id)
    }

    /// Number of bus identities every listener list can currently hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Inserts `listener` into the slot for its event type at `bus`, after every listener
    /// of higher or equal priority.
    pub fn register_listener(&self, bus: BusId, listener: Arc<Listener>) {
        let event = listener.event_type();
        trace!(
            bus = bus.0,
            event = event.name(),
            listener = listener.name(),
            priority = ?listener.priority(),
            "Listener inserted"
        );
        self.list(event).insert(bus, listener);
    }

    /// Removes the listener with `id` from the slot for `event` at `bus`.
    pub fn unregister(&self, event: EventType, bus: BusId, id: ListenerId) -> bool {
        let list = self.lists.read().get(&event.id()).cloned();
        let removed = list.is_some_and(|list| list.remove(bus, id));
        trace!(bus = bus.0, event = event.name(), ?id, removed, "Listener removed");
        removed
    }

    /// Removes the listener with `id` from every event type's slot at `bus`.
    ///
    /// Returns the number of slots the listener was removed from.
    pub fn unregister_all(&self, bus: BusId, id: ListenerId) -> usize {
        let lists: Vec<Arc<ListenerList>> = self.lists.read().values().cloned().collect();
        let removed = lists.iter().filter(|list| list.remove(bus, id)).count();
        trace!(bus = bus.0, ?id, removed, "Listener removed");
        removed
    }

    /// Snapshot of the slot for `event` at `bus`, in dispatch order.
    #[must_use]
    pub fn listeners(&self, event: EventType, bus: BusId) -> ListenerSnapshot {
        self.lists
            .read()
            .get(&event.id())
            .map_or_else(empty_snapshot, |list| list.snapshot(bus))
    }

    /// Everything that sees an event of type `event` at `bus`: its own slot merged with
    /// the catch-all (`dyn Event`) slot in priority order. Within one priority,
    /// catch-all listeners run first.
    #[must_use]
    pub fn dispatch_listeners(&self, event: EventType, bus: BusId) -> ListenerSnapshot {
        let own = self.listeners(event, bus);
        if event.is::<dyn Event>() {
            return own;
        }
        let catch_all = self.listeners(EventType::of::<dyn Event>(), bus);
        if catch_all.is_empty() {
            return own;
        }
        if own.is_empty() {
            return catch_all;
        }

        let mut merged = Vec::with_capacity(own.len() + catch_all.len());
        let mut rest = &own[..];
        for listener in &*catch_all {
            let at = rest.partition_point(|existing| existing.priority() < listener.priority());
            merged.extend_from_slice(&rest[..at]);
            rest = &rest[at..];
            merged.push(Arc::clone(listener));
        }
        merged.extend_from_slice(rest);
        merged.into()
    }

    /// Number of event types that have a listener list.
    #[must_use]
    pub fn event_types(&self) -> usize {
        self.lists.read().len()
    }

    fn list(&self, event: EventType) -> Arc<ListenerList> {
        if let Some(list) = self.lists.read().get(&event.id()) {
            return Arc::clone(list);
        }

        let mut lists = self.lists.write();
        let list = lists.entry(event.id()).or_insert_with(|| {
            trace!(event = event.name(), "Initializing new listener list");
            Arc::new(ListenerList::new(event, self.capacity()))
        });
        Arc::clone(list)
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.lists.read();
        let mut events: Vec<&'static str> = lists.values().map(|list| list.event.name()).collect();
        events.sort_unstable();
        f.debug_struct("ListenerRegistry")
            .field("capacity", &self.capacity())
            .field("events", &events)
            .finish_non_exhaustive()
    }
}
