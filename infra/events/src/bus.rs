use crate::builder::BusBuilder;
use crate::error::EventBusError;
use crate::event::{Event, EventType, MarkerType};
use crate::listener::{
    DispatchFault, IntoListenerResult, Listener, ListenerId, ListenerParts, ListenerToken,
    Priority, TargetKey, typed_invoker,
};
use crate::owner::ActiveModule;
use crate::registry::{BusId, ListenerRegistry, ListenerSnapshot};
use crate::resolution::{DynListener, HandlerMethod, Resolved, StaticSubscriber, Subscriber};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace, warn};

/// Strategy invoked exactly once for every listener fault raised during dispatch.
///
/// After the policy returns, the fault still propagates to the caller of `post`.
pub trait ExceptionPolicy: Send + Sync {
    fn handle_exception(
        &self,
        bus: &BusCore,
        event: &dyn Event,
        listeners: &[Arc<Listener>],
        index: usize,
        fault: &DispatchFault,
    );
}

/// A bus that owns a [`BusCore`] and can dispatch events on it.
///
/// [`SharedBusAdapter`](crate::SharedBusAdapter) composes over any host bus
/// through this trait.
pub trait HostBus: Send + Sync {
    fn core(&self) -> &Arc<BusCore>;

    /// Dispatches `event` to this bus's listeners.
    ///
    /// # Errors
    /// See [`BusCore::post`].
    fn post(&self, event: &mut dyn Event) -> Result<bool, EventBusError> {
        self.core().post(event)
    }
}

pub(crate) struct CoreParts {
    pub(crate) name: Cow<'static, str>,
    pub(crate) registry: Arc<ListenerRegistry>,
    pub(crate) policy: Option<Arc<dyn ExceptionPolicy>>,
    pub(crate) start_suspended: bool,
    pub(crate) marker: MarkerType,
}

/// Identity, listener bookkeeping and dispatch state of one bus.
///
/// Shared by reference between a primary [`EventBus`] and every adapter that
/// wraps it, so registrations and dispatches are interchangeable between them.
pub struct BusCore {
    id: BusId,
    name: Cow<'static, str>,
    registry: Arc<ListenerRegistry>,
    targets: RwLock<FxHashMap<TargetKey, Vec<Arc<Listener>>>>,
    policy: Option<Arc<dyn ExceptionPolicy>>,
    suspended: AtomicBool,
    marker: MarkerType,
}

impl BusCore {
    pub(crate) fn new(parts: CoreParts) -> Self {
        let id = parts.registry.allocate_identity();
        debug!(bus = %parts.name, id = id.index(), marker = %parts.marker, "Event bus created");
        Self {
            id,
            name: parts.name,
            registry: parts.registry,
            targets: RwLock::new(FxHashMap::default()),
            policy: parts.policy,
            suspended: AtomicBool::new(parts.start_suspended),
            marker: parts.marker,
        }
    }

    #[must_use]
    pub const fn id(&self) -> BusId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn marker(&self) -> MarkerType {
        self.marker
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Suspends dispatch. Listeners stay registered and registration keeps working.
    pub fn shutdown(&self) {
        warn!(bus = %self.name, "Event bus shut down, posts are ignored until start()");
        self.suspended.store(true, Ordering::Release);
    }

    /// Resumes dispatch after [`BusCore::shutdown`] or a suspended start.
    pub fn start(&self) {
        debug!(bus = %self.name, "Event bus started");
        self.suspended.store(false, Ordering::Release);
    }

    /// Registers every `&self` handler of `target`.
    ///
    /// Registering a target that is already present is a no-op.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when a handler's event type does not
    /// satisfy the bus marker; nothing is registered in that case.
    pub fn register<S: Subscriber>(&self, target: &Arc<S>) -> Result<(), EventBusError> {
        let key = TargetKey::from(target);
        if self.is_registered(key) {
            trace!(bus = %self.name, target = std::any::type_name::<S>(), "Target already registered");
            return Ok(());
        }
        let listeners = self.bind_handlers(key, &S::handlers(), target)?;
        self.install(key, std::any::type_name::<S>(), listeners);
        Ok(())
    }

    /// Registers the receiver-less handlers of `S`.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when a handler's event type does not
    /// satisfy the bus marker; nothing is registered in that case.
    pub fn register_type<S: StaticSubscriber>(&self) -> Result<(), EventBusError> {
        let key = TargetKey::of_type::<S>();
        if self.is_registered(key) {
            trace!(bus = %self.name, target = std::any::type_name::<S>(), "Type already registered");
            return Ok(());
        }
        let listeners = self.bind_handlers(key, &S::static_handlers(), &Arc::new(()))?;
        self.install(key, std::any::type_name::<S>(), listeners);
        Ok(())
    }

    /// Removes every listener of `target` from this bus.
    ///
    /// Accepts an `&Arc` of a registered subscriber, a [`ListenerToken`], or
    /// [`TargetKey::of_type`] for static handlers. Returns `false` for unknown targets.
    pub fn unregister(&self, target: impl Into<TargetKey>) -> bool {
        let key = target.into();
        let Some(listeners) = self.targets.write().remove(&key) else {
            return false;
        };
        for listener in &listeners {
            self.registry.unregister(listener.event_type(), self.id, listener.id());
        }
        debug!(bus = %self.name, ?key, listeners = listeners.len(), "Target unregistered");
        true
    }

    #[must_use]
    pub fn is_registered(&self, target: impl Into<TargetKey>) -> bool {
        self.targets.read().contains_key(&target.into())
    }

    /// Adds a closure listener for the event type named by its parameter, with
    /// normal priority, skipping canceled events.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when `E` does not satisfy the bus marker.
    pub fn add_listener<E, F, R>(&self, listener: F) -> Result<ListenerToken, EventBusError>
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.add_listener_with(Priority::Normal, false, listener)
    }

    /// Adds a closure listener with explicit priority and cancel handling.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when `E` does not satisfy the bus marker.
    pub fn add_listener_with<E, F, R>(
        &self,
        priority: Priority,
        receive_cancelled: bool,
        listener: F,
    ) -> Result<ListenerToken, EventBusError>
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        let parts = ClosureParts {
            name: std::any::type_name::<F>().into(),
            priority,
            receive_cancelled,
            generic_filter: None,
        };
        self.add_closure(Resolved::of::<E>(), parts, typed_invoker(listener))
    }

    /// Adds a closure listener for a generic event, invoked only when the event's
    /// generic parameter equals `filter`.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when `E` does not satisfy the bus marker.
    pub fn add_generic_listener<E, F, R>(
        &self,
        filter: EventType,
        listener: F,
    ) -> Result<ListenerToken, EventBusError>
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.add_generic_listener_with(filter, Priority::Normal, false, listener)
    }

    /// Generic-filtered variant of [`BusCore::add_listener_with`].
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when `E` does not satisfy the bus marker.
    pub fn add_generic_listener_with<E, F, R>(
        &self,
        filter: EventType,
        priority: Priority,
        receive_cancelled: bool,
        listener: F,
    ) -> Result<ListenerToken, EventBusError>
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        let parts = ClosureParts {
            name: std::any::type_name::<F>().into(),
            priority,
            receive_cancelled,
            generic_filter: Some(filter),
        };
        self.add_closure(Resolved::of::<E>(), parts, typed_invoker(listener))
    }

    /// Adds a type-erased listener, recovering its event type first.
    ///
    /// A listener that resolves to the base `dyn Event` type becomes a catch-all: it
    /// receives every event posted on this bus. It is logged as a likely mistake and
    /// reported through [`ListenerToken::is_catch_all`].
    ///
    /// # Errors
    /// Returns [`EventBusError::Resolution`] when the event type cannot be recovered and
    /// [`EventBusError::Configuration`] when it does not satisfy the bus marker.
    pub fn add_erased_listener(&self, listener: DynListener) -> Result<ListenerToken, EventBusError> {
        let resolved = listener.resolve()?;
        if resolved.is_base() {
            warn!(
                bus = %self.name,
                listener = listener.name(),
                "Listener resolved to the base event type and will receive every event posted on this bus"
            );
        }
        let parts = listener.into_parts();
        let closure = ClosureParts {
            name: parts.name,
            priority: parts.priority,
            receive_cancelled: parts.receive_cancelled,
            generic_filter: parts.generic_filter,
        };
        self.add_closure(resolved, closure, parts.invoker)
    }

    /// Current listeners for `E` on this bus in dispatch order, catch-all listeners included.
    #[must_use]
    pub fn listeners<E: Event>(&self) -> ListenerSnapshot {
        self.registry.dispatch_listeners(EventType::of::<E>(), self.id)
    }

    /// Dispatches `event` to every accepting listener in priority order.
    ///
    /// Returns `Ok(false)` without side effects while the bus is suspended, otherwise
    /// `Ok(true)` iff the event is cancelable and ends dispatch canceled.
    ///
    /// # Errors
    /// Returns [`EventBusError::Dispatch`] when a listener returns an error. The exception
    /// policy has already seen the fault and no later listener ran. A panicking listener
    /// is reported the same way, then the panic resumes.
    pub fn post(&self, event: &mut dyn Event) -> Result<bool, EventBusError> {
        if self.is_suspended() {
            return Ok(false);
        }

        let event_type = EventType::of_val(event);
        let listeners = self.registry.dispatch_listeners(event_type, self.id);
        for (index, listener) in listeners.iter().enumerate() {
            if !listener.accepts(&*event) {
                continue;
            }

            let fault = match panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(&mut *event))) {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => DispatchFault::Error(source),
                Err(payload) => DispatchFault::Panic(payload),
            };

            self.policy().handle_exception(self, &*event, &listeners, index, &fault);
            return match fault {
                DispatchFault::Error(source) => Err(EventBusError::Dispatch {
                    event: event_type.name(),
                    listener: listener.name().to_owned().into(),
                    index,
                    source,
                    context: Some(self.name.clone()),
                }),
                DispatchFault::Panic(payload) => panic::resume_unwind(payload),
            };
        }

        trace!(bus = %self.name, event = event_type.name(), listeners = listeners.len(), "Event dispatched");
        Ok(event.is_cancelable() && event.is_canceled())
    }

    fn policy(&self) -> &dyn ExceptionPolicy {
        match &self.policy {
            Some(policy) => &**policy,
            None => self,
        }
    }

    fn bind_handlers<S: Send + Sync + 'static>(
        &self,
        key: TargetKey,
        handlers: &[HandlerMethod<S>],
        receiver: &Arc<S>,
    ) -> Result<Vec<Arc<Listener>>, EventBusError> {
        if let Some(handler) = handlers.iter().find(|handler| !handler.accepts_marker(&self.marker)) {
            return Err(EventBusError::Configuration {
                message: format!(
                    "Handler `{}` takes `{}`, which does not implement the bus marker `{}`",
                    handler.name(),
                    handler.event_type(),
                    self.marker
                )
                .into(),
                context: Some(self.name.clone()),
            });
        }

        let owner = ActiveModule::current();
        let listeners = handlers
            .iter()
            .map(|handler| {
                Arc::new(Listener::new(ListenerId::next(), ListenerParts {
                    target: key,
                    name: handler.name().into(),
                    event: handler.event_type(),
                    priority: handler.handler_priority(),
                    receive_cancelled: handler.receives_cancelled(),
                    generic_filter: handler.handler_generic_filter(),
                    owner: owner.clone(),
                    invoker: handler.bind(Arc::clone(receiver)),
                }))
            })
            .collect();
        Ok(listeners)
    }

    fn install(&self, key: TargetKey, target: &'static str, listeners: Vec<Arc<Listener>>) {
        let mut targets = self.targets.write();
        if targets.contains_key(&key) {
            return;
        }
        for listener in &listeners {
            self.registry.register_listener(self.id, Arc::clone(listener));
        }
        debug!(bus = %self.name, target, handlers = listeners.len(), "Target registered");
        targets.insert(key, listeners);
    }

    fn add_closure(
        &self,
        resolved: Resolved,
        parts: ClosureParts,
        invoker: crate::listener::Invoker,
    ) -> Result<ListenerToken, EventBusError> {
        if !(resolved.marked)(&self.marker) {
            return Err(EventBusError::Configuration {
                message: format!(
                    "Listener `{}` takes `{}`, which does not implement the bus marker `{}`",
                    parts.name, resolved.event, self.marker
                )
                .into(),
                context: Some(self.name.clone()),
            });
        }

        let id = ListenerId::next();
        let listener = Arc::new(Listener::new(id, ListenerParts {
            target: TargetKey::Listener(id),
            name: parts.name,
            event: resolved.event,
            priority: parts.priority,
            receive_cancelled: parts.receive_cancelled,
            generic_filter: parts.generic_filter,
            owner: ActiveModule::current(),
            invoker,
        }));
        self.install(TargetKey::Listener(id), "closure", vec![listener]);
        Ok(ListenerToken::new(id, resolved.event, resolved.is_base()))
    }
}

struct ClosureParts {
    name: Cow<'static, str>,
    priority: Priority,
    receive_cancelled: bool,
    generic_filter: Option<EventType>,
}

/// Default policy: log the fault with the whole listener chain.
impl ExceptionPolicy for BusCore {
    fn handle_exception(
        &self,
        bus: &BusCore,
        event: &dyn Event,
        listeners: &[Arc<Listener>],
        index: usize,
        fault: &DispatchFault,
    ) {
        let chain: Vec<String> = listeners
            .iter()
            .enumerate()
            .map(|(position, listener)| format!("{position}: {}", listener.name()))
            .collect();
        error!(
            bus = %bus.name,
            event = event.event_name(),
            index,
            listener = listeners.get(index).map_or("<unknown>", |listener| listener.name()),
            chain = ?chain,
            panic = fault.is_panic(),
            "Exception caught during event dispatch: {fault}"
        );
    }
}

impl fmt::Debug for BusCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("suspended", &self.is_suspended())
            .field("targets", &self.targets.read().len())
            .finish_non_exhaustive()
    }
}

/// A primary event bus: owns its identity in the listener registry.
///
/// Cheap to clone; clones share the same [`BusCore`].
///
/// ```rust
/// use kff_event_bus::{Event, EventBus};
///
/// #[derive(Debug, Default, Event)]
/// struct Greeting {
///     seen: u32,
/// }
///
/// # fn main() -> Result<(), kff_event_bus::EventBusError> {
/// let bus = EventBus::builder().name("docs").build();
/// let _token = bus.add_listener(|greeting: &mut Greeting| greeting.seen += 1)?;
///
/// let mut greeting = Greeting::default();
/// assert!(!bus.post(&mut greeting)?);
/// assert_eq!(greeting.seen, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    core: Arc<BusCore>,
}

impl EventBus {
    /// Returns a new [`BusBuilder`].
    #[must_use = "The builder must be configured before it can be used to build a bus."]
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    pub(crate) fn from_parts(parts: CoreParts) -> Self {
        Self { core: Arc::new(BusCore::new(parts)) }
    }
}

impl Deref for EventBus {
    type Target = BusCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl HostBus for EventBus {
    fn core(&self) -> &Arc<BusCore> {
        &self.core
    }
}
