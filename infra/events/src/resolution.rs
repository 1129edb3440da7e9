use crate::error::EventBusError;
use crate::event::{Event, EventType, MarkerType};
use crate::listener::{IntoListenerResult, Invoker, ListenerResult, Priority, typed_invoker};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

type MethodCall<S> = Arc<dyn Fn(&S, &mut dyn Event) -> ListenerResult + Send + Sync>;

/// A type whose `&self` handler methods can be registered with
/// [`BusCore::register`](crate::BusCore::register).
///
/// Implemented by `#[subscriber]` on an inherent `impl` block; hand-written
/// tables are fine too.
pub trait Subscriber: Send + Sync + Sized + 'static {
    fn handlers() -> Vec<HandlerMethod<Self>>;
}

/// A type whose receiver-less handler functions can be registered with
/// [`BusCore::register_type`](crate::BusCore::register_type).
pub trait StaticSubscriber: 'static {
    fn static_handlers() -> Vec<HandlerMethod<()>>;
}

/// One row of a registration table: a handler method bound to its event type.
pub struct HandlerMethod<S> {
    name: &'static str,
    event: EventType,
    marked: fn(&MarkerType) -> bool,
    priority: Priority,
    receive_cancelled: bool,
    generic_filter: Option<EventType>,
    call: MethodCall<S>,
}

impl<S: 'static> HandlerMethod<S> {
    /// Describes a handler taking `&mut E`, with normal priority and no generic filter.
    pub fn new<E, F, R>(name: &'static str, handler: F) -> Self
    where
        E: Event,
        F: Fn(&S, &mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        let call: MethodCall<S> = Arc::new(move |receiver: &S, event: &mut dyn Event| {
            let any: &mut dyn Any = event;
            any.downcast_mut::<E>()
                .map_or(Ok(()), |event| handler(receiver, event).into_listener_result())
        });
        Self {
            name,
            event: EventType::of::<E>(),
            marked: E::is_marked,
            priority: Priority::Normal,
            receive_cancelled: false,
            generic_filter: None,
            call,
        }
    }

    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn receive_cancelled(mut self, receive_cancelled: bool) -> Self {
        self.receive_cancelled = receive_cancelled;
        self
    }

    #[must_use]
    pub const fn generic_filter(mut self, filter: EventType) -> Self {
        self.generic_filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event
    }

    #[must_use]
    pub const fn handler_priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn receives_cancelled(&self) -> bool {
        self.receive_cancelled
    }

    #[must_use]
    pub const fn handler_generic_filter(&self) -> Option<EventType> {
        self.generic_filter
    }

    pub(crate) fn accepts_marker(&self, marker: &MarkerType) -> bool {
        (self.marked)(marker)
    }

    pub(crate) fn bind(&self, receiver: Arc<S>) -> Invoker
    where
        S: Send + Sync,
    {
        let call = Arc::clone(&self.call);
        Arc::new(move |event: &mut dyn Event| call(&*receiver, event))
    }
}

impl<S> fmt::Debug for HandlerMethod<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("receive_cancelled", &self.receive_cancelled)
            .field("generic_filter", &self.generic_filter)
            .finish_non_exhaustive()
    }
}

/// Event type recovered for a listener, together with its marker check.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Resolved {
    pub(crate) event: EventType,
    pub(crate) marked: fn(&MarkerType) -> bool,
}

impl Resolved {
    pub(crate) fn of<E: Event>() -> Self {
        Self { event: EventType::of::<E>(), marked: E::is_marked }
    }

    fn base() -> Self {
        Self { event: EventType::of::<dyn Event>(), marked: MarkerType::is_base }
    }

    pub(crate) fn is_base(&self) -> bool {
        self.event.is::<dyn Event>()
    }
}

/// A type-erased listener for [`BusCore::add_erased_listener`](crate::BusCore::add_erased_listener).
///
/// The event type is taken from the listener's own declaration or, for an
/// adapter built with [`DynListener::adapter`], from the first listener in
/// the wrapped chain that declares one.
pub struct DynListener {
    name: Cow<'static, str>,
    declared: Option<Resolved>,
    wrapped: Option<Box<Self>>,
    invoker: Invoker,
    priority: Priority,
    receive_cancelled: bool,
    generic_filter: Option<EventType>,
}

impl DynListener {
    /// An erased listener with no declared event type.
    pub fn new<F, R>(name: impl Into<Cow<'static, str>>, listener: F) -> Self
    where
        F: Fn(&mut dyn Event) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        let invoker: Invoker = Arc::new(move |event: &mut dyn Event| listener(event).into_listener_result());
        Self::from_parts(name.into(), None, invoker)
    }

    /// An erased listener declaring `E` as its event type.
    pub fn typed<E, F, R>(name: impl Into<Cow<'static, str>>, listener: F) -> Self
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        Self::from_parts(name.into(), Some(Resolved::of::<E>()), typed_invoker(listener))
    }

    /// A catch-all listener declared against the base `dyn Event` type.
    ///
    /// Only buses with the default marker accept it; it then receives every event
    /// posted on the bus, merged into each event's listeners by priority.
    pub fn base<F, R>(name: impl Into<Cow<'static, str>>, listener: F) -> Self
    where
        F: Fn(&mut dyn Event) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        Self::new(name, listener).declared_as(Resolved::base())
    }

    /// A bridging shim that forwards to `inner` and declares nothing itself.
    pub fn adapter(name: impl Into<Cow<'static, str>>, inner: Self) -> Self {
        let invoker = Arc::clone(&inner.invoker);
        let mut adapter = Self::from_parts(name.into(), None, invoker);
        adapter.priority = inner.priority;
        adapter.receive_cancelled = inner.receive_cancelled;
        adapter.generic_filter = inner.generic_filter;
        adapter.wrapped = Some(Box::new(inner));
        adapter
    }

    /// Declares `E` as the event type explicitly.
    #[must_use]
    pub fn declare<E: Event>(self) -> Self {
        self.declared_as(Resolved::of::<E>())
    }

    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn receive_cancelled(mut self, receive_cancelled: bool) -> Self {
        self.receive_cancelled = receive_cancelled;
        self
    }

    #[must_use]
    pub const fn generic_filter(mut self, filter: EventType) -> Self {
        self.generic_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recovers the listener's event type.
    ///
    /// # Errors
    /// Returns [`EventBusError::Resolution`] when neither this listener nor any
    /// listener it wraps declares an event type.
    pub(crate) fn resolve(&self) -> Result<Resolved, EventBusError> {
        let mut current = Some(self);
        while let Some(listener) = current {
            if let Some(resolved) = listener.declared {
                return Ok(resolved);
            }
            current = listener.wrapped.as_deref();
        }
        Err(EventBusError::Resolution {
            message: format!("Failed to resolve the event type of listener `{}`", self.name).into(),
            context: Some("declare it with `DynListener::declare` or use a typed listener".into()),
        })
    }

    pub(crate) fn into_parts(self) -> DynListenerParts {
        DynListenerParts {
            name: self.name,
            invoker: self.invoker,
            priority: self.priority,
            receive_cancelled: self.receive_cancelled,
            generic_filter: self.generic_filter,
        }
    }

    fn from_parts(name: Cow<'static, str>, declared: Option<Resolved>, invoker: Invoker) -> Self {
        Self {
            name,
            declared,
            wrapped: None,
            invoker,
            priority: Priority::Normal,
            receive_cancelled: false,
            generic_filter: None,
        }
    }

    const fn declared_as(mut self, resolved: Resolved) -> Self {
        self.declared = Some(resolved);
        self
    }
}

impl fmt::Debug for DynListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynListener")
            .field("name", &self.name)
            .field("declared", &self.declared.map(|resolved| resolved.event))
            .field("wrapped", &self.wrapped)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

pub(crate) struct DynListenerParts {
    pub(crate) name: Cow<'static, str>,
    pub(crate) invoker: Invoker,
    pub(crate) priority: Priority,
    pub(crate) receive_cancelled: bool,
    pub(crate) generic_filter: Option<EventType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Ping(u32);
    impl Event for Ping {}

    struct Counter;

    #[test]
    fn handler_method_invokes_only_matching_events() {
        #[derive(Debug, Default)]
        struct Other;
        impl Event for Other {}

        let method = HandlerMethod::new("Counter::on_ping", |_: &Counter, ping: &mut Ping| ping.0 += 1)
            .priority(Priority::High);
        assert_eq!(method.event_type(), EventType::of::<Ping>());
        assert_eq!(method.handler_priority(), Priority::High);

        let invoker = method.bind(Arc::new(Counter));
        let mut ping = Ping(0);
        invoker(&mut ping as &mut dyn Event).unwrap();
        invoker(&mut Other as &mut dyn Event).unwrap();
        assert_eq!(ping.0, 1);
    }

    #[test]
    fn typed_listener_resolves_directly() {
        let listener = DynListener::typed("typed", |_: &mut Ping| {});
        let resolved = listener.resolve().unwrap();
        assert_eq!(resolved.event, EventType::of::<Ping>());
        assert!(!resolved.is_base());
        assert!(format!("{resolved:?}").contains("Ping"));
    }

    #[test]
    fn adapter_chain_resolves_through_wrapped_listener() {
        let inner = DynListener::typed("inner", |_: &mut Ping| {}).priority(Priority::Low);
        let shim = DynListener::adapter("outer", DynListener::adapter("middle", inner));
        assert_eq!(shim.resolve().unwrap().event, EventType::of::<Ping>());
        assert_eq!(shim.priority, Priority::Low);
    }

    #[test]
    fn opaque_listener_fails_resolution() {
        let listener = DynListener::adapter("shim", DynListener::new("opaque", |_: &mut dyn Event| {}));
        let err = listener.resolve().unwrap_err();
        assert!(matches!(err, EventBusError::Resolution { .. }));
        assert!(err.to_string().contains("`shim`"));
    }

    #[test]
    fn explicit_declaration_wins() {
        let listener = DynListener::new("declared", |_: &mut dyn Event| {}).declare::<Ping>();
        assert_eq!(listener.resolve().unwrap().event, EventType::of::<Ping>());
        assert!(DynListener::base("base", |_: &mut dyn Event| {}).resolve().unwrap().is_base());
    }
}
