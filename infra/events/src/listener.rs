use crate::event::{Event, EventType};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Boxed error returned by a failing listener.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single listener invocation.
pub type ListenerResult = Result<(), BoxError>;

pub(crate) type Invoker = Arc<dyn Fn(&mut dyn Event) -> ListenerResult + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(0);

/// Dispatch order of listeners registered for the same event type on the same bus.
///
/// Listeners run from [`Priority::Highest`] to [`Priority::Lowest`]; equal
/// priorities keep registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Highest,
    High,
    #[default]
    Normal,
    Low,
    Lowest,
}

impl Priority {
    pub const ALL: [Self; 5] = [Self::Highest, Self::High, Self::Normal, Self::Low, Self::Lowest];
}

/// Process-unique identity of a single listener entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a registered target, used only for unregistration bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKey {
    /// An `Arc`-held handler object, identified by its type and address.
    Instance { ty: TypeId, addr: usize },
    /// A handler type whose static handlers were registered.
    Type(TypeId),
    /// A closure listener added through the `add_listener` family.
    Listener(ListenerId),
}

impl TargetKey {
    #[must_use]
    pub fn of_type<S: ?Sized + 'static>() -> Self {
        Self::Type(TypeId::of::<S>())
    }
}

impl<S: ?Sized + 'static> From<&Arc<S>> for TargetKey {
    fn from(target: &Arc<S>) -> Self {
        Self::Instance { ty: TypeId::of::<S>(), addr: Arc::as_ptr(target).cast::<()>().addr() }
    }
}

impl From<ListenerToken> for TargetKey {
    fn from(token: ListenerToken) -> Self {
        Self::Listener(token.id)
    }
}

impl From<&ListenerToken> for TargetKey {
    fn from(token: &ListenerToken) -> Self {
        Self::Listener(token.id)
    }
}

/// Handle returned by the `add_listener` family; pass it to `unregister` to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "the token is the only way to unregister a closure listener"]
pub struct ListenerToken {
    id: ListenerId,
    event: EventType,
    catch_all: bool,
}

impl ListenerToken {
    pub(crate) const fn new(id: ListenerId, event: EventType, catch_all: bool) -> Self {
        Self { id, event, catch_all }
    }

    pub const fn id(&self) -> ListenerId {
        self.id
    }

    pub const fn event_type(&self) -> EventType {
        self.event
    }

    /// `true` when the listener resolved to the base `dyn Event` type instead of a concrete
    /// event; such a listener receives every event posted on the bus.
    pub const fn is_catch_all(&self) -> bool {
        self.catch_all
    }
}

/// Conversion of a handler's return value into a [`ListenerResult`].
///
/// Implemented for `()` and for `Result<(), E>` where `E` converts into [`BoxError`].
pub trait IntoListenerResult {
    fn into_listener_result(self) -> ListenerResult;
}

impl IntoListenerResult for () {
    fn into_listener_result(self) -> ListenerResult {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoListenerResult for Result<(), E> {
    fn into_listener_result(self) -> ListenerResult {
        self.map_err(Into::into)
    }
}

pub(crate) fn typed_invoker<E, F, R>(consumer: F) -> Invoker
where
    E: Event,
    F: Fn(&mut E) -> R + Send + Sync + 'static,
    R: IntoListenerResult,
{
    Arc::new(move |event: &mut dyn Event| {
        let any: &mut dyn Any = event;
        any.downcast_mut::<E>().map_or(Ok(()), |event| consumer(event).into_listener_result())
    })
}

/// Everything needed to build a [`Listener`] entry.
pub(crate) struct ListenerParts {
    pub(crate) target: TargetKey,
    pub(crate) name: Cow<'static, str>,
    pub(crate) event: EventType,
    pub(crate) priority: Priority,
    pub(crate) receive_cancelled: bool,
    pub(crate) generic_filter: Option<EventType>,
    pub(crate) owner: Option<Cow<'static, str>>,
    pub(crate) invoker: Invoker,
}

/// A registered invocable unit bound to one event type.
pub struct Listener {
    id: ListenerId,
    target: TargetKey,
    name: Cow<'static, str>,
    event: EventType,
    priority: Priority,
    receive_cancelled: bool,
    generic_filter: Option<EventType>,
    owner: Option<Cow<'static, str>>,
    invoker: Invoker,
}

impl Listener {
    pub(crate) fn new(id: ListenerId, parts: ListenerParts) -> Self {
        Self {
            id,
            target: parts.target,
            name: parts.name,
            event: parts.event,
            priority: parts.priority,
            receive_cancelled: parts.receive_cancelled,
            generic_filter: parts.generic_filter,
            owner: parts.owner,
            invoker: parts.invoker,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    #[must_use]
    pub const fn target(&self) -> TargetKey {
        self.target
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn receives_cancelled(&self) -> bool {
        self.receive_cancelled
    }

    #[must_use]
    pub const fn generic_filter(&self) -> Option<EventType> {
        self.generic_filter
    }

    /// Module that was active when the listener was registered, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Gating rule, evaluated right before each invocation.
    #[must_use]
    pub fn accepts(&self, event: &dyn Event) -> bool {
        if !self.receive_cancelled && event.is_cancelable() && event.is_canceled() {
            return false;
        }
        self.generic_filter.is_none_or(|filter| event.generic_type() == Some(filter))
    }

    pub(crate) fn invoke(&self, event: &mut dyn Event) -> ListenerResult {
        (self.invoker)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("receive_cancelled", &self.receive_cancelled)
            .field("generic_filter", &self.generic_filter)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A fault raised by a listener during dispatch.
pub enum DispatchFault {
    /// The listener returned an error.
    Error(BoxError),
    /// The listener panicked; the payload is re-raised after the exception policy ran.
    Panic(Box<dyn Any + Send>),
}

impl DispatchFault {
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Self::Error(err) => Cow::Owned(err.to_string()),
            Self::Panic(payload) => payload
                .downcast_ref::<&'static str>()
                .map(|s| Cow::Borrowed(*s))
                .or_else(|| payload.downcast_ref::<String>().map(|s| Cow::Borrowed(s.as_str())))
                .unwrap_or(Cow::Borrowed("<non-string panic payload>")),
        }
    }

    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

impl fmt::Debug for DispatchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Panic(_) => f.debug_tuple("Panic").field(&self.message()).finish(),
        }
    }
}

impl fmt::Display for DispatchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(_) => f.write_str(&self.message()),
            Self::Panic(_) => write!(f, "listener panicked: {}", self.message()),
        }
    }
}
