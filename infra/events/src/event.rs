use crate::error::EventBusError;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A payload type that can be posted through an [`EventBus`](crate::EventBus).
///
/// Usually derived with `#[derive(Event)]`. The defaults describe a plain,
/// non-cancelable, non-generic event that only satisfies the base marker.
pub trait Event: Any + Send {
    /// Whether this event kind can be canceled by a listener.
    fn is_cancelable(&self) -> bool {
        false
    }

    /// Whether a listener has canceled this event.
    fn is_canceled(&self) -> bool {
        false
    }

    /// Marks the event as canceled (or not).
    ///
    /// # Errors
    /// Returns [`EventBusError::NotCancelable`] for event kinds that cannot be canceled.
    fn set_canceled(&mut self, canceled: bool) -> Result<(), EventBusError> {
        let _ = canceled;
        Err(EventBusError::NotCancelable {
            message: std::any::type_name::<Self>().into(),
            context: None,
        })
    }

    /// The generic parameter of a generic event, used by generic-filtered listeners.
    fn generic_type(&self) -> Option<EventType> {
        None
    }

    /// Diagnostic name of the runtime event type.
    fn event_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether this event type satisfies the given bus marker.
    fn is_marked(marker: &MarkerType) -> bool
    where
        Self: Sized,
    {
        marker.is_base()
    }
}

/// Runtime descriptor of an event (or generic parameter) type.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    /// Runtime type of an event instance.
    #[must_use]
    pub fn of_val(event: &dyn Event) -> Self {
        let any: &dyn Any = event;
        Self { id: any.type_id(), name: event.event_name() }
    }

    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A trait-object type that every event registered on a bus must satisfy.
///
/// The default marker is `dyn Event`, which every event satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerType {
    ty: EventType,
}

impl MarkerType {
    /// Describes the marker `M`, which must be a trait-object type such as `dyn ModBusEvent`.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] when `M` is a concrete type, sized or
    /// not (`str`, slices).
    pub fn of<M: ?Sized + 'static>() -> Result<Self, EventBusError> {
        // Sized types sit behind thin pointers; `str` and slices are unsized but not `dyn`.
        let thin = size_of::<*const M>() == size_of::<*const ()>();
        if thin || !std::any::type_name::<M>().starts_with("dyn ") {
            return Err(EventBusError::Configuration {
                message: format!(
                    "Cannot specify a concrete marker type `{}`, use a trait object (`dyn Trait`)",
                    std::any::type_name::<M>()
                )
                .into(),
                context: None,
            });
        }
        Ok(Self { ty: EventType::of::<M>() })
    }

    /// The base marker, `dyn Event`.
    #[must_use]
    pub fn base() -> Self {
        Self { ty: EventType::of::<dyn Event>() }
    }

    #[must_use]
    pub fn is_base(&self) -> bool {
        self.ty.is::<dyn Event>()
    }

    #[must_use]
    pub fn is<M: ?Sized + 'static>(&self) -> bool {
        self.ty.is::<M>()
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.ty
    }
}

impl Default for MarkerType {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ty, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait ModBusEvent {}

    #[derive(Debug, Default)]
    struct Ping;
    impl Event for Ping {}

    #[test]
    fn event_type_identity_ignores_name() {
        let a = EventType::of::<Ping>();
        let b = EventType::of_val(&Ping);
        assert_eq!(a, b);
        assert!(a.name().ends_with("Ping"));
    }

    #[test]
    fn marker_rejects_concrete_types() {
        let err = MarkerType::of::<Ping>().unwrap_err();
        assert!(matches!(err, EventBusError::Configuration { .. }));
        assert!(err.to_string().contains("concrete marker type"));
    }

    #[test]
    fn marker_rejects_unsized_concrete_types() {
        for err in [MarkerType::of::<str>().unwrap_err(), MarkerType::of::<[u8]>().unwrap_err()] {
            assert!(matches!(err, EventBusError::Configuration { .. }));
            assert!(err.to_string().contains("concrete marker type"));
        }
        assert!(MarkerType::of::<dyn ModBusEvent + Send>().is_ok());
    }

    #[test]
    fn marker_accepts_trait_objects() {
        let marker = MarkerType::of::<dyn ModBusEvent>().unwrap();
        assert!(marker.is::<dyn ModBusEvent>());
        assert!(!marker.is_base());
        assert!(MarkerType::of::<dyn Event>().unwrap().is_base());
    }

    #[test]
    fn derived_events_check_their_markers() {
        #[derive(Debug, Default, kff_derive::Event)]
        #[event(marker = ModBusEvent)]
        struct Setup {
            #[event(canceled)]
            canceled: bool,
        }
        impl ModBusEvent for Setup {}

        let marker = MarkerType::of::<dyn ModBusEvent>().unwrap();
        assert!(Setup::is_marked(&marker));
        assert!(Setup::is_marked(&MarkerType::base()));
        assert!(!Ping::is_marked(&marker));

        let mut setup = Setup::default();
        setup.set_canceled(true).unwrap();
        assert!(setup.is_cancelable() && setup.is_canceled() && setup.canceled);
    }

    #[test]
    fn default_event_is_not_cancelable() {
        let mut ping = Ping;
        assert!(!ping.is_cancelable());
        assert!(matches!(ping.set_canceled(true), Err(EventBusError::NotCancelable { .. })));
        assert!(Ping::is_marked(&MarkerType::base()));
    }
}
