use crate::bus::{CoreParts, EventBus, ExceptionPolicy};
use crate::error::EventBusError;
use crate::event::MarkerType;
use crate::registry::ListenerRegistry;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

const DEFAULT_NAME: &str = "EVENTS";

/// Options for a new primary [`EventBus`].
///
/// Invalid input is rejected by the setter that receives it, so a builder
/// that reaches [`BusBuilder::build`] always yields a working bus.
///
/// ```rust
/// use kff_event_bus::{EventBus, EventBusError};
///
/// trait ModBusEvent {}
///
/// # fn main() -> Result<(), EventBusError> {
/// let bus = EventBus::builder()
///     .name("MOD")
///     .start_suspended(true)
///     .marker::<dyn ModBusEvent>()?
///     .build();
/// assert!(bus.is_suspended());
/// assert!(bus.marker().is::<dyn ModBusEvent>());
/// # Ok(())
/// # }
/// ```
pub struct BusBuilder {
    name: Cow<'static, str>,
    policy: Option<Arc<dyn ExceptionPolicy>>,
    start_suspended: bool,
    marker: MarkerType,
    registry: Option<Arc<ListenerRegistry>>,
}

impl BusBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: Cow::Borrowed(DEFAULT_NAME),
            policy: None,
            start_suspended: false,
            marker: MarkerType::base(),
            registry: None,
        }
    }

    /// Sets the diagnostic name used in logs and error context.
    #[must_use = "The builder must be configured before it can be used to build a bus."]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the default logging policy for listener faults.
    #[must_use = "The builder must be configured before it can be used to build a bus."]
    pub fn exception_policy(mut self, policy: Arc<dyn ExceptionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Builds the bus suspended; nothing is dispatched until `start()`.
    #[must_use = "The builder must be configured before it can be used to build a bus."]
    pub const fn start_suspended(mut self, suspended: bool) -> Self {
        self.start_suspended = suspended;
        self
    }

    /// Restricts the bus to events implementing the trait `M`.
    ///
    /// # Errors
    /// Returns [`EventBusError::Configuration`] if `M` is a concrete type rather than a
    /// trait object such as `dyn ModBusEvent`.
    pub fn marker<M: ?Sized + 'static>(mut self) -> Result<Self, EventBusError> {
        self.marker = MarkerType::of::<M>()?;
        Ok(self)
    }

    /// Uses `registry` instead of the process-wide [`ListenerRegistry::global`].
    #[must_use = "The builder must be configured before it can be used to build a bus."]
    pub fn registry(mut self, registry: Arc<ListenerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Allocates a fresh bus identity and builds the bus.
    #[must_use]
    pub fn build(self) -> EventBus {
        EventBus::from_parts(CoreParts {
            name: self.name,
            registry: self.registry.unwrap_or_else(ListenerRegistry::global),
            policy: self.policy,
            start_suspended: self.start_suspended,
            marker: self.marker,
        })
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusBuilder")
            .field("name", &self.name)
            .field("custom_policy", &self.policy.is_some())
            .field("start_suspended", &self.start_suspended)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}
