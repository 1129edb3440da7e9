//! # Event Bus
//!
//! A typed, priority-ordered, synchronous event bus for in-process messaging.
//!
//! ## Overview
//!
//! Every primary [`EventBus`] owns an identity in a shared [`ListenerRegistry`], which
//! stores one ordered listener slot per (event type, bus). Listeners come from
//! registration tables generated by `#[subscriber]`, from closures, or from
//! type-erased [`DynListener`]s. A [`SharedBusAdapter`] wraps an existing bus and
//! shares all of its state.
//!
//! ## Features
//!
//! * **Type-Safe**: Events are identified by their Rust type; handlers take `&mut E`.
//! * **Ordered**: Listeners run from [`Priority::Highest`] to [`Priority::Lowest`],
//!   ties in registration order.
//! * **Cancelable events**: Listeners can cancel an event; later listeners skip it
//!   unless they opted in with `receive_cancelled`.
//! * **Fault isolation**: A failing listener stops dispatch, is reported once to the
//!   [`ExceptionPolicy`] and surfaces to the caller of `post`.
//! * **Concurrent**: Registration and dispatch are safe from any thread; dispatch
//!   iterates an immutable snapshot.
//!
//! # Example
//!
//! ```rust
//! use kff_event_bus::{Event, EventBus, EventBusError, Priority, subscriber};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! #[derive(Debug, Default, Event)]
//! struct ServerStarting {
//!     #[event(canceled)]
//!     canceled: bool,
//! }
//!
//! #[derive(Debug, Default)]
//! struct Watchdog {
//!     seen: AtomicU32,
//! }
//!
//! #[subscriber]
//! impl Watchdog {
//!     #[subscribe_event(priority = High)]
//!     fn on_start(&self, event: &mut ServerStarting) -> Result<(), EventBusError> {
//!         self.seen.fetch_add(1, Ordering::Relaxed);
//!         event.set_canceled(true)
//!     }
//! }
//!
//! fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::builder().name("docs").build();
//!     let watchdog = Arc::new(Watchdog::default());
//!     bus.register(&watchdog)?;
//!
//!     let canceled = bus.post(&mut ServerStarting::default())?;
//!     assert!(canceled);
//!     assert_eq!(watchdog.seen.load(Ordering::Relaxed), 1);
//!     Ok(())
//! }
//! ```

extern crate self as kff_event_bus;

mod adapter;
mod builder;
mod bus;
mod error;
mod event;
mod listener;
mod owner;
mod registry;
mod resolution;

pub use adapter::SharedBusAdapter;
pub use builder::BusBuilder;
pub use bus::{BusCore, EventBus, ExceptionPolicy, HostBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use event::{Event, EventType, MarkerType};
pub use kff_derive::{Event, subscriber};
pub use listener::{
    BoxError, DispatchFault, IntoListenerResult, Listener, ListenerId, ListenerResult,
    ListenerToken, Priority, TargetKey,
};
pub use owner::ActiveModule;
pub use registry::{BusId, ListenerRegistry, ListenerSnapshot};
pub use resolution::{DynListener, HandlerMethod, StaticSubscriber, Subscriber};
