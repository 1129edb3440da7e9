#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros for the event bus infrastructure.
//! This crate provides the attribute and derive macros that turn plain Rust
//! types into bus events, handler tables, and infrastructure error enums.
//!
//! ## Usage
//! The macros expand to paths under `::kff_event_bus`, so consumers depend on
//! that crate (or on the `kff` facade, which re-exports both):
//! ```toml
//! [dependencies]
//! kff-event-bus = { path = "../infra/events" }
//! ```
//!
//! See each macro’s docstring for examples; they are `ignore`d to avoid compiling in this crate,
//! but should be copied into consuming crates’ tests/examples as needed.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

/// A high-level attribute macro for defining infrastructure error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]`.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Standard Conversions**: Implements `From<T>` for variants made of exactly a
///   `source` field and a `context` field, enabling the `?` operator for upstream errors.
///   Variants carrying extra fields are left to explicit construction.
/// * **Internal Fallback**: Provides `From<&str>` and `From<String>` implementations
///   if an `Internal` variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping external errors must include a `source: T` field or a field marked
///    with `#[source]`/`#[from]` (compatible with `thiserror`).
/// 4. Tuple or unit variants are rejected to keep error wiring explicit and reliable.
///
/// # Example
///
/// ```rust,ignore
/// use kff_derive::kff_error;
/// use std::borrow::Cow;
///
/// #[kff_error]
/// pub enum LoaderError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io {
///         #[source]
///         source: std::io::Error,
///         context: Option<Cow<'static, str>>,
///     },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn kff_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Derives `kff_event_bus::Event` for a struct.
///
/// # Attributes
///
/// * `#[event(cancelable)]` on the struct, together with a `bool` field tagged
///   `#[event(canceled)]` that stores the canceled state. Tagging the field alone
///   also makes the event cancelable.
/// * `#[event(marker = SomeTrait)]` (repeatable) declares that the event satisfies
///   the bus marker `dyn SomeTrait`.
/// * `#[event(generic)]` on an `EventType` field reports the generic parameter of a
///   generic event, used by generic-filtered listeners.
///
/// # Example
///
/// ```rust,ignore
/// use kff_event_bus::Event;
///
/// #[derive(Debug, Default, Event)]
/// #[event(cancelable, marker = ModBusEvent)]
/// struct ChatEvent {
///     message: String,
///     #[event(canceled)]
///     canceled: bool,
/// }
/// ```
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::event::expand_derive(input).into()
}

/// Attribute macro that turns an inherent `impl` block into a handler registration table.
///
/// Methods tagged with `#[subscribe_event]` are collected:
/// 1. `&self` methods become instance handlers (`Subscriber`), registered with `bus.register(&arc)`.
/// 2. Receiver-less functions become static handlers (`StaticSubscriber`), registered with
///    `bus.register_type::<T>()`.
///
/// A tagged method must take exactly one `&mut E` parameter where `E: Event`; anything
/// else is reported at compile time with the method name.
///
/// # Arguments of `#[subscribe_event]`
///
/// * `priority = High` - one of `Highest`, `High`, `Normal` (default), `Low`, `Lowest`.
/// * `receive_cancelled` - also receive events already canceled by earlier listeners.
/// * `generic = Type` - only receive generic events whose parameter is `Type`.
///
/// # Example
///
/// ```rust,ignore
/// #[kff_derive::subscriber]
/// impl ChatLog {
///     #[subscribe_event(priority = High, receive_cancelled)]
///     fn on_chat(&self, event: &mut ChatEvent) {
///         self.lines.lock().push(event.message.clone());
///     }
///
///     #[subscribe_event]
///     fn on_tick(_event: &mut TickEvent) {}
/// }
/// ```
#[proc_macro_attribute]
pub fn subscriber(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    macros::subscriber::expand_subscriber(args.into(), input).into()
}
