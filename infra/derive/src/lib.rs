#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros for the herald workspace.
//!
//! * [`herald_error`] turns an enum into a context-aware error type.
//! * [`subscriber`] derives the handler table of a subscriber from its `#[subscribe]` methods.
//!
//! Consumers normally reach both through `herald_event_bus`, which re-exports them; the
//! generated code refers to `::herald_event_bus` paths.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

/// A high-level attribute macro for defining error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]`.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a `#[source]` field,
///   enabling the use of the `?` operator for upstream errors.
/// * **Internal Fallback**: Provides `From<&str>` and `From<String>` if an `Internal` variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping external errors must include a `source: T` field or a field marked
///    with `#[source]`/`#[from]` (compatible with `thiserror`).
/// 4. Tuple or unit variants are rejected.
///
/// # Example
///
/// ```rust,ignore
/// use herald_derive::herald_error;
/// use std::borrow::Cow;
///
/// #[herald_error]
/// pub enum LaneError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn spawn_worker() -> Result<(), LaneError> {
///     std::thread::Builder::new().spawn(|| {}).context("Spawning lane worker")?;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn herald_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Derives `herald_event_bus::Subscriber` for the type of an inherent `impl` block.
///
/// Every method tagged `#[subscribe]` becomes one handler entry. The method must take
/// `&self` and a single shared reference to the event, and return either `()` or a
/// `Result<(), E>` whose error converts into a boxed error.
///
/// # Arguments of `#[subscribe]`
///
/// * `thread_mode = "posting" | "main" | "background" | "async"` (default `"posting"`).
/// * `sticky` or `sticky = true` to receive the last sticky event on registration.
///
/// Unknown arguments, unknown thread modes and malformed method signatures are compile errors.
///
/// # Example
///
/// ```rust,ignore
/// use herald_event_bus::subscriber;
///
/// struct Dashboard;
///
/// #[subscriber]
/// impl Dashboard {
///     #[subscribe(thread_mode = "main", sticky)]
///     fn on_session(&self, event: &SessionStarted) {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn subscriber(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    macros::subscriber::expand_subscriber(args.into(), input).into()
}
