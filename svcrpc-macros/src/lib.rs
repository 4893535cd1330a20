//! Procedural macros for svcrpc
//!
//! ## `#[procedure]`
//!
//! Turns an async function into a procedure factory. Each argument is one
//! positional param; the function's result becomes the call's result and its
//! error becomes an error response.
//!
//! Without the macro:
//!
//! ```ignore
//! pub fn add() -> Box<dyn Procedure> {
//!     from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a + b) })
//! }
//! ```
//!
//! With it:
//!
//! ```ignore
//! #[svcrpc::procedure]
//! pub async fn add(a: i64, b: i64) -> svcrpc_core::Result<i64> {
//!     Ok(a + b)
//! }
//!
//! let dispatcher = Dispatcher::builder().procedure("add", add()).build();
//! ```

mod procedure;

use proc_macro::TokenStream;

/// Attribute macro turning an async fn into a `Box<dyn Procedure>` factory
///
/// # Requirements
///
/// - the function is `async` and not a method
/// - every argument type implements `serde::Deserialize`
/// - the return type is `svcrpc_core::Result<T>` with `T: Serialize`
///
/// Params that do not deserialize into the argument tuple are answered with
/// an invalid params error. A single struct argument also accepts a by-name
/// params object.
///
/// Attributes and visibility of the function carry over to the factory.
#[proc_macro_attribute]
pub fn procedure(_attr: TokenStream, item: TokenStream) -> TokenStream {
    procedure::procedure_impl(item)
}
