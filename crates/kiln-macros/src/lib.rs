//! Procedural macros for Kiln.
//!
//! `#[injectable]` turns a plain function into a function returning a
//! [`Callable`](https://docs.rs/kiln-core/latest/kiln_core/struct.Callable.html)
//! whose parameter descriptors come from the signature, so handlers and
//! component factories read like ordinary Rust.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_core::{KilnError, Reply};
//! use kiln_extract::QueryParam;
//! use kiln_macros::injectable;
//!
//! #[injectable]
//! fn list_accounts(
//!     accounts: Arc<Accounts>,
//!     page: Option<QueryParam>,
//! ) -> Result<Reply, KilnError> {
//!     let page = page.map_or(Ok(1), |p| p.parse::<u32>())?;
//!     Ok(Reply::serialize(&accounts.page(page))?)
//! }
//!
//! // `list_accounts()` now returns `Callable<Reply>` with two parameters:
//! // `accounts: Accounts` and the optional `page: QueryParam`.
//! let handler = list_accounts();
//! ```
//!
//! # Argument Mapping
//!
//! | Declared type | Parameter | Extraction |
//! |---------------|-----------|------------|
//! | `T` | required `T` | cloned |
//! | `Arc<T>` | required `T` | shared |
//! | `Option<T>` | optional `T` | cloned |
//! | `Option<Arc<T>>` | optional `T` | shared |
//!
//! The function must be synchronous, non-generic and return
//! `Result<R, E>` (or `KilnResult<R>`) where `E: Into<KilnError>`.

mod injectable;
mod parse;

use proc_macro::TokenStream;

/// Makes a function injectable.
///
/// # Attributes
///
/// - `name`: the callable's name (defaults to the function name)
/// - `crate`: path to the core crate, for users of the `kiln` facade
///   (`#[injectable(crate = "kiln::core")]`)
///
/// # Generated Code
///
/// ```rust,ignore
/// fn list_accounts() -> kiln_core::Callable<Reply> {
///     fn __kiln_list_accounts(accounts: Arc<Accounts>, page: Option<QueryParam>) -> Result<Reply, KilnError> {
///         /* original body */
///     }
///
///     kiln_core::Callable::builder("list_accounts")
///         .parameter(kiln_core::Parameter::new::<Accounts>("accounts"))
///         .parameter(kiln_core::Parameter::new::<QueryParam>("page").optional())
///         .build(|__args| {
///             let accounts: Arc<Accounts> = __args.shared::<Accounts>("accounts")?;
///             let page: Option<QueryParam> = __args.optional::<QueryParam>("page")?;
///             __kiln_list_accounts(accounts, page).map_err(Into::into)
///         })
/// }
/// ```
#[proc_macro_attribute]
pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    injectable::expand_injectable(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
