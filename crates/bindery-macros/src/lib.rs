//! Bindery Proc Macros
//!
//! - `#[derive(NativeType)]` - Implement `NativeType` (and optionally the
//!   value casters and field properties) for a struct
//!
//! # Example
//!
//! ```ignore
//! use bindery_macros::NativeType;
//!
//! #[derive(Clone, NativeType)]
//! #[bindery(name = "Point", clone)]
//! pub struct Point {
//!     #[bindery(get, set)]
//!     pub x: f64,
//!     #[bindery(get, name = "y_coord")]
//!     pub y: f64,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_native_type;

/// Derive `bindery_core::NativeType` for a struct.
///
/// # Type Attributes
///
/// - `#[bindery(name = "...")]` - Override the exposed type name
/// - `#[bindery(clone)]` - Also implement `FromDynamic` (by cloning the bound
///   object) and `ToDynamic` (by handing the value to the dynamic side), so
///   the type can be taken and returned by value. Requires `Clone`.
///
/// # Field Attributes
///
/// - `#[bindery(get)]` - Expose the field as a read-only property
/// - `#[bindery(get, set)]` - Expose the field as a read-write property
/// - `#[bindery(name = "...")]` - Override the property name
///
/// Fields with `get` or `set` implement `bindery_module::FieldProperties`,
/// applied with `ClassBuilder::fields()`.
#[proc_macro_derive(NativeType, attributes(bindery))]
pub fn derive_native_type(input: TokenStream) -> TokenStream {
    derive_native_type::derive_native_type_impl(input)
}
