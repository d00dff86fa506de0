//! Type registry for the bindery binding layer.
//!
//! - [`TypeRegistry`]: native identity to [`TypeRecord`](bindery_core::TypeRecord),
//!   class bindings and free-function overload sets
//! - [`ClassDecl`] / [`ClassBinding`]: a class before and after binding
//! - [`OverloadSet`]: ordered candidates bound to one name

mod class_binding;
mod inheritance;
mod overload_set;
mod registry;

pub use class_binding::{ClassBinding, ClassDecl, ImplicitConversion, PropertyEntry, linearize};
pub use inheritance::{InheritanceGraph, RecordKey};
pub use overload_set::OverloadSet;
pub use registry::TypeRegistry;
