//! Registration builders for the bindery binding layer.
//!
//! Extensions describe what they expose through a [`Module`]:
//!
//! ```text
//! Module (builders) -> apply_to() -> TypeRegistry (dispatch)
//! ```
//!
//! - [`Module`]: a named load unit of classes and free functions
//! - [`ClassBuilder`]: constructors, methods, properties, bases, virtuals
//! - [`FunctionBuilder`]: argument names, defaults and call policies

mod class_builder;
mod function_builder;
mod module;

pub use class_builder::{ClassBuilder, FieldProperties};
pub use function_builder::FunctionBuilder;
pub use module::Module;
