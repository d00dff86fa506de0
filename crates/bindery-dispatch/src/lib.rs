//! Call dispatch for the bindery binding layer.
//!
//! - [`CasterTable`]: staged runtime casters normalizing dynamic arguments
//! - [`conversion`]: per-argument conversions and their costs
//! - [`overload`]: argument binding and cost-based overload ranking
//! - [`Dispatcher`]: runs calls, constructors and attribute access
//! - [`Trampoline`]: virtual method calls from native code

pub mod caster;
pub mod conversion;
mod dispatcher;
pub mod overload;
mod trampoline;

pub use caster::{Cast, CastEnv, CastOptions, CastStage, CasterEntry, CasterFn, CasterTable};
pub use conversion::{Conversion, ConversionKind};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use overload::{CallArgs, OverloadMatch, TieBreak};
pub use trampoline::Trampoline;
