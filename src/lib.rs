//! bindery: a binding layer between native Rust code and a dynamic caller.
//!
//! Native types and functions are declared on [`Module`]s, installed into a
//! [`Context`] and sealed. The sealed context's [`Dispatcher`] resolves
//! overloads, converts [`Dynamic`] arguments through the caster table, runs
//! the native code under the boundary lock and hands the result back,
//! tracking the lifetime of every object that crosses.
//!
//! ```ignore
//! use bindery::prelude::*;
//!
//! #[derive(Clone, NativeType)]
//! #[bindery(clone)]
//! struct Point {
//!     #[bindery(get, set)]
//!     x: f64,
//!     #[bindery(get, set)]
//!     y: f64,
//! }
//!
//! let mut module = Module::new("geometry");
//! module
//!     .class::<Point>()
//!     .constructor(|x: f64, y: f64| Point { x, y })
//!     .fields()
//!     .build()?;
//!
//! let mut ctx = Context::with_config(
//!     ContextConfig::new().with_host_version(Version::new(3, 12, 0)),
//! )?;
//! ctx.install(module)?;
//! ctx.seal()?;
//!
//! let p = ctx.construct("Point", vec![1.0.into(), 2.0.into()])?;
//! assert_eq!(ctx.get_attr(&p, "y")?, Dynamic::Float(2.0));
//! ```

pub mod config;
pub mod context;
pub mod logging;
pub mod paths;

pub use bindery_core::*;
pub use bindery_dispatch::{
    CallArgs, Cast, CastEnv, CastOptions, CastStage, CasterEntry, CasterTable, Conversion,
    ConversionKind, DispatchConfig, Dispatcher, TieBreak, Trampoline,
};
pub use bindery_macros::NativeType;
pub use bindery_module::{ClassBuilder, FieldProperties, FunctionBuilder, Module};
pub use bindery_registry::{ClassBinding, OverloadSet, TypeRegistry};

pub use config::ContextConfig;
pub use context::{Context, ContextError, init_process_context, process_context};
pub use logging::{LogConfig, LoggingError, init_logging};
pub use paths::{cmake_config_directory, include_directory};

pub mod prelude {
    pub use crate::config::ContextConfig;
    pub use crate::context::{Context, ContextError};
    pub use bindery_core::{
        BindError, CallContext, Dynamic, FromDynamic, HolderKind, NativeError, NativeType,
        ObjectRef, ReturnPolicy, ToDynamic, Version,
    };
    pub use bindery_dispatch::{CallArgs, Dispatcher, TieBreak};
    pub use bindery_macros::NativeType;
    pub use bindery_module::{FieldProperties, Module};
}
