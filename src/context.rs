//! Binding context: installed modules, sealed into a runtime.
//!
//! A `Context` collects modules while an extension loads. Sealing it turns
//! the registry and caster table into immutable shared state and creates the
//! [`Dispatcher`] every call goes through.
//!
//! # Example
//!
//! ```ignore
//! use bindery::{Context, Module};
//!
//! let mut geometry = Module::new("geometry");
//! geometry.function("area", |w: f64, h: f64| w * h);
//!
//! let mut ctx = Context::new();
//! ctx.install(geometry)?;
//! ctx.seal()?;
//!
//! let area = ctx.call("area", vec![2.0.into(), 3.0.into()])?;
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing::debug;

use bindery_core::{
    BindError, BoundaryLock, Dynamic, LifetimeManager, ObjectRef, RegistrationError, VersionError,
    check_host_version,
};
use bindery_dispatch::{CallArgs, CasterEntry, CasterTable, Dispatcher};
use bindery_module::Module;
use bindery_registry::TypeRegistry;

use crate::config::ContextConfig;
use crate::logging::{LoggingError, init_logging};

/// Owns installed modules and, once sealed, the dispatcher.
pub struct Context {
    config: ContextConfig,
    /// Names of installed modules, in install order.
    modules: Vec<String>,
    /// Registry under construction (consumed on seal).
    registry: Option<TypeRegistry>,
    /// Caster table under construction (consumed on seal).
    casters: Option<CasterTable>,
    /// Available after seal.
    dispatcher: Option<Arc<Dispatcher>>,
}

impl Context {
    /// Create an empty context with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
            modules: Vec::new(),
            registry: Some(TypeRegistry::new()),
            casters: Some(CasterTable::builtin()),
            dispatcher: None,
        }
    }

    /// Create a context from `config`.
    ///
    /// Checks the host version when one is given and installs the log
    /// subscriber when logging is configured. An already installed global
    /// subscriber is left in place.
    ///
    /// # Errors
    ///
    /// `ContextError::UnsupportedHost` when the host is older than
    /// [`MIN_HOST_VERSION`](bindery_core::MIN_HOST_VERSION).
    pub fn with_config(config: ContextConfig) -> Result<Self, ContextError> {
        if let Some(host) = config.host_version() {
            check_host_version(host)?;
        }
        if let Some(logging) = config.logging() {
            match init_logging(logging) {
                Ok(()) | Err(LoggingError::AlreadyInitialized(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        debug!(host = ?config.host_version(), dispatch = ?config.dispatch(), "created context");
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Install a module, binding its classes and functions.
    ///
    /// # Errors
    ///
    /// `ContextError::AlreadySealed` after [`seal`](Self::seal), or the
    /// registration error of the first class or function that fails.
    pub fn install(&mut self, module: Module) -> Result<(), ContextError> {
        if self.dispatcher.is_some() {
            return Err(ContextError::AlreadySealed);
        }
        let registry = self.registry.as_mut().ok_or(ContextError::AlreadySealed)?;

        let name = module.name().to_string();
        module.apply_to(registry)?;
        self.modules.push(name);
        Ok(())
    }

    /// Add a runtime caster. Only allowed before sealing.
    pub fn register_caster(&mut self, entry: CasterEntry) -> Result<(), ContextError> {
        if self.dispatcher.is_some() {
            return Err(ContextError::AlreadySealed);
        }
        let casters = self.casters.as_mut().ok_or(ContextError::AlreadySealed)?;
        casters.register(entry);
        Ok(())
    }

    /// Seal the context, freezing the registry and creating the dispatcher.
    ///
    /// Calling `seal()` multiple times is safe; later calls are no-ops.
    pub fn seal(&mut self) -> Result<(), ContextError> {
        if self.dispatcher.is_some() {
            return Ok(());
        }

        let registry = self.registry.take().unwrap_or_default();
        let casters = self.casters.take().unwrap_or_else(CasterTable::builtin);
        let manager = Arc::new(LifetimeManager::new(Arc::new(BoundaryLock::new())));

        debug!(
            modules = self.modules.len(),
            types = registry.type_count(),
            functions = registry.function_count(),
            casters = casters.len(),
            "sealed context"
        );

        let dispatcher = Dispatcher::new(Arc::new(registry), manager)
            .with_casters(Arc::new(casters))
            .with_config(self.config.dispatch());
        self.dispatcher = Some(Arc::new(dispatcher));
        Ok(())
    }

    /// Check if the context has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// The dispatcher (available after sealing).
    pub fn dispatcher(&self) -> Result<&Arc<Dispatcher>, ContextError> {
        self.dispatcher.as_ref().ok_or(ContextError::NotSealed)
    }

    /// The sealed registry.
    pub fn registry(&self) -> Option<&Arc<TypeRegistry>> {
        self.dispatcher.as_ref().map(|d| d.registry())
    }

    /// Names of the installed modules.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Check whether a module with `name` is installed.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Call a free function.
    pub fn call(&self, name: &str, args: impl Into<CallArgs>) -> Result<Dynamic, ContextError> {
        Ok(self.dispatcher()?.call(name, args)?)
    }

    /// Construct an instance of a class by name.
    pub fn construct(
        &self,
        class: &str,
        args: impl Into<CallArgs>,
    ) -> Result<ObjectRef, ContextError> {
        Ok(self.dispatcher()?.construct(class, args)?)
    }

    /// Call a method, honoring dynamic overrides.
    pub fn call_method(
        &self,
        obj: &ObjectRef,
        name: &str,
        args: impl Into<CallArgs>,
    ) -> Result<Dynamic, ContextError> {
        Ok(self.dispatcher()?.call_method(obj, name, args)?)
    }

    pub fn get_attr(&self, obj: &ObjectRef, name: &str) -> Result<Dynamic, ContextError> {
        Ok(self.dispatcher()?.get_attr(obj, name)?)
    }

    pub fn set_attr(&self, obj: &ObjectRef, name: &str, value: Dynamic) -> Result<(), ContextError> {
        Ok(self.dispatcher()?.set_attr(obj, name, value)?)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("modules", &self.modules)
            .field("sealed", &self.is_sealed())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// ==========================================================================
// Process context
// ==========================================================================

static PROCESS_CONTEXT: OnceLock<Context> = OnceLock::new();

/// Seal `context` and make it the process-wide context.
///
/// Embedders that want one registry per process install it here once, at
/// the outermost boundary. Everything below takes explicit handles.
///
/// # Errors
///
/// `ContextError::ProcessContextInitialized` if a process context exists.
pub fn init_process_context(mut context: Context) -> Result<&'static Context, ContextError> {
    if PROCESS_CONTEXT.get().is_some() {
        return Err(ContextError::ProcessContextInitialized);
    }
    context.seal()?;
    PROCESS_CONTEXT
        .set(context)
        .map_err(|_| ContextError::ProcessContextInitialized)?;
    PROCESS_CONTEXT
        .get()
        .ok_or(ContextError::ProcessContextInitialized)
}

/// The process-wide context, if one has been installed.
pub fn process_context() -> Option<&'static Context> {
    PROCESS_CONTEXT.get()
}

/// Errors that can occur during context operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A module failed to register
    #[error("failed to install module: {0}")]
    Registration(#[from] RegistrationError),

    /// Context is already sealed - cannot install modules
    #[error("context is already sealed - cannot install modules or casters after seal()")]
    AlreadySealed,

    /// Context is not sealed - must call seal() before calling into it
    #[error("context is not sealed - call seal() before dispatching calls")]
    NotSealed,

    #[error(transparent)]
    UnsupportedHost(#[from] VersionError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// A call failed at the boundary
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("a process context is already installed")]
    ProcessContextInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::Version;

    fn math() -> Module {
        let mut module = Module::new("math");
        module
            .function("double", |x: i64| x * 2)
            .function("double", |x: f64| x * 2.0);
        module
    }

    #[test]
    fn context_new() {
        let ctx = Context::new();
        assert_eq!(ctx.module_count(), 0);
        assert!(!ctx.is_sealed());
    }

    #[test]
    fn context_default() {
        let ctx = Context::default();
        assert_eq!(ctx.module_count(), 0);
    }

    #[test]
    fn context_install_module() {
        let mut ctx = Context::new();
        ctx.install(math()).unwrap();
        ctx.install(Module::new("io")).unwrap();

        assert_eq!(ctx.module_count(), 2);
        assert_eq!(ctx.modules(), ["math", "io"]);
        assert!(ctx.has_module("io"));
        assert!(!ctx.has_module("nonexistent"));
    }

    #[test]
    fn context_seal() {
        let mut ctx = Context::new();
        ctx.install(math()).unwrap();
        assert!(ctx.registry().is_none());

        ctx.seal().unwrap();
        assert!(ctx.is_sealed());
        assert_eq!(ctx.registry().unwrap().function("double").unwrap().len(), 2);
    }

    #[test]
    fn context_seal_idempotent() {
        let mut ctx = Context::new();
        ctx.seal().unwrap();
        let first = Arc::clone(ctx.dispatcher().unwrap());
        ctx.seal().unwrap();
        assert!(Arc::ptr_eq(&first, ctx.dispatcher().unwrap()));
    }

    #[test]
    fn context_install_after_seal_fails() {
        let mut ctx = Context::new();
        ctx.seal().unwrap();
        let result = ctx.install(math());
        assert!(matches!(result, Err(ContextError::AlreadySealed)));
    }

    #[test]
    fn context_caster_after_seal_fails() {
        let mut ctx = Context::new();
        ctx.seal().unwrap();
        let entry = CasterEntry::new("noop", bindery_dispatch::CastStage::UserDefined, |_, _, _| {
            Ok(None)
        });
        assert!(matches!(
            ctx.register_caster(entry),
            Err(ContextError::AlreadySealed)
        ));
    }

    #[test]
    fn context_call_before_seal_fails() {
        let mut ctx = Context::new();
        ctx.install(math()).unwrap();
        let result = ctx.call("double", vec![Dynamic::Int(2)]);
        assert!(matches!(result, Err(ContextError::NotSealed)));
    }

    #[test]
    fn context_call() {
        let mut ctx = Context::new();
        ctx.install(math()).unwrap();
        ctx.seal().unwrap();
        assert_eq!(ctx.call("double", vec![Dynamic::Int(21)]).unwrap(), Dynamic::Int(42));
        assert_eq!(
            ctx.call("double", vec![Dynamic::Float(1.5)]).unwrap(),
            Dynamic::Float(3.0)
        );

        let err = ctx.call("double", vec![Dynamic::Str("x".into())]).unwrap_err();
        assert!(matches!(
            err,
            ContextError::Bind(BindError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn context_rejects_old_host() {
        let config = ContextConfig::new().with_host_version(Version::new(2, 7, 18));
        let err = Context::with_config(config).unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedHost(_)));
        assert!(err.to_string().contains("3.5"));

        let config = ContextConfig::new().with_host_version(Version::new(3, 5, 0));
        assert!(Context::with_config(config).is_ok());
    }

    #[test]
    fn context_duplicate_module_registration_fails() {
        let mut ctx = Context::new();
        let mut first = Module::new("a");
        first.class::<Marker>().build().unwrap();
        let mut second = Module::new("b");
        second.class::<Marker>().build().unwrap();

        ctx.install(first).unwrap();
        let err = ctx.install(second).unwrap_err();
        assert!(matches!(err, ContextError::Registration(_)));
        assert_eq!(ctx.module_count(), 1);
    }

    #[test]
    fn context_error_display() {
        assert!(ContextError::AlreadySealed.to_string().contains("already sealed"));
        assert!(ContextError::NotSealed.to_string().contains("not sealed"));
    }

    struct Marker;

    impl bindery_core::NativeType for Marker {
        fn type_hash() -> bindery_core::TypeHash {
            bindery_core::TypeHash::from_name("Marker")
        }

        fn type_name() -> std::borrow::Cow<'static, str> {
            "Marker".into()
        }
    }
}
