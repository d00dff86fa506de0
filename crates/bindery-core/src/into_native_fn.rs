//! Conversion of plain Rust closures into [`NativeFn`]s.
//!
//! Four families cover the shapes the builders accept:
//!
//! | Trait | Closure shape |
//! |-------|---------------|
//! | [`IntoNativeFn`] | `Fn(A, B, ..) -> R` |
//! | [`IntoMethodFn`] | `Fn(&T, A, ..) -> R` |
//! | [`IntoMethodMutFn`] | `Fn(&mut T, A, ..) -> R` |
//! | [`IntoConstructorFn`] | `Fn(A, ..) -> T`, adopting the result |
//!
//! Arguments are extracted with [`FromDynamic`] and results converted with
//! [`ToDynamic`]; parameter metadata comes from [`NativeType`]. Closures of
//! up to six parameters are supported. Functions that need the
//! [`CallContext`](crate::CallContext) itself use [`NativeFn::from_fn`].

use std::any::Any;

use crate::convert::{FromDynamic, ToDynamic};
use crate::entries::{ParamSpec, ReturnSpec};
use crate::runtime::NativeFn;
use crate::NativeType;

/// A free function or static method.
pub trait IntoNativeFn<Args, R>: Send + Sync + 'static {
    /// Declared parameters.
    fn params() -> Vec<ParamSpec>;

    /// Declared return type.
    fn returns() -> ReturnSpec;

    /// Erase into a [`NativeFn`].
    fn into_native_fn(self) -> NativeFn;
}

/// A method taking the receiver by shared reference.
pub trait IntoMethodFn<T, Args, R>: Send + Sync + 'static {
    /// Declared parameters, excluding the receiver.
    fn params() -> Vec<ParamSpec>;

    /// Declared return type.
    fn returns() -> ReturnSpec;

    /// Erase into a [`NativeFn`].
    fn into_native_fn(self) -> NativeFn;
}

/// A method taking the receiver by mutable reference.
pub trait IntoMethodMutFn<T, Args, R>: Send + Sync + 'static {
    /// Declared parameters, excluding the receiver.
    fn params() -> Vec<ParamSpec>;

    /// Declared return type.
    fn returns() -> ReturnSpec;

    /// Erase into a [`NativeFn`].
    fn into_native_fn(self) -> NativeFn;
}

/// A constructor whose result is adopted by the dynamic side.
pub trait IntoConstructorFn<Args, T>: Send + Sync + 'static {
    /// Declared parameters.
    fn params() -> Vec<ParamSpec>;

    /// Erase into a [`NativeFn`].
    fn into_native_fn(self) -> NativeFn;
}

macro_rules! impl_into_native_fn {
    ($($arg:ident $var:ident $idx:tt),*) => {
        impl<F, R, $($arg,)*> IntoNativeFn<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: ToDynamic + NativeType,
            $($arg: FromDynamic + NativeType,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of::<$arg>()),*]
            }

            fn returns() -> ReturnSpec {
                ReturnSpec::of::<R>()
            }

            fn into_native_fn(self) -> NativeFn {
                NativeFn::from_fn(move |ctx| {
                    $(let $var: $arg = ctx.arg($idx)?;)*
                    let result = (self)($($var),*);
                    ctx.set_return(result)
                })
            }
        }

        impl<F, T, R, $($arg,)*> IntoMethodFn<T, ($($arg,)*), R> for F
        where
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            T: NativeType,
            R: ToDynamic + NativeType,
            $($arg: FromDynamic + NativeType,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of::<$arg>()),*]
            }

            fn returns() -> ReturnSpec {
                ReturnSpec::of::<R>()
            }

            fn into_native_fn(self) -> NativeFn {
                NativeFn::from_fn(move |ctx| {
                    let this = ctx.this::<T>()?;
                    $(let $var: $arg = ctx.arg($idx)?;)*
                    let result = this.with(|this| (self)(this, $($var),*))?;
                    ctx.set_return(result)
                })
            }
        }

        impl<F, T, R, $($arg,)*> IntoMethodMutFn<T, ($($arg,)*), R> for F
        where
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            T: NativeType,
            R: ToDynamic + NativeType,
            $($arg: FromDynamic + NativeType,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of::<$arg>()),*]
            }

            fn returns() -> ReturnSpec {
                ReturnSpec::of::<R>()
            }

            fn into_native_fn(self) -> NativeFn {
                NativeFn::from_fn(move |ctx| {
                    let this = ctx.this::<T>()?;
                    $(let $var: $arg = ctx.arg($idx)?;)*
                    let result = this.with_mut(|this| (self)(this, $($var),*))?;
                    ctx.set_return(result)
                })
            }
        }

        impl<F, T, $($arg,)*> IntoConstructorFn<($($arg,)*), T> for F
        where
            F: Fn($($arg),*) -> T + Send + Sync + 'static,
            T: NativeType + Any + Send + Sync,
            $($arg: FromDynamic + NativeType,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of::<$arg>()),*]
            }

            fn into_native_fn(self) -> NativeFn {
                NativeFn::from_fn(move |ctx| {
                    $(let $var: $arg = ctx.arg($idx)?;)*
                    let value = (self)($($var),*);
                    ctx.set_return_owned(value)
                })
            }
        }
    };
}

impl_into_native_fn!();
impl_into_native_fn!(A0 a0 0);
impl_into_native_fn!(A0 a0 0, A1 a1 1);
impl_into_native_fn!(A0 a0 0, A1 a1 1, A2 a2 2);
impl_into_native_fn!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_into_native_fn!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_into_native_fn!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::CastContext;
    use crate::runtime::{CallContext, Dynamic};
    use crate::TypeShape;

    fn native<Args, R, F: IntoNativeFn<Args, R>>(f: F) -> (Vec<ParamSpec>, NativeFn) {
        (F::params(), f.into_native_fn())
    }

    fn run(f: &NativeFn, args: &[Dynamic]) -> Dynamic {
        let mut ctx = CallContext::new(args, CastContext::detached());
        f.call(&mut ctx).unwrap();
        ctx.take_return()
    }

    #[test]
    fn nullary() {
        let (params, f) = native(|| 7i32);
        assert!(params.is_empty());
        assert_eq!(run(&f, &[]), Dynamic::Int(7));
    }

    #[test]
    fn binary_with_metadata() {
        let (params, f) = native(|a: i32, b: f64| a as f64 * b);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].type_name, "int");
        assert_eq!(params[1].shape, TypeShape::Primitive(crate::primitives::DOUBLE));
        assert_eq!(run(&f, &[Dynamic::Int(2), Dynamic::Float(1.5)]), Dynamic::Float(3.0));
    }

    #[test]
    fn six_arguments() {
        let (params, f) = native(|a: i64, b: i64, c: i64, d: i64, e: i64, g: i64| {
            a + b + c + d + e + g
        });
        assert_eq!(params.len(), 6);
        let args: Vec<Dynamic> = (1..=6).map(Dynamic::Int).collect();
        assert_eq!(run(&f, &args), Dynamic::Int(21));
    }

    #[test]
    fn conversion_failure_is_reported() {
        let (_, f) = native(|s: String| s.len() as i64);
        let args = [Dynamic::Int(1)];
        let mut ctx = CallContext::new(&args, CastContext::detached());
        assert!(f.call(&mut ctx).is_err());
    }

    #[test]
    fn method_without_receiver_fails() {
        struct Counter(i32);
        impl NativeType for Counter {
            fn type_hash() -> crate::TypeHash {
                crate::TypeHash::from_name("Counter")
            }
            fn type_name() -> std::borrow::Cow<'static, str> {
                "Counter".into()
            }
        }

        fn erase<Args, R, F: IntoMethodFn<Counter, Args, R>>(f: F) -> NativeFn {
            f.into_native_fn()
        }

        let f = erase(|c: &Counter| c.0);
        let args = [];
        let mut ctx = CallContext::new(&args, CastContext::detached());
        assert!(matches!(
            f.call(&mut ctx),
            Err(crate::NativeError::InvalidThis { .. })
        ));
    }
}
