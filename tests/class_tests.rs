//! Bound classes through a sealed context: members, multiple inheritance,
//! virtual dispatch and dynamic subclasses.

use std::sync::Arc;

use bindery::{
    BindError, CallContext, Context, ContextError, DynCallable, Dynamic, DynamicClass, Instance,
    LoadUnit, Module, NativeError, NativeFn, NativeType, ObjectRef, ParamSpec, ReturnSpec, tags,
};

#[derive(Debug, Clone, NativeType)]
struct Shape {
    sides: i64,
}

#[derive(Debug, Clone, NativeType)]
struct Named {
    label: String,
}

#[derive(Debug, Clone, NativeType)]
struct Square {
    shape: Shape,
    named: Named,
    side: f64,
}

#[derive(Debug, NativeType)]
struct Sealed;

#[derive(Debug, Default, NativeType)]
struct Bag;

#[derive(Debug, Clone, NativeType)]
#[bindery(clone)]
struct Token {
    id: i64,
}

fn describe_through_native(ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
    let shape: Instance<Shape> = ctx.arg(0)?;
    let text: String = ctx.call_virtual(shape.object(), "describe", vec![])?;
    ctx.set_return(format!("<{}>", text))
}

fn shapes() -> Module {
    let mut module = Module::new("shapes");

    module
        .class::<Shape>()
        .constructor(|sides: i64| Shape { sides })
        .readonly("sides", |s: &Shape| s.sides)
        .method("kind", |_s: &Shape| "shape".to_string())
        .virtual_method("describe", |s: &Shape| format!("shape with {} sides", s.sides))
        .pure_virtual::<f64>("area", |m| m)
        .unwrap()
        .build()
        .unwrap();

    module
        .class::<Named>()
        .constructor(|label: String| Named { label })
        .constructor(|| Named {
            label: "anon".to_string(),
        })
        .property(
            "label",
            |n: &Named| n.label.clone(),
            |n: &mut Named, label: String| n.label = label,
        )
        .method("kind", |_n: &Named| "named".to_string())
        .method("greet", |n: &Named| format!("hello {}", n.label))
        .build()
        .unwrap();

    module
        .class::<Square>()
        .base::<Shape>(|s| &s.shape, |s| &mut s.shape)
        .base::<Named>(|s| &s.named, |s| &mut s.named)
        .constructor(|side: f64| Square {
            shape: Shape { sides: 4 },
            named: Named {
                label: "square".to_string(),
            },
            side,
        })
        .method("area", |s: &Square| s.side * s.side)
        .static_method("unit_side", || 1.0)
        .build()
        .unwrap();

    module.class::<Sealed>().final_class().build().unwrap();
    module
        .class::<Bag>()
        .constructor(|| Bag)
        .dynamic_attr()
        .build()
        .unwrap();

    module
        .function("sides_of", |s: Instance<Shape>| -> Result<i64, NativeError> {
            s.with(|s| s.sides)
        })
        .function("label_of", |n: Instance<Named>| -> Result<String, NativeError> {
            n.with(|n| n.label.clone())
        })
        .add_function(bindery::FunctionEntry::new(
            "describe_shape",
            vec![ParamSpec::of::<Instance<Shape>>()],
            ReturnSpec::of::<String>(),
            NativeFn::from_fn(describe_through_native),
        ));
    module
}

fn context() -> Context {
    let mut ctx = Context::new();
    ctx.install(shapes()).unwrap();
    ctx.seal().unwrap();
    ctx
}

fn subclass(ctx: &Context, name: &str, base: &str) -> DynamicClass {
    let record = ctx.registry().unwrap().lookup_name(base, None).unwrap();
    DynamicClass::new(name, record)
}

fn construct_subclass(ctx: &Context, class: DynamicClass, args: Vec<Dynamic>) -> ObjectRef {
    ctx.dispatcher()
        .unwrap()
        .construct_subclass(Arc::new(class), args)
        .unwrap()
}

fn no_args() -> Vec<Dynamic> {
    Vec::new()
}

// =============================================================================
// Members
// =============================================================================

#[test]
fn constructors_and_properties() {
    let ctx = context();

    let named = ctx.construct("Named", vec![Dynamic::from("box")]).unwrap();
    assert_eq!(ctx.get_attr(&named, "label").unwrap(), Dynamic::from("box"));
    ctx.set_attr(&named, "label", Dynamic::from("crate")).unwrap();
    assert_eq!(
        ctx.call_method(&named, "greet", no_args()).unwrap(),
        Dynamic::from("hello crate")
    );

    let anon = ctx.construct("Named", no_args()).unwrap();
    assert_eq!(ctx.get_attr(&anon, "label").unwrap(), Dynamic::from("anon"));
}

#[test]
fn readonly_and_missing_attributes() {
    let ctx = context();
    let shape = ctx.construct("Shape", vec![Dynamic::Int(3)]).unwrap();

    assert_eq!(ctx.get_attr(&shape, "sides").unwrap(), Dynamic::Int(3));

    let err = ctx.set_attr(&shape, "sides", Dynamic::Int(5)).unwrap_err();
    assert!(matches!(
        err,
        ContextError::Bind(BindError::NativeException { ref type_tag, ref message })
            if type_tag == tags::ATTRIBUTE_ERROR && message.contains("can't set attribute")
    ));

    let err = ctx.get_attr(&shape, "colour").unwrap_err();
    assert!(matches!(err, ContextError::Bind(BindError::Attribute { .. })));
    let err = ctx.set_attr(&shape, "colour", Dynamic::from("red")).unwrap_err();
    assert!(matches!(err, ContextError::Bind(BindError::Attribute { .. })));
}

#[test]
fn dynamic_attributes_are_opt_in() {
    let ctx = context();
    let bag = ctx.construct("Bag", no_args()).unwrap();

    ctx.set_attr(&bag, "anything", Dynamic::Int(7)).unwrap();
    assert_eq!(ctx.get_attr(&bag, "anything").unwrap(), Dynamic::Int(7));
    assert!(ctx.get_attr(&bag, "nothing").is_err());
}

#[test]
fn unknown_and_abstract_classes() {
    let ctx = context();

    let err = ctx.construct("Circle", no_args()).unwrap_err();
    assert!(err.to_string().contains("unknown class 'Circle'"));

    let err = ctx.construct("Sealed", no_args()).unwrap_err();
    assert!(err.to_string().contains("No constructor defined!"));
}

// =============================================================================
// Inheritance
// =============================================================================

#[test]
fn mro_lists_bases_in_declaration_order() {
    let ctx = context();
    let registry = ctx.registry().unwrap();
    let square = registry.class_by_name("Square", None).unwrap();

    let names: Vec<&str> = square.mro().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Square", "Shape", "Named"]);
}

#[test]
fn first_base_wins_for_shared_names() {
    let ctx = context();
    let square = ctx.construct("Square", vec![Dynamic::Float(2.0)]).unwrap();

    assert_eq!(
        ctx.call_method(&square, "kind", no_args()).unwrap(),
        Dynamic::from("shape")
    );
}

#[test]
fn members_of_every_base_are_reachable() {
    let ctx = context();
    let square = ctx.construct("Square", vec![Dynamic::Float(2.0)]).unwrap();

    assert_eq!(ctx.get_attr(&square, "sides").unwrap(), Dynamic::Int(4));
    assert_eq!(
        ctx.call_method(&square, "greet", no_args()).unwrap(),
        Dynamic::from("hello square")
    );

    ctx.set_attr(&square, "label", Dynamic::from("tile")).unwrap();
    assert_eq!(ctx.get_attr(&square, "label").unwrap(), Dynamic::from("tile"));

    assert_eq!(
        ctx.call_method(&square, "unit_side", no_args()).unwrap(),
        Dynamic::Float(1.0)
    );
}

#[test]
fn derived_objects_pass_as_any_base() {
    let ctx = context();
    let square = ctx.construct("Square", vec![Dynamic::Float(2.0)]).unwrap();
    let named = ctx.construct("Named", vec![Dynamic::from("n")]).unwrap();

    assert_eq!(
        ctx.call("sides_of", vec![Dynamic::Object(square.clone())]).unwrap(),
        Dynamic::Int(4)
    );
    assert_eq!(
        ctx.call("label_of", vec![Dynamic::Object(square)]).unwrap(),
        Dynamic::from("square")
    );

    let err = ctx.call("sides_of", vec![Dynamic::Object(named)]).unwrap_err();
    assert!(matches!(
        err,
        ContextError::Bind(BindError::NoMatchingOverload { .. })
    ));
}

// =============================================================================
// Virtual dispatch
// =============================================================================

#[test]
fn native_override_of_pure_virtual() {
    let ctx = context();
    let square = ctx.construct("Square", vec![Dynamic::Float(3.0)]).unwrap();
    assert_eq!(
        ctx.call_method(&square, "area", no_args()).unwrap(),
        Dynamic::Float(9.0)
    );

    let shape = ctx.construct("Shape", vec![Dynamic::Int(3)]).unwrap();
    let err = ctx.call_method(&shape, "area", no_args()).unwrap_err();
    let ContextError::Bind(BindError::NativeException { type_tag, message }) = err else {
        panic!("expected a native exception");
    };
    assert_eq!(type_tag, tags::PURE_VIRTUAL);
    assert!(message.contains("Shape.area"));
}

#[test]
fn dynamic_overrides_are_seen_from_native_code() {
    let ctx = context();
    let class = subclass(&ctx, "Hexagon", "Shape")
        .with_override(
            "describe",
            DynCallable::new("describe", |args| {
                // the object comes first
                let receivers = args.iter().filter(|a| a.as_object().is_some()).count();
                Ok(Dynamic::from(format!("hexagon ({} receiver)", receivers)))
            }),
        )
        .with_override(
            "area",
            DynCallable::new("area", |_args| Ok(Dynamic::Float(2.5))),
        );
    let hexagon = construct_subclass(&ctx, class, vec![Dynamic::Int(6)]);
    assert_eq!(hexagon.class_name(), "Hexagon");

    assert_eq!(
        ctx.call("describe_shape", vec![Dynamic::Object(hexagon.clone())]).unwrap(),
        Dynamic::from("<hexagon (1 receiver)>")
    );
    assert_eq!(
        ctx.call_method(&hexagon, "area", no_args()).unwrap(),
        Dynamic::Float(2.5)
    );

    // native base members still work on the subclass instance
    assert_eq!(ctx.get_attr(&hexagon, "sides").unwrap(), Dynamic::Int(6));

    let plain = ctx.construct("Shape", vec![Dynamic::Int(5)]).unwrap();
    assert_eq!(
        ctx.call("describe_shape", vec![Dynamic::Object(plain)]).unwrap(),
        Dynamic::from("<shape with 5 sides>")
    );
}

#[test]
fn trampolines_fall_back_to_the_native_default() {
    let ctx = context();
    let dispatcher = ctx.dispatcher().unwrap();
    let class = subclass(&ctx, "Quiet", "Shape");
    let quiet = construct_subclass(&ctx, class, vec![Dynamic::Int(3)]);

    let describe = dispatcher.trampoline("describe");
    assert!(describe.is_virtual(&quiet));
    assert!(!describe.has_override(&quiet));
    assert_eq!(
        describe.call_as::<String>(&quiet, vec![]).unwrap(),
        "shape with 3 sides"
    );

    let dynamic = quiet.dynamic_class().unwrap();
    dynamic.set_override(
        "describe",
        DynCallable::new("describe", |_args| Ok(Dynamic::from("late"))),
    );
    assert!(describe.has_override(&quiet));
    assert_eq!(describe.call_as::<String>(&quiet, vec![]).unwrap(), "late");
    assert_eq!(
        ctx.call("describe_shape", vec![Dynamic::Object(quiet.clone())]).unwrap(),
        Dynamic::from("<late>")
    );

    assert!(dynamic.remove_override("describe").is_some());
    assert!(!describe.has_override(&quiet));
    assert_eq!(
        describe.call_as::<String>(&quiet, vec![]).unwrap(),
        "shape with 3 sides"
    );
    assert_eq!(
        ctx.call("describe_shape", vec![Dynamic::Object(quiet)]).unwrap(),
        Dynamic::from("<shape with 3 sides>")
    );
}

#[test]
fn override_failures_propagate_unchanged() {
    let ctx = context();
    let class = subclass(&ctx, "Broken", "Shape").with_override(
        "describe",
        DynCallable::new("describe", |_args| {
            Err(BindError::native(tags::VALUE_ERROR, "broken override"))
        }),
    );
    let broken = construct_subclass(&ctx, class, vec![Dynamic::Int(1)]);

    let err = ctx
        .call("describe_shape", vec![Dynamic::Object(broken)])
        .unwrap_err();
    let ContextError::Bind(err) = err else {
        panic!("expected a bind error");
    };
    assert_eq!(err, BindError::native(tags::VALUE_ERROR, "broken override"));
}

#[test]
fn final_classes_reject_dynamic_subclasses() {
    let ctx = context();
    let class = subclass(&ctx, "Unsealed", "Sealed");
    let err = ctx
        .dispatcher()
        .unwrap()
        .construct_subclass(Arc::new(class), no_args())
        .unwrap_err();
    assert!(matches!(err, BindError::NativeException { ref type_tag, .. } if type_tag == tags::TYPE_ERROR));
    assert!(err.to_string().contains("not an acceptable base type"));
}

// =============================================================================
// Load units
// =============================================================================

fn token_module(module_name: &str, class: &str, maker: &str, id: i64) -> Module {
    let mut module = Module::new(module_name);
    module
        .class_named::<Token>(class)
        .module_local()
        .readonly("id", |t: &Token| t.id)
        .build()
        .unwrap();
    module.function(maker, move || Token { id });
    module
}

#[test]
fn module_local_classes_stay_in_their_module() {
    let mut ctx = Context::new();
    ctx.install(token_module("ext_a", "TokenA", "make_a", 1)).unwrap();
    ctx.install(token_module("ext_b", "TokenB", "make_b", 2)).unwrap();
    ctx.seal().unwrap();

    let a = ctx.call("make_a", no_args()).unwrap();
    let b = ctx.call("make_b", no_args()).unwrap();
    let (Some(a), Some(b)) = (a.as_object(), b.as_object()) else {
        panic!("expected objects");
    };
    assert_eq!(a.type_name(), "TokenA");
    assert_eq!(b.type_name(), "TokenB");
    assert_eq!(ctx.get_attr(a, "id").unwrap(), Dynamic::Int(1));
    assert_eq!(ctx.get_attr(b, "id").unwrap(), Dynamic::Int(2));

    let registry = ctx.registry().unwrap();
    assert!(registry.class_by_name("TokenA", Some(LoadUnit::new("ext_a"))).is_some());
    assert!(registry.class_by_name("TokenA", Some(LoadUnit::new("ext_b"))).is_none());
    assert!(registry.class_by_name("TokenA", None).is_none());

    // local classes are not reachable by global name
    assert!(ctx.construct("TokenA", no_args()).is_err());
}

#[test]
fn exposed_type_names() {
    assert_eq!(Square::type_name(), "Square");
    assert_eq!(Instance::<Shape>::type_name(), "Shape");
}
