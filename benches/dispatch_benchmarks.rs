//! Dispatch benchmarks: overload resolution, conversions and method calls.
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect per-scope timings:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- "overloads"
//! ```

#![allow(clippy::collapsible_if)]

use bindery::prelude::*;
use bindery::{CallArgs, TypeRegistry};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[cfg(feature = "profile-with-puffin")]
fn collect_scopes_recursive(
    stream: &puffin::Stream,
    scope: &puffin::Scope,
    scope_collection: &puffin::ScopeCollection,
    scope_timings: &mut HashMap<String, i64>,
) {
    use puffin::Reader;

    if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
        *scope_timings.entry(details.name().to_string()).or_insert(0) +=
            scope.record.duration_ns;
    }

    if scope.child_begin_position < scope.child_end_position {
        if let Ok(reader) = Reader::with_offset(stream, scope.child_begin_position) {
            if let Ok(children) = reader.read_top_scopes() {
                for child in children {
                    collect_scopes_recursive(stream, &child, scope_collection, scope_timings);
                }
            }
        }
    }
}

#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        println!("Profiler not initialized");
        return;
    };
    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut scope_timings: HashMap<String, i64> = HashMap::new();
    let mut frame_count = 0i64;
    for frame in view.recent_frames() {
        frame_count += 1;
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let reader = Reader::from_start(&stream_info.stream);
            if let Ok(scopes) = reader.read_top_scopes() {
                for scope in scopes {
                    collect_scopes_recursive(
                        &stream_info.stream,
                        &scope,
                        scope_collection,
                        &mut scope_timings,
                    );
                }
            }
        }
    }

    println!("\n=== Dispatch Profile ({} frames) ===", frame_count);
    let mut entries: Vec<_> = scope_timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, ns) in entries {
        let avg_ns = if frame_count > 0 { ns / frame_count } else { ns };
        println!(
            "  {:40} {:>10.2?} avg",
            name,
            std::time::Duration::from_nanos(avg_ns as u64)
        );
    }
    println!("=====================================\n");
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

#[derive(Debug, Clone, NativeType)]
#[bindery(clone)]
struct Particle {
    #[bindery(get, set)]
    x: f64,
    #[bindery(get, set)]
    v: f64,
}

#[derive(Debug, Clone, NativeType)]
struct Body {
    particle: Particle,
    mass: f64,
}

/// A module with a wide overload set, a class hierarchy and variadics.
fn physics() -> Module {
    let mut module = Module::new("physics");
    module
        .class::<Particle>()
        .constructor(|x: f64, v: f64| Particle { x, v })
        .fields()
        .method_mut("step", |p: &mut Particle, dt: f64| {
            p.x += p.v * dt;
            p.x
        })
        .virtual_method("energy", |p: &Particle| 0.5 * p.v * p.v)
        .build()
        .expect("particle");
    module
        .class::<Body>()
        .base::<Particle>(|b| &b.particle, |b| &mut b.particle)
        .constructor(|mass: f64| Body {
            particle: Particle { x: 0.0, v: 1.0 },
            mass,
        })
        .readonly("mass", |b: &Body| b.mass)
        .build()
        .expect("body");

    module
        .function("mix", |a: i64, b: i64| a + b)
        .function("mix", |a: f64, b: f64| a + b)
        .function("mix", |a: String, b: String| a + &b)
        .function("mix", |a: bool, b: bool| a && b)
        .function("mix", |a: Vec<i64>, b: i64| a.len() as i64 + b)
        .function("mix", |a: Option<f64>, b: f64| a.unwrap_or(0.0) * b)
        .function("speed", |p: Particle| p.v)
        .function_with("total", |xs: Vec<f64>| xs.iter().sum::<f64>(), |f| {
            f.arg("xs").variadic()
        })
        .expect("total");
    module
}

fn sealed() -> Context {
    let mut ctx = Context::new();
    ctx.install(physics()).expect("install");
    ctx.seal().expect("seal");
    ctx
}

/// Resolution cost against a six-way overload set.
fn overload_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let ctx = sealed();
    let dispatcher = ctx.dispatcher().expect("sealed");

    let mut group = c.benchmark_group("dispatch/overloads");
    let cases = [
        ("exact_int", vec![Dynamic::Int(1), Dynamic::Int(2)]),
        ("promoted_float", vec![Dynamic::Int(1), Dynamic::Float(2.0)]),
        ("string", vec![Dynamic::from("a"), Dynamic::from("b")]),
        (
            "container",
            vec![
                Dynamic::List(vec![Dynamic::Int(1), Dynamic::Int(2)]),
                Dynamic::Int(3),
            ],
        ),
        ("optional", vec![Dynamic::None, Dynamic::Float(2.0)]),
    ];
    for (name, args) in cases {
        group.bench_with_input(BenchmarkId::new("mix", name), &args, |b, args| {
            b.iter(|| {
                let result = dispatcher.call("mix", black_box(args.clone()));
                end_profiling_frame();
                black_box(result)
            });
        });
    }

    let failing = vec![Dynamic::Float(1.0), Dynamic::from("x")];
    group.bench_function("no_match", |b| {
        b.iter(|| black_box(dispatcher.call("mix", black_box(failing.clone())).is_err()));
    });
    group.finish();

    print_profiling_stats();
}

/// Variadic tails of increasing length.
fn variadic_benchmarks(c: &mut Criterion) {
    let ctx = sealed();
    let dispatcher = ctx.dispatcher().expect("sealed");

    let mut group = c.benchmark_group("dispatch/variadic");
    for len in [1usize, 8, 64] {
        let args: Vec<Dynamic> = (0..len).map(|i| Dynamic::Int(i as i64)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &args, |b, args| {
            b.iter(|| black_box(dispatcher.call("total", black_box(args.clone()))));
        });
    }
    group.finish();
}

/// Method calls, properties and base-class lookups on bound objects.
fn object_benchmarks(c: &mut Criterion) {
    let ctx = sealed();
    let dispatcher = ctx.dispatcher().expect("sealed");
    let particle = ctx
        .construct("Particle", vec![Dynamic::Float(0.0), Dynamic::Float(2.0)])
        .expect("particle");
    let body = ctx.construct("Body", vec![Dynamic::Float(3.0)]).expect("body");

    let mut group = c.benchmark_group("dispatch/objects");
    group.bench_function("construct", |b| {
        b.iter(|| {
            black_box(dispatcher.construct("Particle", vec![Dynamic::Float(0.0), Dynamic::Float(1.0)]))
        });
    });
    group.bench_function("method_mut", |b| {
        b.iter(|| black_box(dispatcher.call_method(&particle, "step", vec![Dynamic::Float(0.1)])));
    });
    group.bench_function("property_get", |b| {
        b.iter(|| black_box(dispatcher.get_attr(&particle, "x")));
    });
    group.bench_function("property_set", |b| {
        b.iter(|| black_box(dispatcher.set_attr(&particle, "v", Dynamic::Float(2.0))));
    });
    group.bench_function("inherited_property", |b| {
        b.iter(|| black_box(dispatcher.get_attr(&body, "v")));
    });
    group.bench_function("by_value_argument", |b| {
        let args = CallArgs::new(vec![Dynamic::Object(particle.clone())]);
        b.iter(|| black_box(dispatcher.call("speed", args.clone())));
    });
    group.bench_function("trampoline", |b| {
        let energy = dispatcher.trampoline("energy");
        b.iter(|| black_box(energy.call(&body, Vec::new())));
    });
    group.finish();
}

/// Registration and sealing cost.
fn registration_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/registration");
    group.bench_function("install_module", |b| {
        b.iter(|| {
            let mut registry = TypeRegistry::new();
            physics().apply_to(&mut registry).expect("apply");
            black_box(registry.function_count())
        });
    });
    group.bench_function("seal_context", |b| {
        b.iter(|| black_box(sealed().is_sealed()));
    });
    group.finish();
}

criterion_group!(
    benches,
    overload_benchmarks,
    variadic_benchmarks,
    object_benchmarks,
    registration_benchmarks
);
criterion_main!(benches);
