//! Dispatch cost benchmarks using criterion.
//!
//! Run with: cargo bench --bench dispatch_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opendispatch::vptr::hash::{FastPerfectHash, MinimalPerfectHash, TypeHash};
use opendispatch::{
    AsAny, Class, ClassRef, HashStrategy, LookupStrategy, Method, Next, Registry, RegistryConfig,
    TypeId,
};

trait Shape: AsAny {}

struct Circle;
struct Square;
struct Triangle;

impl Shape for Circle {}
impl Shape for Square {}
impl Shape for Triangle {}

type Area = Method<dyn Shape, f64, f64, 1>;
type Intersect = Method<dyn Shape, (), bool, 2>;

fn area_circle(_: &Next<'_, dyn Shape, f64, f64, 1>, _: [&dyn Shape; 1], r: f64) -> f64 {
    std::f64::consts::PI * r * r
}

fn area_square(_: &Next<'_, dyn Shape, f64, f64, 1>, _: [&dyn Shape; 1], s: f64) -> f64 {
    s * s
}

fn area_any(_: &Next<'_, dyn Shape, f64, f64, 1>, _: [&dyn Shape; 1], _: f64) -> f64 {
    0.0
}

fn intersect_any(_: &Next<'_, dyn Shape, (), bool, 2>, _: [&dyn Shape; 2], _: ()) -> bool {
    false
}

fn intersect_circles(_: &Next<'_, dyn Shape, (), bool, 2>, _: [&dyn Shape; 2], _: ()) -> bool {
    true
}

fn shapes(config: RegistryConfig) -> (Registry, Area, Intersect) {
    let mut registry = Registry::with_config(config);
    let mut unit = registry.unit("shapes");
    let shape = ClassRef::of::<dyn Shape>();
    unit.class(Class::of::<dyn Shape>().make_abstract())
        .class(Class::of::<Circle>().base::<dyn Shape>())
        .class(Class::of::<Square>().base::<dyn Shape>())
        .class(Class::of::<Triangle>().base::<dyn Shape>());

    let area = unit.method::<dyn Shape, f64, f64, 1>("area", [shape]);
    unit.overrider(area, [shape], area_any)
        .overrider(area, [ClassRef::of::<Circle>()], area_circle)
        .overrider(area, [ClassRef::of::<Square>()], area_square);

    let intersect = unit.method::<dyn Shape, (), bool, 2>("intersect", [shape, shape]);
    unit.overrider(intersect, [shape, shape], intersect_any)
        .overrider(
            intersect,
            [ClassRef::of::<Circle>(), ClassRef::of::<Circle>()],
            intersect_circles,
        );

    registry.initialize();
    (registry, area, intersect)
}

fn strategies() -> Vec<(&'static str, RegistryConfig)> {
    vec![
        ("map", RegistryConfig::default().with_lookup(LookupStrategy::Map)),
        ("fast_perfect", RegistryConfig::default().with_hash(HashStrategy::FastPerfect)),
        ("minimal_perfect", RegistryConfig::default().with_hash(HashStrategy::MinimalPerfect)),
        (
            "fast_perfect_unchecked",
            RegistryConfig::default()
                .with_hash(HashStrategy::FastPerfect)
                .with_runtime_checks(false),
        ),
    ]
}

fn bench_unary_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("unary_dispatch");
    let circle: Box<dyn Shape> = Box::new(Circle);

    for (name, config) in strategies() {
        let (registry, area, _) = shapes(config);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(area.call(&registry, [black_box(&*circle)], 2.0)));
        });
    }

    group.finish();
}

fn bench_binary_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_dispatch");
    let circle: Box<dyn Shape> = Box::new(Circle);
    let square: Box<dyn Shape> = Box::new(Square);

    for (name, config) in strategies() {
        let (registry, _, intersect) = shapes(config);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(intersect.call(&registry, [black_box(&*circle), black_box(&*square)], ())));
        });
    }

    group.finish();
}

fn bench_initialize(c: &mut Criterion) {
    c.bench_function("initialize/shapes", |b| {
        b.iter(|| black_box(shapes(RegistryConfig::default()).0.report().cloned()));
    });
}

fn bench_hash_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_search");

    for n in [16usize, 256, 4096] {
        let ids: Vec<TypeId> = (0..n).map(|i| TypeId::from_name(&format!("bench::Class{i}"))).collect();

        group.bench_with_input(BenchmarkId::new("fast_perfect", n), &ids, |b, ids| {
            b.iter(|| {
                let mut hash = FastPerfectHash::default();
                black_box(hash.initialize(ids).ok())
            });
        });

        group.bench_with_input(BenchmarkId::new("minimal_perfect", n), &ids, |b, ids| {
            b.iter(|| {
                let mut hash = MinimalPerfectHash::default();
                black_box(hash.initialize(ids).ok())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_unary_dispatch,
    bench_binary_dispatch,
    bench_initialize,
    bench_hash_search,
);
criterion_main!(benches);
