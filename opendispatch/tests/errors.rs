//! Error taxonomy, through the panicking error handler and the `try_*` entry
//! points.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use opendispatch::{
    AsAny, Class, ClassRef, DispatchError, FnErrorHandler, Method, ModuleError, Next,
    PanicErrorHandler, Registry, RegistryConfig, StaticRtti, TypeId,
};
use pretty_assertions::assert_eq;

trait Node: AsAny {}

struct Top;
struct Left;
struct Right;
struct Bottom;
struct Stray;

impl Node for Top {}
impl Node for Left {}
impl Node for Right {}
impl Node for Bottom {}
impl Node for Stray {}

type Visit = Method<dyn Node, u32, u32, 1>;
type VisitNext<'a> = Next<'a, dyn Node, u32, u32, 1>;

fn visit_left(_: &VisitNext<'_>, _: [&dyn Node; 1], depth: u32) -> u32 {
    depth + 1
}

fn visit_right(_: &VisitNext<'_>, _: [&dyn Node; 1], depth: u32) -> u32 {
    depth + 2
}

fn panicking_registry() -> Registry {
    Registry::with_config(RegistryConfig::default()).with_error_handler(PanicErrorHandler)
}

/// Run `f`, expecting the panicking handler to divert it.
fn diverted<T>(f: impl FnOnce() -> T) -> DispatchError {
    let payload = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected the error handler to panic"),
        Err(payload) => payload,
    };
    match payload.downcast::<DispatchError>() {
        Ok(error) => *error,
        Err(_) => panic!("panic payload is not a DispatchError"),
    }
}

fn diamond(registry: &mut Registry) -> Visit {
    let mut unit = registry.unit("diamond");
    unit.class(Class::of::<Top>())
        .class(Class::of::<Left>().base::<Top>())
        .class(Class::of::<Right>().base::<Top>())
        .class(Class::of::<Bottom>().base::<Left>().base::<Right>());
    let visit = unit.method::<dyn Node, u32, u32, 1>("visit", [ClassRef::of::<Top>()]);
    unit.overrider(visit, [ClassRef::of::<Left>()], visit_left)
        .overrider(visit, [ClassRef::of::<Right>()], visit_right);
    visit
}

#[test]
fn test_ambiguous_diamond_fails_initialization() {
    let mut registry = panicking_registry();
    diamond(&mut registry);
    let error = diverted(|| {
        registry.initialize();
    });
    assert_eq!(
        error,
        DispatchError::AmbiguousCall {
            method: "visit".to_string(),
            types: vec![TypeId::of::<Bottom>()],
        }
    );
    assert!(!registry.is_initialized());
}

#[test]
fn test_diamond_resolved_by_more_specific_overrider() {
    fn visit_bottom(next: &VisitNext<'_>, _: [&dyn Node; 1], depth: u32) -> u32 {
        // The next step from Bottom is ambiguous between Left and Right.
        match next.try_call(depth) {
            Err(DispatchError::AmbiguousCall { .. }) => depth + 10,
            _ => 0,
        }
    }

    let mut registry = panicking_registry();
    let visit = diamond(&mut registry);
    registry
        .unit("fix")
        .overrider(visit, [ClassRef::of::<Bottom>()], visit_bottom);
    registry.initialize();

    assert_eq!(visit.call(&registry, [&Bottom], 0), 10);
    assert_eq!(visit.call(&registry, [&Left], 0), 1);
    assert_eq!(visit.call(&registry, [&Right], 0), 2);
    assert_eq!(
        visit.try_call(&registry, [&Top], 0),
        Err(DispatchError::NoOverrider {
            method: "visit".to_string(),
            types: vec![TypeId::of::<Top>()],
        })
    );
    assert_eq!(diverted(|| visit.call(&registry, [&Top], 0)).kind(), "no_overrider");
}

#[test]
fn test_missing_class_in_overrider() {
    let mut registry = panicking_registry();
    let mut unit = registry.unit("nodes");
    unit.class(Class::of::<Top>());
    let visit = unit.method::<dyn Node, u32, u32, 1>("visit", [ClassRef::of::<Top>()]);
    unit.overrider(visit, [ClassRef::of::<Stray>()], visit_left);

    assert_eq!(
        registry.try_initialize().map(|_| ()),
        Err(DispatchError::MissingClass {
            type_id: TypeId::of::<Stray>(),
        })
    );
    assert_eq!(
        diverted(|| {
            registry.initialize();
        }),
        DispatchError::MissingClass {
            type_id: TypeId::of::<Stray>(),
        }
    );
}

#[test]
fn test_missing_base() {
    let mut registry = panicking_registry();
    registry
        .unit("nodes")
        .class(Class::of::<Left>().base::<Top>());
    assert_eq!(
        registry.try_initialize().map(|_| ()),
        Err(DispatchError::MissingBase {
            base: TypeId::of::<Top>(),
            derived: TypeId::of::<Left>(),
        })
    );
}

#[test]
fn test_unregistered_object_is_missing_class() {
    let mut registry = panicking_registry();
    let visit = diamond(&mut registry);
    registry
        .unit("fix")
        .overrider(visit, [ClassRef::of::<Bottom>()], visit_left);
    registry.initialize();

    assert_eq!(
        visit.try_call(&registry, [&Stray], 0),
        Err(DispatchError::MissingClass {
            type_id: TypeId::of::<Stray>(),
        })
    );
}

#[test]
fn test_unassigned_static_identity_is_missing_class() {
    let rtti = StaticRtti::new().assign::<Top>(1).assign::<Left>(2);
    let mut registry = panicking_registry().with_rtti(rtti);
    let mut unit = registry.unit("nodes");
    unit.class(Class::of::<Top>())
        .class(Class::of::<Left>().base::<Top>());
    let visit = unit.method::<dyn Node, u32, u32, 1>("visit", [ClassRef::of::<Top>()]);
    unit.overrider(visit, [ClassRef::of::<Left>()], visit_left);
    registry.initialize();

    assert_eq!(visit.call(&registry, [&Left], 4), 5);
    assert_eq!(
        diverted(|| visit.call(&registry, [&Right], 0)).kind(),
        "missing_class"
    );
}

#[test]
fn test_call_before_initialize() {
    let mut registry = panicking_registry();
    let visit = diamond(&mut registry);
    assert_eq!(
        diverted(|| visit.call(&registry, [&Left], 0)),
        DispatchError::NotInitialized
    );

    registry.finalize();
    assert_eq!(
        visit.try_call(&registry, [&Left], 0),
        Err(DispatchError::NotInitialized)
    );
}

#[test]
fn test_handler_sees_every_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut registry = Registry::new().with_error_handler(FnErrorHandler(move |error: &DispatchError| {
        sink.lock().unwrap().push(error.kind());
        std::panic::panic_any(error.clone());
    }));
    diamond(&mut registry);
    diverted(|| {
        registry.initialize();
    });
    assert_eq!(*seen.lock().unwrap(), vec!["ambiguous_call"]);
}

#[test]
fn test_overrider_on_diamond_bottom_clears_ambiguity() {
    let mut registry = panicking_registry();
    let visit = diamond(&mut registry);
    registry
        .unit("fix")
        .overrider(visit, [ClassRef::of::<Bottom>()], visit_right);
    let report = registry.try_initialize().unwrap();
    assert!(report.ambiguities.is_empty());
    assert_eq!(report.ambiguous, 0);
}

#[test]
fn test_load_missing_module() {
    let mut registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: nothing is loaded from a missing file.
    let error = unsafe { registry.load_module(dir.path().join("libmissing.so")) }.unwrap_err();
    assert!(matches!(error, ModuleError::Load { .. }));
    assert!(error.to_string().starts_with("failed to load module"));
}
