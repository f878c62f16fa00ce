//! Open multi-methods for Rust.
//!
//! An open method is a free function whose implementation is selected at
//! call time from the *runtime* types of one or more of its arguments. Any
//! unit of code can add overriders for any registered class, without the
//! classes knowing about the method.
//!
//! # Lifecycle
//!
//! 1. **Register**: units contribute classes, methods and overriders to a
//!    [`Registry`] through [`Registry::unit`].
//! 2. **Initialize**: [`Registry::initialize`] builds the class graph,
//!    resolves every method into dispatch tables and builds the
//!    type-to-vtable lookup.
//! 3. **Dispatch**: [`Method::call`] reads the tables. Any number of threads
//!    may dispatch through a shared `&Registry`.
//! 4. **Reconfigure**: loading or unloading a unit invalidates the tables;
//!    call `initialize` again before the next dispatch.
//!
//! # Example
//!
//! ```
//! use opendispatch::{AsAny, Class, ClassRef, Next, Registry};
//!
//! trait Animal: AsAny {}
//! struct Dog;
//! struct Cat;
//! impl Animal for Dog {}
//! impl Animal for Cat {}
//!
//! fn meet(_: &Next<'_, dyn Animal, (), &'static str, 2>, _: [&dyn Animal; 2], _: ()) -> &'static str {
//!     "sniff"
//! }
//!
//! fn chase(_: &Next<'_, dyn Animal, (), &'static str, 2>, _: [&dyn Animal; 2], _: ()) -> &'static str {
//!     "chase"
//! }
//!
//! let mut registry = Registry::new();
//! let mut unit = registry.unit("animals");
//! unit.class(Class::of::<dyn Animal>().make_abstract())
//!     .class(Class::of::<Dog>().base::<dyn Animal>())
//!     .class(Class::of::<Cat>().base::<dyn Animal>());
//! let encounter = unit.method::<dyn Animal, (), &'static str, 2>(
//!     "encounter",
//!     [ClassRef::of::<dyn Animal>(), ClassRef::of::<dyn Animal>()],
//! );
//! unit.overrider(encounter, [ClassRef::of::<dyn Animal>(), ClassRef::of::<dyn Animal>()], meet)
//!     .overrider(encounter, [ClassRef::of::<Dog>(), ClassRef::of::<Cat>()], chase);
//! registry.initialize();
//!
//! let (dog, cat): (Box<dyn Animal>, Box<dyn Animal>) = (Box::new(Dog), Box::new(Cat));
//! assert_eq!(encounter.call(&registry, [&*dog, &*cat], ()), "chase");
//! assert_eq!(encounter.call(&registry, [&*cat, &*dog], ()), "sniff");
//! ```

pub mod bitset;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod global;
pub mod graph;
pub mod registry;
pub mod rtti;
pub mod vptr;

pub use compiler::{compile, CompileOptions, CompiledTables, InitReport, Target};
pub use config::{HashConfig, HashStrategy, LookupStrategy, Output, RegistryConfig};
pub use dispatch::{downcast, Method, Next, OverriderFn};
pub use error::{
    DefaultErrorHandler, DispatchError, DispatchResult, ErrorHandler, FnErrorHandler,
    PanicErrorHandler,
};
pub use global::default_registry;
pub use graph::{ClassDecl, ClassGraph};
pub use registry::module::{ModuleError, RegisterFn, REGISTER_SYMBOL};
pub use registry::{Class, MethodId, Registry, Unit, UnitId};
pub use rtti::{AsAny, ClassRef, Rtti, StaticRtti, StdRtti, TypeId};
