//! Call-site dispatch.
//!
//! A call maps each object's dynamic type to its class's v-table, reads the
//! method's slot in each v-table to get the class's group along that
//! dimension, and combines the groups into a dispatch cell. The cell's chain
//! names the overrider to run and the ones [`Next`] reaches from it.

use std::fmt;
use std::marker::PhantomData;

use crate::compiler::{CompiledMethod, Target};
use crate::error::{DispatchError, DispatchResult};
use crate::registry::{MethodId, Registry};
use crate::rtti::{AsAny, TypeId};

/// Entry point of an overrider of a method dispatching on `N` objects of
/// type `V`, with plain arguments `P`, returning `R`.
pub type OverriderFn<V, P, R, const N: usize> = for<'a> fn(&Next<'a, V, P, R, N>, [&'a V; N], P) -> R;

/// Typed handle of a declared method.
pub struct Method<V: ?Sized, P, R, const N: usize> {
    id: MethodId,
    _marker: PhantomData<fn(&V, P) -> R>,
}

impl<V: ?Sized, P, R, const N: usize> Clone for Method<V, P, R, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: ?Sized, P, R, const N: usize> Copy for Method<V, P, R, N> {}

impl<V: ?Sized, P, R, const N: usize> fmt::Debug for Method<V, P, R, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("id", &self.id).field("arity", &N).finish()
    }
}

/// A resolved call: the chain of a dispatch cell.
struct Resolved<'r> {
    chain: &'r [Target],
    method: &'r CompiledMethod,
}

impl<V, P, R, const N: usize> Method<V, P, R, N>
where
    V: ?Sized + AsAny + 'static,
    P: 'static,
    R: 'static,
{
    pub(crate) fn new(id: MethodId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Call the most specific overrider for the dynamic types of `args`.
    ///
    /// Faults go to the registry's error handler, then the process aborts.
    pub fn call<'a>(&self, registry: &'a Registry, args: [&'a V; N], plain: P) -> R {
        self.try_call(registry, args, plain)
            .unwrap_or_else(|error| registry.fail(error))
    }

    pub fn try_call<'a>(&self, registry: &'a Registry, args: [&'a V; N], plain: P) -> DispatchResult<R> {
        let types = dynamic_types(registry, &args)?;
        let resolved = self.resolve(registry, &types)?;
        let fns = registry
            .overrider_fns::<V, P, R, N>(self.id)
            .ok_or(DispatchError::NotInitialized)?;
        let next = Next {
            registry,
            chain: resolved.chain,
            fns,
            args,
            types,
            method: &resolved.method.name,
        };
        next.invoke(plain)
    }

    /// Names of the overriders a call with objects of the given dynamic
    /// types runs, most specific first.
    pub fn overriders_for(&self, registry: &Registry, types: [TypeId; N]) -> DispatchResult<Vec<String>> {
        let resolved = self.resolve(registry, &types)?;
        let names = &resolved.method.overriders;
        Ok(resolved
            .chain
            .iter()
            .filter_map(|target| match target {
                Target::Overrider(o) => names.get(*o as usize).cloned(),
                _ => None,
            })
            .collect())
    }

    fn resolve<'r>(&self, registry: &'r Registry, types: &[TypeId; N]) -> DispatchResult<Resolved<'r>> {
        let state = registry.state().ok_or(DispatchError::NotInitialized)?;
        let index = state
            .method_index
            .get(self.id.index())
            .copied()
            .flatten()
            .ok_or(DispatchError::NotInitialized)?;
        let compiled = &state.tables.methods()[index];
        let no_overrider = || DispatchError::NoOverrider {
            method: compiled.name.clone(),
            types: types.to_vec(),
        };

        let mut cell = 0;
        for (d, (&type_id, dim)) in types.iter().zip(&compiled.dims).enumerate() {
            let vtable = registry
                .lookup()
                .dynamic_vptr(type_id)
                .ok_or(DispatchError::MissingClass { type_id })?;
            let entry = state
                .tables
                .vtables()
                .get(vtable)
                .and_then(|vtable| vtable.entry(dim.slot))
                .filter(|entry| entry.method as usize == index && entry.dim as usize == d)
                .ok_or_else(no_overrider)?;
            cell += entry.group as usize * dim.stride;
        }

        let chain = compiled.chain_at(cell).ok_or_else(no_overrider)?;
        Ok(Resolved {
            chain,
            method: compiled,
        })
    }
}

fn dynamic_types<V: ?Sized + AsAny, const N: usize>(registry: &Registry, args: &[&V; N]) -> DispatchResult<[TypeId; N]> {
    let mut types = [TypeId::default(); N];
    for (slot, arg) in types.iter_mut().zip(args) {
        let object = AsAny::as_any(*arg);
        *slot = registry
            .rtti()
            .dynamic_type(object)
            .ok_or_else(|| DispatchError::MissingClass {
                type_id: TypeId::from_std(std::any::Any::type_id(object)),
            })?;
    }
    Ok(types)
}

/// Cursor over the overriders following the running one.
///
/// Passed to every overrider; [`Next::call`] runs the next most specific
/// overrider on the same objects.
pub struct Next<'a, V: ?Sized, P, R, const N: usize> {
    registry: &'a Registry,
    /// Starts with the running overrider.
    chain: &'a [Target],
    fns: &'a [OverriderFn<V, P, R, N>],
    args: [&'a V; N],
    types: [TypeId; N],
    method: &'a str,
}

impl<'a, V, P, R, const N: usize> Next<'a, V, P, R, N>
where
    V: ?Sized + AsAny + 'static,
    P: 'static,
    R: 'static,
{
    /// Whether a less specific overrider exists.
    pub fn has_next(&self) -> bool {
        matches!(self.chain.get(1), Some(Target::Overrider(_)))
    }

    /// Run the next overrider. Calling past the end is a fault.
    pub fn call(&self, plain: P) -> R {
        self.try_call(plain)
            .unwrap_or_else(|error| self.registry.fail(error))
    }

    pub fn try_call(&self, plain: P) -> DispatchResult<R> {
        let next = Next {
            registry: self.registry,
            chain: self.chain.get(1..).unwrap_or_default(),
            fns: self.fns,
            args: self.args,
            types: self.types,
            method: self.method,
        };
        next.invoke(plain)
    }

    /// The dispatched objects.
    pub fn args(&self) -> [&'a V; N] {
        self.args
    }

    /// Name of the dispatched method.
    pub fn method(&self) -> &str {
        self.method
    }

    fn invoke(&self, plain: P) -> DispatchResult<R> {
        match self.chain.first() {
            Some(Target::Overrider(o)) => {
                let f = self.fns.get(*o as usize).ok_or_else(|| self.no_overrider())?;
                Ok(f(self, self.args, plain))
            }
            Some(Target::Ambiguous) => Err(DispatchError::AmbiguousCall {
                method: self.method.to_string(),
                types: self.types.to_vec(),
            }),
            Some(Target::NotImplemented) | None => Err(self.no_overrider()),
        }
    }

    fn no_overrider(&self) -> DispatchError {
        DispatchError::NoOverrider {
            method: self.method.to_string(),
            types: self.types.to_vec(),
        }
    }
}

/// Downcast a dispatched object to its concrete type.
///
/// ```
/// use opendispatch::{downcast, AsAny};
///
/// trait Shape: AsAny {}
/// struct Circle(f64);
/// impl Shape for Circle {}
///
/// let shape: Box<dyn Shape> = Box::new(Circle(2.0));
/// assert_eq!(downcast::<Circle, _>(&*shape).map(|c| c.0), Some(2.0));
/// ```
pub fn downcast<T: 'static, V: ?Sized + AsAny>(object: &V) -> Option<&T> {
    AsAny::as_any(object).downcast_ref::<T>()
}
