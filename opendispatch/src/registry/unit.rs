use super::{Class, Registry, UnitId};
use crate::dispatch::{Method, OverriderFn};
use crate::rtti::{AsAny, ClassRef};

/// Registration handle of one unit.
///
/// Everything added through a unit is removed by [`Registry::unload`].
pub struct Unit<'r> {
    registry: &'r mut Registry,
    id: UnitId,
}

impl<'r> Unit<'r> {
    pub(crate) fn new(registry: &'r mut Registry, id: UnitId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn class(&mut self, class: Class) -> &mut Self {
        self.registry.add_class(self.id, class);
        self
    }

    /// Declare a method dispatching on `N` objects of type `V`, each
    /// declared as the matching class in `params`.
    ///
    /// Declaring the same method again, from this unit or another, returns
    /// the same handle.
    pub fn method<V, P, R, const N: usize>(&mut self, name: &str, params: [ClassRef; N]) -> Method<V, P, R, N>
    where
        V: ?Sized + AsAny + 'static,
        P: 'static,
        R: 'static,
    {
        let id = self.registry.add_method::<V, P, R, N>(self.id, name, params);
        Method::new(id)
    }

    /// Add an overrider specializing `method` on the classes in `params`.
    pub fn overrider<V, P, R, const N: usize>(
        &mut self,
        method: Method<V, P, R, N>,
        params: [ClassRef; N],
        f: OverriderFn<V, P, R, N>,
    ) -> &mut Self
    where
        V: ?Sized + AsAny + 'static,
        P: 'static,
        R: 'static,
    {
        self.registry.add_overrider(self.id, method.id(), None, params, f);
        self
    }

    /// Like [`Unit::overrider`], with a diagnostic name.
    pub fn named_overrider<V, P, R, const N: usize>(
        &mut self,
        method: Method<V, P, R, N>,
        name: &str,
        params: [ClassRef; N],
        f: OverriderFn<V, P, R, N>,
    ) -> &mut Self
    where
        V: ?Sized + AsAny + 'static,
        P: 'static,
        R: 'static,
    {
        self.registry.add_overrider(self.id, method.id(), Some(name), params, f);
        self
    }
}
