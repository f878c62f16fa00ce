//! Registration feed, initialization and finalization.
//!
//! A [`Registry`] owns every class, method and overrider record contributed
//! by its units, the type identity provider, the v-table lookup and the
//! error policy. Records are only collected when [`Registry::initialize`]
//! runs, so registration order between units does not matter.
//!
//! Any change to the records (a new registration, an unloaded unit) drops
//! the compiled tables. Dispatching before the next `initialize` reports
//! [`DispatchError::NotInitialized`].

mod class;
pub mod module;
mod unit;

use std::any::Any;
use std::fmt;

use crate::compiler::{compile, CompileOptions, CompiledTables, InitReport, MethodDecl, OverriderDecl};
use crate::config::RegistryConfig;
use crate::dispatch::OverriderFn;
use crate::error::{fail, DefaultErrorHandler, DispatchError, DispatchResult, ErrorHandler};
use crate::graph::ClassDecl;
use crate::rtti::{ClassKey, ClassRef, Rtti, StdRtti, TypeId};
use crate::vptr::{lookup_for, VptrLookup};

pub use class::Class;
pub use unit::Unit;

use module::LoadedModule;

/// A group of registrations that is loaded and unloaded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Registry-local handle of a method declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(usize);

impl MethodId {
    pub fn index(self) -> usize {
        self.0
    }
}

struct ClassRecord {
    unit: UnitId,
    class: Class,
}

struct OverriderRecord {
    name: String,
    params: Vec<ClassKey>,
    addr: usize,
    units: Vec<UnitId>,
}

// Method and overrider records hold no data borrowed from the binary of the
// unit that created them, except `fns`, which is rebuilt when that unit goes.
struct MethodRecord {
    name: String,
    params: Vec<ClassKey>,
    /// Object, plain argument and return types.
    signature: [std::any::TypeId; 3],
    declarers: Vec<Declarer>,
    overriders: Vec<OverriderRecord>,
    /// Overrider entry points, parallel to `overriders`.
    fns: Box<dyn ErasedFns>,
    /// Unit whose code allocated `fns`.
    fns_unit: UnitId,
}

/// A unit declaring a method, with the means to recreate the method's
/// entry points from that unit's own code.
struct Declarer {
    unit: UnitId,
    rebuild: RebuildFns,
}

type RebuildFns = fn(&mut dyn ErasedFns) -> Option<Box<dyn ErasedFns>>;

/// Type-erased overrider entry points of one method.
trait ErasedFns: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn retain(&mut self, keep: &[bool]);
}

/// Move the entry points out of `fns` into a box whose vtable belongs to
/// the binary this instance was compiled into.
fn rebuild_fns<V, P, R, const N: usize>(fns: &mut dyn ErasedFns) -> Option<Box<dyn ErasedFns>>
where
    V: ?Sized + 'static,
    P: 'static,
    R: 'static,
{
    let fns = fns.as_any_mut().downcast_mut::<TypedFns<V, P, R, N>>()?;
    Some(Box::new(TypedFns::<V, P, R, N>(std::mem::take(&mut fns.0))))
}

pub(crate) struct TypedFns<V: ?Sized + 'static, P: 'static, R: 'static, const N: usize>(
    pub(crate) Vec<OverriderFn<V, P, R, N>>,
);

impl<V: ?Sized + 'static, P: 'static, R: 'static, const N: usize> ErasedFns for TypedFns<V, P, R, N> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut index = 0;
        self.0.retain(|_| {
            let kept = keep.get(index).copied().unwrap_or(true);
            index += 1;
            kept
        });
    }
}

/// Published tables.
pub(crate) struct State {
    pub(crate) tables: CompiledTables,
    /// Compiled method index of each [`MethodId`].
    pub(crate) method_index: Vec<Option<usize>>,
}

/// The open method registry.
///
/// Registration and initialization take `&mut self`; dispatch takes `&self`
/// and may run from any number of threads once initialized.
pub struct Registry {
    config: RegistryConfig,
    rtti: Box<dyn Rtti>,
    lookup: Box<dyn VptrLookup>,
    handler: Box<dyn ErrorHandler>,
    units: Vec<String>,
    classes: Vec<ClassRecord>,
    methods: Vec<Option<MethodRecord>>,
    state: Option<State>,
    // Dropped last: records above may point into these libraries.
    modules: Vec<LoadedModule>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("rtti", &self.rtti)
            .field("units", &self.units)
            .field("classes", &self.classes.len())
            .field("methods", &self.methods.iter().flatten().count())
            .field("initialized", &self.is_initialized())
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// A registry using native type identity and the lookup and error
    /// output `config` selects.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rtti: Box::new(StdRtti),
            lookup: lookup_for(&config),
            handler: Box::new(DefaultErrorHandler::new(config.output)),
            config,
            units: Vec::new(),
            classes: Vec::new(),
            methods: Vec::new(),
            state: None,
            modules: Vec::new(),
        }
    }

    pub fn with_rtti(mut self, rtti: impl Rtti + 'static) -> Self {
        self.invalidate();
        self.rtti = Box::new(rtti);
        self
    }

    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Replace the lookup the configuration selected.
    pub fn with_lookup(mut self, lookup: Box<dyn VptrLookup>) -> Self {
        self.invalidate();
        self.lookup = lookup;
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// The unit named `name`, created on first use.
    pub fn unit(&mut self, name: &str) -> Unit<'_> {
        let id = self.unit_id(name);
        Unit::new(self, id)
    }

    pub(crate) fn unit_id(&mut self, name: &str) -> UnitId {
        match self.units.iter().position(|unit| unit == name) {
            Some(index) => UnitId(index),
            None => {
                self.units.push(name.to_string());
                UnitId(self.units.len() - 1)
            }
        }
    }

    pub fn unit_name(&self, unit: UnitId) -> Option<&str> {
        self.units.get(unit.0).map(String::as_str)
    }

    /// Remove every record contributed by `unit`.
    ///
    /// A method goes away with the last unit that declares it, together
    /// with its remaining overriders. A method that survives no longer
    /// refers to code or data of `unit`, so a module's library can be closed
    /// afterwards. The registry is left uninitialized.
    pub fn unload(&mut self, unit: UnitId) {
        self.invalidate();
        let before = self.classes.len();
        self.classes.retain(|record| record.unit != unit);
        let classes = before - self.classes.len();
        let mut overriders = 0;

        for slot in &mut self.methods {
            let Some(method) = slot else {
                continue;
            };
            method.declarers.retain(|declarer| declarer.unit != unit);
            if method.declarers.is_empty() {
                overriders += method.overriders.len();
                tracing::debug!(method = %method.name, "method unloaded");
                *slot = None;
                continue;
            }
            let keep: Vec<bool> = method
                .overriders
                .iter_mut()
                .map(|overrider| {
                    overrider.units.retain(|&u| u != unit);
                    !overrider.units.is_empty()
                })
                .collect();
            overriders += keep.iter().filter(|&&kept| !kept).count();
            method.fns.retain(&keep);
            let mut index = 0;
            method.overriders.retain(|_| {
                let kept = keep[index];
                index += 1;
                kept
            });

            if method.fns_unit == unit {
                let declarer = &method.declarers[0];
                match (declarer.rebuild)(&mut *method.fns) {
                    Some(fns) => {
                        method.fns = fns;
                        method.fns_unit = declarer.unit;
                    }
                    None => {
                        tracing::warn!(
                            method = %method.name,
                            "method entry points could not be rebuilt, method dropped"
                        );
                        overriders += method.overriders.len();
                        *slot = None;
                    }
                }
            }
        }

        tracing::debug!(
            unit = self.unit_name(unit).unwrap_or_default(),
            classes,
            overriders,
            "unit unloaded"
        );
    }

    /// Build the dispatch tables, reporting faults through the error
    /// handler.
    pub fn initialize(&mut self) -> &InitReport {
        let result = self.try_initialize().map(|_| ());
        if let Err(error) = result {
            self.fail(error);
        }
        match &self.state {
            Some(state) => state.tables.report(),
            None => self.fail(DispatchError::NotInitialized),
        }
    }

    /// Build the dispatch tables.
    ///
    /// The previous tables are discarded first; on failure the registry is
    /// left uninitialized.
    pub fn try_initialize(&mut self) -> DispatchResult<&InitReport> {
        self.invalidate();

        let classes = self.collect_classes()?;
        let (methods, ids) = self.collect_methods()?;
        let options = CompileOptions {
            trace: self.config.trace,
            ..CompileOptions::default()
        };
        let tables = compile(&classes, &methods, &options)?;
        self.lookup.initialize(&tables.vptr_entries())?;

        let mut method_index = vec![None; self.methods.len()];
        for (compiled, id) in ids.into_iter().enumerate() {
            method_index[id.0] = Some(compiled);
        }
        tracing::info!(report = %tables.report(), "open methods initialized");

        let state = self.state.insert(State { tables, method_index });
        Ok(state.tables.report())
    }

    /// Release the dispatch tables and the lookup.
    pub fn finalize(&mut self) {
        self.invalidate();
    }

    pub fn report(&self) -> Option<&InitReport> {
        self.state.as_ref().map(|state| state.tables.report())
    }

    pub fn tables(&self) -> Option<&CompiledTables> {
        self.state.as_ref().map(|state| &state.tables)
    }

    /// Hand `error` to the error handler, then abort.
    pub fn fail(&self, error: DispatchError) -> ! {
        fail(&*self.handler, error)
    }

    pub fn error_handler(&self) -> &dyn ErrorHandler {
        &*self.handler
    }

    pub(crate) fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    pub(crate) fn rtti(&self) -> &dyn Rtti {
        &*self.rtti
    }

    pub(crate) fn lookup(&self) -> &dyn VptrLookup {
        &*self.lookup
    }

    pub(crate) fn overrider_fns<V, P, R, const N: usize>(&self, id: MethodId) -> Option<&[OverriderFn<V, P, R, N>]>
    where
        V: ?Sized + 'static,
        P: 'static,
        R: 'static,
    {
        let method = self.methods.get(id.0)?.as_ref()?;
        let fns = method.fns.as_any().downcast_ref::<TypedFns<V, P, R, N>>()?;
        Some(fns.0.as_slice())
    }

    fn invalidate(&mut self) {
        if self.state.take().is_some() {
            tracing::debug!("dispatch tables discarded");
        }
        self.lookup.finalize();
    }

    fn resolve(&self, class: ClassKey) -> DispatchResult<TypeId> {
        class.resolve(&*self.rtti).ok_or(DispatchError::MissingClass {
            type_id: class.fallback_id(),
        })
    }

    fn collect_classes(&self) -> DispatchResult<Vec<ClassDecl>> {
        let mut decls = Vec::with_capacity(self.classes.len());
        for ClassRecord { class, .. } in &self.classes {
            let id = self.resolve(class.class_ref().key())?;
            let mut decl = ClassDecl::new(id, class.name());
            for alias in class.aliases() {
                decl = decl.with_alias(self.resolve(alias.key())?);
            }
            for base in class.bases() {
                let base_id = base.resolve(&*self.rtti).ok_or(DispatchError::MissingBase {
                    base: base.fallback_id(),
                    derived: id,
                })?;
                decl = decl.with_base(base_id);
            }
            if class.is_abstract() {
                decl = decl.make_abstract();
            }
            decls.push(decl);
        }
        Ok(decls)
    }

    fn collect_methods(&self) -> DispatchResult<(Vec<MethodDecl>, Vec<MethodId>)> {
        let mut decls = Vec::new();
        let mut ids = Vec::new();
        for (index, method) in self.methods.iter().enumerate() {
            let Some(method) = method else {
                continue;
            };
            let params = method
                .params
                .iter()
                .map(|&p| self.resolve(p))
                .collect::<DispatchResult<Vec<_>>>()?;
            let mut decl = MethodDecl::new(method.name.clone(), params);
            for overrider in &method.overriders {
                decl.overriders.push(OverriderDecl {
                    name: overrider.name.clone(),
                    params: overrider
                        .params
                        .iter()
                        .map(|&p| self.resolve(p))
                        .collect::<DispatchResult<Vec<_>>>()?,
                });
            }
            decls.push(decl);
            ids.push(MethodId(index));
        }
        Ok((decls, ids))
    }

    fn add_class(&mut self, unit: UnitId, class: Class) {
        self.invalidate();
        self.classes.push(ClassRecord { unit, class });
    }

    fn add_method<V, P, R, const N: usize>(&mut self, unit: UnitId, name: &str, params: [ClassRef; N]) -> MethodId
    where
        V: ?Sized + 'static,
        P: 'static,
        R: 'static,
    {
        self.invalidate();
        let signature = [
            std::any::TypeId::of::<V>(),
            std::any::TypeId::of::<P>(),
            std::any::TypeId::of::<R>(),
        ];
        let params: Vec<ClassKey> = params.iter().map(ClassRef::key).collect();
        let declarer = Declarer {
            unit,
            rebuild: rebuild_fns::<V, P, R, N>,
        };
        let existing = self.methods.iter().position(|method| {
            method
                .as_ref()
                .is_some_and(|m| m.name == name && m.params == params && m.signature == signature)
        });
        if let Some(index) = existing {
            if let Some(method) = &mut self.methods[index] {
                if !method.declarers.iter().any(|d| d.unit == unit) {
                    method.declarers.push(declarer);
                }
            }
            return MethodId(index);
        }

        self.methods.push(Some(MethodRecord {
            name: name.to_string(),
            params,
            signature,
            declarers: vec![declarer],
            overriders: Vec::new(),
            fns: Box::new(TypedFns::<V, P, R, N>(Vec::new())),
            fns_unit: unit,
        }));
        MethodId(self.methods.len() - 1)
    }

    fn add_overrider<V, P, R, const N: usize>(
        &mut self,
        unit: UnitId,
        method: MethodId,
        name: Option<&str>,
        params: [ClassRef; N],
        f: OverriderFn<V, P, R, N>,
    ) where
        V: ?Sized + 'static,
        P: 'static,
        R: 'static,
    {
        self.invalidate();
        let Some(record) = self.methods.get_mut(method.0).and_then(Option::as_mut) else {
            tracing::warn!(method = method.0, "overrider for an unknown method ignored");
            return;
        };
        let addr = f as usize;
        let keys: Vec<ClassKey> = params.iter().map(ClassRef::key).collect();
        if let Some(existing) = record
            .overriders
            .iter_mut()
            .find(|o| o.addr == addr && o.params == keys)
        {
            if !existing.units.contains(&unit) {
                existing.units.push(unit);
            }
            return;
        }
        let Some(fns) = record.fns.as_any_mut().downcast_mut::<TypedFns<V, P, R, N>>() else {
            tracing::warn!(method = %record.name, "overrider signature does not match its method");
            return;
        };
        fns.0.push(f);

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let classes: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                format!("{}({})", record.name, classes.join(", "))
            }
        };
        record.overriders.push(OverriderRecord {
            name,
            params: keys,
            addr,
            units: vec![unit],
        });
    }
}
