//! Resolution compiler.
//!
//! Turns the class graph and the method set into dispatch tables:
//!
//! 1. **Resolve**: map every declared class of methods and overriders to a
//!    graph node
//! 2. **Allocate slots**: give each virtual parameter a v-table slot shared
//!    by its declared class and all descendants ([`slots`])
//! 3. **Build tables**: group classes by applicable overriders and resolve
//!    every group tuple to a next chain ([`tables`])
//! 4. **Lay out v-tables**: one entry per slot, naming the method, the
//!    dimension and the class's group
//!
//! Every initialization recomputes everything from scratch.

pub mod report;
pub mod slots;
pub mod specificity;
mod tables;


use crate::error::{DispatchError, DispatchResult};
use crate::graph::{ClassDecl, ClassGraph, ClassIdx};
use crate::rtti::TypeId;

pub use report::{Ambiguity, InitReport, UnusedOverrider};
pub use specificity::{Selection, Specificity};

use tables::{ResolvedMethod, TableBuilder};

/// A method registration with identifiers already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    /// Declared class of each virtual parameter.
    pub params: Vec<TypeId>,
    pub overriders: Vec<OverriderDecl>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, params: Vec<TypeId>) -> Self {
        Self {
            name: name.into(),
            params,
            overriders: Vec::new(),
        }
    }

    pub fn with_overrider(mut self, name: impl Into<String>, params: Vec<TypeId>) -> Self {
        self.overriders.push(OverriderDecl {
            name: name.into(),
            params,
        });
        self
    }
}

/// An overrider registration: one specializing class per virtual parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverriderDecl {
    pub name: String,
    pub params: Vec<TypeId>,
}

/// Knobs of [`compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Log every resolved cell.
    pub trace: bool,
    /// Fail on ambiguous cells reachable by concrete classes. When off,
    /// they are recorded in the report and signaled only if called.
    pub strict: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            trace: false,
            strict: true,
        }
    }
}

/// What a dispatch cell resolves to, link by link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Index of an overrider in its method's registration order.
    Overrider(u32),
    /// No applicable overrider.
    NotImplemented,
    /// Several incomparable overriders.
    Ambiguous,
}

/// A v-table slot: which method and dimension it serves, and the class's
/// group along that dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtblEntry {
    pub method: u32,
    pub dim: u32,
    pub group: u32,
}

/// Per-class table of slots, starting at the class's first used slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vtable {
    first_slot: usize,
    entries: Vec<Option<VtblEntry>>,
}

impl Vtable {
    fn from_entries(mut used: Vec<(usize, VtblEntry)>) -> Self {
        let Some(first_slot) = used.iter().map(|&(slot, _)| slot).min() else {
            return Vtable::default();
        };
        used.sort_by_key(|&(slot, _)| slot);
        let last = used.last().map_or(first_slot, |&(slot, _)| slot);
        let mut entries = vec![None; last - first_slot + 1];
        for (slot, entry) in used {
            entries[slot - first_slot] = Some(entry);
        }
        Vtable { first_slot, entries }
    }

    #[inline]
    pub fn entry(&self, slot: usize) -> Option<VtblEntry> {
        slot.checked_sub(self.first_slot)
            .and_then(|i| self.entries.get(i).copied().flatten())
    }

    pub fn first_slot(&self) -> usize {
        self.first_slot
    }

    /// Number of slots, holes included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classes that dispatch alike along one dimension.
#[derive(Debug, Clone)]
pub struct Group {
    /// Overriders applicable to every class of the group at this dimension.
    pub mask: crate::bitset::BitSet,
    pub classes: Vec<ClassIdx>,
    /// First class of the group that can have instances.
    pub concrete: Option<ClassIdx>,
}

/// One virtual parameter of a compiled method.
#[derive(Debug, Clone)]
pub struct Dimension {
    /// Declared class.
    pub class: ClassIdx,
    pub slot: usize,
    pub stride: usize,
    pub groups: Vec<Group>,
}

/// Dispatch table of one method.
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    pub name: String,
    /// Overrider names, in registration order.
    pub overriders: Vec<String>,
    pub dims: Vec<Dimension>,
    /// Chain index of each cell.
    pub cells: Vec<u32>,
    /// Distinct next chains.
    pub chains: Vec<Box<[Target]>>,
    /// Whether each overrider is reachable from a concrete cell.
    pub used: Vec<bool>,
}

impl CompiledMethod {
    pub fn arity(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn chain_at(&self, cell: usize) -> Option<&[Target]> {
        let chain = *self.cells.get(cell)?;
        self.chains.get(chain as usize).map(|c| &**c)
    }
}

/// Everything initialization produces.
#[derive(Debug, Clone)]
pub struct CompiledTables {
    graph: ClassGraph,
    vtables: Vec<Vtable>,
    methods: Vec<CompiledMethod>,
    report: InitReport,
}

impl CompiledTables {
    pub fn graph(&self) -> &ClassGraph {
        &self.graph
    }

    /// V-tables, indexed like the graph's classes.
    pub fn vtables(&self) -> &[Vtable] {
        &self.vtables
    }

    pub fn methods(&self) -> &[CompiledMethod] {
        &self.methods
    }

    pub fn report(&self) -> &InitReport {
        &self.report
    }

    /// Index of the first method named `name`.
    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }

    /// Every identifier with the index of its class's v-table.
    pub fn vptr_entries(&self) -> Vec<(TypeId, usize)> {
        self.graph.type_ids().collect()
    }

    /// Next chain of `method` for arguments whose v-tables are `classes`.
    ///
    /// `None` if a class does not take part in the method at its position.
    #[inline]
    pub fn dispatch_cell<I>(&self, method: usize, classes: I) -> Option<&[Target]>
    where
        I: IntoIterator<Item = ClassIdx>,
    {
        let compiled = self.methods.get(method)?;
        let mut cell = 0;
        let mut seen = 0;
        for (d, class) in classes.into_iter().enumerate() {
            let dim = compiled.dims.get(d)?;
            let entry = self.vtables.get(class)?.entry(dim.slot)?;
            if entry.method as usize != method || entry.dim as usize != d {
                return None;
            }
            cell += entry.group as usize * dim.stride;
            seen += 1;
        }
        if seen != compiled.dims.len() {
            return None;
        }
        compiled.chain_at(cell)
    }

    /// Next chain of `method` for arguments of the given dynamic types.
    pub fn resolve(&self, method: usize, types: &[TypeId]) -> DispatchResult<&[Target]> {
        let mut classes = Vec::with_capacity(types.len());
        for &type_id in types {
            classes.push(
                self.graph
                    .class_of(type_id)
                    .ok_or(DispatchError::MissingClass { type_id })?,
            );
        }
        self.dispatch_cell(method, classes)
            .ok_or_else(|| DispatchError::NoOverrider {
                method: self
                    .methods
                    .get(method)
                    .map(|m| m.name.clone())
                    .unwrap_or_default(),
                types: types.to_vec(),
            })
    }
}

/// Build the dispatch tables of `methods` over the classes in `classes`.
pub fn compile(
    classes: &[ClassDecl],
    methods: &[MethodDecl],
    options: &CompileOptions,
) -> DispatchResult<CompiledTables> {
    let graph = ClassGraph::build(classes)?;
    let resolved = resolve_methods(&graph, methods)?;

    let uses: Vec<Vec<ClassIdx>> = resolved.iter().map(|m| m.params.clone()).collect();
    let layout = slots::allocate(&graph, &uses);

    let mut report = InitReport {
        classes: graph.len(),
        methods: resolved.len(),
        slots: layout.extent.iter().copied().max().unwrap_or(0),
        ..InitReport::default()
    };
    let mut entries: Vec<Vec<(usize, VtblEntry)>> = vec![Vec::new(); graph.len()];

    let mut compiled = Vec::with_capacity(resolved.len());
    {
        let mut builder = TableBuilder {
            graph: &graph,
            options,
            report: &mut report,
            entries: &mut entries,
        };
        for (index, method) in resolved.iter().enumerate() {
            compiled.push(builder.build(index, method, &layout.slots[index])?);
        }
    }

    for method in &compiled {
        for (o, used) in method.used.iter().enumerate() {
            if !used {
                tracing::warn!(
                    method = %method.name,
                    overrider = %method.overriders[o],
                    "overrider is not reachable from any concrete class"
                );
                report.unused.push(UnusedOverrider {
                    method: method.name.clone(),
                    overrider: method.overriders[o].clone(),
                });
            }
        }
    }

    let vtables = entries.into_iter().map(Vtable::from_entries).collect();

    tracing::debug!(%report, "compiled dispatch tables");
    Ok(CompiledTables {
        graph,
        vtables,
        methods: compiled,
        report,
    })
}

/// Map declared classes to graph nodes and check overrider ancestry.
fn resolve_methods<'m>(graph: &ClassGraph, methods: &'m [MethodDecl]) -> DispatchResult<Vec<ResolvedMethod<'m>>> {
    let class_of = |type_id: TypeId| graph.class_of(type_id).ok_or(DispatchError::MissingClass { type_id });

    let mut resolved = Vec::with_capacity(methods.len());
    for method in methods {
        let params = method
            .params
            .iter()
            .map(|&id| class_of(id))
            .collect::<DispatchResult<Vec<_>>>()?;

        let mut overriders = Vec::with_capacity(method.overriders.len());
        let mut overrider_names = Vec::with_capacity(method.overriders.len());
        for overrider in &method.overriders {
            let mut classes = Vec::with_capacity(overrider.params.len());
            for (d, &id) in overrider.params.iter().enumerate() {
                let class = class_of(id)?;
                if let Some(&declared) = params.get(d) {
                    if !graph.is_base(declared, class) {
                        return Err(DispatchError::MissingBase {
                            base: method.params[d],
                            derived: id,
                        });
                    }
                }
                classes.push(class);
            }
            overriders.push(classes);
            overrider_names.push(overrider.name.clone());
        }

        resolved.push(ResolvedMethod {
            name: &method.name,
            params,
            overriders,
            overrider_names,
        });
    }
    Ok(resolved)
}
