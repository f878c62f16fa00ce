//! Per-method dispatch tables.
//!
//! Along each dimension, the descendants of the declared class are grouped
//! by the set of overriders applicable to them: classes in the same group
//! always dispatch alike, so the table is indexed by group rather than by
//! class. A cell is the tuple of one group per dimension, stored row-major
//! with `stride[0] = 1` and `stride[d] = stride[d - 1] * groups[d - 1]`.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::report::{Ambiguity, InitReport};
use super::specificity::{Selection, Specificity};
use super::{CompileOptions, CompiledMethod, Dimension, Group, Target, VtblEntry};
use crate::bitset::BitSet;
use crate::error::{DispatchError, DispatchResult};
use crate::graph::{ClassGraph, ClassIdx};

/// A method with classes resolved to graph nodes.
pub(crate) struct ResolvedMethod<'a> {
    pub name: &'a str,
    pub params: Vec<ClassIdx>,
    pub overriders: Vec<Vec<ClassIdx>>,
    pub overrider_names: Vec<String>,
}

pub(crate) struct TableBuilder<'a> {
    pub graph: &'a ClassGraph,
    pub options: &'a CompileOptions,
    pub report: &'a mut InitReport,
    /// `(slot, entry)` pairs collected per class.
    pub entries: &'a mut [Vec<(usize, VtblEntry)>],
}

impl TableBuilder<'_> {
    pub fn build(
        &mut self,
        index: usize,
        method: &ResolvedMethod<'_>,
        slots: &[usize],
    ) -> DispatchResult<CompiledMethod> {
        let spec = Specificity::new(self.graph);
        let arity = method.params.len();

        let mut dims = Vec::with_capacity(arity);
        let mut stride = 1;
        for (d, &root) in method.params.iter().enumerate() {
            let groups = self.group_classes(method, d, root);
            for (g, group) in groups.iter().enumerate() {
                for &class in &group.classes {
                    self.entries[class].push((
                        slots[d],
                        VtblEntry {
                            method: index as u32,
                            dim: d as u32,
                            group: g as u32,
                        },
                    ));
                }
            }
            let count = groups.len();
            dims.push(Dimension {
                class: root,
                slot: slots[d],
                stride,
                groups,
            });
            stride *= count;
        }
        let total = stride;

        let mut cells = Vec::with_capacity(total);
        let mut chains: Vec<Box<[Target]>> = Vec::new();
        let mut interned: FxHashMap<Vec<Target>, u32> = FxHashMap::default();
        let mut used = vec![false; method.overriders.len()];
        let mut not_implemented = false;
        let mut ambiguous = false;

        for cell in 0..total {
            let mut mask: Option<BitSet> = None;
            let mut concrete = true;
            for dim in &dims {
                let group = &dim.groups[(cell / dim.stride) % dim.groups.len()];
                concrete &= group.concrete.is_some();
                mask = Some(match mask.take() {
                    Some(mut mask) => {
                        mask.intersect_with(&group.mask);
                        mask
                    }
                    None => group.mask.clone(),
                });
            }
            let candidates: Vec<usize> = mask.map(|m| m.iter().collect()).unwrap_or_default();
            let chain = next_chain(&spec, candidates, &method.overriders);

            if self.options.trace {
                tracing::debug!(
                    method = method.name,
                    cell,
                    classes = ?self.cell_classes(&dims, cell),
                    chain = ?chain,
                    "resolved dispatch cell"
                );
            }

            if concrete {
                for target in &chain {
                    if let Target::Overrider(o) = target {
                        used[*o as usize] = true;
                    }
                }
                match chain.first() {
                    Some(Target::NotImplemented) => not_implemented = true,
                    Some(Target::Ambiguous) => {
                        ambiguous = true;
                        let classes = self.cell_classes(&dims, cell);
                        if self.options.strict {
                            return Err(DispatchError::AmbiguousCall {
                                method: method.name.to_string(),
                                types: classes
                                    .iter()
                                    .map(|&c| self.graph.class(c).primary_id())
                                    .collect(),
                            });
                        }
                        self.report.ambiguities.push(Ambiguity {
                            method: method.name.to_string(),
                            classes: classes
                                .iter()
                                .map(|&c| self.graph.class(c).display_name())
                                .collect(),
                        });
                    }
                    _ => {}
                }
            }

            let next_id = chains.len() as u32;
            let id = *interned.entry(chain).or_insert_with_key(|chain| {
                chains.push(chain.clone().into_boxed_slice());
                next_id
            });
            cells.push(id);
        }

        self.report.cells += total;
        self.report.not_implemented += usize::from(not_implemented);
        self.report.ambiguous += usize::from(ambiguous);
        tracing::debug!(
            method = method.name,
            overriders = method.overriders.len(),
            cells = total,
            chains = chains.len(),
            "built dispatch table"
        );

        Ok(CompiledMethod {
            name: method.name.to_string(),
            overriders: method.overrider_names.clone(),
            dims,
            cells,
            chains,
            used,
        })
    }

    /// Group the descendants of `root` by applicable overriders at `dim`.
    fn group_classes(&self, method: &ResolvedMethod<'_>, dim: usize, root: ClassIdx) -> Vec<Group> {
        let arity = method.params.len();
        let mut groups: IndexMap<BitSet, Vec<ClassIdx>> = IndexMap::new();
        for class in self.graph.class(root).descendants.iter() {
            let mask: BitSet = method
                .overriders
                .iter()
                .enumerate()
                .filter(|(_, params)| params.len() == arity && self.graph.is_base(params[dim], class))
                .map(|(o, _)| o)
                .collect();
            groups.entry(mask).or_default().push(class);
        }

        groups
            .into_iter()
            .map(|(mask, classes)| Group {
                concrete: classes
                    .iter()
                    .copied()
                    .find(|&c| !self.graph.class(c).is_abstract),
                mask,
                classes,
            })
            .collect()
    }

    /// One representative class per dimension, preferring concrete ones.
    fn cell_classes(&self, dims: &[Dimension], cell: usize) -> Vec<ClassIdx> {
        dims.iter()
            .map(|dim| {
                let group = &dim.groups[(cell / dim.stride) % dim.groups.len()];
                group.concrete.unwrap_or(group.classes[0])
            })
            .collect()
    }
}

/// Most specific candidate first, then successively less specific ones.
///
/// Ends with `NotImplemented` when the candidates run out, or `Ambiguous`
/// when the remaining candidates have no unique best.
fn next_chain(spec: &Specificity<'_>, mut remaining: Vec<usize>, params: &[Vec<ClassIdx>]) -> Vec<Target> {
    let mut chain = Vec::new();
    loop {
        match spec.select(&remaining, params) {
            Selection::Resolved(best) => {
                chain.push(Target::Overrider(best as u32));
                remaining.retain(|&o| o != best);
            }
            Selection::NoMatch => {
                chain.push(Target::NotImplemented);
                return chain;
            }
            Selection::Ambiguous(_) => {
                chain.push(Target::Ambiguous);
                return chain;
            }
        }
    }
}
