//! V-table slot allocation.
//!
//! A method's virtual parameter declared as class `C` reads the same slot in
//! the v-table of `C` and of every descendant of `C`, so the slot must be
//! free in all of them. In a single-inheritance tree this yields consecutive
//! slots; in a lattice, classes sharing descendants get disjoint slots.

use crate::bitset::BitSet;
use crate::graph::{ClassGraph, ClassIdx};

/// Slot layout of every method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotLayout {
    /// `slots[method][dim]`.
    pub slots: Vec<Vec<usize>>,
    /// Highest slot used by each class, plus one.
    pub extent: Vec<usize>,
}

/// Allocate a slot for every `(method, dim)` use.
///
/// `uses[method][dim]` is the class declared for that virtual parameter.
/// Uses rooted at larger sub-hierarchies are placed first.
pub fn allocate(graph: &ClassGraph, uses: &[Vec<ClassIdx>]) -> SlotLayout {
    let mut order: Vec<(usize, usize)> = uses
        .iter()
        .enumerate()
        .flat_map(|(m, dims)| (0..dims.len()).map(move |d| (m, d)))
        .collect();
    order.sort_by_key(|&(m, d)| {
        let class = uses[m][d];
        (std::cmp::Reverse(graph.class(class).descendants.count()), m, d)
    });

    let mut occupied: Vec<BitSet> = vec![BitSet::new(); graph.len()];
    let mut extent = vec![0; graph.len()];
    let mut slots: Vec<Vec<usize>> = uses.iter().map(|dims| vec![0; dims.len()]).collect();

    for (m, d) in order {
        let root = uses[m][d];
        let members = &graph.class(root).descendants;

        let mut taken = BitSet::new();
        for class in members.iter() {
            taken.union_with(&occupied[class]);
        }
        let slot = taken.first_unset();

        for class in members.iter() {
            occupied[class].insert(slot);
            extent[class] = extent[class].max(slot + 1);
        }
        slots[m][d] = slot;
    }

    tracing::debug!(
        uses = slots.iter().map(Vec::len).sum::<usize>(),
        widest = extent.iter().copied().max().unwrap_or(0),
        "allocated v-table slots"
    );
    SlotLayout { slots, extent }
}
