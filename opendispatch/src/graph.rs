//! Class graph.
//!
//! Merges class registrations into nodes, computes the transitive ancestor
//! closure of every node and its descendant set. Multiple inheritance is
//! supported; cycles are assumed absent.

use rustc_hash::FxHashMap;

use crate::bitset::BitSet;
use crate::error::{DispatchError, DispatchResult};
use crate::rtti::TypeId;

/// Index of a class node in a [`ClassGraph`].
pub type ClassIdx = usize;

/// A class registration with identifiers already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Identifiers the class is known by. The first is its primary id.
    pub ids: Vec<TypeId>,
    /// Name for diagnostics. Registrations with an empty name never conflict.
    pub name: String,
    /// Declared bases. May include indirect bases.
    pub bases: Vec<TypeId>,
    /// No object ever has this exact dynamic type.
    pub is_abstract: bool,
}

impl ClassDecl {
    pub fn new(id: TypeId, name: impl Into<String>) -> Self {
        Self {
            ids: vec![id],
            name: name.into(),
            bases: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn with_base(mut self, base: TypeId) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with_alias(mut self, id: TypeId) -> Self {
        self.ids.push(id);
        self
    }

    pub fn make_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// A merged class.
#[derive(Debug, Clone)]
pub struct ClassNode {
    pub ids: Vec<TypeId>,
    pub name: String,
    pub is_abstract: bool,
    /// Bases that are not ancestors of another declared base.
    pub direct_bases: Vec<ClassIdx>,
    /// Proper ancestors.
    pub ancestors: BitSet,
    /// The class itself and every class deriving from it.
    pub descendants: BitSet,
}

impl ClassNode {
    pub fn primary_id(&self) -> TypeId {
        self.ids[0]
    }

    /// Name, or the primary id for anonymous classes.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.primary_id().to_string()
        } else {
            self.name.clone()
        }
    }
}

/// The inheritance lattice of all registered classes.
#[derive(Debug, Clone, Default)]
pub struct ClassGraph {
    nodes: Vec<ClassNode>,
    index: FxHashMap<TypeId, ClassIdx>,
}

struct Pending {
    ids: Vec<TypeId>,
    name: String,
    bases: Vec<TypeId>,
    is_abstract: bool,
}

impl ClassGraph {
    /// Build the graph from every registration.
    ///
    /// Registrations sharing an identifier are merged; their names must
    /// agree. Every declared base must itself be registered.
    pub fn build(decls: &[ClassDecl]) -> DispatchResult<Self> {
        let mut pending: Vec<Pending> = Vec::new();
        let mut index: FxHashMap<TypeId, ClassIdx> = FxHashMap::default();

        for decl in decls {
            let Some(&primary) = decl.ids.first() else {
                continue;
            };
            let existing = decl.ids.iter().find_map(|id| index.get(id).copied());
            let node = match existing {
                Some(node) => {
                    let known = &mut pending[node];
                    if !decl.name.is_empty() {
                        if known.name.is_empty() {
                            known.name = decl.name.clone();
                        } else if known.name != decl.name {
                            return Err(DispatchError::OdrViolation {
                                type_id: primary,
                                names: vec![known.name.clone(), decl.name.clone()],
                            });
                        }
                    }
                    known.is_abstract |= decl.is_abstract;
                    node
                }
                None => {
                    pending.push(Pending {
                        ids: Vec::new(),
                        name: decl.name.clone(),
                        bases: Vec::new(),
                        is_abstract: decl.is_abstract,
                    });
                    pending.len() - 1
                }
            };

            for &id in &decl.ids {
                match index.get(&id) {
                    Some(&other) if other != node => {
                        return Err(DispatchError::OdrViolation {
                            type_id: id,
                            names: vec![pending[other].name.clone(), decl.name.clone()],
                        });
                    }
                    Some(_) => {}
                    None => {
                        index.insert(id, node);
                        pending[node].ids.push(id);
                    }
                }
            }
            for &base in &decl.bases {
                if !pending[node].bases.contains(&base) {
                    pending[node].bases.push(base);
                }
            }
        }

        let n = pending.len();
        let mut declared: Vec<Vec<ClassIdx>> = Vec::with_capacity(n);
        for (node, class) in pending.iter().enumerate() {
            let mut bases = Vec::with_capacity(class.bases.len());
            for base in &class.bases {
                let base_idx = index.get(base).copied().ok_or(DispatchError::MissingBase {
                    base: *base,
                    derived: class.ids[0],
                })?;
                if base_idx != node && !bases.contains(&base_idx) {
                    bases.push(base_idx);
                }
            }
            declared.push(bases);
        }

        let ancestors: Vec<BitSet> = (0..n).map(|node| closure(node, &declared)).collect();

        let mut descendants: Vec<BitSet> = (0..n)
            .map(|node| {
                let mut set = BitSet::with_capacity(n);
                set.insert(node);
                set
            })
            .collect();
        for (node, set) in ancestors.iter().enumerate() {
            for ancestor in set.iter() {
                descendants[ancestor].insert(node);
            }
        }

        let direct: Vec<Vec<ClassIdx>> = declared
            .iter()
            .map(|bases| {
                bases
                    .iter()
                    .copied()
                    .filter(|&b| !bases.iter().any(|&other| ancestors[other].contains(b)))
                    .collect()
            })
            .collect();

        let nodes = pending
            .into_iter()
            .zip(direct)
            .zip(ancestors.into_iter().zip(descendants))
            .map(|((class, direct_bases), (ancestors, descendants))| ClassNode {
                ids: class.ids,
                name: class.name,
                is_abstract: class.is_abstract,
                direct_bases,
                ancestors,
                descendants,
            })
            .collect::<Vec<_>>();

        tracing::debug!(classes = nodes.len(), "built class graph");
        Ok(ClassGraph { nodes, index })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn classes(&self) -> &[ClassNode] {
        &self.nodes
    }

    pub fn class(&self, idx: ClassIdx) -> &ClassNode {
        &self.nodes[idx]
    }

    /// Node known by `id`.
    pub fn class_of(&self, id: TypeId) -> Option<ClassIdx> {
        self.index.get(&id).copied()
    }

    /// Every (identifier, node) pair, in registration order.
    pub fn type_ids(&self) -> impl Iterator<Item = (TypeId, ClassIdx)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(idx, node)| node.ids.iter().map(move |&id| (id, idx)))
    }

    /// Is `base` an ancestor of, or the same class as, `derived`?
    #[inline]
    pub fn is_base(&self, base: ClassIdx, derived: ClassIdx) -> bool {
        self.nodes[base].descendants.contains(derived)
    }

    /// [`is_base`](Self::is_base) by identifier. Unknown ids are unrelated.
    pub fn is_base_id(&self, base: TypeId, derived: TypeId) -> bool {
        match (self.class_of(base), self.class_of(derived)) {
            (Some(b), Some(d)) => self.is_base(b, d),
            _ => false,
        }
    }
}

/// Proper ancestors of `node`, following declared bases.
fn closure(node: ClassIdx, declared: &[Vec<ClassIdx>]) -> BitSet {
    let mut seen = BitSet::with_capacity(declared.len());
    let mut stack = declared[node].clone();
    while let Some(next) = stack.pop() {
        if next == node || seen.contains(next) {
            continue;
        }
        seen.insert(next);
        stack.extend_from_slice(&declared[next]);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TypeId {
        TypeId::new(n)
    }

    /// Animal <- Herbivore, Carnivore; Herbivore <- Cow; Carnivore <- Wolf.
    fn animals() -> Vec<ClassDecl> {
        vec![
            ClassDecl::new(id(1), "Animal").make_abstract(),
            ClassDecl::new(id(2), "Herbivore").with_base(id(1)),
            ClassDecl::new(id(3), "Carnivore").with_base(id(1)),
            ClassDecl::new(id(4), "Cow").with_base(id(2)),
            ClassDecl::new(id(5), "Wolf").with_base(id(3)),
        ]
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let graph = ClassGraph::build(&animals()).unwrap();
        let animal = graph.class_of(id(1)).unwrap();
        let cow = graph.class_of(id(4)).unwrap();
        let wolf = graph.class_of(id(5)).unwrap();

        assert!(graph.is_base(animal, cow));
        assert!(graph.is_base(cow, cow));
        assert!(!graph.is_base(cow, animal));
        assert!(!graph.is_base_id(id(2), id(5)));
        assert_eq!(graph.class(animal).descendants.count(), 5);
        assert_eq!(graph.class(wolf).ancestors.count(), 2);
        assert!(graph.class(animal).is_abstract);
    }

    #[test]
    fn test_duplicate_registration_merges() {
        let mut decls = animals();
        decls.extend(animals());
        let graph = ClassGraph::build(&decls).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.class(graph.class_of(id(4)).unwrap()).direct_bases.len(), 1);
    }

    #[test]
    fn test_alias_ids_share_node() {
        let decls = vec![
            ClassDecl::new(id(1), "Animal"),
            ClassDecl::new(id(2), "Cow").with_base(id(1)),
            ClassDecl::new(id(20), "").with_alias(id(2)),
        ];
        let graph = ClassGraph::build(&decls).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.class_of(id(20)), graph.class_of(id(2)));
        assert_eq!(graph.class(graph.class_of(id(20)).unwrap()).name, "Cow");
    }

    #[test]
    fn test_indirect_bases_are_not_direct() {
        let decls = vec![
            ClassDecl::new(id(1), "A"),
            ClassDecl::new(id(2), "B").with_base(id(1)),
            ClassDecl::new(id(3), "C").with_base(id(2)).with_base(id(1)),
        ];
        let graph = ClassGraph::build(&decls).unwrap();
        let c = graph.class(graph.class_of(id(3)).unwrap());
        assert_eq!(c.direct_bases, vec![graph.class_of(id(2)).unwrap()]);
        assert_eq!(c.ancestors.count(), 2);
    }

    #[test]
    fn test_diamond() {
        let decls = vec![
            ClassDecl::new(id(1), "Top"),
            ClassDecl::new(id(2), "Left").with_base(id(1)),
            ClassDecl::new(id(3), "Right").with_base(id(1)),
            ClassDecl::new(id(4), "Bottom").with_base(id(2)).with_base(id(3)),
        ];
        let graph = ClassGraph::build(&decls).unwrap();
        let bottom = graph.class(graph.class_of(id(4)).unwrap());
        assert_eq!(bottom.direct_bases.len(), 2);
        assert_eq!(bottom.ancestors.count(), 3);
        assert_eq!(graph.class(graph.class_of(id(1)).unwrap()).descendants.count(), 4);
    }

    #[test]
    fn test_missing_base() {
        let decls = vec![ClassDecl::new(id(2), "Cow").with_base(id(99))];
        match ClassGraph::build(&decls) {
            Err(DispatchError::MissingBase { base, derived }) => {
                assert_eq!(base, id(99));
                assert_eq!(derived, id(2));
            }
            other => panic!("Expected MissingBase, got {:?}", other),
        }
    }

    #[test]
    fn test_conflicting_names() {
        let decls = vec![ClassDecl::new(id(7), "a::Cow"), ClassDecl::new(id(7), "b::Cow")];
        match ClassGraph::build(&decls) {
            Err(DispatchError::OdrViolation { type_id, names }) => {
                assert_eq!(type_id, id(7));
                assert_eq!(names, vec!["a::Cow".to_string(), "b::Cow".to_string()]);
            }
            other => panic!("Expected OdrViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_self_base_is_ignored() {
        let decls = vec![ClassDecl::new(id(1), "Loop").with_base(id(1))];
        let graph = ClassGraph::build(&decls).unwrap();
        assert!(graph.class(0).ancestors.is_empty());
        assert!(graph.class(0).direct_bases.is_empty());
    }
}
