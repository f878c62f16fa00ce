//! Overrider specificity.
//!
//! An overrider is **applicable** to a tuple of classes when, at every
//! position, its specializing class is the argument's class or one of its
//! ancestors. Among applicable overriders the selection picks the unique
//! maximally specific one:
//!
//! 1. **Filter applicable**: drop overriders that do not accept the tuple
//! 2. **Find maximal**: keep those no other candidate is more specific than
//! 3. **Select**: one maximal candidate wins; more than one is ambiguous

use std::cmp::Ordering;

use crate::graph::{ClassGraph, ClassIdx};

/// Outcome of selecting among candidate overriders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A unique most specific overrider.
    Resolved(usize),
    /// No candidate applies.
    NoMatch,
    /// Several incomparable candidates are maximal.
    Ambiguous(Vec<usize>),
}

/// Specificity queries over a class graph.
#[derive(Debug, Clone, Copy)]
pub struct Specificity<'g> {
    graph: &'g ClassGraph,
}

impl<'g> Specificity<'g> {
    pub fn new(graph: &'g ClassGraph) -> Self {
        Self { graph }
    }

    /// Does an overrider specialized on `params` accept `args`?
    pub fn is_applicable(&self, params: &[ClassIdx], args: &[ClassIdx]) -> bool {
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(&param, &arg)| self.graph.is_base(param, arg))
    }

    /// Is `a` more specific than `b`?
    ///
    /// Every position of `a` must be the same class as, or a descendant of,
    /// the corresponding position of `b`, and at least one strictly so.
    pub fn is_more_specific(&self, a: &[ClassIdx], b: &[ClassIdx]) -> bool {
        if a.len() != b.len() {
            return false;
        }

        let mut some_strictly = false;
        for (&pa, &pb) in a.iter().zip(b) {
            if pa == pb {
                continue;
            }
            if !self.graph.is_base(pb, pa) {
                return false;
            }
            some_strictly = true;
        }

        some_strictly
    }

    /// Compare the specificity of two overriders.
    ///
    /// Returns:
    /// - `Ordering::Less` if `a` is more specific
    /// - `Ordering::Greater` if `b` is more specific
    /// - `Ordering::Equal` if neither dominates
    pub fn compare_specificity(&self, a: &[ClassIdx], b: &[ClassIdx]) -> Ordering {
        match (self.is_more_specific(a, b), self.is_more_specific(b, a)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }

    /// Candidates that no other candidate is more specific than.
    ///
    /// `candidates` index into `params`.
    pub fn find_maximal<P: AsRef<[ClassIdx]>>(&self, candidates: &[usize], params: &[P]) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|&m| {
                !candidates.iter().any(|&other| {
                    other != m
                        && self.compare_specificity(params[other].as_ref(), params[m].as_ref()) == Ordering::Less
                })
            })
            .collect()
    }

    /// Select the most specific of `candidates`.
    pub fn select<P: AsRef<[ClassIdx]>>(&self, candidates: &[usize], params: &[P]) -> Selection {
        if candidates.is_empty() {
            return Selection::NoMatch;
        }

        let maximal = self.find_maximal(candidates, params);
        match maximal.as_slice() {
            [unique] => Selection::Resolved(*unique),
            _ => Selection::Ambiguous(maximal),
        }
    }

    /// Select among every overrider in `params` that accepts `args`.
    pub fn resolve<P: AsRef<[ClassIdx]>>(&self, args: &[ClassIdx], params: &[P]) -> Selection {
        let applicable: Vec<usize> = (0..params.len())
            .filter(|&o| self.is_applicable(params[o].as_ref(), args))
            .collect();
        self.select(&applicable, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ClassDecl;
    use crate::rtti::TypeId;

    /// 0 Animal, 1 Herbivore, 2 Carnivore, 3 Cow, 4 Wolf
    fn animals() -> ClassGraph {
        let id = TypeId::new;
        ClassGraph::build(&[
            ClassDecl::new(id(1), "Animal"),
            ClassDecl::new(id(2), "Herbivore").with_base(id(1)),
            ClassDecl::new(id(3), "Carnivore").with_base(id(1)),
            ClassDecl::new(id(4), "Cow").with_base(id(2)),
            ClassDecl::new(id(5), "Wolf").with_base(id(3)),
        ])
        .unwrap()
    }

    #[test]
    fn test_is_applicable() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        assert!(spec.is_applicable(&[0, 0], &[3, 4]));
        assert!(spec.is_applicable(&[1, 2], &[3, 4]));
        assert!(!spec.is_applicable(&[2, 1], &[3, 4]));
        assert!(!spec.is_applicable(&[0, 0], &[3]));
    }

    #[test]
    fn test_is_more_specific() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        assert!(spec.is_more_specific(&[1, 2], &[0, 0]));
        assert!(spec.is_more_specific(&[1, 0], &[0, 0]));
        assert!(!spec.is_more_specific(&[0, 0], &[1, 2]));
        assert!(!spec.is_more_specific(&[1, 2], &[1, 2]));
        assert!(!spec.is_more_specific(&[1, 0], &[0, 2]));
    }

    #[test]
    fn test_compare_specificity() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        assert_eq!(spec.compare_specificity(&[3], &[0]), Ordering::Less);
        assert_eq!(spec.compare_specificity(&[0], &[3]), Ordering::Greater);
        assert_eq!(spec.compare_specificity(&[1], &[2]), Ordering::Equal);
    }

    #[test]
    fn test_resolve_most_specific() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        let overriders = vec![vec![0, 0], vec![1, 2], vec![2, 1]];
        assert_eq!(spec.resolve(&[3, 4], &overriders), Selection::Resolved(1));
        assert_eq!(spec.resolve(&[4, 3], &overriders), Selection::Resolved(2));
        assert_eq!(spec.resolve(&[4, 4], &overriders), Selection::Resolved(0));
    }

    #[test]
    fn test_resolve_ambiguous() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        let overriders = vec![vec![1, 0], vec![0, 2]];
        match spec.resolve(&[3, 4], &overriders) {
            Selection::Ambiguous(candidates) => assert_eq!(candidates, vec![0, 1]),
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_overriders_are_ambiguous() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        let overriders = vec![vec![3], vec![3]];
        assert!(matches!(spec.resolve(&[3], &overriders), Selection::Ambiguous(_)));
    }

    #[test]
    fn test_no_match() {
        let graph = animals();
        let spec = Specificity::new(&graph);
        let overriders = vec![vec![1]];
        assert_eq!(spec.resolve(&[4], &overriders), Selection::NoMatch);
        assert_eq!(spec.select(&[], &overriders), Selection::NoMatch);
    }
}
