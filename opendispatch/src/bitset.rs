//! Growable bit set.
//!
//! Used for ancestor and descendant closures, slot occupancy and overrider
//! applicability masks. Equality and hashing ignore trailing zero words, so
//! sets that grew differently still compare by content, which lets masks key
//! the applicability groups.

use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Default)]
pub struct BitSet {
    bits: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        BitSet { bits: Vec::new() }
    }

    /// Room for bits `0..n` without reallocating.
    pub fn with_capacity(n: usize) -> Self {
        BitSet {
            bits: vec![0; n.div_ceil(64)],
        }
    }

    fn ensure_capacity(&mut self, n: usize) {
        let words = n.div_ceil(64);
        if words > self.bits.len() {
            self.bits.resize(words, 0);
        }
    }

    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.ensure_capacity(index + 1);
        self.bits[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.bits
            .get(index / 64)
            .is_some_and(|&word| word & (1u64 << (index % 64)) != 0)
    }

    /// Add every member of `other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (word, &theirs) in self.bits.iter_mut().zip(&other.bits) {
            *word |= theirs;
        }
    }

    /// Keep only members also in `other`.
    pub fn intersect_with(&mut self, other: &BitSet) {
        for (i, word) in self.bits.iter_mut().enumerate() {
            *word &= other.bits.get(i).copied().unwrap_or(0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Smallest index not in the set.
    pub fn first_unset(&self) -> usize {
        for (i, &word) in self.bits.iter().enumerate() {
            if word != u64::MAX {
                return i * 64 + (!word).trailing_zeros() as usize;
            }
        }
        self.bits.len() * 64
    }

    /// Iterate set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * 64 + bit)
            })
        })
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .bits
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |last| last + 1);
        &self.bits[..len]
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}
