//! Type identifier to v-table lookup.
//!
//! Dispatch starts by mapping the dynamic type of every virtual argument to
//! its class's v-table. Two strategies are provided:
//!
//! - [`VptrMap`]: a hash map, no search at initialization.
//! - [`VptrVector`]: a vector indexed by a perfect hash ([`hash`]) of the
//!   identifier, one multiply and shift per lookup.

pub mod hash;

use std::fmt;

use rustc_hash::FxHashMap;

use crate::config::{HashStrategy, LookupStrategy, RegistryConfig};
use crate::error::DispatchResult;
use crate::rtti::TypeId;

use hash::{FastPerfectHash, IdentityHash, MinimalPerfectHash, TypeHash};

/// Index of a class's v-table in the compiled tables.
pub type VtableIdx = usize;

/// Maps registered identifiers to v-tables.
pub trait VptrLookup: Send + Sync + fmt::Debug {
    /// Replace the mapping with `entries`.
    fn initialize(&mut self, entries: &[(TypeId, VtableIdx)]) -> DispatchResult<()>;

    /// V-table of the class identified by `id`, if registered.
    fn dynamic_vptr(&self, id: TypeId) -> Option<VtableIdx>;

    /// Release the mapping.
    fn finalize(&mut self);
}

/// Hash map lookup.
#[derive(Debug, Default)]
pub struct VptrMap {
    vptrs: FxHashMap<TypeId, VtableIdx>,
}

impl VptrMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VptrLookup for VptrMap {
    fn initialize(&mut self, entries: &[(TypeId, VtableIdx)]) -> DispatchResult<()> {
        self.vptrs = entries.iter().copied().collect();
        Ok(())
    }

    #[inline]
    fn dynamic_vptr(&self, id: TypeId) -> Option<VtableIdx> {
        self.vptrs.get(&id).copied()
    }

    fn finalize(&mut self) {
        self.vptrs = FxHashMap::default();
    }
}

/// Perfect-hash indexed lookup.
///
/// With runtime checks on, a control vector holds the identifier stored at
/// every index, so unregistered identifiers are reported instead of landing
/// on another class's v-table.
#[derive(Debug)]
pub struct VptrVector {
    hash: Box<dyn TypeHash>,
    vptrs: Vec<Option<VtableIdx>>,
    control: Vec<TypeId>,
    checks: bool,
}

impl VptrVector {
    pub fn new(hash: Box<dyn TypeHash>, checks: bool) -> Self {
        Self {
            hash,
            vptrs: Vec::new(),
            control: Vec::new(),
            checks,
        }
    }

    /// Table length, holes included.
    pub fn len(&self) -> usize {
        self.vptrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vptrs.is_empty()
    }
}

impl VptrLookup for VptrVector {
    fn initialize(&mut self, entries: &[(TypeId, VtableIdx)]) -> DispatchResult<()> {
        let ids: Vec<TypeId> = entries.iter().map(|&(id, _)| id).collect();
        let len = self.hash.initialize(&ids)?;

        self.vptrs = vec![None; len];
        self.control = if self.checks {
            vec![TypeId::default(); len]
        } else {
            Vec::new()
        };
        for &(id, vtable) in entries {
            let index = self.hash.hash(id);
            self.vptrs[index] = Some(vtable);
            if self.checks {
                self.control[index] = id;
            }
        }
        tracing::debug!(types = ids.len(), len, "built vptr vector");
        Ok(())
    }

    #[inline]
    fn dynamic_vptr(&self, id: TypeId) -> Option<VtableIdx> {
        let index = self.hash.hash(id);
        if self.checks && self.control.get(index) != Some(&id) {
            return None;
        }
        self.vptrs.get(index).copied().flatten()
    }

    fn finalize(&mut self) {
        self.hash.finalize();
        self.vptrs = Vec::new();
        self.control = Vec::new();
    }
}

/// The lookup `config` asks for.
pub fn lookup_for(config: &RegistryConfig) -> Box<dyn VptrLookup> {
    match config.lookup {
        LookupStrategy::Map => Box::new(VptrMap::new()),
        LookupStrategy::Vector => {
            let hash: Box<dyn TypeHash> = match config.hash {
                HashStrategy::Identity => Box::new(IdentityHash),
                HashStrategy::FastPerfect => Box::new(FastPerfectHash::new(config.hash_search)),
                HashStrategy::MinimalPerfect => Box::new(MinimalPerfectHash::new(config.hash_search)),
            };
            Box::new(VptrVector::new(hash, config.runtime_checks))
        }
    }
}
