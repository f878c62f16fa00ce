//! Hash functions over the exact set of registered identifiers.
//!
//! A [`TypeHash`] is initialized with every identifier the registry knows
//! and must map them to distinct indices. Identifiers outside that set may
//! map anywhere; the lookup's control vector catches them.

mod fast;
mod minimal;

use std::fmt;

use crate::error::{DispatchError, DispatchResult};
use crate::rtti::TypeId;

pub use fast::FastPerfectHash;
pub use minimal::MinimalPerfectHash;

/// A collision-free hash over a fixed identifier set.
pub trait TypeHash: Send + Sync + fmt::Debug {
    /// Find hash factors for `ids`. Returns the table length the hash
    /// values of `ids` fit in.
    fn initialize(&mut self, ids: &[TypeId]) -> DispatchResult<usize>;

    fn hash(&self, id: TypeId) -> usize;

    /// Release the factors.
    fn finalize(&mut self);
}

/// Largest identifier [`IdentityHash`] accepts.
pub const IDENTITY_LIMIT: u64 = 1 << 20;

/// The identifier is its own hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHash;

impl TypeHash for IdentityHash {
    fn initialize(&mut self, ids: &[TypeId]) -> DispatchResult<usize> {
        let Some(max) = ids.iter().map(|id| id.raw()).max() else {
            return Ok(0);
        };
        if max >= IDENTITY_LIMIT {
            return Err(DispatchError::HashSearch {
                attempts: 0,
                buckets: usize::try_from(max).unwrap_or(usize::MAX),
            });
        }
        Ok(max as usize + 1)
    }

    #[inline]
    fn hash(&self, id: TypeId) -> usize {
        usize::try_from(id.raw()).unwrap_or(usize::MAX)
    }

    fn finalize(&mut self) {}
}

/// The top `bits` bits of `mult * x`. Zero bits yield zero.
#[inline]
pub(crate) fn high_bits(mult: u64, x: u64, bits: u32) -> u64 {
    if bits == 0 {
        0
    } else {
        mult.wrapping_mul(x) >> (64 - bits)
    }
}

/// Smallest `bits` such that `1 << bits >= n`.
pub(crate) fn bits_for(n: usize) -> u32 {
    n.max(1).next_power_of_two().trailing_zeros()
}
