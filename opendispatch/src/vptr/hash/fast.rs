use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{high_bits, TypeHash};
use crate::config::HashConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::rtti::TypeId;

/// Table growth steps tried before giving up.
const PASSES: u32 = 4;

/// `H(x) = (M * x) >> S`.
///
/// Searches random odd multipliers `M` for a power-of-two table, doubling
/// the table after each unsuccessful pass. The table may have holes; the
/// reported length spans the highest hash value.
#[derive(Debug, Clone)]
pub struct FastPerfectHash {
    config: HashConfig,
    mult: u64,
    bits: u32,
}

impl FastPerfectHash {
    pub fn new(config: HashConfig) -> Self {
        Self {
            config,
            mult: 1,
            bits: 0,
        }
    }
}

impl Default for FastPerfectHash {
    fn default() -> Self {
        Self::new(HashConfig::default())
    }
}

impl TypeHash for FastPerfectHash {
    fn initialize(&mut self, ids: &[TypeId]) -> DispatchResult<usize> {
        let n = ids.len();
        if n == 0 {
            self.finalize();
            return Ok(0);
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut bits: u32 = 1;
        let mut size = n * 5 / 4;
        loop {
            size >>= 1;
            if size == 0 {
                break;
            }
            bits += 1;
        }

        let mut total_attempts = 0;
        let mut buckets: Vec<bool> = Vec::new();
        for _ in 0..PASSES {
            tracing::trace!(types = n, buckets = 1usize << bits, "searching fast perfect hash");
            for _ in 0..self.config.max_attempts {
                total_attempts += 1;
                let mult = rng.random::<u64>() | 1;
                buckets.clear();
                buckets.resize(1 << bits, false);

                let mut max: usize = 0;
                let collision = ids.iter().any(|id| {
                    let index = high_bits(mult, id.raw(), bits) as usize;
                    max = max.max(index);
                    std::mem::replace(&mut buckets[index], true)
                });
                if !collision {
                    self.mult = mult;
                    self.bits = bits;
                    tracing::debug!(
                        types = n,
                        attempts = total_attempts,
                        span = max + 1,
                        "found fast perfect hash"
                    );
                    return Ok(max + 1);
                }
            }
            bits += 1;
        }

        Err(DispatchError::HashSearch {
            attempts: total_attempts,
            buckets: 1 << bits,
        })
    }

    #[inline]
    fn hash(&self, id: TypeId) -> usize {
        high_bits(self.mult, id.raw(), self.bits) as usize
    }

    fn finalize(&mut self) {
        self.mult = 1;
        self.bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_hashes() {
        let ids: Vec<TypeId> = (0..500).map(|i| TypeId::from_name(&format!("class{i}"))).collect();
        let mut hash = FastPerfectHash::default();
        let len = hash.initialize(&ids).unwrap();

        let mut seen = vec![false; len];
        for id in &ids {
            let h = hash.hash(*id);
            assert!(h < len);
            assert!(!seen[h], "collision at {h}");
            seen[h] = true;
        }
    }

    #[test]
    fn test_empty_set() {
        let mut hash = FastPerfectHash::default();
        assert_eq!(hash.initialize(&[]).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ids_cannot_be_separated() {
        let mut hash = FastPerfectHash::new(HashConfig {
            max_attempts: 10,
            ..HashConfig::default()
        });
        let id = TypeId::new(42);
        let err = hash.initialize(&[id, id]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::HashSearch {
                attempts: 40,
                buckets: 64,
            }
        );
    }
}
