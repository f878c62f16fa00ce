use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{bits_for, high_bits, TypeHash};
use crate::config::HashConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::rtti::TypeId;

/// Keys per displacement group, on average.
const GROUP_SIZE: usize = 4;

/// Attempts granted per key on top of the configured budget.
const ATTEMPTS_PER_KEY: usize = 512;

/// Minimal perfect hash: `H(x) = (pilot(x) + disp[group(x)]) mod N`.
///
/// Keys are split into `N / 4` groups by a second multiplicative hash.
/// Groups are placed largest first; each gets the smallest displacement
/// that moves all its keys to free slots. A pass that cannot place a group
/// restarts with fresh multipliers. Small key sets, where pilot collisions
/// inside a group are likelier, get extra passes within the attempt budget.
#[derive(Debug, Clone)]
pub struct MinimalPerfectHash {
    config: HashConfig,
    table_size: usize,
    mult: u64,
    bits: u32,
    group_mult: u64,
    group_bits: u32,
    displacements: Vec<usize>,
}

impl MinimalPerfectHash {
    pub fn new(config: HashConfig) -> Self {
        Self {
            config,
            table_size: 0,
            mult: 1,
            bits: 0,
            group_mult: 1,
            group_bits: 0,
            displacements: Vec::new(),
        }
    }

    fn group(&self, x: u64) -> usize {
        high_bits(self.group_mult, x, self.group_bits) as usize % self.displacements.len().max(1)
    }
}

impl Default for MinimalPerfectHash {
    fn default() -> Self {
        Self::new(HashConfig::default())
    }
}

impl TypeHash for MinimalPerfectHash {
    fn initialize(&mut self, ids: &[TypeId]) -> DispatchResult<usize> {
        let n = ids.len();
        self.finalize();
        self.table_size = n;
        if n <= 1 {
            self.displacements = vec![0; n];
            return Ok(n);
        }

        let num_groups = (n / GROUP_SIZE).max(1);
        let group_bits = bits_for(num_groups);
        let bits = bits_for(n * 2);
        let budget = self.config.max_attempts.max(n * ATTEMPTS_PER_KEY);
        let passes = self.config.max_passes.max(budget / (2 * n));

        tracing::trace!(types = n, groups = num_groups, "searching minimal perfect hash");

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut total_attempts = 0;
        let mut groups: Vec<Vec<u64>> = vec![Vec::new(); num_groups];
        let mut positions: Vec<usize> = Vec::new();

        for pass in 0..passes {
            if total_attempts >= budget {
                break;
            }
            let mult = rng.random::<u64>() | 1;
            let group_mult = rng.random::<u64>() | 1;

            for group in &mut groups {
                group.clear();
            }
            for id in ids {
                let g = high_bits(group_mult, id.raw(), group_bits) as usize % num_groups;
                groups[g].push(id.raw());
            }
            let mut order: Vec<usize> = (0..num_groups).collect();
            order.sort_by_key(|&g| std::cmp::Reverse(groups[g].len()));

            let mut used = vec![false; n];
            let mut displacements = vec![0; num_groups];

            let placed = 'groups: {
                for g in order {
                    if groups[g].is_empty() {
                        continue;
                    }
                    let mut found = false;
                    for disp in 0..n {
                        total_attempts += 1;
                        if total_attempts > budget {
                            break 'groups false;
                        }
                        positions.clear();
                        let fits = groups[g].iter().all(|&key| {
                            let pos = (high_bits(mult, key, bits) as usize + disp) % n;
                            let free = !used[pos] && !positions.contains(&pos);
                            positions.push(pos);
                            free
                        });
                        if fits {
                            displacements[g] = disp;
                            for &pos in &positions {
                                used[pos] = true;
                            }
                            found = true;
                            break;
                        }
                    }
                    if !found {
                        break 'groups false;
                    }
                }
                true
            };

            if placed {
                self.mult = mult;
                self.bits = bits;
                self.group_mult = group_mult;
                self.group_bits = group_bits;
                self.displacements = displacements;
                tracing::debug!(
                    types = n,
                    passes = pass + 1,
                    attempts = total_attempts,
                    "found minimal perfect hash"
                );
                return Ok(n);
            }
        }

        self.finalize();
        Err(DispatchError::HashSearch {
            attempts: total_attempts,
            buckets: n,
        })
    }

    #[inline]
    fn hash(&self, id: TypeId) -> usize {
        if self.table_size == 0 {
            return 0;
        }
        let x = id.raw();
        let pilot = high_bits(self.mult, x, self.bits) as usize;
        let disp = self.displacements.get(self.group(x)).copied().unwrap_or(0);
        (pilot + disp) % self.table_size
    }

    fn finalize(&mut self) {
        self.table_size = 0;
        self.mult = 1;
        self.bits = 0;
        self.group_mult = 1;
        self.group_bits = 0;
        self.displacements.clear();
    }
}
