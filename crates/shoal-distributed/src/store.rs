//! Worker-local agent storage.
//!
//! A worker owns its slice exclusively between scatter and gather. Every
//! per-agent loop runs on the worker's own rayon pool over fixed-size
//! chunks; each agent is touched by exactly one thread per phase and the
//! per-chunk partial results are folded afterwards in chunk order.

use crate::types::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use shoal_core::kernels::LocalKernels;
use shoal_core::types::{Agent, Domain, Step};
use std::sync::Arc;

/// Agents per parallel work unit.
///
/// Chunk boundaries depend only on the slice, never on the thread count, so
/// a run produces the same agents on 1 or 64 threads.
pub const CHUNK_SIZE: usize = 1024;

/// Exclusive owner of one worker's slice.
pub struct LocalStore {
    rank: WorkerId,
    /// Partition size of this worker; the slice always has exactly this length.
    capacity: usize,
    agents: Vec<Agent>,
    pool: Arc<rayon::ThreadPool>,
}

impl LocalStore {
    /// Create an empty store for `rank`.
    ///
    /// `threads` sizes the worker's pool; 0 lets rayon pick.
    pub fn new(rank: WorkerId, capacity: usize, threads: usize) -> DistributedResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("shoal-{}-{}", rank, i))
            .build()
            .map_err(|e| DistributedError::ThreadPool(e.to_string()))?;

        Ok(Self {
            rank,
            capacity,
            agents: Vec::with_capacity(capacity),
            pool: Arc::new(pool),
        })
    }

    pub fn rank(&self) -> WorkerId {
        self.rank
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Take ownership of a freshly scattered slice.
    pub fn load(&mut self, agents: Vec<Agent>) -> DistributedResult<()> {
        if agents.len() != self.capacity {
            return Err(DistributedError::SliceLengthMismatch {
                rank: self.rank,
                expected: self.capacity,
                actual: agents.len(),
            });
        }
        self.agents = agents;
        Ok(())
    }

    /// Hand the slice back, leaving the store empty.
    pub fn take(&mut self) -> Vec<Agent> {
        std::mem::take(&mut self.agents)
    }

    /// `(Σ distance, Σ distance × weight)` over the slice.
    pub fn local_pair(&self) -> SumPair {
        let partials: Vec<SumPair> = self.pool.install(|| {
            self.agents
                .par_chunks(CHUNK_SIZE)
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|a| SumPair::new(a.distance_from_origin(), a.weighted_distance()))
                        .sum::<SumPair>()
                })
                .collect()
        });
        partials.into_iter().sum()
    }

    /// Swim every agent and return the slice's largest delta.
    pub fn swim_all(
        &mut self,
        kernels: &dyn LocalKernels,
        domain: &Domain,
        seed: u64,
        step: Step,
    ) -> MaxDelta {
        let rank = self.rank;
        let pool = &self.pool;
        let agents = &mut self.agents;
        pool.install(|| {
            agents
                .par_chunks_mut(CHUNK_SIZE)
                .enumerate()
                .map(|(chunk, agents)| {
                    let mut rng = chunk_rng(seed, rank, step, chunk);
                    agents
                        .iter_mut()
                        .map(|agent| kernels.swim(agent, domain, &mut rng))
                        .collect::<MaxDelta>()
                })
                .reduce(MaxDelta::default, MaxDelta::merge)
        })
    }

    /// Feed every agent given the population-wide maximum delta.
    pub fn eat_all(&mut self, kernels: &dyn LocalKernels, max_delta: f64) {
        let pool = &self.pool;
        let agents = &mut self.agents;
        pool.install(|| {
            agents
                .par_iter_mut()
                .with_min_len(CHUNK_SIZE)
                .for_each(|agent| kernels.eat(agent, max_delta));
        });
    }
}

/// Independent random stream for one chunk of one step on one worker.
fn chunk_rng(seed: u64, rank: WorkerId, step: Step, chunk: usize) -> ChaCha8Rng {
    let key = [rank.as_u32() as u64, step, chunk as u64]
        .into_iter()
        .fold(seed, |acc, word| splitmix64(acc ^ word));
    ChaCha8Rng::seed_from_u64(key)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
