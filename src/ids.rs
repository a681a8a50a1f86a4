//! Session-unique identifier generation.
//!
//! Ids are drawn at random from `[0, bound)` and never handed out twice in a
//! session, even after the element that held them is deleted. Once half of
//! the pool is in use the bound doubles, so rejection sampling stays cheap.

use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::IdConfig;

/// Issues ids that are unique for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: SmallRng,
    issued: HashSet<u32>,
    bound: u32,
    config: IdConfig,
}

impl IdGenerator {
    /// Create a generator from its configuration.
    pub fn new(config: IdConfig) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(config.seed),
            issued: HashSet::new(),
            bound: config.initial_bound.max(2),
            config,
        }
    }

    /// Generate a fresh id.
    pub fn gen_id(&mut self) -> u32 {
        if self.issued.len() as u64 >= u64::from(self.bound / 2) {
            self.bound = self.bound.saturating_mul(2);
            tracing::trace!(bound = self.bound, "id pool grown");
        }
        loop {
            let candidate = self.rng.random_range(0..self.bound);
            if self.issued.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Record an id that was supplied from outside (e.g. a treestring).
    ///
    /// Returns false if the id had already been issued or reserved.
    pub fn reserve(&mut self, id: u32) -> bool {
        self.issued.insert(id)
    }

    /// Whether `id` has been issued or reserved in this session.
    pub fn is_issued(&self, id: u32) -> bool {
        self.issued.contains(&id)
    }

    /// Number of ids known to the generator.
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    /// Current exclusive upper bound for random ids.
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// Forget every id and restart from the configured seed.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(IdConfig::default())
    }
}
