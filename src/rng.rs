use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

#[derive(Debug, Clone)]
pub struct RngContext {
    rng: SmallRng,
    verbose: bool,
}

impl RngContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Streams depend on `n`: results reproduce for a fixed `(seed, threads)` only.
    pub fn derive(&mut self, n: usize) -> Vec<SmallRng> {
        (0..n)
            .map(|_| SmallRng::seed_from_u64(self.rng.next_u64()))
            .collect()
    }
}
