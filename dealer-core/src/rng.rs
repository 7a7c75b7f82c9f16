use rand::RngCore;
use rand_mt::Mt;

/// Deterministic generator driving every deal in a match.
///
/// A `(seed, game)` pair must replay the exact same cards, and the journal
/// format promises that across runs, so the generator is pinned to the
/// canonical 32-bit Mersenne Twister (N=624, M=397) rather than whatever
/// `thread_rng` happens to be this year.
#[derive(Clone)]
pub struct Rng(Mt);

impl Rng {
    pub fn seeded(seed: u32) -> Self {
        Self(Mt::new(seed))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    /// Uniform draw from `[0, 1)`, the reference `genrand_real2` mapping.
    pub fn next_real(&mut self) -> f64 {
        self.next_u32() as f64 * (1.0 / 4294967296.0)
    }

    /// Uniform draw from `[0, n)`.
    ///
    /// The modulo bias is part of the replay contract: changing this to a
    /// rejection sampler would change every seeded deal.
    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

impl std::fmt::Debug for Rng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rng(mt19937)")
    }
}
