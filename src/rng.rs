use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Random source owned by a session.
///
/// Seeded from the thread RNG unless a seed is given, so regular play is
/// unpredictable while tests and `--seed` runs are reproducible.
#[derive(Debug, Clone)]
pub struct SessionRng {
    inner: Pcg32,
}

impl SessionRng {
    pub fn new() -> Self {
        Self::seeded(rand::thread_rng().gen())
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn from_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::seeded)
    }

    /// Uniform value in `[0, 1)`
    pub fn unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform value in `[lo, hi)`; returns `lo` for an empty range
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..hi)
    }

    /// Uniform index in `0..n`. `n` must be non-zero.
    pub fn index(&mut self, n: usize) -> usize {
        self.inner.gen_range(0..n)
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.index(items.len())])
        }
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }

    /// Four digit id used to label session reports
    pub fn session_id(&mut self) -> u32 {
        self.inner.gen_range(1000..=9999)
    }
}

impl Default for SessionRng {
    fn default() -> Self {
        Self::new()
    }
}
