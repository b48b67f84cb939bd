use std::f64::consts::PI;

/// Source of uniform draws strictly inside (0, 1).
///
/// The engine is generic over this so tests can inject scripted streams and
/// every parallel path can own an independent seeded stream.
pub trait UniformSource {
    fn next_f64(&mut self) -> f64;
}

/// xorshift64* generator. Fast, seedable, and more than adequate for a
/// stylized behavioral model.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl UniformSource for XorShift64 {
    fn next_f64(&mut self) -> f64 {
        // 53-bit mantissa mapping; the +0.5 keeps the result off both ends.
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }
}

/// Seed for one path's private stream. Mixing through splitmix64 makes the
/// streams independent enough that paths can run in parallel while any
/// (seed, path index) pair stays reproducible.
pub fn derive_stream_seed(base_seed: u64, path_index: u32) -> u64 {
    let mixed = base_seed ^ ((path_index as u64) << 32) ^ path_index as u64;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Normal and uniform variates layered over a [`UniformSource`].
#[derive(Debug, Clone)]
pub struct Variates<U: UniformSource> {
    source: U,
    cached_normal: Option<f64>,
}

impl<U: UniformSource> Variates<U> {
    pub fn new(source: U) -> Self {
        Self {
            source,
            cached_normal: None,
        }
    }

    pub fn uniform(&mut self) -> f64 {
        self.source.next_f64()
    }

    pub fn uniform_in(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.source.next_f64()
    }

    /// Uniform integer in `lo..=hi`.
    pub fn uniform_u32_in(&mut self, lo: u32, hi: u32) -> u32 {
        let span = (hi - lo + 1) as f64;
        lo + (self.source.next_f64() * span) as u32
    }

    /// One standard-normal draw via Box–Muller. A first uniform of exactly 0
    /// would hit the logarithm singularity, so non-positive draws are
    /// re-drawn rather than surfaced as errors. The companion variate of
    /// each transform is cached and returned on the next call.
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let mut u1 = self.source.next_f64();
        while u1 <= 0.0 {
            u1 = self.source.next_f64();
        }
        let u2 = self.source.next_f64();

        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.cached_normal = Some(r * theta.sin());
        r * theta.cos()
    }

    /// Companion draw with target correlation `rho` against an existing
    /// variate: `rho * z + sqrt(1 - rho^2) * z_independent`.
    pub fn correlated_normal(&mut self, z: f64, rho: f64) -> f64 {
        rho * z + (1.0 - rho * rho).sqrt() * self.standard_normal()
    }
}

/// Fixed stream of "uniform" draws for unit tests. Panics when exhausted so
/// a test that consumes more draws than it scripted fails loudly.
#[cfg(test)]
pub(crate) struct ScriptedSource {
    draws: Vec<f64>,
    next: usize,
}

#[cfg(test)]
impl ScriptedSource {
    pub(crate) fn new(draws: Vec<f64>) -> Self {
        Self { draws, next: 0 }
    }
}

#[cfg(test)]
impl UniformSource for ScriptedSource {
    fn next_f64(&mut self) -> f64 {
        let value = self.draws[self.next];
        self.next += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_the_same_stream() {
        let mut a = XorShift64::new(42);
        let mut b = XorShift64::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn uniform_draws_stay_strictly_inside_unit_interval() {
        let mut source = XorShift64::new(7);
        for _ in 0..10_000 {
            let u = source.next_f64();
            assert!(u > 0.0 && u < 1.0, "draw out of range: {u}");
        }
    }

    #[test]
    fn zero_seed_is_remapped_to_a_usable_state() {
        let mut source = XorShift64::new(0);
        let u = source.next_f64();
        assert!(u > 0.0 && u < 1.0);
    }

    #[test]
    fn derived_stream_seeds_are_distinct_per_path() {
        let mut seen = std::collections::HashSet::new();
        for path_index in 0..1_000 {
            assert!(seen.insert(derive_stream_seed(99, path_index)));
        }
    }

    #[test]
    fn standard_normal_has_roughly_unit_moments() {
        let mut variates = Variates::new(XorShift64::new(2024));
        let n = 100_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let z = variates.standard_normal();
            assert!(z.is_finite());
            sum += z;
            sum_sq += z * z;
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!(mean.abs() < 0.02, "mean drifted: {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance drifted: {var}");
    }

    #[test]
    fn correlated_normal_hits_the_target_correlation() {
        let rho = 0.7;
        let mut variates = Variates::new(XorShift64::new(11));
        let n = 100_000;
        let (mut sum_a, mut sum_b, mut sum_ab) = (0.0, 0.0, 0.0);
        let (mut sum_a2, mut sum_b2) = (0.0, 0.0);
        for _ in 0..n {
            let a = variates.standard_normal();
            let b = variates.correlated_normal(a, rho);
            sum_a += a;
            sum_b += b;
            sum_ab += a * b;
            sum_a2 += a * a;
            sum_b2 += b * b;
        }
        let n = n as f64;
        let cov = sum_ab / n - (sum_a / n) * (sum_b / n);
        let var_a = sum_a2 / n - (sum_a / n).powi(2);
        let var_b = sum_b2 / n - (sum_b / n).powi(2);
        let corr = cov / (var_a * var_b).sqrt();
        assert!((corr - rho).abs() < 0.02, "correlation drifted: {corr}");
    }

    #[test]
    fn box_muller_redraws_a_zero_uniform() {
        // First draw is the singular 0; the generator must consume it and
        // move on instead of producing a NaN.
        let script = ScriptedSource::new(vec![0.0, 0.5, 0.25]);
        let mut variates = Variates::new(script);
        let z = variates.standard_normal();
        assert!(z.is_finite());
    }

    #[test]
    fn uniform_u32_in_respects_inclusive_bounds() {
        let mut variates = Variates::new(XorShift64::new(3));
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let v = variates.uniform_u32_in(4, 7);
            assert!((4..=7).contains(&v));
            seen[(v - 4) as usize] = true;
        }
        assert!(seen.iter().all(|&hit| hit), "bounds never sampled: {seen:?}");
    }

    #[test]
    fn uniform_in_spans_the_requested_interval() {
        let mut variates = Variates::new(XorShift64::new(5));
        for _ in 0..1_000 {
            let v = variates.uniform_in(-0.50, -0.30);
            assert!((-0.50..-0.30).contains(&v), "out of range: {v}");
        }
    }
}
