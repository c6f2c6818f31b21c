//! Random-sampling kernel.
//!
//! Every probabilistic operation in the engine — Dirichlet sampling,
//! multinomial draws, Gaussian CDFs — funnels through one process-wide-style
//! [`Kernel`], seeded deterministically from a string so that two engines
//! built from the same seed draw identical samples.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Which estimator to draw a sample from: a fresh multinomial sampled from
/// the Dirichlet posterior ("Thompson" style), or the posterior mean
/// ("maximum-likelihood" style).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirichletMethod {
    /// Draw one multinomial sampled from the Dirichlet posterior.
    Sampled,
    /// Draw from the posterior mean (expected) multinomial directly.
    Expected,
}

/// Seeded random-sampling kernel used by every model and belief operation.
pub struct Kernel {
    rng: SmallRng,
}

impl Kernel {
    /// Builds a kernel deterministically seeded from a string.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(bap_core::seed_from_str(seed)),
        }
    }

    /// Builds a kernel from a raw `u64`, e.g. for per-thread derivation.
    pub fn from_u64(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform `[0, 1)` draw.
    pub fn uniform01(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform boolean, `p = 0.5`.
    pub fn boolean(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    /// Uniform integer in `[min, max)`.
    pub fn uniform_index(&mut self, min: usize, max: usize) -> usize {
        assert!(min <= max, "uniform_index: min must be <= max");
        if min == max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Samples `Gamma(shape, 1)` via Marsaglia-Tsang (shape >= 1) with a
    /// recursive reduction below 1.
    pub fn gamma(&mut self, shape: f64) -> f64 {
        assert!(shape > 0.0, "gamma shape must be positive");
        if shape < 1.0 {
            let boost = self.uniform01().powf(1.0 / shape);
            return self.gamma(shape + 1.0) * boost;
        }
        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let (x, v) = loop {
                let x = self.standard_normal();
                let v = 1.0 + c * x;
                if v > 0.0 {
                    break (x, v);
                }
            };
            let v = v * v * v;
            let u = self.uniform01();
            let x2 = x * x;
            if u < 1.0 - 0.0331 * x2 * x2 {
                return d * v;
            }
            if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }

    /// Standard normal draw via Box-Muller.
    pub fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.random_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.random();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Samples a probability vector from `Dirichlet(alpha)` by drawing
    /// independent gammas and normalizing. Returns the zero vector if the
    /// gamma sum underflows below [`bap_core::DIRICHLET_UNDERFLOW`] — the
    /// caller must check for this and report [`bap_core::EngineError::NumericUnderflow`].
    pub fn sample_dirichlet(&mut self, alpha: &[f64]) -> Vec<f64> {
        assert!(!alpha.is_empty(), "sample_dirichlet: alpha must be nonempty");
        let draws: Vec<f64> = alpha
            .iter()
            .map(|&a| {
                debug_assert!(a >= 0.0, "dirichlet pseudocount must be nonnegative");
                self.gamma(a.max(f64::MIN_POSITIVE))
            })
            .collect();
        let sum: f64 = draws.iter().sum();
        if sum < bap_core::DIRICHLET_UNDERFLOW {
            return vec![0.0; alpha.len()];
        }
        draws.into_iter().map(|d| d / sum).collect()
    }

    /// Inverse-CDF sample: draws uniform in `[0, total)` and walks the
    /// cumulative sum of `p`, falling back to the last index if
    /// floating-point slack prevents landing exactly.
    pub fn sample_multinomial(&mut self, p: &[f64], total: f64) -> usize {
        assert!(!p.is_empty(), "sample_multinomial: p must be nonempty");
        let draw = self.uniform01() * total;
        let mut cumulative = p[0];
        for (i, &pi) in p.iter().enumerate().skip(1) {
            if draw < cumulative {
                return i - 1;
            }
            cumulative += pi;
        }
        p.len() - 1
    }

    /// Thompson-style composite sample: draw one multinomial sampled from
    /// the Dirichlet(alpha) posterior, then pick an index from it.
    pub fn sample_from_sampled_mult(&mut self, alpha: &[f64]) -> Option<usize> {
        assert!(!alpha.is_empty());
        let mut gamma_draws = Vec::with_capacity(alpha.len());
        let mut sum = 0.0;
        for &a in alpha {
            let g = self.gamma(a.max(f64::MIN_POSITIVE));
            sum += g;
            gamma_draws.push(g);
        }
        if sum < bap_core::DIRICHLET_UNDERFLOW {
            return None;
        }
        Some(self.sample_multinomial(&gamma_draws, sum))
    }

    /// Sample from the posterior mean `alpha / sum(alpha)` without drawing a
    /// fresh multinomial.
    pub fn sample_from_expected_mult(&mut self, alpha: &[f64]) -> Option<usize> {
        assert!(!alpha.is_empty());
        let sum: f64 = alpha.iter().sum();
        if sum < bap_core::DIRICHLET_UNDERFLOW {
            return None;
        }
        Some(self.sample_multinomial(alpha, sum))
    }

    /// Dispatches to either composite sampler by [`DirichletMethod`].
    pub fn sample_dirichlet_index(&mut self, alpha: &[f64], method: DirichletMethod) -> Option<usize> {
        match method {
            DirichletMethod::Sampled => self.sample_from_sampled_mult(alpha),
            DirichletMethod::Expected => self.sample_from_expected_mult(alpha),
        }
    }
}

/// `lgamma(x)` for `x >= 1`, else `0` — the domain's Dirichlet pseudocounts
/// are always `>= 1` in use. Uses the Lanczos approximation (g = 7, n = 9
/// coefficients).
pub fn log_gamma(x: f64) -> f64 {
    if x < 1.0 {
        return 0.0;
    }
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    let x = x - 1.0;
    let mut a = COEFFICIENTS[0];
    let t = x + G + 0.5;
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Error function via the Abramowitz-Stegun 7.1.26 rational approximation
/// (max error ~1.5e-7), used by [`normal_cdf`].
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Normal CDF at `x` with mean `mu`, standard deviation `sigma`, matching
/// `rnd::normal::cdf`.
pub fn normal_cdf(x: f64, mu: f64, sigma: f64) -> f64 {
    0.5 + 0.5 * erf((x - mu) / (sigma * std::f64::consts::SQRT_2))
}

/// Row-major step sizes for a multi-dimensional index space, matching
/// `indexing::stepSize`: `step[i] = prod(dims[i+1..])`.
pub fn step_size(dims: &[usize]) -> Vec<usize> {
    assert!(!dims.is_empty());
    let n = dims.len();
    let mut steps = vec![1; n];
    for i in (0..n - 1).rev() {
        steps[i] = steps[i + 1] * dims[i + 1];
    }
    steps
}

/// Projects a multi-dimensional index tuple down to a single row-major
/// index, matching `indexing::project`.
pub fn project(values: &[usize], dims: &[usize]) -> usize {
    assert_eq!(values.len(), dims.len());
    assert!(!values.is_empty());
    let steps = step_size(dims);
    values.iter().zip(steps.iter()).map(|(v, s)| v * s).sum()
}

/// Inverts [`project`] given precomputed step sizes, matching
/// `indexing::projectUsingStepSize`.
pub fn project_using_step_size(mut index: usize, steps: &[usize]) -> Vec<usize> {
    assert!(!steps.is_empty());
    steps
        .iter()
        .map(|&s| {
            let v = index / s;
            index %= s;
            v
        })
        .collect()
}

/// Inverts [`project`] given dimension sizes directly.
pub fn project_using_dimensions(index: usize, dims: &[usize]) -> Vec<usize> {
    project_using_step_size(index, &step_size(dims))
}

/// Odometer increment: advances the last dimension by one, carrying into
/// earlier dimensions on overflow. Returns `true` if the whole tuple wrapped
/// back to all-zeros (full carry), matching `indexing::increment`.
pub fn increment(values: &mut [usize], dims: &[usize]) -> bool {
    assert_eq!(values.len(), dims.len());
    if values.is_empty() {
        return true;
    }
    let mut i = values.len() - 1;
    loop {
        values[i] += 1;
        if values[i] < dims[i] {
            return false;
        }
        values[i] = 0;
        if i == 0 {
            return true;
        }
        i -= 1;
    }
}
