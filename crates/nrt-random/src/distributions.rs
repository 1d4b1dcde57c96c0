use nrt_dtype::Scalar;

use crate::{RandomError, RandomState};

/// Largest mean the PTRS sampler accepts without overflowing `i64`.
const POISSON_LAM_MAX: f64 = 9.223_372_006_484_771e18;
const GEOMETRIC_SEARCH_CUTOFF: f64 = 1.0 / 3.0;
const BINOMIAL_INVERSION_CUTOFF: f64 = 30.0;
const POISSON_PTRS_CUTOFF: f64 = 10.0;

const LOGGAM_COEFFS: [f64; 10] = [
    8.333_333_333_333_333e-02,
    -2.777_777_777_777_778e-03,
    7.936_507_936_507_937e-04,
    -5.952_380_952_380_952e-04,
    8.417_508_417_508_418e-04,
    -1.917_526_917_526_918e-03,
    6.410_256_410_256_410e-03,
    -2.955_065_359_477_124e-02,
    1.796_443_723_688_307e-01,
    -1.392_432_216_905_90e+00,
];

/// Distributions reachable through [`RandomState::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    Random,
    Uniform,
    Randint,
    Normal,
    StandardNormal,
    Exponential,
    StandardExponential,
    Gamma,
    StandardGamma,
    Beta,
    Chisquare,
    Binomial,
    Poisson,
    Geometric,
    Laplace,
    Logistic,
    Lognormal,
    Gumbel,
    Pareto,
    Power,
    Rayleigh,
    StandardCauchy,
    Triangular,
    Weibull,
}

impl Distribution {
    pub const ALL: [Self; 24] = [
        Self::Random,
        Self::Uniform,
        Self::Randint,
        Self::Normal,
        Self::StandardNormal,
        Self::Exponential,
        Self::StandardExponential,
        Self::Gamma,
        Self::StandardGamma,
        Self::Beta,
        Self::Chisquare,
        Self::Binomial,
        Self::Poisson,
        Self::Geometric,
        Self::Laplace,
        Self::Logistic,
        Self::Lognormal,
        Self::Gumbel,
        Self::Pareto,
        Self::Power,
        Self::Rayleigh,
        Self::StandardCauchy,
        Self::Triangular,
        Self::Weibull,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Uniform => "uniform",
            Self::Randint => "randint",
            Self::Normal => "normal",
            Self::StandardNormal => "standard_normal",
            Self::Exponential => "exponential",
            Self::StandardExponential => "standard_exponential",
            Self::Gamma => "gamma",
            Self::StandardGamma => "standard_gamma",
            Self::Beta => "beta",
            Self::Chisquare => "chisquare",
            Self::Binomial => "binomial",
            Self::Poisson => "poisson",
            Self::Geometric => "geometric",
            Self::Laplace => "laplace",
            Self::Logistic => "logistic",
            Self::Lognormal => "lognormal",
            Self::Gumbel => "gumbel",
            Self::Pareto => "pareto",
            Self::Power => "power",
            Self::Rayleigh => "rayleigh",
            Self::StandardCauchy => "standard_cauchy",
            Self::Triangular => "triangular",
            Self::Weibull => "weibull",
        }
    }

    /// Accepts the canonical names plus `random_sample`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "random_sample" => Some(Self::Random),
            other => Self::ALL.into_iter().find(|dist| dist.name() == other),
        }
    }
}

fn ensure(ok: bool, name: &'static str, detail: &'static str) -> Result<(), RandomError> {
    if ok {
        Ok(())
    } else {
        Err(RandomError::InvalidParameter { name, detail })
    }
}

fn integral(value: f64, name: &'static str, what: &'static str) -> Result<i64, RandomError> {
    ensure(
        value.is_finite() && value.fract() == 0.0 && value.abs() < 9.2e18,
        name,
        what,
    )?;
    Ok(value as i64)
}

/// `ln(Γ(x))` by the Stirling series, shifted up to 7 for small arguments.
fn loggam(x: f64) -> f64 {
    if x == 1.0 || x == 2.0 {
        return 0.0;
    }
    let shift = if x <= 7.0 { (7.0 - x) as i64 } else { 0 };
    let mut x0 = x + shift as f64;
    let x2 = 1.0 / (x0 * x0);
    let mut gl0 = LOGGAM_COEFFS[9];
    for coeff in LOGGAM_COEFFS[..9].iter().rev() {
        gl0 = gl0 * x2 + coeff;
    }
    let mut gl =
        gl0 / x0 + 0.5 * std::f64::consts::TAU.ln() + (x0 - 0.5) * x0.ln() - x0;
    for _ in 0..shift {
        gl -= (x0 - 1.0).ln();
        x0 -= 1.0;
    }
    gl
}

impl RandomState {
    /// Name-based front door. Parameters are positional with the usual
    /// trailing defaults (`normal()` is `normal(0, 1)`); integer-valued
    /// results come back as `int64` scalars.
    pub fn draw(
        &mut self,
        name: &str,
        params: &[f64],
        size: Option<&[usize]>,
    ) -> Result<Scalar, RandomError> {
        if let Some(size) = size {
            return Err(RandomError::SizeUnsupported(size.to_vec()));
        }
        let dist =
            Distribution::parse(name).ok_or_else(|| RandomError::UnknownDistribution(name.to_string()))?;
        let float = Scalar::F64;
        let int = Scalar::I64;
        Ok(match (dist, params) {
            (Distribution::Random, []) => float(self.random()),
            (Distribution::Uniform, []) => float(self.uniform(0.0, 1.0)?),
            (Distribution::Uniform, &[low]) => float(self.uniform(low, 1.0)?),
            (Distribution::Uniform, &[low, high]) => float(self.uniform(low, high)?),
            (Distribution::Randint, &[high]) => {
                int(self.randint(0, integral(high, "randint", "high must be an integer")?)?)
            }
            (Distribution::Randint, &[low, high]) => int(self.randint(
                integral(low, "randint", "low must be an integer")?,
                integral(high, "randint", "high must be an integer")?,
            )?),
            (Distribution::Normal, []) => float(self.normal(0.0, 1.0)?),
            (Distribution::Normal, &[loc]) => float(self.normal(loc, 1.0)?),
            (Distribution::Normal, &[loc, scale]) => float(self.normal(loc, scale)?),
            (Distribution::StandardNormal, []) => float(self.standard_normal()),
            (Distribution::Exponential, []) => float(self.exponential(1.0)?),
            (Distribution::Exponential, &[scale]) => float(self.exponential(scale)?),
            (Distribution::StandardExponential, []) => float(self.standard_exponential()),
            (Distribution::Gamma, &[shape]) => float(self.gamma(shape, 1.0)?),
            (Distribution::Gamma, &[shape, scale]) => float(self.gamma(shape, scale)?),
            (Distribution::StandardGamma, &[shape]) => float(self.standard_gamma(shape)?),
            (Distribution::Beta, &[a, b]) => float(self.beta(a, b)?),
            (Distribution::Chisquare, &[df]) => float(self.chisquare(df)?),
            (Distribution::Binomial, &[n, p]) => int(self.binomial(
                integral(n, "binomial", "n must be an integer")?,
                p,
            )?),
            (Distribution::Poisson, []) => int(self.poisson(1.0)?),
            (Distribution::Poisson, &[lam]) => int(self.poisson(lam)?),
            (Distribution::Geometric, &[p]) => int(self.geometric(p)?),
            (Distribution::Laplace, []) => float(self.laplace(0.0, 1.0)?),
            (Distribution::Laplace, &[loc]) => float(self.laplace(loc, 1.0)?),
            (Distribution::Laplace, &[loc, scale]) => float(self.laplace(loc, scale)?),
            (Distribution::Logistic, []) => float(self.logistic(0.0, 1.0)?),
            (Distribution::Logistic, &[loc]) => float(self.logistic(loc, 1.0)?),
            (Distribution::Logistic, &[loc, scale]) => float(self.logistic(loc, scale)?),
            (Distribution::Lognormal, []) => float(self.lognormal(0.0, 1.0)?),
            (Distribution::Lognormal, &[mean]) => float(self.lognormal(mean, 1.0)?),
            (Distribution::Lognormal, &[mean, sigma]) => float(self.lognormal(mean, sigma)?),
            (Distribution::Gumbel, []) => float(self.gumbel(0.0, 1.0)?),
            (Distribution::Gumbel, &[loc]) => float(self.gumbel(loc, 1.0)?),
            (Distribution::Gumbel, &[loc, scale]) => float(self.gumbel(loc, scale)?),
            (Distribution::Pareto, &[a]) => float(self.pareto(a)?),
            (Distribution::Power, &[a]) => float(self.power(a)?),
            (Distribution::Rayleigh, []) => float(self.rayleigh(1.0)?),
            (Distribution::Rayleigh, &[scale]) => float(self.rayleigh(scale)?),
            (Distribution::StandardCauchy, []) => float(self.standard_cauchy()),
            (Distribution::Triangular, &[left, mode, right]) => {
                float(self.triangular(left, mode, right)?)
            }
            (Distribution::Weibull, &[a]) => float(self.weibull(a)?),
            (dist, params) => {
                return Err(RandomError::ParameterCount {
                    name: dist.name(),
                    count: params.len(),
                });
            }
        })
    }

    /// Double in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.engine().next_f64()
    }

    pub fn uniform(&mut self, low: f64, high: f64) -> Result<f64, RandomError> {
        ensure(
            low.is_finite() && high.is_finite() && (high - low).is_finite(),
            "uniform",
            "range must be finite",
        )?;
        Ok(low + (high - low) * self.random())
    }

    /// Integer in `[low, high)`.
    pub fn randint(&mut self, low: i64, high: i64) -> Result<i64, RandomError> {
        ensure(low < high, "randint", "low must be less than high")?;
        let span = (i128::from(high) - i128::from(low) - 1) as u64;
        let offset = self.engine().interval(span);
        Ok((i128::from(low) + i128::from(offset)) as i64)
    }

    /// Polar Marsaglia; every other call returns the cached partner.
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(cached) = self.gauss.take() {
            return cached;
        }
        let engine = self.engine();
        let (x1, x2, r2) = loop {
            let x1 = 2.0 * engine.next_f64() - 1.0;
            let x2 = 2.0 * engine.next_f64() - 1.0;
            let r2 = x1 * x1 + x2 * x2;
            if r2 < 1.0 && r2 != 0.0 {
                break (x1, x2, r2);
            }
        };
        let f = (-2.0 * r2.ln() / r2).sqrt();
        self.gauss = Some(f * x1);
        f * x2
    }

    pub fn normal(&mut self, loc: f64, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "normal", "scale must be non-negative")?;
        Ok(loc + scale * self.standard_normal())
    }

    pub fn standard_exponential(&mut self) -> f64 {
        -(1.0 - self.random()).ln()
    }

    pub fn exponential(&mut self, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "exponential", "scale must be non-negative")?;
        Ok(scale * self.standard_exponential())
    }

    pub fn standard_gamma(&mut self, shape: f64) -> Result<f64, RandomError> {
        ensure(shape >= 0.0, "standard_gamma", "shape must be non-negative")?;
        Ok(self.sample_standard_gamma(shape))
    }

    pub fn gamma(&mut self, shape: f64, scale: f64) -> Result<f64, RandomError> {
        ensure(shape >= 0.0, "gamma", "shape must be non-negative")?;
        ensure(scale >= 0.0, "gamma", "scale must be non-negative")?;
        Ok(scale * self.sample_standard_gamma(shape))
    }

    /// Marsaglia-Tsang for `shape > 1`, Johnk-style rejection below.
    fn sample_standard_gamma(&mut self, shape: f64) -> f64 {
        if shape == 1.0 {
            return self.standard_exponential();
        }
        if shape == 0.0 {
            return 0.0;
        }
        if shape < 1.0 {
            loop {
                let u = self.random();
                let v = self.standard_exponential();
                if u <= 1.0 - shape {
                    let x = u.powf(1.0 / shape);
                    if x <= v {
                        return x;
                    }
                } else {
                    let y = -((1.0 - u) / shape).ln();
                    let x = (1.0 - shape + shape * y).powf(1.0 / shape);
                    if x <= v + y {
                        return x;
                    }
                }
            }
        }
        let b = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * b).sqrt();
        loop {
            let (x, v) = loop {
                let x = self.standard_normal();
                let v = 1.0 + c * x;
                if v > 0.0 {
                    break (x, v * v * v);
                }
            };
            let u = self.random();
            if u < 1.0 - 0.0331 * (x * x) * (x * x) {
                return b * v;
            }
            if u.ln() < 0.5 * x * x + b * (1.0 - v + v.ln()) {
                return b * v;
            }
        }
    }

    pub fn beta(&mut self, a: f64, b: f64) -> Result<f64, RandomError> {
        ensure(a > 0.0, "beta", "a must be positive")?;
        ensure(b > 0.0, "beta", "b must be positive")?;
        if a <= 1.0 && b <= 1.0 {
            loop {
                let u = self.random();
                let v = self.random();
                let x = u.powf(1.0 / a);
                let y = v.powf(1.0 / b);
                let sum = x + y;
                if sum <= 1.0 && sum > 0.0 {
                    return Ok(x / sum);
                }
                if sum <= 1.0 && u + v > 0.0 {
                    // Both powers underflowed; compare in log space.
                    let log_x = u.ln() / a;
                    let log_y = v.ln() / b;
                    let log_m = log_x.max(log_y);
                    let (log_x, log_y) = (log_x - log_m, log_y - log_m);
                    return Ok((log_x - (log_x.exp() + log_y.exp()).ln()).exp());
                }
            }
        }
        let ga = self.sample_standard_gamma(a);
        let gb = self.sample_standard_gamma(b);
        Ok(ga / (ga + gb))
    }

    pub fn chisquare(&mut self, df: f64) -> Result<f64, RandomError> {
        ensure(df > 0.0, "chisquare", "df must be positive")?;
        Ok(2.0 * self.sample_standard_gamma(df / 2.0))
    }

    /// Inversion while `n * min(p, 1 - p) <= 30`, BTPE above.
    pub fn binomial(&mut self, n: i64, p: f64) -> Result<i64, RandomError> {
        ensure(n >= 0, "binomial", "n must be non-negative")?;
        ensure((0.0..=1.0).contains(&p), "binomial", "p must lie in [0, 1]")?;
        if n == 0 || p == 0.0 {
            return Ok(0);
        }
        let trials = n as f64;
        Ok(if p <= 0.5 {
            if p * trials <= BINOMIAL_INVERSION_CUTOFF {
                self.binomial_inversion(n, p)
            } else {
                self.binomial_btpe(n, p)
            }
        } else {
            let q = 1.0 - p;
            if q * trials <= BINOMIAL_INVERSION_CUTOFF {
                n - self.binomial_inversion(n, q)
            } else {
                n - self.binomial_btpe(n, q)
            }
        })
    }

    fn binomial_inversion(&mut self, n: i64, p: f64) -> i64 {
        let trials = n as f64;
        let q = 1.0 - p;
        let qn = (trials * q.ln()).exp();
        let np = trials * p;
        let bound = trials.min(np + 10.0 * (np * q + 1.0).sqrt());
        let mut x = 0i64;
        let mut px = qn;
        let mut u = self.random();
        while u > px {
            x += 1;
            if x as f64 > bound {
                x = 0;
                px = qn;
                u = self.random();
            } else {
                u -= px;
                px = ((n - x + 1) as f64 * p * px) / (x as f64 * q);
            }
        }
        x
    }

    /// Kachitvichyanukul-Schmeiser BTPE for `p <= 0.5`.
    fn binomial_btpe(&mut self, n: i64, p: f64) -> i64 {
        let trials = n as f64;
        let r = p;
        let q = 1.0 - r;
        let fm = trials * r + r;
        let m = fm.floor();
        let p1 = (2.195 * (trials * r * q).sqrt() - 4.6 * q).floor() + 0.5;
        let xm = m + 0.5;
        let xl = xm - p1;
        let xr = xm + p1;
        let c = 0.134 + 20.5 / (15.3 + m);
        let a = (fm - xl) / (fm - xl * r);
        let lam_l = a * (1.0 + a / 2.0);
        let a = (xr - fm) / (xr * q);
        let lam_r = a * (1.0 + a / 2.0);
        let p2 = p1 * (1.0 + 2.0 * c);
        let p3 = p2 + c / lam_l;
        let p4 = p3 + c / lam_r;
        let nrq = trials * r * q;

        loop {
            let u = self.random() * p4;
            let mut v = self.random();
            if u <= p1 {
                return (xm - p1 * v + u).floor() as i64;
            }
            let y = if u <= p2 {
                let x = xl + (u - p1) / c;
                v = v * c + 1.0 - (m - x + 0.5).abs() / p1;
                if v > 1.0 {
                    continue;
                }
                x.floor()
            } else if u <= p3 {
                let y = (xl + v.ln() / lam_l).floor();
                if y < 0.0 || v == 0.0 {
                    continue;
                }
                v *= (u - p2) * lam_l;
                y
            } else {
                let y = (xr - v.ln() / lam_r).floor();
                if y > trials || v == 0.0 {
                    continue;
                }
                v *= (u - p3) * lam_r;
                y
            };

            let k = (y - m).abs();
            if k <= 20.0 || k >= nrq / 2.0 - 1.0 {
                // Explicit ratio of successive probabilities.
                let s = r / q;
                let a = s * (trials + 1.0);
                let mut f = 1.0;
                if m < y {
                    let mut i = m + 1.0;
                    while i <= y {
                        f *= a / i - s;
                        i += 1.0;
                    }
                } else if m > y {
                    let mut i = y + 1.0;
                    while i <= m {
                        f /= a / i - s;
                        i += 1.0;
                    }
                }
                if v > f {
                    continue;
                }
                return y as i64;
            }

            // Squeeze on ln(f(y)/f(m)), then the Stirling bound.
            let rho = (k / nrq) * ((k * (k / 3.0 + 0.625) + 0.166_666_666_666_6) / nrq + 0.5);
            let t = -k * k / (2.0 * nrq);
            let log_v = v.ln();
            if log_v < t - rho {
                return y as i64;
            }
            if log_v > t + rho {
                continue;
            }
            let x1 = y + 1.0;
            let f1 = m + 1.0;
            let z = trials + 1.0 - m;
            let w = trials - y + 1.0;
            let stirling = |v: f64| {
                let v2 = v * v;
                (13_680.0 - (462.0 - (132.0 - (99.0 - 140.0 / v2) / v2) / v2) / v2) / v / 166_320.0
            };
            let bound = xm * (f1 / x1).ln()
                + (trials - m + 0.5) * (z / w).ln()
                + (y - m) * (w * r / (x1 * q)).ln()
                + stirling(f1)
                + stirling(z)
                + stirling(x1)
                + stirling(w);
            if log_v > bound {
                continue;
            }
            return y as i64;
        }
    }

    /// Multiplication below `lam = 10`, Hormann's PTRS above.
    pub fn poisson(&mut self, lam: f64) -> Result<i64, RandomError> {
        ensure(lam >= 0.0, "poisson", "lam must be non-negative")?;
        ensure(lam < POISSON_LAM_MAX, "poisson", "lam is too large")?;
        if lam >= POISSON_PTRS_CUTOFF {
            return Ok(self.poisson_ptrs(lam));
        }
        if lam == 0.0 {
            return Ok(0);
        }
        let enlam = (-lam).exp();
        let mut x = 0i64;
        let mut prod = 1.0;
        loop {
            prod *= self.random();
            if prod > enlam {
                x += 1;
            } else {
                return Ok(x);
            }
        }
    }

    fn poisson_ptrs(&mut self, lam: f64) -> i64 {
        let slam = lam.sqrt();
        let loglam = lam.ln();
        let b = 0.931 + 2.53 * slam;
        let a = -0.059 + 0.024_83 * b;
        let invalpha = 1.1239 + 1.1328 / (b - 3.4);
        let vr = 0.9277 - 3.6224 / (b - 2.0);
        loop {
            let u = self.random() - 0.5;
            let v = self.random();
            let us = 0.5 - u.abs();
            let k = ((2.0 * a / us + b) * u + lam + 0.43).floor();
            if us >= 0.07 && v <= vr {
                return k as i64;
            }
            if k < 0.0 || (us < 0.013 && v > us) {
                continue;
            }
            if v.ln() + invalpha.ln() - (a / (us * us) + b).ln()
                <= -lam + k * loglam - loggam(k + 1.0)
            {
                return k as i64;
            }
        }
    }

    /// Trials up to and including the first success.
    pub fn geometric(&mut self, p: f64) -> Result<i64, RandomError> {
        ensure(p > 0.0 && p <= 1.0, "geometric", "p must lie in (0, 1]")?;
        if p >= GEOMETRIC_SEARCH_CUTOFF {
            let q = 1.0 - p;
            let mut x = 1i64;
            let mut prod = p;
            let mut sum = p;
            let u = self.random();
            while u > sum {
                prod *= q;
                sum += prod;
                x += 1;
            }
            return Ok(x);
        }
        let u = self.random();
        Ok(((-u).ln_1p() / (1.0 - p).ln()).ceil() as i64)
    }

    pub fn laplace(&mut self, loc: f64, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "laplace", "scale must be non-negative")?;
        loop {
            let u = self.random();
            if u >= 0.5 {
                return Ok(loc - scale * (2.0 - u - u).ln());
            }
            if u > 0.0 {
                return Ok(loc + scale * (u + u).ln());
            }
        }
    }

    pub fn logistic(&mut self, loc: f64, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "logistic", "scale must be non-negative")?;
        loop {
            let u = self.random();
            if u > 0.0 {
                return Ok(loc + scale * (u / (1.0 - u)).ln());
            }
        }
    }

    pub fn lognormal(&mut self, mean: f64, sigma: f64) -> Result<f64, RandomError> {
        ensure(sigma >= 0.0, "lognormal", "sigma must be non-negative")?;
        Ok((mean + sigma * self.standard_normal()).exp())
    }

    pub fn gumbel(&mut self, loc: f64, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "gumbel", "scale must be non-negative")?;
        loop {
            let u = 1.0 - self.random();
            if u < 1.0 {
                return Ok(loc - scale * (-u.ln()).ln());
            }
        }
    }

    /// Lomax form: support starts at 0.
    pub fn pareto(&mut self, a: f64) -> Result<f64, RandomError> {
        ensure(a > 0.0, "pareto", "a must be positive")?;
        Ok((self.standard_exponential() / a).exp_m1())
    }

    pub fn power(&mut self, a: f64) -> Result<f64, RandomError> {
        ensure(a > 0.0, "power", "a must be positive")?;
        Ok((-(-self.standard_exponential()).exp_m1()).powf(1.0 / a))
    }

    pub fn rayleigh(&mut self, scale: f64) -> Result<f64, RandomError> {
        ensure(scale >= 0.0, "rayleigh", "scale must be non-negative")?;
        Ok(scale * (2.0 * self.standard_exponential()).sqrt())
    }

    pub fn standard_cauchy(&mut self) -> f64 {
        let numerator = self.standard_normal();
        numerator / self.standard_normal()
    }

    pub fn triangular(&mut self, left: f64, mode: f64, right: f64) -> Result<f64, RandomError> {
        ensure(left <= mode, "triangular", "left must not exceed mode")?;
        ensure(mode <= right, "triangular", "mode must not exceed right")?;
        ensure(left < right, "triangular", "left must be less than right")?;
        let base = right - left;
        let left_base = mode - left;
        let ratio = left_base / base;
        let left_prod = left_base * base;
        let right_prod = (right - mode) * base;
        let u = self.random();
        Ok(if u <= ratio {
            left + (u * left_prod).sqrt()
        } else {
            right - ((1.0 - u) * right_prod).sqrt()
        })
    }

    pub fn weibull(&mut self, a: f64) -> Result<f64, RandomError> {
        ensure(a >= 0.0, "weibull", "a must be non-negative")?;
        if a == 0.0 {
            return Ok(0.0);
        }
        Ok(self.standard_exponential().powf(1.0 / a))
    }
}
