//! Parameter-space sampling for dataset creation.
//!
//! A [`ParameterSpace`] lists named bounds. Samplers draw points in the unit
//! cube and scale them into the bounds:
//! - Halton: low-discrepancy, fully deterministic
//! - Latin hypercube: one point per stratum per dimension (seeded)
//! - Uniform: independent uniform draws (seeded)

use emulab_core::ParameterRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("parameter space is empty")]
    EmptySpace,

    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),

    #[error("parameter '{name}' has invalid bounds [{min}, {max}]")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("sample count must be positive")]
    ZeroSamples,

    #[error("read parameter space: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse parameter space TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Inclusive range for one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl ParameterBounds {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    fn scale(&self, unit: f64) -> f64 {
        self.min + unit * (self.max - self.min)
    }
}

/// The full set of sampled parameters, in column order.
///
/// TOML layout:
/// ```toml
/// [[parameters]]
/// name = "omega_m"
/// min = 0.1
/// max = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterBounds>,
}

impl ParameterSpace {
    pub fn new(parameters: Vec<ParameterBounds>) -> Result<Self, SamplingError> {
        let space = Self { parameters };
        space.validate()?;
        Ok(space)
    }

    pub fn from_file(path: &Path) -> Result<Self, SamplingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SamplingError> {
        let space: Self = toml::from_str(content)?;
        space.validate()?;
        Ok(space)
    }

    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.parameters.is_empty() {
            return Err(SamplingError::EmptySpace);
        }
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(SamplingError::DuplicateName(p.name.clone()));
            }
            if !(p.min.is_finite() && p.max.is_finite() && p.min < p.max) {
                return Err(SamplingError::InvalidBounds {
                    name: p.name.clone(),
                    min: p.min,
                    max: p.max,
                });
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.parameters.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// How to place points in the unit cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SamplingMethod {
    /// Halton sequence using the first `d` primes as bases. The first `skip`
    /// indices are dropped; index 0 (the origin) is always dropped.
    Halton { skip: usize },

    LatinHypercube { seed: u64 },

    Uniform { seed: u64 },
}

impl Default for SamplingMethod {
    fn default() -> Self {
        SamplingMethod::Halton { skip: 0 }
    }
}

/// Sampled points with their parameter names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub names: Vec<String>,
    pub points: Vec<Vec<f64>>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point `i` as a name -> value record.
    pub fn record(&self, i: usize) -> ParameterRecord {
        self.names
            .iter()
            .cloned()
            .zip(self.points[i].iter().copied())
            .collect()
    }

    /// BLAKE3 over names and point bit patterns.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.names {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for point in &self.points {
            for v in point {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Draw `n` points from `space`.
pub fn sample(
    space: &ParameterSpace,
    n: usize,
    method: SamplingMethod,
) -> Result<SampleSet, SamplingError> {
    space.validate()?;
    if n == 0 {
        return Err(SamplingError::ZeroSamples);
    }
    let d = space.dimension();

    let unit = match method {
        SamplingMethod::Halton { skip } => halton(n, d, skip),
        SamplingMethod::LatinHypercube { seed } => latin_hypercube(n, d, seed),
        SamplingMethod::Uniform { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..n)
                .map(|_| (0..d).map(|_| rng.gen::<f64>()).collect())
                .collect()
        }
    };

    let points = unit
        .into_iter()
        .map(|u: Vec<f64>| {
            u.iter()
                .zip(&space.parameters)
                .map(|(&x, bounds)| bounds.scale(x))
                .collect()
        })
        .collect();

    Ok(SampleSet {
        names: space.names(),
        points,
    })
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Van der Corput radical inverse of `index` in `base`.
fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;
    while index > 0 {
        result += (index % base) as f64 * factor;
        index /= base;
        factor *= inv_base;
    }
    result
}

fn halton(n: usize, d: usize, skip: usize) -> Vec<Vec<f64>> {
    let bases = first_primes(d);
    (0..n)
        .map(|i| {
            let index = (i + skip + 1) as u64;
            bases.iter().map(|&b| radical_inverse(index, b)).collect()
        })
        .collect()
}

fn latin_hypercube(n: usize, d: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = vec![vec![0.0; d]; n];
    for j in 0..d {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(&mut rng);
        for (i, &stratum) in strata.iter().enumerate() {
            let jitter: f64 = rng.gen();
            points[i][j] = (stratum as f64 + jitter) / n as f64;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_2d() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterBounds::new("omega_m", 0.1, 0.5),
            ParameterBounds::new("h", 0.6, 0.8),
        ])
        .unwrap()
    }

    #[test]
    fn primes_are_correct() {
        assert_eq!(first_primes(6), vec![2, 3, 5, 7, 11, 13]);
    }

    #[test]
    fn radical_inverse_base_two() {
        assert_eq!(radical_inverse(1, 2), 0.5);
        assert_eq!(radical_inverse(2, 2), 0.25);
        assert_eq!(radical_inverse(3, 2), 0.75);
        assert!((radical_inverse(1, 3) - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn halton_is_deterministic_and_in_bounds() {
        let space = space_2d();
        let a = sample(&space, 64, SamplingMethod::Halton { skip: 0 }).unwrap();
        let b = sample(&space, 64, SamplingMethod::Halton { skip: 0 }).unwrap();
        assert_eq!(a, b);
        for p in &a.points {
            assert!((0.1..=0.5).contains(&p[0]));
            assert!((0.6..=0.8).contains(&p[1]));
        }
    }

    #[test]
    fn halton_skip_shifts_sequence() {
        let space = space_2d();
        let full = sample(&space, 10, SamplingMethod::Halton { skip: 0 }).unwrap();
        let skipped = sample(&space, 5, SamplingMethod::Halton { skip: 5 }).unwrap();
        assert_eq!(&full.points[5..], &skipped.points[..]);
    }

    #[test]
    fn latin_hypercube_fills_every_stratum() {
        let space = space_2d();
        let n = 20;
        let set = sample(&space, n, SamplingMethod::LatinHypercube { seed: 7 }).unwrap();
        for (j, bounds) in space.parameters.iter().enumerate() {
            let mut strata: Vec<usize> = set
                .points
                .iter()
                .map(|p| {
                    let unit = (p[j] - bounds.min) / (bounds.max - bounds.min);
                    ((unit * n as f64).floor() as usize).min(n - 1)
                })
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn seeded_methods_are_reproducible() {
        let space = space_2d();
        let a = sample(&space, 8, SamplingMethod::Uniform { seed: 3 }).unwrap();
        let b = sample(&space, 8, SamplingMethod::Uniform { seed: 3 }).unwrap();
        let c = sample(&space, 8, SamplingMethod::Uniform { seed: 4 }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn record_pairs_names_with_values() {
        let set = sample(&space_2d(), 3, SamplingMethod::default()).unwrap();
        let rec = set.record(1);
        assert_eq!(rec.get("omega_m"), Some(set.points[1][0]));
        assert_eq!(rec.get("h"), Some(set.points[1][1]));
    }

    #[test]
    fn invalid_spaces_are_rejected() {
        assert!(matches!(
            ParameterSpace::new(vec![]),
            Err(SamplingError::EmptySpace)
        ));
        assert!(matches!(
            ParameterSpace::new(vec![
                ParameterBounds::new("a", 0.0, 1.0),
                ParameterBounds::new("a", 0.0, 2.0),
            ]),
            Err(SamplingError::DuplicateName(_))
        ));
        assert!(matches!(
            ParameterSpace::new(vec![ParameterBounds::new("a", 1.0, 1.0)]),
            Err(SamplingError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(matches!(
            sample(&space_2d(), 0, SamplingMethod::default()),
            Err(SamplingError::ZeroSamples)
        ));
    }

    #[test]
    fn toml_space_parses() {
        let space = ParameterSpace::from_toml(
            r#"
[[parameters]]
name = "omega_m"
min = 0.1
max = 0.5

[[parameters]]
name = "sigma_8"
min = 0.6
max = 1.0
"#,
        )
        .unwrap();
        assert_eq!(space.names(), vec!["omega_m", "sigma_8"]);
    }
}
