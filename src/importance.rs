use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CbnError, Result};
use crate::model::Model;
use crate::observations::Observations;
use crate::rng::RngContext;
use crate::sampler::{SamplingTimes, hamming_dist_mat, sample_genotypes};
use crate::workers::map_observations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proposal {
    Forward,
    Rejection,
}

impl Proposal {
    pub fn as_str(self) -> &'static str {
        match self {
            Proposal::Forward => "forward",
            Proposal::Rejection => "rejection",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportanceSample {
    pub weights: Array1<f64>,
    pub dist: Vec<usize>,
    pub time_diffs: Array2<f64>,
    /// The rejection pool had zero emission mass and was resampled uniformly.
    pub random_fallback: bool,
}

impl ImportanceSample {
    pub fn len(&self) -> usize {
        self.dist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.sum()
    }

    pub fn log_mean_weight(&self) -> f64 {
        (self.weight_sum() / self.len() as f64).ln()
    }

    // Normalised weights can sum to slightly more than 1; the result stays
    // within [0, p].
    pub fn expected_dist(&self) -> f64 {
        let w = self.normalised_weights();
        let p = self.time_diffs.ncols() as f64;
        self.dist
            .iter()
            .zip(w.iter())
            .map(|(&d, &wi)| d as f64 * wi)
            .sum::<f64>()
            .clamp(0.0, p)
    }

    pub fn expected_time_diffs(&self) -> Array1<f64> {
        let w = self.normalised_weights();
        self.time_diffs.t().dot(&w)
    }

    // A zero weight sum happens under the forward proposal with epsilon = 0
    // when no draw matches the observation exactly; the draws then count
    // equally.
    fn normalised_weights(&self) -> Array1<f64> {
        let sum = self.weight_sum();
        if sum > 0.0 && sum.is_finite() {
            &self.weights / sum
        } else {
            debug!(
                n_samples = self.len(),
                "importance weights sum to {sum}; using the unweighted mean"
            );
            Array1::from_elem(self.len(), 1.0 / self.len() as f64)
        }
    }
}

fn xlogy(n: usize, x: f64) -> f64 {
    if n == 0 { 0.0 } else { n as f64 * x.ln() }
}

/// `epsilon == 0` with a nonzero distance is shifted by `f64::EPSILON`.
pub fn log_bernoulli(dist: usize, epsilon: f64, p: usize) -> f64 {
    let dist = dist.min(p);
    let (e, q) = if epsilon == 0.0 && dist != 0 {
        (epsilon + f64::EPSILON, 1.0 - epsilon - f64::EPSILON)
    } else {
        (epsilon, 1.0 - epsilon)
    };
    xlogy(dist, e) + xlogy(p - dist, q)
}

pub fn log_bernoulli_process(dist: &[usize], epsilon: f64, p: usize) -> Vec<f64> {
    dist.iter().map(|&d| log_bernoulli(d, epsilon, p)).collect()
}

pub fn emission_probability(dist: usize, epsilon: f64, p: usize) -> f64 {
    let dist = dist.min(p);
    epsilon.powi(dist as i32) * (1.0 - epsilon).powi((p - dist) as i32)
}

pub fn importance_weight<R: Rng + ?Sized>(
    genotype: ArrayView1<'_, bool>,
    time: Option<f64>,
    model: &Model,
    n_samples: usize,
    proposal: Proposal,
    rng: &mut R,
) -> Result<ImportanceSample> {
    let p = model.n_events();
    if genotype.len() != p {
        return Err(CbnError::dimension("genotype", p, genotype.len()));
    }
    if n_samples == 0 {
        return Err(CbnError::invalid("number of importance samples must be >= 1"));
    }
    let times = match time {
        Some(t) => SamplingTimes::Constant(t),
        None => SamplingTimes::Latent,
    };
    let epsilon = model.epsilon();

    match proposal {
        Proposal::Forward => {
            let draws = sample_genotypes(n_samples, model, times, rng)?;
            let dist = hamming_dist_mat(draws.genotypes.view(), genotype);
            let weights = dist
                .iter()
                .map(|&d| emission_probability(d, epsilon, p))
                .collect::<Array1<f64>>();
            Ok(ImportanceSample {
                weights,
                dist,
                time_diffs: draws.time_diffs,
                random_fallback: false,
            })
        }
        Proposal::Rejection => {
            let pool_size = p.max(1) * n_samples;
            let pool = sample_genotypes(pool_size, model, times, rng)?;
            let dist_pool = hamming_dist_mat(pool.genotypes.view(), genotype);
            let q: Vec<f64> = dist_pool
                .iter()
                .map(|&d| emission_probability(d, epsilon, p))
                .collect();
            let q_sum: f64 = q.iter().sum();
            let random_fallback = !(q_sum > 0.0);

            let index = if random_fallback {
                None
            } else {
                Some(WeightedIndex::new(&q).map_err(|e| {
                    CbnError::sampling(format!("resampling weights: {e}"))
                })?)
            };

            let mut dist = Vec::with_capacity(n_samples);
            let mut time_diffs = Array2::<f64>::zeros((n_samples, p));
            for l in 0..n_samples {
                let idx = match &index {
                    Some(w) => w.sample(rng),
                    None => rng.gen_range(0..pool_size),
                };
                dist.push(dist_pool[idx]);
                time_diffs.row_mut(l).assign(&pool.time_diffs.row(idx));
            }

            let weights = if random_fallback {
                debug!(
                    pool_size,
                    epsilon, "no candidate in the rejection pool is compatible; resampled uniformly"
                );
                log_bernoulli_process(&dist, epsilon, p)
                    .into_iter()
                    .map(f64::exp)
                    .collect::<Array1<f64>>()
            } else {
                Array1::from_elem(n_samples, q_sum / pool_size as f64)
            };

            Ok(ImportanceSample {
                weights,
                dist,
                time_diffs,
                random_fallback,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpectedStatistics {
    pub weight_sums: Vec<f64>,
    pub dist: Vec<f64>,
    pub time_diffs: Array2<f64>,
}

struct ObservationStatistics {
    weight_sum: f64,
    dist: f64,
    time_diffs: Array1<f64>,
}

pub fn expected_statistics(
    observations: &Observations,
    model: &Model,
    n_samples: usize,
    proposal: Proposal,
    pool: &ThreadPool,
    ctx: &mut RngContext,
) -> Result<ExpectedStatistics> {
    let p = model.n_events();
    observations.validate(p)?;
    let n = observations.len();

    let mut rngs = ctx.derive(pool.current_num_threads());
    let per_obs = map_observations(pool, &mut rngs, n, |i, rng| {
        let sample = importance_weight(
            observations.row(i),
            observations.sampling_time(i),
            model,
            n_samples,
            proposal,
            rng,
        )?;
        Ok(ObservationStatistics {
            weight_sum: sample.weight_sum(),
            dist: sample.expected_dist(),
            time_diffs: sample.expected_time_diffs(),
        })
    })?;

    let mut weight_sums = Vec::with_capacity(n);
    let mut dist = Vec::with_capacity(n);
    let mut time_diffs = Array2::<f64>::zeros((n, p));
    for (i, stats) in per_obs.into_iter().enumerate() {
        weight_sums.push(stats.weight_sum);
        dist.push(stats.dist);
        time_diffs.row_mut(i).assign(&stats.time_diffs);
    }
    Ok(ExpectedStatistics {
        weight_sums,
        dist,
        time_diffs,
    })
}
