use ndarray::{ArrayView1, ArrayView2};
use rayon::ThreadPool;

use crate::error::{CbnError, Result};
use crate::importance::{Proposal, importance_weight};
use crate::model::Model;
use crate::observations::Observations;
use crate::rng::RngContext;
use crate::workers::{build_pool, map_observations};

fn weighted_log(count: f64, x: f64) -> f64 {
    if count == 0.0 { 0.0 } else { count * x.ln() }
}

/// With `epsilon == 0` only rows with a nonzero distance add a noise term.
pub fn complete_log_likelihood(
    lambda: &[f64],
    epsilon: f64,
    time_diffs: ArrayView2<'_, f64>,
    dist: &[f64],
    total_weight: f64,
) -> Result<f64> {
    let p = lambda.len();
    if time_diffs.ncols() != p {
        return Err(CbnError::dimension("time differences columns", p, time_diffs.ncols()));
    }
    if time_diffs.nrows() != dist.len() {
        return Err(CbnError::dimension("distances", time_diffs.nrows(), dist.len()));
    }
    let p = p as f64;

    let lambda_view = ArrayView1::from(lambda);
    let mut llhood = total_weight * lambda.iter().map(|l| l.ln()).sum::<f64>()
        - time_diffs.dot(&lambda_view).sum();

    if epsilon == 0.0 {
        for &d in dist.iter().filter(|d| **d != 0.0) {
            llhood += weighted_log(d, f64::EPSILON)
                + weighted_log((p - d).max(0.0), 1.0 - f64::EPSILON);
        }
    } else {
        // Counts within rounding of zero are zero; at epsilon == 1 a stray
        // 1e-16 of kept bits would otherwise contribute -inf.
        let tol = dist.len() as f64 * p * 1e-12;
        let snap = |count: f64| if count <= tol { 0.0 } else { count };
        let flipped = snap(dist.iter().sum());
        let kept = snap(dist.iter().map(|d| (p - d).max(0.0)).sum());
        llhood += weighted_log(flipped, epsilon) + weighted_log(kept, 1.0 - epsilon);
    }
    Ok(llhood)
}

pub fn observed_log_likelihood(
    observations: &Observations,
    model: &Model,
    n_samples: usize,
    proposal: Proposal,
    pool: &ThreadPool,
    ctx: &mut RngContext,
) -> Result<f64> {
    observations.validate(model.n_events())?;
    let mut rngs = ctx.derive(pool.current_num_threads());
    let per_obs = map_observations(pool, &mut rngs, observations.len(), |i, rng| {
        let sample = importance_weight(
            observations.row(i),
            observations.sampling_time(i),
            model,
            n_samples,
            proposal,
            rng,
        )?;
        Ok(sample.log_mean_weight())
    })?;

    Ok(per_obs
        .iter()
        .zip(observations.weights.iter())
        .filter(|(_, w)| **w != 0.0)
        .map(|(ll, w)| w * ll)
        .sum())
}

pub fn observed_log_likelihood_from_edges(
    observations: &Observations,
    edges: &[(usize, usize)],
    lambda: &[f64],
    epsilon: f64,
    lambda_s: f64,
    n_samples: usize,
    proposal: Proposal,
    threads: usize,
    seed: u64,
) -> Result<f64> {
    let model = Model::from_edges(edges, lambda.to_vec(), lambda_s, epsilon)?;
    let pool = build_pool(threads)?;
    let mut ctx = RngContext::new(seed);
    observed_log_likelihood(observations, &model, n_samples, proposal, &pool, &mut ctx)
}
