use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::error::{CbnError, Result};
use crate::model::Model;
use crate::rng::RngContext;

#[derive(Debug, Clone, Copy)]
pub enum SamplingTimes<'a> {
    Latent,
    Constant(f64),
    PerDraw(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct GenotypeSample {
    pub genotypes: Array2<bool>,
    pub time_diffs: Array2<f64>,
    pub sampling_times: Vec<f64>,
}

fn exponential(rate: f64) -> Result<Exp<f64>> {
    Exp::new(rate).map_err(|e| CbnError::sampling(format!("exponential with rate {rate}: {e}")))
}

pub fn sample_genotypes<R: Rng + ?Sized>(
    n: usize,
    model: &Model,
    times: SamplingTimes<'_>,
    rng: &mut R,
) -> Result<GenotypeSample> {
    let poset = model.poset();
    poset.ensure_acyclic()?;
    let p = model.n_events();

    // All waiting times of event 0, then event 1, ..., then sampling times.
    let mut time_diffs = Array2::<f64>::zeros((n, p));
    for (j, &rate) in model.lambda().iter().enumerate() {
        let dist = exponential(rate)?;
        for i in 0..n {
            time_diffs[[i, j]] = dist.sample(rng);
        }
    }

    let sampling_times = match times {
        SamplingTimes::Latent => {
            let dist = exponential(model.lambda_s())?;
            (0..n).map(|_| dist.sample(rng)).collect::<Vec<f64>>()
        }
        SamplingTimes::Constant(t) => vec![t; n],
        SamplingTimes::PerDraw(t) => {
            if t.len() != n {
                return Err(CbnError::dimension("sampling times", n, t.len()));
            }
            t.to_vec()
        }
    };

    let mut absolute = Array2::<f64>::zeros((n, p));
    let mut genotypes = Array2::from_elem((n, p), false);
    for &v in poset.topological_order() {
        let parents = poset.parents(v);
        for i in 0..n {
            let start = parents
                .iter()
                .map(|&u| absolute[[i, u]])
                .fold(0.0f64, f64::max);
            let t = time_diffs[[i, v]] + start;
            absolute[[i, v]] = t;
            genotypes[[i, v]] = t <= sampling_times[i];
        }
    }

    Ok(GenotypeSample {
        genotypes,
        time_diffs,
        sampling_times,
    })
}

pub fn sample(n: usize, model: &Model, times: SamplingTimes<'_>, seed: u64) -> Result<GenotypeSample> {
    let mut ctx = RngContext::new(seed);
    sample_genotypes(n, model, times, ctx.rng())
}

pub fn hamming_dist(x: ArrayView1<'_, bool>, y: ArrayView1<'_, bool>) -> usize {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).filter(|(a, b)| a != b).count()
}

pub fn hamming_dist_mat(x: ArrayView2<'_, bool>, y: ArrayView1<'_, bool>) -> Vec<usize> {
    x.outer_iter().map(|row| hamming_dist(row, y)).collect()
}

pub fn add_noise<R: Rng + ?Sized>(
    genotypes: &Array2<bool>,
    epsilon: f64,
    rng: &mut R,
) -> Result<Array2<bool>> {
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(CbnError::invalid(format!(
            "epsilon must lie in [0, 1], got {epsilon}"
        )));
    }
    if epsilon == 0.0 {
        return Ok(genotypes.clone());
    }
    Ok(genotypes.mapv(|x| x ^ rng.gen_bool(epsilon)))
}
