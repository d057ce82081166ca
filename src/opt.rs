use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CbnError, Result};
use crate::importance::{Proposal, expected_statistics};
use crate::likelihood::complete_log_likelihood;
use crate::model::Model;
use crate::observations::Observations;
use crate::progress;
use crate::rng::RngContext;
use crate::workers::build_pool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEm {
    pub max_iter: usize,
    pub update_step_size: usize,
    pub tol: f64,
    pub max_lambda: f64,
    pub adaptive_sample_size: bool,
    /// 16x the starting size when unset.
    pub max_sample_size: Option<usize>,
}

impl Default for ControlEm {
    fn default() -> Self {
        Self {
            max_iter: 100,
            update_step_size: 20,
            tol: 1e-3,
            max_lambda: 1e6,
            adaptive_sample_size: false,
            max_sample_size: None,
        }
    }
}

impl ControlEm {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(CbnError::invalid("max_iter must be >= 1"));
        }
        if self.update_step_size == 0 {
            return Err(CbnError::invalid("update_step_size must be >= 1"));
        }
        if !(self.tol >= 0.0) {
            return Err(CbnError::invalid(format!("tol must be >= 0, got {}", self.tol)));
        }
        if !(self.max_lambda > 0.0) {
            return Err(CbnError::invalid(format!(
                "max_lambda must be > 0, got {}",
                self.max_lambda
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub n_samples: usize,
    pub proposal: Proposal,
    pub control: ControlEm,
    pub threads: usize,
    pub verbose: bool,
    pub progress: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_samples: 100,
            proposal: Proposal::Forward,
            control: ControlEm::default(),
            threads: 1,
            verbose: false,
            progress: false,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(CbnError::invalid("number of importance samples must be >= 1"));
        }
        if self.threads == 0 {
            return Err(CbnError::invalid("number of threads must be >= 1"));
        }
        self.control.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Converged,
    MaxIterReached,
}

#[derive(Debug, Clone, Default)]
pub struct EmHistory {
    pub llhood: Vec<f64>,
    pub epsilon: Vec<f64>,
    pub lambda: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct McemFit {
    pub lambda: Vec<f64>,
    pub epsilon: f64,
    pub llhood: f64,
    pub status: FitStatus,
    pub iterations: usize,
    pub n_samples: usize,
    pub max_lambda: f64,
    pub history: EmHistory,
}

impl McemFit {
    pub fn capped_events(&self) -> Vec<usize> {
        let tol = self.max_lambda.abs() * 1e-9;
        self.lambda
            .iter()
            .enumerate()
            .filter(|(_, l)| **l >= self.max_lambda - tol)
            .map(|(j, _)| j)
            .collect()
    }
}

struct RunningAverage {
    lambda: Vec<f64>,
    epsilon: f64,
    llhood: f64,
    count: usize,
}

impl RunningAverage {
    fn new(p: usize) -> Self {
        Self {
            lambda: vec![0.0; p],
            epsilon: 0.0,
            llhood: 0.0,
            count: 0,
        }
    }

    fn push(&mut self, lambda: &[f64], epsilon: f64, llhood: f64) {
        for (acc, l) in self.lambda.iter_mut().zip(lambda) {
            *acc += l;
        }
        self.epsilon += epsilon;
        self.llhood += llhood;
        self.count += 1;
    }

    fn mean(&self) -> (Vec<f64>, f64, f64) {
        let k = self.count as f64;
        (
            self.lambda.iter().map(|l| l / k).collect(),
            self.epsilon / k,
            self.llhood / k,
        )
    }

    fn reset(&mut self) {
        self.lambda.fill(0.0);
        self.epsilon = 0.0;
        self.llhood = 0.0;
        self.count = 0;
    }
}

fn within_tol(lambda: &[f64], epsilon: f64, prev_lambda: &[f64], prev_epsilon: f64, tol: f64) -> bool {
    (epsilon - prev_epsilon).abs() <= tol
        && lambda
            .iter()
            .zip(prev_lambda)
            .all(|(a, b)| (a - b).abs() <= tol)
}

pub fn mcem(
    model: &mut Model,
    observations: &Observations,
    options: &FitOptions,
    ctx: &mut RngContext,
) -> Result<McemFit> {
    let p = model.n_events();
    options.validate()?;
    observations.validate(p)?;
    if observations.is_empty() {
        return Err(CbnError::invalid("no observations to fit"));
    }
    let n = observations.len();
    let total_weight = observations.total_weight();
    let control = &options.control;
    let verbose = options.verbose || ctx.verbose();
    let pool = build_pool(options.threads)?;

    let mut n_samples = options.n_samples;
    let max_samples = control
        .max_sample_size
        .unwrap_or(16 * options.n_samples)
        .max(n_samples);

    let mut window = RunningAverage::new(p);
    let mut previous: Option<(Vec<f64>, f64)> = None;
    let mut checkpoint = control.update_step_size;
    let mut converged: Option<(Vec<f64>, f64, f64)> = None;
    let mut history = EmHistory::default();
    let mut iterations = 0usize;

    if verbose {
        info!(
            n_obs = n,
            n_events = p,
            n_samples,
            proposal = options.proposal.as_str(),
            epsilon = model.epsilon(),
            lambda = ?model.lambda(),
            "starting MCEM"
        );
    }

    let pb = options
        .progress
        .then(|| progress::iteration_bar(control.max_iter as u64, "MCEM"));

    for iter in 0..control.max_iter {
        if iter == checkpoint {
            let (avg_lambda, avg_epsilon, avg_llhood) = window.mean();
            if let Some((prev_lambda, prev_epsilon)) = &previous
                && within_tol(&avg_lambda, avg_epsilon, prev_lambda, *prev_epsilon, control.tol)
            {
                converged = Some((avg_lambda, avg_epsilon, avg_llhood));
                break;
            }
            if control.adaptive_sample_size && previous.is_some() && n_samples < max_samples {
                n_samples = (n_samples * 2).min(max_samples);
                debug!(iteration = iter, n_samples, "increasing importance sample size");
            }
            previous = Some((avg_lambda, avg_epsilon));
            checkpoint += control.update_step_size;
            window.reset();
        }

        let stats = expected_statistics(observations, model, n_samples, options.proposal, &pool, ctx)?;

        let epsilon = if p == 0 {
            0.0
        } else {
            (stats.dist.iter().sum::<f64>() / (n * p) as f64).clamp(0.0, 1.0)
        };
        let mut colsum = vec![0.0f64; p];
        for (row, w) in stats.time_diffs.outer_iter().zip(&observations.weights) {
            for (acc, t) in colsum.iter_mut().zip(row.iter()) {
                *acc += w * t;
            }
        }
        let lambda: Vec<f64> = colsum.iter().map(|s| total_weight / s).collect();
        let capped = model.set_lambda_capped(lambda, control.max_lambda)?;
        if !capped.is_empty() {
            debug!(iteration = iter + 1, ?capped, "rates clamped at max_lambda");
        }
        model.set_epsilon(epsilon)?;

        let llhood = complete_log_likelihood(
            model.lambda(),
            model.epsilon(),
            stats.time_diffs.view(),
            &stats.dist,
            total_weight,
        )?;

        window.push(model.lambda(), model.epsilon(), llhood);
        history.llhood.push(llhood);
        history.epsilon.push(model.epsilon());
        history.lambda.push(model.lambda().to_vec());
        iterations = iter + 1;

        if verbose {
            info!(iteration = iterations, llhood, epsilon = model.epsilon(), lambda = ?model.lambda());
        } else {
            debug!(iteration = iterations, llhood, epsilon = model.epsilon(), lambda = ?model.lambda());
        }
        if let Some(pb) = &pb {
            pb.set_message(format!("llhood {llhood:.4}"));
            pb.inc(1);
        }
    }

    let status = if converged.is_some() {
        FitStatus::Converged
    } else {
        FitStatus::MaxIterReached
    };
    let (lambda, epsilon, llhood) = converged.unwrap_or_else(|| window.mean());

    if let Some(pb) = pb {
        pb.finish_with_message(format!("{status:?} after {iterations} iterations"));
    }

    model.set_lambda(lambda.clone())?;
    model.set_epsilon(epsilon.clamp(0.0, 1.0))?;
    model.set_llhood(llhood);

    let fit = McemFit {
        lambda,
        epsilon: model.epsilon(),
        llhood,
        status,
        iterations,
        n_samples,
        max_lambda: control.max_lambda,
        history,
    };
    let capped = fit.capped_events();
    if !capped.is_empty() {
        warn!(?capped, max_lambda = control.max_lambda, "fitted rates at the max_lambda cap");
    }
    if verbose {
        info!(?status, iterations, llhood, epsilon = fit.epsilon, lambda = ?fit.lambda, "MCEM finished");
    }
    Ok(fit)
}

pub fn fit(
    initial_lambda: &[f64],
    edges: &[(usize, usize)],
    observations: &Observations,
    lambda_s: f64,
    initial_epsilon: f64,
    options: &FitOptions,
    seed: u64,
) -> Result<McemFit> {
    let mut model = Model::from_edges(edges, initial_lambda.to_vec(), lambda_s, initial_epsilon)?;
    let mut ctx = RngContext::new(seed).with_verbose(options.verbose);
    mcem(&mut model, observations, options, &mut ctx)
}
