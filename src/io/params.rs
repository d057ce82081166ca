use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::importance::Proposal;
use crate::opt::{ControlEm, FitOptions, FitStatus, McemFit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResultFile {
    pub lambda: Vec<f64>,
    pub epsilon: f64,
    pub llhood: f64,
    pub lambda_s: f64,
    pub status: FitStatus,
    pub iterations: usize,
    pub n_samples: usize,
    pub proposal: Proposal,
    pub seed: u64,
    pub threads: usize,
    pub control: ControlEm,
}

impl FitResultFile {
    pub fn from_fit(fit: &McemFit, lambda_s: f64, options: &FitOptions, seed: u64) -> Self {
        Self {
            lambda: fit.lambda.clone(),
            epsilon: fit.epsilon,
            llhood: fit.llhood,
            lambda_s,
            status: fit.status,
            iterations: fit.iterations,
            n_samples: fit.n_samples,
            proposal: options.proposal,
            seed,
            threads: options.threads,
            control: options.control.clone(),
        }
    }
}

pub fn save_fit(path: &Path, result: &FitResultFile) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, result)
        .with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn load_fit(path: &Path) -> Result<FitResultFile> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let reader = BufReader::new(file);
    let result =
        serde_json::from_reader(reader).with_context(|| format!("failed to parse {:?}", path))?;
    Ok(result)
}
