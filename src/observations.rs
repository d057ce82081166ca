use ndarray::{Array2, ArrayView1};

use crate::error::{CbnError, Result};

#[derive(Debug, Clone)]
pub struct Observations {
    pub genotypes: Array2<bool>,
    pub sampling_times: Option<Vec<f64>>,
    pub weights: Vec<f64>,
}

impl Observations {
    pub fn new(genotypes: Array2<bool>) -> Self {
        let n = genotypes.nrows();
        Self {
            genotypes,
            sampling_times: None,
            weights: vec![1.0; n],
        }
    }

    pub fn with_sampling_times(mut self, times: Vec<f64>) -> Result<Self> {
        if times.len() != self.len() {
            return Err(CbnError::dimension("sampling times", self.len(), times.len()));
        }
        check_times(&times)?;
        self.sampling_times = Some(times);
        Ok(self)
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.len() {
            return Err(CbnError::dimension("weights", self.len(), weights.len()));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.genotypes.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.genotypes.nrows() == 0
    }

    pub fn n_events(&self) -> usize {
        self.genotypes.ncols()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, bool> {
        self.genotypes.row(i)
    }

    pub fn sampling_time(&self, i: usize) -> Option<f64> {
        self.sampling_times.as_ref().map(|t| t[i])
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn validate(&self, n_events: usize) -> Result<()> {
        if self.n_events() != n_events {
            return Err(CbnError::dimension("observation width", n_events, self.n_events()));
        }
        if self.weights.len() != self.len() {
            return Err(CbnError::dimension("weights", self.len(), self.weights.len()));
        }
        if let Some(times) = &self.sampling_times {
            if times.len() != self.len() {
                return Err(CbnError::dimension("sampling times", self.len(), times.len()));
            }
            check_times(times)?;
        }
        if let Some(w) = self.weights.iter().find(|w| !(**w >= 0.0 && w.is_finite())) {
            return Err(CbnError::invalid(format!(
                "observation weights must be finite and non-negative, got {w}"
            )));
        }
        if !self.is_empty() && !(self.total_weight() > 0.0) {
            return Err(CbnError::invalid("observation weights sum to zero"));
        }
        Ok(())
    }
}

fn check_times(times: &[f64]) -> Result<()> {
    match times.iter().find(|t| !(**t >= 0.0 && t.is_finite())) {
        Some(t) => Err(CbnError::invalid(format!(
            "sampling times must be finite and non-negative, got {t}"
        ))),
        None => Ok(()),
    }
}
