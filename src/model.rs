use crate::error::{CbnError, Result};
use crate::poset::Poset;

#[derive(Debug, Clone)]
pub struct Model {
    poset: Poset,
    lambda: Vec<f64>,
    lambda_s: f64,
    epsilon: f64,
    llhood: f64,
}

impl Model {
    pub fn new(poset: Poset, lambda: Vec<f64>, lambda_s: f64, epsilon: f64) -> Result<Self> {
        poset.ensure_acyclic()?;
        if lambda.len() != poset.n_events() {
            return Err(CbnError::dimension("lambda", poset.n_events(), lambda.len()));
        }
        if !(lambda_s > 0.0 && lambda_s.is_finite()) {
            return Err(CbnError::invalid(format!(
                "sampling rate lambda_s must be positive and finite, got {lambda_s}"
            )));
        }
        let mut model = Self {
            poset,
            lambda: Vec::new(),
            lambda_s,
            epsilon: 0.0,
            llhood: f64::NAN,
        };
        model.set_lambda(lambda)?;
        model.set_epsilon(epsilon)?;
        Ok(model)
    }

    pub fn from_edges(
        edges: &[(usize, usize)],
        lambda: Vec<f64>,
        lambda_s: f64,
        epsilon: f64,
    ) -> Result<Self> {
        let poset = Poset::acyclic(lambda.len(), edges)?;
        Self::new(poset, lambda, lambda_s, epsilon)
    }

    pub fn n_events(&self) -> usize {
        self.poset.n_events()
    }

    pub fn poset(&self) -> &Poset {
        &self.poset
    }

    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    pub fn lambda_s(&self) -> f64 {
        self.lambda_s
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// NaN before any fit.
    pub fn llhood(&self) -> f64 {
        self.llhood
    }

    pub fn set_lambda(&mut self, lambda: Vec<f64>) -> Result<()> {
        if lambda.len() != self.poset.n_events() {
            return Err(CbnError::dimension("lambda", self.poset.n_events(), lambda.len()));
        }
        if let Some((j, v)) = lambda.iter().enumerate().find(|(_, v)| !(**v > 0.0)) {
            return Err(CbnError::invalid(format!("lambda[{j}] must be positive, got {v}")));
        }
        self.lambda = lambda;
        Ok(())
    }

    pub fn set_lambda_capped(&mut self, mut lambda: Vec<f64>, max_lambda: f64) -> Result<Vec<usize>> {
        let mut capped = Vec::new();
        for (j, v) in lambda.iter_mut().enumerate() {
            if !(*v <= max_lambda) {
                *v = max_lambda;
                capped.push(j);
            }
        }
        self.set_lambda(lambda)?;
        Ok(capped)
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(CbnError::invalid(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn set_llhood(&mut self, llhood: f64) {
        self.llhood = llhood;
    }

    pub fn reduce_poset(&mut self) -> Result<()> {
        self.poset.transitive_reduction()
    }
}
