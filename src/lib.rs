pub mod error;
pub mod importance;
pub mod io;
pub mod likelihood;
pub mod model;
pub mod observations;
pub mod opt;
pub mod poset;
pub mod progress;
pub mod rng;
pub mod sampler;
pub mod workers;

pub use error::{CbnError, Result};
pub use importance::{ImportanceSample, Proposal, importance_weight};
pub use model::Model;
pub use observations::Observations;
pub use opt::{ControlEm, FitOptions, FitStatus, McemFit, fit, mcem};
pub use poset::Poset;
pub use rng::RngContext;
pub use sampler::{GenotypeSample, SamplingTimes, sample, sample_genotypes};
