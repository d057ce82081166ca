use thiserror::Error;

#[derive(Error, Debug)]
pub enum CbnError {
    #[error("poset is not acyclic")]
    NotAcyclic,

    #[error("dimension mismatch: {what} has size {found}, expected {expected}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid edge ({from}, {to}) for a poset with {n_events} events")]
    InvalidEdge {
        from: usize,
        to: usize,
        n_events: usize,
    },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("sampling error: {message}")]
    Sampling { message: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, CbnError>;

impl CbnError {
    pub fn dimension(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn sampling(message: impl Into<String>) -> Self {
        Self::Sampling {
            message: message.into(),
        }
    }
}
