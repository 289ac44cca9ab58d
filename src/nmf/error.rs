use thiserror::Error;

/// Errors raised before a factorization starts, or by its collaborators.
///
/// Numerical degeneracy inside the loop is absorbed by the `eps` guards and never
/// surfaces here; running out of iterations is not an error either.
#[derive(Error, Debug)]
pub enum NmfError {
    #[error("Input matrix must have at least one row and one column")]
    EmptyInput,

    #[error("Input matrix contains NaN or infinite values")]
    NonFiniteInput,

    #[error("Input matrix must be non-negative, found {value} at ({row}, {col})")]
    NegativeInput { row: usize, col: usize, value: f64 },

    #[error("Invalid rank {rank}: must be between 1 and the number of columns ({n_cols})")]
    InvalidRank { rank: usize, n_cols: usize },

    #[error("Invalid tolerance: {0} (must be positive and finite)")]
    InvalidTolerance(f64),

    #[error("Invalid iteration budget: {0} (must be at least 1)")]
    InvalidIterationBudget(usize),

    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Clustering returned {found} labels for {expected} points")]
    LabelCountMismatch { expected: usize, found: usize },

    #[error("Clustering returned label {label}, but only {n_clusters} clusters were requested")]
    InvalidLabel { label: usize, n_clusters: usize },

    #[error("Clustering failed: {0}")]
    Clustering(anyhow::Error),

    #[error("Numeric operation failed: {0}")]
    Numeric(anyhow::Error),
}
