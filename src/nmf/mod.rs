//! # Non-negative Matrix Factorization
//!
//! Two multiplicative-update solvers sharing one convergence discipline:
//!
//! - **Standard NMF** ([`StandardNmf`]): the Lee-Seung updates for `V ≈ W·H` with
//!   `V`, `W`, `H` all non-negative.
//! - **Convex NMF** ([`ConvexNmf`]): `X ≈ X·W·Gᵗ` where the basis `F = X·W` is a
//!   column-normalized non-negative combination of the data columns. `X` may be
//!   mixed-sign; the Gram matrix is split into its positive and negative parts so the
//!   multiplicative updates stay valid.
//!
//! Both engines validate their inputs before iterating and return the residual
//! history `0.5·‖X − approx‖²_F`, truncated to the iterations actually run.

use ndarray::ArrayView2;

mod convergence;
mod convex;
mod error;
mod init;
mod kkt;
mod standard;

pub use convergence::{IterationObserver, LogObserver, NoopObserver, StoppingRule};
pub use convex::{convex_nmf, ConvexNmf, ConvexNmfBuilder, ConvexNmfResult};
pub use error::NmfError;
pub use init::{initialize_kmeans, initialize_with_oracle};
pub use kkt::check_kkt;
pub use standard::{StandardNmf, StandardNmfBuilder, StandardNmfResult};

pub(crate) fn validate_data(x: ArrayView2<f64>) -> Result<(), NmfError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(NmfError::EmptyInput);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(NmfError::NonFiniteInput);
    }
    Ok(())
}

pub(crate) fn validate_rank(rank: usize, n_cols: usize) -> Result<(), NmfError> {
    if rank == 0 || rank > n_cols {
        return Err(NmfError::InvalidRank { rank, n_cols });
    }
    Ok(())
}

pub(crate) fn validate_schedule(tol: f64, max_iter: usize) -> Result<(), NmfError> {
    if !(tol.is_finite() && tol > 0.0) {
        return Err(NmfError::InvalidTolerance(tol));
    }
    if max_iter == 0 {
        return Err(NmfError::InvalidIterationBudget(max_iter));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_validate_data() {
        assert!(validate_data(array![[1.0, -2.0]].view()).is_ok());
        assert!(matches!(
            validate_data(Array2::<f64>::zeros((0, 3)).view()),
            Err(NmfError::EmptyInput)
        ));
        assert!(matches!(
            validate_data(array![[1.0, f64::INFINITY]].view()),
            Err(NmfError::NonFiniteInput)
        ));
    }

    #[test]
    fn test_validate_rank() {
        assert!(validate_rank(1, 4).is_ok());
        assert!(validate_rank(4, 4).is_ok());
        assert!(matches!(
            validate_rank(0, 4),
            Err(NmfError::InvalidRank { rank: 0, n_cols: 4 })
        ));
        assert!(validate_rank(5, 4).is_err());
    }

    #[test]
    fn test_validate_schedule() {
        assert!(validate_schedule(1e-4, 1).is_ok());
        assert!(matches!(validate_schedule(0.0, 10), Err(NmfError::InvalidTolerance(_))));
        assert!(validate_schedule(-1e-3, 10).is_err());
        assert!(validate_schedule(f64::NAN, 10).is_err());
        assert!(matches!(
            validate_schedule(1e-4, 0),
            Err(NmfError::InvalidIterationBudget(0))
        ));
    }
}
