use log::info;
use ndarray::{Array1, Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dense::{argmax_rows, half_squared_residual, multiplicative_update, UpdateRule};
use crate::nmf::convergence::{run_iterations, IterationObserver, LogObserver, ResidualTrace, StoppingRule};
use crate::nmf::{validate_data, validate_rank, validate_schedule, NmfError};

/// Added to the update denominators.
const EPS: f64 = 1e-9;

/// Outcome of a standard NMF run: `V ≈ W·H`.
#[derive(Debug, Clone)]
pub struct StandardNmfResult {
    /// Basis (m × k).
    pub w: Array2<f64>,
    /// Encoding (k × n).
    pub h: Array2<f64>,
    pub residuals: Array1<f64>,
    converged: bool,
}

impl StandardNmfResult {
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn n_iter(&self) -> usize {
        self.residuals.len()
    }

    pub fn final_residual(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    /// Basis vector with the largest weight for every column of `V`.
    pub fn cluster_labels(&self) -> Vec<usize> {
        argmax_rows(self.h.t())
    }

    /// `(W, H, residuals)`
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
        (self.w, self.h, self.residuals)
    }
}

/// A single standard (Lee-Seung) NMF run on a non-negative matrix `V`.
///
/// Construction validates the hyperparameters and draws the random starting factors
/// from a generator local to this session; [`StandardNmf::factorize`] consumes the
/// session and runs it to completion.
///
/// Unlike convex NMF, early stopping requires the residual to have strictly
/// decreased in the last iteration as well as a relative change below the tolerance.
pub struct StandardNmf<'a> {
    v: ArrayView2<'a, f64>,
    num_bases: usize,
    n_iter: usize,
    tolerance: f64,
    w: Array2<f64>,
    h: Array2<f64>,
}

impl<'a> StandardNmf<'a> {
    /// Validates the input and draws the starting factors.
    ///
    /// # Parameters
    /// - `v`: Non-negative data matrix (m × n)
    /// - `num_bases`: Number of basis vectors `k`, between 1 and n
    /// - `n_iter`: Iteration budget, at least 1
    /// - `tolerance`: Relative residual change below which the run may stop, finite and > 0
    /// - `random_state`: Seed for the uniform `[0, 1)` starting `W` (m × k) and `H` (k × n)
    ///
    /// # Returns
    /// - `Ok(StandardNmf)`: Session ready for [`StandardNmf::factorize`]
    /// - `Err(NmfError)`: Empty, non-finite or negative `v`, or invalid parameters
    pub fn new(
        v: ArrayView2<'a, f64>,
        num_bases: usize,
        n_iter: usize,
        tolerance: f64,
        random_state: u64,
    ) -> Result<Self, NmfError> {
        validate_data(v)?;
        if let Some(((row, col), &value)) = v.indexed_iter().find(|(_, &x)| x < 0.0) {
            return Err(NmfError::NegativeInput { row, col, value });
        }
        validate_rank(num_bases, v.ncols())?;
        validate_schedule(tolerance, n_iter)?;

        let (m, n) = v.dim();
        let mut rng = ChaCha8Rng::seed_from_u64(random_state);
        let w = Array2::from_shape_simple_fn((m, num_bases), || rng.random::<f64>().abs());
        let h = Array2::from_shape_simple_fn((num_bases, n), || rng.random::<f64>().abs());

        Ok(Self {
            v,
            num_bases,
            n_iter,
            tolerance,
            w,
            h,
        })
    }

    pub fn num_bases(&self) -> usize {
        self.num_bases
    }

    /// Starting basis, before any update.
    pub fn w(&self) -> &Array2<f64> {
        &self.w
    }

    /// Starting encoding, before any update.
    pub fn h(&self) -> &Array2<f64> {
        &self.h
    }

    /// Runs the factorization, reporting progress through [`LogObserver`].
    ///
    /// # Returns
    /// - `Ok(StandardNmfResult)`: `W`, `H` and the residual history of every iteration that ran
    /// - `Err(NmfError)`: An update produced mismatched shapes
    pub fn factorize(self) -> Result<StandardNmfResult, NmfError> {
        self.factorize_with_observer(&mut LogObserver::default())
    }

    /// Same as [`StandardNmf::factorize`], reporting every iteration to `observer`.
    ///
    /// # Parameters
    /// - `observer`: Receives the iteration index and residual after every H/W update pair
    pub fn factorize_with_observer<O>(self, observer: &mut O) -> Result<StandardNmfResult, NmfError>
    where
        O: IterationObserver + ?Sized,
    {
        let StandardNmf {
            v,
            num_bases,
            n_iter,
            tolerance,
            mut w,
            mut h,
        } = self;

        let (m, n) = v.dim();
        info!(
            "Standard NMF on {} x {} matrix with {} bases, tolerance {:e}, at most {} iterations",
            m, n, num_bases, tolerance, n_iter
        );

        let trace = ResidualTrace::new(n_iter, StoppingRule::StrictDecrease, tolerance);
        let (residuals, converged) = run_iterations(trace, observer, |_| {
            // H <- H * (WᵗV) / (WᵗWH + eps)
            let numer = w.t().dot(&v);
            let denom = w.t().dot(&w).dot(&h);
            multiplicative_update("H update", &mut h, &numer, &denom, EPS, UpdateRule::Ratio)?;

            // W <- W * (VHᵗ) / (WHHᵗ + eps), with the updated H
            let numer = v.dot(&h.t());
            let denom = w.dot(&h).dot(&h.t());
            multiplicative_update("W update", &mut w, &numer, &denom, EPS, UpdateRule::Ratio)?;

            Ok(half_squared_residual(v, w.dot(&h).view()))
        })?;

        Ok(StandardNmfResult {
            w,
            h,
            residuals,
            converged,
        })
    }
}

/// Builder for [`StandardNmf`].
///
/// Defaults: 2 bases, 100 iterations, tolerance 1e-4, seed 100.
#[derive(Debug, Clone)]
pub struct StandardNmfBuilder {
    num_bases: usize,
    n_iter: usize,
    tolerance: f64,
    random_seed: u64,
}

impl Default for StandardNmfBuilder {
    fn default() -> Self {
        Self {
            num_bases: 2,
            n_iter: 100,
            tolerance: 1e-4,
            random_seed: 100,
        }
    }
}

impl StandardNmfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_bases(mut self, num_bases: usize) -> Self {
        self.num_bases = num_bases;
        self
    }

    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn build<'a>(self, v: ArrayView2<'a, f64>) -> Result<StandardNmf<'a>, NmfError> {
        StandardNmf::new(v, self.num_bases, self.n_iter, self.tolerance, self.random_seed)
    }
}
