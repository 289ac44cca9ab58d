use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView2};

use crate::clustering::{ClusteringOracle, KMeans};
use crate::dense::{
    argmax_rows, check_shape, half_squared_residual, multiplicative_update, normalize_columns,
    separate_signed, SignedParts, UpdateRule,
};
use crate::nmf::convergence::{run_iterations, IterationObserver, LogObserver, ResidualTrace, StoppingRule};
use crate::nmf::init::initialize_with_oracle;
use crate::nmf::{validate_data, validate_rank, validate_schedule, NmfError};

/// Guards `0 / 0` in the square-root update ratios.
const EPS: f64 = 1e-16;

/// Outcome of a convex NMF run: `X ≈ F·Gᵗ` with `F = X·W`.
#[derive(Debug, Clone)]
pub struct ConvexNmfResult {
    /// Basis `X·W` (m × r).
    pub f: Array2<f64>,
    /// Convex combination weights (n × r), every column sums to one.
    pub w: Array2<f64>,
    /// Transposed encoding `Gᵗ` (r × n).
    pub g_t: Array2<f64>,
    /// Residual of every iteration that ran.
    pub residuals: Array1<f64>,
    converged: bool,
}

impl ConvexNmfResult {
    /// Whether the stopping rule fired before the iteration budget ran out.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn n_iter(&self) -> usize {
        self.residuals.len()
    }

    pub fn final_residual(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    /// Component with the largest encoding weight for every data column.
    pub fn cluster_labels(&self) -> Vec<usize> {
        argmax_rows(self.g_t.t())
    }

    /// `(F, W, Gᵗ, residuals)`
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, Array2<f64>, Array1<f64>) {
        (self.f, self.w, self.g_t, self.residuals)
    }
}

/// Loop state, owned by a single run.
struct ConvexState {
    w: Array2<f64>,
    g: Array2<f64>,
    f: Array2<f64>,
}

impl ConvexState {
    fn new(x: ArrayView2<f64>, mut w: Array2<f64>, g: Array2<f64>) -> Result<Self, NmfError> {
        normalize_columns(&mut w).map_err(NmfError::Numeric)?;
        let f = x.dot(&w);
        Ok(Self { w, g, f })
    }

    /// One encoding update followed by one basis-weight update; returns the new residual.
    fn step(&mut self, x: ArrayView2<f64>, gram: &SignedParts) -> Result<f64, NmfError> {
        let pos_w = gram.pos.dot(&self.w);
        let neg_w = gram.neg.dot(&self.w);

        // G <- G * sqrt((XᵗX⁺W + G·WᵗXᵗX⁻W) / (XᵗX⁻W + G·WᵗXᵗX⁺W))
        let numer = &pos_w + &self.g.dot(&self.w.t().dot(&neg_w));
        let denom = &neg_w + &self.g.dot(&self.w.t().dot(&pos_w));
        multiplicative_update(
            "encoding update",
            &mut self.g,
            &numer,
            &denom,
            EPS,
            UpdateRule::SquareRootRatio,
        )?;

        // W <- W * sqrt((XᵗX⁺G + XᵗX⁻W·GᵗG) / (XᵗX⁻G + XᵗX⁺W·GᵗG)), with the updated G
        let gtg = self.g.t().dot(&self.g);
        let numer = gram.pos.dot(&self.g) + neg_w.dot(&gtg);
        let denom = gram.neg.dot(&self.g) + pos_w.dot(&gtg);
        multiplicative_update(
            "basis weight update",
            &mut self.w,
            &numer,
            &denom,
            EPS,
            UpdateRule::SquareRootRatio,
        )?;
        normalize_columns(&mut self.w).map_err(NmfError::Numeric)?;

        self.f = x.dot(&self.w);
        Ok(half_squared_residual(x, self.f.dot(&self.g.t()).view()))
    }

    fn into_result(self, residuals: Array1<f64>, converged: bool) -> ConvexNmfResult {
        ConvexNmfResult {
            f: self.f,
            w: self.w,
            g_t: self.g.reversed_axes(),
            residuals,
            converged,
        }
    }
}

/// Convex NMF solver: minimizes `0.5·‖X − X·W·Gᵗ‖²_F` over non-negative `W`, `G`.
///
/// The starting point comes from clustering the columns of `X` (see
/// [`initialize_with_oracle`](crate::nmf::initialize_with_oracle)), or is supplied
/// directly through [`ConvexNmf::fit_from`].
///
/// # Example
/// ```
/// use ndarray::array;
/// use single_nmf::nmf::ConvexNmfBuilder;
///
/// let x = array![
///     [1.0, 1.2, 0.0, 0.1],
///     [1.0, 1.1, 0.1, 0.0],
///     [0.0, 0.1, 1.0, 1.2],
/// ];
/// let result = ConvexNmfBuilder::new()
///     .rank(2)
///     .max_iter(50)
///     .build()
///     .fit(x.view())
///     .unwrap();
/// assert_eq!(result.w.dim(), (4, 2));
/// ```
#[derive(Debug, Clone)]
pub struct ConvexNmf<C = KMeans> {
    rank: usize,
    tolerance: f64,
    max_iter: usize,
    random_seed: u64,
    oracle: C,
}

impl ConvexNmf<KMeans> {
    /// Creates a solver that starts from a [`KMeans`] partition of the data columns.
    ///
    /// Parameters are only checked once data arrives, in [`ConvexNmf::fit`].
    ///
    /// # Parameters
    /// - `rank`: Number of components `r`, between 1 and the number of columns of `X`
    /// - `tolerance`: Relative residual change below which the run stops, finite and > 0
    /// - `max_iter`: Iteration budget, at least 1
    /// - `random_seed`: Seed handed to the clustering step
    ///
    /// # Returns
    /// A solver that can be reused across inputs.
    pub fn new(rank: usize, tolerance: f64, max_iter: usize, random_seed: u64) -> Self {
        Self {
            rank,
            tolerance,
            max_iter,
            random_seed,
            oracle: KMeans::default(),
        }
    }
}

impl<C: ClusteringOracle> ConvexNmf<C> {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Runs the factorization, reporting progress through [`LogObserver`].
    ///
    /// # Parameters
    /// - `x`: Data matrix (features × samples), finite and of any sign
    ///
    /// # Returns
    /// - `Ok(ConvexNmfResult)`: Factors and the residual history of every iteration that ran
    /// - `Err(NmfError)`: Invalid input or parameters, or the clustering step failed
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<ConvexNmfResult, NmfError> {
        self.fit_with_observer(x, &mut LogObserver::default())
    }

    /// Same as [`ConvexNmf::fit`], reporting every iteration to `observer`.
    ///
    /// # Parameters
    /// - `x`: Data matrix (features × samples)
    /// - `observer`: Receives the iteration index and residual after every update pair
    ///
    /// # Returns
    /// - `Ok(ConvexNmfResult)`: Factors and residual history
    /// - `Err(NmfError)`: Invalid input or parameters, or the clustering step failed
    pub fn fit_with_observer<O>(
        &self,
        x: ArrayView2<f64>,
        observer: &mut O,
    ) -> Result<ConvexNmfResult, NmfError>
    where
        O: IterationObserver + ?Sized,
    {
        self.validate(x)?;
        let (w, g) = initialize_with_oracle(x, self.rank, self.random_seed, &self.oracle)?;
        self.run(x, w, g, observer)
    }

    /// Runs the factorization from a caller-supplied starting point instead of clustering.
    ///
    /// `w` is normalized to unit column sums before the first update.
    ///
    /// # Parameters
    /// - `x`: Data matrix (m × n)
    /// - `w`: Initial convex weights, n × r, finite and non-negative
    /// - `g`: Initial encoding, n × r, finite and non-negative
    ///
    /// # Returns
    /// - `Ok(ConvexNmfResult)`: Factors and residual history
    /// - `Err(NmfError)`: Invalid input, parameters, or starting factors
    pub fn fit_from(
        &self,
        x: ArrayView2<f64>,
        w: Array2<f64>,
        g: Array2<f64>,
    ) -> Result<ConvexNmfResult, NmfError> {
        self.fit_from_with_observer(x, w, g, &mut LogObserver::default())
    }

    /// [`ConvexNmf::fit_from`] with an explicit observer.
    pub fn fit_from_with_observer<O>(
        &self,
        x: ArrayView2<f64>,
        w: Array2<f64>,
        g: Array2<f64>,
        observer: &mut O,
    ) -> Result<ConvexNmfResult, NmfError>
    where
        O: IterationObserver + ?Sized,
    {
        self.validate(x)?;
        let expected = (x.ncols(), self.rank);
        check_shape("initial W", expected, w.dim())?;
        check_shape("initial G", expected, g.dim())?;
        for factor in [&w, &g] {
            validate_data(factor.view())?;
            if let Some(((row, col), &value)) = factor.indexed_iter().find(|(_, &v)| v < 0.0) {
                return Err(NmfError::NegativeInput { row, col, value });
            }
        }
        self.run(x, w, g, observer)
    }

    fn validate(&self, x: ArrayView2<f64>) -> Result<(), NmfError> {
        validate_data(x)?;
        validate_rank(self.rank, x.ncols())?;
        validate_schedule(self.tolerance, self.max_iter)?;
        if self.rank == x.ncols() {
            warn!(
                "Rank {} equals the number of columns, the factorization is overparameterized",
                self.rank
            );
        }
        Ok(())
    }

    fn run<O>(
        &self,
        x: ArrayView2<f64>,
        w: Array2<f64>,
        g: Array2<f64>,
        observer: &mut O,
    ) -> Result<ConvexNmfResult, NmfError>
    where
        O: IterationObserver + ?Sized,
    {
        let (m, n) = x.dim();
        info!(
            "Convex NMF on {} x {} matrix with rank {}, tolerance {:e}, at most {} iterations",
            m, n, self.rank, self.tolerance, self.max_iter
        );

        let gram = x.t().dot(&x);
        let gram = separate_signed(gram.view());

        let mut state = ConvexState::new(x, w, g)?;
        let trace = ResidualTrace::new(self.max_iter, StoppingRule::RelativeChange, self.tolerance);
        let (residuals, converged) = run_iterations(trace, observer, |_| {
            state.step(x, &gram)
        })?;

        Ok(state.into_result(residuals, converged))
    }
}

/// Builder for [`ConvexNmf`].
///
/// Defaults: rank 2, tolerance 1e-4, 200 iterations, seed 42, [`KMeans`] clustering.
#[derive(Debug, Clone)]
pub struct ConvexNmfBuilder<C = KMeans> {
    rank: usize,
    tolerance: f64,
    max_iter: usize,
    random_seed: u64,
    oracle: C,
}

impl Default for ConvexNmfBuilder<KMeans> {
    fn default() -> Self {
        Self {
            rank: 2,
            tolerance: 1e-4,
            max_iter: 200,
            random_seed: 42,
            oracle: KMeans::default(),
        }
    }
}

impl ConvexNmfBuilder<KMeans> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: ClusteringOracle> ConvexNmfBuilder<C> {
    pub fn rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Relative residual change below which the run stops.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Replaces the clustering used to build the starting point.
    pub fn clustering<D: ClusteringOracle>(self, oracle: D) -> ConvexNmfBuilder<D> {
        ConvexNmfBuilder {
            rank: self.rank,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
            random_seed: self.random_seed,
            oracle,
        }
    }

    pub fn build(self) -> ConvexNmf<C> {
        ConvexNmf {
            rank: self.rank,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
            random_seed: self.random_seed,
            oracle: self.oracle,
        }
    }
}

/// Convex NMF of `x` with rank `r`, starting from a k-means partition of its columns.
///
/// # Parameters
/// - `x`: Data matrix (m × n), finite and of any sign
/// - `r`: Number of components, `1 <= r <= n`
/// - `tol`: Relative residual change below which the run stops
/// - `max_iter`: Iteration budget
/// - `random_state`: Seed for the k-means initialization
///
/// # Returns
/// - `Ok(ConvexNmfResult)`: `F` (m × r), `W` (n × r), `Gᵗ` (r × n) and the residual history
/// - `Err(NmfError)`: Invalid input or parameters
pub fn convex_nmf(
    x: ArrayView2<f64>,
    r: usize,
    tol: f64,
    max_iter: usize,
    random_state: u64,
) -> Result<ConvexNmfResult, NmfError> {
    ConvexNmf::new(r, tol, max_iter, random_state).fit(x)
}
