use log::warn;
use ndarray::{Array2, ArrayView2, Axis};

use crate::clustering::{ClusteringOracle, KMeans};
use crate::nmf::{validate_data, validate_rank, NmfError};

/// Uniform term blended into the hard cluster indicator.
const BLEND: f64 = 0.2;
/// Keeps the `1 / n_k` scaling finite for empty clusters.
const EMPTY_CLUSTER_EPS: f64 = 1e-10;

/// Cluster-based starting point `(W, G)` for convex NMF, clustering the columns of `x`
/// with the default [`KMeans`] oracle.
pub fn initialize_kmeans(
    x: ArrayView2<f64>,
    r: usize,
    random_state: u64,
) -> Result<(Array2<f64>, Array2<f64>), NmfError> {
    initialize_with_oracle(x, r, random_state, &KMeans::default())
}

/// Cluster-based starting point `(W, G)` for convex NMF.
///
/// The columns of `x` are partitioned into `r` groups by `oracle`. With `H` the n×r
/// hard indicator matrix and `n_k` the size of cluster `k`:
///
/// - `G = H + 0.2`
/// - `W = (H + 0.2) · diag(1 / (n_k + 1e-10))`
///
/// Both are strictly positive, so the multiplicative updates can move every entry.
/// An empty cluster gives a very large but finite column of `W`.
///
/// # Parameters
/// - `x`: Data matrix (m × n); its n columns are clustered
/// - `r`: Number of clusters, `1 <= r <= n`
/// - `random_state`: Seed passed on to `oracle`
/// - `oracle`: Clustering collaborator
///
/// # Returns
/// - `Ok((W, G))`: Both n × r and strictly positive
/// - `Err(NmfError)`: Invalid input, a failing oracle, or labels that do not fit `r`
pub fn initialize_with_oracle<C>(
    x: ArrayView2<f64>,
    r: usize,
    random_state: u64,
    oracle: &C,
) -> Result<(Array2<f64>, Array2<f64>), NmfError>
where
    C: ClusteringOracle + ?Sized,
{
    validate_data(x)?;
    let n = x.ncols();
    validate_rank(r, n)?;

    let labels = oracle
        .fit_predict(x.t(), r, random_state)
        .map_err(NmfError::Clustering)?;
    if labels.len() != n {
        return Err(NmfError::LabelCountMismatch {
            expected: n,
            found: labels.len(),
        });
    }

    let mut indicator = Array2::<f64>::zeros((n, r));
    for (i, &label) in labels.iter().enumerate() {
        if label >= r {
            return Err(NmfError::InvalidLabel {
                label,
                n_clusters: r,
            });
        }
        indicator[[i, label]] = 1.0;
    }

    let counts = indicator.sum_axis(Axis(0));
    let empty = counts.iter().filter(|&&c| c == 0.0).count();
    if empty > 0 {
        warn!("Clustering left {} of {} clusters empty", empty, r);
    }

    let g = &indicator + BLEND;
    let mut w = g.clone();
    for (mut col, &n_k) in w.columns_mut().into_iter().zip(counts.iter()) {
        col /= n_k + EMPTY_CLUSTER_EPS;
    }

    Ok((w, g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct FixedLabels(Vec<usize>);

    impl ClusteringOracle for FixedLabels {
        fn fit_predict(
            &self,
            points: ArrayView2<f64>,
            _n_clusters: usize,
            _random_state: u64,
        ) -> anyhow::Result<Vec<usize>> {
            assert_eq!(points.nrows(), self.0.len());
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl ClusteringOracle for Failing {
        fn fit_predict(
            &self,
            _points: ArrayView2<f64>,
            _n_clusters: usize,
            _random_state: u64,
        ) -> anyhow::Result<Vec<usize>> {
            anyhow::bail!("no convergence")
        }
    }

    fn data() -> Array2<f64> {
        array![
            [1.0, 1.1, 0.0, 0.1],
            [1.0, 0.9, 0.1, 0.0],
            [0.0, 0.1, 1.0, 1.2],
        ]
    }

    #[test]
    fn test_blended_indicator() -> anyhow::Result<()> {
        let x = data();
        let (w, g) = initialize_with_oracle(x.view(), 2, 0, &FixedLabels(vec![0, 0, 1, 1]))?;

        assert_eq!(g.dim(), (4, 2));
        assert_eq!(w.dim(), (4, 2));
        assert_relative_eq!(g[[0, 0]], 1.2);
        assert_relative_eq!(g[[0, 1]], 0.2);
        assert_relative_eq!(g[[3, 1]], 1.2);
        assert_relative_eq!(w[[0, 0]], 1.2 / (2.0 + 1e-10));
        assert_relative_eq!(w[[2, 0]], 0.2 / (2.0 + 1e-10));
        assert!(w.iter().chain(g.iter()).all(|&v| v > 0.0));
        Ok(())
    }

    #[test]
    fn test_empty_cluster_stays_finite() -> anyhow::Result<()> {
        let x = data();
        let (w, _) = initialize_with_oracle(x.view(), 2, 0, &FixedLabels(vec![0, 0, 0, 0]))?;

        assert!(w.iter().all(|v| v.is_finite()));
        assert_relative_eq!(w[[0, 1]], 0.2 / 1e-10);
        Ok(())
    }

    #[test]
    fn test_kmeans_groups_similar_columns() -> anyhow::Result<()> {
        let x = data();
        let (_, g) = initialize_kmeans(x.view(), 2, 42)?;

        assert_eq!(g[[0, 0]], g[[1, 0]]);
        assert_eq!(g[[2, 0]], g[[3, 0]]);
        assert_ne!(g[[0, 0]], g[[2, 0]]);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_oracle_output() {
        let x = data();
        assert!(matches!(
            initialize_with_oracle(x.view(), 2, 0, &FixedLabels(vec![0, 1, 2, 0])),
            Err(NmfError::InvalidLabel { label: 2, n_clusters: 2 })
        ));
        assert!(matches!(
            initialize_with_oracle(x.view(), 2, 0, &Failing),
            Err(NmfError::Clustering(_))
        ));
    }

    #[test]
    fn test_rejects_bad_rank() {
        let x = data();
        assert!(matches!(
            initialize_kmeans(x.view(), 5, 0),
            Err(NmfError::InvalidRank { rank: 5, n_cols: 4 })
        ));
    }
}
