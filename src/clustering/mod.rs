use ndarray::ArrayView2;

pub(crate) mod kmeans;
pub use kmeans::KMeans;

/// Produces a hard partition of the rows of `points`.
///
/// Implementations must be deterministic for a given `random_state`. Returning fewer
/// than `n_clusters` distinct labels (empty clusters) is allowed.
pub trait ClusteringOracle {
    /// Assigns every row of `points` to a cluster.
    ///
    /// # Parameters
    /// - `points`: One point per row
    /// - `n_clusters`: Number of clusters requested
    /// - `random_state`: Seed for any randomized step
    ///
    /// # Returns
    /// - `Ok(labels)`: One label in `0..n_clusters` per row
    /// - `Err`: The points could not be clustered
    fn fit_predict(
        &self,
        points: ArrayView2<f64>,
        n_clusters: usize,
        random_state: u64,
    ) -> anyhow::Result<Vec<usize>>;
}

impl<C: ClusteringOracle + ?Sized> ClusteringOracle for &C {
    fn fit_predict(
        &self,
        points: ArrayView2<f64>,
        n_clusters: usize,
        random_state: u64,
    ) -> anyhow::Result<Vec<usize>> {
        (**self).fit_predict(points, n_clusters, random_state)
    }
}
