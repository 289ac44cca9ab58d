use anyhow::bail;
use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::clustering::ClusteringOracle;

/// Lloyd's k-means with k-means++ seeding.
///
/// Runs `n_init` independently seeded restarts and keeps the partition with the lowest
/// inertia. All randomness comes from a generator seeded with the `random_state` passed
/// to [`ClusteringOracle::fit_predict`], so results are reproducible.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_init: usize,
    max_iter: usize,
    tolerance: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

impl KMeans {
    /// Creates a k-means oracle with the default settings.
    ///
    /// # Returns
    /// An oracle running 10 restarts of at most 300 Lloyd iterations each, with a
    /// centroid shift tolerance of 1e-4. Adjust with the setters below.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of seeded restarts, at least 1.
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Centroid shift tolerance, relative to the mean per-feature variance of the data.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn seed_centroids<R: Rng>(
        points: ArrayView2<f64>,
        n_clusters: usize,
        rng: &mut R,
    ) -> Array2<f64> {
        let n_points = points.nrows();
        let mut centroids = Array2::zeros((n_clusters, points.ncols()));

        let first = rng.random_range(0..n_points);
        centroids.row_mut(0).assign(&points.row(first));

        let mut closest: Vec<f64> = points
            .rows()
            .into_iter()
            .map(|p| squared_distance(p, points.row(first)))
            .collect();

        for c in 1..n_clusters {
            let total: f64 = closest.iter().sum();
            let chosen = if total > 0.0 {
                let target = rng.random::<f64>() * total;
                let mut cumulative = 0.0;
                let mut chosen = closest
                    .iter()
                    .rposition(|&d| d > 0.0)
                    .unwrap_or(n_points - 1);
                for (idx, &d) in closest.iter().enumerate() {
                    cumulative += d;
                    if d > 0.0 && cumulative > target {
                        chosen = idx;
                        break;
                    }
                }
                chosen
            } else {
                rng.random_range(0..n_points)
            };

            centroids.row_mut(c).assign(&points.row(chosen));
            for (idx, p) in points.rows().into_iter().enumerate() {
                let d = squared_distance(p, points.row(chosen));
                if d < closest[idx] {
                    closest[idx] = d;
                }
            }
        }

        centroids
    }

    fn assign(points: ArrayView2<f64>, centroids: &Array2<f64>) -> (Vec<usize>, f64) {
        let mut inertia = 0.0;
        let labels = points
            .rows()
            .into_iter()
            .map(|p| {
                let mut best = (0, f64::INFINITY);
                for (c, centroid) in centroids.rows().into_iter().enumerate() {
                    let d = squared_distance(p, centroid);
                    if d < best.1 {
                        best = (c, d);
                    }
                }
                inertia += best.1;
                best.0
            })
            .collect();
        (labels, inertia)
    }

    fn lloyd(
        &self,
        points: ArrayView2<f64>,
        mut centroids: Array2<f64>,
        shift_tol: f64,
    ) -> (Vec<usize>, f64) {
        let n_clusters = centroids.nrows();

        for iter in 0..self.max_iter {
            let (labels, _) = Self::assign(points, &centroids);

            let mut sums = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; n_clusters];
            for (p, &label) in points.rows().into_iter().zip(labels.iter()) {
                let mut row = sums.row_mut(label);
                row += &p;
                counts[label] += 1;
            }

            let mut shift = 0.0;
            for (c, count) in counts.iter().enumerate() {
                // Empty clusters keep their previous centroid.
                if *count == 0 {
                    continue;
                }
                let updated = sums.row(c).mapv(|v| v / *count as f64);
                shift += squared_distance(updated.view(), centroids.row(c));
                centroids.row_mut(c).assign(&updated);
            }

            if shift <= shift_tol {
                debug!("k-means converged after {} iterations", iter + 1);
                break;
            }
        }

        Self::assign(points, &centroids)
    }
}

impl ClusteringOracle for KMeans {
    fn fit_predict(
        &self,
        points: ArrayView2<f64>,
        n_clusters: usize,
        random_state: u64,
    ) -> anyhow::Result<Vec<usize>> {
        let n_points = points.nrows();
        if n_clusters == 0 {
            bail!("Number of clusters must be at least 1");
        }
        if n_clusters > n_points {
            bail!(
                "Cannot form {} clusters from {} points",
                n_clusters,
                n_points
            );
        }
        if points.iter().any(|v| !v.is_finite()) {
            bail!("Points contain NaN or infinite values");
        }

        let mean_variance = points
            .var_axis(Axis(0), 0.0)
            .mean()
            .unwrap_or(0.0);
        let shift_tol = self.tolerance * mean_variance;

        let mut rng = ChaCha8Rng::seed_from_u64(random_state);
        let mut best: Option<(Vec<usize>, f64)> = None;

        for run in 0..self.n_init {
            let centroids = Self::seed_centroids(points, n_clusters, &mut rng);
            let (labels, inertia) = self.lloyd(points, centroids, shift_tol);
            debug!("k-means run {} finished with inertia {:.6e}", run, inertia);

            let improves = match &best {
                Some((_, best_inertia)) => inertia < *best_inertia,
                None => true,
            };
            if improves {
                best = Some((labels, inertia));
            }
        }

        match best {
            Some((labels, _)) => Ok(labels),
            None => bail!("k-means did not run"),
        }
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
