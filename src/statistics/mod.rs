//! Reporting helpers for factorization results: sparsity of factor matrices and
//! confusion matrices for comparing recovered clusters against known labels.

use std::collections::BTreeSet;

use anyhow::bail;
use ndarray::{Array2, ArrayView2, Axis};

use crate::utils::{Direction, Normalize};

/// Relative threshold, as a fraction of the column mean, below which entries count as zero.
const SPARSITY_THRESHOLD: f64 = 0.001;

/// Zeroes every entry below `0.001 ×` its column mean.
///
/// Returns the thresholded matrix and the fraction of entries that remain non-zero.
pub fn compute_sparsity(x: ArrayView2<f64>) -> anyhow::Result<(Array2<f64>, f64)> {
    let (m, n) = x.dim();
    if m == 0 || n == 0 {
        bail!("Cannot compute sparsity of an empty matrix");
    }

    let mut sparse = x.to_owned();
    for mut col in sparse.columns_mut() {
        let threshold = SPARSITY_THRESHOLD * col.mean().unwrap_or(0.0);
        col.mapv_inplace(|v| if v < threshold { 0.0 } else { v });
    }

    let non_zero = sparse.iter().filter(|&&v| v != 0.0).count();
    Ok((sparse, non_zero as f64 / (m * n) as f64))
}

/// Counts of (true, predicted) label pairs.
///
/// Rows index true labels, columns predicted labels, both in the order of the returned
/// label list (the sorted union of both inputs).
pub fn confusion_matrix<L>(y_true: &[L], y_pred: &[L]) -> anyhow::Result<(Vec<L>, Array2<usize>)>
where
    L: Ord + Clone,
{
    if y_true.len() != y_pred.len() {
        bail!(
            "Length of true labels ({}) does not match length of predicted labels ({})",
            y_true.len(),
            y_pred.len()
        );
    }

    let labels: Vec<L> = y_true
        .iter()
        .chain(y_pred.iter())
        .cloned()
        .collect::<BTreeSet<L>>()
        .into_iter()
        .collect();

    let mut counts = Array2::<usize>::zeros((labels.len(), labels.len()));
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        // Both lookups succeed: every label went into the sorted list above.
        if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
            counts[[i, j]] += 1;
        }
    }

    Ok((labels, counts))
}

/// Row-normalizes a confusion matrix so every row with observations sums to one.
pub fn normalize_confusion(counts: &Array2<usize>) -> anyhow::Result<Array2<f64>> {
    let mut normalized = counts.mapv(|c| c as f64);
    let sums: Vec<f64> = normalized
        .sum_axis(Axis(1))
        .iter()
        .map(|&s| if s == 0.0 { 1.0 } else { s })
        .collect();
    normalized.normalize(&sums, 1.0, &Direction::ROW)?;
    Ok(normalized)
}
