use anyhow::bail;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use num_traits::Float;

use crate::nmf::NmfError;
use crate::utils::{argmax, Direction, Normalize};

impl<T: Float> Normalize<T> for Array2<T> {
    fn normalize(&mut self, sums: &[T], target: T, direction: &Direction) -> anyhow::Result<()> {
        match direction {
            Direction::ROW => {
                if sums.len() != self.nrows() {
                    bail!(
                        "Length of sums ({}) does not match number of rows ({})",
                        sums.len(),
                        self.nrows()
                    );
                }

                for (i, row) in self.rows_mut().into_iter().enumerate() {
                    let scale = target / sums[i];
                    for val in row {
                        *val = *val * scale;
                    }
                }
            }
            Direction::COLUMN => {
                if sums.len() != self.ncols() {
                    bail!(
                        "Length of sums ({}) does not match number of columns ({})",
                        sums.len(),
                        self.ncols()
                    );
                }

                for (j, col) in self.columns_mut().into_iter().enumerate() {
                    let scale = target / sums[j];
                    for val in col {
                        *val = *val * scale;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Entrywise non-negative halves of a signed matrix, `m = pos - neg`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedParts {
    /// `(|m| + m) / 2`
    pub pos: Array2<f64>,
    /// `(|m| - m) / 2`
    pub neg: Array2<f64>,
}

impl SignedParts {
    /// Reassembles `pos - neg`.
    pub fn combine(&self) -> Array2<f64> {
        &self.pos - &self.neg
    }
}

/// Splits `m` into its non-negative and non-positive parts.
///
/// # Parameters
/// - `m`: Any real matrix; NaN entries propagate into both parts.
///
/// # Returns
/// [`SignedParts`] with `pos = (|m| + m) / 2` and `neg = (|m| - m) / 2`, both
/// entrywise non-negative and shaped like `m`.
pub fn separate_signed(m: ArrayView2<f64>) -> SignedParts {
    SignedParts {
        pos: m.mapv(|v| 0.5 * (v.abs() + v)),
        neg: m.mapv(|v| 0.5 * (v.abs() - v)),
    }
}

/// How the numerator/denominator ratio scales the current factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateRule {
    /// `x <- x * sqrt((numer + eps) / (denom + eps))`
    SquareRootRatio,
    /// `x <- x * numer / (denom + eps)`
    Ratio,
}

pub(crate) fn check_shape(
    context: &'static str,
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<(), NmfError> {
    if expected != found {
        return Err(NmfError::ShapeMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}

/// Applies one multiplicative update to `target` in place.
///
/// `numer` and `denom` must both have the shape of `target`; nothing is broadcast.
pub(crate) fn multiplicative_update(
    context: &'static str,
    target: &mut Array2<f64>,
    numer: &Array2<f64>,
    denom: &Array2<f64>,
    eps: f64,
    rule: UpdateRule,
) -> Result<(), NmfError> {
    check_shape(context, numer.dim(), denom.dim())?;
    check_shape(context, target.dim(), numer.dim())?;

    match rule {
        UpdateRule::SquareRootRatio => {
            Zip::from(target)
                .and(numer)
                .and(denom)
                .for_each(|t, &n, &d| *t *= ((n + eps) / (d + eps)).sqrt());
        }
        UpdateRule::Ratio => {
            Zip::from(target)
                .and(numer)
                .and(denom)
                .for_each(|t, &n, &d| *t *= n / (d + eps));
        }
    }
    Ok(())
}

/// Rescales each column of `w` to sum to one. Columns summing to zero are left as they are.
pub(crate) fn normalize_columns(w: &mut Array2<f64>) -> anyhow::Result<()> {
    let sums: Vec<f64> = w
        .sum_axis(Axis(0))
        .iter()
        .map(|&s| if s == 0.0 { 1.0 } else { s })
        .collect();
    w.normalize(&sums, 1.0, &Direction::COLUMN)
}

/// `0.5 * ||x - approx||_F^2`
pub(crate) fn half_squared_residual(x: ArrayView2<f64>, approx: ArrayView2<f64>) -> f64 {
    let sum = Zip::from(&x)
        .and(&approx)
        .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b));
    0.5 * sum
}

pub(crate) fn frobenius_norm(m: ArrayView2<f64>) -> f64 {
    m.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Index of the largest entry in every row.
pub fn argmax_rows(m: ArrayView2<f64>) -> Vec<usize> {
    m.rows()
        .into_iter()
        .map(|row| argmax(row.iter()).unwrap_or(0))
        .collect()
}
