use ndarray::ArrayView2;

use crate::dense::{check_shape, frobenius_norm};
use crate::nmf::NmfError;

/// Complementary-slackness residual of a convex NMF solution.
///
/// Returns `‖(−XᵗX·G + XᵗX·W·GᵗG) ⊙ W²‖_F`; zero at a stationary point of
/// `‖X − X·W·Gᵗ‖²_F`. `g` and `w` are both n × r. Not used by the solver itself.
pub fn check_kkt(
    x: ArrayView2<f64>,
    g: ArrayView2<f64>,
    w: ArrayView2<f64>,
) -> Result<f64, NmfError> {
    let n = x.ncols();
    check_shape("KKT check (G)", (n, g.ncols()), g.dim())?;
    check_shape("KKT check (W)", g.dim(), w.dim())?;

    let gram = x.t().dot(&x);
    let gradient = gram.dot(&w).dot(&g.t().dot(&g)) - gram.dot(&g);
    let slackness = gradient * &w.mapv(|v| v * v);
    Ok(frobenius_norm(slackness.view()))
}
