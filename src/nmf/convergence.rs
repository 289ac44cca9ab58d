use log::{debug, info};
use ndarray::{s, Array1};

/// Called once per completed iteration with the iteration index and its residual.
///
/// The iteration boundary is the only point where a caller can look at a running
/// factorization.
pub trait IterationObserver {
    fn on_iteration(&mut self, iteration: usize, residual: f64);
}

impl<F> IterationObserver for F
where
    F: FnMut(usize, f64),
{
    fn on_iteration(&mut self, iteration: usize, residual: f64) {
        self(iteration, residual)
    }
}

/// Observer that ignores every iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IterationObserver for NoopObserver {
    fn on_iteration(&mut self, _iteration: usize, _residual: f64) {}
}

/// Writes progress through the `log` facade: every residual at debug level and the
/// relative change at info level every `every` iterations.
#[derive(Debug, Clone)]
pub struct LogObserver {
    every: usize,
    previous: Option<f64>,
}

impl LogObserver {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            previous: None,
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl IterationObserver for LogObserver {
    fn on_iteration(&mut self, iteration: usize, residual: f64) {
        debug!("Residual at iteration {}: {:.6e}", iteration, residual);
        if let Some(previous) = self.previous {
            if iteration > 1 && iteration % self.every == 0 {
                info!(
                    "Relative error at iteration {}: {:.6e}",
                    iteration,
                    StoppingRule::RelativeChange.relative_change(previous, residual)
                );
            }
        }
        self.previous = Some(residual);
    }
}

/// When a run may stop before its iteration budget is spent.
///
/// Both rules are only checked from the third iteration (index 2) on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingRule {
    /// Stop once `|r_i - r_{i-1}| / |r_{i-1}|` drops below the tolerance, whichever
    /// direction the residual moved. Used by convex NMF.
    RelativeChange,
    /// Stop only if the residual strictly decreased and the relative change is below
    /// the tolerance. Used by standard NMF.
    StrictDecrease,
}

impl StoppingRule {
    pub fn relative_change(&self, previous: f64, current: f64) -> f64 {
        match self {
            StoppingRule::RelativeChange => {
                if previous == 0.0 {
                    if current == 0.0 {
                        0.0
                    } else {
                        f64::INFINITY
                    }
                } else {
                    (current - previous).abs() / previous.abs()
                }
            }
            StoppingRule::StrictDecrease => {
                (current - previous).abs() / (previous + f64::EPSILON).abs()
            }
        }
    }

    pub fn is_satisfied(&self, previous: f64, current: f64, tol: f64) -> bool {
        let close = self.relative_change(previous, current) < tol;
        match self {
            StoppingRule::RelativeChange => close,
            StoppingRule::StrictDecrease => previous > current && close,
        }
    }
}

/// Residual history of one run, preallocated to the iteration budget.
#[derive(Debug)]
pub(crate) struct ResidualTrace {
    values: Array1<f64>,
    rule: StoppingRule,
    tol: f64,
}

impl ResidualTrace {
    pub(crate) fn new(max_iter: usize, rule: StoppingRule, tol: f64) -> Self {
        Self {
            values: Array1::zeros(max_iter),
            rule,
            tol,
        }
    }

    /// Stores the residual of `iteration` and reports whether the stopping rule fired.
    pub(crate) fn record(&mut self, iteration: usize, residual: f64) -> bool {
        self.values[iteration] = residual;
        iteration > 1 && self.rule.is_satisfied(self.values[iteration - 1], residual, self.tol)
    }

    /// History of the first `completed` iterations.
    pub(crate) fn finish(self, completed: usize) -> Array1<f64> {
        let completed = completed.min(self.values.len());
        self.values.slice(s![..completed]).to_owned()
    }

    pub(crate) fn budget(&self) -> usize {
        self.values.len()
    }
}

/// Drives the shared iteration discipline: run `step` until the stopping rule fires
/// or the budget is spent, notify the observer after each iteration.
///
/// Returns the truncated history and whether the rule fired.
pub(crate) fn run_iterations<E, S, O>(
    mut trace: ResidualTrace,
    observer: &mut O,
    mut step: S,
) -> Result<(Array1<f64>, bool), E>
where
    S: FnMut(usize) -> Result<f64, E>,
    O: IterationObserver + ?Sized,
{
    let budget = trace.budget();
    for iteration in 0..budget {
        let residual = step(iteration)?;
        let stop = trace.record(iteration, residual);
        observer.on_iteration(iteration, residual);

        if stop {
            info!("Convergence achieved at iteration {}", iteration);
            return Ok((trace.finish(iteration + 1), true));
        }
    }

    info!("{} iterations completed without convergence", budget);
    Ok((trace.finish(budget), false))
}
