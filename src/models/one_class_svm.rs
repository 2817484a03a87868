//! One-class SVM outlier detector (RBF kernel)
//!
//! Solves the nu-parameterized dual
//!
//! ```text
//! min 0.5 * a'Qa   s.t.  0 <= a_i <= 1,  sum(a) = nu * n
//! ```
//!
//! with sequential minimal optimization. Kernel values are computed on demand,
//! so memory stays linear in the batch size.

use crate::error::{Result, ScoringError};
use crate::models::{squared_distance, OutlierDetector, ANOMALY, NORMAL};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

/// Floor for non-positive curvature in the pair update
const TAU: f64 = 1e-12;
const UPPER_BOUND: f64 = 1.0;

/// Dual variables and offset of a solved problem
#[derive(Debug, Clone)]
struct DualSolution {
    alpha: Vec<f64>,
    /// `Q * alpha`, i.e. the un-offset decision value of each training row
    gradient: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// Boundary-based detector: rows outside the learned support are anomalies.
#[derive(Debug, Clone)]
pub struct OneClassSvm {
    nu: f64,
    gamma: f64,
    tolerance: f64,
}

impl OneClassSvm {
    pub fn new(nu: f64, gamma: f64, tolerance: f64) -> Self {
        Self {
            nu,
            gamma,
            tolerance,
        }
    }

    fn kernel(&self, x: &Array2<f64>, a: usize, b: usize) -> f64 {
        (-self.gamma * squared_distance(x, a, b)).exp()
    }

    fn validate(&self) -> Result<()> {
        let reason = if !(self.nu > 0.0 && self.nu < 1.0) {
            "nu must be in (0, 1)"
        } else if self.gamma <= 0.0 {
            "gamma must be positive"
        } else if self.tolerance <= 0.0 {
            "tolerance must be positive"
        } else {
            return Ok(());
        };
        Err(ScoringError::Detector {
            detector: self.name(),
            reason: reason.to_string(),
        })
    }

    fn solve(&self, x: &Array2<f64>) -> DualSolution {
        let n = x.nrows();
        let total = self.nu * n as f64;

        // Feasible start: fill the first floor(nu * n) multipliers
        let mut alpha = vec![0.0; n];
        let n_full = (total.floor() as usize).min(n);
        for a in alpha.iter_mut().take(n_full) {
            *a = UPPER_BOUND;
        }
        if n_full < n {
            alpha[n_full] = total - n_full as f64;
        }

        let mut gradient: Vec<f64> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| alpha[j] > 0.0)
                    .map(|j| alpha[j] * self.kernel(x, i, j))
                    .sum()
            })
            .collect();

        let max_iter = n.saturating_mul(100).max(10_000_000);
        let mut iterations = 0;
        while iterations < max_iter {
            let Some((i, j)) = self.select_working_set(x, &alpha, &gradient) else {
                break;
            };
            iterations += 1;

            let (old_i, old_j) = (alpha[i], alpha[j]);
            let quad = (2.0 - 2.0 * self.kernel(x, i, j)).max(TAU);
            let delta = (gradient[i] - gradient[j]) / quad;
            let sum = old_i + old_j;
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > UPPER_BOUND {
                if alpha[i] > UPPER_BOUND {
                    alpha[i] = UPPER_BOUND;
                    alpha[j] = sum - UPPER_BOUND;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > UPPER_BOUND {
                if alpha[j] > UPPER_BOUND {
                    alpha[j] = UPPER_BOUND;
                    alpha[i] = sum - UPPER_BOUND;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }

            let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
            for (t, g) in gradient.iter_mut().enumerate() {
                *g += self.kernel(x, t, i) * delta_i + self.kernel(x, t, j) * delta_j;
            }
        }

        if iterations >= max_iter {
            warn!(iterations = iterations, "One-class SVM reached the iteration limit");
        }

        let rho = Self::offset(&alpha, &gradient);
        DualSolution {
            alpha,
            gradient,
            rho,
            iterations,
        }
    }

    /// Maximal violating pair with second-order choice of `j`; `None` once
    /// the KKT gap is within tolerance.
    fn select_working_set(
        &self,
        x: &Array2<f64>,
        alpha: &[f64],
        gradient: &[f64],
    ) -> Option<(usize, usize)> {
        let mut g_max = f64::NEG_INFINITY;
        let mut i = None;
        for (t, (&a, &g)) in alpha.iter().zip(gradient).enumerate() {
            if a < UPPER_BOUND && -g >= g_max {
                g_max = -g;
                i = Some(t);
            }
        }
        let i = i?;

        let mut g_max2 = f64::NEG_INFINITY;
        let mut j = None;
        let mut best = f64::INFINITY;
        for (t, (&a, &g)) in alpha.iter().zip(gradient).enumerate() {
            if a <= 0.0 {
                continue;
            }
            g_max2 = g_max2.max(g);
            let grad_diff = g_max + g;
            if grad_diff > 0.0 {
                let quad = (2.0 - 2.0 * self.kernel(x, i, t)).max(TAU);
                let objective = -(grad_diff * grad_diff) / quad;
                if objective <= best {
                    best = objective;
                    j = Some(t);
                }
            }
        }

        if g_max + g_max2 < self.tolerance {
            return None;
        }
        j.map(|j| (i, j))
    }

    /// Offset from the free multipliers, or the midpoint of the feasible
    /// interval when every multiplier sits at a bound.
    fn offset(alpha: &[f64], gradient: &[f64]) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut free_count = 0usize;

        for (&a, &g) in alpha.iter().zip(gradient) {
            if a >= UPPER_BOUND {
                lower = lower.max(g);
            } else if a <= 0.0 {
                upper = upper.min(g);
            } else {
                free_sum += g;
                free_count += 1;
            }
        }

        if free_count > 0 {
            free_sum / free_count as f64
        } else if upper.is_finite() && lower.is_finite() {
            (upper + lower) / 2.0
        } else if upper.is_finite() {
            upper
        } else {
            lower
        }
    }

    /// Signed distance to the learned boundary for every training row;
    /// negative is outside.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.validate()?;
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }

        let solution = self.solve(x);
        let support_vectors = solution.alpha.iter().filter(|&&a| a > 0.0).count();
        debug!(
            iterations = solution.iterations,
            support_vectors = support_vectors,
            rho = solution.rho,
            "One-class SVM solved"
        );

        Ok(solution.gradient.iter().map(|&g| g - solution.rho).collect())
    }
}

impl Default for OneClassSvm {
    fn default() -> Self {
        Self::new(
            crate::config::SVM_NU,
            crate::config::SVM_GAMMA,
            crate::config::SVM_TOLERANCE,
        )
    }
}

impl OutlierDetector for OneClassSvm {
    fn name(&self) -> &'static str {
        "one_class_svm"
    }

    fn column(&self) -> &'static str {
        "SVM_outlier"
    }

    fn fit_predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let decision = self.decision_function(x)?;
        // Rows on the boundary within solver tolerance count as inside
        Ok(decision.mapv(|d| if d < -self.tolerance { ANOMALY } else { NORMAL }))
    }
}
