use tracing::{debug, trace, warn};

use crate::simplex::{Algorithm, EnteringRule, PrimalSimplex, SimplexOutcome};
use crate::solution::SolutionStatus;
use crate::tableau::Tableau;

/// Dual simplex: restores a nonnegative RHS column, then hands the tableau
/// to a primal phase that enters on the most negative row 0 entry.
#[derive(Debug, Clone, Copy)]
pub struct DualSimplex {
    max_iterations: usize,
    tolerance: f64,
}

impl DualSimplex {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    /// Constraint row with the most negative RHS; `None` once feasible.
    pub fn pivot_row(&self, tableau: &Tableau) -> Option<usize> {
        let mut min_val = -self.tolerance;
        let mut min_row = None;

        for i in 1..tableau.rows() {
            let rhs = tableau.rhs(i);
            if rhs < min_val {
                min_val = rhs;
                min_row = Some(i);
            }
        }

        min_row
    }

    /// Among negative entries of the pivot row, the column minimizing
    /// `|row 0 entry / pivot row entry|`. `None` means infeasible.
    pub fn pivot_column(&self, tableau: &Tableau, row: usize) -> Option<usize> {
        let mut min_ratio = f64::INFINITY;
        let mut min_col = None;

        for j in 0..tableau.rhs_column() {
            let val = tableau.get(row, j);
            if val < -self.tolerance {
                let ratio = (tableau.get(0, j) / val).abs();
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_col = Some(j);
                }
            }
        }

        min_col
    }

    fn primal_phase(&self) -> PrimalSimplex {
        PrimalSimplex::new(self.max_iterations, self.tolerance).with_rule(EnteringRule::MostNegative)
    }
}

impl Algorithm for DualSimplex {
    #[tracing::instrument(name = "dual", level = "debug", skip_all)]
    fn solve(&self, tableau: &mut Tableau) -> SimplexOutcome {
        for iterations in 0..self.max_iterations {
            let Some(row) = self.pivot_row(tableau) else {
                debug!(iterations, "feasible, switching to primal phase");
                let primal = self.primal_phase().solve(tableau);
                return SimplexOutcome {
                    status: primal.status,
                    iterations: iterations + primal.iterations,
                };
            };
            let Some(col) = self.pivot_column(tableau, row) else {
                debug!(iterations, row, "no negative entry in pivot row, infeasible");
                return SimplexOutcome {
                    status: SolutionStatus::Infeasible,
                    iterations,
                };
            };
            trace!(row, col, element = tableau.get(row, col), "dual pivot");
            tableau.pivot(row, col);
        }

        if !tableau.has_negative_rhs(self.tolerance) {
            let primal = self.primal_phase().solve(tableau);
            return SimplexOutcome {
                status: primal.status,
                iterations: self.max_iterations + primal.iterations,
            };
        }
        warn!(max_iterations = self.max_iterations, "dual simplex hit the pivot ceiling");
        SimplexOutcome {
            status: SolutionStatus::IterationLimit,
            iterations: self.max_iterations,
        }
    }
}
