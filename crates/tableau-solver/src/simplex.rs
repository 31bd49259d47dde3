use tracing::{debug, trace, warn};

use crate::dual::DualSimplex;
use crate::error::Result;
use crate::problem::{Model, ObjectiveSense, Relation};
use crate::solution::{Solution, SolutionStatus};
use crate::tableau::Tableau;

/// A pivoting procedure that drives a tableau to a terminal state in place.
pub trait Algorithm {
    fn solve(&self, tableau: &mut Tableau) -> SimplexOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplexOutcome {
    pub status: SolutionStatus,
    /// Pivots performed
    pub iterations: usize,
}

/// How the primal simplex picks its entering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnteringRule {
    /// Leftmost negative row 0 entry
    #[default]
    FirstNegative,
    /// Most negative row 0 entry, leftmost on ties
    MostNegative,
}

/// Primal simplex over a tableau with a nonnegative RHS column.
///
/// No anti-cycling rule: degenerate inputs can cycle until the pivot
/// ceiling turns it into [`SolutionStatus::IterationLimit`].
#[derive(Debug, Clone, Copy)]
pub struct PrimalSimplex {
    max_iterations: usize,
    tolerance: f64,
    rule: EnteringRule,
}

impl PrimalSimplex {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            rule: EnteringRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: EnteringRule) -> Self {
        self.rule = rule;
        self
    }

    /// Entering column, or `None` when the tableau is optimal.
    pub fn pivot_column(&self, tableau: &Tableau) -> Option<usize> {
        let objective = &tableau.row(0)[..tableau.rhs_column()];
        match self.rule {
            EnteringRule::FirstNegative => objective.iter().position(|&v| v < -self.tolerance),
            EnteringRule::MostNegative => {
                let mut min_val = -self.tolerance;
                let mut min_col = None;
                for (j, &v) in objective.iter().enumerate() {
                    if v < min_val {
                        min_val = v;
                        min_col = Some(j);
                    }
                }
                min_col
            }
        }
    }

    /// Minimum ratio test; ties go to the first row. `None` means unbounded.
    pub fn pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 1..tableau.rows() {
            let val = tableau.get(i, col);
            if val > self.tolerance {
                let ratio = tableau.rhs(i) / val;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }
}

impl Algorithm for PrimalSimplex {
    #[tracing::instrument(name = "primal", level = "debug", skip_all, fields(rule = ?self.rule))]
    fn solve(&self, tableau: &mut Tableau) -> SimplexOutcome {
        for iterations in 0..self.max_iterations {
            let Some(col) = self.pivot_column(tableau) else {
                debug!(iterations, objective = tableau.objective_value(), "optimal");
                return SimplexOutcome {
                    status: SolutionStatus::Optimal,
                    iterations,
                };
            };
            let Some(row) = self.pivot_row(tableau, col) else {
                debug!(iterations, column = col, "unbounded");
                return SimplexOutcome {
                    status: SolutionStatus::Unbounded,
                    iterations,
                };
            };
            trace!(row, col, element = tableau.get(row, col), "pivot");
            tableau.pivot(row, col);
        }

        if tableau.is_optimal(self.tolerance) {
            return SimplexOutcome {
                status: SolutionStatus::Optimal,
                iterations: self.max_iterations,
            };
        }
        warn!(max_iterations = self.max_iterations, "primal simplex hit the pivot ceiling");
        SimplexOutcome {
            status: SolutionStatus::IterationLimit,
            iterations: self.max_iterations,
        }
    }
}

/// Simplex solver for linear programming problems
#[derive(Debug, Clone, Copy)]
pub struct Solver {
    /// Maximum pivots per phase before giving up
    max_iterations: usize,
    /// Tolerance for pivot and sign tests
    tolerance: f64,
    /// Distance from the nearest integer still counted as integral
    integrality_tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            integrality_tolerance: 1e-5,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn integrality_tolerance(&self) -> f64 {
        self.integrality_tolerance
    }

    pub fn primal(&self) -> PrimalSimplex {
        PrimalSimplex::new(self.max_iterations, self.tolerance)
    }

    pub fn dual(&self) -> DualSimplex {
        DualSimplex::new(self.max_iterations, self.tolerance)
    }

    /// Dual simplex when some constraint row has a negative RHS, primal otherwise.
    pub fn solve_tableau(&self, tableau: &mut Tableau) -> SimplexOutcome {
        if tableau.has_negative_rhs(self.tolerance) {
            self.dual().solve(tableau)
        } else {
            self.primal().solve(tableau)
        }
    }

    /// Solves the LP relaxation of `model`, honouring its sign restrictions
    /// and equalities.
    pub fn solve(&self, model: &Model) -> Result<Solution> {
        self.solve_with_tableau(model).map(|(solution, _)| solution)
    }

    /// Like [`Solver::solve`], also returning the final tableau.
    ///
    /// The tableau belongs to the standardized model with every `=` row
    /// split into a `<=` row followed by a `>=` row; shadow prices are
    /// reported per original constraint.
    pub fn solve_with_tableau(&self, model: &Model) -> Result<(Solution, Tableau)> {
        model.validate()?;
        let standardized = model.standardized();
        let mut tableau = Tableau::build(&standardized.model.split_equalities())?;
        let outcome = self.solve_tableau(&mut tableau);

        if outcome.status != SolutionStatus::Optimal {
            return Ok((Solution::failed(outcome.status, outcome.iterations), tableau));
        }

        let values = standardized.recover(&tableau.values());
        let objective_value = model.objective_value(&values);

        let split_prices = shadow_prices(&tableau, model.objective.sense);
        let mut rows = split_prices.into_iter();
        let shadow = model
            .constraints
            .iter()
            .map(|c| match c.relation {
                Relation::Eq => rows.next().unwrap_or(0.0) + rows.next().unwrap_or(0.0),
                _ => rows.next().unwrap_or(0.0),
            })
            .collect();

        Ok((
            Solution::optimal(values, objective_value, shadow, outcome.iterations),
            tableau,
        ))
    }

    /// Every masked value lies within the integrality tolerance of an integer.
    pub fn is_integral(&self, values: &[f64], mask: &[bool]) -> bool {
        values
            .iter()
            .zip(mask)
            .all(|(&v, &integer)| !integer || (v - v.round()).abs() < self.integrality_tolerance)
    }

    /// First masked variable whose value is fractional.
    pub fn first_fractional(&self, values: &[f64], mask: &[bool]) -> Option<usize> {
        values
            .iter()
            .zip(mask)
            .position(|(&v, &integer)| integer && (v - v.round()).abs() >= self.integrality_tolerance)
    }
}

/// Shadow price of every constraint: the objective change per unit
/// increase of its RHS, read from row 0 at the constraint's slack (or
/// surplus) column.
pub fn shadow_prices(tableau: &Tableau, sense: ObjectiveSense) -> Vec<f64> {
    let sense_sign = match sense {
        ObjectiveSense::Max => 1.0,
        ObjectiveSense::Min => -1.0,
    };
    (0..tableau.num_constraints())
        .map(|k| {
            let (col, sign) = tableau.aux_columns(k).unit_column();
            let value = sense_sign * sign * tableau.get(0, col);
            if value == 0.0 { 0.0 } else { value }
        })
        .collect()
}

/// The RHS column of the constraint rows: the values of whatever is basic
/// in each row.
pub fn basic_values(tableau: &Tableau) -> Vec<f64> {
    (1..tableau.rows()).map(|i| tableau.rhs(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Model, Relation, SignRestriction};

    fn textbook() -> Model {
        Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0, 0.0], Relation::Le, 4.0)
            .with_constraint(vec![0.0, 2.0], Relation::Le, 12.0)
            .with_constraint(vec![3.0, 2.0], Relation::Le, 18.0)
    }

    #[test]
    fn test_textbook_maximization() {
        let model = textbook();
        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 2.0).abs() < 1e-6, "x1 = {} (expected 2)", solution.values[0]);
        assert!((solution.values[1] - 6.0).abs() < 1e-6, "x2 = {} (expected 6)", solution.values[1]);
        assert!((solution.objective_value - 36.0).abs() < 1e-6, "obj = {} (expected 36)", solution.objective_value);
        assert!(model.is_feasible(&solution.values, 1e-5));
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to: x + y <= 4, x <= 3, y <= 3
        // Optimal: x=3, y=1, obj=11
        let model = Model::maximize(vec![3.0, 2.0])
            .with_constraint(vec![1.0, 1.0], Relation::Le, 4.0)
            .with_constraint(vec![1.0, 0.0], Relation::Le, 3.0)
            .with_constraint(vec![0.0, 1.0], Relation::Le, 3.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to: x + y >= 4, x <= 3, y <= 3
        // Optimal: x=3, y=1, obj=9
        let model = Model::minimize(vec![2.0, 3.0])
            .with_constraint(vec![1.0, 1.0], Relation::Ge, 4.0)
            .with_constraint(vec![1.0, 0.0], Relation::Le, 3.0)
            .with_constraint(vec![0.0, 1.0], Relation::Le, 3.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 9.0).abs() < 1e-6, "obj = {} (expected 9)", solution.objective_value);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5, x <= 3
        let model = Model::minimize(vec![1.0])
            .with_constraint(vec![1.0], Relation::Ge, 5.0)
            .with_constraint(vec![1.0], Relation::Le, 3.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_unbounded() {
        let model = Model::maximize(vec![1.0, 1.0]).with_constraint(vec![1.0, -1.0], Relation::Le, 1.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_optimality_certificate() {
        let mut tableau = Tableau::build(&textbook()).unwrap();
        let outcome = Solver::new().solve_tableau(&mut tableau);

        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!(tableau.row(0)[..tableau.rhs_column()].iter().all(|&v| v >= -1e-9));
        assert!((tableau.objective_value() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolving_optimal_tableau_is_noop() {
        let solver = Solver::new();
        let mut tableau = Tableau::build(&textbook()).unwrap();
        solver.primal().solve(&mut tableau);
        let before = tableau.clone();

        let outcome = solver.primal().solve(&mut tableau);

        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(tableau, before);
    }

    #[test]
    fn test_all_le_model_stays_primal_feasible() {
        let tableau = Tableau::build(&textbook()).unwrap();
        assert!(!tableau.has_negative_rhs(1e-9));

        let mut primal_only = tableau.clone();
        let outcome = Solver::new().primal().solve(&mut primal_only);
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!(basic_values(&primal_only).iter().all(|&v| v >= -1e-9));
    }

    #[test]
    fn test_entering_rules() {
        let tableau = Tableau::build(&textbook()).unwrap();
        let solver = Solver::new();
        assert_eq!(solver.primal().pivot_column(&tableau), Some(0));
        assert_eq!(
            solver.primal().with_rule(EnteringRule::MostNegative).pivot_column(&tableau),
            Some(1)
        );
        assert_eq!(solver.primal().pivot_row(&tableau, 0), Some(1));
        assert_eq!(solver.primal().pivot_row(&tableau, 1), Some(2));
    }

    #[test]
    fn test_shadow_prices() {
        let solution = Solver::new().solve(&textbook()).unwrap();
        let expected = [0.0, 1.5, 1.0];
        for (got, want) in solution.shadow_prices.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "shadow price {} (expected {})", got, want);
        }
    }

    #[test]
    fn test_iteration_limit() {
        let solution = Solver::new().with_max_iterations(1).solve(&textbook()).unwrap();
        assert_eq!(solution.status, SolutionStatus::IterationLimit);
    }

    #[test]
    fn test_free_variable() {
        // min x1 + 2x2, x1 + x2 >= -1, x1 <= 3, x2 free
        // Optimal: x1=3, x2=-4, obj=-5
        let model = Model::minimize(vec![1.0, 2.0])
            .with_constraint(vec![1.0, 1.0], Relation::Ge, -1.0)
            .with_constraint(vec![1.0, 0.0], Relation::Le, 3.0)
            .with_sign_restrictions(vec![SignRestriction::NonNegative, SignRestriction::Free]);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x1 = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] + 4.0).abs() < 1e-6, "x2 = {} (expected -4)", solution.values[1]);
        assert!((solution.objective_value + 5.0).abs() < 1e-6, "obj = {} (expected -5)", solution.objective_value);
    }

    #[test]
    fn test_equality_is_binding() {
        // max x1 + x2, x1 + 2x2 = 4, x1 <= 2
        // Optimal: x1=2, x2=1, obj=3
        let model = Model::maximize(vec![1.0, 1.0])
            .with_constraint(vec![1.0, 2.0], Relation::Eq, 4.0)
            .with_constraint(vec![1.0, 0.0], Relation::Le, 2.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 2.0).abs() < 1e-6, "x1 = {} (expected 2)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "x2 = {} (expected 1)", solution.values[1]);
        assert_eq!(solution.shadow_prices.len(), 2);
        // one more unit of RHS on the equality is worth 0.5
        assert!((solution.shadow_prices[0] - 0.5).abs() < 1e-6, "y1 = {} (expected 0.5)", solution.shadow_prices[0]);
        assert!((solution.shadow_prices[1] - 0.5).abs() < 1e-6, "y2 = {} (expected 0.5)", solution.shadow_prices[1]);
    }

    #[test]
    fn test_tied_columns_stay_feasible() {
        // max x1 + x2, x1 + x2 <= 4: x2 ends with the same column as basic x1
        let model = Model::maximize(vec![1.0, 1.0]).with_constraint(vec![1.0, 1.0], Relation::Le, 4.0);

        let solution = Solver::new().solve(&model).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![4.0, 0.0]);
        assert!((solution.objective_value - 4.0).abs() < 1e-6, "obj = {} (expected 4)", solution.objective_value);
        assert!(model.is_feasible(&solution.values, 1e-5));
    }

    #[test]
    fn test_malformed_model_is_an_error() {
        let model = Model::maximize(vec![1.0, 1.0]).with_constraint(vec![1.0], Relation::Le, 1.0);
        assert!(Solver::new().solve(&model).is_err());
    }
}
