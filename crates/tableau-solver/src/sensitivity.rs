//! Post-optimal analysis against a solved tableau.
//!
//! The range queries read the tableau as it is. The `apply_*` operations
//! and [`Sensitivity::set_cell`] edit it in place and never pivot; call
//! [`Sensitivity::resolve`] to restore an optimum after an edit.

use tracing::debug;

use crate::error::{Error, Result};
use crate::problem::{Constraint, Model, ObjectiveSense, SignRestriction};
use crate::simplex::{Solver, shadow_prices};
use crate::solution::{Analysis, Range, ReducedCost, SensitivityRange, ShadowPrice, Solution, SolutionStatus};
use crate::tableau::Tableau;

/// A model together with its (solved) tableau.
#[derive(Debug, Clone)]
pub struct Sensitivity {
    model: Model,
    tableau: Tableau,
    tolerance: f64,
}

impl Sensitivity {
    /// Pairs `model` with a tableau built from it.
    pub fn new(model: Model, tableau: Tableau) -> Result<Self> {
        model.validate()?;
        if tableau.num_variables() != model.num_variables() || tableau.num_constraints() != model.num_constraints() {
            return Err(Error::TableauShape {
                variables: tableau.num_variables(),
                constraints: tableau.num_constraints(),
            });
        }
        Ok(Self {
            model,
            tableau,
            tolerance: 1e-9,
        })
    }

    /// Solves `model` and keeps the optimal tableau.
    ///
    /// Every variable must be nonnegative so tableau columns line up with
    /// the model's variables. `=` rows are split into a `<=`/`>=` pair
    /// first, and the held model is the split one.
    pub fn solve(solver: &Solver, model: Model) -> Result<Self> {
        model.validate()?;
        let model = model.split_equalities();
        if let Some((variable, &restriction)) = model
            .sign_restrictions
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_nonnegative())
        {
            return Err(Error::UnsupportedSignRestriction { variable, restriction });
        }

        let mut tableau = Tableau::build(&model)?;
        let outcome = solver.solve_tableau(&mut tableau);
        if outcome.status != SolutionStatus::Optimal {
            return Err(Error::NotOptimal(outcome.status));
        }
        Ok(Self {
            model,
            tableau,
            tolerance: solver.tolerance(),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    pub fn values(&self) -> Vec<f64> {
        self.tableau.values()
    }

    pub fn objective_value(&self) -> f64 {
        self.model.objective_value(&self.values())
    }

    fn sense_sign(&self) -> f64 {
        match self.model.objective.sense {
            ObjectiveSense::Max => 1.0,
            ObjectiveSense::Min => -1.0,
        }
    }

    fn check_nonbasic(&self, variable: usize) -> Result<()> {
        self.model.check_variable(variable)?;
        if self.tableau.basic_row(variable).is_some() {
            return Err(Error::BasicVariable(variable));
        }
        Ok(())
    }

    fn basic_row(&self, variable: usize) -> Result<usize> {
        self.model.check_variable(variable)?;
        self.tableau.basic_row(variable).ok_or(Error::NotBasic(variable))
    }

    /// Ratio range of a non-basic column against the RHS column: positive
    /// entries cap the upper end at `rhs / entry`, negative entries raise
    /// the lower end to `rhs / entry`.
    pub fn nonbasic_variable_range(&self, variable: usize) -> Result<Range> {
        self.check_nonbasic(variable)?;
        let mut range = Range::unbounded();
        for i in 1..self.tableau.rows() {
            let entry = self.tableau.get(i, variable);
            if entry > self.tolerance {
                range.max = range.max.min(self.tableau.rhs(i) / entry);
            } else if entry < -self.tolerance {
                range.min = range.min.max(self.tableau.rhs(i) / entry);
            }
        }
        Ok(range)
    }

    /// Symmetric ratio range of a basic variable over the rows other than
    /// its own: each positive `rhs / entry` tightens both `max` and `-min`.
    pub fn basic_variable_range(&self, variable: usize) -> Result<Range> {
        let own = self.basic_row(variable)?;
        let mut range = Range::unbounded();
        for i in (1..self.tableau.rows()).filter(|&i| i != own) {
            let entry = self.tableau.get(i, variable);
            if entry.abs() <= self.tolerance {
                continue;
            }
            let ratio = self.tableau.rhs(i) / entry;
            if ratio > 0.0 {
                range.max = range.max.min(ratio);
                range.min = range.min.max(-ratio);
            }
        }
        Ok(range)
    }

    /// Interval of the constraint's RHS over which the current basis stays
    /// feasible.
    pub fn rhs_range(&self, constraint: usize) -> Result<Range> {
        self.model.check_constraint(constraint)?;
        let (col, sign) = self.tableau.aux_columns(constraint).unit_column();

        // shift of the stored RHS keeping every basic value nonnegative
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        for i in 1..self.tableau.rows() {
            let entry = self.tableau.get(i, col);
            let limit = -self.tableau.rhs(i) / entry;
            if entry > self.tolerance {
                lo = lo.max(limit);
            } else if entry < -self.tolerance {
                hi = hi.min(limit);
            }
        }
        if sign < 0.0 {
            (lo, hi) = (-hi, -lo);
        }

        let rhs = self.model.constraints[constraint].rhs;
        Ok(Range {
            min: rhs + lo,
            max: rhs + hi,
        })
    }

    /// Interval of the variable's objective coefficient over which the
    /// current basis stays optimal.
    pub fn cost_range(&self, variable: usize) -> Result<Range> {
        self.model.check_variable(variable)?;
        let c = self.model.objective.coefficients[variable];
        let objective = self.tableau.row(0);

        // allowed shift of the internal (maximized) coefficient
        let (lo, hi) = match self.tableau.basic_row(variable) {
            None => (f64::NEG_INFINITY, objective[variable]),
            Some(r) => {
                let mut lo = f64::NEG_INFINITY;
                let mut hi = f64::INFINITY;
                for k in (0..self.tableau.rhs_column()).filter(|&k| k != variable) {
                    let a = self.tableau.get(r, k);
                    let limit = -objective[k] / a;
                    if a > self.tolerance {
                        lo = lo.max(limit);
                    } else if a < -self.tolerance {
                        hi = hi.min(limit);
                    }
                }
                (lo, hi)
            }
        };

        Ok(match self.model.objective.sense {
            ObjectiveSense::Max => Range {
                min: c + lo,
                max: c + hi,
            },
            ObjectiveSense::Min => Range {
                min: c - hi,
                max: c - lo,
            },
        })
    }

    pub fn shadow_prices(&self) -> Vec<f64> {
        shadow_prices(&self.tableau, self.model.objective.sense)
    }

    /// Objective change per unit increase of each variable from its
    /// current value; zero for basic variables.
    pub fn reduced_costs(&self) -> Vec<ReducedCost> {
        let values = self.values();
        (0..self.model.num_variables())
            .map(|j| {
                let is_basic = self.tableau.basic_row(j).is_some();
                let d = -self.sense_sign() * self.tableau.get(0, j);
                ReducedCost {
                    variable: j,
                    value: values[j],
                    reduced_cost: if is_basic || d == 0.0 { 0.0 } else { d },
                    is_basic,
                }
            })
            .collect()
    }

    /// Constraints satisfied with equality at the current solution.
    pub fn binding_constraints(&self) -> Vec<usize> {
        let values = self.values();
        self.model
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| (c.lhs(&values) - c.rhs).abs() < 1e-6)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn analysis(&self) -> Result<Analysis> {
        let objective_sensitivity = (0..self.model.num_variables())
            .map(|j| {
                self.cost_range(j).map(|r| SensitivityRange {
                    index: j,
                    current: self.model.objective.coefficients[j],
                    lower_bound: r.min,
                    upper_bound: r.max,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let rhs_sensitivity = (0..self.model.num_constraints())
            .map(|i| {
                self.rhs_range(i).map(|r| SensitivityRange {
                    index: i,
                    current: self.model.constraints[i].rhs,
                    lower_bound: r.min,
                    upper_bound: r.max,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Analysis {
            shadow_prices: self
                .shadow_prices()
                .into_iter()
                .enumerate()
                .map(|(constraint, value)| ShadowPrice { constraint, value })
                .collect(),
            reduced_costs: self.reduced_costs(),
            binding_constraints: self.binding_constraints(),
            objective_sensitivity,
            rhs_sensitivity,
        })
    }

    /// Sets the objective coefficient of a non-basic variable, adjusting
    /// its row 0 entry. Nothing is re-solved.
    pub fn apply_nonbasic_change(&mut self, variable: usize, coefficient: f64) -> Result<&Tableau> {
        self.check_nonbasic(variable)?;
        let delta = self.internal_delta(variable, coefficient)?;
        let current = self.tableau.get(0, variable);
        self.tableau.set(0, variable, current - delta)?;
        self.model.objective.coefficients[variable] = coefficient;
        debug!(variable, coefficient, "non-basic cost changed");
        Ok(&self.tableau)
    }

    /// Sets the objective coefficient of a basic variable: row 0 picks up
    /// the change through the variable's row. Nothing is re-solved.
    pub fn apply_basic_change(&mut self, variable: usize, coefficient: f64) -> Result<&Tableau> {
        let r = self.basic_row(variable)?;
        let delta = self.internal_delta(variable, coefficient)?;
        for k in 0..self.tableau.columns() {
            let updated = self.tableau.get(0, k) + delta * self.tableau.get(r, k);
            self.tableau.set(0, k, updated)?;
        }
        self.tableau.set(0, variable, 0.0)?;
        self.model.objective.coefficients[variable] = coefficient;
        debug!(variable, coefficient, "basic cost changed");
        Ok(&self.tableau)
    }

    /// Sets a constraint's RHS, shifting the RHS column through the
    /// constraint's unit column. The result may be primal infeasible;
    /// nothing is re-solved.
    pub fn apply_rhs_change(&mut self, constraint: usize, rhs: f64) -> Result<&Tableau> {
        self.model.check_constraint(constraint)?;
        if !rhs.is_finite() {
            return Err(Error::NonFinite(rhs));
        }
        let (col, sign) = self.tableau.aux_columns(constraint).unit_column();
        let delta = sign * (rhs - self.model.constraints[constraint].rhs);
        let rhs_col = self.tableau.rhs_column();
        for i in 0..self.tableau.rows() {
            let updated = self.tableau.rhs(i) + delta * self.tableau.get(i, col);
            self.tableau.set(i, rhs_col, updated)?;
        }
        self.model.constraints[constraint].rhs = rhs;
        debug!(constraint, rhs, "rhs changed");
        Ok(&self.tableau)
    }

    /// Overwrites one tableau cell. The model is left untouched.
    pub fn set_cell(&mut self, row: usize, column: usize, value: f64) -> Result<&Tableau> {
        self.tableau.set(row, column, value)?;
        Ok(&self.tableau)
    }

    /// Appends a constraint to the model and the tableau. Nothing is
    /// re-solved.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<&Tableau> {
        if let Some(&bad) = constraint
            .coefficients
            .iter()
            .chain(std::iter::once(&constraint.rhs))
            .find(|v| !v.is_finite())
        {
            return Err(Error::NonFinite(bad));
        }
        self.tableau.append_constraint(&constraint)?;
        self.model.constraints.push(constraint);
        Ok(&self.tableau)
    }

    /// Adds a nonnegative variable with the given objective coefficient and
    /// one coefficient per constraint. Nothing is re-solved.
    pub fn add_activity(&mut self, objective: f64, coefficients: Vec<f64>) -> Result<&Tableau> {
        if let Some(&bad) = coefficients
            .iter()
            .chain(std::iter::once(&objective))
            .find(|v| !v.is_finite())
        {
            return Err(Error::NonFinite(bad));
        }
        self.tableau
            .append_variable(self.model.objective.sense, objective, &coefficients)?;
        self.model.objective.coefficients.push(objective);
        for (c, a) in self.model.constraints.iter_mut().zip(coefficients) {
            c.coefficients.push(a);
        }
        self.model
            .sign_restrictions
            .push(SignRestriction::NonNegative);
        Ok(&self.tableau)
    }

    /// Pivots the held tableau back to a terminal state.
    pub fn resolve(&mut self, solver: &Solver) -> Solution {
        let outcome = solver.solve_tableau(&mut self.tableau);
        debug!(status = ?outcome.status, iterations = outcome.iterations, "re-solved");
        if outcome.status != SolutionStatus::Optimal {
            return Solution::failed(outcome.status, outcome.iterations);
        }
        let values = self.values();
        Solution::optimal(
            values.clone(),
            self.model.objective_value(&values),
            self.shadow_prices(),
            outcome.iterations,
        )
    }

    /// Change of the internal (maximized) coefficient when the model's
    /// coefficient becomes `coefficient`.
    fn internal_delta(&self, variable: usize, coefficient: f64) -> Result<f64> {
        if !coefficient.is_finite() {
            return Err(Error::NonFinite(coefficient));
        }
        Ok(self.sense_sign() * (coefficient - self.model.objective.coefficients[variable]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Relation;

    fn textbook() -> Model {
        Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0, 0.0], Relation::Le, 4.0)
            .with_constraint(vec![0.0, 2.0], Relation::Le, 12.0)
            .with_constraint(vec![3.0, 2.0], Relation::Le, 18.0)
    }

    fn one_row() -> Model {
        // final tableau: row 1 = [1, 1, 1 | 4], row 0 = [1, 0, 3 | 12]
        Model::maximize(vec![2.0, 3.0]).with_constraint(vec![1.0, 1.0], Relation::Le, 4.0)
    }

    fn solved(model: Model) -> Sensitivity {
        Sensitivity::solve(&Solver::new(), model).unwrap()
    }

    #[test]
    fn test_cost_ranges() {
        let s = solved(textbook());

        let x1 = s.cost_range(0).unwrap();
        assert!((x1.min - 0.0).abs() < 1e-6, "min = {} (expected 0)", x1.min);
        assert!((x1.max - 7.5).abs() < 1e-6, "max = {} (expected 7.5)", x1.max);

        let x2 = s.cost_range(1).unwrap();
        assert!((x2.min - 2.0).abs() < 1e-6, "min = {} (expected 2)", x2.min);
        assert_eq!(x2.max, f64::INFINITY);

        let nonbasic = solved(one_row()).cost_range(0).unwrap();
        assert_eq!(nonbasic.min, f64::NEG_INFINITY);
        assert!((nonbasic.max - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rhs_range() {
        let s = solved(textbook());

        let range = s.rhs_range(1).unwrap();
        assert!((range.min - 6.0).abs() < 1e-6, "min = {} (expected 6)", range.min);
        assert!((range.max - 18.0).abs() < 1e-6, "max = {} (expected 18)", range.max);
        assert!(matches!(s.rhs_range(3), Err(Error::ConstraintOutOfRange { .. })));
    }

    #[test]
    fn test_rhs_range_of_ge_row() {
        // min 4y1 + 12y2 + 18y3, y1 + 3y3 >= 3, 2y2 + 2y3 >= 5
        let model = Model::minimize(vec![4.0, 12.0, 18.0])
            .with_constraint(vec![1.0, 0.0, 3.0], Relation::Ge, 3.0)
            .with_constraint(vec![0.0, 2.0, 2.0], Relation::Ge, 5.0);
        let s = solved(model);

        let range = s.rhs_range(0).unwrap();
        // y3 = b1 / 3 and y2 = (5 - 2 y3) / 2 stay nonnegative for b1 in [0, 7.5]
        assert!((range.min - 0.0).abs() < 1e-6, "min = {} (expected 0)", range.min);
        assert!((range.max - 7.5).abs() < 1e-6, "max = {} (expected 7.5)", range.max);
    }

    #[test]
    fn test_nonbasic_variable_range() {
        let s = solved(one_row());

        let range = s.nonbasic_variable_range(0).unwrap();
        assert_eq!(range.min, f64::NEG_INFINITY);
        assert!((range.max - 4.0).abs() < 1e-9);
        assert_eq!(s.nonbasic_variable_range(1), Err(Error::BasicVariable(1)));
    }

    #[test]
    fn test_basic_variable_range() {
        let s = solved(one_row());

        assert_eq!(s.basic_variable_range(0), Err(Error::NotBasic(0)));
        assert_eq!(s.basic_variable_range(1).unwrap(), Range::unbounded());
        assert!(matches!(
            s.basic_variable_range(5),
            Err(Error::VariableOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_shadow_prices_and_analysis() {
        let s = solved(textbook());
        let expected = [0.0, 1.5, 1.0];
        for (got, want) in s.shadow_prices().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "shadow price {} (expected {})", got, want);
        }

        let analysis = s.analysis().unwrap();
        assert_eq!(analysis.binding_constraints, vec![1, 2]);
        assert_eq!(analysis.shadow_prices.len(), 3);
        assert_eq!(analysis.objective_sensitivity.len(), 2);
        assert_eq!(analysis.rhs_sensitivity[1].current, 12.0);
        assert!(analysis.reduced_costs.iter().all(|r| r.is_basic && r.reduced_cost == 0.0));
    }

    #[test]
    fn test_min_model_shadow_prices_and_reduced_costs() {
        let model = Model::minimize(vec![4.0, 12.0, 18.0])
            .with_constraint(vec![1.0, 0.0, 3.0], Relation::Ge, 3.0)
            .with_constraint(vec![0.0, 2.0, 2.0], Relation::Ge, 5.0);
        let s = solved(model);

        // the dual of the textbook model: its shadow prices are (2, 6)
        let prices = s.shadow_prices();
        assert!((prices[0] - 2.0).abs() < 1e-6, "y1 price {} (expected 2)", prices[0]);
        assert!((prices[1] - 6.0).abs() < 1e-6, "y2 price {} (expected 6)", prices[1]);

        let y1 = s.reduced_costs()[0];
        assert!(!y1.is_basic);
        assert!((y1.reduced_cost - 2.0).abs() < 1e-6, "reduced cost {} (expected 2)", y1.reduced_cost);
        assert!((s.objective_value() - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_rhs_change_is_not_resolved() {
        let mut s = solved(textbook());

        // inside [6, 18] the basis survives and the new values read straight off
        s.apply_rhs_change(1, 18.0).unwrap();
        assert!(!s.tableau().has_negative_rhs(1e-9));
        assert!((s.objective_value() - 45.0).abs() < 1e-6, "obj = {} (expected 45)", s.objective_value());

        // outside it the tableau is left primal infeasible until re-solved
        s.apply_rhs_change(1, 24.0).unwrap();
        assert!(s.tableau().has_negative_rhs(1e-9));
        assert_eq!(s.model().constraints[1].rhs, 24.0);

        let solution = s.resolve(&Solver::new());
        assert!(solution.is_optimal());
        assert!((solution.values[0] - 0.0).abs() < 1e-6, "x1 = {} (expected 0)", solution.values[0]);
        assert!((solution.values[1] - 9.0).abs() < 1e-6, "x2 = {} (expected 9)", solution.values[1]);
        assert!((solution.objective_value - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_basic_cost_change() {
        let mut s = solved(textbook());

        s.apply_basic_change(0, 9.0).unwrap();

        // still the old vertex, now suboptimal
        assert!(!s.tableau().is_optimal(1e-9));
        assert_eq!(s.values(), solved(textbook()).values());

        let solution = s.resolve(&Solver::new());
        assert!((solution.values[0] - 4.0).abs() < 1e-6, "x1 = {} (expected 4)", solution.values[0]);
        assert!((solution.values[1] - 3.0).abs() < 1e-6, "x2 = {} (expected 3)", solution.values[1]);
        assert!((solution.objective_value - 51.0).abs() < 1e-6, "obj = {} (expected 51)", solution.objective_value);
    }

    #[test]
    fn test_nonbasic_cost_change() {
        let mut s = solved(one_row());

        s.apply_nonbasic_change(0, 4.0).unwrap();
        assert!((s.tableau().get(0, 0) + 1.0).abs() < 1e-9);
        assert_eq!(s.values(), vec![0.0, 4.0]);
        assert!(s.apply_nonbasic_change(1, 1.0).is_err());

        let solution = s.resolve(&Solver::new());
        assert_eq!(solution.values, vec![4.0, 0.0]);
        assert!((solution.objective_value - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_add_constraint_then_resolve() {
        let mut s = solved(textbook());

        s.add_constraint(Constraint::new(vec![1.0, 0.0], Relation::Le, 1.0)).unwrap();
        assert_eq!(s.model().num_constraints(), 4);
        assert!(s.tableau().has_negative_rhs(1e-9));

        let solution = s.resolve(&Solver::new());
        assert!((solution.values[0] - 1.0).abs() < 1e-6, "x1 = {} (expected 1)", solution.values[0]);
        assert!((solution.values[1] - 6.0).abs() < 1e-6, "x2 = {} (expected 6)", solution.values[1]);
        assert!((solution.objective_value - 33.0).abs() < 1e-6, "obj = {} (expected 33)", solution.objective_value);
    }

    #[test]
    fn test_add_activity_then_resolve() {
        let mut s = solved(textbook());

        s.add_activity(9.0, vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(s.model().num_variables(), 3);
        assert!(!s.tableau().is_optimal(1e-9));

        let solution = s.resolve(&Solver::new());
        assert!((solution.objective_value - 56.0).abs() < 1e-6, "obj = {} (expected 56)", solution.objective_value);
        assert!(s.model().is_feasible(&solution.values, 1e-6));
    }

    #[test]
    fn test_tied_column_is_nonbasic() {
        let s = solved(Model::maximize(vec![1.0, 1.0]).with_constraint(vec![1.0, 1.0], Relation::Le, 4.0));

        assert_eq!(s.values(), vec![4.0, 0.0]);
        let range = s.nonbasic_variable_range(1).unwrap();
        assert_eq!(range.min, f64::NEG_INFINITY);
        assert!((range.max - 4.0).abs() < 1e-9, "max = {} (expected 4)", range.max);
        let reduced = s.reduced_costs();
        assert!(reduced[0].is_basic && !reduced[1].is_basic);
        assert_eq!(s.basic_variable_range(1), Err(Error::NotBasic(1)));
    }

    #[test]
    fn test_set_cell_leaves_model_alone() {
        let mut s = solved(textbook());
        let model = s.model().clone();

        s.set_cell(0, 0, -1.0).unwrap();

        assert_eq!(s.tableau().get(0, 0), -1.0);
        assert_eq!(s.model(), &model);
        assert!(s.set_cell(0, 99, 1.0).is_err());
    }

    #[test]
    fn test_requires_optimal_nonnegative_model() {
        let infeasible = Model::maximize(vec![1.0])
            .with_constraint(vec![1.0], Relation::Ge, 5.0)
            .with_constraint(vec![1.0], Relation::Le, 3.0);
        assert_eq!(
            Sensitivity::solve(&Solver::new(), infeasible).unwrap_err(),
            Error::NotOptimal(SolutionStatus::Infeasible)
        );

        let free = textbook().with_sign_restrictions(vec![SignRestriction::Free, SignRestriction::NonNegative]);
        assert!(matches!(
            Sensitivity::solve(&Solver::new(), free),
            Err(Error::UnsupportedSignRestriction { variable: 0, .. })
        ));
    }

    #[test]
    fn test_new_checks_shape() {
        let tableau = Tableau::build(&one_row()).unwrap();
        assert!(matches!(
            Sensitivity::new(textbook(), tableau),
            Err(Error::TableauShape { .. })
        ));
    }
}
