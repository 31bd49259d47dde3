use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::problem::{Constraint, Model, Relation, SignRestriction};
use crate::simplex::Solver;
use crate::solution::SolutionStatus;
use crate::tableau::Tableau;

/// How a cut is derived from a fractional relaxation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutRule {
    /// Gomory fractional cut from the optimal tableau, expressed over the
    /// decision variables
    #[default]
    Gomory,
    /// `sum (floor(v_j) - v_j) x_j <= -1` built from the relaxed values
    SolutionFloor,
}

#[derive(Debug, Clone, Copy)]
pub struct CuttingPlane {
    solver: Solver,
    rule: CutRule,
    max_cuts: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingPlaneResult {
    pub status: SolutionStatus,
    /// Integral values when optimal, the last relaxation on `IterationLimit`
    pub values: Vec<f64>,
    pub objective_value: f64,
    /// Cuts in the order they were appended to the model
    pub cuts: Vec<Constraint>,
    /// Pivots over every relaxation solved
    pub iterations: usize,
    /// Final tableau of the last relaxation
    pub tableau: Tableau,
}

impl CuttingPlane {
    pub fn new(solver: Solver) -> Self {
        Self {
            solver,
            rule: CutRule::default(),
            max_cuts: 500,
        }
    }

    pub fn with_rule(mut self, rule: CutRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_max_cuts(mut self, max: usize) -> Self {
        self.max_cuts = max;
        self
    }

    /// Adds cuts to `model` until its relaxation is integral.
    ///
    /// Every variable must be integer and nonnegative. Binary variables are
    /// bounded by 1 for the duration of the run; those bounds are not added
    /// to `model`, the cuts are.
    #[tracing::instrument(name = "cutting_plane", level = "debug", skip_all, fields(rule = ?self.rule))]
    pub fn run(&self, model: &mut Model) -> Result<CuttingPlaneResult> {
        model.validate()?;
        check_pure_integer(model)?;

        let n_vars = model.num_variables();
        let mask = vec![true; n_vars];
        let bounds: Vec<Constraint> = model
            .sign_restrictions
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == SignRestriction::Binary)
            .map(|(j, _)| Constraint::bound(n_vars, j, Relation::Le, 1.0))
            .collect();

        let mut cuts = Vec::new();
        let mut iterations = 0;

        loop {
            let working = model.with_constraints(&bounds).split_equalities();
            let (solution, tableau) = self.solver.solve_with_tableau(&working)?;
            iterations += solution.iterations;

            if !solution.is_optimal() {
                debug!(status = ?solution.status, cuts = cuts.len(), "relaxation failed");
                return Ok(CuttingPlaneResult {
                    status: solution.status,
                    values: Vec::new(),
                    objective_value: f64::NAN,
                    cuts,
                    iterations,
                    tableau,
                });
            }

            if self.solver.is_integral(&solution.values, &mask) {
                let values: Vec<f64> = solution.values.iter().map(|v| v.round() + 0.0).collect();
                let objective_value = model.objective_value(&values);
                debug!(cuts = cuts.len(), objective = objective_value, "integral relaxation");
                return Ok(CuttingPlaneResult {
                    status: SolutionStatus::Optimal,
                    values,
                    objective_value,
                    cuts,
                    iterations,
                    tableau,
                });
            }

            if cuts.len() >= self.max_cuts {
                warn!(max_cuts = self.max_cuts, "cut ceiling reached");
                return Ok(CuttingPlaneResult {
                    status: SolutionStatus::IterationLimit,
                    values: solution.values,
                    objective_value: solution.objective_value,
                    cuts,
                    iterations,
                    tableau,
                });
            }

            let cut = match self.rule {
                CutRule::Gomory => self.gomory_cut(&working, &tableau, &solution.values).unwrap_or_else(|| {
                    warn!("no tableau row yields a Gomory cut, using the solution floor cut");
                    floor_cut(&solution.values)
                }),
                CutRule::SolutionFloor => floor_cut(&solution.values),
            };
            debug!(coefficients = ?cut.coefficients, rhs = cut.rhs, "adding cut");
            model.constraints.push(cut.clone());
            cuts.push(cut);
        }
    }

    /// Tries the rows of the fractional basic variables in index order.
    fn gomory_cut(&self, model: &Model, tableau: &Tableau, values: &[f64]) -> Option<Constraint> {
        let tol = self.solver.integrality_tolerance();
        (0..model.num_variables())
            .filter(|&j| fractional_part(values[j], tol) > 0.0)
            .find_map(|j| {
                let row = tableau.basic_row(j)?;
                self.cut_from_row(model, tableau, row)
            })
    }

    /// `sum frac(a_rj) x_j >= frac(b_r)` over every column of `row`, with
    /// each slack `s = b - a.x` and surplus `e = a.x - b` substituted out.
    ///
    /// `None` when the row leans on a constraint with fractional data,
    /// whose auxiliary column is not integral.
    fn cut_from_row(&self, model: &Model, tableau: &Tableau, row: usize) -> Option<Constraint> {
        let tol = self.solver.integrality_tolerance();
        let n_vars = model.num_variables();

        let mut coefficients: Vec<f64> = (0..n_vars)
            .map(|j| fractional_part(tableau.get(row, j), tol))
            .collect();
        let mut rhs = fractional_part(tableau.rhs(row), tol);

        for (k, c) in model.constraints.iter().enumerate() {
            let aux = tableau.aux_columns(k);
            let f = [aux.slack, aux.surplus]
                .into_iter()
                .flatten()
                .map(|col| fractional_part(tableau.get(row, col), tol))
                .sum::<f64>();
            if f == 0.0 {
                continue;
            }
            if !has_integral_data(c, tol) {
                return None;
            }
            let sign = if c.relation == Relation::Le { -1.0 } else { 1.0 };
            for (coef, a) in coefficients.iter_mut().zip(&c.coefficients) {
                *coef += sign * f * a;
            }
            rhs += sign * f * c.rhs;
        }

        Some(Constraint::new(
            coefficients.into_iter().map(|v| snap(-v)).collect(),
            Relation::Le,
            snap(-rhs),
        ))
    }
}

/// `sum (floor(v_j) - v_j) x_j <= -1`.
pub fn floor_cut(values: &[f64]) -> Constraint {
    Constraint::new(values.iter().map(|v| v.floor() - v).collect(), Relation::Le, -1.0)
}

fn check_pure_integer(model: &Model) -> Result<()> {
    for (j, &restriction) in model.sign_restrictions.iter().enumerate() {
        if !restriction.is_nonnegative() {
            return Err(Error::UnsupportedSignRestriction {
                variable: j,
                restriction,
            });
        }
    }
    if let Some(j) = model.integer_variables().iter().position(|&integer| !integer) {
        return Err(Error::ContinuousVariable(j));
    }
    Ok(())
}

/// `v - floor(v)`, with anything within `tol` of an integer taken as 0.
fn fractional_part(v: f64, tol: f64) -> f64 {
    let f = v - v.floor();
    if f < tol || f > 1.0 - tol { 0.0 } else { f }
}

fn has_integral_data(c: &Constraint, tol: f64) -> bool {
    c.coefficients
        .iter()
        .chain(std::iter::once(&c.rhs))
        .all(|v| fractional_part(*v, tol) == 0.0)
}

fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < 1e-9 { r + 0.0 } else { v }
}
