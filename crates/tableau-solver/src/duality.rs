use tracing::debug;

use crate::error::{Error, Result};
use crate::problem::{Constraint, Model, Objective, ObjectiveSense, Relation, SignRestriction};
use crate::simplex::Solver;
use crate::solution::Solution;

/// Objective values closer than this count as equal.
pub const DUALITY_TOLERANCE: f64 = 1e-5;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualityVerdict {
    /// Both optimal with equal objectives
    Strong,
    /// Both optimal, the dual bounds the primal with a gap
    Weak,
    /// Both optimal, the primal beats its own dual bound
    Violated,
    /// At least one side has no optimum
    Unresolved,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DualityReport {
    pub dual_model: Model,
    pub primal: Solution,
    pub dual: Solution,
    pub verdict: DualityVerdict,
}

/// Builds the LP dual of `model`: one dual variable per constraint, one
/// dual constraint per primal variable, opposite sense.
///
/// Integer and binary variables are treated as their nonnegative LP
/// relaxation.
pub fn dual_model(model: &Model) -> Result<Model> {
    model.validate()?;
    if model.num_constraints() == 0 {
        return Err(Error::NoConstraints);
    }
    let maximize = model.is_maximize();

    let objective: Vec<f64> = model.constraints.iter().map(|c| c.rhs).collect();
    let constraints = (0..model.num_variables())
        .map(|j| {
            let coefficients = model.constraints.iter().map(|c| c.coefficients[j]).collect();
            let relation = match (model.sign_restrictions[j], maximize) {
                (SignRestriction::Free, _) => Relation::Eq,
                (SignRestriction::NonPositive, true) => Relation::Le,
                (SignRestriction::NonPositive, false) => Relation::Ge,
                (_, true) => Relation::Ge,
                (_, false) => Relation::Le,
            };
            Constraint::new(coefficients, relation, model.objective.coefficients[j])
        })
        .collect();
    let sign_restrictions = model
        .constraints
        .iter()
        .map(|c| match (c.relation, maximize) {
            (Relation::Eq, _) => SignRestriction::Free,
            (Relation::Le, true) | (Relation::Ge, false) => SignRestriction::NonNegative,
            (Relation::Ge, true) | (Relation::Le, false) => SignRestriction::NonPositive,
        })
        .collect();

    let sense = if maximize { ObjectiveSense::Min } else { ObjectiveSense::Max };
    Ok(Model {
        objective: Objective {
            sense,
            coefficients: objective,
        },
        constraints,
        sign_restrictions,
    })
}

/// Solves `model` and its dual and compares the two objectives.
#[tracing::instrument(name = "duality", level = "debug", skip_all)]
pub fn verify_duality(solver: &Solver, model: &Model) -> Result<DualityReport> {
    let dual_model = dual_model(model)?;
    let primal = solver.solve(model)?;
    let dual = solver.solve(&dual_model)?;

    let verdict = if primal.is_optimal() && dual.is_optimal() {
        classify(model.objective.sense, primal.objective_value, dual.objective_value)
    } else {
        DualityVerdict::Unresolved
    };
    debug!(
        primal = primal.objective_value,
        dual = dual.objective_value,
        ?verdict,
        "duality check"
    );

    Ok(DualityReport {
        dual_model,
        primal,
        dual,
        verdict,
    })
}

/// Compares a primal objective with its dual's. The dual of a max problem
/// bounds it from above, the dual of a min problem from below.
pub fn classify(sense: ObjectiveSense, primal: f64, dual: f64) -> DualityVerdict {
    if !primal.is_finite() || !dual.is_finite() {
        DualityVerdict::Unresolved
    } else if (primal - dual).abs() <= DUALITY_TOLERANCE {
        DualityVerdict::Strong
    } else {
        match sense {
            ObjectiveSense::Max if primal < dual => DualityVerdict::Weak,
            ObjectiveSense::Min if primal > dual => DualityVerdict::Weak,
            _ => DualityVerdict::Violated,
        }
    }
}
