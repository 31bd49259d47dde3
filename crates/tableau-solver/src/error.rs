use thiserror::Error;

use crate::problem::SignRestriction;
use crate::solution::SolutionStatus;

/// Malformed-input failures. Algorithmic outcomes (infeasible, unbounded)
/// are reported through [`SolutionStatus`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Constraint {constraint} has {found} coefficients, expected {expected}")]
    ConstraintLength {
        constraint: usize,
        expected: usize,
        found: usize,
    },
    #[error("Model has {variables} variables but {restrictions} sign restrictions")]
    SignRestrictionCount { variables: usize, restrictions: usize },
    #[error("Model has no variables")]
    NoVariables,
    #[error("Model has no constraints")]
    NoConstraints,
    #[error("Variable index {index} out of range (model has {count} variables)")]
    VariableOutOfRange { index: usize, count: usize },
    #[error("Constraint index {index} out of range (model has {count} constraints)")]
    ConstraintOutOfRange { index: usize, count: usize },
    #[error("Cell ({row}, {column}) out of range for a {rows}x{columns} tableau")]
    CellOutOfRange {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    #[error("Tableau with {variables} variables and {constraints} constraints does not match the model")]
    TableauShape { variables: usize, constraints: usize },
    #[error("Invalid value: {0}")]
    NonFinite(f64),
    #[error("Variable x{} is not basic in the current tableau", .0 + 1)]
    NotBasic(usize),
    #[error("Variable x{} is basic in the current tableau", .0 + 1)]
    BasicVariable(usize),
    #[error("New activity has {found} constraint coefficients, expected {expected}")]
    ActivityLength { expected: usize, found: usize },
    #[error("Sign restriction {restriction:?} on x{} is not supported here", .variable + 1)]
    UnsupportedSignRestriction {
        variable: usize,
        restriction: SignRestriction,
    },
    #[error("Cutting planes need every variable to be integer; x{} is continuous", .0 + 1)]
    ContinuousVariable(usize),
    #[error("Item x{} has negative weight {weight}", .item + 1)]
    NegativeWeight { item: usize, weight: f64 },
    #[error("Knapsack models must maximize")]
    NotMaximize,
    #[error("Model was not solved to optimality (status: {0:?})")]
    NotOptimal(SolutionStatus),
}

pub type Result<T> = std::result::Result<T, Error>;
