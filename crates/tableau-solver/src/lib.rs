mod branch_and_bound;
mod cutting_plane;
mod dual;
mod duality;
mod error;
mod knapsack;
mod problem;
mod sensitivity;
mod simplex;
mod solution;
mod tableau;

pub use branch_and_bound::{BranchAndBound, BranchAndBoundResult, Bound, Candidate, Node, NodeOutcome};
pub use cutting_plane::{CutRule, CuttingPlane, CuttingPlaneResult, floor_cut};
pub use dual::DualSimplex;
pub use duality::{DUALITY_TOLERANCE, DualityReport, DualityVerdict, classify, dual_model, verify_duality};
pub use error::{Error, Result};
pub use knapsack::{Knapsack, KnapsackNode, KnapsackOutcome, KnapsackResult};
pub use problem::{Constraint, Model, Objective, ObjectiveSense, Relation, SignRestriction, Standardized};
pub use sensitivity::Sensitivity;
pub use simplex::{Algorithm, EnteringRule, PrimalSimplex, SimplexOutcome, Solver, basic_values, shadow_prices};
pub use solution::{Analysis, Range, ReducedCost, SensitivityRange, ShadowPrice, Solution, SolutionStatus};
pub use tableau::{AuxColumns, Tableau};
