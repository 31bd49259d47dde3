/// The result of solving an LP relaxation
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable (empty unless optimal)
    pub values: Vec<f64>,
    /// Optimal objective value, in the model's own sense
    pub objective_value: f64,
    /// Marginal objective change per unit RHS increase, one per constraint
    pub shadow_prices: Vec<f64>,
    /// Pivots performed
    pub iterations: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The pivot ceiling was reached before either of the above
    IterationLimit,
}

/// Detailed analysis of an optimal tableau
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Shadow prices (dual values) for each constraint
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each decision variable
    pub reduced_costs: Vec<ReducedCost>,

    /// Constraints satisfied with equality
    pub binding_constraints: Vec<usize>,

    /// Objective coefficient ranges keeping the basis optimal
    pub objective_sensitivity: Vec<SensitivityRange>,

    /// RHS ranges keeping the basis feasible
    pub rhs_sensitivity: Vec<SensitivityRange>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPrice {
    pub constraint: usize,
    pub value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReducedCost {
    pub variable: usize,
    /// Current value in solution
    pub value: f64,
    pub reduced_cost: f64,
    pub is_basic: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityRange {
    /// Variable or constraint index
    pub index: usize,
    /// Current value
    pub current: f64,
    /// Lower bound of range where solution structure stays same
    pub lower_bound: f64,
    /// Upper bound of range where solution structure stays same
    pub upper_bound: f64,
}

/// A `(min, max)` interval; either side may be infinite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64, shadow_prices: Vec<f64>, iterations: usize) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            shadow_prices,
            iterations,
        }
    }

    /// A solution carrying only a non-optimal status.
    pub fn failed(status: SolutionStatus, iterations: usize) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
            shadow_prices: Vec::new(),
            iterations,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }
}
