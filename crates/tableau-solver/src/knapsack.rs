//! Branch and bound for the 0/1 knapsack problem.
//!
//! Relaxations are solved greedily instead of by simplex: items are packed
//! in descending value/weight order and the first item that no longer fits
//! is taken fractionally.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::problem::Model;

const FRACTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Knapsack {
    values: Vec<f64>,
    weights: Vec<f64>,
    capacity: f64,
    max_nodes: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnapsackOutcome {
    /// Fixed items already exceed the capacity
    Infeasible,
    /// Greedy fill came out integral
    Integer,
    /// Split on the fractional item
    Branched { item: usize },
    /// Still on the stack when the node ceiling was hit
    Pending,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackNode {
    pub id: usize,
    pub parent: Option<usize>,
    pub depth: usize,
    /// `Some(taken)` for items fixed on the path to this node
    pub fixed: Vec<Option<bool>>,
    /// Relaxed packing, empty when infeasible
    pub values: Vec<f64>,
    pub bound: f64,
    pub remaining_capacity: f64,
    pub outcome: KnapsackOutcome,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackResult {
    /// Item indices, best value/weight ratio first
    pub ranking: Vec<usize>,
    /// Every subproblem in the order it was solved
    pub nodes: Vec<KnapsackNode>,
    /// Id of the best integral node
    pub best: Option<usize>,
    pub truncated: bool,
}

impl KnapsackResult {
    pub fn best_node(&self) -> Option<&KnapsackNode> {
        self.best.map(|id| &self.nodes[id])
    }
}

impl Knapsack {
    pub fn new(values: Vec<f64>, weights: Vec<f64>, capacity: f64) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::NoVariables);
        }
        if weights.len() != values.len() {
            return Err(Error::ConstraintLength {
                constraint: 0,
                expected: values.len(),
                found: weights.len(),
            });
        }
        if let Some(&bad) = values
            .iter()
            .chain(&weights)
            .chain(std::iter::once(&capacity))
            .find(|v| !v.is_finite())
        {
            return Err(Error::NonFinite(bad));
        }
        if let Some((item, &weight)) = weights.iter().enumerate().find(|(_, w)| **w < 0.0) {
            return Err(Error::NegativeWeight { item, weight });
        }
        Ok(Self {
            values,
            weights,
            capacity,
            max_nodes: 10000,
        })
    }

    /// Reads a maximization model whose first constraint is the capacity row.
    pub fn from_model(model: &Model) -> Result<Self> {
        model.validate()?;
        if !model.is_maximize() {
            return Err(Error::NotMaximize);
        }
        let capacity = model.constraints.first().ok_or(Error::NoConstraints)?;
        Self::new(
            model.objective.coefficients.clone(),
            capacity.coefficients.clone(),
            capacity.rhs,
        )
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// Items by descending value/weight; weightless items first.
    pub fn ranking(&self) -> Vec<usize> {
        let ratio = |i: usize| {
            if self.weights[i] == 0.0 {
                f64::INFINITY
            } else {
                self.values[i] / self.weights[i]
            }
        };
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| ratio(b).total_cmp(&ratio(a)));
        order
    }

    /// Greedy relaxation under `fixed`; `None` when the fixings overflow.
    fn relax(&self, ranking: &[usize], fixed: &[Option<bool>]) -> Option<(Vec<f64>, f64)> {
        let used: f64 = (0..self.weights.len())
            .filter(|&i| fixed[i] == Some(true))
            .map(|i| self.weights[i])
            .sum();
        let mut remaining = self.capacity - used;
        if remaining < -FRACTION_TOLERANCE {
            return None;
        }

        let mut x: Vec<f64> = fixed.iter().map(|f| if *f == Some(true) { 1.0 } else { 0.0 }).collect();
        for &i in ranking {
            if fixed[i].is_some() || self.values[i] <= 0.0 {
                continue;
            }
            if self.weights[i] <= remaining {
                x[i] = 1.0;
                remaining -= self.weights[i];
            } else {
                x[i] = remaining.max(0.0) / self.weights[i];
                remaining = 0.0;
                break;
            }
        }
        Some((x, remaining))
    }

    /// Depth-first search, the "leave out" child first.
    #[tracing::instrument(name = "knapsack", level = "debug", skip_all, fields(items = self.values.len()))]
    pub fn solve(&self) -> KnapsackResult {
        let ranking = self.ranking();
        let n = self.values.len();

        let mut nodes = vec![KnapsackNode {
            id: 0,
            parent: None,
            depth: 0,
            fixed: vec![None; n],
            values: Vec::new(),
            bound: f64::NAN,
            remaining_capacity: self.capacity,
            outcome: KnapsackOutcome::Pending,
        }];
        let mut stack = vec![0];
        let mut best: Option<usize> = None;
        let mut processed = 0;
        let mut truncated = false;

        while let Some(id) = stack.pop() {
            if processed >= self.max_nodes {
                warn!(max_nodes = self.max_nodes, "node ceiling reached");
                truncated = true;
                break;
            }
            processed += 1;

            let Some((x, remaining)) = self.relax(&ranking, &nodes[id].fixed) else {
                debug!(node = id, "fixings exceed capacity");
                nodes[id].outcome = KnapsackOutcome::Infeasible;
                continue;
            };
            let bound: f64 = self.values.iter().zip(&x).map(|(v, x)| v * x).sum();
            let fractional = x
                .iter()
                .position(|&v| v > FRACTION_TOLERANCE && v < 1.0 - FRACTION_TOLERANCE);

            let node = &mut nodes[id];
            node.values = x;
            node.bound = bound;
            node.remaining_capacity = remaining;

            match fractional {
                None => {
                    node.outcome = KnapsackOutcome::Integer;
                    debug!(node = id, bound, "integral packing");
                    if best.is_none_or(|b| bound > nodes[b].bound) {
                        best = Some(id);
                    }
                }
                Some(item) => {
                    node.outcome = KnapsackOutcome::Branched { item };
                    debug!(node = id, item, bound, "branching");
                    let depth = node.depth + 1;
                    let parent_fixed = node.fixed.clone();
                    // pushed in reverse so the "leave out" child is popped first
                    for take in [true, false] {
                        let mut fixed = parent_fixed.clone();
                        fixed[item] = Some(take);
                        let child = nodes.len();
                        nodes.push(KnapsackNode {
                            id: child,
                            parent: Some(id),
                            depth,
                            fixed,
                            values: Vec::new(),
                            bound: f64::NAN,
                            remaining_capacity: self.capacity,
                            outcome: KnapsackOutcome::Pending,
                        });
                        stack.push(child);
                    }
                }
            }
        }

        KnapsackResult {
            ranking,
            nodes,
            best,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Relation, SignRestriction};

    fn example() -> Knapsack {
        Knapsack::new(
            vec![2.0, 3.0, 3.0, 5.0, 2.0, 4.0],
            vec![11.0, 8.0, 6.0, 14.0, 10.0, 10.0],
            40.0,
        )
        .unwrap()
    }

    #[test]
    fn test_ranking() {
        assert_eq!(example().ranking(), vec![2, 5, 1, 3, 4, 0]);

        let weightless = Knapsack::new(vec![1.0, 1.0], vec![2.0, 0.0], 1.0).unwrap();
        assert_eq!(weightless.ranking(), vec![1, 0]);
    }

    #[test]
    fn test_root_relaxation() {
        let result = example().solve();
        let root = &result.nodes[0];

        assert_eq!(root.outcome, KnapsackOutcome::Branched { item: 4 });
        assert!((root.bound - 15.4).abs() < 1e-9, "bound = {} (expected 15.4)", root.bound);
        assert!((root.values[4] - 0.2).abs() < 1e-9);
        assert_eq!(root.remaining_capacity, 0.0);
    }

    #[test]
    fn test_best_packing() {
        let result = example().solve();

        assert_eq!(result.nodes.len(), 23);
        assert!(!result.truncated);
        let best = result.best_node().unwrap();
        assert!((best.bound - 15.0).abs() < 1e-9, "best = {} (expected 15)", best.bound);
        assert_eq!(best.values, vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
        // left child fixes the fractional item out
        assert_eq!(result.nodes[1].fixed[4], Some(false));
        assert_eq!(result.nodes[1].parent, Some(0));
    }

    #[test]
    fn test_overfull_fixing_is_infeasible() {
        let result = Knapsack::new(vec![5.0, 4.0], vec![6.0, 5.0], 7.0).unwrap().solve();

        assert!(
            result
                .nodes
                .iter()
                .any(|n| n.outcome == KnapsackOutcome::Infeasible)
        );
        let best = result.best_node().unwrap();
        assert_eq!(best.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_from_model() {
        let model = Model::maximize(vec![2.0, 3.0])
            .with_constraint(vec![1.0, 2.0], Relation::Le, 2.0)
            .with_sign_restrictions(vec![SignRestriction::Binary; 2]);
        let knapsack = Knapsack::from_model(&model).unwrap();
        let best = knapsack.solve();
        assert_eq!(best.best_node().unwrap().values, vec![0.0, 1.0]);

        assert_eq!(
            Knapsack::from_model(&Model::maximize(vec![1.0])).unwrap_err(),
            Error::NoConstraints
        );
        let min = Model::minimize(vec![1.0]).with_constraint(vec![1.0], Relation::Le, 1.0);
        assert_eq!(Knapsack::from_model(&min).unwrap_err(), Error::NotMaximize);
    }

    #[test]
    fn test_rejects_bad_items() {
        assert!(matches!(
            Knapsack::new(vec![1.0, 2.0], vec![1.0], 3.0),
            Err(Error::ConstraintLength { .. })
        ));
        assert!(matches!(
            Knapsack::new(vec![1.0], vec![-1.0], 3.0),
            Err(Error::NegativeWeight { item: 0, .. })
        ));
    }
}
