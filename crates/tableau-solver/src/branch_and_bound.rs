use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::Result;
use crate::problem::{Constraint, Model, ObjectiveSense, Relation, SignRestriction};
use crate::simplex::Solver;
use crate::solution::SolutionStatus;

/// Branch-and-bound over LP relaxations.
///
/// Every integral leaf is reported. Pruning by the incumbent's objective is
/// available but off by default, so small trees are explored exhaustively.
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    solver: Solver,
    max_nodes: usize,
    bound_pruning: bool,
}

/// The single extra bound a node adds to its parent's problem.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub variable: usize,
    pub relation: Relation,
    pub value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeOutcome {
    /// Still queued when the node ceiling was hit
    Pending,
    /// Relaxation was not optimal
    Pruned(SolutionStatus),
    /// Relaxation could not beat the incumbent
    CutOff,
    /// Integral relaxation, recorded as a candidate
    Integer,
    /// Split on a fractional variable
    Branched { variable: usize, value: f64 },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: usize,
    pub parent: Option<usize>,
    pub depth: usize,
    pub bound: Option<Bound>,
    pub outcome: NodeOutcome,
    /// Relaxation values, empty unless the relaxation was optimal
    pub values: Vec<f64>,
    pub objective_value: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub node: usize,
    pub values: Vec<f64>,
    pub objective_value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAndBoundResult {
    pub sense: ObjectiveSense,
    pub nodes: Vec<Node>,
    pub candidates: Vec<Candidate>,
    /// The node ceiling stopped the search early
    pub truncated: bool,
}

impl BranchAndBoundResult {
    /// Best candidate under the model's sense; the first found wins ties.
    pub fn best(&self) -> Option<&Candidate> {
        let mut best: Option<&Candidate> = None;
        for c in &self.candidates {
            let better = match best {
                None => true,
                Some(b) => is_better(self.sense, c.objective_value, b.objective_value, 0.0),
            };
            if better {
                best = Some(c);
            }
        }
        best
    }
}

fn is_better(sense: ObjectiveSense, value: f64, than: f64, tolerance: f64) -> bool {
    match sense {
        ObjectiveSense::Max => value > than + tolerance,
        ObjectiveSense::Min => value < than - tolerance,
    }
}

impl BranchAndBound {
    pub fn new(solver: Solver) -> Self {
        Self {
            solver,
            max_nodes: 10000,
            bound_pruning: false,
        }
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_bound_pruning(mut self, enabled: bool) -> Self {
        self.bound_pruning = enabled;
        self
    }

    #[tracing::instrument(name = "branch_and_bound", level = "debug", skip_all)]
    pub fn run(&self, model: &Model) -> Result<BranchAndBoundResult> {
        model.validate()?;
        let n_vars = model.num_variables();
        let mask = model.integer_variables();

        let binary_bounds: Vec<Constraint> = model
            .sign_restrictions
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == SignRestriction::Binary)
            .map(|(j, _)| Constraint::bound(n_vars, j, Relation::Le, 1.0))
            .collect();
        let base = model.with_constraints(&binary_bounds);

        let mut nodes = vec![Node {
            id: 0,
            parent: None,
            depth: 0,
            bound: None,
            outcome: NodeOutcome::Pending,
            values: Vec::new(),
            objective_value: None,
        }];
        let mut queue = VecDeque::from([0]);
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut incumbent: Option<f64> = None;
        let mut processed = 0;
        let mut truncated = false;

        while let Some(id) = queue.pop_front() {
            if processed >= self.max_nodes {
                warn!(max_nodes = self.max_nodes, "node ceiling reached");
                truncated = true;
                break;
            }
            processed += 1;

            let bounds = path_bounds(&nodes, id, n_vars);
            let solution = self.solver.solve(&base.with_constraints(&bounds))?;

            if !solution.is_optimal() {
                debug!(node = id, status = ?solution.status, "pruned");
                nodes[id].outcome = NodeOutcome::Pruned(solution.status);
                continue;
            }
            nodes[id].objective_value = Some(solution.objective_value);
            nodes[id].values = solution.values.clone();

            if self.bound_pruning {
                if let Some(best) = incumbent {
                    if !is_better(model.objective.sense, solution.objective_value, best, self.solver.tolerance()) {
                        debug!(node = id, bound = solution.objective_value, incumbent = best, "cut off");
                        nodes[id].outcome = NodeOutcome::CutOff;
                        continue;
                    }
                }
            }

            match self.solver.first_fractional(&solution.values, &mask) {
                None => {
                    let values: Vec<f64> = solution
                        .values
                        .iter()
                        .zip(&mask)
                        .map(|(&v, &integer)| if integer { v.round() + 0.0 } else { v })
                        .collect();
                    let objective_value = model.objective_value(&values);
                    debug!(node = id, objective = objective_value, "integer candidate");

                    let improves = incumbent.is_none_or(|best| is_better(model.objective.sense, objective_value, best, 0.0));
                    if improves {
                        incumbent = Some(objective_value);
                    }
                    nodes[id].outcome = NodeOutcome::Integer;
                    candidates.push(Candidate {
                        node: id,
                        values,
                        objective_value,
                    });
                }
                Some(variable) => {
                    let value = solution.values[variable];
                    debug!(node = id, variable, value, "branching");
                    nodes[id].outcome = NodeOutcome::Branched { variable, value };

                    let depth = nodes[id].depth + 1;
                    for (relation, rhs) in [(Relation::Le, value.floor()), (Relation::Ge, value.ceil())] {
                        let child = nodes.len();
                        nodes.push(Node {
                            id: child,
                            parent: Some(id),
                            depth,
                            bound: Some(Bound {
                                variable,
                                relation,
                                value: rhs,
                            }),
                            outcome: NodeOutcome::Pending,
                            values: Vec::new(),
                            objective_value: None,
                        });
                        queue.push_back(child);
                    }
                }
            }
        }

        Ok(BranchAndBoundResult {
            sense: model.objective.sense,
            nodes,
            candidates,
            truncated,
        })
    }
}

/// Bounds on the path from the root to `id`, root first.
fn path_bounds(nodes: &[Node], id: usize, n_vars: usize) -> Vec<Constraint> {
    let mut bounds = Vec::new();
    let mut current = Some(id);
    while let Some(i) = current {
        if let Some(b) = nodes[i].bound {
            bounds.push(Constraint::bound(n_vars, b.variable, b.relation, b.value));
        }
        current = nodes[i].parent;
    }
    bounds.reverse();
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fractional_example() -> Model {
        // LP optimum (3.75, 2.25) = 41.25, integer optimum (5, 0) = 40
        Model::maximize(vec![8.0, 5.0])
            .with_constraint(vec![1.0, 1.0], Relation::Le, 6.0)
            .with_constraint(vec![9.0, 5.0], Relation::Le, 45.0)
    }

    #[test]
    fn test_integral_relaxation_needs_no_branching() {
        let model = Model::maximize(vec![2.0, 3.0]).with_constraint(vec![1.0, 1.0], Relation::Le, 4.0);

        let result = BranchAndBound::new(Solver::new()).run(&model).unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.candidates.len(), 1);
        let best = result.best().unwrap();
        assert_eq!(best.values, vec![0.0, 4.0]);
        assert!((best.objective_value - 12.0).abs() < 1e-6, "obj = {} (expected 12)", best.objective_value);
    }

    #[test]
    fn test_explores_whole_tree() {
        let result = BranchAndBound::new(Solver::new()).run(&fractional_example()).unwrap();

        assert_eq!(result.nodes.len(), 7);
        assert!(!result.truncated);
        match result.nodes[0].outcome {
            NodeOutcome::Branched { variable, value } => {
                assert_eq!(variable, 0);
                assert!((value - 3.75).abs() < 1e-6, "x1 = {} (expected 3.75)", value);
            }
            other => panic!("root was not branched: {:?}", other),
        }
        let mut objectives: Vec<f64> = result.candidates.iter().map(|c| c.objective_value).collect();
        objectives.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(objectives, vec![37.0, 39.0, 40.0]);

        let best = result.best().unwrap();
        assert_eq!(best.values, vec![5.0, 0.0]);
    }

    #[test]
    fn test_children_carry_complementary_bounds() {
        let result = BranchAndBound::new(Solver::new()).run(&fractional_example()).unwrap();

        let left = result.nodes[1].bound.unwrap();
        let right = result.nodes[2].bound.unwrap();
        assert_eq!((left.variable, left.relation, left.value), (0, Relation::Le, 3.0));
        assert_eq!((right.variable, right.relation, right.value), (0, Relation::Ge, 4.0));
        assert_eq!(result.nodes[1].parent, Some(0));
        assert_eq!(result.nodes[2].depth, 1);
    }

    #[test]
    fn test_bound_pruning_keeps_optimum() {
        let exhaustive = BranchAndBound::new(Solver::new()).run(&fractional_example()).unwrap();
        let pruned = BranchAndBound::new(Solver::new())
            .with_bound_pruning(true)
            .run(&fractional_example())
            .unwrap();

        assert!(pruned.nodes.len() <= exhaustive.nodes.len());
        let best = pruned.best().unwrap();
        assert!((best.objective_value - 40.0).abs() < 1e-6, "obj = {} (expected 40)", best.objective_value);
    }

    #[test]
    fn test_binary_knapsack() {
        let model = Model::maximize(vec![2.0, 3.0, 3.0, 5.0, 2.0, 4.0])
            .with_constraint(vec![11.0, 8.0, 6.0, 14.0, 10.0, 10.0], Relation::Le, 40.0)
            .with_sign_restrictions(vec![SignRestriction::Binary; 6]);

        let result = BranchAndBound::new(Solver::new()).run(&model).unwrap();

        let best = result.best().unwrap();
        assert!((best.objective_value - 15.0).abs() < 1e-6, "obj = {} (expected 15)", best.objective_value);
        assert_eq!(best.values, vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
        assert!(result.candidates.iter().all(|c| c.values.iter().all(|&v| v == 0.0 || v == 1.0)));
    }

    #[test]
    fn test_mixed_integer_only_branches_on_integer_variables() {
        let model = fractional_example()
            .with_sign_restrictions(vec![SignRestriction::Integer, SignRestriction::NonNegative]);

        let result = BranchAndBound::new(Solver::new()).run(&model).unwrap();

        assert_eq!(result.nodes.len(), 3);
        let best = result.best().unwrap();
        assert!((best.values[0] - 4.0).abs() < 1e-9);
        assert!((best.values[1] - 1.8).abs() < 1e-6, "x2 = {} (expected 1.8)", best.values[1]);
        assert!((best.objective_value - 41.0).abs() < 1e-6, "obj = {} (expected 41)", best.objective_value);
    }

    #[test]
    fn test_infeasible_root_is_pruned() {
        let model = Model::maximize(vec![1.0])
            .with_constraint(vec![1.0], Relation::Ge, 5.0)
            .with_constraint(vec![1.0], Relation::Le, 3.0);

        let result = BranchAndBound::new(Solver::new()).run(&model).unwrap();

        assert!(result.candidates.is_empty());
        assert!(result.best().is_none());
        assert_eq!(result.nodes[0].outcome, NodeOutcome::Pruned(SolutionStatus::Infeasible));
    }

    #[test]
    fn test_node_ceiling_truncates() {
        let result = BranchAndBound::new(Solver::new())
            .with_max_nodes(2)
            .run(&fractional_example())
            .unwrap();

        assert!(result.truncated);
        assert!(result.nodes.iter().any(|n| n.outcome == NodeOutcome::Pending));
    }
}
