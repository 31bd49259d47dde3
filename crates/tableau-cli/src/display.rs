use std::fmt::Write;

use tableau_solver::{
    Analysis, Bound, BranchAndBoundResult, Constraint, KnapsackOutcome, KnapsackResult, NodeOutcome,
    Range, Relation, Solution, SolutionStatus, Tableau, basic_values,
};

const WIDTH: usize = 9;

/// Column headers: `x1..xn`, then `s<i>`/`e<i>` for each constraint's
/// slack and surplus, then `RHS`.
fn column_labels(tableau: &Tableau) -> Vec<String> {
    let mut labels = vec![String::new(); tableau.columns()];
    for (j, label) in labels.iter_mut().enumerate().take(tableau.num_variables()) {
        *label = format!("x{}", j + 1);
    }
    for i in 0..tableau.num_constraints() {
        let aux = tableau.aux_columns(i);
        if let Some(slack) = aux.slack {
            labels[slack] = format!("s{}", i + 1);
        }
        if let Some(surplus) = aux.surplus {
            labels[surplus] = format!("e{}", i + 1);
        }
    }
    labels[tableau.rhs_column()] = "RHS".to_string();
    labels
}

pub fn format_tableau(tableau: &Tableau) -> String {
    let labels = column_labels(tableau);

    // row label is the basic variable of that row, when there is one
    let mut row_labels: Vec<String> = (0..tableau.rows())
        .map(|r| if r == 0 { "z".to_string() } else { format!("r{}", r) })
        .collect();
    for (column, row) in tableau.basis() {
        row_labels[row] = labels[column].clone();
    }

    let mut out = String::new();
    let _ = write!(out, "{:>6} |", "");
    for label in &labels {
        let _ = write!(out, "{:>WIDTH$}", label);
    }
    out.push('\n');
    let _ = writeln!(out, "{}", "-".repeat(8 + WIDTH * labels.len()));

    for (r, row) in tableau.data().iter().enumerate() {
        let _ = write!(out, "{:>6} |", row_labels[r]);
        for &value in row {
            let _ = write!(out, "{:>WIDTH$}", number(value));
        }
        out.push('\n');
    }
    out
}

/// Basic variable of each constraint row with its RHS value.
pub fn format_basis(tableau: &Tableau) -> String {
    let labels = column_labels(tableau);
    let rhs = basic_values(tableau);
    let mut names = vec!["?".to_string(); rhs.len()];
    for (column, row) in tableau.basis() {
        names[row - 1] = labels[column].clone();
    }
    names
        .iter()
        .zip(&rhs)
        .map(|(name, v)| format!("{} = {}", name, number(*v)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn number(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        // +0.0 folds -0 into 0
        let rounded = (value * 1000.0).round() / 1000.0 + 0.0;
        format!("{}", rounded)
    }
}

pub fn values(values: &[f64]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(j, &v)| format!("x{} = {}", j + 1, number(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn status(status: SolutionStatus) -> &'static str {
    match status {
        SolutionStatus::Optimal => "OPTIMAL",
        SolutionStatus::Infeasible => "INFEASIBLE",
        SolutionStatus::Unbounded => "UNBOUNDED",
        SolutionStatus::IterationLimit => "ITERATION LIMIT",
    }
}

pub fn range(range: &Range) -> String {
    format!("[{}, {}]", number(range.min), number(range.max))
}

pub fn format_solution(solution: &Solution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", status(solution.status));
    let _ = writeln!(out, "Pivots: {}", solution.iterations);
    if solution.is_optimal() {
        let _ = writeln!(out, "Objective: {}", number(solution.objective_value));
        let _ = writeln!(out, "Values: {}", values(&solution.values));
        if !solution.shadow_prices.is_empty() {
            out.push_str("Shadow prices:\n");
            for (i, price) in solution.shadow_prices.iter().enumerate() {
                let _ = writeln!(out, "  c{:<4} {:>10}", i + 1, number(*price));
            }
        }
    }
    out
}

fn relation(relation: Relation) -> &'static str {
    match relation {
        Relation::Le => "<=",
        Relation::Ge => ">=",
        Relation::Eq => "=",
    }
}

fn bound(bound: &Bound) -> String {
    format!("x{} {} {}", bound.variable + 1, relation(bound.relation), number(bound.value))
}

/// `a1 x1 + a2 x2 ... <= b`, zero terms left out.
pub fn constraint(constraint: &Constraint) -> String {
    let terms: Vec<String> = constraint
        .coefficients
        .iter()
        .enumerate()
        .filter(|(_, a)| a.abs() > 1e-12)
        .map(|(j, &a)| format!("{}x{}", number(a), j + 1))
        .collect();
    let lhs = if terms.is_empty() { "0".to_string() } else { terms.join(" + ") };
    format!("{} {} {}", lhs.replace("+ -", "- "), relation(constraint.relation), number(constraint.rhs))
}

pub fn format_branch_and_bound(result: &BranchAndBoundResult) -> String {
    let mut out = String::new();
    for node in &result.nodes {
        let origin = match (node.parent, &node.bound) {
            (Some(parent), Some(b)) => format!("node {}, {}", parent, bound(b)),
            _ => "root".to_string(),
        };
        let outcome = match node.outcome {
            NodeOutcome::Pending => "pending".to_string(),
            NodeOutcome::Pruned(s) => format!("pruned ({})", status(s)),
            NodeOutcome::CutOff => "cut off by incumbent".to_string(),
            NodeOutcome::Integer => "integer candidate".to_string(),
            NodeOutcome::Branched { variable, value } => {
                format!("branch on x{} = {}", variable + 1, number(value))
            }
        };
        let _ = write!(out, "Node {:<3} [{}] {}", node.id, origin, outcome);
        if let Some(z) = node.objective_value {
            let _ = write!(out, " | z = {} | {}", number(z), values(&node.values));
        }
        out.push('\n');
    }

    out.push('\n');
    match result.best() {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best candidate: node {} | z = {} | {}",
                best.node,
                number(best.objective_value),
                values(&best.values)
            );
        }
        None => out.push_str("No integer solution found\n"),
    }
    if result.truncated {
        out.push_str("Search stopped at the node limit\n");
    }
    out
}

pub fn format_knapsack(result: &KnapsackResult) -> String {
    let mut out = String::new();
    let ranking: Vec<String> = result.ranking.iter().map(|i| format!("x{}", i + 1)).collect();
    let _ = writeln!(out, "Ranking: {}", ranking.join(" > "));
    out.push('\n');

    for node in &result.nodes {
        let fixed: Vec<String> = node
            .fixed
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|take| format!("x{}={}", i + 1, take as u8)))
            .collect();
        let fixed = if fixed.is_empty() { "-".to_string() } else { fixed.join(" ") };
        let outcome = match node.outcome {
            KnapsackOutcome::Infeasible => "infeasible".to_string(),
            KnapsackOutcome::Integer => "integer".to_string(),
            KnapsackOutcome::Branched { item } => format!("branch on x{}", item + 1),
            KnapsackOutcome::Pending => "pending".to_string(),
        };
        let _ = write!(out, "Sub-problem {:<3} fixed: {:<24} {}", node.id, fixed, outcome);
        if !node.values.is_empty() {
            let _ = write!(
                out,
                " | z = {} | capacity left {} | {}",
                number(node.bound),
                number(node.remaining_capacity),
                values(&node.values)
            );
        }
        out.push('\n');
    }

    out.push('\n');
    match result.best_node() {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best packing: sub-problem {} | z = {} | {}",
                best.id,
                number(best.bound),
                values(&best.values)
            );
        }
        None => out.push_str("No feasible packing\n"),
    }
    if result.truncated {
        out.push_str("Search stopped at the node limit\n");
    }
    out
}

pub fn format_analysis(analysis: &Analysis) -> String {
    let mut out = String::new();

    let binding: Vec<String> = analysis
        .binding_constraints
        .iter()
        .map(|i| format!("c{}", i + 1))
        .collect();
    let _ = writeln!(
        out,
        "Binding constraints: {}",
        if binding.is_empty() { "none".to_string() } else { binding.join(", ") }
    );

    out.push_str("\nShadow prices:\n");
    for sp in &analysis.shadow_prices {
        let _ = writeln!(out, "  c{:<4} {:>10}", sp.constraint + 1, number(sp.value));
    }

    out.push_str("\nReduced costs:\n");
    for rc in &analysis.reduced_costs {
        let _ = writeln!(
            out,
            "  x{:<4} value {:>10}  reduced cost {:>10}{}",
            rc.variable + 1,
            number(rc.value),
            number(rc.reduced_cost),
            if rc.is_basic { "  (basic)" } else { "" }
        );
    }

    out.push_str("\nObjective coefficient ranges:\n");
    for r in &analysis.objective_sensitivity {
        let _ = writeln!(
            out,
            "  x{:<4} {:>10}  {}",
            r.index + 1,
            number(r.current),
            range(&Range {
                min: r.lower_bound,
                max: r.upper_bound,
            })
        );
    }

    out.push_str("\nRight-hand side ranges:\n");
    for r in &analysis.rhs_sensitivity {
        let _ = writeln!(
            out,
            "  c{:<4} {:>10}  {}",
            r.index + 1,
            number(r.current),
            range(&Range {
                min: r.lower_bound,
                max: r.upper_bound,
            })
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableau_solver::Model;

    #[test]
    fn test_format_tableau_labels() {
        let model = Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0, 0.0], Relation::Le, 4.0)
            .with_constraint(vec![3.0, 2.0], Relation::Ge, 18.0);
        let tableau = Tableau::build(&model).unwrap();

        let text = format_tableau(&tableau);
        let header = text.lines().next().unwrap();
        assert!(header.contains("x1") && header.contains("s1") && header.contains("e2"));
        assert!(header.trim_end().ends_with("RHS"));
        // rows are labelled by their basic column; the negated >= row has e2 at +1
        assert!(text.lines().nth(2).unwrap().trim_start().starts_with("z"));
        assert!(text.lines().nth(3).unwrap().trim_start().starts_with("s1"));
        assert!(text.lines().nth(4).unwrap().trim_start().starts_with("e2"));
    }

    #[test]
    fn test_format_basis() {
        let model = Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0, 0.0], Relation::Le, 4.0)
            .with_constraint(vec![0.0, 2.0], Relation::Le, 12.0);
        let mut tableau = Tableau::build(&model).unwrap();
        tableau.pivot(2, 1);

        assert_eq!(format_basis(&tableau), "s1 = 4, x2 = 6");
    }

    #[test]
    fn test_constraint() {
        let cut = Constraint::new(vec![3.0, 0.0, -0.5], Relation::Le, 15.0);
        assert_eq!(constraint(&cut), "3x1 - 0.5x3 <= 15");
    }

    #[test]
    fn test_number() {
        assert_eq!(number(-0.0), "0");
        assert_eq!(number(2.0 / 3.0), "0.667");
        assert_eq!(number(f64::NEG_INFINITY), "-inf");
    }
}
