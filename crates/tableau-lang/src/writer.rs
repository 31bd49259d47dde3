use std::fmt::Write;

use tableau_solver::{Model, ObjectiveSense, Relation, SignRestriction};

/// Renders `model` in the text format read by [`crate::Parser`].
pub fn write_model(model: &Model) -> String {
    let mut out = String::new();

    out.push_str(match model.objective.sense {
        ObjectiveSense::Max => "max",
        ObjectiveSense::Min => "min",
    });
    for &c in &model.objective.coefficients {
        let _ = write!(out, " {}", signed(c));
    }
    out.push('\n');

    for constraint in &model.constraints {
        let coefficients: Vec<String> = constraint.coefficients.iter().map(|&c| signed(c)).collect();
        let relation = match constraint.relation {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        };
        let _ = writeln!(out, "{} {}{}", coefficients.join(" "), relation, constraint.rhs + 0.0);
    }

    let tags: Vec<&str> = model
        .sign_restrictions
        .iter()
        .map(|r| match r {
            SignRestriction::NonNegative => "+",
            SignRestriction::NonPositive => "-",
            SignRestriction::Free => "urs",
            SignRestriction::Integer => "int",
            SignRestriction::Binary => "bin",
        })
        .collect();
    out.push_str(&tags.join(" "));
    out.push('\n');

    out
}

// +0.0 folds -0 into 0
fn signed(value: f64) -> String {
    format!("{:+}", value + 0.0)
}
