use crate::error::{Error, Result};

/// A linear (or mixed-integer linear) program.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Objective sense and coefficients, one per decision variable
    pub objective: Objective,
    /// Constraints, in the order their rows appear in the tableau
    pub constraints: Vec<Constraint>,
    /// One tag per decision variable
    pub sign_restrictions: Vec<SignRestriction>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Whether to maximize or minimize
    pub sense: ObjectiveSense,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Max,
    Min,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub relation: Relation,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignRestriction {
    /// x >= 0
    NonNegative,
    /// x <= 0
    NonPositive,
    /// Unrestricted in sign
    Free,
    /// Nonnegative integer
    Integer,
    /// 0 or 1
    Binary,
}

impl SignRestriction {
    pub fn is_integer(self) -> bool {
        matches!(self, SignRestriction::Integer | SignRestriction::Binary)
    }

    pub fn is_nonnegative(self) -> bool {
        matches!(
            self,
            SignRestriction::NonNegative | SignRestriction::Integer | SignRestriction::Binary
        )
    }
}

impl Constraint {
    pub fn new(coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Self {
        Self {
            coefficients,
            relation,
            rhs,
        }
    }

    /// `x_var (relation) rhs` over `n_vars` variables.
    pub fn bound(n_vars: usize, var: usize, relation: Relation, rhs: f64) -> Self {
        let mut coefficients = vec![0.0; n_vars];
        coefficients[var] = 1.0;
        Self::new(coefficients, relation, rhs)
    }

    /// Left-hand side evaluated at `values`.
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(a, x)| a * x)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

impl Model {
    pub fn new(sense: ObjectiveSense, coefficients: Vec<f64>) -> Self {
        let n = coefficients.len();
        Self {
            objective: Objective { sense, coefficients },
            constraints: Vec::new(),
            sign_restrictions: vec![SignRestriction::NonNegative; n],
        }
    }

    pub fn maximize(coefficients: Vec<f64>) -> Self {
        Self::new(ObjectiveSense::Max, coefficients)
    }

    pub fn minimize(coefficients: Vec<f64>) -> Self {
        Self::new(ObjectiveSense::Min, coefficients)
    }

    pub fn add_constraint(&mut self, coefficients: Vec<f64>, relation: Relation, rhs: f64) {
        self.constraints.push(Constraint::new(coefficients, relation, rhs));
    }

    pub fn with_constraint(mut self, coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Self {
        self.add_constraint(coefficients, relation, rhs);
        self
    }

    pub fn with_sign_restrictions(mut self, restrictions: Vec<SignRestriction>) -> Self {
        self.sign_restrictions = restrictions;
        self
    }

    pub fn num_variables(&self) -> usize {
        self.objective.coefficients.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_maximize(&self) -> bool {
        self.objective.sense == ObjectiveSense::Max
    }

    /// Zero-pads the objective and every constraint to the widest coefficient row.
    pub fn pad(&mut self) {
        let width = self
            .constraints
            .iter()
            .map(|c| c.coefficients.len())
            .chain(std::iter::once(self.objective.coefficients.len()))
            .max()
            .unwrap_or(0);
        self.objective.coefficients.resize(width, 0.0);
        for c in &mut self.constraints {
            c.coefficients.resize(width, 0.0);
        }
    }

    /// Checks the shape invariants: one sign restriction per variable and
    /// every constraint as wide as the objective.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_variables();
        if n == 0 {
            return Err(Error::NoVariables);
        }
        if self.sign_restrictions.len() != n {
            return Err(Error::SignRestrictionCount {
                variables: n,
                restrictions: self.sign_restrictions.len(),
            });
        }
        for (i, c) in self.constraints.iter().enumerate() {
            if c.coefficients.len() != n {
                return Err(Error::ConstraintLength {
                    constraint: i,
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if !c.rhs.is_finite() {
                return Err(Error::NonFinite(c.rhs));
            }
            if let Some(&bad) = c.coefficients.iter().find(|v| !v.is_finite()) {
                return Err(Error::NonFinite(bad));
            }
        }
        if let Some(&bad) = self.objective.coefficients.iter().find(|v| !v.is_finite()) {
            return Err(Error::NonFinite(bad));
        }
        Ok(())
    }

    pub fn check_variable(&self, index: usize) -> Result<()> {
        if index >= self.num_variables() {
            return Err(Error::VariableOutOfRange {
                index,
                count: self.num_variables(),
            });
        }
        Ok(())
    }

    pub fn check_constraint(&self, index: usize) -> Result<()> {
        if index >= self.num_constraints() {
            return Err(Error::ConstraintOutOfRange {
                index,
                count: self.num_constraints(),
            });
        }
        Ok(())
    }

    /// Variables that must take integral values.
    ///
    /// Those tagged `int` or `bin`; a model without any integer tag is
    /// treated as a pure integer program.
    pub fn integer_variables(&self) -> Vec<bool> {
        let tagged: Vec<bool> = self.sign_restrictions.iter().map(|r| r.is_integer()).collect();
        if tagged.iter().any(|&t| t) {
            tagged
        } else {
            vec![true; self.num_variables()]
        }
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Whether `values` satisfies every constraint and sign restriction.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        let signs_ok = self.sign_restrictions.iter().zip(values).all(|(r, &x)| match r {
            SignRestriction::NonPositive => x <= tolerance,
            SignRestriction::Free => true,
            SignRestriction::Binary => x >= -tolerance && x <= 1.0 + tolerance,
            _ => x >= -tolerance,
        });
        signs_ok && self.constraints.iter().all(|c| c.is_satisfied(values, tolerance))
    }

    /// Copy of the model with `extra` constraints appended.
    pub fn with_constraints<'a>(&self, extra: impl IntoIterator<Item = &'a Constraint>) -> Model {
        let mut model = self.clone();
        model.constraints.extend(extra.into_iter().cloned());
        model
    }

    /// Rewrites every `=` row as a `<=` row followed by a `>=` row.
    pub fn split_equalities(&self) -> Model {
        let mut model = self.clone();
        model.constraints = self
            .constraints
            .iter()
            .flat_map(|c| match c.relation {
                Relation::Eq => vec![
                    Constraint::new(c.coefficients.clone(), Relation::Le, c.rhs),
                    Constraint::new(c.coefficients.clone(), Relation::Ge, c.rhs),
                ],
                _ => vec![c.clone()],
            })
            .collect();
        model
    }

    /// Rewrites the model over nonnegative columns only.
    ///
    /// `x <= 0` becomes `-x'` with `x' >= 0`; a free `x` becomes `x+ - x-`.
    pub fn standardized(&self) -> Standardized {
        let mut columns = Vec::with_capacity(self.num_variables());
        let mut next = 0;
        for r in &self.sign_restrictions {
            let map = match r {
                SignRestriction::NonPositive => ColumnMap::Negated(next),
                SignRestriction::Free => {
                    next += 1;
                    ColumnMap::Split(next - 1, next)
                }
                _ => ColumnMap::Same(next),
            };
            next += 1;
            columns.push(map);
        }

        let expand = |row: &[f64]| -> Vec<f64> {
            let mut out = vec![0.0; next];
            for (j, map) in columns.iter().enumerate() {
                let v = row.get(j).copied().unwrap_or(0.0);
                match *map {
                    ColumnMap::Same(k) => out[k] = v,
                    ColumnMap::Negated(k) => out[k] = -v,
                    ColumnMap::Split(p, m) => {
                        out[p] = v;
                        out[m] = -v;
                    }
                }
            }
            out
        };

        let model = Model {
            objective: Objective {
                sense: self.objective.sense,
                coefficients: expand(&self.objective.coefficients),
            },
            constraints: self
                .constraints
                .iter()
                .map(|c| Constraint::new(expand(&c.coefficients), c.relation, c.rhs))
                .collect(),
            sign_restrictions: vec![SignRestriction::NonNegative; next],
        };

        Standardized { model, columns }
    }
}

/// A model rewritten over nonnegative columns, with the way back.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub model: Model,
    columns: Vec<ColumnMap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnMap {
    Same(usize),
    Negated(usize),
    Split(usize, usize),
}

impl Standardized {
    /// Maps standardized column values back onto the original variables.
    pub fn recover(&self, values: &[f64]) -> Vec<f64> {
        self.columns
            .iter()
            .map(|map| match *map {
                ColumnMap::Same(k) => values[k],
                ColumnMap::Negated(k) => -values[k],
                ColumnMap::Split(p, m) => values[p] - values[m],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_and_validate() {
        let mut model = Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0], Relation::Le, 4.0)
            .with_constraint(vec![0.0, 2.0, 1.0], Relation::Le, 12.0);
        model.sign_restrictions.push(SignRestriction::NonNegative);

        model.pad();

        assert_eq!(model.num_variables(), 3);
        assert_eq!(model.constraints[0].coefficients, vec![1.0, 0.0, 0.0]);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_constraint() {
        let model = Model::maximize(vec![1.0, 1.0]).with_constraint(vec![1.0], Relation::Le, 1.0);
        assert_eq!(
            model.validate(),
            Err(Error::ConstraintLength {
                constraint: 0,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_validate_rejects_restriction_count() {
        let model = Model::maximize(vec![1.0, 1.0])
            .with_constraint(vec![1.0, 1.0], Relation::Le, 1.0)
            .with_sign_restrictions(vec![SignRestriction::NonNegative]);
        assert!(matches!(model.validate(), Err(Error::SignRestrictionCount { .. })));
    }

    #[test]
    fn test_integer_variables_defaults_to_all() {
        let model = Model::maximize(vec![1.0, 1.0, 1.0]);
        assert_eq!(model.integer_variables(), vec![true, true, true]);

        let mixed = model.with_sign_restrictions(vec![
            SignRestriction::Integer,
            SignRestriction::NonNegative,
            SignRestriction::Binary,
        ]);
        assert_eq!(mixed.integer_variables(), vec![true, false, true]);
    }

    #[test]
    fn test_standardized_round_trip() {
        let model = Model::minimize(vec![1.0, 2.0, 3.0])
            .with_constraint(vec![1.0, 1.0, 1.0], Relation::Ge, 2.0)
            .with_sign_restrictions(vec![
                SignRestriction::NonNegative,
                SignRestriction::NonPositive,
                SignRestriction::Free,
            ]);

        let std = model.standardized();

        assert_eq!(std.model.num_variables(), 4);
        assert_eq!(std.model.objective.coefficients, vec![1.0, -2.0, 3.0, -3.0]);
        assert_eq!(std.model.constraints[0].coefficients, vec![1.0, -1.0, 1.0, -1.0]);
        assert_eq!(std.recover(&[1.0, 2.0, 0.5, 3.0]), vec![1.0, -2.0, -2.5]);
    }

    #[test]
    fn test_split_equalities() {
        let model = Model::maximize(vec![1.0, 1.0])
            .with_constraint(vec![1.0, 1.0], Relation::Eq, 3.0)
            .with_constraint(vec![1.0, 0.0], Relation::Le, 2.0);

        let split = model.split_equalities();

        assert_eq!(split.num_constraints(), 3);
        assert_eq!(split.constraints[0].relation, Relation::Le);
        assert_eq!(split.constraints[1].relation, Relation::Ge);
        assert_eq!(split.constraints[2].relation, Relation::Le);
    }

    #[test]
    fn test_feasibility_check() {
        let model = Model::maximize(vec![3.0, 5.0])
            .with_constraint(vec![1.0, 0.0], Relation::Le, 4.0)
            .with_constraint(vec![3.0, 2.0], Relation::Le, 18.0);
        assert!(model.is_feasible(&[2.0, 6.0], 1e-9));
        assert!(!model.is_feasible(&[5.0, 0.0], 1e-9));
        assert!(!model.is_feasible(&[-1.0, 0.0], 1e-9));
    }
}
