//! The dense simplex tableau.
//!
//! Layout, fixed once built:
//!
//! - row 0 is the objective row, rows `1..=m` are the constraints in model order;
//! - columns `0..n` are the decision variables, followed by the slack/surplus
//!   columns of each constraint in constraint order (one for `<=` and `>=`,
//!   slack then surplus for `=`), and finally the RHS column.
//!
//! The engine always maximizes: row 0 holds `-c` for a max model and `c` for
//! a min model. Rows of `>=` constraints are stored multiplied by `-1`, RHS
//! included.

use crate::error::{Error, Result};
use crate::problem::{Constraint, Model, ObjectiveSense, Relation};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    data: Vec<Vec<f64>>,
    n_vars: usize,
    aux: Vec<AuxColumns>,
    /// Basic column of each constraint row, row `i + 1` at index `i`
    basis: Vec<usize>,
}

/// The auxiliary columns that belong to one constraint row.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxColumns {
    pub relation: Relation,
    pub slack: Option<usize>,
    pub surplus: Option<usize>,
}

impl AuxColumns {
    fn for_relation(relation: Relation, next: usize) -> (Self, usize) {
        let (slack, surplus, width) = match relation {
            Relation::Le => (Some(next), None, 1),
            Relation::Ge => (None, Some(next), 1),
            Relation::Eq => (Some(next), Some(next + 1), 2),
        };
        (
            Self {
                relation,
                slack,
                surplus,
            },
            next + width,
        )
    }

    fn width(&self) -> usize {
        self.slack.is_some() as usize + self.surplus.is_some() as usize
    }

    /// The column that started out as `+1` in this constraint's row, and the
    /// sign that maps a change of the stored RHS to a change of the model RHS.
    pub fn unit_column(&self) -> (usize, f64) {
        match (self.slack, self.surplus) {
            (Some(slack), _) if self.relation != Relation::Ge => (slack, 1.0),
            (_, Some(surplus)) => (surplus, -1.0),
            (Some(slack), None) => (slack, 1.0),
            (None, None) => (0, 0.0),
        }
    }
}

impl Tableau {
    /// Builds the initial tableau for `model`.
    pub fn build(model: &Model) -> Result<Self> {
        let n_vars = model.num_variables();
        let n_constraints = model.num_constraints();

        for (i, c) in model.constraints.iter().enumerate() {
            if c.coefficients.len() != n_vars {
                return Err(Error::ConstraintLength {
                    constraint: i,
                    expected: n_vars,
                    found: c.coefficients.len(),
                });
            }
        }

        let mut aux = Vec::with_capacity(n_constraints);
        let mut next = n_vars;
        for c in &model.constraints {
            let (columns, after) = AuxColumns::for_relation(c.relation, next);
            aux.push(columns);
            next = after;
        }

        let total_cols = next + 1;
        let mut data = vec![vec![0.0; total_cols]; n_constraints + 1];

        for (j, &coef) in model.objective.coefficients.iter().enumerate() {
            data[0][j] = match model.objective.sense {
                ObjectiveSense::Max => -coef,
                ObjectiveSense::Min => coef,
            };
        }

        for (i, c) in model.constraints.iter().enumerate() {
            let row = &mut data[i + 1];
            row[..n_vars].copy_from_slice(&c.coefficients);
            if let Some(slack) = aux[i].slack {
                row[slack] = 1.0;
            }
            if let Some(surplus) = aux[i].surplus {
                row[surplus] = -1.0;
            }
            row[total_cols - 1] = c.rhs;

            if c.relation == Relation::Ge {
                for v in row.iter_mut() {
                    *v = -*v;
                }
            }
        }

        // every row starts with its +1 auxiliary column basic
        let basis = aux.iter().map(|a| a.unit_column().0).collect();

        Ok(Self {
            data,
            n_vars,
            aux,
            basis,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.len()
    }

    pub fn columns(&self) -> usize {
        self.data[0].len()
    }

    pub fn rhs_column(&self) -> usize {
        self.columns() - 1
    }

    pub fn num_variables(&self) -> usize {
        self.n_vars
    }

    pub fn num_constraints(&self) -> usize {
        self.aux.len()
    }

    pub fn aux_columns(&self, constraint: usize) -> AuxColumns {
        self.aux[constraint]
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row]
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.data[row][column]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.data[row][self.rhs_column()]
    }

    /// Row 0 RHS: the internal (maximized) objective value.
    pub fn objective_value(&self) -> f64 {
        self.rhs(0)
    }

    /// Overwrites one cell. Nothing is re-solved.
    pub fn set(&mut self, row: usize, column: usize, value: f64) -> Result<()> {
        if row >= self.rows() || column >= self.columns() {
            return Err(Error::CellOutOfRange {
                row,
                column,
                rows: self.rows(),
                columns: self.columns(),
            });
        }
        if !value.is_finite() {
            return Err(Error::NonFinite(value));
        }
        self.data[row][column] = value;
        Ok(())
    }

    /// Gauss-Jordan step: normalizes the pivot row and clears the pivot
    /// column everywhere else, RHS included. `col` becomes basic in `row`.
    pub fn pivot(&mut self, row: usize, col: usize) {
        let n_rows = self.rows();
        let n_cols = self.columns();

        let pivot_val = self.data[row][col];
        for j in 0..n_cols {
            self.data[row][j] /= pivot_val;
        }

        for i in 0..n_rows {
            if i != row {
                let factor = self.data[i][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n_cols {
                    self.data[i][j] -= factor * self.data[row][j];
                }
            }
        }
        self.basis[row - 1] = col;
    }

    /// No row 0 entry left of the RHS is below `-tolerance`.
    pub fn is_optimal(&self, tolerance: f64) -> bool {
        self.data[0][..self.rhs_column()].iter().all(|&v| v >= -tolerance)
    }

    pub fn has_negative_rhs(&self, tolerance: f64) -> bool {
        (1..self.rows()).any(|i| self.rhs(i) < -tolerance)
    }

    /// The constraint row in which `column` is basic.
    ///
    /// Each row has exactly one basic column, so a non-basic column whose
    /// entries happen to equal a basic one is still reported as non-basic.
    pub fn basic_row(&self, column: usize) -> Option<usize> {
        self.basis.iter().position(|&c| c == column).map(|i| i + 1)
    }

    /// `(column, row)` for every basic column, ordered by column.
    pub fn basis(&self) -> Vec<(usize, usize)> {
        let mut basis: Vec<(usize, usize)> = self.basis.iter().enumerate().map(|(i, &c)| (c, i + 1)).collect();
        basis.sort_unstable();
        basis
    }

    /// Decision-variable values: the RHS of the basic row, 0 when non-basic.
    pub fn values(&self) -> Vec<f64> {
        (0..self.n_vars)
            .map(|j| self.basic_row(j).map_or(0.0, |r| self.rhs(r)))
            .collect()
    }

    /// Appends `constraint` as a new last row of an already pivoted
    /// tableau, with fresh slack/surplus columns inserted before the RHS.
    ///
    /// The current basic columns are eliminated from the new row, so the
    /// tableau stays in canonical form; its RHS may come out negative.
    pub fn append_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        if constraint.coefficients.len() != self.n_vars {
            return Err(Error::ConstraintLength {
                constraint: self.num_constraints(),
                expected: self.n_vars,
                found: constraint.coefficients.len(),
            });
        }

        let basis = self.basis();
        let rhs_col = self.rhs_column();
        let (columns, _) = AuxColumns::for_relation(constraint.relation, rhs_col);
        let width = columns.width();

        for row in &mut self.data {
            for _ in 0..width {
                row.insert(rhs_col, 0.0);
            }
        }

        let total_cols = self.columns();
        let mut new_row = vec![0.0; total_cols];
        new_row[..self.n_vars].copy_from_slice(&constraint.coefficients);
        if let Some(slack) = columns.slack {
            new_row[slack] = 1.0;
        }
        if let Some(surplus) = columns.surplus {
            new_row[surplus] = -1.0;
        }
        new_row[total_cols - 1] = constraint.rhs;
        if constraint.relation == Relation::Ge {
            for v in new_row.iter_mut() {
                *v = -*v;
            }
        }

        for (col, row) in basis {
            let factor = new_row[col];
            if factor != 0.0 {
                for j in 0..total_cols {
                    new_row[j] -= factor * self.data[row][j];
                }
            }
        }

        self.data.push(new_row);
        self.basis.push(columns.unit_column().0);
        self.aux.push(columns);
        Ok(())
    }

    /// Adds a decision variable as a new last variable column, expressed in
    /// the current basis.
    ///
    /// The unit columns of the constraints record every row operation made
    /// so far, so the new column is their combination weighted by
    /// `coefficients` (one per constraint), plus the objective entry.
    pub fn append_variable(&mut self, sense: ObjectiveSense, objective: f64, coefficients: &[f64]) -> Result<()> {
        if coefficients.len() != self.num_constraints() {
            return Err(Error::ActivityLength {
                expected: self.num_constraints(),
                found: coefficients.len(),
            });
        }

        let units: Vec<(usize, f64)> = self.aux.iter().map(|a| a.unit_column()).collect();
        let column: Vec<f64> = (0..self.rows())
            .map(|i| {
                let initial = match (i, sense) {
                    (0, ObjectiveSense::Max) => -objective,
                    (0, ObjectiveSense::Min) => objective,
                    _ => 0.0,
                };
                initial
                    + units
                        .iter()
                        .zip(coefficients)
                        .map(|(&(col, sign), a)| self.data[i][col] * sign * a)
                        .sum::<f64>()
            })
            .collect();

        let at = self.n_vars;
        for (row, v) in self.data.iter_mut().zip(column) {
            row.insert(at, v);
        }
        for aux in &mut self.aux {
            aux.slack = aux.slack.map(|c| c + 1);
            aux.surplus = aux.surplus.map(|c| c + 1);
        }
        for c in self.basis.iter_mut().filter(|c| **c >= at) {
            *c += 1;
        }
        self.n_vars += 1;
        Ok(())
    }
}
