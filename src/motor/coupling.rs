// Differential coupling matrix for a two-motor swerve module
// Converts between physical motor rates [positive, negative] and logical axis
// rates [sum (azimuth), difference (wheel)].

use serde_json::Value;

use crate::configuration::ConfigurationError;

/// A 2x2 real matrix, stored row-major
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2 {
    rows: [[f64; 2]; 2],
}

impl Matrix2 {
    pub const fn new(rows: [[f64; 2]; 2]) -> Self {
        Self { rows }
    }

    pub fn determinant(&self) -> f64 {
        let [[a, b], [c, d]] = self.rows;
        a * d - b * c
    }

    /// True if the determinant is zero to within rounding of the row scales
    ///
    /// The tolerance scales with the rows, so the same coupling expressed in
    /// smaller units is judged the same way.
    pub fn is_singular(&self) -> bool {
        let [[a, b], [c, d]] = self.rows;
        let det = self.determinant();
        let tolerance = f64::EPSILON * (a.abs() + b.abs()) * (c.abs() + d.abs());
        !det.is_finite() || det == 0.0 || det.abs() <= tolerance
    }

    /// Closed-form inverse, `None` if the matrix is singular
    pub fn inverse(&self) -> Option<Self> {
        if self.is_singular() {
            return None;
        }

        let det = self.determinant();
        let [[a, b], [c, d]] = self.rows;
        Some(Self::new([[d / det, -b / det], [-c / det, a / det]]))
    }

    /// Returns row `index` as coefficients over [positive, negative]
    pub fn row(&self, index: usize) -> [f64; 2] {
        self.rows[index]
    }

    pub fn as_array(&self) -> [[f64; 2]; 2] {
        self.rows
    }

    /// Matrix-vector product
    pub fn apply(&self, v: [f64; 2]) -> [f64; 2] {
        self.rows.map(|row| dot(row, v))
    }

    /// Matrix-matrix product `self * rhs`
    pub fn multiply(&self, rhs: &Self) -> Self {
        let col = |j: usize| [rhs.rows[0][j], rhs.rows[1][j]];
        Self::new(self.rows.map(|row| [dot(row, col(0)), dot(row, col(1))]))
    }
}

/// Dot product of a matrix row with a [positive, negative] pair
pub fn dot(row: [f64; 2], v: [f64; 2]) -> f64 {
    row[0] * v[0] + row[1] * v[1]
}

/// Forward and inverse differential matrices for one module
///
/// `forward` maps [positive, negative] motor rates to [sum, difference]
/// logical rates; `inverse` maps them back. Column 0 is always the positive
/// motor, column 1 the negative motor.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrix {
    forward: Matrix2,
    inverse: Matrix2,
}

impl CouplingMatrix {
    /// Build from a typed forward matrix, rejecting degenerate couplings
    pub fn new(forward: [[f64; 2]; 2]) -> Result<Self, ConfigurationError> {
        let forward = Matrix2::new(forward);
        let inverse = forward
            .inverse()
            .ok_or(ConfigurationError::SingularMatrix {
                determinant: forward.determinant(),
            })?;

        Ok(Self { forward, inverse })
    }

    /// Build from an untyped nested configuration value
    ///
    /// Checks, in order: the value is a list, it has two rows, every row is a
    /// list of width two, and every element is numeric. Only then is the
    /// matrix inverted.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let rows = value.as_array().ok_or(ConfigurationError::NotAList)?;
        if rows.len() != 2 {
            return Err(ConfigurationError::WrongHeight { found: rows.len() });
        }

        let mut forward = [[0.0; 2]; 2];
        for (r, row) in rows.iter().enumerate() {
            let items = row
                .as_array()
                .ok_or(ConfigurationError::RowNotAList { row: r })?;
            if items.len() != 2 {
                return Err(ConfigurationError::WrongWidth {
                    row: r,
                    found: items.len(),
                });
            }

            for (c, item) in items.iter().enumerate() {
                forward[r][c] = item
                    .as_f64()
                    .ok_or(ConfigurationError::NonNumericElement { row: r, col: c })?;
            }
        }

        Self::new(forward)
    }

    pub fn forward(&self) -> &Matrix2 {
        &self.forward
    }

    pub fn inverse(&self) -> &Matrix2 {
        &self.inverse
    }

    /// Physical motor rates -> logical axis rates
    pub fn to_logical(&self, physical: [f64; 2]) -> [f64; 2] {
        self.forward.apply(physical)
    }

    /// Logical axis rates -> physical motor rates
    pub fn to_physical(&self, logical: [f64; 2]) -> [f64; 2] {
        self.inverse.apply(logical)
    }
}
