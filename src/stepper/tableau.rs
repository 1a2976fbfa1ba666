//! Butcher tableaux of the explicit schemes.
//!
//! Row `s` of `a` holds the `s` weights of the stages before stage `s`, so
//! the matrix is strictly lower triangular by construction.

/// Explicit Runge-Kutta scheme as `(c, a, b)`.
#[derive(Debug, PartialEq)]
pub struct ButcherTableau {
    pub name: &'static str,
    /// Stage time offsets as fractions of the step.
    pub c: &'static [f64],
    /// Stage coupling weights (strictly lower triangular, by rows).
    pub a: &'static [&'static [f64]],
    /// Final combination weights.
    pub b: &'static [f64],
}

impl ButcherTableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }
}

pub const EULER: ButcherTableau = ButcherTableau {
    name: "explicit Euler",
    c: &[0.0],
    a: &[&[]],
    b: &[1.0],
};

pub const HEUN: ButcherTableau = ButcherTableau {
    name: "Heun",
    c: &[0.0, 1.0],
    a: &[&[], &[1.0]],
    b: &[0.5, 0.5],
};

pub const SSP_RK3: ButcherTableau = ButcherTableau {
    name: "SSP-RK3",
    c: &[0.0, 1.0, 0.5],
    a: &[&[], &[1.0], &[0.25, 0.25]],
    b: &[1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
};

pub const CLASSICAL_RK4: ButcherTableau = ButcherTableau {
    name: "classical RK4",
    c: &[0.0, 0.5, 0.5, 1.0],
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
};
