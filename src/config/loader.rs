//! Line-based parameter file.
//!
//! ```text
//! Gauss3
//! Lagrange
//! RK4
//! strong
//! 10
//! 0.01
//! inlet
//! 	sinus
//! 	1,0.5,0
//! wall
//! 	reflectShallow
//!
//! ```
//!
//! Six header lines, then boundary blocks until end of input. Each block is a
//! boundary name followed by two tab-indented lines: the function tag and a
//! comma-separated coefficient list (empty after the tab when the function
//! takes none). Blank lines between blocks are skipped.

use super::{SolverParams, check_sim_time};
use crate::data::bc::BoundaryCondition;
use crate::solver_error::SolverError;

/// Numbered lines of the input, `\r` stripped.
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Lines {
            inner: text.lines().enumerate(),
            last: 0,
        }
    }

    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let (i, l) = self.inner.next()?;
        self.last = i + 1;
        Some((i + 1, l.trim_end_matches('\r')))
    }

    /// Next line, or a format error naming what was expected.
    fn expect(&mut self, what: &str) -> Result<(usize, &'a str), SolverError> {
        self.next_line().ok_or_else(|| SolverError::ParamFormat {
            line: self.last + 1,
            message: format!("unexpected end of input, expected {what}"),
        })
    }

    /// Next tab-indented line of a boundary block, without the tab.
    fn expect_indented(&mut self, boundary: &str, what: &str) -> Result<(usize, &'a str), SolverError> {
        let (n, l) = self.expect(what).map_err(|_| SolverError::ParamFormat {
            line: self.last + 1,
            message: format!("incomplete block for boundary `{boundary}`: missing {what}"),
        })?;
        match l.strip_prefix('\t') {
            Some(rest) => Ok((n, rest)),
            None => Err(SolverError::ParamFormat {
                line: n,
                message: format!("bad {what} format for boundary `{boundary}` (line must start with a tab)"),
            }),
        }
    }
}

pub(super) fn parse_params(text: &str) -> Result<SolverParams, SolverError> {
    let mut lines = Lines::new(text);

    let (_, space) = lines.expect("space integration type")?;
    let (_, basis) = lines.expect("basis function type")?;
    let (_, scheme) = lines.expect("time integration type")?;
    let (_, formulation) = lines.expect("solver type")?;
    let (_, sim_time) = lines.expect("simulation time")?;
    let (_, time_step) = lines.expect("time step")?;

    let space = space.parse()?;
    let basis = basis.parse()?;
    let scheme = scheme.parse()?;
    let formulation = formulation.parse()?;
    let sim_time = parse_sim_time(sim_time)?;
    let time_step = time_step
        .trim()
        .parse::<f64>()
        .map_err(|_| SolverError::InvalidTimeStep(time_step.to_string()))?;

    let mut params = SolverParams::new(scheme, formulation, sim_time, time_step)?
        .with_space_integration(space)
        .with_basis(basis);

    while let Some((_, name)) = lines.next_line() {
        if name.trim().is_empty() {
            continue;
        }
        let name = name.trim_end();
        let (_, tag) = lines.expect_indented(name, "type")?;
        let (n, coeffs) = lines.expect_indented(name, "coefficient")?;
        let coeffs = parse_coefficients(coeffs).map_err(|message| SolverError::ParamFormat {
            line: n,
            message: format!("boundary `{name}`: {message}"),
        })?;
        params.insert_boundary_condition(BoundaryCondition::new(name, tag.trim(), &coeffs)?)?;
    }

    log::debug!(
        "loaded {} boundary condition(s)",
        params.boundary_conditions().len()
    );
    Ok(params)
}

/// Whole number of time units.
fn parse_sim_time(s: &str) -> Result<f64, SolverError> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SolverError::InvalidSimTime(s.to_string()));
    }
    let t = s
        .parse::<u64>()
        .map_err(|_| SolverError::InvalidSimTime(s.to_string()))? as f64;
    check_sim_time(t)?;
    Ok(t)
}

fn parse_coefficients(s: &str) -> Result<Vec<f64>, String> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|c| {
            let c = c.trim();
            c.parse::<f64>()
                .map_err(|_| format!("cannot parse coefficient `{c}`"))
        })
        .collect()
}
