//! Boundary condition library.
//!
//! Every condition is a pure function of time, position, the local field
//! state at the boundary edge, the edge normal, its configured coefficients
//! and the physical constants of the equation model. The function is chosen
//! once, when the configuration is loaded, by turning a function tag plus a
//! coefficient list into a [`BcFunction`] variant. A wrong coefficient count
//! therefore never reaches time stepping.
//!
//! Conditions that only define a scalar (`sinus`, `gaussian`,
//! `gaussian2DTransport`) write component 0 and leave the other components of
//! the slot untouched.

use std::f64::consts::PI;

use crate::data::field::Field;
use crate::partition::{BoundaryDof, DomainPartition};
use crate::solver_error::SolverError;

/// Gaussian bump along one axis: `amplitude * exp(-(x - center)^2 / (2 variance)) + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gaussian1D {
    pub amplitude: f64,
    pub center: f64,
    pub variance: f64,
    pub offset: f64,
}

impl Gaussian1D {
    #[inline]
    fn at(&self, x: f64) -> f64 {
        let d = x - self.center;
        self.amplitude * (-(d * d) / (2.0 * self.variance)).exp() + self.offset
    }
}

/// Gaussian bump in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gaussian2D {
    pub amplitude: f64,
    pub x0: f64,
    pub var_x: f64,
    pub y0: f64,
    pub var_y: f64,
    pub offset: f64,
}

impl Gaussian2D {
    #[inline]
    fn at(&self, pos: &[f64; 3]) -> f64 {
        let dx = pos[0] - self.x0;
        let dy = pos[1] - self.y0;
        let e = dx * dx / (2.0 * self.var_x) + dy * dy / (2.0 * self.var_y);
        self.amplitude * (-e).exp() + self.offset
    }
}

/// How many field components a condition can act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentRequirement {
    AtLeast(usize),
    Exactly(usize),
}

impl ComponentRequirement {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            ComponentRequirement::AtLeast(k) => n >= k,
            ComponentRequirement::Exactly(k) => n == k,
        }
    }

    fn count(self) -> usize {
        match self {
            ComponentRequirement::AtLeast(k) | ComponentRequirement::Exactly(k) => k,
        }
    }
}

/// Closed set of boundary functions, coefficients resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum BcFunction {
    /// `amplitude * sin(2π frequency t + phase)` on component 0.
    Sinus {
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },
    /// `amplitude * exp(-(t - center)^2 / (2 variance))` on component 0.
    Gaussian {
        amplitude: f64,
        center: f64,
        variance: f64,
    },
    /// Fixed value per component.
    Constant { values: Vec<f64> },
    /// Zero-gradient: copy the interior state.
    FreeTransport,
    /// Specular reflection of `(h, hu, hv)`.
    ReflectShallow,
    /// Outgoing-characteristic condition around the reference level.
    OpenShallow { level: f64 },
    /// Linearised variant of [`BcFunction::OpenShallow`] around depth `h0`.
    OpenShallowLinear { level: f64 },
    Gaussian2DShallow(Gaussian2D),
    Gaussian1DShallowX(Gaussian1D),
    Gaussian1DShallowY(Gaussian1D),
    /// Scalar Gaussian bump on component 0.
    Gaussian2DTransport(Gaussian2D),
}

impl BcFunction {
    /// Resolve a function tag and its coefficients.
    ///
    /// `boundary` is only used to name the offender in errors.
    pub fn from_tag(boundary: &str, tag: &str, coeffs: &[f64]) -> Result<Self, SolverError> {
        let expect = |kind: &'static str, n: usize| {
            if coeffs.len() == n {
                Ok(())
            } else {
                Err(SolverError::CoefficientCount {
                    boundary: boundary.to_string(),
                    kind,
                    expected: n,
                    got: coeffs.len(),
                })
            }
        };
        let g1 = |c: &[f64]| Gaussian1D {
            amplitude: c[0],
            center: c[1],
            variance: c[2],
            offset: c[3],
        };
        let g2 = |c: &[f64]| Gaussian2D {
            amplitude: c[0],
            x0: c[1],
            var_x: c[2],
            y0: c[3],
            var_y: c[4],
            offset: c[5],
        };

        let f = match tag {
            "sinus" => {
                expect("sinus", 3)?;
                BcFunction::Sinus {
                    amplitude: coeffs[0],
                    frequency: coeffs[1],
                    phase: coeffs[2],
                }
            }
            "gaussian" => {
                expect("gaussian", 3)?;
                BcFunction::Gaussian {
                    amplitude: coeffs[0],
                    center: coeffs[1],
                    variance: coeffs[2],
                }
            }
            "constant" => {
                if coeffs.is_empty() {
                    return Err(SolverError::CoefficientCount {
                        boundary: boundary.to_string(),
                        kind: "constant",
                        expected: 1,
                        got: 0,
                    });
                }
                BcFunction::Constant {
                    values: coeffs.to_vec(),
                }
            }
            "constantNeumann" | "freeTransport" => {
                expect("constantNeumann", 0)?;
                BcFunction::FreeTransport
            }
            "reflectShallow" => {
                expect("reflectShallow", 0)?;
                BcFunction::ReflectShallow
            }
            "openShallow" => {
                expect("openShallow", 1)?;
                BcFunction::OpenShallow { level: coeffs[0] }
            }
            "openShallowLin" => {
                expect("openShallowLin", 1)?;
                BcFunction::OpenShallowLinear { level: coeffs[0] }
            }
            "gaussian2DShallow" => {
                expect("gaussian2DShallow", 6)?;
                BcFunction::Gaussian2DShallow(g2(coeffs))
            }
            "gaussian1DShallowX" => {
                expect("gaussian1DShallowX", 4)?;
                BcFunction::Gaussian1DShallowX(g1(coeffs))
            }
            "gaussian1DShallowY" => {
                expect("gaussian1DShallowY", 4)?;
                BcFunction::Gaussian1DShallowY(g1(coeffs))
            }
            "gaussian2DTransport" | "gaussian2D" => {
                expect("gaussian2DTransport", 6)?;
                BcFunction::Gaussian2DTransport(g2(coeffs))
            }
            other => {
                return Err(SolverError::UnknownBoundaryType {
                    boundary: boundary.to_string(),
                    kind: other.to_string(),
                });
            }
        };
        Ok(f)
    }

    /// Canonical function tag.
    pub fn tag(&self) -> &'static str {
        match self {
            BcFunction::Sinus { .. } => "sinus",
            BcFunction::Gaussian { .. } => "gaussian",
            BcFunction::Constant { .. } => "constant",
            BcFunction::FreeTransport => "constantNeumann",
            BcFunction::ReflectShallow => "reflectShallow",
            BcFunction::OpenShallow { .. } => "openShallow",
            BcFunction::OpenShallowLinear { .. } => "openShallowLin",
            BcFunction::Gaussian2DShallow(_) => "gaussian2DShallow",
            BcFunction::Gaussian1DShallowX(_) => "gaussian1DShallowX",
            BcFunction::Gaussian1DShallowY(_) => "gaussian1DShallowY",
            BcFunction::Gaussian2DTransport(_) => "gaussian2DTransport",
        }
    }

    /// Coefficients in configuration order.
    pub fn coefficients(&self) -> Vec<f64> {
        let g1 = |g: &Gaussian1D| vec![g.amplitude, g.center, g.variance, g.offset];
        let g2 = |g: &Gaussian2D| vec![g.amplitude, g.x0, g.var_x, g.y0, g.var_y, g.offset];
        match self {
            BcFunction::Sinus {
                amplitude,
                frequency,
                phase,
            } => vec![*amplitude, *frequency, *phase],
            BcFunction::Gaussian {
                amplitude,
                center,
                variance,
            } => vec![*amplitude, *center, *variance],
            BcFunction::Constant { values } => values.clone(),
            BcFunction::FreeTransport | BcFunction::ReflectShallow => Vec::new(),
            BcFunction::OpenShallow { level } | BcFunction::OpenShallowLinear { level } => {
                vec![*level]
            }
            BcFunction::Gaussian2DShallow(g) | BcFunction::Gaussian2DTransport(g) => g2(g),
            BcFunction::Gaussian1DShallowX(g) | BcFunction::Gaussian1DShallowY(g) => g1(g),
        }
    }

    pub fn component_requirement(&self) -> ComponentRequirement {
        use ComponentRequirement::*;
        match self {
            BcFunction::Sinus { .. }
            | BcFunction::Gaussian { .. }
            | BcFunction::FreeTransport
            | BcFunction::Gaussian2DTransport(_) => AtLeast(1),
            BcFunction::Constant { values } => Exactly(values.len()),
            BcFunction::ReflectShallow
            | BcFunction::OpenShallow { .. }
            | BcFunction::OpenShallowLinear { .. }
            | BcFunction::Gaussian2DShallow(_)
            | BcFunction::Gaussian1DShallowX(_)
            | BcFunction::Gaussian1DShallowY(_) => Exactly(3),
        }
    }

    /// Physical constants read from the equation model (`g`, then `h0`).
    pub fn flux_coeffs_required(&self) -> usize {
        match self {
            BcFunction::OpenShallow { .. } => 1,
            BcFunction::OpenShallowLinear { .. } => 2,
            _ => 0,
        }
    }

    /// Write the boundary state at `at` into `out`.
    ///
    /// `out` holds the slot's current state on entry. Coefficient and
    /// component counts are validated at load time and only asserted here.
    pub fn eval(&self, out: &mut [f64], t: f64, field: &Field, at: &BoundaryDof, flux_coeffs: &[f64]) {
        debug_assert!(self.component_requirement().accepts(out.len()));
        debug_assert!(flux_coeffs.len() >= self.flux_coeffs_required());
        let j = at.interior;
        let [nx, ny] = at.normal;
        match self {
            BcFunction::Sinus {
                amplitude,
                frequency,
                phase,
            } => {
                out[0] = amplitude * (2.0 * PI * frequency * t + phase).sin();
            }
            BcFunction::Gaussian {
                amplitude,
                center,
                variance,
            } => {
                let d = t - center;
                out[0] = amplitude * (-(d * d) / (2.0 * variance)).exp();
            }
            BcFunction::Constant { values } => {
                out.copy_from_slice(values);
            }
            BcFunction::FreeTransport => {
                field.read_dof(j, out);
            }
            BcFunction::ReflectShallow => {
                let (hu, hv) = (field.value(1, j), field.value(2, j));
                out[0] = field.value(0, j);
                out[1] = (1.0 - 2.0 * nx * nx) * hu - 2.0 * nx * ny * hv;
                out[2] = (1.0 - 2.0 * ny * ny) * hv - 2.0 * nx * ny * hu;
            }
            BcFunction::OpenShallow { level } => {
                let h = field.value(0, j);
                let un = (nx * field.value(1, j) + ny * field.value(2, j)) / h;
                open_characteristic(out, un, h, *level, flux_coeffs[0], at.normal);
            }
            BcFunction::OpenShallowLinear { level } => {
                let h0 = flux_coeffs[1];
                let un = (nx * field.value(1, j) + ny * field.value(2, j)) / h0;
                open_characteristic(out, un, field.value(0, j), *level, flux_coeffs[0], at.normal);
            }
            BcFunction::Gaussian2DShallow(g) => {
                out[0] = g.at(&at.position);
                out[1] = 0.0;
                out[2] = 0.0;
            }
            BcFunction::Gaussian1DShallowX(g) => {
                out[0] = g.at(at.position[0]);
                out[1] = 0.0;
                out[2] = 0.0;
            }
            BcFunction::Gaussian1DShallowY(g) => {
                out[0] = g.at(at.position[1]);
                out[1] = 0.0;
                out[2] = 0.0;
            }
            BcFunction::Gaussian2DTransport(g) => {
                out[0] = g.at(&at.position);
            }
        }
    }
}

#[inline]
fn open_characteristic(out: &mut [f64], un: f64, h: f64, level: f64, g: f64, n: [f64; 2]) {
    let alpha = un - (g / level).sqrt() * (h - level);
    out[0] = level;
    out[1] = alpha * n[0];
    out[2] = alpha * n[1];
}

/// Named, resolved boundary condition.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryCondition {
    name: String,
    function: BcFunction,
}

impl BoundaryCondition {
    /// Resolve `tag` + `coeffs` for the boundary called `name`.
    pub fn new(name: impl Into<String>, tag: &str, coeffs: &[f64]) -> Result<Self, SolverError> {
        let name = name.into();
        let function = BcFunction::from_tag(&name, tag, coeffs)?;
        Ok(BoundaryCondition { name, function })
    }

    pub fn from_function(name: impl Into<String>, function: BcFunction) -> Self {
        BoundaryCondition {
            name: name.into(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &BcFunction {
        &self.function
    }

    /// Check the condition against the equation model it will act on.
    pub fn check_model(&self, n_components: usize, n_flux_coeffs: usize) -> Result<(), SolverError> {
        let req = self.function.component_requirement();
        if !req.accepts(n_components) {
            return Err(SolverError::ComponentCount {
                boundary: self.name.clone(),
                kind: self.function.tag(),
                expected: req.count(),
                got: n_components,
            });
        }
        let needed = self.function.flux_coeffs_required();
        if n_flux_coeffs < needed {
            return Err(SolverError::FluxCoefficients {
                boundary: self.name.clone(),
                kind: self.function.tag(),
                expected: needed,
                got: n_flux_coeffs,
            });
        }
        Ok(())
    }
}

/// Overwrite every slot of `patch_name` with the value of `bc` at time `t`.
///
/// `scratch` must hold one value per field component. Missing patches are
/// skipped: not every rank touches every physical boundary.
pub fn apply_to_field(
    field: &mut Field,
    partition: &DomainPartition,
    bc: &BoundaryCondition,
    t: f64,
    flux_coeffs: &[f64],
    scratch: &mut [f64],
) {
    let Some(patch) = partition.boundary(bc.name()) else {
        return;
    };
    for at in patch.dofs() {
        field.read_dof(at.dof, scratch);
        bc.function().eval(scratch, t, field, at, flux_coeffs);
        field.write_dof(at.dof, scratch);
    }
}
