//! Solver parameters: scheme selectors, run length and the boundary-condition table.
//!
//! A [`SolverParams`] value is fully validated when it is built, whichever way
//! it is built: with [`SolverParams::new`], from the line-based parameter file
//! ([`SolverParams::from_file`] / [`str::parse`]) or through serde. After that
//! it is immutable for the whole run.

mod loader;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::data::bc::BoundaryCondition;
use crate::solver_error::SolverError;
use crate::stepper::tableau::{self, ButcherTableau};

/// Explicit Runge-Kutta scheme.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimeScheme {
    /// Explicit Euler.
    Rk1,
    /// Heun's method (explicit trapezoid).
    Rk2,
    /// Three-stage strong-stability-preserving scheme of Shu and Osher.
    Rk3,
    /// Classical four-stage scheme.
    Rk4,
}

impl TimeScheme {
    pub fn order(self) -> usize {
        match self {
            TimeScheme::Rk1 => 1,
            TimeScheme::Rk2 => 2,
            TimeScheme::Rk3 => 3,
            TimeScheme::Rk4 => 4,
        }
    }

    /// Stage count; equals the order for every supported scheme.
    pub fn stages(self) -> usize {
        self.tableau().stages()
    }

    pub fn tableau(self) -> &'static ButcherTableau {
        match self {
            TimeScheme::Rk1 => &tableau::EULER,
            TimeScheme::Rk2 => &tableau::HEUN,
            TimeScheme::Rk3 => &tableau::SSP_RK3,
            TimeScheme::Rk4 => &tableau::CLASSICAL_RK4,
        }
    }
}

impl FromStr for TimeScheme {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RK1" => Ok(TimeScheme::Rk1),
            "RK2" => Ok(TimeScheme::Rk2),
            "RK3" => Ok(TimeScheme::Rk3),
            "RK4" => Ok(TimeScheme::Rk4),
            other => Err(SolverError::UnknownTimeScheme(other.to_string())),
        }
    }
}

impl fmt::Display for TimeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RK{}", self.order())
    }
}

/// How the residual evaluator writes boundary terms.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Formulation {
    Strong,
    Weak,
}

impl FromStr for Formulation {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strong" => Ok(Formulation::Strong),
            "weak" => Ok(Formulation::Weak),
            other => Err(SolverError::UnknownFormulation(other.to_string())),
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Formulation::Strong => "strong",
            Formulation::Weak => "weak",
        })
    }
}

/// Basis function family used by the spatial discretisation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum BasisType {
    #[default]
    Lagrange,
    Isoparametric,
}

impl FromStr for BasisType {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Lagrange" => Ok(BasisType::Lagrange),
            "Isoparametric" => Ok(BasisType::Isoparametric),
            other => Err(SolverError::UnknownBasis(other.to_string())),
        }
    }
}

impl fmt::Display for BasisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BasisType::Lagrange => "Lagrange",
            BasisType::Isoparametric => "Isoparametric",
        })
    }
}

/// Gauss quadrature order of the spatial integration (`Gauss<N>`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpaceIntegration(pub u32);

impl FromStr for SpaceIntegration {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SolverError::BadSpaceIntegration(s.to_string());
        let digits = s.strip_prefix("Gauss").ok_or_else(bad)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        digits.parse().map(SpaceIntegration).map_err(|_| bad())
    }
}

impl fmt::Display for SpaceIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gauss{}", self.0)
    }
}

impl Default for SpaceIntegration {
    fn default() -> Self {
        SpaceIntegration(1)
    }
}

/// Immutable run configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawSolverParams", into = "RawSolverParams")]
pub struct SolverParams {
    space_integration: SpaceIntegration,
    basis: BasisType,
    time_scheme: TimeScheme,
    formulation: Formulation,
    sim_time: f64,
    time_step: f64,
    boundary_conditions: BTreeMap<String, BoundaryCondition>,
}

impl SolverParams {
    /// Parameters with no boundary conditions, `Gauss1` and a Lagrange basis.
    pub fn new(
        time_scheme: TimeScheme,
        formulation: Formulation,
        sim_time: f64,
        time_step: f64,
    ) -> Result<Self, SolverError> {
        check_sim_time(sim_time)?;
        check_time_step(time_step)?;
        Ok(SolverParams {
            space_integration: SpaceIntegration::default(),
            basis: BasisType::default(),
            time_scheme,
            formulation,
            sim_time,
            time_step,
            boundary_conditions: BTreeMap::new(),
        })
    }

    pub fn with_space_integration(mut self, space_integration: SpaceIntegration) -> Self {
        self.space_integration = space_integration;
        self
    }

    pub fn with_basis(mut self, basis: BasisType) -> Self {
        self.basis = basis;
        self
    }

    /// Add a boundary condition; a repeated name is a configuration error.
    pub fn with_boundary_condition(mut self, bc: BoundaryCondition) -> Result<Self, SolverError> {
        self.insert_boundary_condition(bc)?;
        Ok(self)
    }

    pub(crate) fn insert_boundary_condition(&mut self, bc: BoundaryCondition) -> Result<(), SolverError> {
        if self.boundary_conditions.contains_key(bc.name()) {
            return Err(SolverError::DuplicateBoundary(bc.name().to_string()));
        }
        self.boundary_conditions.insert(bc.name().to_string(), bc);
        Ok(())
    }

    /// Load the line-based parameter file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SolverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SolverError::ParamIo {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn space_integration(&self) -> SpaceIntegration {
        self.space_integration
    }

    pub fn basis(&self) -> BasisType {
        self.basis
    }

    pub fn time_scheme(&self) -> TimeScheme {
        self.time_scheme
    }

    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    /// Total simulated time.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Fixed time step.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn boundary_conditions(&self) -> &BTreeMap<String, BoundaryCondition> {
        &self.boundary_conditions
    }

    pub fn boundary_condition(&self, name: &str) -> Option<&BoundaryCondition> {
        self.boundary_conditions.get(name)
    }
}

impl FromStr for SolverParams {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        loader::parse_params(s)
    }
}

fn check_sim_time(sim_time: f64) -> Result<(), SolverError> {
    if sim_time.is_finite() && sim_time >= 0.0 {
        Ok(())
    } else {
        Err(SolverError::InvalidSimTime(sim_time.to_string()))
    }
}

fn check_time_step(time_step: f64) -> Result<(), SolverError> {
    if time_step.is_finite() && time_step > 0.0 {
        Ok(())
    } else {
        Err(SolverError::InvalidTimeStep(time_step.to_string()))
    }
}

/// Serialized form of one boundary condition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct RawBoundaryCondition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coefficients: Vec<f64>,
}

/// Serialized form of [`SolverParams`]; every tag is a plain string.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct RawSolverParams {
    #[serde(default = "default_space_integration")]
    space_integration: String,
    #[serde(default = "default_basis")]
    basis: String,
    time_scheme: String,
    formulation: String,
    sim_time: f64,
    time_step: f64,
    #[serde(default)]
    boundary_conditions: BTreeMap<String, RawBoundaryCondition>,
}

fn default_space_integration() -> String {
    SpaceIntegration::default().to_string()
}

fn default_basis() -> String {
    BasisType::default().to_string()
}

impl TryFrom<RawSolverParams> for SolverParams {
    type Error = SolverError;

    fn try_from(raw: RawSolverParams) -> Result<Self, Self::Error> {
        let mut params = SolverParams::new(
            raw.time_scheme.parse()?,
            raw.formulation.parse()?,
            raw.sim_time,
            raw.time_step,
        )?
        .with_space_integration(raw.space_integration.parse()?)
        .with_basis(raw.basis.parse()?);
        for (name, bc) in raw.boundary_conditions {
            params.insert_boundary_condition(BoundaryCondition::new(name, &bc.kind, &bc.coefficients)?)?;
        }
        Ok(params)
    }
}

impl From<SolverParams> for RawSolverParams {
    fn from(p: SolverParams) -> Self {
        RawSolverParams {
            space_integration: p.space_integration.to_string(),
            basis: p.basis.to_string(),
            time_scheme: p.time_scheme.to_string(),
            formulation: p.formulation.to_string(),
            sim_time: p.sim_time,
            time_step: p.time_step,
            boundary_conditions: p
                .boundary_conditions
                .into_values()
                .map(|bc| {
                    let raw = RawBoundaryCondition {
                        kind: bc.function().tag().to_string(),
                        coefficients: bc.function().coefficients(),
                    };
                    (bc.name().to_string(), raw)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_and_display() {
        for s in ["RK1", "RK2", "RK3", "RK4"] {
            assert_eq!(s.parse::<TimeScheme>().unwrap().to_string(), s);
        }
        assert!(matches!("RK5".parse::<TimeScheme>(), Err(SolverError::UnknownTimeScheme(_))));
        assert_eq!("weak".parse::<Formulation>().unwrap(), Formulation::Weak);
        assert!(matches!("Strong".parse::<Formulation>(), Err(SolverError::UnknownFormulation(_))));
        assert_eq!("Isoparametric".parse::<BasisType>().unwrap(), BasisType::Isoparametric);
        assert_eq!("Gauss12".parse::<SpaceIntegration>().unwrap(), SpaceIntegration(12));
        for bad in ["Gauss", "Gauss2a", "Lobatto3"] {
            assert!(bad.parse::<SpaceIntegration>().is_err());
        }
    }

    #[test]
    fn stage_counts_match_order() {
        for s in [TimeScheme::Rk1, TimeScheme::Rk2, TimeScheme::Rk3, TimeScheme::Rk4] {
            assert_eq!(s.stages(), s.order());
        }
    }

    #[test]
    fn run_length_is_validated() {
        assert!(SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 1.0, 0.0).is_err());
        assert!(SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 1.0, f64::NAN).is_err());
        assert!(matches!(
            SolverParams::new(TimeScheme::Rk4, Formulation::Strong, -1.0, 0.1),
            Err(SolverError::InvalidSimTime(_))
        ));
        assert!(SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 0.0, 0.1).is_ok());
    }

    #[test]
    fn duplicate_boundary_is_rejected() {
        let bc = BoundaryCondition::new("wall", "reflectShallow", &[]).unwrap();
        let p = SolverParams::new(TimeScheme::Rk1, Formulation::Weak, 1.0, 0.1)
            .unwrap()
            .with_boundary_condition(bc.clone())
            .unwrap();
        assert!(matches!(
            p.with_boundary_condition(bc),
            Err(SolverError::DuplicateBoundary(name)) if name == "wall"
        ));
    }

    #[test]
    fn json_roundtrip_keeps_tags() {
        let json = r#"{
            "time_scheme": "RK3",
            "formulation": "weak",
            "sim_time": 2.0,
            "time_step": 0.25,
            "boundary_conditions": {
                "inlet": { "type": "sinus", "coefficients": [1.0, 0.5, 0.0] },
                "outlet": { "type": "freeTransport" }
            }
        }"#;
        let p: SolverParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.time_scheme(), TimeScheme::Rk3);
        assert_eq!(p.space_integration(), SpaceIntegration(1));
        assert_eq!(p.boundary_condition("outlet").unwrap().function().tag(), "constantNeumann");

        let back: SolverParams = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn json_rejects_bad_coefficients() {
        let json = r#"{
            "time_scheme": "RK4", "formulation": "strong", "sim_time": 1, "time_step": 0.1,
            "boundary_conditions": { "inlet": { "type": "gaussian", "coefficients": [1.0] } }
        }"#;
        let err = serde_json::from_str::<SolverParams>(json).unwrap_err();
        assert!(err.to_string().contains("inlet"));
    }
}
