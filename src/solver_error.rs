//! SolverError: Unified error type for dg-stepper public APIs
//!
//! Configuration and topology problems are reported before the first time
//! step; communication failures abort the run. Nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for dg-stepper operations.
#[derive(Debug, Error)]
pub enum SolverError {
    // ----- configuration -----------------------------------------------------
    /// A boundary refers to a function tag the library does not know.
    #[error("unhandled boundary condition type `{kind}` for boundary `{boundary}`")]
    UnknownBoundaryType { boundary: String, kind: String },
    /// Wrong number of configured coefficients for a boundary function.
    #[error("boundary `{boundary}` ({kind}) expects {expected} coefficient(s), got {got}")]
    CoefficientCount {
        boundary: String,
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    /// The boundary function cannot act on a field with this many components.
    #[error("boundary `{boundary}` ({kind}) needs {expected} field component(s), model has {got}")]
    ComponentCount {
        boundary: String,
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    /// The equation model does not provide the physical constants a BC needs.
    #[error("boundary `{boundary}` ({kind}) needs {expected} flux coefficient(s), model provides {got}")]
    FluxCoefficients {
        boundary: String,
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    /// A boundary patch of the partition has no configured condition.
    #[error("no boundary condition configured for boundary `{0}`")]
    MissingBoundaryCondition(String),
    #[error("boundary `{0}` is configured more than once")]
    DuplicateBoundary(String),
    #[error("unexpected time integration type `{0}`")]
    UnknownTimeScheme(String),
    #[error("unexpected solver type `{0}` (expected `strong` or `weak`)")]
    UnknownFormulation(String),
    #[error("unexpected basis function type `{0}`")]
    UnknownBasis(String),
    #[error("unexpected space integration type `{0}`")]
    BadSpaceIntegration(String),
    #[error("unexpected simulation time duration `{0}`")]
    InvalidSimTime(String),
    #[error("unexpected time step `{0}`")]
    InvalidTimeStep(String),
    /// Malformed line in a parameter file.
    #[error("parameter file line {line}: {message}")]
    ParamFormat { line: usize, message: String },
    #[error("cannot read parameter file {}: {source}", path.display())]
    ParamIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ----- topology ----------------------------------------------------------
    /// A DOF index does not fit the field it addresses.
    #[error("DOF index {dof} out of range (len {len})")]
    DofOutOfRange { dof: usize, len: usize },
    /// The same ghost DOF is fed by two links.
    #[error("ghost DOF {0} is received more than once")]
    DuplicateGhost(usize),
    /// A boundary slot is also sent to a neighbour, so the neighbour would
    /// never see the imposed value.
    #[error("boundary DOF {0} is shared with a neighbour")]
    BoundaryDofShared(usize),
    /// A self link whose send and receive lists differ in length.
    #[error("self link on rank {rank} sends {send} DOF(s) but receives {recv}")]
    SelfLinkMismatch { rank: usize, send: usize, recv: usize },
    /// A neighbour announced a different number of shared DOFs than we expect.
    #[error("rank {neighbor} sends {got} shared DOF(s), expected {expected}")]
    LinkSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// A field does not have the shape its partition requires.
    #[error("field shape mismatch: expected {expected}, got {got}")]
    FieldShape { expected: String, got: String },

    // ----- communication -----------------------------------------------------
    /// Communication with a neighbour failed; the run cannot continue.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ----- evaluation --------------------------------------------------------
    /// Reported by a residual evaluator.
    #[error("residual evaluation failed: {0}")]
    Residual(String),
}

impl SolverError {
    /// True for the errors that leave partitions mutually inconsistent.
    pub fn is_fatal_comm(&self) -> bool {
        matches!(self, SolverError::CommError { .. })
    }
}
