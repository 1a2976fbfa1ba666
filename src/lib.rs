#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dg-stepper
//!
//! dg-stepper advances a field of physical unknowns (shallow-water or
//! scalar-transport state) in time on a mesh partitioned across ranks. It
//! provides an explicit Runge-Kutta integrator (orders 1 to 4), the halo
//! exchange that keeps partition boundaries consistent between stages, and a
//! library of boundary conditions resolved once from the run configuration.
//!
//! ## Features
//! - [`TimeIntegrator`](stepper::TimeIntegrator): one step or a whole run, all
//!   scratch storage allocated up front
//! - [`Field`](data::Field): one buffer per component with a consistency tag
//!   instead of separate partial and complete copies
//! - Pluggable communication backends (serial, threads-as-ranks, MPI)
//! - [`ResidualEvaluator`](residual::ResidualEvaluator) trait for the spatial
//!   operator, with a strong/weak upwind reference model
//! - Parameter loading from the line-based parameter file or any serde format
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! dg-stepper = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon", "check-invariants"]
//! ```
//!
//! ```
//! use dg_stepper::prelude::*;
//!
//! let block = decompose_strip(8, 1, 0.125, true)?.remove(0);
//! let params = SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 1.0, 0.0625)?;
//! let mut field = Field::for_partition(["c"], &block.partition);
//! field.owned_mut(0)[0] = 1.0;
//!
//! let upwind = UpwindTransport1d::new(1.0, &block);
//! let mut stepper = TimeIntegrator::new(&params, &block.partition, upwind, NoComm)?;
//! let summary = stepper.run(0.0, &mut field)?;
//! assert_eq!(summary.steps, 16);
//! # Ok::<(), SolverError>(())
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod partition;
pub mod residual;
pub mod solver_error;
pub mod stepper;

pub use debug_invariants::DebugInvariants;
pub use solver_error::SolverError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::config::{BasisType, Formulation, SolverParams, TimeScheme};
    pub use crate::data::bc::{BcFunction, BoundaryCondition};
    pub use crate::data::field::{Consistency, Field, FieldRate};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::partition::{
        BoundaryDof, DomainPartition, StripBlock, decompose_strip, synchronize,
    };
    pub use crate::residual::{ResidualContext, ResidualEvaluator, UpwindTransport1d};
    pub use crate::solver_error::SolverError;
    pub use crate::stepper::{RunSummary, TimeIntegrator};
}
