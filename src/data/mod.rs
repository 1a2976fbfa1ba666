//! Data module: unknown fields, stage rates and boundary conditions

pub mod bc;
pub mod field;

pub use crate::debug_invariants::DebugInvariants;
pub use bc::{BcFunction, BoundaryCondition};
pub use field::{Consistency, Field, FieldRate};
