//! The spatial residual: the time derivative of the owned DOFs.
//!
//! The integrator calls [`ResidualEvaluator::evaluate`] once per Runge-Kutta
//! stage, after the stage field has been synchronised and every boundary slot
//! holds its imposed value. The evaluator may read any DOF of the field,
//! owned or ghost, and writes one rate per owned DOF and component.

mod upwind;

pub use upwind::UpwindTransport1d;

use crate::config::{Formulation, SolverParams};
use crate::data::field::{Field, FieldRate};
use crate::partition::DomainPartition;
use crate::solver_error::SolverError;

/// Read-only inputs of one residual evaluation.
#[derive(Clone, Copy, Debug)]
pub struct ResidualContext<'a> {
    /// Stage time `t + c_s dt`.
    pub t: f64,
    /// Stage index within the current step.
    pub stage: usize,
    pub formulation: Formulation,
    pub params: &'a SolverParams,
    pub partition: &'a DomainPartition,
    pub rank: usize,
}

/// Strong- or weak-form spatial operator of one equation model.
pub trait ResidualEvaluator {
    /// Field components the model works on.
    fn n_components(&self) -> usize;

    /// Physical constants handed to the boundary conditions (`g`, `h0`, ...).
    fn flux_coeffs(&self) -> &[f64] {
        &[]
    }

    /// Write `d(field)/dt` at `ctx.t` into `rate`.
    ///
    /// `field` is [`Synchronized`](crate::data::field::Consistency::Synchronized).
    fn evaluate(
        &mut self,
        ctx: &ResidualContext<'_>,
        field: &Field,
        rate: &mut FieldRate,
    ) -> Result<(), SolverError>;
}

impl<E: ResidualEvaluator + ?Sized> ResidualEvaluator for &mut E {
    fn n_components(&self) -> usize {
        (**self).n_components()
    }

    fn flux_coeffs(&self) -> &[f64] {
        (**self).flux_coeffs()
    }

    fn evaluate(
        &mut self,
        ctx: &ResidualContext<'_>,
        field: &Field,
        rate: &mut FieldRate,
    ) -> Result<(), SolverError> {
        (**self).evaluate(ctx, field, rate)
    }
}

impl<E: ResidualEvaluator + ?Sized> ResidualEvaluator for Box<E> {
    fn n_components(&self) -> usize {
        (**self).n_components()
    }

    fn flux_coeffs(&self) -> &[f64] {
        (**self).flux_coeffs()
    }

    fn evaluate(
        &mut self,
        ctx: &ResidualContext<'_>,
        field: &Field,
        rate: &mut FieldRate,
    ) -> Result<(), SolverError> {
        (**self).evaluate(ctx, field, rate)
    }
}

/// Residual given by a closure; handy for ODE-style models.
pub struct FnResidual<F> {
    n_components: usize,
    flux_coeffs: Vec<f64>,
    f: F,
}

impl<F> FnResidual<F>
where
    F: FnMut(&ResidualContext<'_>, &Field, &mut FieldRate) -> Result<(), SolverError>,
{
    pub fn new(n_components: usize, f: F) -> Self {
        FnResidual {
            n_components,
            flux_coeffs: Vec::new(),
            f,
        }
    }

    pub fn with_flux_coeffs(mut self, coeffs: impl Into<Vec<f64>>) -> Self {
        self.flux_coeffs = coeffs.into();
        self
    }
}

impl<F> ResidualEvaluator for FnResidual<F>
where
    F: FnMut(&ResidualContext<'_>, &Field, &mut FieldRate) -> Result<(), SolverError>,
{
    fn n_components(&self) -> usize {
        self.n_components
    }

    fn flux_coeffs(&self) -> &[f64] {
        &self.flux_coeffs
    }

    fn evaluate(
        &mut self,
        ctx: &ResidualContext<'_>,
        field: &Field,
        rate: &mut FieldRate,
    ) -> Result<(), SolverError> {
        (self.f)(ctx, field, rate)
    }
}

impl<F> std::fmt::Debug for FnResidual<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnResidual")
            .field("n_components", &self.n_components)
            .field("flux_coeffs", &self.flux_coeffs)
            .finish_non_exhaustive()
    }
}
