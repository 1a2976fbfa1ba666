//! Explicit Runge-Kutta time integration over a partitioned field.
//!
//! One step of an `s`-stage scheme, on every rank in lockstep:
//!
//! 1. stage field `U_s = u_n + dt * sum_j a[s][j] k_j` on the owned DOFs;
//! 2. synchronise `U_s` with the neighbours (blocks until every link has exchanged);
//! 3. overwrite every boundary slot with its condition evaluated at `t + c[s] dt`;
//! 4. `k_s = R(t + c[s] dt, U_s)`.
//!
//! Finally `u_{n+1} = u_n + dt * sum_s b[s] k_s`, after which the field is
//! [`LocalOnly`](crate::data::field::Consistency::LocalOnly) again. Every
//! owned DOF is combined with the same sequence of floating-point operations
//! regardless of how the mesh is partitioned.

pub mod tableau;

#[cfg(not(feature = "rayon"))]
use itertools::izip;

use crate::algs::communicator::{Communicator, ExchangeTags};
use crate::config::SolverParams;
use crate::data::bc::{BoundaryCondition, apply_to_field};
use crate::data::field::{Field, FieldRate};
use crate::debug_invariants::DebugInvariants;
use crate::partition::{DomainPartition, Exchanger};
use crate::residual::{ResidualContext, ResidualEvaluator};
use crate::solver_error::SolverError;

pub use tableau::ButcherTableau;

/// Relative tolerance under which a leftover of `sim_time / dt` is rounding noise.
const REMAINDER_TOL: f64 = 1e-9;

/// Outcome of [`TimeIntegrator::run`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    /// Steps taken, the shortened one included.
    pub steps: u64,
    pub final_time: f64,
    /// Whether the last step was cut short to land on `sim_time`.
    pub shortened_last_step: bool,
}

/// Drives the residual evaluator through the stages of the configured scheme.
///
/// All scratch storage (stage field, one rate per stage, send buffers) is
/// allocated in [`TimeIntegrator::new`] and reused by every step.
pub struct TimeIntegrator<'a, E, C: Communicator> {
    params: &'a SolverParams,
    partition: &'a DomainPartition,
    evaluator: E,
    comm: C,
    tableau: &'static ButcherTableau,
    bcs: Vec<&'a BoundaryCondition>,
    exchanger: Exchanger<C>,
    stage_field: Field,
    rates: Vec<FieldRate>,
    bc_scratch: Vec<f64>,
}

impl<'a, E, C> TimeIntegrator<'a, E, C>
where
    E: ResidualEvaluator,
    C: Communicator,
{
    /// Validate the setup and allocate scratch storage.
    ///
    /// Every boundary patch of `partition` must have a condition in `params`
    /// that fits the evaluator's model. Collective: the link-size handshake
    /// runs here, so every rank must construct its integrator.
    pub fn new(
        params: &'a SolverParams,
        partition: &'a DomainPartition,
        evaluator: E,
        comm: C,
    ) -> Result<Self, SolverError> {
        partition.debug_assert_invariants();
        let n_comp = evaluator.n_components();
        let n_flux = evaluator.flux_coeffs().len();

        let mut bcs = Vec::with_capacity(partition.boundaries().len());
        for patch in partition.boundaries() {
            let bc = params
                .boundary_condition(patch.name())
                .ok_or_else(|| SolverError::MissingBoundaryCondition(patch.name().to_string()))?;
            bc.check_model(n_comp, n_flux)?;
            bcs.push(bc);
        }
        for name in params.boundary_conditions().keys() {
            if partition.boundary(name).is_none() {
                log::debug!("rank {}: boundary `{name}` has no slots here", partition.rank());
            }
        }

        let exchanger = Exchanger::new(partition, n_comp, ExchangeTags::default());
        if let Err(e) = exchanger.verify_links(partition, &comm) {
            comm.abort();
            return Err(e);
        }

        let tableau = params.time_scheme().tableau();
        let names = (0..n_comp).map(|c| format!("u{c}"));
        let stage_field = Field::for_partition(names, partition);
        let rates = (0..tableau.stages())
            .map(|_| FieldRate::zeros(n_comp, partition.n_owned()))
            .collect();

        Ok(TimeIntegrator {
            params,
            partition,
            evaluator,
            comm,
            tableau,
            bcs,
            exchanger,
            stage_field,
            rates,
            bc_scratch: vec![0.0; n_comp],
        })
    }

    pub fn params(&self) -> &SolverParams {
        self.params
    }

    pub fn partition(&self) -> &DomainPartition {
        self.partition
    }

    pub fn tableau(&self) -> &'static ButcherTableau {
        self.tableau
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn into_evaluator(self) -> E {
        self.evaluator
    }

    /// One step of the configured size; returns `t + time_step`.
    pub fn advance_one_step(&mut self, t: f64, field: &mut Field) -> Result<f64, SolverError> {
        let dt = self.params.time_step();
        self.advance(t, dt, field)?;
        Ok(t + dt)
    }

    /// One step of size `dt` from `t`, in place.
    ///
    /// `field` must be shaped for the partition and the evaluator. Only its
    /// owned DOFs are read; on return they hold `u(t + dt)`. On any error the
    /// communicator world is aborted so that no other rank waits forever on
    /// this one.
    pub fn advance(&mut self, t: f64, dt: f64, field: &mut Field) -> Result<(), SolverError> {
        self.step_stages(t, dt, field).map_err(|e| self.fail(e))
    }

    fn step_stages(&mut self, t: f64, dt: f64, field: &mut Field) -> Result<(), SolverError> {
        field.check_partition(self.partition)?;
        if field.n_components() != self.evaluator.n_components() {
            return Err(SolverError::FieldShape {
                expected: format!("{} component(s)", self.evaluator.n_components()),
                got: format!("{} component(s)", field.n_components()),
            });
        }

        field.debug_assert_invariants();

        let rank = self.partition.rank();
        let tableau = self.tableau;
        for s in 0..tableau.stages() {
            let ts = t + tableau.c[s] * dt;

            // (a) stage field from u_n and the previous slopes
            self.stage_field.copy_from(field)?;
            if s > 0 {
                let weights = tableau.a[s];
                let rates = &self.rates[..s];
                let stage = self.stage_field.values_mut_raw();
                for (c, dst) in stage.iter_mut().enumerate() {
                    combine(&mut dst[..field.n_owned()], field.owned(c), dt, weights, rates, c);
                }
            }

            // (b) ghost exchange, (c) boundary values
            self.exchanger
                .synchronize(self.partition, &self.comm, &mut self.stage_field)?;
            for bc in &self.bcs {
                apply_to_field(
                    &mut self.stage_field,
                    self.partition,
                    bc,
                    ts,
                    self.evaluator.flux_coeffs(),
                    &mut self.bc_scratch,
                );
            }

            // (d) slope
            let ctx = ResidualContext {
                t: ts,
                stage: s,
                formulation: self.params.formulation(),
                params: self.params,
                partition: self.partition,
                rank,
            };
            self.evaluator
                .evaluate(&ctx, &self.stage_field, &mut self.rates[s])?;
            log::trace!("rank {rank}: stage {s} evaluated at t = {ts}");
        }

        for c in 0..field.n_components() {
            combine_in_place(field.owned_mut(c), dt, tableau.b, &self.rates, c);
        }
        Ok(())
    }

    /// Advance from `t0` until `sim_time` has elapsed.
    ///
    /// Takes `floor(sim_time / dt)` full steps, then one shortened step if the
    /// remainder is more than rounding noise. Step `k` starts at exactly
    /// `t0 + k dt`. Errors abort the world as in [`TimeIntegrator::advance`].
    pub fn run(&mut self, t0: f64, field: &mut Field) -> Result<RunSummary, SolverError> {
        let dt = self.params.time_step();
        let total = self.params.sim_time();
        let rank = self.partition.rank();

        let n_full = (total / dt + REMAINDER_TOL).floor() as u64;
        let remainder = total - n_full as f64 * dt;
        let shortened = remainder > REMAINDER_TOL * dt;

        log::info!(
            "rank {rank}: {} over [{t0}, {}] with dt = {dt} ({n_full} full step(s){})",
            self.tableau.name,
            t0 + total,
            if shortened { " + 1 shortened" } else { "" }
        );

        for k in 0..n_full {
            let t = t0 + k as f64 * dt;
            self.advance(t, dt, field)?;
            log::debug!("rank {rank}: step {} done, t = {}", k + 1, t + dt);
        }

        let mut steps = n_full;
        if shortened {
            let t = t0 + n_full as f64 * dt;
            log::warn!(
                "rank {rank}: sim time {total} is not a multiple of dt = {dt}; last step shortened to {remainder}"
            );
            self.advance(t, remainder, field)?;
            steps += 1;
        }

        let final_time = t0 + total;
        log::info!("rank {rank}: finished {steps} step(s) at t = {final_time}");
        Ok(RunSummary {
            steps,
            final_time,
            shortened_last_step: shortened,
        })
    }

    fn fail(&self, e: SolverError) -> SolverError {
        log::warn!("rank {}: aborting run: {e}", self.partition.rank());
        self.comm.abort();
        e
    }
}

impl<E: std::fmt::Debug, C: Communicator + std::fmt::Debug> std::fmt::Debug for TimeIntegrator<'_, E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeIntegrator")
            .field("scheme", &self.tableau.name)
            .field("rank", &self.partition.rank())
            .field("evaluator", &self.evaluator)
            .field("comm", &self.comm)
            .finish_non_exhaustive()
    }
}

/// `sum_j w[j] * rates[j][c][i]`, in stage order, zero weights skipped.
#[inline]
fn weighted_slope(weights: &[f64], rates: &[FieldRate], c: usize, i: usize) -> f64 {
    let mut acc = 0.0;
    for (w, k) in weights.iter().zip(rates) {
        if *w != 0.0 {
            acc += w * k.component(c)[i];
        }
    }
    acc
}

/// `dst[i] = base[i] + dt * weighted_slope(i)`.
fn combine(dst: &mut [f64], base: &[f64], dt: f64, weights: &[f64], rates: &[FieldRate], c: usize) {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        dst.par_iter_mut()
            .zip(base.par_iter())
            .enumerate()
            .for_each(|(i, (d, &u))| *d = u + dt * weighted_slope(weights, rates, c, i));
    }
    #[cfg(not(feature = "rayon"))]
    for (i, (d, &u)) in izip!(dst.iter_mut(), base).enumerate() {
        *d = u + dt * weighted_slope(weights, rates, c, i);
    }
}

/// [`combine`] with `base == dst`.
fn combine_in_place(dst: &mut [f64], dt: f64, weights: &[f64], rates: &[FieldRate], c: usize) {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        dst.par_iter_mut()
            .enumerate()
            .for_each(|(i, d)| *d += dt * weighted_slope(weights, rates, c, i));
    }
    #[cfg(not(feature = "rayon"))]
    for (i, d) in dst.iter_mut().enumerate() {
        *d += dt * weighted_slope(weights, rates, c, i);
    }
}
