//! First-order upwind finite volumes for `du/dt + a du/dx = 0` on a strip.

use super::{ResidualContext, ResidualEvaluator};
use crate::config::Formulation;
use crate::data::field::{Field, FieldRate};
use crate::partition::StripBlock;
use crate::solver_error::SolverError;

/// Scalar transport at constant velocity over one [`StripBlock`].
///
/// Cell `i` reads its neighbours from the owned range or, at the block ends,
/// from the left/right ghost slots. The strong form evaluates
/// `-a (u_i - u_upwind) / dx`; the weak form evaluates the difference of the
/// upwind face fluxes `-(F_{i+1/2} - F_{i-1/2}) / dx`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpwindTransport1d {
    velocity: f64,
    dx: f64,
    n_cells: usize,
    left_ghost: usize,
    right_ghost: usize,
}

impl UpwindTransport1d {
    pub fn new(velocity: f64, block: &StripBlock) -> Self {
        UpwindTransport1d {
            velocity,
            dx: block.dx,
            n_cells: block.n_cells(),
            left_ghost: block.left_ghost(),
            right_ghost: block.right_ghost(),
        }
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Largest stable step for the explicit schemes (CFL 1).
    pub fn max_time_step(&self) -> f64 {
        self.dx / self.velocity.abs()
    }

    #[inline]
    fn neighbours(&self, u: &[f64], i: usize) -> (f64, f64) {
        let left = if i == 0 { u[self.left_ghost] } else { u[i - 1] };
        let right = if i + 1 == self.n_cells {
            u[self.right_ghost]
        } else {
            u[i + 1]
        };
        (left, right)
    }
}

impl ResidualEvaluator for UpwindTransport1d {
    fn n_components(&self) -> usize {
        1
    }

    fn evaluate(
        &mut self,
        ctx: &ResidualContext<'_>,
        field: &Field,
        rate: &mut FieldRate,
    ) -> Result<(), SolverError> {
        if !field.is_synchronized() {
            return Err(SolverError::Residual(format!(
                "rank {}: stage {} field has stale ghost values",
                ctx.rank, ctx.stage
            )));
        }
        let a = self.velocity;
        let u = field.component(0);
        let out = rate.component_mut(0);
        match ctx.formulation {
            Formulation::Strong => {
                for (i, r) in out.iter_mut().enumerate() {
                    let (l, rt) = self.neighbours(u, i);
                    *r = if a >= 0.0 {
                        -a * (u[i] - l) / self.dx
                    } else {
                        -a * (rt - u[i]) / self.dx
                    };
                }
            }
            Formulation::Weak => {
                for (i, r) in out.iter_mut().enumerate() {
                    let (l, rt) = self.neighbours(u, i);
                    let (f_in, f_out) = if a >= 0.0 {
                        (a * l, a * u[i])
                    } else {
                        (a * u[i], a * rt)
                    };
                    *r = -(f_out - f_in) / self.dx;
                }
            }
        }
        Ok(())
    }
}
