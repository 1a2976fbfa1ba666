#![allow(dead_code)]
use dg_stepper::prelude::*;

/// Advance a strip of `n_cells` cells split over `n_ranks` thread-ranks and
/// return the owned values in global cell order.
pub fn run_strip(
    n_cells: usize,
    n_ranks: usize,
    periodic: bool,
    params: &SolverParams,
    velocity: f64,
    init: &(dyn Fn(f64) -> f64 + Sync),
) -> Vec<f64> {
    let blocks = decompose_strip(n_cells, n_ranks, 1.0 / n_cells as f64, periodic).unwrap();
    let world = LocalComm::world(n_ranks);

    let pieces: Vec<(usize, Vec<f64>)> = std::thread::scope(|s| {
        let handles: Vec<_> = blocks
            .iter()
            .zip(&world)
            .map(|(block, comm)| {
                s.spawn(move || {
                    let mut field = Field::for_partition(["c"], &block.partition);
                    for (i, v) in field.owned_mut(0).iter_mut().enumerate() {
                        *v = init(block.cell_center(i));
                    }
                    let upwind = UpwindTransport1d::new(velocity, block);
                    let mut stepper =
                        TimeIntegrator::new(params, &block.partition, upwind, comm.clone()).unwrap();
                    stepper.run(0.0, &mut field).unwrap();
                    (block.first_cell, field.owned(0).to_vec())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut global = vec![f64::NAN; n_cells];
    for (first, values) in pieces {
        global[first..first + values.len()].copy_from_slice(&values);
    }
    global
}

/// Smooth periodic bump on `[0, 1]`.
pub fn bump(x: f64) -> f64 {
    (2.0 * std::f64::consts::PI * x).sin() + 0.5 * (-(x - 0.3) * (x - 0.3) / 0.01).exp()
}

pub fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() <= tol, "dof {i}: got {g}, want {w}");
    }
}

/// Scalar ODE `dy/dt = lambda * y` on one DOF.
pub fn linear_decay(lambda: f64) -> impl ResidualEvaluator {
    dg_stepper::residual::FnResidual::new(1, move |_ctx: &ResidualContext<'_>, f: &Field, r: &mut FieldRate| {
        r.component_mut(0)[0] = lambda * f.value(0, 0);
        Ok(())
    })
}
