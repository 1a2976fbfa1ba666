mod util;
use util::*;

use dg_stepper::prelude::*;
use proptest::prelude::*;

fn open_params(scheme: TimeScheme, formulation: Formulation) -> SolverParams {
    SolverParams::new(scheme, formulation, 1.0, 0.02)
        .unwrap()
        .with_boundary_condition(BoundaryCondition::new("left", "sinus", &[0.5, 2.0, 0.0]).unwrap())
        .unwrap()
        .with_boundary_condition(BoundaryCondition::new("right", "freeTransport", &[]).unwrap())
        .unwrap()
}

#[test]
fn periodic_strip_is_partition_invariant() {
    for scheme in [TimeScheme::Rk1, TimeScheme::Rk2, TimeScheme::Rk3, TimeScheme::Rk4] {
        let params = SolverParams::new(scheme, Formulation::Strong, 1.0, 0.02).unwrap();
        let serial = run_strip(24, 1, true, &params, 1.0, &bump);
        for n_ranks in [2, 3, 4] {
            let split = run_strip(24, n_ranks, true, &params, 1.0, &bump);
            assert_close(&split, &serial, 1e-13);
        }
    }
}

#[test]
fn open_strip_with_boundary_conditions_is_partition_invariant() {
    for formulation in [Formulation::Strong, Formulation::Weak] {
        let params = open_params(TimeScheme::Rk3, formulation);
        let serial = run_strip(30, 1, false, &params, 1.0, &bump);
        // inflow has reached the interior
        assert!(serial[0] != bump(1.0 / 60.0));
        for n_ranks in [3, 4] {
            let split = run_strip(30, n_ranks, false, &params, 1.0, &bump);
            assert_close(&split, &serial, 1e-13);
        }
    }
}

#[test]
fn negative_velocity_reads_the_right_boundary() {
    let params = SolverParams::new(TimeScheme::Rk4, Formulation::Weak, 1.0, 0.02)
        .unwrap()
        .with_boundary_condition(BoundaryCondition::new("left", "constantNeumann", &[]).unwrap())
        .unwrap()
        .with_boundary_condition(BoundaryCondition::new("right", "constant", &[2.0]).unwrap())
        .unwrap();
    let serial = run_strip(20, 1, false, &params, -1.0, &|_| 0.0);
    let split = run_strip(20, 4, false, &params, -1.0, &|_| 0.0);
    assert_close(&split, &serial, 1e-13);
    // after one crossing time the inflow value fills the strip
    assert!((serial[19] - 2.0).abs() < 1e-6);
}

#[test]
fn full_period_returns_close_to_start() {
    let params = SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 1.0, 0.0125).unwrap();
    let n = 40;
    let got = run_strip(n, 2, true, &params, 1.0, &|x| (2.0 * std::f64::consts::PI * x).sin());
    let want: Vec<f64> = (0..n)
        .map(|i| (2.0 * std::f64::consts::PI * (i as f64 + 0.5) / n as f64).sin())
        .collect();
    // first-order upwind damps the wave; the phase barely moves
    let peak = got.iter().fold(0.0f64, |m, g| m.max(g.abs()));
    assert!(peak < 1.0 && peak > 0.4, "peak {peak}");
    let dot: f64 = got.iter().zip(&want).map(|(g, w)| g * w).sum();
    let norm: f64 = want.iter().map(|w| w * w).sum();
    assert!(dot > 0.5 * norm);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn random_data_any_rank_count(
        init in proptest::collection::vec(-1.0f64..1.0, 12),
        n_ranks in 2usize..=4,
        periodic in any::<bool>(),
    ) {
        let params = open_params(TimeScheme::Rk2, Formulation::Strong);
        let data = init.clone();
        let lookup = move |x: f64| data[((x * 12.0) as usize).min(11)];
        let serial = run_strip(12, 1, periodic, &params, 0.75, &lookup);
        let split = run_strip(12, n_ranks, periodic, &params, 0.75, &lookup);
        for (s, p) in serial.iter().zip(&split) {
            prop_assert!((s - p).abs() <= 1e-13);
        }
    }
}
