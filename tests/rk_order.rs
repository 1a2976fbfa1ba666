mod util;
use util::*;

use dg_stepper::prelude::*;
use dg_stepper::residual::FnResidual;

const SCHEMES: [TimeScheme; 4] = [TimeScheme::Rk1, TimeScheme::Rk2, TimeScheme::Rk3, TimeScheme::Rk4];

fn decay_error(scheme: TimeScheme, h: f64) -> f64 {
    let params = SolverParams::new(scheme, Formulation::Strong, 1.0, h).unwrap();
    let partition = DomainPartition::serial(1);
    let mut y = Field::for_partition(["y"], &partition);
    y.owned_mut(0)[0] = 1.0;
    let mut stepper = TimeIntegrator::new(&params, &partition, linear_decay(-1.0), NoComm).unwrap();
    let summary = stepper.run(0.0, &mut y).unwrap();
    assert!(!summary.shortened_last_step);
    (y.value(0, 0) - (-1.0f64).exp()).abs()
}

#[test]
fn stationary_residual_leaves_field_unchanged() {
    let partition = DomainPartition::serial(5);
    let initial = [1.0, -2.0, 3.5, 0.0, 1e-3];
    for scheme in SCHEMES {
        let params = SolverParams::new(scheme, Formulation::Weak, 3.0, 0.125).unwrap();
        let mut u = Field::for_partition(["u"], &partition);
        u.owned_mut(0).copy_from_slice(&initial);
        let zero = FnResidual::new(1, |_: &ResidualContext<'_>, _: &Field, r: &mut FieldRate| {
            r.fill(0.0);
            Ok(())
        });
        let mut stepper = TimeIntegrator::new(&params, &partition, zero, NoComm).unwrap();
        let summary = stepper.run(0.0, &mut u).unwrap();
        assert_eq!(summary.steps, 24);
        assert_eq!(u.owned(0), &initial, "{scheme}");
        assert_eq!(u.consistency(), Consistency::LocalOnly);
    }
}

#[test]
fn rk4_matches_exponential_decay() {
    let err = decay_error(TimeScheme::Rk4, 0.1);
    assert!(err < 1e-6, "RK4 error {err}");
}

#[test]
fn observed_orders() {
    for scheme in SCHEMES {
        let coarse = decay_error(scheme, 0.1);
        let fine = decay_error(scheme, 0.05);
        let observed = (coarse / fine).log2();
        assert!(
            (observed - scheme.order() as f64).abs() < 0.2,
            "{scheme}: observed order {observed}"
        );
    }
}

#[test]
fn single_step_returns_next_time() {
    let params = SolverParams::new(TimeScheme::Rk2, Formulation::Strong, 1.0, 0.25).unwrap();
    let partition = DomainPartition::serial(1);
    let mut y = Field::for_partition(["y"], &partition);
    y.owned_mut(0)[0] = 2.0;
    let mut stepper = TimeIntegrator::new(&params, &partition, linear_decay(-1.0), NoComm).unwrap();
    let t = stepper.advance_one_step(0.5, &mut y).unwrap();
    assert_eq!(t, 0.75);
    // Heun: y (1 - h + h^2/2)
    assert!((y.value(0, 0) - 2.0 * (1.0 - 0.25 + 0.03125)).abs() < 1e-15);
}

#[test]
fn stage_times_follow_the_tableau() {
    let params = SolverParams::new(TimeScheme::Rk4, Formulation::Strong, 1.0, 0.5).unwrap();
    let partition = DomainPartition::serial(1);
    let mut seen = Vec::new();
    let probe = FnResidual::new(1, |ctx: &ResidualContext<'_>, f: &Field, r: &mut FieldRate| {
        assert!(f.is_synchronized());
        seen.push((ctx.stage, ctx.t));
        r.fill(1.0);
        Ok(())
    });
    let mut y = Field::for_partition(["y"], &partition);
    let mut stepper = TimeIntegrator::new(&params, &partition, probe, NoComm).unwrap();
    stepper.advance(2.0, 0.5, &mut y).unwrap();
    drop(stepper);
    assert_eq!(seen, vec![(0, 2.0), (1, 2.25), (2, 2.25), (3, 2.5)]);
    assert!((y.value(0, 0) - 0.5).abs() < 1e-15);
}
