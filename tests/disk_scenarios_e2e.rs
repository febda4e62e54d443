use delsweep::config::SimulationParams;
use delsweep::constraint::Projector;
use delsweep::path::CenterPath;
use delsweep::{ClassicalSweeping, DelayedSweeping, Point2};

fn disk(radius: f64) -> Projector {
    Projector::new(move |x: f64, y: f64| radius - (x * x + y * y).sqrt())
}

#[test]
fn history_inside_the_disk_is_never_projected() {
    let params = SimulationParams::new(1.0, 0.01, 2.0);
    let mut sweep = DelayedSweeping::new(
        params,
        CenterPath::fixed(Point2::ZERO),
        |_t: f64| Point2::new(0.5, 0.0),
        disk(1.0),
    )
    .unwrap();
    sweep.simulate();

    assert_eq!(sweep.len(), 101);
    for (n, &d) in sweep.projection_distances().iter().enumerate() {
        assert_eq!(d, 0.0, "projected at step {n}");
    }
    for p in sweep.trajectory() {
        assert!((p.x - 0.5).abs() < 1e-9 && p.y.abs() < 1e-12, "drifted to {p:?}");
    }
}

#[test]
fn history_outside_the_disk_lands_on_the_boundary() {
    let params = SimulationParams::new(1.0, 0.01, 2.0);
    let mut sweep = DelayedSweeping::new(
        params,
        CenterPath::fixed(Point2::ZERO),
        |_t: f64| Point2::new(2.0, 0.0),
        disk(1.0),
    )
    .unwrap();
    let first = sweep.step(0);

    assert!((first.position.length() - 1.0).abs() < 1e-6, "{first:?}");
    assert!(first.position.y.abs() < 1e-9);
    assert!((first.pre_projection.x - 2.0).abs() < 1e-9);
    assert!((first.projection_distance - 1.0).abs() < 1e-6);

    sweep.simulate();
    for p in sweep.trajectory() {
        assert!(p.length() <= 1.0 + 1e-6);
    }
}

fn classical_on_circle(omega: f64) -> ClassicalSweeping {
    let params = SimulationParams::new(2.0, 0.01, 1.0);
    let mut sweep = ClassicalSweeping::new(
        params,
        CenterPath::circle(2.0, omega),
        |_t: f64| Point2::ZERO,
        disk(0.8),
    )
    .unwrap();
    sweep.simulate();
    sweep
}

#[test]
fn classical_violation_is_bounded_by_center_motion() {
    let omega = 1.0;
    let h = 0.01;
    let sweep = classical_on_circle(omega);

    // Step 0 pulls the origin onto a disk centered at (2, 0).
    assert!((sweep.projection_distances()[0] - 1.2).abs() < 1e-12);
    for (n, &d) in sweep.projection_distances().iter().enumerate().skip(1) {
        // Chord of the center path over one step, plus projection slack.
        assert!(d <= 2.0 * omega * h + 1e-6, "step {n}: violation {d}");
    }
}

#[test]
fn classical_on_a_resting_disk_stays_feasible() {
    let sweep = classical_on_circle(0.0);
    for &d in &sweep.projection_distances()[1..] {
        assert!(d <= 1e-6);
    }
}

#[test]
fn delayed_point_stays_in_the_moving_disk() {
    let params = SimulationParams::new(3.0, 0.02, 3.0);
    let mut sweep = DelayedSweeping::new(
        params,
        CenterPath::circle(2.0, 1.0),
        |t: f64| Point2::new(2.0 * t.cos(), 2.0 * t.sin()),
        disk(0.8),
    )
    .unwrap();
    sweep.simulate();

    for (p, c) in sweep.trajectory().iter().zip(sweep.centers()) {
        assert!(p.distance(*c) <= 0.8 + 1e-6, "p={p:?} c={c:?}");
    }
}
