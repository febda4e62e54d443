use delsweep::config::{SimulationConfig, TrajectorySpec};
use delsweep::driver::TickStatus;
use delsweep::path::CenterPath;
use delsweep::{run_batch, IncrementalRunner, Point2, SweepPair};

fn config() -> SimulationConfig {
    let mut cfg = SimulationConfig::default();
    cfg.simulation.t_final = 1.0;
    cfg.simulation.h = 0.02;
    cfg.simulation.kernel_decay = 3.0;
    cfg.trajectory = TrajectorySpec::Curve(CenterPath::circle(1.5, 2.0));
    cfg
}

#[test]
fn batch_runs_are_deterministic() {
    let cfg = config();
    let a = run_batch(&cfg).unwrap();
    let b = run_batch(&cfg).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 51);
}

#[test]
fn paused_incremental_run_matches_batch() {
    let cfg = config();
    let batch = run_batch(&cfg).unwrap();

    let mut runner = IncrementalRunner::new(SweepPair::from_config(&cfg).unwrap());
    runner.set_steps_per_tick(7);
    runner.start();

    let mut delayed: Vec<Point2> = Vec::new();
    let mut classical: Vec<Point2> = Vec::new();
    let mut ticks = 0;
    loop {
        let status = runner.tick(|(d, c)| {
            delayed.push(d.position);
            classical.push(c.position);
        });
        ticks += 1;
        if ticks == 3 {
            runner.pause();
            assert_eq!(runner.tick(|_| {}), TickStatus::Idle);
            assert_eq!(runner.current_step(), 21);
            runner.start();
        }
        if status == TickStatus::Complete {
            break;
        }
        assert!(ticks < 100, "runner never completed");
    }

    assert_eq!(delayed, batch.delayed.trajectory);
    assert_eq!(classical, batch.classical.trajectory);
    assert_eq!(runner.progress(), 1.0);
}

#[test]
fn infinite_mode_runs_past_the_horizon() {
    let mut cfg = config();
    cfg.simulation.t_final = 0.1;
    let mut runner = IncrementalRunner::new(SweepPair::from_config(&cfg).unwrap());
    runner.set_infinite_mode(true);
    runner.set_steps_per_tick(10);
    runner.start();
    for _ in 0..5 {
        assert_eq!(runner.tick(|_| {}), TickStatus::Running);
    }
    let pair = runner.sweep();
    assert_eq!(pair.delayed.len(), 50);
    assert_eq!(pair.classical.len(), 50);
    // Later steps still follow the moving center.
    let last = *pair.delayed.trajectory().last().unwrap();
    let center = *pair.delayed.centers().last().unwrap();
    assert!(last.distance(center) <= 0.8 + 1e-6);
}

#[test]
fn restart_reproduces_the_first_run() {
    let cfg = config();
    let mut runner = IncrementalRunner::new(SweepPair::from_config(&cfg).unwrap());
    runner.set_steps_per_tick(100);
    runner.start();
    assert_eq!(runner.tick(|_| {}), TickStatus::Complete);
    let first = runner.sweep().delayed.trajectory().to_vec();

    runner.restart();
    assert_eq!(runner.current_step(), 0);
    assert_eq!(runner.tick(|_| {}), TickStatus::Idle, "restart pauses");
    runner.start();
    assert_eq!(runner.tick(|_| {}), TickStatus::Complete);
    assert_eq!(runner.sweep().delayed.trajectory(), first.as_slice());
}
