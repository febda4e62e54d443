//! Drag a point with a moving disk and compare short and long memories.
//!
//! The disk circles the origin. The classical process hugs the disk
//! boundary; the delayed process lags behind, pulled back toward where it
//! has been. Larger decay rates shorten the memory and close the gap.
//!
//! Run: cargo run --example disk_memory_sweep

use delsweep::config::SimulationParams;
use delsweep::constraint::Projector;
use delsweep::path::CenterPath;
use delsweep::{ClassicalSweeping, DelayedSweeping, Point2};

fn disk(radius: f64) -> Projector {
    Projector::new(move |x: f64, y: f64| radius - (x * x + y * y).sqrt())
}

fn main() {
    let path = CenterPath::circle(2.0, 1.0);
    let past = |t: f64| Point2::new(2.0 * t.cos(), 2.0 * t.sin());

    println!("=== Delayed vs classical sweeping, disk R=0.8 on a circle of radius 2 ===\n");

    let base = SimulationParams::new(6.0, 0.01, 1.0);
    let mut classical = ClassicalSweeping::new(base, path.clone(), past, disk(0.8)).unwrap();
    classical.simulate();
    let c_end = *classical.trajectory().last().unwrap();
    println!("classical: X(T) = ({:.4}, {:.4})\n", c_end.x, c_end.y);

    println!("{:>8} {:>8} {:>22} {:>12} {:>12}", "decay", "J_max", "X(T)", "|X-Xc|", "max projDist");
    for &decay in &[0.5, 2.0, 10.0, 50.0, 250.0] {
        let params = SimulationParams {
            kernel_decay: decay,
            ..base
        };
        let mut delayed = DelayedSweeping::new(params, path.clone(), past, disk(0.8)).unwrap();
        delayed.simulate();

        let end = *delayed.trajectory().last().unwrap();
        let max_dist = delayed
            .projection_distances()
            .iter()
            .copied()
            .fold(0.0, f64::max);
        println!(
            "{:>8.1} {:>8} {:>22} {:>12.4} {:>12.4}",
            decay,
            delayed.kernel().len(),
            format!("({:.4}, {:.4})", end.x, end.y),
            end.distance(c_end),
            max_dist,
        );
    }
}
