//! Step-size refinement on a TOML-described run.
//!
//! Runs the default configuration at five step sizes between 2^-8 and 2^-4
//! and prints terminal errors against the finest run.
//!
//! Run: cargo run --example step_refinement

use delsweep::config::SimulationConfig;
use delsweep::convergence::convergence_study;

const CONFIG: &str = r#"
[simulation]
T = 3.0
h = 0.01
kernelDecay = 4.0
pastX = "2*cos(t)"
pastY = "2*sin(t)"

[constraint]
expression = "R - sqrt(x^2 + y^2)"
R = 0.8

[trajectory]
type = "parametric"
xExpression = "2*cos(t)"
yExpression = "2*sin(t)"
"#;

fn main() {
    let config = SimulationConfig::from_toml_str(CONFIG).unwrap();
    let study = convergence_study(&config, -8.0, -4.0, 5).unwrap();

    println!("=== Step refinement (reference h = {:.5}) ===\n", study.samples[0].h);
    println!("{:>8} {:>10} {:>14} {:>14}", "log2 h", "h", "log2 err (D)", "log2 err (C)");
    for s in &study.samples {
        let fmt = |e: Option<f64>| e.map_or("-".to_string(), |v| format!("{v:.3}"));
        println!(
            "{:>8.2} {:>10.5} {:>14} {:>14}",
            s.log2_h,
            s.h,
            fmt(s.log2_position_error),
            fmt(s.classical_log2_position_error),
        );
    }

    match (study.observed_order(), study.classical_observed_order()) {
        (Some(d), Some(c)) => println!("\nobserved order: delayed {d:.2}, classical {c:.2}"),
        _ => println!("\nnot enough distinct errors to fit an order"),
    }
}
