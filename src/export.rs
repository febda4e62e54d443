//! Tabular and JSON export of batch results.

use std::fmt::Write as _;

use crate::driver::BatchResult;
use crate::Result;

/// Column names of [`to_tsv`], in order.
pub const TSV_COLUMNS: [&str; 10] = [
    "time",
    "delayed_x",
    "delayed_y",
    "delayed_xBar",
    "delayed_yBar",
    "delayed_projDist",
    "delayed_gradNorm",
    "classical_x",
    "classical_y",
    "classical_gradNorm",
];

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Tab-separated table, one row per delayed step.
///
/// Floats carry six decimals; classical values missing for a row are empty
/// cells. Rows are joined with `\n`, without a trailing newline.
pub fn to_tsv(result: &BatchResult) -> String {
    let mut out = TSV_COLUMNS.join("\t");
    let d = &result.delayed;
    let c = &result.classical;

    for n in 0..result.len() {
        let classical = c.trajectory.get(n);
        let cells = [
            cell(Some(result.time(n))),
            cell(Some(d.trajectory[n].x)),
            cell(Some(d.trajectory[n].y)),
            cell(d.pre_projection.get(n).map(|p| p.x)),
            cell(d.pre_projection.get(n).map(|p| p.y)),
            cell(d.projection_distances.get(n).copied()),
            cell(d.gradient_norms.get(n).copied()),
            cell(classical.map(|p| p.x)),
            cell(classical.map(|p| p.y)),
            cell(c.gradient_norms.get(n).copied()),
        ];
        // Writing to a String cannot fail.
        let _ = write!(out, "\n{}", cells.join("\t"));
    }
    out
}

/// Pretty-printed JSON of the whole result.
pub fn to_json(result: &BatchResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
