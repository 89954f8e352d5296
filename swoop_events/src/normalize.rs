//! Re-basing and rotation of a landing path around a chosen start sample.

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::axis::DistanceUnit;
use crate::trajectory::{unit_column, Trajectory, X_AXIS_DISTANCE, Y_AXIS_DISTANCE};
use crate::SwoopError;

/// Columns re-based by [`set_start_point`].
pub const SHIFTED_COLUMNS: [&str; 7] = [
    "time_sec",
    "horz_distance_m",
    "horz_distance_ft",
    "x_axis_distance_m",
    "x_axis_distance_ft",
    "y_axis_distance_m",
    "y_axis_distance_ft",
];

/// Re-express `values` relative to sample `key`.
///
/// Both halves are rebuilt as running sums of their consecutive differences,
/// rounded to 6 decimals at every step: the prefix outward from zero at `key`,
/// the suffix starting from the gap between `key` and `key + 1`. Sample deltas
/// are kept on both sides.
pub fn shift_column<'a>(
    values: impl Into<ArrayView1<'a, f64>>,
    key: usize,
) -> Result<Array1<f64>, SwoopError> {
    let values = values.into();
    let len = values.len();
    if key >= len {
        return Err(SwoopError::IndexOutOfBounds { index: key, len });
    }

    let prefix: Vec<f64> = values.iter().take(key + 1).rev().copied().collect();
    let mut out = accumulate(&prefix, 0.0);
    out.reverse();

    if key + 1 < len {
        let suffix: Vec<f64> = values.iter().skip(key + 1).copied().collect();
        let offset = suffix[0] - prefix[0];
        out.extend(accumulate(&suffix, offset));
    }
    Ok(Array1::from_vec(out))
}

fn accumulate(series: &[f64], start: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    let mut running = round6(start);
    out.push(running);
    for w in series.windows(2) {
        running += w[1] - w[0];
        out.push(round6(running));
    }
    out
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round_ties_even() / 1e6
}

/// Copy of `trajectory` with time and distance columns re-based on sample
/// `key`, optionally followed by [`rotate_landing_path`].
pub fn set_start_point(
    trajectory: &Trajectory,
    key: usize,
    rotate: bool,
) -> Result<Trajectory, SwoopError> {
    trajectory.check_index(key)?;
    let mut out = trajectory.clone();
    for name in SHIFTED_COLUMNS {
        let shifted = shift_column(trajectory.column(name)?, key)?;
        out.set_column(name, shifted)?;
    }
    debug!(key, rotate, "start point set");
    if rotate {
        out = rotate_landing_path(&out, key)?;
    }
    Ok(out)
}

/// Move sample `key` to the origin and turn the path so the final sample lies
/// on the positive x-axis. Each distance unit is rotated by its own angle.
pub fn rotate_landing_path(trajectory: &Trajectory, key: usize) -> Result<Trajectory, SwoopError> {
    trajectory.check_index(key)?;
    let mut out = trajectory.clone();
    for unit in DistanceUnit::ALL {
        let x_name = unit_column(X_AXIS_DISTANCE, unit.as_str());
        let y_name = unit_column(Y_AXIS_DISTANCE, unit.as_str());
        let x = trajectory.column(&x_name)?;
        let y = trajectory.column(&y_name)?;
        let angle = landing_angle(x, y, key);
        let (x_rot, y_rot) = rotate_about(x, y, key, -angle);
        debug!(unit = unit.as_str(), angle_rad = angle, "landing path rotated");
        out.set_column(&x_name, x_rot)?;
        out.set_column(&y_name, y_rot)?;
    }
    Ok(out)
}

/// Absolute difference, in radians, between the landing bearings computed from
/// the metre and the foot columns. Both describe one path, so this should be
/// close to zero.
pub fn angle_consistency(trajectory: &Trajectory, key: usize) -> Result<f64, SwoopError> {
    trajectory.check_index(key)?;
    let mut angles = [0.0; 2];
    for (slot, unit) in angles.iter_mut().zip(DistanceUnit::ALL) {
        let x = trajectory.column(&unit_column(X_AXIS_DISTANCE, unit.as_str()))?;
        let y = trajectory.column(&unit_column(Y_AXIS_DISTANCE, unit.as_str()))?;
        *slot = landing_angle(x, y, key);
    }
    let diff = (angles[0] - angles[1]).abs() % (2.0 * PI);
    Ok(diff.min(2.0 * PI - diff))
}

fn landing_angle(x: &Array1<f64>, y: &Array1<f64>, key: usize) -> f64 {
    let last = x.len() - 1;
    (y[last] - y[key]).atan2(x[last] - x[key])
}

fn rotate_about(
    x: &Array1<f64>,
    y: &Array1<f64>,
    key: usize,
    angle: f64,
) -> (Array1<f64>, Array1<f64>) {
    let (sin, cos) = angle.sin_cos();
    let (x0, y0) = (x[key], y[key]);
    let xs = x.mapv(|v| v - x0);
    let ys = y.mapv(|v| v - y0);
    let x_rot = &xs * cos - &ys * sin;
    let y_rot = &xs * sin + &ys * cos;
    (x_rot, y_rot)
}
