//! Key-event detection core for swoop landing trajectories.
//!
//! Signals come from a column-oriented [`Trajectory`]; thresholds come from a
//! validated [`ThresholdConfig`]. Nothing here performs I/O.

mod error;

pub mod axis;
pub mod config;
pub mod derivative;
pub mod events;
pub mod normalize;
pub mod threshold;
pub mod threshold_config;
pub mod trajectory;

pub use axis::{AxisSetting, AxisSettings, AxisSettingsBuilder, DistanceUnit, SpeedKind, SpeedUnit};
pub use config::{FlightConfig, PatternElevations, RawFlightConfig};
pub use derivative::derivatives;
pub use error::{ErrorKind, SwoopError};
pub use events::{EventKey, EventMarker, EventView, KeyEvents, KeyEventsBuilder};
pub use normalize::{angle_consistency, rotate_landing_path, set_start_point, shift_column};
pub use threshold::{find_peaks, Extrema, Threshold};
pub use threshold_config::{ThresholdConfig, ThresholdEntry, REQUIRED_THRESHOLDS};
pub use trajectory::{DerivativeKey, Trajectory};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which threshold to apply to which series.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectParams {
    pub category: String,
    pub key: String,
    pub sub: Option<String>,
    /// Y-axis metric name, or the column to differentiate when
    /// `derivative_order > 0`.
    pub metric: String,
    pub derivative_order: usize,
    pub require_peaks: bool,
    pub require_lows: bool,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            category: "landing".into(),
            key: "init_turn".into(),
            sub: None,
            metric: "Elevation".into(),
            derivative_order: 0,
            require_peaks: false,
            require_lows: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Detection {
    pub metric: String,
    pub threshold: Threshold,
    #[serde(flatten)]
    pub extrema: Extrema,
}

/// Resolve the threshold and series named by `params` and run detection.
pub fn detect_extrema(
    trajectory: &Trajectory,
    thresholds: &ThresholdConfig,
    axes: &AxisSettingsBuilder,
    params: &DetectParams,
) -> Result<Detection, SwoopError> {
    let threshold = *match &params.sub {
        Some(sub) => thresholds.sub_threshold(&params.category, &params.key, sub)?,
        None => thresholds.threshold(&params.category, &params.key)?,
    };

    let (source, metric) = if params.derivative_order > 0 {
        let with = trajectory.with_derivatives(&params.metric, params.derivative_order)?;
        let name = DerivativeKey::new(params.metric.as_str(), params.derivative_order).series_name();
        (with, name)
    } else {
        (trajectory.clone(), params.metric.clone())
    };

    let series = axes.y_axis_param(&source, &metric)?;
    let extrema = threshold.detect_and_validate(
        &series.data,
        Some(metric.as_str()),
        params.require_peaks,
        params.require_lows,
    )?;
    debug!(
        metric = %metric,
        peaks = extrema.peaks.len(),
        lows = extrema.lows.len(),
        "detection finished"
    );
    Ok(Detection {
        metric,
        threshold,
        extrema,
    })
}
