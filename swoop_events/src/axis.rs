//! Named, unit-aware series for plotting and detection.
//!
//! Which metrics appear depends only on which columns the trajectory carries;
//! the unit selection decides both the column read and the unit label.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::trajectory::{
    unit_column, DerivativeKey, Trajectory, DIVE_ANGLE, ELEVATION, GLIDE_RATIO, HORZ_DISTANCE,
    HORZ_SPEED, TIME_SEC, VERT_SPEED, X_AXIS_DISTANCE, Y_AXIS_DISTANCE,
};
use crate::SwoopError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "m")]
    M,
    #[serde(rename = "ft")]
    Ft,
}

impl DistanceUnit {
    pub const ALL: [DistanceUnit; 2] = [DistanceUnit::M, DistanceUnit::Ft];

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::M => "m",
            DistanceUnit::Ft => "ft",
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = SwoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "m" => Ok(DistanceUnit::M),
            "ft" => Ok(DistanceUnit::Ft),
            other => Err(SwoopError::InvalidUnit {
                kind: "distance",
                value: other.to_string(),
                expected: "m, ft",
            }),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    #[serde(rename = "km/u")]
    KmPerHour,
    #[serde(rename = "mph")]
    Mph,
}

impl SpeedUnit {
    pub const ALL: [SpeedUnit; 2] = [SpeedUnit::KmPerHour, SpeedUnit::Mph];

    pub fn as_str(self) -> &'static str {
        match self {
            SpeedUnit::KmPerHour => "km/u",
            SpeedUnit::Mph => "mph",
        }
    }
}

impl FromStr for SpeedUnit {
    type Err = SwoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "km/u" => Ok(SpeedUnit::KmPerHour),
            "mph" => Ok(SpeedUnit::Mph),
            other => Err(SwoopError::InvalidUnit {
                kind: "speed",
                value: other.to_string(),
                expected: "km/u, mph",
            }),
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speed component used to select speed thresholds and series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedKind {
    Vert,
    Horz,
}

impl SpeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeedKind::Vert => "vert",
            SpeedKind::Horz => "horz",
        }
    }

    pub fn axis_name(self) -> &'static str {
        match self {
            SpeedKind::Vert => "Vertical speed",
            SpeedKind::Horz => "Horizontal speed",
        }
    }

    pub fn column(self, unit: SpeedUnit) -> String {
        let prefix = match self {
            SpeedKind::Vert => VERT_SPEED,
            SpeedKind::Horz => HORZ_SPEED,
        };
        unit_column(prefix, unit.as_str())
    }
}

impl FromStr for SpeedKind {
    type Err = SwoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "vert" => Ok(SpeedKind::Vert),
            "horz" => Ok(SpeedKind::Horz),
            other => Err(SwoopError::InvalidParameter(format!(
                "invalid speed type '{other}', expected one of vert, horz"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisSetting {
    pub data: Vec<f64>,
    pub color: &'static str,
    pub metric: String,
    pub hovertemplate: String,
    pub title: String,
}

impl AxisSetting {
    fn new(
        data: Vec<f64>,
        color: &'static str,
        metric: &str,
        hovertemplate: String,
        title: String,
    ) -> Self {
        Self {
            data,
            color,
            metric: metric.to_string(),
            hovertemplate,
            title,
        }
    }
}

/// Axis settings keyed by display name, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisSettings {
    entries: Vec<(String, AxisSetting)>,
}

impl AxisSettings {
    fn push(&mut self, name: impl Into<String>, setting: AxisSetting) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = setting,
            None => self.entries.push((name, setting)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AxisSetting)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Result<&AxisSetting, SwoopError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .ok_or_else(|| SwoopError::InvalidParameter(name.to_string()))
    }

    /// Keep only `name`; fails when it was not produced.
    pub fn narrow(self, name: &str) -> Result<AxisSettings, SwoopError> {
        let entry = self
            .entries
            .into_iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| SwoopError::InvalidParameter(name.to_string()))?;
        Ok(AxisSettings {
            entries: vec![entry],
        })
    }
}

impl Serialize for AxisSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, setting) in &self.entries {
            map.serialize_entry(name, setting)?;
        }
        map.end()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxisSettingsBuilder {
    pub distance_unit: DistanceUnit,
    pub speed_unit: SpeedUnit,
}

impl AxisSettingsBuilder {
    pub fn new(distance_unit: DistanceUnit, speed_unit: SpeedUnit) -> Self {
        Self {
            distance_unit,
            speed_unit,
        }
    }

    /// X and y settings for `trajectory`, or for the samples in `range`, each
    /// optionally narrowed to one named metric.
    pub fn axis_settings(
        &self,
        trajectory: &Trajectory,
        x_param: Option<&str>,
        y_param: Option<&str>,
        range: Option<Range<usize>>,
    ) -> Result<(AxisSettings, AxisSettings), SwoopError> {
        let sliced;
        let source = match range {
            Some(range) => {
                sliced = trajectory.slice(range)?;
                &sliced
            }
            None => trajectory,
        };
        let mut x = self.x_axis(source);
        if let Some(name) = x_param {
            x = x.narrow(name)?;
        }
        let mut y = self.y_axis(source);
        if let Some(name) = y_param {
            y = y.narrow(name)?;
        }
        Ok((x, y))
    }

    pub fn x_axis(&self, trajectory: &Trajectory) -> AxisSettings {
        let d = self.distance_unit.as_str();
        let mut settings = AxisSettings::default();

        if let Some(col) = trajectory.try_column(TIME_SEC) {
            settings.push(
                "Time",
                AxisSetting::new(
                    col.to_vec(),
                    "#00CC96",
                    "s",
                    "Time: %{y:.2f} s <extra></extra>".into(),
                    "Time (s)".into(),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(&unit_column(HORZ_DISTANCE, d)) {
            settings.push(
                "Horizontal distance",
                AxisSetting::new(
                    col.to_vec(),
                    "#636EFA",
                    d,
                    format!("Horizontal Distance: %{{y:.2f}} {d}<extra></extra>"),
                    format!("Horizontal distance ({d})"),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(&unit_column(X_AXIS_DISTANCE, d)) {
            settings.push(
                "Distance",
                AxisSetting::new(
                    col.to_vec(),
                    "#AB63FA",
                    d,
                    format!("x-axis distance: %{{y:.2f}} {d}<extra></extra>"),
                    format!("X-axis distance ({d})"),
                ),
            );
        }
        settings
    }

    pub fn y_axis(&self, trajectory: &Trajectory) -> AxisSettings {
        let d = self.distance_unit.as_str();
        let s = self.speed_unit.as_str();
        let mut settings = AxisSettings::default();

        if let Some(col) = trajectory.try_column(ELEVATION) {
            settings.push(
                "Elevation",
                AxisSetting::new(
                    col.to_vec(),
                    "#636EFA",
                    "ft",
                    "Elevation: %{y:.2f} ft <extra></extra>".into(),
                    "Elevation (ft)".into(),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(&unit_column(HORZ_SPEED, s)) {
            settings.push(
                "Horizontal speed",
                AxisSetting::new(
                    col.to_vec(),
                    "#FF0B0B",
                    s,
                    format!("Horz speed: %{{y:.2f}} {s} <extra></extra>"),
                    format!("Horizontal speed ({s})"),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(&unit_column(Y_AXIS_DISTANCE, d)) {
            settings.push(
                "Distance",
                AxisSetting::new(
                    col.to_vec(),
                    "#636EFA",
                    d,
                    format!("Y-axis distance: %{{y:.2f}} {d} <extra></extra>"),
                    format!("Y-axis distance ({d})"),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(DIVE_ANGLE) {
            settings.push(
                "Dive angle",
                AxisSetting::new(
                    col.to_vec(),
                    "#AB63FA",
                    "deg",
                    "Dive angle: %{y:.2f}° <extra></extra>".into(),
                    "Dive angle (deg)".into(),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(&unit_column(VERT_SPEED, s)) {
            settings.push(
                "Vertical speed",
                AxisSetting::new(
                    col.to_vec(),
                    "#00CC96",
                    s,
                    format!("Vert speed: %{{y:.2f}} {s} <extra></extra>"),
                    format!("Vertical speed ({s})"),
                ),
            );
        }
        if let Some(col) = trajectory.try_column(GLIDE_RATIO) {
            settings.push(
                "Glide ratio",
                AxisSetting::new(
                    col.to_vec(),
                    "#FF9900",
                    "gr",
                    "Glide ratio: %{y:.2f} <extra></extra>".into(),
                    "Glide ratio (gr)".into(),
                ),
            );
        }
        for (key, values) in trajectory.derivative_series() {
            settings.push(key.series_name(), derivative_setting(key, values.to_vec()));
        }
        settings
    }

    pub fn x_axis_param(&self, trajectory: &Trajectory, name: &str) -> Result<AxisSetting, SwoopError> {
        self.x_axis(trajectory).get(name).cloned()
    }

    pub fn y_axis_param(&self, trajectory: &Trajectory, name: &str) -> Result<AxisSetting, SwoopError> {
        self.y_axis(trajectory).get(name).cloned()
    }
}

fn derivative_setting(key: &DerivativeKey, data: Vec<f64>) -> AxisSetting {
    let (color, label) = match key.order {
        1 => ("#9370DB", "First derivative".to_string()),
        2 => ("#FFD700", "Second derivative".to_string()),
        n => ("#19D3F3", format!("Derivative (order {n})")),
    };
    AxisSetting::new(
        data,
        color,
        "",
        format!("{label}: %{{y:.2f}} <extra></extra>"),
        label,
    )
}
