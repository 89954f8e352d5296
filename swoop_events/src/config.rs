//! Validated flight configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::axis::{DistanceUnit, SpeedUnit};
use crate::SwoopError;

pub const DEFAULT_DOWNWIND: f64 = 1500.0;
pub const DEFAULT_POINT_AFTER_INITIATION: i64 = 3;

/// Pattern leg elevations in feet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternElevations {
    pub downwind: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
}

impl Default for PatternElevations {
    fn default() -> Self {
        Self {
            downwind: Some(DEFAULT_DOWNWIND),
            base: None,
        }
    }
}

impl PatternElevations {
    fn validate(&self) -> Result<(), SwoopError> {
        let downwind = match self.downwind {
            Some(d) if d != 0.0 && !d.is_nan() => d,
            _ => {
                return Err(SwoopError::InvalidPatternElevations(
                    "downwind elevation cannot be empty".into(),
                ))
            }
        };
        if let Some(base) = self.base {
            if downwind <= base {
                return Err(SwoopError::InvalidPatternElevations(format!(
                    "downwind elevation ({downwind}) must be greater than base elevation ({base})"
                )));
            }
        }
        Ok(())
    }
}

/// Unchecked form, as read from JSON.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFlightConfig {
    #[serde(default)]
    pub pattern_elevations: PatternElevations,
    #[serde(default = "enabled")]
    pub toggle_search: bool,
    #[serde(default = "enabled")]
    pub front_riser: bool,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    #[serde(default)]
    pub speed_unit: SpeedUnit,
    #[serde(default = "default_point_after_initiation")]
    pub point_after_initiation: Option<i64>,
}

fn enabled() -> bool {
    true
}

fn default_point_after_initiation() -> Option<i64> {
    Some(DEFAULT_POINT_AFTER_INITIATION)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFlightConfig")]
pub struct FlightConfig {
    pattern_elevations: PatternElevations,
    toggle_search: bool,
    front_riser: bool,
    distance_unit: DistanceUnit,
    speed_unit: SpeedUnit,
    point_after_initiation: Option<i64>,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            pattern_elevations: PatternElevations::default(),
            toggle_search: true,
            front_riser: true,
            distance_unit: DistanceUnit::M,
            speed_unit: SpeedUnit::KmPerHour,
            point_after_initiation: Some(DEFAULT_POINT_AFTER_INITIATION),
        }
    }
}

impl FlightConfig {
    pub fn new(
        pattern_elevations: PatternElevations,
        toggle_search: bool,
        front_riser: bool,
        distance_unit: DistanceUnit,
        speed_unit: SpeedUnit,
        point_after_initiation: Option<i64>,
    ) -> Result<Self, SwoopError> {
        pattern_elevations.validate()?;
        if let Some(p) = point_after_initiation.filter(|p| *p < 0) {
            return Err(SwoopError::NegativePointAfterInitiation(p));
        }
        debug!(
            downwind = ?pattern_elevations.downwind,
            base = ?pattern_elevations.base,
            %distance_unit,
            %speed_unit,
            "flight config validated"
        );
        Ok(Self {
            pattern_elevations,
            toggle_search,
            front_riser,
            distance_unit,
            speed_unit,
            point_after_initiation,
        })
    }

    pub fn pattern_elevations(&self) -> PatternElevations {
        self.pattern_elevations
    }

    pub fn toggle_search(&self) -> bool {
        self.toggle_search
    }

    pub fn front_riser(&self) -> bool {
        self.front_riser
    }

    pub fn distance_unit(&self) -> DistanceUnit {
        self.distance_unit
    }

    pub fn speed_unit(&self) -> SpeedUnit {
        self.speed_unit
    }

    pub fn point_after_initiation(&self) -> Option<i64> {
        self.point_after_initiation
    }
}

impl TryFrom<RawFlightConfig> for FlightConfig {
    type Error = SwoopError;

    fn try_from(raw: RawFlightConfig) -> Result<Self, Self::Error> {
        FlightConfig::new(
            raw.pattern_elevations,
            raw.toggle_search,
            raw.front_riser,
            raw.distance_unit,
            raw.speed_unit,
            raw.point_after_initiation,
        )
    }
}
