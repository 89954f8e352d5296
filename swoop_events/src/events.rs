//! Key events of a swoop landing and where each presentation view marks them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::axis::AxisSettings;
use crate::trajectory::Trajectory;
use crate::SwoopError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKey {
    ToggleSearch,
    InitTurn,
    StartRollout,
    StopRollout,
    MaxHorzSpeed,
    MaxVertSpeed,
    StopEstimate,
    BaseLeg,
    FrontRiser,
    AfterRiser,
    AfterTurn,
}

impl EventKey {
    pub const ALL: [EventKey; 11] = [
        EventKey::ToggleSearch,
        EventKey::InitTurn,
        EventKey::StartRollout,
        EventKey::StopRollout,
        EventKey::MaxHorzSpeed,
        EventKey::MaxVertSpeed,
        EventKey::StopEstimate,
        EventKey::BaseLeg,
        EventKey::FrontRiser,
        EventKey::AfterRiser,
        EventKey::AfterTurn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKey::ToggleSearch => "toggle_search",
            EventKey::InitTurn => "init_turn",
            EventKey::StartRollout => "start_rollout",
            EventKey::StopRollout => "stop_rollout",
            EventKey::MaxHorzSpeed => "max_horz_speed",
            EventKey::MaxVertSpeed => "max_vert_speed",
            EventKey::StopEstimate => "stop_estimate",
            EventKey::BaseLeg => "base_leg",
            EventKey::FrontRiser => "front_riser",
            EventKey::AfterRiser => "after_riser",
            EventKey::AfterTurn => "after_turn",
        }
    }
}

impl FromStr for EventKey {
    type Err = SwoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SwoopError::UnknownEvent(s.to_string()))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected key events, each mapped to a sample index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyEvents {
    events: BTreeMap<EventKey, usize>,
}

#[derive(Debug, Default)]
pub struct KeyEventsBuilder {
    events: BTreeMap<EventKey, usize>,
}

impl KeyEventsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` at `index`; a later insert for the same key wins.
    pub fn insert(mut self, key: EventKey, index: usize) -> Self {
        self.events.insert(key, index);
        self
    }

    pub fn build(self) -> KeyEvents {
        KeyEvents {
            events: self.events,
        }
    }
}

/// A marker placed on one axis metric at a key event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventMarker {
    pub event: EventKey,
    pub axis: &'static str,
    pub index: usize,
    pub value: f64,
}

impl KeyEvents {
    pub fn builder() -> KeyEventsBuilder {
        KeyEventsBuilder::new()
    }

    pub fn get(&self, key: EventKey) -> Option<usize> {
        self.events.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKey, usize)> + '_ {
        self.events.iter().map(|(k, v)| (*k, *v))
    }

    /// Parse `names` and require each one to have been detected.
    pub fn validate_event_names<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<EventKey>, SwoopError> {
        names
            .iter()
            .map(|name| {
                let key: EventKey = name.as_ref().parse()?;
                if self.events.contains_key(&key) {
                    Ok(key)
                } else {
                    Err(SwoopError::EventNotDetected(key.as_str().to_string()))
                }
            })
            .collect()
    }

    pub fn validate_bounds(&self, trajectory: &Trajectory) -> Result<(), SwoopError> {
        self.events
            .values()
            .try_for_each(|&index| trajectory.check_index(index))
    }

    /// Re-express every index of `from` as the index of the sample with the same
    /// timestamp in `to`.
    pub fn map_onto(&self, from: &Trajectory, to: &Trajectory) -> Result<KeyEvents, SwoopError> {
        let events = self
            .events
            .iter()
            .map(|(&key, &index)| Ok((key, from.map_index(to, index)?)))
            .collect::<Result<BTreeMap<_, _>, SwoopError>>()?;
        Ok(KeyEvents { events })
    }

    /// Markers for `view`, valued from the matching `y_axis` series and rounded
    /// to two decimals. Events that were not detected are skipped.
    pub fn markers(
        &self,
        view: EventView,
        y_axis: &AxisSettings,
    ) -> Result<Vec<EventMarker>, SwoopError> {
        let mut out = Vec::new();
        for &(event, axis) in view.markers() {
            let Some(index) = self.get(event) else {
                continue;
            };
            let data = &y_axis.get(axis)?.data;
            let value = data.get(index).copied().ok_or(SwoopError::IndexOutOfBounds {
                index,
                len: data.len(),
            })?;
            out.push(EventMarker {
                event,
                axis,
                index,
                value: (value * 100.0).round() / 100.0,
            });
        }
        Ok(out)
    }
}

/// Presentation views that annotate key events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventView {
    Overview,
    Speed,
    SideView,
    Overhead,
    Map2d,
}

const ELEVATION: &str = "Elevation";
const HORZ_SPEED: &str = "Horizontal speed";
const VERT_SPEED: &str = "Vertical speed";

impl EventView {
    pub const ALL: [EventView; 5] = [
        EventView::Overview,
        EventView::Speed,
        EventView::SideView,
        EventView::Overhead,
        EventView::Map2d,
    ];

    /// `(event, y-axis metric)` pairs marked on this view, in drawing order.
    pub fn markers(self) -> &'static [(EventKey, &'static str)] {
        use EventKey::*;
        match self {
            EventView::Overview | EventView::Overhead => &[
                (ToggleSearch, ELEVATION),
                (InitTurn, ELEVATION),
                (StartRollout, ELEVATION),
                (StopRollout, ELEVATION),
                (MaxHorzSpeed, HORZ_SPEED),
            ],
            EventView::Speed => &[
                (MaxHorzSpeed, HORZ_SPEED),
                (StopRollout, HORZ_SPEED),
                (StopEstimate, HORZ_SPEED),
            ],
            EventView::SideView => &[
                (InitTurn, ELEVATION),
                (StartRollout, ELEVATION),
                (ToggleSearch, ELEVATION),
                (StopRollout, ELEVATION),
                (MaxHorzSpeed, HORZ_SPEED),
            ],
            EventView::Map2d => &[
                (BaseLeg, ELEVATION),
                (ToggleSearch, ELEVATION),
                (InitTurn, ELEVATION),
                (FrontRiser, ELEVATION),
                (AfterRiser, ELEVATION),
                (StartRollout, VERT_SPEED),
                (MaxHorzSpeed, HORZ_SPEED),
                (StopRollout, ELEVATION),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisSettingsBuilder;

    fn landing() -> KeyEvents {
        KeyEvents::builder()
            .insert(EventKey::InitTurn, 1)
            .insert(EventKey::StartRollout, 2)
            .insert(EventKey::MaxHorzSpeed, 3)
            .build()
    }

    fn trajectory() -> Trajectory {
        Trajectory::from_columns(vec![
            ("timestamp", vec![10.0, 10.2, 10.4, 10.6, 10.8]),
            ("elevation", vec![120.0, 95.456, 60.0, 8.004, 1.0]),
            ("horz_speed_km/u", vec![70.0, 80.0, 90.0, 101.239, 85.0]),
        ])
        .unwrap()
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for key in EventKey::ALL {
            assert_eq!(key.as_str().parse::<EventKey>().unwrap(), key);
        }
        assert_eq!(
            "init_trun".parse::<EventKey>().unwrap_err(),
            SwoopError::UnknownEvent("init_trun".into())
        );
    }

    #[test]
    fn validate_event_names_requires_detection() {
        let events = landing();
        assert_eq!(
            events.validate_event_names(&["init_turn", "max_horz_speed"]).unwrap(),
            vec![EventKey::InitTurn, EventKey::MaxHorzSpeed]
        );
        assert_eq!(
            events.validate_event_names(&["stop_rollout"]).unwrap_err(),
            SwoopError::EventNotDetected("stop_rollout".into())
        );
        assert!(matches!(
            events.validate_event_names(&["landing"]),
            Err(SwoopError::UnknownEvent(_))
        ));
    }

    #[test]
    fn bounds_checked_against_trajectory() {
        assert!(landing().validate_bounds(&trajectory()).is_ok());
        let short = trajectory().slice(0..3).unwrap();
        assert_eq!(
            landing().validate_bounds(&short).unwrap_err(),
            SwoopError::IndexOutOfBounds { index: 3, len: 3 }
        );
    }

    #[test]
    fn indices_map_between_trajectories() {
        let full = trajectory();
        let tail = full.slice(1..5).unwrap();
        let mapped = landing().map_onto(&full, &tail).unwrap();
        assert_eq!(mapped.get(EventKey::InitTurn), Some(0));
        assert_eq!(mapped.get(EventKey::MaxHorzSpeed), Some(2));
    }

    #[test]
    fn markers_follow_view_and_round_values() {
        let y = AxisSettingsBuilder::default().y_axis(&trajectory());
        let markers = landing().markers(EventView::Overview, &y).unwrap();
        let summary: Vec<_> = markers.iter().map(|m| (m.event, m.axis, m.value)).collect();
        assert_eq!(
            summary,
            vec![
                (EventKey::InitTurn, "Elevation", 95.46),
                (EventKey::StartRollout, "Elevation", 60.0),
                (EventKey::MaxHorzSpeed, "Horizontal speed", 101.24),
            ]
        );
        // the map view reads start_rollout from vertical speed, which is absent
        assert!(landing().markers(EventView::Map2d, &y).is_err());
    }

    #[test]
    fn every_view_uses_known_axes() {
        for view in EventView::ALL {
            for (_, axis) in view.markers() {
                assert!([ELEVATION, HORZ_SPEED, VERT_SPEED].contains(axis));
            }
        }
    }
}
