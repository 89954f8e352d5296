//! Column-oriented flight trajectory.
//!
//! A [`Trajectory`] is a set of equally long `f64` columns addressed by name.
//! Distance and speed columns follow the `<metric>_<unit>` convention
//! (`horz_distance_m`, `vert_speed_mph`, ...); the remaining columns use fixed
//! names. Every transformation returns a new trajectory and leaves the input
//! untouched.

use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::{s, Array1};

use crate::derivative::derivatives;
use crate::SwoopError;

pub const TIME_SEC: &str = "time_sec";
pub const TIMESTAMP: &str = "timestamp";
pub const ELEVATION: &str = "elevation";
pub const DIVE_ANGLE: &str = "dive_angle";
pub const GLIDE_RATIO: &str = "glide_ratio";

pub const HORZ_DISTANCE: &str = "horz_distance";
pub const X_AXIS_DISTANCE: &str = "x_axis_distance";
pub const Y_AXIS_DISTANCE: &str = "y_axis_distance";
pub const HORZ_SPEED: &str = "horz_speed";
pub const VERT_SPEED: &str = "vert_speed";

/// Build a unit-qualified column name, e.g. `("horz_speed", "mph")` -> `horz_speed_mph`.
pub fn unit_column(prefix: &str, unit: &str) -> String {
    format!("{prefix}_{unit}")
}

/// Identifies a derivative series by the column it was derived from and its order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivativeKey {
    pub base: String,
    pub order: usize,
}

impl DerivativeKey {
    pub fn new(base: impl Into<String>, order: usize) -> Self {
        Self {
            base: base.into(),
            order,
        }
    }

    /// Display name used for the series, e.g. `elevation_first_deriv`.
    pub fn series_name(&self) -> String {
        match self.order {
            1 => format!("{}_first_deriv", self.base),
            2 => format!("{}_second_deriv", self.base),
            n => format!("{}_deriv_{}", self.base, n),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    len: usize,
    columns: BTreeMap<String, Array1<f64>>,
    derivatives: BTreeMap<DerivativeKey, Array1<f64>>,
}

impl Trajectory {
    /// Assemble a trajectory from named columns. All columns must share one
    /// non-zero length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, SwoopError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut out: BTreeMap<String, Array1<f64>> = BTreeMap::new();
        let mut len: Option<usize> = None;
        for (name, values) in columns {
            let name = name.into();
            match len {
                None => len = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(SwoopError::LengthMismatch {
                        column: name,
                        expected,
                        found: values.len(),
                    });
                }
                Some(_) => {}
            }
            out.insert(name, Array1::from_vec(values));
        }
        match len {
            Some(len) if len > 0 => Ok(Self {
                len,
                columns: out,
                derivatives: BTreeMap::new(),
            }),
            _ => Err(SwoopError::EmptySeries("trajectory".into())),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Array1<f64>, SwoopError> {
        self.columns
            .get(name)
            .ok_or_else(|| SwoopError::MissingColumn(name.to_string()))
    }

    pub fn try_column(&self, name: &str) -> Option<&Array1<f64>> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Array1<f64>)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Return a copy with `name` added or replaced. Derivatives registered on
    /// `name` are recomputed.
    pub fn with_column(&self, name: &str, values: Array1<f64>) -> Result<Self, SwoopError> {
        let mut out = self.clone();
        out.set_column(name, values)?;
        Ok(out)
    }

    pub(crate) fn set_column(&mut self, name: &str, values: Array1<f64>) -> Result<(), SwoopError> {
        if values.len() != self.len {
            return Err(SwoopError::LengthMismatch {
                column: name.to_string(),
                expected: self.len,
                found: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        self.refresh_derivatives(name)
    }

    // Derivatives registered on `base` are recomputed from its current values.
    fn refresh_derivatives(&mut self, base: &str) -> Result<(), SwoopError> {
        let levels = self
            .derivatives
            .keys()
            .filter(|k| k.base == base)
            .map(|k| k.order)
            .max();
        match levels {
            Some(levels) => self.register_derivatives(base, levels),
            None => Ok(()),
        }
    }

    fn register_derivatives(&mut self, column: &str, levels: usize) -> Result<(), SwoopError> {
        let series = derivatives(self.column(column)?, levels)?;
        for (order, values) in series.into_iter().enumerate().skip(1) {
            self.derivatives
                .insert(DerivativeKey::new(column, order), values);
        }
        Ok(())
    }

    pub fn derivative(&self, key: &DerivativeKey) -> Option<&Array1<f64>> {
        self.derivatives.get(key)
    }

    /// Registered derivative series, ordered by base column then order.
    pub fn derivative_series(&self) -> impl Iterator<Item = (&DerivativeKey, &Array1<f64>)> {
        self.derivatives.iter()
    }

    /// Return a copy with derivatives of `column` registered for orders `1..=levels`.
    pub fn with_derivatives(&self, column: &str, levels: usize) -> Result<Self, SwoopError> {
        let mut out = self.clone();
        out.register_derivatives(column, levels)?;
        Ok(out)
    }

    pub fn check_index(&self, index: usize) -> Result<(), SwoopError> {
        if index < self.len {
            Ok(())
        } else {
            Err(SwoopError::IndexOutOfBounds {
                index,
                len: self.len,
            })
        }
    }

    /// Copy of the samples in `range`, derivative series included.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, SwoopError> {
        if range.start >= range.end || range.end > self.len {
            return Err(SwoopError::InvalidRange {
                start: range.start,
                stop: range.end,
                len: self.len,
            });
        }
        let cut = |values: &Array1<f64>| values.slice(s![range.start..range.end]).to_owned();
        Ok(Self {
            len: range.end - range.start,
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), cut(v)))
                .collect(),
            derivatives: self
                .derivatives
                .iter()
                .map(|(k, v)| (k.clone(), cut(v)))
                .collect(),
        })
    }

    /// Index of the first sample whose `timestamp` equals `timestamp`.
    pub fn index_of_timestamp(&self, timestamp: f64) -> Result<usize, SwoopError> {
        self.column(TIMESTAMP)?
            .iter()
            .position(|&t| t == timestamp)
            .ok_or(SwoopError::TimestampNotFound(timestamp))
    }

    /// Map a sample index of `self` onto `other` through the shared `timestamp` column.
    pub fn map_index(&self, other: &Trajectory, index: usize) -> Result<usize, SwoopError> {
        self.check_index(index)?;
        let timestamp = self.column(TIMESTAMP)?[index];
        other.index_of_timestamp(timestamp)
    }
}
