//! Thresholded peak and low detection.
//!
//! A [`Threshold`] carries an amplitude fraction and a minimum sample spacing
//! for peaks and for lows. Peaks are local maxima rising above
//! `min + thres * (max - min)`; lows are the peaks of the negated signal.

use std::cmp::Reverse;

use ndarray::{Array1, ArrayView1};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SwoopError;

const UNKNOWN_METRIC: &str = "unknown metric";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    thres_peaks: f64,
    min_dist_peaks: usize,
    thres_lows: f64,
    min_dist_lows: usize,
}

/// Indices of the peaks and lows found in one signal, both ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extrema {
    pub peaks: Vec<usize>,
    pub lows: Vec<usize>,
}

impl Threshold {
    pub fn new(
        thres_peaks: f64,
        min_dist_peaks: usize,
        thres_lows: f64,
        min_dist_lows: usize,
    ) -> Result<Self, SwoopError> {
        let threshold = Self {
            thres_peaks,
            min_dist_peaks,
            thres_lows,
            min_dist_lows,
        };
        match threshold.range_problem() {
            Some(reason) => Err(SwoopError::InvalidParameter(reason)),
            None => Ok(threshold),
        }
    }

    pub fn thres_peaks(&self) -> f64 {
        self.thres_peaks
    }

    pub fn min_dist_peaks(&self) -> usize {
        self.min_dist_peaks
    }

    pub fn thres_lows(&self) -> f64 {
        self.thres_lows
    }

    pub fn min_dist_lows(&self) -> usize {
        self.min_dist_lows
    }

    /// Describe the first field outside `[0, 1]`, if any.
    pub(crate) fn range_problem(&self) -> Option<String> {
        [("thres_peaks", self.thres_peaks), ("thres_lows", self.thres_lows)]
            .into_iter()
            .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(v))
            .map(|(name, v)| format!("{name} must be a fraction in [0, 1], got {v}"))
    }

    /// Detect peaks and lows in `signal`.
    pub fn detect<'a>(
        &self,
        signal: impl Into<ArrayView1<'a, f64>>,
    ) -> Result<Extrema, SwoopError> {
        let signal = signal.into();
        check_signal(signal, UNKNOWN_METRIC)?;
        let peaks = find_peaks(signal, self.thres_peaks, self.min_dist_peaks);
        let negated: Array1<f64> = signal.mapv(|v| -v);
        let lows = find_peaks(negated.view(), self.thres_lows, self.min_dist_lows);
        debug!(peaks = peaks.len(), lows = lows.len(), "extrema detected");
        Ok(Extrema { peaks, lows })
    }

    /// Detect, then require at least one peak and/or low.
    ///
    /// `metric_name` only feeds the error message.
    pub fn detect_and_validate<'a>(
        &self,
        signal: impl Into<ArrayView1<'a, f64>>,
        metric_name: Option<&str>,
        validate_peaks: bool,
        validate_lows: bool,
    ) -> Result<Extrema, SwoopError> {
        let name = metric_name.unwrap_or(UNKNOWN_METRIC);
        let signal = signal.into();
        check_signal(signal, name)?;
        let extrema = self.detect(signal)?;
        if validate_peaks && extrema.peaks.is_empty() {
            return Err(SwoopError::NoPeaks(name.to_string()));
        }
        if validate_lows && extrema.lows.is_empty() {
            return Err(SwoopError::NoLows(name.to_string()));
        }
        Ok(extrema)
    }
}

fn check_signal(signal: ArrayView1<'_, f64>, name: &str) -> Result<(), SwoopError> {
    if signal.is_empty() {
        return Err(SwoopError::EmptySeries(name.to_string()));
    }
    if let Some(index) = signal.iter().position(|v| !v.is_finite()) {
        return Err(SwoopError::NonFiniteSample {
            name: name.to_string(),
            index,
        });
    }
    Ok(())
}

/// Local maxima of `values` above `min + thres * (max - min)`, more than
/// `min_dist` samples apart. Taller peaks win collisions; between equal
/// heights the later sample wins.
pub fn find_peaks(values: ArrayView1<'_, f64>, thres: f64, min_dist: usize) -> Vec<usize> {
    let n = values.len();
    if n < 3 {
        return Vec::new();
    }
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let level = lo + thres * (hi - lo);

    let mut dy: Vec<f64> = values.windows(2).into_iter().map(|w| w[1] - w[0]).collect();
    if dy.iter().all(|&d| d == 0.0) {
        return Vec::new();
    }
    fill_plateaus(&mut dy);

    let mut peaks: Vec<usize> = (1..n - 1)
        .filter(|&i| dy[i - 1] > 0.0 && dy[i] < 0.0 && values[i] > level)
        .collect();

    if peaks.len() > 1 && min_dist > 1 {
        let mut by_height = peaks.clone();
        by_height.sort_by_key(|&i| (Reverse(OrderedFloat(values[i])), Reverse(i)));
        let mut removed = vec![true; n];
        for &p in &peaks {
            removed[p] = false;
        }
        for peak in by_height {
            if removed[peak] {
                continue;
            }
            let start = peak.saturating_sub(min_dist);
            let end = (peak + min_dist + 1).min(n);
            removed[start..end].iter_mut().for_each(|r| *r = true);
            removed[peak] = false;
        }
        peaks = (0..n).filter(|&i| !removed[i]).collect();
    }
    peaks
}

// Push the slope of the neighbouring samples into flat runs so that a plateau
// top is reported once. Right neighbours are applied before left ones.
fn fill_plateaus(dy: &mut [f64]) {
    let m = dy.len();
    loop {
        let zeros: Vec<usize> = (0..m).filter(|&i| dy[i] == 0.0).collect();
        if zeros.is_empty() {
            break;
        }
        let snapshot = dy.to_vec();
        for &i in &zeros {
            dy[i] = snapshot.get(i + 1).copied().unwrap_or(0.0);
        }
        let zeros: Vec<usize> = (0..m).filter(|&i| dy[i] == 0.0).collect();
        let snapshot = dy.to_vec();
        for &i in &zeros {
            dy[i] = if i > 0 { snapshot[i - 1] } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWOOP: [f64; 9] = [0.0, 1.0, 3.0, 1.0, 0.0, 2.0, 5.0, 2.0, 0.0];

    fn thresholds(min_dist_peaks: usize) -> Threshold {
        Threshold::new(0.1, min_dist_peaks, 0.1, 1).unwrap()
    }

    #[test]
    fn keeps_both_peaks_when_far_enough() {
        let out = thresholds(2).detect(&SWOOP).unwrap();
        assert_eq!(out.peaks, vec![2, 6]);
        assert_eq!(out.lows, vec![4]);
    }

    #[test]
    fn taller_peak_wins_inside_min_distance() {
        let out = thresholds(5).detect(&SWOOP).unwrap();
        assert_eq!(out.peaks, vec![6]);
    }

    #[test]
    fn equal_peaks_inside_min_distance_keep_the_later_one() {
        let out = thresholds(2).detect(&[0.0_f64, 2.0, 0.0, 2.0, 0.0]).unwrap();
        assert_eq!(out.peaks, vec![3]);
        // far enough apart, both survive
        let out = thresholds(1).detect(&[0.0_f64, 2.0, 0.0, 2.0, 0.0]).unwrap();
        assert_eq!(out.peaks, vec![1, 3]);
    }

    #[test]
    fn amplitude_threshold_filters_short_peaks() {
        // level = 0.7 * 5 = 3.5, only the 5 clears it
        let threshold = Threshold::new(0.7, 1, 0.5, 1).unwrap();
        assert_eq!(threshold.detect(&SWOOP).unwrap().peaks, vec![6]);
    }

    #[test]
    fn plateau_reported_once() {
        let out = thresholds(1).detect(&[0.0_f64, 2.0, 2.0, 0.0]).unwrap();
        assert_eq!(out.peaks, vec![1]);
        let out = thresholds(1).detect(&[0.0_f64, 2.0, 2.0, 2.0, 0.0]).unwrap();
        assert_eq!(out.peaks.len(), 1);
    }

    #[test]
    fn constant_and_short_signals_have_no_extrema() {
        let out = thresholds(1).detect(&[4.0_f64; 6]).unwrap();
        assert!(out.peaks.is_empty() && out.lows.is_empty());
        let out = thresholds(1).detect(&[1.0_f64, 2.0]).unwrap();
        assert!(out.peaks.is_empty());
    }

    #[test]
    fn indices_ascending_spaced_and_disjoint() {
        let signal: Vec<f64> = (0..400)
            .map(|i| {
                let t = i as f64 * 0.1;
                t.sin() * 10.0 + (t * 7.3).sin() * 2.0 + (t * 0.37).cos() * 4.0
            })
            .collect();
        for min_dist in [1usize, 3, 10, 25] {
            let threshold = Threshold::new(0.2, min_dist, 0.2, min_dist).unwrap();
            let out = threshold.detect(&signal).unwrap();
            for set in [&out.peaks, &out.lows] {
                for pair in set.windows(2) {
                    assert!(pair[0] < pair[1]);
                    assert!(pair[1] - pair[0] > min_dist.max(1));
                }
            }
            assert!(out.peaks.iter().all(|p| !out.lows.contains(p)));
        }
    }

    #[test]
    fn lower_threshold_never_loses_peaks() {
        let signal: Vec<f64> = (0..200)
            .map(|i| ((i as f64) * 0.3).sin() * (1.0 + i as f64 / 50.0))
            .collect();
        let mut previous = 0usize;
        for step in (0..=10).rev() {
            let thres = step as f64 / 10.0;
            let count = Threshold::new(thres, 1, 0.5, 1)
                .unwrap()
                .detect(&signal)
                .unwrap()
                .peaks
                .len();
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn increasing_signal_has_no_interior_peaks() {
        let signal: Vec<f64> = (0..50).map(|i| i as f64 * 1.5).collect();
        let out = Threshold::new(0.0, 1, 0.0, 1).unwrap().detect(&signal).unwrap();
        assert!(out.peaks.is_empty());
        assert!(out.lows.is_empty());
    }

    #[test]
    fn rejects_empty_and_non_finite_input() {
        let empty: Vec<f64> = Vec::new();
        assert!(matches!(
            thresholds(1).detect(&empty),
            Err(SwoopError::EmptySeries(_))
        ));
        let err = thresholds(1)
            .detect(&[1.0_f64, f64::NAN, 0.0])
            .unwrap_err();
        assert!(matches!(err, SwoopError::NonFiniteSample { index: 1, .. }));
    }

    #[test]
    fn validation_names_the_metric() {
        let rising = [1.0_f64, 2.0, 3.0, 4.0];
        let err = thresholds(1)
            .detect_and_validate(&rising, Some("Horizontal speed"), true, false)
            .unwrap_err();
        assert_eq!(err.to_string(), "no peaks found in the Horizontal speed metric");

        let err = thresholds(1)
            .detect_and_validate(&rising, None, false, true)
            .unwrap_err();
        assert_eq!(err, SwoopError::NoLows("unknown metric".into()));

        assert!(thresholds(1)
            .detect_and_validate(&rising, None, false, false)
            .is_ok());
        assert!(thresholds(2)
            .detect_and_validate(&SWOOP, Some("Elevation"), true, true)
            .is_ok());
    }

    #[test]
    fn rejects_out_of_range_fractions() {
        assert!(Threshold::new(1.5, 1, 0.1, 1).is_err());
        let ok = Threshold::new(0.25, 4, 0.5, 2).unwrap();
        assert_eq!((ok.thres_peaks(), ok.min_dist_peaks()), (0.25, 4));
        assert_eq!((ok.thres_lows(), ok.min_dist_lows()), (0.5, 2));
        assert!(Threshold::new(0.1, 1, f64::NAN, 1).is_err());
    }
}
