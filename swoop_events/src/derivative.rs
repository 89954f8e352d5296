use ndarray::{Array1, ArrayView1};

use crate::SwoopError;

/// Successive numerical derivatives of `signal`.
///
/// Entry 0 is the signal itself and entry `k` the gradient of entry `k - 1`,
/// so the result always holds `levels + 1` series of the input's length.
pub fn derivatives<'a>(
    signal: impl Into<ArrayView1<'a, f64>>,
    levels: usize,
) -> Result<Vec<Array1<f64>>, SwoopError> {
    let signal = signal.into();
    if signal.is_empty() {
        return Err(SwoopError::EmptySeries("signal".into()));
    }
    if levels > 0 && signal.len() < 2 {
        return Err(SwoopError::InsufficientData(
            "at least two samples are required to differentiate".into(),
        ));
    }
    let mut out = Vec::with_capacity(levels + 1);
    out.push(signal.to_owned());
    for _ in 0..levels {
        let next = gradient(out[out.len() - 1].view());
        out.push(next);
    }
    Ok(out)
}

// One-sided differences at the ends, central differences inside.
fn gradient(values: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = values.len();
    let mut out = Array1::zeros(n);
    out[0] = values[1] - values[0];
    out[n - 1] = values[n - 1] - values[n - 2];
    for i in 1..n - 1 {
        out[i] = (values[i + 1] - values[i - 1]) / 2.0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_levels_returns_signal() {
        let signal = vec![1.0, 4.0, 9.0];
        let out = derivatives(&signal, 0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_vec(), signal);
    }

    #[test]
    fn every_level_keeps_length() {
        let signal: Vec<f64> = (0..12).map(|i| (i as f64 * 0.4).sin()).collect();
        let out = derivatives(&signal, 3).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|s| s.len() == signal.len()));
    }

    #[test]
    fn matches_central_and_edge_differences() {
        let out = derivatives(&[1.0_f64, 2.0, 4.0, 7.0, 11.0], 2).unwrap();
        assert_eq!(out[1].to_vec(), vec![1.0, 1.5, 2.5, 3.5, 4.0]);
        assert_eq!(out[2].to_vec(), vec![0.5, 0.75, 1.0, 0.75, 0.5]);
    }

    #[test]
    fn quadratic_has_constant_interior_second_derivative() {
        let signal: Vec<f64> = (0..8).map(|i| (i * i) as f64).collect();
        let out = derivatives(&signal, 2).unwrap();
        for value in out[2].iter().skip(2).take(4) {
            assert!((value - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_empty_and_single_sample() {
        let empty: Vec<f64> = Vec::new();
        assert!(matches!(derivatives(&empty, 1), Err(SwoopError::EmptySeries(_))));
        assert!(matches!(
            derivatives(&[3.0_f64], 1),
            Err(SwoopError::InsufficientData(_))
        ));
        assert_eq!(derivatives(&[3.0_f64], 0).unwrap().len(), 1);
    }
}
