//! FIR design and window functions

use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Stopband attenuation (dB) of a Hamming window, sets the tap count
const HAMMING_ATTENUATION_DB: f64 = 53.0;

/// Hamming window of `n` points
pub fn hamming(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let m = (n - 1) as f64;
    (0..n)
        .map(|i| (0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos()) as f32)
        .collect()
}

/// 4-term Blackman-Harris window of `n` points
pub fn blackman_harris(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let (a0, a1, a2, a3) = (0.35875, 0.48829, 0.14128, 0.01168);
    let m = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / m;
            (a0 - a1 * x.cos() + a2 * (2.0 * x).cos() - a3 * (3.0 * x).cos()) as f32
        })
        .collect()
}

/// Number of taps a Hamming-windowed low-pass needs for the given transition band.
/// Always odd so the filter has a center tap.
pub fn low_pass_len(sample_rate: f64, transition_width: f64) -> usize {
    let n = (HAMMING_ATTENUATION_DB * sample_rate / (22.0 * transition_width)).ceil() as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Windowed-sinc low-pass with its DC response normalized to `gain`.
pub fn low_pass(
    gain: f64,
    sample_rate: f64,
    cutoff: f64,
    transition_width: f64,
) -> Result<Vec<f32>> {
    if !(sample_rate > 0.0) {
        return Err(Error::config("filter sample rate must be positive"));
    }
    if !(cutoff > 0.0 && cutoff < sample_rate / 2.0) {
        return Err(Error::config(format!(
            "cutoff {} Hz outside (0, {}) Hz",
            cutoff,
            sample_rate / 2.0
        )));
    }
    if !(transition_width > 0.0) {
        return Err(Error::config("transition width must be positive"));
    }

    let ntaps = low_pass_len(sample_rate, transition_width);
    let window = hamming(ntaps);
    let mid = (ntaps / 2) as isize;
    let wc = 2.0 * PI * cutoff / sample_rate;

    let mut taps: Vec<f64> = (0..ntaps)
        .map(|n| {
            let x = (n as isize - mid) as f64;
            let sinc = if x == 0.0 { wc / PI } else { (wc * x).sin() / (PI * x) };
            sinc * window[n] as f64
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    for t in taps.iter_mut() {
        *t *= gain / sum;
    }
    Ok(taps.into_iter().map(|t| t as f32).collect())
}
