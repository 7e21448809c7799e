//! Zero-order hold from the decimated rate back to the full input rate.

/// Expands per-decimated-sample phase advances into per-full-rate-sample ones.
///
/// Each decimated value covers `D` full-rate samples and is divided by `D`,
/// so integrating the output over a batch turns the same angle as integrating
/// the input. Positions past `L * D` reuse the last value seen, which may come
/// from an earlier batch.
#[derive(Debug, Clone)]
pub struct RateInterpolator {
    factor: usize,
    last: f32,
}

impl RateInterpolator {
    pub fn new(factor: usize) -> Self {
        assert!(factor > 0, "Interpolation factor must be greater than 0");
        Self { factor, last: 0.0 }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Fill `output` with exactly `full_len` values
    pub fn process(&mut self, input: &[f32], full_len: usize, output: &mut Vec<f32>) {
        output.clear();
        output.reserve(full_len);
        let scale = 1.0 / self.factor as f32;
        for &v in input {
            if output.len() >= full_len {
                break;
            }
            let value = v * scale;
            let n = self.factor.min(full_len - output.len());
            output.extend(std::iter::repeat(value).take(n));
            self.last = value;
        }
        output.resize(full_len, self.last);
    }
}
