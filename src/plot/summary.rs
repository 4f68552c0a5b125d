/// Whisker reach, in multiples of the inter-quartile range.
const WHISKER_IQR: f64 = 1.5;

/// Five-number summary drawn as a box plot.
///
/// Whiskers end at the most extreme observations within 1.5·IQR of the box;
/// points beyond them are not drawn as fliers (the strip plot shows them).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    /// Largest observation; markers are placed relative to it.
    pub max: f64,
}

impl BoxSummary {
    /// `None` for an empty sample. Non-finite values are ignored.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let low_fence = q1 - WHISKER_IQR * iqr;
        let high_fence = q3 + WHISKER_IQR * iqr;

        let whisker_low = sorted
            .iter()
            .copied()
            .find(|&v| v >= low_fence)
            .unwrap_or(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= high_fence)
            .unwrap_or(q3);

        Some(BoxSummary {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear-interpolation percentile of a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
