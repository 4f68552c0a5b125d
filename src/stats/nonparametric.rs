use statrs::function::erf::erfc;

use super::{Alternative, PValueMethod, TestResult};

/// Largest sample size for which the exact null distribution is used
/// (when the other sample may be of any size and there are no ties).
const EXACT_MAX_SMALLER_SAMPLE: usize = 8;

/// Mann-Whitney U test of `x` against `y`.
///
/// The reported statistic is `U1 = R1 - nx(nx+1)/2`, the U of `x`.
/// The p-value uses the exact null distribution of U when one sample has at
/// most eight observations and there are no ties; otherwise the normal
/// approximation with tie correction and a 0.5 continuity correction.
///
/// An empty sample gives `U = NaN` and `p = 1`.
pub fn mann_whitney(x: &[f64], y: &[f64], alternative: Alternative) -> TestResult {
    let nx = x.len();
    let ny = y.len();

    if nx == 0 || ny == 0 {
        return TestResult::new(f64::NAN, 1.0, PValueMethod::Undefined); // Insufficient data
    }

    // Combine samples and assign group labels (0 for x, 1 for y)
    let mut combined: Vec<(f64, usize)> = Vec::with_capacity(nx + ny);
    combined.extend(x.iter().map(|&v| (v, 0)));
    combined.extend(y.iter().map(|&v| (v, 1)));

    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (ranks, tie_sizes) = average_ranks(&combined);

    let rank_sum_x: f64 = combined
        .iter()
        .zip(&ranks)
        .filter(|((_, g), _)| *g == 0)
        .map(|(_, &r)| r)
        .sum();

    let nx_f = nx as f64;
    let ny_f = ny as f64;
    let u_x = rank_sum_x - nx_f * (nx_f + 1.0) / 2.0;
    let u_y = nx_f * ny_f - u_x;

    let (u, factor) = match alternative {
        Alternative::TwoSided => (u_x.max(u_y), 2.0),
        Alternative::Greater => (u_x, 1.0),
        Alternative::Less => (u_y, 1.0),
    };

    let has_ties = tie_sizes.iter().any(|&t| t > 1);
    let method = if nx.min(ny) <= EXACT_MAX_SMALLER_SAMPLE && !has_ties {
        PValueMethod::Exact
    } else {
        PValueMethod::Asymptotic
    };

    let n = nx_f + ny_f;
    let mean_u = nx_f * ny_f / 2.0;
    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let var_u = nx_f * ny_f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    let z = (u - mean_u - 0.5) / var_u.sqrt();

    let one_sided = match method {
        PValueMethod::Exact => exact_upper_tail(u.round() as usize, nx, ny),
        _ if var_u > 0.0 && z.is_finite() => standard_normal_sf(z),
        _ => 1.0,
    };
    let p_value = (factor * one_sided).clamp(0.0, 1.0);

    let result = TestResult::new(u_x, p_value, method);
    if var_u > 0.0 {
        // z taken without continuity correction
        let z_raw = (u_x - mean_u) / var_u.sqrt();
        result.with_effect_size(z_raw.abs() / n.sqrt())
    } else {
        result
    }
}

/// Average ranks (1-based) of a sorted sample, plus the size of each run of
/// equal values.
fn average_ranks(sorted: &[(f64, usize)]) -> (Vec<f64>, Vec<usize>) {
    let mut ranks = vec![0.0; sorted.len()];
    let mut tie_sizes = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let val = sorted[i].0;
        let mut j = i + 1;
        while j < sorted.len() && sorted[j].0 == val {
            j += 1;
        }

        let rank = (i + j - 1) as f64 / 2.0 + 1.0;
        ranks[i..j].fill(rank);
        tie_sizes.push(j - i);

        i = j;
    }
    (ranks, tie_sizes)
}

/// P(U >= u) under the null hypothesis for sample sizes `m` and `n`.
fn exact_upper_tail(u: usize, m: usize, n: usize) -> f64 {
    let counts = u_null_counts(m, n);
    let total: i128 = counts.iter().sum();
    let tail: i128 = counts.iter().skip(u).sum();
    tail as f64 / total as f64
}

/// Number of rank arrangements giving each value of U (index = U).
///
/// These are the coefficients of the Gaussian binomial coefficient
/// `[m+n choose m]_q = prod_{i=1..m} (1 - q^(n+i)) / (1 - q^i)`.
fn u_null_counts(m: usize, n: usize) -> Vec<i128> {
    let (m, n) = if m <= n { (m, n) } else { (n, m) };
    let max_u = m * n;
    let mut c = vec![0i128; max_u + m + 1];
    c[0] = 1;
    for i in 1..=m {
        // multiply by (1 - q^(n+i))
        let shift = n + i;
        for k in (shift..c.len()).rev() {
            c[k] -= c[k - shift];
        }
        // divide by (1 - q^i); exact, the quotient is a polynomial
        for k in i..c.len() {
            c[k] += c[k - i];
        }
    }
    c.truncate(max_u + 1);
    c
}

fn standard_normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}
