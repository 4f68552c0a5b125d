//! Two-sample hypothesis tests.
//!
//! Only the rank-based Mann-Whitney U test is needed here; it lives in
//! [`nonparametric`]. This module holds the result type shared by tests.

pub mod nonparametric;

pub use nonparametric::mann_whitney;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    TwoSided,
    /// First sample stochastically smaller.
    Less,
    /// First sample stochastically greater.
    Greater,
}

/// How the p-value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueMethod {
    /// Exact null distribution of U.
    Exact,
    /// Normal approximation with tie and continuity correction.
    Asymptotic,
    /// Not computed (a sample was empty).
    Undefined,
}

#[derive(Debug, Clone)]
pub struct TestResult {
    /// The test statistic value (U of the first sample)
    pub statistic: f64,
    /// The p-value of the test
    pub p_value: f64,
    pub method: PValueMethod,
    /// Effect size r = |z| / sqrt(N), when the variance of U is positive
    pub effect_size: Option<f64>,
}

impl TestResult {
    /// Create a new test result with minimal information
    pub fn new(statistic: f64, p_value: f64, method: PValueMethod) -> Self {
        TestResult {
            statistic,
            p_value,
            method,
            effect_size: None,
        }
    }

    pub fn with_effect_size(mut self, effect_size: f64) -> Self {
        self.effect_size = Some(effect_size);
        self
    }
}
