use serde::{Deserialize, Serialize};

use super::model::Observation;
use super::DataError;

/// Value transform applied before testing and plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Plot the raw measure.
    #[default]
    Identity,
    /// Plot log2 of the raw measure.
    Log2 { on_non_positive: NonPositivePolicy },
}

/// What to do with a raw value that has no logarithm (zero, negative, NaN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NonPositivePolicy {
    /// Abort the analysis.
    #[default]
    Fail,
    /// Drop the row and keep going.
    Drop,
}

/// Fill in `Observation::value` from `Observation::raw`.
pub fn apply(
    transform: Transform,
    observations: Vec<Observation>,
) -> Result<Vec<Observation>, DataError> {
    match transform {
        Transform::Identity => Ok(observations
            .into_iter()
            .map(|obs| Observation {
                value: obs.raw,
                ..obs
            })
            .collect()),
        Transform::Log2 { on_non_positive } => log2(observations, on_non_positive),
    }
}

fn log2(
    observations: Vec<Observation>,
    policy: NonPositivePolicy,
) -> Result<Vec<Observation>, DataError> {
    let mut out = Vec::with_capacity(observations.len());
    for obs in observations {
        // `!(x > 0)` also catches NaN
        if !(obs.raw > 0.0) {
            match policy {
                NonPositivePolicy::Fail => {
                    return Err(DataError::NonPositive {
                        row: obs.row,
                        value: obs.raw,
                    })
                }
                NonPositivePolicy::Drop => {
                    log::warn!(
                        "Dropping row {} ({}): log2 undefined for {}",
                        obs.row,
                        obs.group,
                        obs.raw
                    );
                    continue;
                }
            }
        }
        out.push(Observation {
            value: obs.raw.log2(),
            ..obs
        });
    }
    Ok(out)
}
