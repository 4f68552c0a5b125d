//! Significance markers for control-vs-group comparisons.
//!
//! Every non-control group is tested against the control group only.
//! Markers sit at a fixed offset above the highest value of the panel.

use serde::{Deserialize, Serialize};

use crate::stats::{mann_whitney, Alternative, TestResult};

/// Significance level derived from a p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Significance {
    NotSignificant,
    /// p < 0.05
    One,
    /// p < 0.01
    Two,
    /// p < 0.001
    Three,
}

impl Significance {
    pub fn from_p(p: f64) -> Self {
        if p < 0.001 {
            Significance::Three
        } else if p < 0.01 {
            Significance::Two
        } else if p < 0.05 {
            Significance::One
        } else {
            Significance::NotSignificant
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Significance::Three => "***",
            Significance::Two => "**",
            Significance::One => "*",
            Significance::NotSignificant => "ns",
        }
    }
}

/// How empty and non-significant comparisons are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Skip comparisons with an empty group; draw nothing when p >= 0.05.
    SignificantOnly,
    /// Always test and always draw a marker (including "ns") over a bracket.
    AlwaysLabel,
}

impl MarkerPolicy {
    /// Marker text for a p-value under this policy.
    pub fn marker_for(self, p: f64) -> Option<&'static str> {
        match (self, Significance::from_p(p)) {
            (MarkerPolicy::SignificantOnly, Significance::NotSignificant) => None,
            (_, level) => Some(level.marker()),
        }
    }
}

/// Vertical placement of markers relative to the panel maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Marker baseline = panel max + `text_offset`.
    pub text_offset: f64,
    /// When set, a bracket joins control and the compared group at
    /// panel max + `bracket_offset`.
    #[serde(default)]
    pub bracket_offset: Option<f64>,
}

/// One group's values at its x position on the plot.
#[derive(Debug, Clone, Copy)]
pub struct GroupSample<'a> {
    pub label: &'a str,
    pub position: f64,
    pub values: &'a [f64],
}

/// Outcome of one control-vs-group comparison.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub group: String,
    pub n_control: usize,
    pub n_group: usize,
    /// `None` when the test was skipped.
    pub result: Option<TestResult>,
    pub marker: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub x_start: f64,
    pub x_end: f64,
    pub y: f64,
}

/// A marker to draw on the plot, in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub group: String,
    pub text: &'static str,
    pub x: f64,
    pub y: f64,
    pub bracket: Option<Bracket>,
}

/// Test every comparison group against `control` and place the markers.
///
/// `panel_max` is the highest plotted value of the panel. Bracketed markers
/// for successive comparisons are stacked so they do not overlap.
pub fn annotate(
    control: GroupSample<'_>,
    groups: &[GroupSample<'_>],
    policy: MarkerPolicy,
    placement: Placement,
    panel_max: f64,
) -> (Vec<Comparison>, Vec<Annotation>) {
    let mut comparisons = Vec::with_capacity(groups.len());
    let mut annotations = Vec::new();

    for group in groups {
        let either_empty = control.values.is_empty() || group.values.is_empty();
        if policy == MarkerPolicy::SignificantOnly && either_empty {
            log::debug!(
                "No observations for {} or {}, comparison skipped",
                control.label,
                group.label
            );
            comparisons.push(Comparison {
                group: group.label.to_string(),
                n_control: control.values.len(),
                n_group: group.values.len(),
                result: None,
                marker: None,
            });
            continue;
        }

        let result = mann_whitney(control.values, group.values, Alternative::TwoSided);
        let marker = policy.marker_for(result.p_value);

        if let Some(text) = marker {
            let annotation = match placement.bracket_offset {
                Some(bracket_offset) => {
                    let lift = annotations.len() as f64 * 2.0 * placement.text_offset;
                    Annotation {
                        group: group.label.to_string(),
                        text,
                        x: (control.position + group.position) / 2.0,
                        y: panel_max + placement.text_offset + lift,
                        bracket: Some(Bracket {
                            x_start: control.position,
                            x_end: group.position,
                            y: panel_max + bracket_offset + lift,
                        }),
                    }
                }
                None => Annotation {
                    group: group.label.to_string(),
                    text,
                    x: group.position,
                    y: panel_max + placement.text_offset,
                    bracket: None,
                },
            };
            annotations.push(annotation);
        }

        comparisons.push(Comparison {
            group: group.label.to_string(),
            n_control: control.values.len(),
            n_group: group.values.len(),
            result: Some(result),
            marker,
        });
    }

    (comparisons, annotations)
}
