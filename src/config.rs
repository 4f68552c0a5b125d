use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotate::{MarkerPolicy, Placement};
use crate::color;
use crate::data::filter::{allow_list, AllowList, LabelMap};
use crate::data::transform::{NonPositivePolicy, Transform};

pub const DEFAULT_HUMAN_INPUT: &str = "data/TMEM132D_human_GSE80655.csv";
pub const DEFAULT_HUMAN_OUTPUT: &str = "figures/TMEM132D_human_AnCg_DLPFC.png";
pub const DEFAULT_MOUSE_INPUT: &str = "data/TMEM132D_mouse_GSE146845.csv";
pub const DEFAULT_MOUSE_OUTPUT: &str = "figures/TMEM132D_mouse_CSDS.png";
/// Named so bold weights resolve; unknown families fall back to sans-serif.
pub const DEFAULT_FONT_FAMILY: &str = "DejaVu Sans";

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Everything one analysis needs: where the data is, which columns and
/// labels matter, how to test and how to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub columns: Columns,
    /// Regions to keep, in panel order. Empty for single-region datasets.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Groups to keep, in display order.
    pub groups: Vec<GroupSpec>,
    /// Canonical label of the reference group.
    pub control: String,
    #[serde(default)]
    pub transform: Transform,
    pub markers: MarkerPolicy,
    pub placement: Placement,
    pub figure: FigureStyle,
}

/// Column names of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    pub group: String,
    pub value: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// A raw label as found in the file and the label it is displayed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub raw: String,
    pub label: String,
}

impl GroupSpec {
    pub fn new(raw: &str, label: &str) -> Self {
        GroupSpec {
            raw: raw.to_string(),
            label: label.to_string(),
        }
    }
}

/// Static figure layout. Sizes in inches, fonts and lines in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureStyle {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    /// Title of a single-panel figure; region panels are titled by region.
    #[serde(default)]
    pub title: Option<String>,
    pub y_label: String,
    /// One fill per group (CSS name or `#rrggbb`); empty → gray ramp.
    #[serde(default)]
    pub fills: Vec<String>,
    pub box_line_width: f64,
    /// Strip point diameter.
    pub point_size: f64,
    /// Half-width of the horizontal jitter, in category units.
    pub jitter: f64,
    pub y_pad_below: f64,
    pub y_pad_above: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    pub title_font: f64,
    pub tick_font: f64,
    pub label_font: f64,
    pub marker_font: f64,
    #[serde(default)]
    pub seed: u64,
}

impl FigureStyle {
    /// Canvas size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f64).round() as u32,
            (self.height_in * self.dpi as f64).round() as u32,
        )
    }

    /// Convert a length in points to pixels at the figure DPI.
    pub fn pt_to_px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("at least two groups are required, got {0}")]
    TooFewGroups(usize),

    #[error("raw group label '{0}' is listed twice")]
    DuplicateGroup(String),

    #[error("control group '{0}' is not one of the configured labels")]
    UnknownControl(String),

    #[error("regions are listed but no region column is configured")]
    RegionsWithoutColumn,

    #[error("region column '{0}' is configured but no regions are listed")]
    ColumnWithoutRegions(String),

    #[error("expected {expected} fills (one per group), got {found}")]
    FillCount { expected: usize, found: usize },

    #[error("unknown fill colour '{0}'")]
    UnknownColor(String),

    #[error("figure {0} must be positive")]
    NonPositiveFigure(&'static str),

    #[error("marker offsets must be finite and non-negative")]
    InvalidOffset,

    #[error("output {0} must be a .png file")]
    OutputNotPng(PathBuf),
}

impl AnalysisConfig {
    /// Check every required field before any data is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("name", self.name.as_str()),
            ("columns.group", self.columns.group.as_str()),
            ("columns.value", self.columns.value.as_str()),
            ("control", self.control.as_str()),
            ("figure.y_label", self.figure.y_label.as_str()),
            ("figure.font_family", self.figure.font_family.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("input"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("output"));
        }
        let is_png = self
            .output
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(ConfigError::OutputNotPng(self.output.clone()));
        }

        let order = self.group_order();
        if order.len() < 2 {
            return Err(ConfigError::TooFewGroups(order.len()));
        }
        let mut seen = BTreeSet::new();
        for g in &self.groups {
            if g.label.trim().is_empty() {
                return Err(ConfigError::MissingField("groups.label"));
            }
            if !seen.insert(g.raw.as_str()) {
                return Err(ConfigError::DuplicateGroup(g.raw.clone()));
            }
        }
        if !order.iter().any(|l| *l == self.control) {
            return Err(ConfigError::UnknownControl(self.control.clone()));
        }

        match (&self.columns.region, self.regions.is_empty()) {
            (None, false) => return Err(ConfigError::RegionsWithoutColumn),
            (Some(col), true) => return Err(ConfigError::ColumnWithoutRegions(col.clone())),
            (Some(col), false) if col.trim().is_empty() => {
                return Err(ConfigError::MissingField("columns.region"))
            }
            _ => {}
        }

        let fig = &self.figure;
        if !fig.fills.is_empty() && fig.fills.len() != order.len() {
            return Err(ConfigError::FillCount {
                expected: order.len(),
                found: fig.fills.len(),
            });
        }
        if let Some(bad) = fig.fills.iter().find(|f| color::parse_fill(f).is_none()) {
            return Err(ConfigError::UnknownColor(bad.clone()));
        }
        let positive = [
            ("width_in", fig.width_in),
            ("height_in", fig.height_in),
            ("dpi", fig.dpi as f64),
            ("box_line_width", fig.box_line_width),
            ("point_size", fig.point_size),
            ("title_font", fig.title_font),
            ("tick_font", fig.tick_font),
            ("label_font", fig.label_font),
            ("marker_font", fig.marker_font),
        ];
        for (field, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositiveFigure(field));
            }
        }

        let offsets = [
            self.placement.text_offset,
            self.placement.bracket_offset.unwrap_or(0.0),
            fig.jitter,
            fig.y_pad_below,
            fig.y_pad_above,
        ];
        if offsets.iter().any(|o| !(o.is_finite() && *o >= 0.0)) {
            return Err(ConfigError::InvalidOffset);
        }
        Ok(())
    }

    /// Canonical group labels in display order, without duplicates.
    pub fn group_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::with_capacity(self.groups.len());
        for g in &self.groups {
            if !order.contains(&g.label.as_str()) {
                order.push(&g.label);
            }
        }
        order
    }

    pub fn label_map(&self) -> LabelMap {
        LabelMap::new(self.groups.iter().map(|g| (g.raw.clone(), g.label.clone())))
    }

    /// Row allow-list: raw group labels and, if configured, regions.
    pub fn allow_list(&self) -> AllowList {
        let labels = self.label_map();
        let mut allowed = allow_list([(self.columns.group.as_str(), labels.raw_labels())]);
        if let Some(region_col) = &self.columns.region {
            allowed.extend(allow_list([(region_col.as_str(), &self.regions)]));
        }
        allowed
    }

    /// Load a JSON-serialized configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    // -----------------------------------------------------------------------
    // Presets
    // -----------------------------------------------------------------------

    /// Both analyses with their default input and output paths.
    pub fn presets() -> Vec<AnalysisConfig> {
        vec![
            Self::human_psychiatric(DEFAULT_HUMAN_INPUT, DEFAULT_HUMAN_OUTPUT),
            Self::mouse_csds(DEFAULT_MOUSE_INPUT, DEFAULT_MOUSE_OUTPUT),
        ]
    }

    /// Post-mortem human brain (GSE80655): four diagnostic groups in the
    /// anterior cingulate gyrus and dorsolateral prefrontal cortex, log2 FPKM.
    pub fn human_psychiatric(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        AnalysisConfig {
            name: "human_psychiatric".into(),
            input: input.into(),
            output: output.into(),
            columns: Columns {
                group: "Group".into(),
                value: "TMEM132D_FPKM".into(),
                region: Some("Brain region".into()),
            },
            regions: vec!["AnCg".into(), "DLPFC".into()],
            groups: vec![
                GroupSpec::new("CTRL", "CTRL"),
                GroupSpec::new("MDD", "MDD"),
                GroupSpec::new("Schizophrenia", "SCZ"),
                GroupSpec::new("Bipolar", "BPD"),
            ],
            control: "CTRL".into(),
            transform: Transform::Log2 {
                on_non_positive: NonPositivePolicy::Fail,
            },
            markers: MarkerPolicy::SignificantOnly,
            placement: Placement {
                text_offset: 0.3,
                bracket_offset: None,
            },
            figure: FigureStyle {
                width_in: 8.0,
                height_in: 6.0,
                dpi: 300,
                title: None,
                y_label: "TMEM132D expression (log2 FPKM)".into(),
                fills: vec!["white".into(); 4],
                box_line_width: 1.8,
                point_size: 4.0,
                jitter: 0.1,
                y_pad_below: 0.2,
                y_pad_above: 0.8,
                font_family: default_font_family(),
                title_font: 16.0,
                tick_font: 18.0,
                label_font: 20.0,
                marker_font: 14.0,
                seed: 80655,
            },
        }
    }

    /// Mouse prefrontal cortex (GSE146845): control vs chronic social defeat
    /// stress, normalized CPM.
    pub fn mouse_csds(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        AnalysisConfig {
            name: "mouse_csds".into(),
            input: input.into(),
            output: output.into(),
            columns: Columns {
                group: "Group".into(),
                value: "Expression".into(),
                region: None,
            },
            regions: Vec::new(),
            groups: vec![
                GroupSpec::new("CTRL", "CTRL"),
                // the export carries a trailing space on this label
                GroupSpec::new("stress/vehicle ", "CSDS"),
            ],
            control: "CTRL".into(),
            transform: Transform::Identity,
            markers: MarkerPolicy::AlwaysLabel,
            placement: Placement {
                text_offset: 0.10,
                bracket_offset: Some(0.05),
            },
            figure: FigureStyle {
                width_in: 8.0,
                height_in: 6.0,
                dpi: 300,
                title: Some("PFC".into()),
                y_label: "Tmem132d expression (normalized CPM)".into(),
                fills: vec!["white".into(), "lightgray".into()],
                box_line_width: 1.5,
                point_size: 5.0,
                jitter: 0.1,
                y_pad_below: 0.1,
                y_pad_above: 0.3,
                font_family: default_font_family(),
                title_font: 16.0,
                tick_font: 18.0,
                label_font: 20.0,
                marker_font: 14.0,
                seed: 146845,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for config in AnalysisConfig::presets() {
            assert_eq!(config.validate(), Ok(()), "{}", config.name);
        }
    }

    #[test]
    fn human_preset_orders_groups_and_maps_labels() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        assert_eq!(config.group_order(), vec!["CTRL", "MDD", "SCZ", "BPD"]);
        let map = config.label_map();
        assert_eq!(map.canonicalize("Schizophrenia"), Some("SCZ"));
        assert_eq!(config.figure.pixel_size(), (2400, 1800));
    }

    #[test]
    fn allow_list_covers_groups_and_regions() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let allowed = config.allow_list();
        assert_eq!(allowed.len(), 2);
        assert!(allowed["Brain region"].contains("DLPFC"));
        assert!(allowed["Group"].contains("Bipolar"));
        assert!(!allowed["Group"].contains("BPD"));

        let mouse = AnalysisConfig::mouse_csds("in.csv", "out.png");
        let allowed = mouse.allow_list();
        assert_eq!(allowed.len(), 1);
        assert!(allowed["Group"].contains("stress/vehicle "));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.columns.value = " ".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField("columns.value"))
        );

        let config = AnalysisConfig::mouse_csds("", "out.png");
        assert_eq!(config.validate(), Err(ConfigError::MissingField("input")));
    }

    #[test]
    fn rejects_unknown_control() {
        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.control = "stress/vehicle ".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownControl("stress/vehicle ".into()))
        );
    }

    #[test]
    fn rejects_region_mismatch() {
        let mut config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        config.regions.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ColumnWithoutRegions(_))
        ));

        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.regions.push("PFC".into());
        assert_eq!(config.validate(), Err(ConfigError::RegionsWithoutColumn));
    }

    #[test]
    fn rejects_bad_figure_settings() {
        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.figure.fills = vec!["white".into()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::FillCount {
                expected: 2,
                found: 1
            })
        );

        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.figure.fills = vec!["white".into(), "chartreuse-ish".into()];
        assert!(matches!(config.validate(), Err(ConfigError::UnknownColor(_))));

        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.figure.dpi = 0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveFigure("dpi")));

        let config = AnalysisConfig::mouse_csds("in.csv", "out.svg");
        assert!(matches!(config.validate(), Err(ConfigError::OutputNotPng(_))));

        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.placement.text_offset = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidOffset));
    }

    #[test]
    fn rejects_single_group_and_duplicates() {
        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.groups.truncate(1);
        config.figure.fills.truncate(1);
        assert_eq!(config.validate(), Err(ConfigError::TooFewGroups(1)));

        let mut config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        config.groups.push(GroupSpec::new("MDD", "MDD"));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateGroup("MDD".into()))
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = AnalysisConfig::human_psychiatric("data/h.csv", "figures/h.png");
        let text = serde_json::to_string_pretty(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("human.json");
        std::fs::write(&path, text).unwrap();

        let loaded = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn font_family_defaults_to_a_named_family() {
        let config = AnalysisConfig::mouse_csds("m.csv", "m.png");
        let mut value = serde_json::to_value(&config).unwrap();
        value["figure"]
            .as_object_mut()
            .unwrap()
            .remove("font_family");
        let loaded: AnalysisConfig = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.figure.font_family, DEFAULT_FONT_FAMILY);

        let mut blank = config;
        blank.figure.font_family = " ".into();
        assert_eq!(
            blank.validate(),
            Err(ConfigError::MissingField("figure.font_family"))
        );
    }
}
