use anyhow::{bail, Context, Result};

use crate::annotate::{annotate, Annotation, Comparison, GroupSample};
use crate::config::AnalysisConfig;
use crate::data::filter::filtered_indices;
use crate::data::loader::load_file;
use crate::data::model::{Observation, Table};
use crate::data::{transform, DataError};
use crate::plot::jitter::Jitter;
use crate::plot::{render_png, BoxSummary};

// ---------------------------------------------------------------------------
// Figure data + statistics report
// ---------------------------------------------------------------------------

/// Everything an analysis produces before anything is drawn.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub name: String,
    pub control: String,
    /// One panel per region, or a single panel.
    pub panels: Vec<Panel>,
    /// Shared y range of all panels.
    pub y_range: (f64, f64),
    /// Observations that reached statistics and plotting.
    pub n_observations: usize,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: Option<String>,
    /// Region shown in this panel, for region-split datasets.
    pub region: Option<String>,
    /// Groups in display order.
    pub groups: Vec<GroupData>,
    pub comparisons: Vec<Comparison>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct GroupData {
    pub label: String,
    /// Category position on the x axis (0, 1, 2, ...).
    pub position: f64,
    pub values: Vec<f64>,
    /// `None` when the group has no observations in this panel.
    pub summary: Option<BoxSummary>,
    /// Jittered strip points `(x, y)`.
    pub points: Vec<(f64, f64)>,
}

impl AnalysisReport {
    pub fn panel(&self, title: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.title.as_deref() == Some(title))
    }
}

impl Panel {
    pub fn group(&self, label: &str) -> Option<&GroupData> {
        self.groups.iter().find(|g| g.label == label)
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Check columns, keep allow-listed rows, remap group labels and transform
/// the expression measure.
pub fn prepare(config: &AnalysisConfig, table: &Table) -> Result<Vec<Observation>, DataError> {
    let mut required = vec![&config.columns.group, &config.columns.value];
    required.extend(config.columns.region.as_ref());
    for column in required {
        if !table.has_column(column) {
            return Err(DataError::MissingColumn(column.clone()));
        }
    }

    let labels = config.label_map();
    let kept = filtered_indices(table, &config.allow_list());
    log::info!(
        "{}: {} of {} rows pass the group/region filter",
        config.name,
        kept.len(),
        table.len()
    );
    if kept.is_empty() {
        return Err(DataError::NothingSelected {
            column: config.columns.group.clone(),
            found: table.labels(&config.columns.group),
        });
    }

    let mut observations = Vec::with_capacity(kept.len());
    for row in kept {
        let record = &table.records[row];
        let label = |column: &str| record.get(column).and_then(|v| v.as_label());

        let Some(group) = label(config.columns.group.as_str())
            .and_then(|raw| labels.canonicalize(&raw).map(str::to_string))
        else {
            continue;
        };
        let region = config.columns.region.as_deref().and_then(label);

        let cell = record.get(&config.columns.value);
        let raw = cell
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DataError::NotNumeric {
                row,
                column: config.columns.value.clone(),
                found: cell.map(|v| v.to_string()).unwrap_or_default(),
            })?;
        // "NaN" and "inf" parse as floats
        if !(raw.is_finite() && raw >= 0.0) {
            return Err(DataError::InvalidMeasure { row, value: raw });
        }

        observations.push(Observation {
            row,
            group,
            region,
            raw,
            value: raw,
        });
    }

    transform::apply(config.transform, observations)
}

/// Pure analysis: `(raw table, config) → (figure data, statistics)`.
pub fn analyze(config: &AnalysisConfig, table: &Table) -> Result<AnalysisReport> {
    config.validate()?;
    let observations = prepare(config, table)?;
    if observations.is_empty() {
        bail!("{}: no observations left after filtering", config.name);
    }

    let order = config.group_order();
    let style = &config.figure;
    let mut jitter = Jitter::new(style.seed);

    // (region, title) per panel
    let panel_keys: Vec<(Option<&str>, Option<String>)> = if config.regions.is_empty() {
        vec![(None, style.title.clone())]
    } else {
        config
            .regions
            .iter()
            .map(|r| (Some(r.as_str()), Some(r.clone())))
            .collect()
    };

    let mut panels = Vec::with_capacity(panel_keys.len());
    for (region, title) in panel_keys {
        let in_panel: Vec<&Observation> = observations
            .iter()
            .filter(|o| region.is_none() || o.region.as_deref() == region)
            .collect();

        let groups: Vec<GroupData> = order
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let position = i as f64;
                let values: Vec<f64> = in_panel
                    .iter()
                    .filter(|o| o.group == *label)
                    .map(|o| o.value)
                    .collect();
                let points = values
                    .iter()
                    .map(|&v| (position + jitter.offset(style.jitter), v))
                    .collect();
                GroupData {
                    label: label.to_string(),
                    position,
                    summary: BoxSummary::from_values(&values),
                    values,
                    points,
                }
            })
            .collect();

        let panel_max = groups
            .iter()
            .filter_map(|g| g.summary.map(|s| s.max))
            .fold(f64::NEG_INFINITY, f64::max);

        let (comparisons, annotations) = match groups.iter().find(|g| g.label == config.control) {
            Some(control) if panel_max.is_finite() => {
                let others: Vec<GroupSample<'_>> = groups
                    .iter()
                    .filter(|g| g.label != config.control)
                    .map(sample)
                    .collect();
                annotate(
                    sample(control),
                    &others,
                    config.markers,
                    config.placement,
                    panel_max,
                )
            }
            _ => {
                log::warn!(
                    "{}: panel {} has no observations",
                    config.name,
                    title.as_deref().unwrap_or("-")
                );
                (Vec::new(), Vec::new())
            }
        };
        log::debug!(
            "{}: panel {} → {} comparisons, {} markers",
            config.name,
            title.as_deref().unwrap_or("-"),
            comparisons.len(),
            annotations.len()
        );

        panels.push(Panel {
            title,
            region: region.map(str::to_string),
            groups,
            comparisons,
            annotations,
        });
    }

    let y_range = shared_y_range(&observations, &panels, style.y_pad_below, style.y_pad_above);

    Ok(AnalysisReport {
        name: config.name.clone(),
        control: config.control.clone(),
        panels,
        y_range,
        n_observations: observations.len(),
    })
}

fn sample(group: &GroupData) -> GroupSample<'_> {
    GroupSample {
        label: &group.label,
        position: group.position,
        values: &group.values,
    }
}

/// Data extent padded below and above; raised further if a stacked marker
/// would otherwise leave the plot.
fn shared_y_range(
    observations: &[Observation],
    panels: &[Panel],
    pad_below: f64,
    pad_above: f64,
) -> (f64, f64) {
    let (lo, hi) = observations
        .iter()
        .map(|o| o.value)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let highest_marker = panels
        .iter()
        .flat_map(|p| &p.annotations)
        .map(|a| a.y)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut top = hi + pad_above;
    if highest_marker.is_finite() && highest_marker >= top {
        top = highest_marker + pad_above;
    }
    let mut bottom = lo - pad_below;
    if top - bottom <= f64::EPSILON {
        bottom -= 0.5;
        top += 0.5;
    }
    (bottom, top)
}

/// Print the per-comparison statistics to stdout.
pub fn print_report(report: &AnalysisReport) {
    for panel in &report.panels {
        if let Some(region) = &panel.region {
            println!("{region}");
        }
        for comparison in &panel.comparisons {
            if let Some(result) = &comparison.result {
                println!("{}", comparison.group);
                println!("{} {}", result.statistic, result.p_value);
                log::info!(
                    "{}: n = {} vs {}, {:?} p-value, effect size r = {}",
                    comparison.group,
                    comparison.n_control,
                    comparison.n_group,
                    result.method,
                    result
                        .effect_size
                        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
                );
            }
        }
    }
}

/// Load, analyze, report and render one configured analysis.
pub fn run(config: &AnalysisConfig) -> Result<AnalysisReport> {
    config
        .validate()
        .with_context(|| format!("invalid configuration '{}'", config.name))?;

    let table = load_file(&config.input)
        .with_context(|| format!("loading {}", config.input.display()))?;
    let report = analyze(config, &table)?;
    print_report(&report);

    render_png(&report, &config.figure, &config.output)
        .with_context(|| format!("rendering {}", config.output.display()))?;
    log::info!("{}: wrote {}", config.name, config.output.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupSpec;
    use crate::data::model::{CellValue, Record};
    use crate::data::transform::{NonPositivePolicy, Transform};
    use approx::assert_relative_eq;

    fn human_row(group: &str, region: &str, fpkm: &str) -> Record {
        Record::from_iter([
            ("Group".to_string(), CellValue::from_text(group)),
            ("Brain region".to_string(), CellValue::from_text(region)),
            ("TMEM132D_FPKM".to_string(), CellValue::from_text(fpkm)),
        ])
    }

    fn human_table() -> Table {
        let mut rows = Vec::new();
        for (i, v) in ["2", "4", "8", "16"].iter().enumerate() {
            rows.push(human_row("CTRL", "AnCg", v));
            rows.push(human_row("CTRL", "DLPFC", v));
            let high = (32 << i).to_string();
            rows.push(human_row("Schizophrenia", "AnCg", &high));
            rows.push(human_row("Bipolar", "DLPFC", v));
        }
        rows.push(human_row("CTRL", "nAcc", "1024"));
        rows.push(human_row("Unaffected", "AnCg", "1024"));
        Table::from_records(rows)
    }

    #[test]
    fn prepare_filters_remaps_and_transforms() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let obs = prepare(&config, &human_table()).unwrap();

        assert_eq!(obs.len(), 16);
        assert!(obs.iter().all(|o| o.raw < 1024.0));
        assert!(obs.iter().all(|o| o.region.as_deref() != Some("nAcc")));
        assert!(obs.iter().any(|o| o.group == "SCZ"));
        assert!(obs.iter().all(|o| o.group != "Schizophrenia"));
        let first = &obs[0];
        assert_relative_eq!(first.value, 1.0);
    }

    #[test]
    fn missing_column_is_reported_before_transform() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let table = Table::from_records(vec![Record::from_iter([
            ("Group".to_string(), CellValue::from_text("CTRL")),
            ("TMEM132D_FPKM".to_string(), CellValue::from_text("0")),
        ])]);
        let err = prepare(&config, &table).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(c) if c == "Brain region"));
    }

    #[test]
    fn non_numeric_value_is_an_error() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let table = Table::from_records(vec![
            human_row("CTRL", "AnCg", "2"),
            human_row("MDD", "AnCg", "n/a"),
        ]);
        let err = prepare(&config, &table).unwrap_err();
        assert!(matches!(err, DataError::NotNumeric { row: 1, .. }));
    }

    #[test]
    fn zero_fpkm_fails_by_default_and_drops_on_request() {
        let mut config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let table = Table::from_records(vec![
            human_row("CTRL", "AnCg", "2"),
            human_row("MDD", "AnCg", "0"),
        ]);
        assert!(matches!(
            prepare(&config, &table),
            Err(DataError::NonPositive { row: 1, .. })
        ));

        config.transform = Transform::Log2 {
            on_non_positive: NonPositivePolicy::Drop,
        };
        assert_eq!(prepare(&config, &table).unwrap().len(), 1);
    }

    #[test]
    fn human_analysis_marks_only_significant_groups() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let report = analyze(&config, &human_table()).unwrap();

        assert_eq!(report.panels.len(), 2);
        assert_eq!(report.n_observations, 16);

        let ancg = report.panel("AnCg").unwrap();
        let labels: Vec<&str> = ancg.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["CTRL", "MDD", "SCZ", "BPD"]);
        assert!(ancg.group("MDD").unwrap().summary.is_none());

        // MDD and BPD have no AnCg samples: skipped, SCZ is fully separated
        assert_eq!(ancg.comparisons.len(), 3);
        assert_eq!(
            ancg.comparisons.iter().filter(|c| c.result.is_some()).count(),
            1
        );
        assert_eq!(ancg.annotations.len(), 1);
        let marker = &ancg.annotations[0];
        assert_eq!(marker.group, "SCZ");
        assert_eq!(marker.text, "*");
        assert_relative_eq!(marker.x, 2.0);
        // max log2 value in AnCg is log2(256) = 8
        assert_relative_eq!(marker.y, 8.3);

        // DLPFC: BPD has the same values as CTRL → no marker
        let dlpfc = report.panel("DLPFC").unwrap();
        assert!(dlpfc.annotations.is_empty());
        let bpd = dlpfc
            .comparisons
            .iter()
            .find(|c| c.group == "BPD")
            .unwrap();
        assert!(bpd.result.as_ref().unwrap().p_value > 0.05);

        let (lo, hi) = report.y_range;
        assert!(lo < 1.0 && hi > 8.3);
    }

    #[test]
    fn points_are_jittered_around_group_position() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let report = analyze(&config, &human_table()).unwrap();
        let scz = report.panel("AnCg").unwrap().group("SCZ").unwrap();
        assert_eq!(scz.points.len(), 4);
        for &(x, _) in &scz.points {
            assert!((x - 2.0).abs() <= config.figure.jitter);
        }

        let again = analyze(&config, &human_table()).unwrap();
        assert_eq!(
            again.panel("AnCg").unwrap().group("SCZ").unwrap().points,
            scz.points
        );
    }

    #[test]
    fn nothing_left_after_filtering_is_an_error() {
        let config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        let table = Table::from_records(vec![Record::from_iter([
            ("Group".to_string(), CellValue::from_text("stress/drug")),
            ("Expression".to_string(), CellValue::from_text("1.0")),
        ])]);
        assert!(analyze(&config, &table).is_err());
        match prepare(&config, &table).unwrap_err() {
            DataError::NothingSelected { column, found } => {
                assert_eq!(column, "Group");
                assert_eq!(found, vec!["stress/drug"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nan_inf_and_negative_measures_are_rejected() {
        let config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        for bad in ["NaN", "inf", "-3.5"] {
            let table = Table::from_records(vec![
                Record::from_iter([
                    ("Group".to_string(), CellValue::from_text("CTRL")),
                    ("Expression".to_string(), CellValue::from_text("4.0")),
                ]),
                Record::from_iter([
                    ("Group".to_string(), CellValue::from_text("CTRL")),
                    ("Expression".to_string(), CellValue::from_text(bad)),
                ]),
            ]);
            let err = prepare(&config, &table).unwrap_err();
            assert!(
                matches!(err, DataError::InvalidMeasure { row: 1, .. }),
                "{bad}: {err}"
            );
        }
    }

    fn mouse_row(group: &str, value: f64) -> Record {
        Record::from_iter([
            ("Group".to_string(), CellValue::from_text(group)),
            ("Expression".to_string(), CellValue::Float(value)),
        ])
    }

    #[test]
    fn stacked_brackets_raise_the_y_range() {
        let mut config = AnalysisConfig::mouse_csds("in.csv", "out.png");
        config.groups.push(GroupSpec::new("stress/ketamine", "KET"));
        config.figure.fills.push("white".into());
        config.figure.y_pad_above = 0.25;

        let mut rows = Vec::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            rows.push(mouse_row("CTRL", v));
            rows.push(mouse_row("stress/vehicle ", v + 4.0));
            rows.push(mouse_row("stress/ketamine", v + 0.5));
        }
        let report = analyze(&config, &Table::from_records(rows)).unwrap();
        let panel = &report.panels[0];
        assert_eq!(panel.annotations.len(), 2);

        // panel max 8.0; second bracket lifted by 2 * text_offset
        let second = &panel.annotations[1];
        assert_eq!(second.group, "KET");
        assert_relative_eq!(second.bracket.unwrap().y, 8.0 + 0.05 + 0.2, epsilon = 1e-12);
        assert_relative_eq!(second.y, 8.0 + 0.10 + 0.2, epsilon = 1e-12);
        assert_relative_eq!(report.y_range.1, second.y + config.figure.y_pad_above, epsilon = 1e-12);
    }

    #[test]
    fn region_without_control_samples_is_not_tested() {
        let config = AnalysisConfig::human_psychiatric("in.csv", "out.png");
        let table = Table::from_records(vec![
            human_row("CTRL", "AnCg", "2"),
            human_row("CTRL", "AnCg", "4"),
            human_row("MDD", "AnCg", "8"),
            human_row("MDD", "DLPFC", "8"),
            human_row("MDD", "DLPFC", "16"),
        ]);
        let report = analyze(&config, &table).unwrap();
        let dlpfc = report.panel("DLPFC").unwrap();
        assert!(dlpfc.comparisons.iter().all(|c| c.result.is_none()));
        assert!(dlpfc.annotations.is_empty());
    }
}
