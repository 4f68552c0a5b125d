use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;
use tmem132d_plot::config::{DEFAULT_HUMAN_INPUT, DEFAULT_MOUSE_INPUT};
use tmem132d_plot::plot::jitter::Jitter;

const HUMAN_PARQUET: &str = "data/TMEM132D_human_GSE80655.parquet";

/// Per raw group label: (mean FPKM, relative spread, samples per region).
const HUMAN_GROUPS: [(&str, f64, f64, usize); 5] = [
    ("CTRL", 6.0, 0.25, 12),
    ("MDD", 6.6, 0.25, 11),
    ("Schizophrenia", 8.5, 0.25, 10),
    ("Bipolar", 7.0, 0.30, 10),
    // excluded by the allow-list
    ("Unknown", 5.0, 0.30, 3),
];
const HUMAN_REGIONS: [&str; 3] = ["AnCg", "DLPFC", "nAcc"];

/// Per raw group label: (mean CPM, sd, samples).
const MOUSE_GROUPS: [(&str, f64, f64, usize); 3] = [
    ("CTRL", 42.0, 4.0, 8),
    ("stress/vehicle ", 55.0, 5.0, 8),
    ("stress/ketamine", 47.0, 5.0, 8),
];

struct HumanRow {
    group: &'static str,
    region: &'static str,
    fpkm: f64,
}

fn human_rows(rng: &mut Jitter) -> Vec<HumanRow> {
    let mut rows = Vec::new();
    for region in HUMAN_REGIONS {
        for (group, mean, spread, n) in HUMAN_GROUPS {
            for _ in 0..n {
                // log-normal keeps FPKM strictly positive
                let fpkm = mean * rng.gauss(0.0, spread).exp();
                rows.push(HumanRow { group, region, fpkm });
            }
        }
    }
    rows
}

fn mouse_rows(rng: &mut Jitter) -> Vec<(&'static str, f64)> {
    let mut rows = Vec::new();
    for (group, mean, sd, n) in MOUSE_GROUPS {
        for _ in 0..n {
            rows.push((group, rng.gauss(mean, sd).max(0.0)));
        }
    }
    rows
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

fn write_human_csv(path: &Path, rows: &[HumanRow]) -> Result<()> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Sample", "Group", "Brain region", "TMEM132D_FPKM"])?;
    for (i, row) in rows.iter().enumerate() {
        writer.write_record([
            format!("S{:03}", i + 1),
            row.group.to_string(),
            row.region.to_string(),
            format!("{:.4}", row.fpkm),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_mouse_csv(path: &Path, rows: &[(&str, f64)]) -> Result<()> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Group", "Expression"])?;
    for (group, value) in rows {
        writer.write_record([group.to_string(), format!("{value:.3}")])?;
    }
    writer.flush()?;
    Ok(())
}

fn human_batch(rows: &[HumanRow]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Group", DataType::Utf8, false),
        Field::new("Brain region", DataType::Utf8, false),
        Field::new("TMEM132D_FPKM", DataType::Float64, false),
    ]));
    let groups = StringArray::from(rows.iter().map(|r| r.group).collect::<Vec<_>>());
    let regions = StringArray::from(rows.iter().map(|r| r.region).collect::<Vec<_>>());
    let fpkm = Float64Array::from(rows.iter().map(|r| r.fpkm).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(groups), Arc::new(regions), Arc::new(fpkm)],
    )?)
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    create_parent(path)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = Jitter::new(42);

    let human = human_rows(&mut rng);
    write_human_csv(Path::new(DEFAULT_HUMAN_INPUT), &human)?;
    let batch = human_batch(&human)?;
    write_parquet(Path::new(HUMAN_PARQUET), &batch)?;

    let mouse = mouse_rows(&mut rng);
    write_mouse_csv(Path::new(DEFAULT_MOUSE_INPUT), &mouse)?;

    println!("{}", pretty_format_batches(&[batch.slice(0, 5)])?);
    println!(
        "Wrote {} human rows to {DEFAULT_HUMAN_INPUT} and {HUMAN_PARQUET}",
        human.len()
    );
    println!("Wrote {} mouse rows to {DEFAULT_MOUSE_INPUT}", mouse.len());
    Ok(())
}
