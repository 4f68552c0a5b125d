use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Record, Table};
use super::DataError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a tabular export from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one value per cell (the GEO-derived exports)
/// * `.json`    – `[{ "Group": "CTRL", "Expression": 1.2, ... }, ...]`
/// * `.parquet` – flat table of string / integer / float / bool columns
pub fn load_file(path: &Path) -> Result<Table, DataError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(DataError::UnsupportedExtension(other.to_string())),
    };

    log::info!(
        "Loaded {} rows ({} columns) from {}",
        table.len(),
        table.column_names.len(),
        path.display()
    );
    for (col, values) in &table.unique_values {
        log::debug!("  column '{col}': {} unique values", values.len());
    }
    Ok(table)
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn malformed(path: &Path, reason: impl ToString) -> DataError {
    DataError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every other row one sample.
/// Cell types are guessed per cell (see [`CellValue::from_text`]).
fn load_csv(path: &Path) -> Result<Table, DataError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(path, format!("reading CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        return Err(malformed(path, "CSV has no header row"));
    }

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| malformed(path, format!("CSV row {row_no}: {e}")))?;

        let rec: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), CellValue::from_text(value)))
            .collect();

        records.push(rec);
    }

    Ok(Table::from_records(records))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Group": "CTRL", "Brain region": "AnCg", "TMEM132D_FPKM": 3.1 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table, DataError> {
    let text = std::fs::read_to_string(path).map_err(|source| DataError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| malformed(path, format!("parsing JSON: {e}")))?;

    let rows = root
        .as_array()
        .ok_or_else(|| malformed(path, "expected top-level JSON array"))?;

    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .ok_or_else(|| malformed(path, format!("row {i} is not a JSON object")))?;

        let rec: Record = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_cell(val)))
            .collect();

        records.push(rec);
    }

    Ok(Table::from_records(records))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one scalar column per attribute.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table, DataError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)
        .map_err(|e| malformed(path, format!("reading parquet metadata: {e}")))?;
    let reader = builder
        .build()
        .map_err(|e| malformed(path, format!("building parquet reader: {e}")))?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.map_err(|e| malformed(path, format!("record batch: {e}")))?;
        let schema = batch.schema();

        let columns: Vec<(String, &Arc<dyn Array>)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(f, col)| (f.name().clone(), col))
            .collect();

        for row in 0..batch.num_rows() {
            let rec: Record = columns
                .iter()
                .map(|(name, col)| (name.clone(), extract_cell(col, row)))
                .collect();
            records.push(rec);
        }
    }

    Ok(Table::from_records(records))
}

// -- Parquet / Arrow helpers --

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::String(s.value(row).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(a.value(row) as i64))
            .unwrap_or(CellValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(a.value(row) as f64))
            .unwrap_or(CellValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row)))
            .unwrap_or(CellValue::Null),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::Builder;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_csv_with_typed_cells() {
        let file = write_temp(
            ".csv",
            "Group,Brain region,TMEM132D_FPKM\nCTRL,AnCg,2.5\nBipolar,DLPFC,4\n",
        );
        let table = load_file(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.records[0].get("Group"),
            Some(&CellValue::String("CTRL".into()))
        );
        assert_eq!(
            table.records[1].get("TMEM132D_FPKM"),
            Some(&CellValue::Integer(4))
        );
        assert!(table.has_column("Brain region"));
    }

    #[test]
    fn csv_keeps_trailing_whitespace_in_labels() {
        let file = write_temp(".csv", "Group,Expression\nstress/vehicle ,1.1\n");
        let table = load_file(file.path()).unwrap();
        assert_eq!(
            table.records[0].get("Group"),
            Some(&CellValue::String("stress/vehicle ".into()))
        );
    }

    #[test]
    fn ragged_csv_is_malformed() {
        let file = write_temp(".csv", "Group,Expression\nCTRL,1.0,extra\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Malformed { .. }));
    }

    #[test]
    fn loads_json_records() {
        let file = write_temp(
            ".json",
            r#"[{"Group": "CTRL", "Expression": 1.25}, {"Group": "CSDS", "Expression": 3}]"#,
        );
        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.records[0].get("Expression"),
            Some(&CellValue::Float(1.25))
        );
        assert_eq!(
            table.records[1].get("Expression"),
            Some(&CellValue::Integer(3))
        );
    }

    #[test]
    fn json_must_be_an_array() {
        let file = write_temp(".json", r#"{"Group": "CTRL"}"#);
        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Malformed { .. }));
    }

    #[test]
    fn loads_parquet_scalar_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Group", DataType::Utf8, false),
            Field::new("Expression", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["CTRL", "CSDS"])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
            ],
        )
        .unwrap();

        let file = Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.records[0].get("Expression"),
            Some(&CellValue::Float(1.5))
        );
        assert_eq!(table.records[1].get("Expression"), Some(&CellValue::Null));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = load_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DataError::Unreadable { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("table.xlsx")).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedExtension(ext) if ext == "xlsx"));
    }
}
