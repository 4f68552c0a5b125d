use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the raw table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Stored in `BTreeSet`s downstream, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Guess the type of a raw text cell: integer, float, bool, else string.
    /// Whitespace is significant; `"CTRL "` stays distinct from `"CTRL"`.
    pub fn from_text(s: &str) -> Self {
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }

    /// Numeric view of the cell, used for expression measures.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Textual view of the cell, used to match group and region labels.
    /// Unlike `Display`, floats are printed without rounding.
    pub fn as_label(&self) -> Option<String> {
        match self {
            CellValue::String(s) => Some(s.clone()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Null => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Record / Table – the raw tabular export
// ---------------------------------------------------------------------------

/// One row of the source table: column name → value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub cells: BTreeMap<String, CellValue>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }
}

impl FromIterator<(String, CellValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Record {
            cells: iter.into_iter().collect(),
        }
    }
}

/// The full parsed table with pre-computed column indices.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// All rows, in file order.
    pub records: Vec<Record>,
    /// Sorted list of column names.
    pub column_names: Vec<String>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,
}

impl Table {
    /// Build column indices from the loaded rows.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<CellValue>> = BTreeMap::new();

        for rec in &records {
            for (col, val) in &rec.cells {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names: Vec<String> = column_names_set.into_iter().collect();
        Table {
            records,
            column_names,
            unique_values,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct labels found in `column`, in sorted order.
    pub fn labels(&self, column: &str) -> Vec<String> {
        self.unique_values
            .get(column)
            .map(|values| values.iter().filter_map(CellValue::as_label).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Observation – one typed, filtered sample
// ---------------------------------------------------------------------------

/// One biological sample after filtering and label remapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Index of the source row in the raw table.
    pub row: usize,
    /// Canonical group label (e.g. `SCZ`).
    pub group: String,
    /// Brain region, for datasets with a region column.
    pub region: Option<String>,
    /// Expression measure as read from the file.
    pub raw: f64,
    /// Value that is plotted and tested (log2 of `raw`, or `raw` itself).
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_cell_types() {
        assert_eq!(CellValue::from_text(""), CellValue::Null);
        assert_eq!(CellValue::from_text("12"), CellValue::Integer(12));
        assert_eq!(CellValue::from_text("0.5"), CellValue::Float(0.5));
        assert_eq!(CellValue::from_text("true"), CellValue::Bool(true));
        assert_eq!(
            CellValue::from_text("stress/vehicle "),
            CellValue::String("stress/vehicle ".into())
        );
    }

    #[test]
    fn labels_keep_full_precision() {
        assert_eq!(CellValue::Float(0.123456).as_label().as_deref(), Some("0.123456"));
        assert_eq!(CellValue::Integer(3).as_label().as_deref(), Some("3"));
        assert_eq!(CellValue::Null.as_label(), None);
    }

    #[test]
    fn table_indexes_columns_and_unique_values() {
        let rows = vec![
            Record::from_iter([
                ("Group".to_string(), CellValue::from_text("CTRL")),
                ("Expression".to_string(), CellValue::from_text("1.5")),
            ]),
            Record::from_iter([
                ("Group".to_string(), CellValue::from_text("CTRL")),
                ("Expression".to_string(), CellValue::from_text("2")),
            ]),
        ];
        let table = Table::from_records(rows);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column_names, vec!["Expression", "Group"]);
        assert_eq!(table.unique_values["Group"].len(), 1);
        assert_eq!(table.labels("Group"), vec!["CTRL"]);
        assert_eq!(table.labels("Expression"), vec!["2", "1.5"]);
        assert!(table.labels("Brain region").is_empty());
        assert!(table.has_column("Expression"));
        assert!(!table.has_column("Brain region"));
    }
}
