use std::collections::{BTreeMap, BTreeSet};

use super::model::Table;

// ---------------------------------------------------------------------------
// Allow-list: which labels are kept per column
// ---------------------------------------------------------------------------

/// Per-column selection: maps column_name → set of accepted labels.
/// Columns absent from the map are unconstrained.
pub type AllowList = BTreeMap<String, BTreeSet<String>>;

/// Build an allow-list from `(column, labels)` pairs.
pub fn allow_list<'a, I, L>(entries: I) -> AllowList
where
    I: IntoIterator<Item = (&'a str, L)>,
    L: IntoIterator,
    L::Item: AsRef<str>,
{
    entries
        .into_iter()
        .map(|(col, labels)| {
            let set = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
            (col.to_string(), set)
        })
        .collect()
}

/// Return indices of rows that pass every column constraint.
///
/// A row passes a column constraint when:
/// * The column is not present in `allowed` → passes (no constraint)
/// * The allowed set for that column is empty → nothing selected → fails
/// * The row has no (or a null) value for that column → fails
/// * The row's label for that column is in the allowed set → passes
pub fn filtered_indices(table: &Table, allowed: &AllowList) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            allowed.iter().all(|(col, labels)| {
                rec.get(col)
                    .and_then(|v| v.as_label())
                    .is_some_and(|label| labels.contains(&label))
            })
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Label map: raw group label → canonical short label
// ---------------------------------------------------------------------------

/// Fixed lookup table from raw labels to canonical display labels.
///
/// Canonical labels map to themselves, so [`LabelMap::canonicalize`] is
/// idempotent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    mapping: BTreeMap<String, String>,
}

impl LabelMap {
    pub fn new<I, R, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: Into<String>,
    {
        LabelMap {
            mapping: pairs
                .into_iter()
                .map(|(raw, canonical)| (raw.into(), canonical.into()))
                .collect(),
        }
    }

    /// Canonical label for `label`, or `None` if it is neither a known raw
    /// label nor already canonical.
    pub fn canonicalize<'a>(&'a self, label: &'a str) -> Option<&'a str> {
        if let Some(canonical) = self.mapping.get(label) {
            return Some(canonical.as_str());
        }
        self.mapping
            .values()
            .any(|c| c == label)
            .then_some(label)
    }

    /// Raw labels accepted by this map (the group allow-list).
    pub fn raw_labels(&self) -> impl Iterator<Item = &str> {
        self.mapping.keys().map(String::as_str)
    }
}
