use std::collections::BTreeMap;

use crate::config::{AggregateSpec, Stat};
use crate::error::{ReportError, Result};
use crate::loader::Table;

pub type GroupKey = Vec<String>;

/// One output row: a partition key plus one value per value column.
/// `None` marks a value that is undefined for this partition.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub key: GroupKey,
    pub values: Vec<Option<f64>>,
}

impl AggregateRecord {
    pub fn key_label(&self) -> String {
        self.key.join(" / ")
    }
}

/// Result of grouping a table. Records are ordered by key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    pub key_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub records: Vec<AggregateRecord>,
}

impl AggregateTable {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.value_columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReportError::missing_column(vec![name.to_string()], &self.value_columns))
    }

    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.records.iter().map(|r| r.values[idx]).collect())
    }

    /// Sum of the defined values of a column.
    pub fn total(&self, name: &str) -> Result<f64> {
        Ok(self.column(name)?.into_iter().flatten().sum())
    }

    pub fn push_column(&mut self, name: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.records.len());
        self.value_columns.push(name.to_string());
        for (record, value) in self.records.iter_mut().zip(values) {
            record.values.push(value);
        }
    }
}

#[derive(Default, Clone, Copy)]
struct MeasureAcc {
    sum: f64,
    numeric: usize,
}

/// Parses a measure cell. Blank or non-numeric cells are `None`; a leading
/// `$` and thousands separators are accepted.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = unsigned.strip_prefix('$').unwrap_or(unsigned).replace(',', "");
    // the sign is only accepted once, ahead of any '$'
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return None;
    }

    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Splits row indices into partitions keyed by the values in `key_columns`.
/// Blank key cells form their own partition with an empty component.
pub fn partition(table: &Table, key_columns: &[usize]) -> BTreeMap<GroupKey, Vec<usize>> {
    let mut partitions: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let key: GroupKey = key_columns.iter().map(|&c| row[c].trim().to_string()).collect();
        partitions.entry(key).or_default().push(row_idx);
    }
    partitions
}

/// Groups `table` by `group_by` and evaluates every aggregate per partition.
///
/// Sums and means skip blank or non-numeric cells; counts are partition
/// sizes. Values are kept at full precision.
pub fn aggregate<S: AsRef<str>>(
    table: &Table,
    group_by: &[S],
    aggregates: &[AggregateSpec],
) -> Result<AggregateTable> {
    let mut wanted: Vec<&str> = group_by.iter().map(|g| g.as_ref()).collect();
    wanted.extend(aggregates.iter().map(|a| a.column.as_str()));
    let indices = table.require_columns(&wanted)?;
    let (key_idx, measure_idx) = indices.split_at(group_by.len());

    let records = partition(table, key_idx)
        .into_iter()
        .map(|(key, members)| {
            let mut accs = vec![MeasureAcc::default(); aggregates.len()];
            for &row_idx in &members {
                let row = &table.rows[row_idx];
                for (acc, &col) in accs.iter_mut().zip(measure_idx) {
                    if let Some(v) = parse_number(&row[col]) {
                        acc.sum += v;
                        acc.numeric += 1;
                    }
                }
            }

            let values = aggregates
                .iter()
                .zip(&accs)
                .map(|(spec, acc)| match spec.stat {
                    Stat::Sum => Some(acc.sum),
                    Stat::Mean if acc.numeric > 0 => Some(acc.sum / acc.numeric as f64),
                    Stat::Mean => None,
                    Stat::Count => Some(members.len() as f64),
                })
                .collect();

AggregateRecord { key, values }
        })
        .collect();

    Ok(AggregateTable {
        key_columns: group_by.iter().map(|g| g.as_ref().to_string()).collect(),
        value_columns: aggregates.iter().map(|a| a.name.clone()).collect(),
        records,
    })
}
