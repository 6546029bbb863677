use std::cmp::Ordering;

use crate::aggregate::{AggregateRecord, AggregateTable};
use crate::error::Result;

/// Descending by value, undefined values last.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// All records sorted by `by` descending. The sort is stable, so ties keep
/// partition key order.
pub fn sorted_desc<'a>(table: &'a AggregateTable, by: &str) -> Result<Vec<(&'a AggregateRecord, Option<f64>)>> {
    let idx = table.column_index(by)?;
    let mut sorted: Vec<_> = table.records.iter().map(|r| (r, r.values[idx])).collect();
    sorted.sort_by(|a, b| descending(a.1, b.1));
    Ok(sorted)
}

#[derive(Debug, Clone)]
pub struct RankedEntry<'a> {
    pub record: &'a AggregateRecord,
    pub value: Option<f64>,
}

/// Top-N and bottom-N of one ranking column, plus the summary figures
/// printed under a ranked report.
///
/// Both subsets are taken from the same descending sort and are themselves in
/// descending order: `bottom.last()` is the weakest partition. When there are
/// fewer than `2 * n` partitions the subsets overlap.
#[derive(Debug, Clone)]
pub struct Ranked<'a> {
    pub by: String,
    pub n: usize,
    pub partitions: usize,
    pub top: Vec<RankedEntry<'a>>,
    pub bottom: Vec<RankedEntry<'a>>,
    pub grand_total: f64,
}

impl<'a> Ranked<'a> {
    pub fn top_total(&self) -> f64 {
        self.top.iter().filter_map(|e| e.value).sum()
    }

    /// Share of the grand total held by the top-N, or `None` when the total is zero.
    pub fn top_share(&self) -> Option<f64> {
        if self.grand_total == 0.0 {
            None
        } else {
            Some(self.top_total() / self.grand_total * 100.0)
        }
    }

    pub fn best(&self) -> Option<&RankedEntry<'a>> {
        self.top.first()
    }

    pub fn worst(&self) -> Option<&RankedEntry<'a>> {
        self.bottom.last()
    }

    /// Gap between the best and the worst partition.
    pub fn spread(&self) -> Option<f64> {
        Some(self.best()?.value? - self.worst()?.value?)
    }
}

pub fn rank<'a>(table: &'a AggregateTable, by: &str, n: usize) -> Result<Ranked<'a>> {
    let sorted = sorted_desc(table, by)?;
    let grand_total = table.total(by)?;

    let entry = |&(record, value): &(&'a AggregateRecord, Option<f64>)| RankedEntry { record, value };
    let top = sorted.iter().take(n).map(entry).collect();
    let bottom = sorted[sorted.len().saturating_sub(n)..].iter().map(entry).collect();

    Ok(Ranked {
        by: by.to_string(),
        n,
        partitions: sorted.len(),
        top,
        bottom,
        grand_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: &[(&str, Option<f64>)]) -> AggregateTable {
        AggregateTable {
            key_columns: vec!["Product Name".to_string()],
            value_columns: vec!["Total_Revenue".to_string()],
            records: values
                .iter()
                .map(|(key, v)| AggregateRecord {
                    key: vec![key.to_string()],
                    values: vec![*v],
                })
                .collect(),
        }
    }

    fn keys(entries: &[RankedEntry<'_>]) -> Vec<String> {
        entries.iter().map(|e| e.record.key_label()).collect()
    }

    fn eight() -> AggregateTable {
        table(&[
            ("A", Some(50.0)),
            ("B", Some(80.0)),
            ("C", Some(10.0)),
            ("D", Some(80.0)),
            ("E", Some(30.0)),
            ("F", Some(5.0)),
            ("G", Some(60.0)),
            ("H", Some(10.0)),
        ])
    }

    #[test]
    fn top_and_bottom_three_of_eight() {
        let t = eight();
        let ranked = rank(&t, "Total_Revenue", 3).unwrap();

        assert_eq!(keys(&ranked.top), vec!["B", "D", "G"]);
        assert_eq!(keys(&ranked.bottom), vec!["C", "H", "F"]);
        assert_eq!(ranked.partitions, 8);
        assert_eq!(ranked.grand_total, 325.0);
        assert_eq!(ranked.top_total(), 220.0);
        assert_eq!(ranked.spread(), Some(75.0));
        assert_eq!(ranked.worst().map(|e| e.record.key_label()), Some("F".to_string()));
    }

    #[test]
    fn small_sets_overlap_without_dedup() {
        let t = table(&[("A", Some(1.0)), ("B", Some(2.0)), ("C", Some(3.0))]);
        let ranked = rank(&t, "Total_Revenue", 2).unwrap();

        assert_eq!(keys(&ranked.top), vec!["C", "B"]);
        assert_eq!(keys(&ranked.bottom), vec!["B", "A"]);
    }

    #[test]
    fn n_larger_than_partitions_returns_everything() {
        let t = table(&[("A", Some(1.0)), ("B", Some(2.0))]);
        let ranked = rank(&t, "Total_Revenue", 5).unwrap();
        assert_eq!(keys(&ranked.top), vec!["B", "A"]);
        assert_eq!(keys(&ranked.bottom), vec!["B", "A"]);
    }

    #[test]
    fn undefined_values_sort_last() {
        let t = table(&[("A", None), ("B", Some(2.0)), ("C", Some(-1.0))]);
        let sorted = sorted_desc(&t, "Total_Revenue").unwrap();
        let order: Vec<_> = sorted.iter().map(|(r, _)| r.key_label()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);

        let ranked = rank(&t, "Total_Revenue", 1).unwrap();
        assert_eq!(ranked.spread(), None);
    }

    #[test]
    fn zero_total_has_no_top_share() {
        let t = table(&[("A", Some(0.0))]);
        let ranked = rank(&t, "Total_Revenue", 1).unwrap();
        assert_eq!(ranked.top_share(), None);
    }
}
