use std::collections::HashMap;

use log::{info, warn};

use crate::error::Result;
use crate::loader::Table;

/// Appends `columns` from `lookup` to every row of `base`, matched on `on`.
///
/// Rows of `base` with no match keep their place and get empty cells. When
/// `lookup` holds the same key more than once the first row wins, so the row
/// count of `base` never changes.
pub fn left_join<S: AsRef<str>>(base: &Table, lookup: &Table, on: &str, columns: &[S]) -> Result<Table> {
    let base_key = base.require_columns(&[on])?[0];
    let lookup_key = lookup.require_columns(&[on])?[0];
    let lookup_cols = lookup.require_columns(columns)?;

    let mut index: HashMap<&str, &[String]> = HashMap::with_capacity(lookup.rows.len());
    for row in &lookup.rows {
        index.entry(row[lookup_key].trim()).or_insert(row.as_slice());
    }
    if index.len() < lookup.rows.len() {
        warn!(
            "{} duplicate '{}' keys in lookup table; keeping first occurrence",
            lookup.rows.len() - index.len(),
            on
        );
    }

    let mut headers = base.headers.clone();
    headers.extend(columns.iter().map(|c| c.as_ref().to_string()));

    let mut matched = 0_usize;
    let rows: Vec<Vec<String>> = base
        .rows
        .iter()
        .map(|row| {
            let mut joined = row.clone();
            match index.get(row[base_key].trim()) {
                Some(found) => {
                    matched += 1;
                    joined.extend(lookup_cols.iter().map(|&idx| found[idx].clone()));
                }
                None => joined.extend(lookup_cols.iter().map(|_| String::new())),
            }
            joined
        })
        .collect();

    info!(
        "joined on '{}': matched={} unmatched={}",
        on,
        matched,
        rows.len() - matched
    );

    Ok(Table {
        headers,
        rows,
        encoding: base.encoding.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn unmatched_rows_are_kept_with_empty_region() {
        let sales = table(&["City", "Sales"], &[&["X", "100"], &["Y", "50"]]);
        let locations = table(&["City", "Region"], &[&["X", "North"]]);

        let joined = left_join(&sales, &locations, "City", &["Region"]).unwrap();

        assert_eq!(joined.headers, vec!["City", "Sales", "Region"]);
        assert_eq!(joined.rows.len(), 2);
        assert_eq!(joined.rows[0], vec!["X", "100", "North"]);
        assert_eq!(joined.rows[1], vec!["Y", "50", ""]);
    }

    #[test]
    fn duplicate_lookup_keys_keep_first() {
        let sales = table(&["City"], &[&["X"]]);
        let locations = table(&["City", "Region"], &[&["X", "North"], &["X", "South"]]);

        let joined = left_join(&sales, &locations, "City", &["Region"]).unwrap();
        assert_eq!(joined.rows, vec![vec!["X", "North"]]);
    }

    #[test]
    fn missing_join_column_is_reported() {
        let sales = table(&["Town", "Sales"], &[]);
        let locations = table(&["City", "Region"], &[]);

        let err = left_join(&sales, &locations, "City", &["Region"]).unwrap_err();
        match err {
            ReportError::MissingColumn { missing, available } => {
                assert_eq!(missing, vec!["City"]);
                assert_eq!(available, vec!["Town", "Sales"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
