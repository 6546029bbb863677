use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::aggregate::{AggregateRecord, AggregateTable};
use crate::config::{Format, ReportSpec};
use crate::derive::round2;
use crate::error::{ReportError, Result};
use crate::rank::{Ranked, RankedEntry};

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

pub fn format_value(value: Option<f64>, format: Format) -> String {
    let Some(v) = value else {
        return "n/a".to_string();
    };
    let sign = if round2(v) < 0.0 { "-" } else { "" };
    match format {
        Format::Currency => format!("{}${}", sign, group_thousands(v, 2)),
        Format::Percent => format!("{:.2}%", v),
        Format::Count => format!("{}{}", sign, group_thousands(v, 0)),
        Format::Number => format!("{:.2}", v),
    }
}

/// File cell: rounded to 2 decimals, blank when undefined.
pub fn csv_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let rounded = round2(v);
            // avoid writing "-0"
            if rounded == 0.0 {
                "0".to_string()
            } else {
                rounded.to_string()
            }
        }
        None => String::new(),
    }
}

fn label(column: &str) -> String {
    column.replace('_', " ")
}

/// Console name of a partition. Blank key components show as `(blank)`.
fn display_key(record: &AggregateRecord) -> String {
    record
        .key
        .iter()
        .map(|k| if k.is_empty() { "(blank)" } else { k.as_str() })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn write_fields<W: Write>(out: &mut W, spec: &ReportSpec, record: &AggregateRecord, indent: &str) -> io::Result<()> {
    for ((name, format), value) in spec.value_columns().into_iter().zip(&record.values) {
        writeln!(out, "{}{}: {}", indent, label(name), format_value(*value, format))?;
    }
    Ok(())
}

/// Console summary: grand total of the headline column and one block per partition.
pub fn write_summary<W: Write>(out: &mut W, spec: &ReportSpec, table: &AggregateTable) -> io::Result<()> {
    let headline_format = spec
        .value_columns()
        .into_iter()
        .find(|(name, _)| *name == spec.headline)
        .map(|(_, f)| f)
        .unwrap_or(Format::Number);
    let total = table.total(&spec.headline).ok();

    writeln!(out, "=== {} ===", spec.title)?;
    writeln!(out, "{}: {}", label(&spec.headline), format_value(total, headline_format))?;
    writeln!(out, "Partitions: {}", table.records.len())?;

    for record in &table.records {
        writeln!(out)?;
        writeln!(out, "{}:", display_key(record))?;
        write_fields(out, spec, record, "  - ")?;
    }
    Ok(())
}

fn write_entries<W: Write>(out: &mut W, spec: &ReportSpec, entries: &[RankedEntry<'_>]) -> io::Result<()> {
    for (i, entry) in entries.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, display_key(entry.record))?;
        write_fields(out, spec, entry.record, "   ")?;
        writeln!(out)?;
    }
    Ok(())
}

/// Console view of a ranked report: top-N, bottom-N, then the summary figures.
pub fn write_ranked<W: Write>(out: &mut W, spec: &ReportSpec, ranked: &Ranked<'_>) -> io::Result<()> {
    let by = label(&ranked.by);
    let by_format = spec
        .value_columns()
        .into_iter()
        .find(|(name, _)| *name == ranked.by)
        .map(|(_, f)| f)
        .unwrap_or(Format::Number);
    let rule = "-".repeat(50);

    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "=== {} ===", spec.title.to_uppercase())?;
    writeln!(out, "{}", "=".repeat(60))?;

    writeln!(out, "\nTOP {} BY {}:", ranked.n, by.to_uppercase())?;
    writeln!(out, "{}", rule)?;
    write_entries(out, spec, &ranked.top)?;

    writeln!(out, "BOTTOM {} BY {}:", ranked.n, by.to_uppercase())?;
    writeln!(out, "{}", rule)?;
    write_entries(out, spec, &ranked.bottom)?;

    writeln!(out, "=== SUMMARY ===")?;
    writeln!(out, "Partitions Analyzed: {}", ranked.partitions)?;
    writeln!(out, "Total {}: {}", by, format_value(Some(ranked.grand_total), by_format))?;
    match ranked.top_share() {
        Some(share) => writeln!(
            out,
            "Top {} {}: {} ({:.1}% of total)",
            ranked.n,
            by,
            format_value(Some(ranked.top_total()), by_format),
            share
        )?,
        None => writeln!(
            out,
            "Top {} {}: {}",
            ranked.n,
            by,
            format_value(Some(ranked.top_total()), by_format)
        )?,
    }
    if let Some(best) = ranked.best() {
        writeln!(
            out,
            "Best Performing: {} ({})",
            display_key(best.record),
            format_value(best.value, by_format)
        )?;
    }
    if let Some(worst) = ranked.worst() {
        writeln!(
            out,
            "Least Performing: {} ({})",
            display_key(worst.record),
            format_value(worst.value, by_format)
        )?;
    }
    writeln!(
        out,
        "Gap (Best vs Worst): {}",
        format_value(ranked.spread(), by_format)
    )?;
    Ok(())
}

fn write_rows<'a, I>(path: &Path, table: &AggregateTable, records: I) -> csv::Result<()>
where
    I: IntoIterator<Item = &'a AggregateRecord>,
{
    let mut writer = Writer::from_path(path)?;
    writer.write_record(table.key_columns.iter().chain(&table.value_columns))?;

    for record in records {
        let cells = record
            .key
            .iter()
            .cloned()
            .chain(record.values.iter().map(|v| csv_cell(*v)));
        writer.write_record(cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `records` to `path`, key columns first.
///
/// Rows go to a sibling `.tmp` file which replaces `path` only once fully
/// flushed. On failure the temporary file may be left behind and the error
/// names the destination.
pub fn write_csv<'a, I>(path: &Path, table: &AggregateTable, records: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = &'a AggregateRecord>,
{
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let fail = |source: io::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    write_rows(&tmp, table, records).map_err(|e| fail(e.into()))?;
    fs::rename(&tmp, path).map_err(fail)?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rank::rank;

    fn table() -> AggregateTable {
        AggregateTable {
            key_columns: vec!["Product Name".to_string()],
            value_columns: vec!["Total_Revenue".to_string(), "Profit_Margin".to_string()],
            records: vec![
                AggregateRecord {
                    key: vec!["Kettle, steel".to_string()],
                    values: vec![Some(1234.567), Some(12.5)],
                },
                AggregateRecord {
                    key: vec!["Mug".to_string()],
                    values: vec![Some(0.0), None],
                },
            ],
        }
    }

    fn spec() -> ReportSpec {
        let mut spec = Config::builtin()
            .reports
            .into_iter()
            .find(|r| r.name == "product_performance")
            .unwrap();
        spec.aggregates.truncate(1);
        spec.derived = vec![crate::config::DerivedSpec::Margin {
            name: "Profit_Margin".to_string(),
            profit: "Total_Revenue".to_string(),
            revenue: "Total_Revenue".to_string(),
        }];
        spec
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(Some(1234567.891), Format::Currency), "$1,234,567.89");
        assert_eq!(format_value(Some(-1500.0), Format::Currency), "-$1,500.00");
        assert_eq!(format_value(Some(999.999), Format::Currency), "$1,000.00");
        assert_eq!(format_value(Some(12.346), Format::Percent), "12.35%");
        assert_eq!(format_value(Some(12000.0), Format::Count), "12,000");
        assert_eq!(format_value(Some(0.1234), Format::Number), "0.12");
        assert_eq!(format_value(None, Format::Currency), "n/a");
    }

    #[test]
    fn csv_cells_round_late() {
        assert_eq!(csv_cell(Some(1234.567)), "1234.57");
        assert_eq!(csv_cell(Some(3.0)), "3");
        assert_eq!(csv_cell(Some(-0.001)), "0");
        assert_eq!(csv_cell(None), "");
    }

    #[test]
    fn summary_lists_every_partition() {
        let mut out = Vec::new();
        write_summary(&mut out, &spec(), &table()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Total Revenue: $1,234.57"));
        assert!(text.contains("Kettle, steel:\n  - Total Revenue: $1,234.57\n  - Profit Margin: 12.50%"));
        assert!(text.contains("Mug:\n  - Total Revenue: $0.00\n  - Profit Margin: n/a"));
    }

    #[test]
    fn ranked_view_has_top_bottom_and_summary() {
        let t = table();
        let ranked = rank(&t, "Total_Revenue", 1).unwrap();
        let mut out = Vec::new();
        write_ranked(&mut out, &spec(), &ranked).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("TOP 1 BY TOTAL REVENUE:"));
        assert!(text.contains("BOTTOM 1 BY TOTAL REVENUE:"));
        assert!(text.contains("Best Performing: Kettle, steel ($1,234.57)"));
        assert!(text.contains("Least Performing: Mug ($0.00)"));
        assert!(text.contains("(100.0% of total)"));
        assert!(text.contains("Partitions Analyzed: 2\nTotal Total Revenue: $1,234.57\n"));
    }

    #[test]
    fn blank_keys_are_visible_on_the_console() {
        let t = AggregateTable {
            key_columns: vec!["Region".to_string(), "Segment".to_string()],
            value_columns: vec!["Total_Revenue".to_string()],
            records: vec![
                AggregateRecord {
                    key: vec![String::new(), "Corporate".to_string()],
                    values: vec![Some(50.0)],
                },
                AggregateRecord {
                    key: vec!["North".to_string(), "Consumer".to_string()],
                    values: vec![Some(300.0)],
                },
            ],
        };
        let mut spec = spec();
        spec.derived.clear();

        let mut out = Vec::new();
        write_summary(&mut out, &spec, &t).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n(blank) / Corporate:\n"));
        assert!(text.contains("\nNorth / Consumer:\n"));

        let ranked = rank(&t, "Total_Revenue", 1).unwrap();
        let mut out = Vec::new();
        write_ranked(&mut out, &spec, &ranked).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Least Performing: (blank) / Corporate ($50.00)"));

        // file output keeps the raw empty cell
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.csv");
        write_csv(&path, &t, &t.records).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n,Corporate,50\n"));
    }

    #[test]
    fn csv_has_key_columns_first_and_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        fs::write(&path, "stale").unwrap();

        let t = table();
        write_csv(&path, &t, &t.records).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "Product Name,Total_Revenue,Profit_Margin\n\"Kettle, steel\",1234.57,12.5\nMug,0,\n"
        );
        assert!(!dir.path().join("products.csv.tmp").exists());
    }

    #[test]
    fn unwritable_destination_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.csv");
        let t = table();

        match write_csv(&path, &t, &t.records).unwrap_err() {
            ReportError::Write { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
