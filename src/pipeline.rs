use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::aggregate::aggregate;
use crate::config::{Config, JoinSpec, ReportSpec};
use crate::derive::derive_metrics;
use crate::error::Result;
use crate::join::left_join;
use crate::loader::{load_table, Table};
use crate::rank::rank;
use crate::report::{write_csv, write_ranked, write_summary};

#[derive(Debug, Clone)]
pub struct Inputs {
    pub sales: PathBuf,
    pub locations: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub encodings: Vec<String>,
    pub delimiter: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub output: PathBuf,
    pub partitions: usize,
    pub rows_written: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub records: usize,
    pub encoding: String,
    pub reports: Vec<(String, Result<ReportOutcome>)>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|(_, r)| r.is_err()).count()
    }
}

fn enrich(sales: Table, join: &JoinSpec, inputs: &Inputs) -> Table {
    if join.columns.iter().all(|c| sales.has_column(c)) {
        return sales;
    }
    let Some(path) = inputs.locations.as_deref() else {
        info!("sales data lacks {:?} and no locations file was given", join.columns);
        return sales;
    };

    let joined = load_table(path, &inputs.encodings, inputs.delimiter)
        .and_then(|locations| left_join(&sales, &locations, &join.on, &join.columns));
    match joined {
        Ok(table) => table,
        Err(e) => {
            warn!("could not enrich sales data from {}: {}", path.display(), e);
            sales
        }
    }
}

/// Runs one report against an already loaded table: aggregate once, derive,
/// optionally rank, print, then persist.
pub fn run_report<W: Write>(spec: &ReportSpec, table: &Table, out_dir: &Path, out: &mut W) -> Result<ReportOutcome> {
    let mut summary = aggregate(table, &spec.group_by, &spec.aggregates)?;
    derive_metrics(&mut summary, &spec.derived, spec.ratio_policy)?;

    let path = out_dir.join(&spec.output);
    let rows_written = match &spec.ranking {
        Some(ranking) => {
            let ranked = rank(&summary, &ranking.by, ranking.n)?;
            write_ranked(out, spec, &ranked)?;
            let rows: Vec<_> = ranked.top.iter().chain(&ranked.bottom).map(|e| e.record).collect();
            write_csv(&path, &summary, rows.iter().copied())?;
            rows.len()
        }
        None => {
            write_summary(out, spec, &summary)?;
            write_csv(&path, &summary, &summary.records)?;
            summary.records.len()
        }
    };

    Ok(ReportOutcome {
        output: path,
        partitions: summary.records.len(),
        rows_written,
    })
}

/// Loads the sales data once and runs every configured report against it.
///
/// Only a failure to load the sales data aborts the run; each report that
/// fails is logged and recorded, and the remaining reports still run.
pub fn run<W: Write>(config: &Config, inputs: &Inputs, out: &mut W) -> Result<RunSummary> {
    fs::create_dir_all(&inputs.out_dir)?;

    let mut sales = load_table(&inputs.sales, &inputs.encodings, inputs.delimiter)?;
    writeln!(out, "Sales data loaded: {} records ({} encoding)", sales.rows.len(), sales.encoding)?;
    writeln!(out, "Columns available: {:?}", sales.headers)?;

    if let Some(join) = &config.join {
        sales = enrich(sales, join, inputs);
    }

    let mut reports = Vec::with_capacity(config.reports.len());
    for spec in &config.reports {
        writeln!(out)?;
        let outcome = run_report(spec, &sales, &inputs.out_dir, out);
        match &outcome {
            Ok(done) => {
                info!("report '{}': {} partitions", spec.name, done.partitions);
                writeln!(out, "\n{} saved to '{}'", spec.title, done.output.display())?;
            }
            Err(e) => {
                error!("report '{}' skipped: {}", spec.name, e);
                writeln!(out, "{} skipped: {}", spec.title, e)?;
            }
        }
        reports.push((spec.name.clone(), outcome));
    }

    Ok(RunSummary {
        records: sales.rows.len(),
        encoding: sales.encoding,
        reports,
    })
}
