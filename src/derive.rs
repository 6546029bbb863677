use log::warn;

use crate::aggregate::AggregateTable;
use crate::config::{DerivedSpec, RatioPolicy};
use crate::error::{ReportError, Result};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(
    numerator: Option<f64>,
    denominator: Option<f64>,
    metric: &str,
    key: &str,
    policy: RatioPolicy,
) -> Result<Option<f64>> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Ok(Some(round2(n / d * 100.0))),
        (Some(_), Some(_)) => match policy {
            RatioPolicy::Blank => {
                warn!("{} undefined for '{}': zero denominator", metric, key);
                Ok(None)
            }
            RatioPolicy::Error => Err(ReportError::UndefinedRatio {
                metric: metric.to_string(),
                key: key.to_string(),
            }),
        },
        _ => Ok(None),
    }
}

/// Appends each derived metric to `table` as a new value column, in order.
///
/// Only aggregated values are read; the source rows are never revisited.
/// Profit stays at full precision, margin and share are rounded to 2 decimals.
pub fn derive_metrics(table: &mut AggregateTable, metrics: &[DerivedSpec], policy: RatioPolicy) -> Result<()> {
    for metric in metrics {
        let values: Vec<Option<f64>> = match metric {
            DerivedSpec::Profit { revenue, cost, .. } => {
                let revenue = table.column(revenue)?;
                let cost = table.column(cost)?;
                revenue
                    .into_iter()
                    .zip(cost)
                    .map(|(r, c)| Some(r? - c?))
                    .collect()
            }
            DerivedSpec::Margin {
                name,
                profit,
                revenue,
            } => {
                let profit = table.column(profit)?;
                let revenue = table.column(revenue)?;
                table
                    .records
                    .iter()
                    .zip(profit.into_iter().zip(revenue))
                    .map(|(record, (p, r))| percentage(p, r, name, &record.key_label(), policy))
                    .collect::<Result<Vec<_>>>()?
            }
            DerivedSpec::Share { name, of } => {
                let base = table.column(of)?;
                let total: f64 = base.iter().flatten().sum();
                table
                    .records
                    .iter()
                    .zip(base)
                    .map(|(record, v)| percentage(v, Some(total), name, &record.key_label(), policy))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        table.push_column(metric.name(), values);
    }
    Ok(())
}
