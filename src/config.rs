//! Report definitions.
//!
//! Every report is one `ReportSpec`: which columns to group by, which
//! measures to aggregate, and which derived metrics to compute from the
//! aggregates. The built-in set reproduces the order-mode, product and
//! region/segment summaries; a YAML file can replace it wholesale.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Sum,
    Mean,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Currency,
    Percent,
    Count,
    Number,
}

/// What to do with a ratio whose denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioPolicy {
    /// Leave the cell empty and log a warning.
    #[default]
    Blank,
    /// Fail the report with `UndefinedRatio`.
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregateSpec {
    pub column: String,
    pub stat: Stat,
    pub name: String,
    #[serde(default)]
    pub format: Option<Format>,
}

impl AggregateSpec {
    pub fn new(column: &str, stat: Stat, name: &str) -> Self {
        AggregateSpec {
            column: column.to_string(),
            stat,
            name: name.to_string(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn format(&self) -> Format {
        self.format.unwrap_or(match self.stat {
            Stat::Count => Format::Count,
            Stat::Sum | Stat::Mean => Format::Currency,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DerivedSpec {
    /// `revenue - cost`
    Profit {
        name: String,
        revenue: String,
        cost: String,
    },
    /// `profit / revenue * 100`
    Margin {
        name: String,
        profit: String,
        revenue: String,
    },
    /// `of / sum(of) * 100`
    Share { name: String, of: String },
}

impl DerivedSpec {
    pub fn name(&self) -> &str {
        match self {
            DerivedSpec::Profit { name, .. }
            | DerivedSpec::Margin { name, .. }
            | DerivedSpec::Share { name, .. } => name,
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            DerivedSpec::Profit { revenue, cost, .. } => vec![revenue.as_str(), cost.as_str()],
            DerivedSpec::Margin {
                profit, revenue, ..
            } => vec![profit.as_str(), revenue.as_str()],
            DerivedSpec::Share { of, .. } => vec![of.as_str()],
        }
    }

    pub fn format(&self) -> Format {
        match self {
            DerivedSpec::Profit { .. } => Format::Currency,
            DerivedSpec::Margin { .. } | DerivedSpec::Share { .. } => Format::Percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ranking {
    pub by: String,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportSpec {
    pub name: String,
    pub title: String,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    #[serde(default)]
    pub derived: Vec<DerivedSpec>,
    #[serde(default)]
    pub ratio_policy: RatioPolicy,
    #[serde(default)]
    pub ranking: Option<Ranking>,
    /// Column whose grand total heads the console summary.
    pub headline: String,
    pub output: String,
}

impl ReportSpec {
    /// Output value columns in order: aggregates first, then derived metrics.
    pub fn value_columns(&self) -> Vec<(&str, Format)> {
        self.aggregates
            .iter()
            .map(|a| (a.name.as_str(), a.format()))
            .chain(self.derived.iter().map(|d| (d.name(), d.format())))
            .collect()
    }

    /// Input columns the sales table must carry for this report.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.group_by.iter().map(String::as_str).collect();
        for agg in &self.aggregates {
            if !columns.contains(&agg.column.as_str()) {
                columns.push(&agg.column);
            }
        }
        columns
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| -> Result<()> {
            Err(ReportError::Config(format!("report '{}': {}", self.name, msg)))
        };

        if self.group_by.is_empty() {
            return fail("group_by must name at least one column".to_string());
        }
        if self.aggregates.is_empty() {
            return fail("at least one aggregate is required".to_string());
        }

        let mut known: HashSet<&str> = HashSet::new();
        for agg in &self.aggregates {
            if !known.insert(&agg.name) {
                return fail(format!("duplicate output column '{}'", agg.name));
            }
        }
        for derived in &self.derived {
            for input in derived.inputs() {
                if !known.contains(input) {
                    return fail(format!(
                        "'{}' refers to '{}' which is not defined before it",
                        derived.name(),
                        input
                    ));
                }
            }
            if !known.insert(derived.name()) {
                return fail(format!("duplicate output column '{}'", derived.name()));
            }
        }

        if !known.contains(self.headline.as_str()) {
            return fail(format!("headline '{}' is not an output column", self.headline));
        }
        if let Some(ranking) = &self.ranking {
            if !known.contains(ranking.by.as_str()) {
                return fail(format!("ranking column '{}' is not an output column", ranking.by));
            }
            if ranking.n == 0 {
                return fail("ranking n must be at least 1".to_string());
            }
        }
        if self.output.trim().is_empty() {
            return fail("output file name is empty".to_string());
        }

        Ok(())
    }
}

/// Left join used to bring a region onto sales rows that lack one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinSpec {
    pub on: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub join: Option<JoinSpec>,
    pub reports: Vec<ReportSpec>,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReportError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ReportError::Io(e),
        })?;
        Config::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for report in &self.reports {
            report.validate()?;
            if !names.insert(report.name.as_str()) {
                return Err(ReportError::Config(format!(
                    "duplicate report name '{}'",
                    report.name
                )));
            }
        }
        Ok(())
    }

    pub fn override_top_n(&mut self, n: usize) {
        for ranking in self.reports.iter_mut().filter_map(|r| r.ranking.as_mut()) {
            ranking.n = n;
        }
    }

    pub fn builtin() -> Self {
        Config {
            join: Some(JoinSpec {
                on: "City".to_string(),
                columns: vec!["Region".to_string()],
            }),
            reports: vec![order_mode_report(), product_report(), region_segment_report()],
        }
    }
}

fn profit_metrics(revenue: &str, share: &str) -> Vec<DerivedSpec> {
    vec![
        DerivedSpec::Profit {
            name: "Profit".to_string(),
            revenue: revenue.to_string(),
            cost: "Total_Cost".to_string(),
        },
        DerivedSpec::Margin {
            name: "Profit_Margin".to_string(),
            profit: "Profit".to_string(),
            revenue: revenue.to_string(),
        },
        DerivedSpec::Share {
            name: share.to_string(),
            of: revenue.to_string(),
        },
    ]
}

fn order_mode_report() -> ReportSpec {
    ReportSpec {
        name: "order_mode".to_string(),
        title: "Order Mode Analysis".to_string(),
        group_by: vec!["Order Mode".to_string()],
        aggregates: vec![
            AggregateSpec::new("Sales", Stat::Sum, "Total_Sales"),
            AggregateSpec::new("Sales", Stat::Mean, "Avg_Sales"),
            AggregateSpec::new("Sales", Stat::Count, "Order_Count"),
            AggregateSpec::new("Quantity", Stat::Sum, "Total_Quantity").with_format(Format::Count),
            AggregateSpec::new("Cost Price", Stat::Sum, "Total_Cost"),
            AggregateSpec::new("Discount", Stat::Mean, "Avg_Discount").with_format(Format::Number),
        ],
        derived: profit_metrics("Total_Sales", "Sales_Percentage"),
        ratio_policy: RatioPolicy::Blank,
        ranking: None,
        headline: "Total_Sales".to_string(),
        output: "order_mode_detailed_summary.csv".to_string(),
    }
}

fn product_report() -> ReportSpec {
    ReportSpec {
        name: "product_performance".to_string(),
        title: "Product Performance Analysis by Revenue".to_string(),
        group_by: vec!["Product Name".to_string()],
        aggregates: vec![
            AggregateSpec::new("Sales", Stat::Sum, "Total_Revenue"),
            AggregateSpec::new("Sales", Stat::Mean, "Avg_Revenue_Per_Sale"),
            AggregateSpec::new("Sales", Stat::Count, "Total_Orders"),
            AggregateSpec::new("Quantity", Stat::Sum, "Total_Quantity_Sold")
                .with_format(Format::Count),
            AggregateSpec::new("Cost Price", Stat::Sum, "Total_Cost"),
            AggregateSpec::new("Discount", Stat::Mean, "Avg_Discount").with_format(Format::Number),
        ],
        derived: profit_metrics("Total_Revenue", "Revenue_Percentage"),
        ratio_policy: RatioPolicy::Blank,
        ranking: Some(Ranking {
            by: "Total_Revenue".to_string(),
            n: 5,
        }),
        headline: "Total_Revenue".to_string(),
        output: "product_performance_analysis.csv".to_string(),
    }
}

fn region_segment_report() -> ReportSpec {
    ReportSpec {
        name: "region_segment".to_string(),
        title: "Region and Segment Analysis".to_string(),
        group_by: vec!["Region".to_string(), "Segment".to_string()],
        aggregates: vec![
            AggregateSpec::new("Sales", Stat::Sum, "Total_Sales"),
            AggregateSpec::new("Sales", Stat::Mean, "Avg_Sales"),
            AggregateSpec::new("Sales", Stat::Count, "Order_Count"),
            AggregateSpec::new("Cost Price", Stat::Sum, "Total_Cost"),
        ],
        derived: profit_metrics("Total_Sales", "Sales_Percentage"),
        ratio_policy: RatioPolicy::Blank,
        ranking: None,
        headline: "Total_Sales".to_string(),
        output: "region_segment_summary.csv".to_string(),
    }
}
