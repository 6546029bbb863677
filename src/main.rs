use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use retail_summary::config::Config;
use retail_summary::loader::DEFAULT_ENCODINGS;
use retail_summary::pipeline::{run, Inputs};

#[derive(Debug, Parser)]
#[command(name = "retail-summary", about = "Grouped sales summaries from delimited retail data")]
struct Args {
    /// Sales dataset
    #[arg(long)]
    sales: PathBuf,

    /// Store locations dataset used to add a region to sales rows
    #[arg(long)]
    locations: Option<PathBuf>,

    /// YAML report definitions; the built-in reports are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the summary files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Candidate text encodings, tried in order
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_ENCODINGS.map(String::from))]
    encodings: Vec<String>,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Override N for every ranked report
    #[arg(long)]
    top_n: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got '{}'", args.delimiter);
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::builtin(),
    };
    if let Some(n) = args.top_n {
        config.override_top_n(n);
        config.validate()?;
    }

    let inputs = Inputs {
        sales: args.sales,
        locations: args.locations,
        out_dir: args.out_dir,
        encodings: args.encodings,
        delimiter: args.delimiter as u8,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = run(&config, &inputs, &mut out)
        .with_context(|| format!("processing {}", inputs.sales.display()))?;
    out.flush()?;

    info!(
        "summary completed | records={} encoding={} reports={} skipped={}",
        summary.records,
        summary.encoding,
        summary.reports.len(),
        summary.failed()
    );

    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
