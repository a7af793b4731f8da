use std::path::PathBuf;

pub use bench_types::{Aggregate, Metric, OnBadSample, Parser, Style};

pub mod chart;
pub mod config;
pub mod harness;
pub mod report;

use crate::chart::ChartSpec;
use crate::config::RunConfig;
use crate::harness::Subprocess;
use crate::report::Report;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bench executable '{}' does not exist", .0.display())]
    BenchNotFound(PathBuf),

    #[error("bench executable '{}' is not executable", .0.display())]
    BenchNotExecutable(PathBuf),

    #[error("'{}' does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("'{}' is not a file", .0.display())]
    InputNotFile(PathBuf),

    #[error("output directory '{}' does not exist", .0.display())]
    OutputDirNotFound(PathBuf),

    #[error("report path '{}' is a directory", .0.display())]
    ReportIsDirectory(PathBuf),

    #[error("failed to clear page cache: {0}")]
    CacheClear(String),

    #[error("failed to run bench executable '{}': {source}", .bench.display())]
    Spawn {
        bench: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected output from bench executable: {output:?}")]
    UnexpectedOutput { output: String },

    #[error("no usable samples for parser {}", .parser.label())]
    NoSamples { parser: Parser },

    #[error("failed to render chart: {0}")]
    Render(String),

    #[error("failed to write report: {0}")]
    Report(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Measure all three parsers, then write the charts and the optional report.
pub fn run(config: &RunConfig) -> Result<()> {
    let mut invoker = Subprocess::new(&config.bench, config.cache_command.clone());
    let results = harness::run_all(&mut invoker, config)?;
    harness::print_table(&results);

    let title = config.file_name();
    let spec = ChartSpec::new(&title, &results, config.metric);
    chart::render(&spec, &config.out, config.style)?;

    if let Some(path) = &config.report {
        report::write(path, &Report::new(config, &results))?;
    }

    println!("Done");
    Ok(())
}
