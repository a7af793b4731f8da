use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::RunConfig;
use crate::{Aggregate, Metric, Parser, Result};

#[derive(Serialize, Debug)]
pub struct Report {
    pub file: String,
    pub iterations: u32,
    pub clear_cache: bool,
    pub metric: Metric,
    pub parsers: Vec<ParserReport>,
}

#[derive(Serialize, Debug)]
pub struct ParserReport {
    pub parser: Parser,
    pub label: &'static str,
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

impl Report {
    pub fn new(config: &RunConfig, results: &[(Parser, Aggregate)]) -> Self {
        Self {
            file: config.file_name(),
            iterations: config.iterations,
            clear_cache: config.clear_cache,
            metric: config.metric,
            parsers: results
                .iter()
                .map(|(parser, agg)| ParserReport {
                    parser: *parser,
                    label: parser.label(),
                    aggregate: agg.clone(),
                })
                .collect(),
        }
    }
}

pub fn write(path: &Path, report: &Report) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut out, report)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pauses;
    use crate::{OnBadSample, Style};
    use std::path::PathBuf;

    #[test]
    fn test_report_shape() {
        let config = RunConfig {
            bench: PathBuf::from("/opt/bench"),
            file: PathBuf::from("models/bunny.obj"),
            iterations: 2,
            out: PathBuf::from("models/bunny.svg"),
            clear_cache: true,
            cache_command: None,
            style: Style::Default,
            metric: Metric::Minimum,
            on_bad_sample: OnBadSample::Abort,
            report: None,
            pauses: Pauses::NONE,
        };
        let agg = Aggregate {
            min: 8,
            average: 9.0,
            stdev: 1.4142,
            samples: 2,
            skipped: 0,
        };
        let report = Report::new(&config, &[(Parser::Rapid, agg)]);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["file"], "bunny.obj");
        assert_eq!(value["metric"], "minimum");
        assert_eq!(value["clear_cache"], true);
        assert_eq!(value["parsers"][0]["parser"], "rapid");
        assert_eq!(value["parsers"][0]["label"], "rapidobj");
        assert_eq!(value["parsers"][0]["min"], 8);
        assert_eq!(value["parsers"][0]["samples"], 2);
    }
}
