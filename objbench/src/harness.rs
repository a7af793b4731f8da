use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::{Aggregate, Error, OnBadSample, Parser, Result};

/// Line prefix the bench executable reports its timing with.
pub const PREFIX: &str = "Parse time [ms]:";

/// Side effects of one measurement iteration.
pub trait Invoker {
    fn clear_cache(&mut self) -> Result<()>;

    /// Run the bench executable once and return its stdout.
    fn invoke(&mut self, parser: Parser, file: &Path) -> Result<String>;
}

/// Runs the real bench executable as a child process.
pub struct Subprocess {
    bench: PathBuf,
    cache_command: Option<String>,
}

impl Subprocess {
    pub fn new(bench: &Path, cache_command: Option<String>) -> Self {
        Self {
            bench: bench.to_path_buf(),
            cache_command,
        }
    }
}

impl Invoker for Subprocess {
    fn clear_cache(&mut self) -> Result<()> {
        let command = self
            .cache_command
            .as_deref()
            .ok_or_else(|| Error::CacheClear("no cache command for this platform".into()))?;

        debug!(command, "clearing page cache");
        let status = shell(command)
            .stdout(Stdio::null())
            .status()
            .map_err(|e| Error::CacheClear(format!("{}: {}", command, e)))?;

        if !status.success() {
            return Err(Error::CacheClear(format!("{} exited with {}", command, status)));
        }
        Ok(())
    }

    fn invoke(&mut self, parser: Parser, file: &Path) -> Result<String> {
        let start = Instant::now();
        let output = Command::new(&self.bench)
            .arg("--parser")
            .arg(parser.id())
            .arg(file)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| Error::Spawn {
                bench: self.bench.clone(),
                source,
            })?;

        debug!(
            parser = parser.id(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "bench finished"
        );
        if !output.status.success() {
            warn!(parser = parser.id(), status = %output.status, "bench exited unsuccessfully");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Pull the timing out of the first line starting with [`PREFIX`].
/// Zero is treated as a reporting anomaly, not a sample.
pub fn parse_time(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|line| line.strip_prefix(PREFIX))?
        .trim()
        .parse::<NonZeroU64>()
        .ok()
        .map(NonZeroU64::get)
}

/// Min, mean and sample standard deviation (n - 1). One sample has a deviation of 0.
pub fn summarize(samples: &[u64], skipped: usize) -> Option<Aggregate> {
    let min = *samples.iter().min()?;
    let n = samples.len();
    let average = samples.iter().sum::<u64>() as f64 / n as f64;

    let stdev = if n > 1 {
        let sum_sq: f64 = samples
            .iter()
            .map(|&t| {
                let d = t as f64 - average;
                d * d
            })
            .sum();
        (sum_sq / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(Aggregate {
        min,
        average,
        stdev,
        samples: n,
        skipped,
    })
}

/// Run `config.iterations` timed invocations for one parser.
pub fn measure<I: Invoker>(invoker: &mut I, parser: Parser, config: &RunConfig) -> Result<Aggregate> {
    let mut times = Vec::with_capacity(config.iterations as usize);
    let mut skipped = 0;

    for i in 1..=config.iterations {
        if config.clear_cache {
            invoker.clear_cache()?;
        }
        thread::sleep(config.pauses.settle);

        let output = invoker.invoke(parser, &config.file)?;
        match parse_time(&output) {
            Some(t) => {
                times.push(t);
                println!("Iteration {}: {}ms", i, t);
            }
            None => match config.on_bad_sample {
                OnBadSample::Abort => return Err(Error::UnexpectedOutput { output }),
                OnBadSample::Skip => {
                    warn!(parser = parser.id(), iteration = i, ?output, "skipping sample");
                    skipped += 1;
                    println!("Iteration {}: skipped, unexpected output {:?}", i, output);
                }
            },
        }

        thread::sleep(config.pauses.pause);
    }

    let agg = summarize(&times, skipped).ok_or(Error::NoSamples { parser })?;

    println!("Minimum: {}ms", agg.min);
    println!("Average: {:.2}ms", agg.average);
    println!("Standard Deviation: {:.2}", agg.stdev);

    Ok(agg)
}

/// Measure every parser in order, cooling down between them.
pub fn run_all<I: Invoker>(invoker: &mut I, config: &RunConfig) -> Result<Vec<(Parser, Aggregate)>> {
    println!();
    println!("Parsing '{}'", config.file_name());

    let mut results = Vec::with_capacity(Parser::ALL.len());
    for (i, parser) in Parser::ALL.into_iter().enumerate() {
        if i > 0 {
            thread::sleep(config.pauses.cooldown);
        }
        println!();
        println!("Using parser: {}", parser.label());
        results.push((parser, measure(invoker, parser, config)?));
    }
    Ok(results)
}

/// Print a comparison table to stdout.
pub fn print_table(results: &[(Parser, Aggregate)]) {
    let name_w = 16;
    let col_w = 12;

    println!();
    println!(
        "{:<name_w$} {:>col_w$} {:>col_w$} {:>col_w$} {:>8}",
        "Parser", "Minimum", "Average", "Std Dev", "Samples",
        name_w = name_w, col_w = col_w
    );
    println!("{}", "-".repeat(name_w + col_w * 3 + 8 + 4));

    for (parser, agg) in results {
        let samples_str = if agg.skipped > 0 {
            format!("{}/{}", agg.samples, agg.samples + agg.skipped)
        } else {
            format!("{}", agg.samples)
        };

        println!(
            "{:<name_w$} {:>col_w$} {:>col_w$} {:>col_w$} {:>8}",
            parser.label(),
            format!("{}ms", agg.min),
            format!("{:.1}ms", agg.average),
            format!("{:.1}", agg.stdev),
            samples_str,
            name_w = name_w, col_w = col_w
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pauses;
    use crate::{Metric, Style};
    use std::collections::VecDeque;

    struct Scripted {
        outputs: VecDeque<String>,
        calls: Vec<Parser>,
        clears: usize,
        fail_clear: bool,
    }

    impl Scripted {
        fn new(outputs: &[&str]) -> Self {
            Self {
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                calls: Vec::new(),
                clears: 0,
                fail_clear: false,
            }
        }
    }

    impl Invoker for Scripted {
        fn clear_cache(&mut self) -> Result<()> {
            if self.fail_clear {
                return Err(Error::CacheClear("permission denied".into()));
            }
            self.clears += 1;
            Ok(())
        }

        fn invoke(&mut self, parser: Parser, _file: &Path) -> Result<String> {
            self.calls.push(parser);
            Ok(self.outputs.pop_front().unwrap_or_default())
        }
    }

    fn config(iterations: u32) -> RunConfig {
        RunConfig {
            bench: PathBuf::from("/opt/bench"),
            file: PathBuf::from("models/bunny.obj"),
            iterations,
            out: PathBuf::from("models/bunny.svg"),
            clear_cache: false,
            cache_command: None,
            style: Style::Default,
            metric: Metric::Average,
            on_bad_sample: OnBadSample::Abort,
            report: None,
            pauses: Pauses::NONE,
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("Parse time [ms]:42"), Some(42));
        assert_eq!(parse_time("Loading...\nParse time [ms]: 17\n"), Some(17));
        assert_eq!(parse_time("Parse time [ms]: 9\r\n"), Some(9));
        // First matching line wins
        assert_eq!(parse_time("Parse time [ms]:5\nParse time [ms]:6"), Some(5));
    }

    #[test]
    fn test_parse_time_rejects_bad_output() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("Error: parser not recognized"), None);
        assert_eq!(parse_time("  Parse time [ms]:42"), None);
        assert_eq!(parse_time("Parse time [ms]:fast"), None);
        assert_eq!(parse_time("Parse time [ms]:-3"), None);
        assert_eq!(parse_time("Parse time [ms]:0"), None);
    }

    #[test]
    fn test_summarize_single_sample() {
        let agg = summarize(&[42], 0).unwrap();
        assert_eq!(agg.min, 42);
        assert_eq!(agg.average, 42.0);
        assert_eq!(agg.stdev, 0.0);
        assert_eq!(agg.samples, 1);
    }

    #[test]
    fn test_summarize_sample_stdev() {
        let agg = summarize(&[2, 4, 4, 4, 5, 5, 7, 9], 0).unwrap();
        assert_eq!(agg.min, 2);
        assert_eq!(agg.average, 5.0);
        // 32 / (8 - 1)
        assert!((agg.stdev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);

        let flat = summarize(&[7, 7, 7], 0).unwrap();
        assert_eq!(flat.stdev, 0.0);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[], 3).is_none());
    }

    #[test]
    fn test_measure_records_samples() {
        let mut invoker = Scripted::new(&[
            "Parse time [ms]:42",
            "Parse time [ms]:40",
            "Parse time [ms]:44",
        ]);
        let agg = measure(&mut invoker, Parser::Rapid, &config(3)).unwrap();

        assert_eq!(invoker.calls, vec![Parser::Rapid; 3]);
        assert_eq!(invoker.clears, 0);
        assert_eq!(agg.min, 40);
        assert_eq!(agg.average, 42.0);
        assert!((agg.stdev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_measure_clears_cache_every_iteration() {
        let mut invoker = Scripted::new(&["Parse time [ms]:1", "Parse time [ms]:2"]);
        let mut cfg = config(2);
        cfg.clear_cache = true;

        measure(&mut invoker, Parser::Fast, &cfg).unwrap();
        assert_eq!(invoker.clears, 2);
    }

    #[test]
    fn test_measure_cache_failure_is_fatal() {
        let mut invoker = Scripted::new(&["Parse time [ms]:1"]);
        invoker.fail_clear = true;
        let mut cfg = config(1);
        cfg.clear_cache = true;
        cfg.on_bad_sample = OnBadSample::Skip;

        let err = measure(&mut invoker, Parser::Fast, &cfg).unwrap_err();
        assert!(matches!(err, Error::CacheClear(_)));
        assert!(invoker.calls.is_empty());
    }

    #[test]
    fn test_measure_aborts_on_unexpected_output() {
        let mut invoker = Scripted::new(&["Parse time [ms]:10", "segfault", "Parse time [ms]:10"]);
        let err = measure(&mut invoker, Parser::Tiny, &config(3)).unwrap_err();

        match err {
            Error::UnexpectedOutput { output } => assert_eq!(output, "segfault"),
            other => panic!("expected UnexpectedOutput, got {:?}", other),
        }
        assert_eq!(invoker.calls.len(), 2);
    }

    #[test]
    fn test_measure_skip_policy() {
        let mut invoker = Scripted::new(&["Parse time [ms]:10", "garbage", "Parse time [ms]:20"]);
        let mut cfg = config(3);
        cfg.on_bad_sample = OnBadSample::Skip;

        let agg = measure(&mut invoker, Parser::Tiny, &cfg).unwrap();
        assert_eq!(agg.samples, 2);
        assert_eq!(agg.skipped, 1);
        assert_eq!(agg.average, 15.0);

        let mut invoker = Scripted::new(&["nope", "nope"]);
        let err = measure(&mut invoker, Parser::Tiny, &config_skip(2)).unwrap_err();
        assert!(matches!(err, Error::NoSamples { parser: Parser::Tiny }));
    }

    fn config_skip(iterations: u32) -> RunConfig {
        let mut cfg = config(iterations);
        cfg.on_bad_sample = OnBadSample::Skip;
        cfg
    }

    #[test]
    fn test_run_all_in_parser_order() {
        let mut invoker = Scripted::new(&[
            "Parse time [ms]:30",
            "Parse time [ms]:10",
            "Parse time [ms]:50",
        ]);
        let results = run_all(&mut invoker, &config(1)).unwrap();

        assert_eq!(invoker.calls, Parser::ALL.to_vec());
        let mins: Vec<u64> = results.iter().map(|(_, agg)| agg.min).collect();
        assert_eq!(mins, vec![30, 10, 50]);
        assert_eq!(results[0].0, Parser::Fast);
    }
}
