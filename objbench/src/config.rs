use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::{Error, Metric, OnBadSample, Result, Style};

#[cfg(not(windows))]
const DEFAULT_CACHE_COMMAND: Option<&str> = Some("sync; echo 3 | sudo tee /proc/sys/vm/drop_caches");
#[cfg(windows)]
const DEFAULT_CACHE_COMMAND: Option<&str> = None;

const BENCH_NAME: &str = "bench";

#[derive(clap::Parser, Debug)]
#[command(
    version,
    about = "Time fast_obj, rapidobj and tinyobjloader on an .obj file and chart the results."
)]
pub struct Args {
    /// Path to .obj input file
    pub file: PathBuf,

    /// Path to bench executable, or the directory containing it
    #[arg(short, long, value_name = "path", default_value = ".")]
    pub bench: PathBuf,

    /// Output file, or directory to write <file>.svg into
    #[arg(short, long, value_name = "path")]
    pub out: Option<PathBuf>,

    /// Number of iterations per parser
    #[arg(
        short,
        long,
        value_name = "num",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub iterations: u32,

    /// Clear the OS page cache before every iteration (needs sudo)
    #[arg(short, long)]
    pub clear_cache: bool,

    /// Chart style
    #[arg(short, long, value_enum, default_value_t = Style::Default)]
    pub style: Style,

    /// Statistic shown as bar length
    #[arg(long, value_enum, default_value_t = Metric::Average)]
    pub metric: Metric,

    /// Abort the run on unparsable bench output, or skip the sample
    #[arg(long, value_enum, default_value_t = OnBadSample::Abort)]
    pub on_bad_sample: OnBadSample,

    /// Also write a JSON summary to this path
    #[arg(long, value_name = "path")]
    pub report: Option<PathBuf>,

    /// Shell command used to drop the page cache
    #[arg(long, value_name = "cmd")]
    pub cache_command: Option<String>,

    /// Delay before each bench invocation
    #[arg(long, value_name = "ms", default_value_t = 1000)]
    pub settle_ms: u64,

    /// Delay after each iteration
    #[arg(long, value_name = "ms", default_value_t = 2000)]
    pub pause_ms: u64,

    /// Delay between parsers
    #[arg(long, value_name = "ms", default_value_t = 3000)]
    pub cooldown_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pauses {
    pub settle: Duration,
    pub pause: Duration,
    pub cooldown: Duration,
}

impl Pauses {
    pub const NONE: Pauses = Pauses {
        settle: Duration::ZERO,
        pause: Duration::ZERO,
        cooldown: Duration::ZERO,
    };
}

/// Validated settings for one benchmark run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub bench: PathBuf,
    pub file: PathBuf,
    pub iterations: u32,
    pub out: PathBuf,
    pub clear_cache: bool,
    pub cache_command: Option<String>,
    pub style: Style,
    pub metric: Metric,
    pub on_bad_sample: OnBadSample,
    pub report: Option<PathBuf>,
    pub pauses: Pauses,
}

impl RunConfig {
    /// Input file name without its directory, used as the chart title.
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

impl Args {
    pub fn resolve(self) -> Result<RunConfig> {
        let bench = resolve_bench(&self.bench)?;
        check_input(&self.file)?;
        let out = resolve_output(&self.file, self.out.as_deref())?;
        if let Some(report) = &self.report {
            check_report(report)?;
        }

        let config = RunConfig {
            bench,
            file: self.file,
            iterations: self.iterations,
            out,
            clear_cache: self.clear_cache,
            cache_command: self
                .cache_command
                .or_else(|| DEFAULT_CACHE_COMMAND.map(String::from)),
            style: self.style,
            metric: self.metric,
            on_bad_sample: self.on_bad_sample,
            report: self.report,
            pauses: Pauses {
                settle: Duration::from_millis(self.settle_ms),
                pause: Duration::from_millis(self.pause_ms),
                cooldown: Duration::from_millis(self.cooldown_ms),
            },
        };
        debug!(?config, "resolved run configuration");
        Ok(config)
    }
}

/// Locate the bench executable. A directory means `<dir>/bench` (`bench.exe` on Windows).
pub fn resolve_bench(path: &Path) -> Result<PathBuf> {
    let mut bench = path.to_path_buf();
    if bench.is_dir() {
        bench.push(format!("{}{}", BENCH_NAME, std::env::consts::EXE_SUFFIX));
    }
    let bench = std::path::absolute(&bench)?;

    if !bench.exists() {
        return Err(Error::BenchNotFound(bench));
    }
    if !is_executable(&bench) {
        return Err(Error::BenchNotExecutable(bench));
    }
    Ok(bench)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn check_input(file: &Path) -> Result<()> {
    if !file.exists() {
        return Err(Error::InputNotFound(file.to_path_buf()));
    }
    if !file.is_file() {
        return Err(Error::InputNotFile(file.to_path_buf()));
    }
    Ok(())
}

/// Where the chart goes, before any existence check.
///
/// An `out` with an extension names the file exactly, unless it ends in a
/// separator. Any other `out` is a directory that receives `<input stem>.svg`.
/// Without `out` the chart lands next to the input.
pub fn output_path(file: &Path, out: Option<&Path>) -> PathBuf {
    let input_dir = file.parent().unwrap_or(Path::new(""));
    let default_name = file
        .file_name()
        .map(|name| Path::new(name).with_extension("svg"))
        .unwrap_or_else(|| PathBuf::from("out.svg"));

    match out {
        Some(dir) if ends_with_separator(dir) => dir.join(default_name),
        Some(out) if out.extension().is_some() => match out.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => out.to_path_buf(),
            _ => input_dir.join(out),
        },
        Some(dir) => dir.join(default_name),
        None => input_dir.join(default_name),
    }
}

/// `Path` ignores a trailing separator, so `runs.v2/` would otherwise look like a file.
fn ends_with_separator(path: &Path) -> bool {
    let raw = path.as_os_str().to_string_lossy();
    raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR)
}

pub fn resolve_output(file: &Path, out: Option<&Path>) -> Result<PathBuf> {
    let path = output_path(file, out);
    check_parent(&path)?;
    Ok(path)
}

/// The report is a file next to an existing directory, never a directory itself.
pub fn check_report(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(Error::ReportIsDirectory(path.to_path_buf()));
    }
    check_parent(path)
}

/// The directory a file would be written to must already exist.
fn check_parent(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(Error::OutputDirNotFound(dir.to_path_buf()));
    }
    Ok(())
}
