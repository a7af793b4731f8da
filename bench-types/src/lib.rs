use serde::{Deserialize, Serialize};

/// The OBJ parsers the bench executable can exercise, in chart order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parser {
    Fast = 0,
    Rapid = 1,
    Tiny = 2,
}

impl Parser {
    pub const ALL: [Parser; 3] = [Parser::Fast, Parser::Rapid, Parser::Tiny];

    /// Value passed to `bench --parser`.
    pub fn id(self) -> &'static str {
        match self {
            Parser::Fast => "fast",
            Parser::Rapid => "rapid",
            Parser::Tiny => "tiny",
        }
    }

    /// Name of the library, as shown in output and on the chart.
    pub fn label(self) -> &'static str {
        match self {
            Parser::Fast => "fast_obj",
            Parser::Rapid => "rapidobj",
            Parser::Tiny => "tinyobjloader",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which chart variants to write.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Default,
    Light,
    Dark,
    Both,
}

/// Which statistic the bar length shows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Average,
    Minimum,
}

/// What to do when the bench executable reports something unparsable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnBadSample {
    Abort,
    Skip,
}

/// Reduced timings for one parser, in milliseconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub min: u64,
    pub average: f64,
    pub stdev: f64,
    pub samples: usize,
    pub skipped: usize,
}

impl Aggregate {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Average => self.average,
            Metric::Minimum => self.min as f64,
        }
    }
}
