use std::path::PathBuf;

use clap::Parser;

use super::PipelineConfig;
use crate::statistic::DEFAULT_TOP_K;
use crate::store::BucketFormat;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of workers to run
    #[clap(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: u32,
    /// Root of the record store (raw/ and curated/ live under it)
    #[clap(short, long, default_value = "./data")]
    pub data_root: PathBuf,
    /// Glob spec for the tweet files [default: <DATA_ROOT>/raw/bigTwitter.json]
    #[clap(short, long, default_value = None)]
    pub input: Option<String>,
    /// Region source (suburb-to-region JSON) [default: <DATA_ROOT>/raw/sal.json]
    #[clap(short, long, default_value = None)]
    pub regions: Option<PathBuf>,
    /// Directory the q1/q2/q3 reports are written to
    #[clap(short = 'o', long, default_value = ".")]
    pub report_dir: PathBuf,
    /// Format of the partitioned and joined buckets: parquet or csv
    #[clap(long, default_value = "parquet")]
    pub format: BucketFormat,
    /// Rows kept per report
    #[clap(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        let mut config = PipelineConfig::new(args.data_root, args.workers as usize);
        if let Some(input) = args.input {
            config.input = input;
        }
        if let Some(regions) = args.regions {
            config.regions = regions;
        }
        config.report_dir = args.report_dir;
        config.format = args.format;
        config.top_k = args.top_k;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogPatch;

    #[test]
    fn test_defaults_follow_data_root() {
        let args = Args::parse_from(["gcl-pipeline", "-n", "4", "-d", "/srv/data"]);
        let config = PipelineConfig::from(args);
        assert_eq!(config.workers, 4);
        assert_eq!(config.input, "/srv/data/raw/bigTwitter.json");
        assert_eq!(config.regions, PathBuf::from("/srv/data/raw/sal.json"));
        assert_eq!(config.format, BucketFormat::Parquet);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.patches, CatalogPatch::defaults());
    }

    #[test]
    fn test_explicit_paths_and_format() {
        let args = Args::parse_from([
            "gcl-pipeline",
            "--input",
            "feeds/*.json",
            "--regions",
            "sal.json",
            "--format",
            "csv",
            "-o",
            "out",
        ]);
        let config = PipelineConfig::from(args);
        assert_eq!(config.workers, 1);
        assert_eq!(config.input, "feeds/*.json");
        assert_eq!(config.format, BucketFormat::Csv);
        assert_eq!(config.report_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        assert!(Args::try_parse_from(["gcl-pipeline", "-n", "0"]).is_err());
    }
}
