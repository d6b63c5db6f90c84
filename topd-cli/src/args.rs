use std::time::Duration;

use clap::Parser;

use topd_core::{Algorithm, DominanceMode, Params, Result, SearchKind, SolverError};

/// Command-line flags. `-rd` is a long option (short flags are single
/// characters); everything else keeps its single-letter short form.
#[derive(Debug, Parser)]
#[command(
    name = "topd",
    version,
    about = "Branch-and-price solver for the team orienteering problem with Dubins vehicles"
)]
pub struct Cli {
    /// Instance file name
    #[arg(short = 'n', long = "name", default_value = "p3.2.k.txt")]
    pub instance_name: String,

    /// Instance folder
    #[arg(short = 'p', long = "path", default_value = "./data/Set_33_234")]
    pub instance_path: String,

    /// Output file path (must end in .yaml)
    #[arg(short = 'o', long = "output", default_value = "./logs/results.yaml")]
    pub output: String,

    /// 1 = branch-and-cut baseline, 2 = branch-and-price
    #[arg(short = 'a', long = "algorithm", default_value_t = 2)]
    pub algorithm: u32,

    /// Cap on negative-reduced-cost columns collected per pricing round
    #[arg(short = 'c', long = "columns", default_value_t = 500)]
    pub column_cap: usize,

    /// Heading discretizations per target
    #[arg(short = 'd', long = "discretizations", default_value_t = 2)]
    pub discretizations: usize,

    /// 0 = one-shot labeling search, 1 = interleaved bidirectional search
    #[arg(short = 'i', long = "interleaved", default_value_t = 0)]
    pub interleaved: u32,

    /// Vehicle turn radius
    #[arg(short = 'r', long = "radius", default_value_t = 1.0)]
    pub turn_radius: f64,

    /// 1 = relaxed label dominance, 0 = strict
    #[arg(long = "rd", default_value_t = 1)]
    pub relaxed_dominance: u32,

    /// Number of worker solvers
    #[arg(short = 's', long = "solvers", default_value_t = 8)]
    pub num_workers: usize,

    /// Wall-clock limit in seconds
    #[arg(short = 't', long = "time-limit", default_value_t = 3600)]
    pub time_limit_seconds: u64,

    /// 1 = track the visited-target count as a dominance dimension
    #[arg(short = 'u', long = "use-visit-count", default_value_t = 0)]
    pub visit_count_dominance: u32,
}

impl Cli {
    /// Validates every flag and assembles the solver parameters. All
    /// failures surface as `InvalidArgument` and a nonzero exit.
    pub fn validate(&self) -> Result<Params> {
        if !self.output.ends_with(".yaml") {
            return Err(SolverError::InvalidArgument(format!(
                "output path {:?} must end in .yaml",
                self.output
            )));
        }
        let algorithm = match self.algorithm {
            1 => Algorithm::BranchAndCut,
            2 => Algorithm::BranchAndPrice,
            other => {
                return Err(SolverError::InvalidArgument(format!(
                    "algorithm must be 1 or 2, got {other}"
                )))
            }
        };
        if algorithm == Algorithm::BranchAndCut {
            return Err(SolverError::InvalidArgument(
                "the branch-and-cut baseline (algorithm 1) is not built into this binary; use algorithm 2".into(),
            ));
        }
        if self.column_cap == 0 {
            return Err(SolverError::InvalidArgument("column cap must be at least 1".into()));
        }
        if self.discretizations == 0 {
            return Err(SolverError::InvalidArgument(
                "discretization count must be at least 1".into(),
            ));
        }
        let search = match self.interleaved {
            0 => SearchKind::Simple,
            1 => SearchKind::Interleaved,
            other => {
                return Err(SolverError::InvalidArgument(format!(
                    "interleaved flag must be 0 or 1, got {other}"
                )))
            }
        };
        if !(self.turn_radius > 0.0) {
            return Err(SolverError::InvalidArgument(format!(
                "turn radius must be positive, got {}",
                self.turn_radius
            )));
        }
        let dominance = match self.relaxed_dominance {
            0 => DominanceMode::Strict,
            1 => DominanceMode::Relaxed,
            other => {
                return Err(SolverError::InvalidArgument(format!(
                    "relaxed-dominance flag must be 0 or 1, got {other}"
                )))
            }
        };
        if self.num_workers == 0 {
            return Err(SolverError::InvalidArgument("worker count must be at least 1".into()));
        }
        if self.time_limit_seconds == 0 {
            return Err(SolverError::InvalidArgument("time limit must be positive".into()));
        }
        let visit_count_dominance = match self.visit_count_dominance {
            0 => false,
            1 => true,
            other => {
                return Err(SolverError::InvalidArgument(format!(
                    "visit-count flag must be 0 or 1, got {other}"
                )))
            }
        };

        Ok(Params {
            algorithm,
            num_workers: self.num_workers,
            column_cap: self.column_cap,
            discretizations: self.discretizations,
            turn_radius: self.turn_radius,
            search,
            dominance,
            visit_count_dominance,
            selection_metric: Params::default().selection_metric,
            time_limit: Duration::from_secs(self.time_limit_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("topd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_validate() {
        let params = parse(&[]).validate().unwrap();
        assert_eq!(params.num_workers, 8);
        assert_eq!(params.column_cap, 500);
        assert_eq!(params.discretizations, 2);
        assert_eq!(params.search, SearchKind::Simple);
        assert_eq!(params.dominance, DominanceMode::Relaxed);
        assert!(!params.visit_count_dominance);
        assert_eq!(params.time_limit, Duration::from_secs(3600));
    }

    #[test]
    fn short_flags_parse() {
        let cli = parse(&[
            "-n", "x.txt", "-p", "./data", "-o", "out.yaml", "-c", "10", "-d", "3", "-i", "1",
            "-r", "0.5", "-s", "2", "-t", "60", "-u", "1",
        ]);
        let params = cli.validate().unwrap();
        assert_eq!(params.search, SearchKind::Interleaved);
        assert_eq!(params.turn_radius, 0.5);
        assert!(params.visit_count_dominance);
        assert_eq!(params.num_workers, 2);
    }

    #[test]
    fn strict_dominance_via_long_flag() {
        let params = parse(&["--rd", "0"]).validate().unwrap();
        assert_eq!(params.dominance, DominanceMode::Strict);
    }

    #[test]
    fn output_must_be_yaml() {
        assert!(parse(&["-o", "results.json"]).validate().is_err());
    }

    #[test]
    fn branch_and_cut_is_rejected() {
        assert!(parse(&["-a", "1"]).validate().is_err());
        assert!(parse(&["-a", "3"]).validate().is_err());
    }

    #[test]
    fn zero_valued_counts_are_rejected() {
        assert!(parse(&["-c", "0"]).validate().is_err());
        assert!(parse(&["-d", "0"]).validate().is_err());
        assert!(parse(&["-s", "0"]).validate().is_err());
        assert!(parse(&["-t", "0"]).validate().is_err());
        assert!(parse(&["-r", "0"]).validate().is_err());
        assert!(parse(&["-i", "2"]).validate().is_err());
        assert!(parse(&["-u", "7"]).validate().is_err());
        assert!(parse(&["--rd", "9"]).validate().is_err());
    }
}
