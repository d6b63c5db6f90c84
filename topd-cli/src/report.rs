use std::fs;
use std::path::Path;

use serde::Serialize;

use topd_branch_price::TopReport;
use topd_core::{Params, Result, SearchKind, SolverError, EPS};

use crate::args::Cli;

/// A bound that may be infinite; infinity is written as the literal
/// string `infinity` in the results file.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Finite(f64),
    Unbounded(&'static str),
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Bound::Finite(value)
        } else {
            Bound::Unbounded("infinity")
        }
    }
}

fn gap_percentage(lower: f64, upper: f64) -> f64 {
    if !upper.is_finite() {
        100.0
    } else if upper.abs() <= EPS {
        0.0
    } else {
        100.0 * (upper - lower) / upper
    }
}

/// The YAML result map written at the end of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub instance_name: String,
    pub instance_path: String,
    pub algorithm: u8,
    pub time_limit_in_seconds: u64,
    pub turn_radius: f64,
    pub number_of_discretizations: usize,
    pub number_of_reduced_cost_columns: usize,
    pub number_of_solver_coroutines: usize,
    pub search: SearchKind,
    pub budget: f64,
    pub root_lower_bound: f64,
    pub root_upper_bound: Bound,
    pub root_lp_optimal: bool,
    pub root_gap_percentage: f64,
    pub final_lower_bound: f64,
    pub final_upper_bound: Bound,
    pub final_gap_percentage: f64,
    pub optimality_reached: bool,
    pub number_of_nodes_solved: usize,
    pub maximum_parallel_solves: usize,
    pub solution_time_in_seconds: f64,
}

impl RunSummary {
    pub fn new(cli: &Cli, params: &Params, budget: f64, report: &TopReport) -> Self {
        RunSummary {
            instance_name: cli.instance_name.clone(),
            instance_path: cli.instance_path.clone(),
            algorithm: params.algorithm.code(),
            time_limit_in_seconds: cli.time_limit_seconds,
            turn_radius: params.turn_radius,
            number_of_discretizations: params.discretizations,
            number_of_reduced_cost_columns: params.column_cap,
            number_of_solver_coroutines: params.num_workers,
            search: params.search,
            budget,
            root_lower_bound: report.root_lower_bound,
            root_upper_bound: report.root_upper_bound.into(),
            root_lp_optimal: report.root_lp_optimal,
            root_gap_percentage: gap_percentage(report.root_lower_bound, report.root_upper_bound),
            final_lower_bound: report.lower_bound,
            final_upper_bound: report.upper_bound.into(),
            final_gap_percentage: gap_percentage(report.lower_bound, report.upper_bound),
            optimality_reached: report.optimal,
            number_of_nodes_solved: report.nodes_solved,
            maximum_parallel_solves: report.max_parallel,
            solution_time_in_seconds: report.elapsed.as_secs_f64(),
        }
    }
}

/// Serializes the summary and writes it, creating parent directories as
/// needed.
pub fn write(summary: &RunSummary, path: &Path) -> Result<()> {
    let rendered = serde_yaml::to_string(summary)
        .map_err(|e| SolverError::InvalidArgument(format!("cannot render results: {e}")))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                SolverError::InvalidArgument(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
    }
    fs::write(path, rendered).map_err(|e| {
        SolverError::InvalidArgument(format!("cannot write {}: {e}", path.display()))
    })
}
