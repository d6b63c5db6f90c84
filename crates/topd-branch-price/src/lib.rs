//! Branch-and-price for the Dubins team orienteering problem.
//!
//! The generic best-bound coordinator drives [`TopNode`] subproblems; each
//! worker solves nodes by column generation (set-cover master against the
//! DSSR pricing engine) and the coordinator prunes or branches on the
//! returned relaxations.

pub mod colgen;
pub mod node;
mod solver;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use topd_bnb::Coordinator;
use topd_core::{Deadline, Instance, Params, Result, Route, EPS};

pub use node::TopNode;
pub use solver::TopNodeSolver;

/// Final outcome of a branch-and-price run.
#[derive(Debug, Clone)]
pub struct TopReport {
    /// Routes of the best feasible fleet found (empty when nothing beats
    /// the empty selection).
    pub routes: Vec<Route>,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub optimal: bool,
    pub nodes_created: usize,
    pub nodes_solved: usize,
    pub nodes_feasible: usize,
    pub max_parallel: usize,
    pub root_lower_bound: f64,
    pub root_upper_bound: f64,
    pub root_lp_optimal: bool,
    pub elapsed: Duration,
}

/// Runs branch-and-price on the instance under the given parameters.
pub fn solve(instance: Arc<Instance>, params: &Params) -> Result<TopReport> {
    let deadline = Deadline::new(params.time_limit);
    let root = TopNode::root(Arc::clone(&instance));
    let coordinator = Coordinator::new(params.num_workers, EPS);

    info!(
        "branch-and-price over {} targets / {} vertices, {} workers, budget {:.3}",
        instance.num_targets, instance.num_vertices, params.num_workers, instance.budget
    );
    let report = coordinator.run(root, deadline, 0.0, |index| {
        debug!("worker {index} starting");
        TopNodeSolver::new(params)
    })?;

    let (root_lower, root_upper, root_lp_optimal) = report
        .root
        .map(|r| (r.lower, r.upper, r.lp_optimal))
        .unwrap_or((0.0, f64::INFINITY, false));

    info!(
        "search finished: bounds [{:.4}, {:.4}] after {} nodes ({:?})",
        report.lower_bound, report.upper_bound, report.nodes_solved, report.elapsed
    );
    Ok(TopReport {
        routes: report.incumbent.unwrap_or_default(),
        lower_bound: report.lower_bound,
        upper_bound: report.upper_bound,
        optimal: report.optimal,
        nodes_created: report.nodes_created,
        nodes_solved: report.nodes_solved,
        nodes_feasible: report.nodes_feasible,
        max_parallel: report.max_parallel,
        root_lower_bound: root_lower,
        root_upper_bound: root_upper,
        root_lp_optimal,
        elapsed: report.elapsed,
    })
}
