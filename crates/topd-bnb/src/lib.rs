//! Parallel best-bound branch and bound.
//!
//! The coordinator owns the open-node priority queue, the global bound
//! pair, and the incumbent; a fixed pool of workers receives nodes over a
//! rendezvous channel, solves their relaxation, and sends them back. The
//! node type and its per-worker solver are trait parameters, so the same
//! driver runs both the orienteering pricing stack and the toy problems
//! used to sanity-check the search itself.

mod coordinator;

use std::time::Duration;

use topd_core::{Deadline, Result};

pub use coordinator::Coordinator;

/// A subproblem in the branch-and-bound tree.
///
/// A node is created unsolved, carrying only its inherited bound; a
/// [`NodeSolver`] fills in the relaxation attributes, after which the
/// coordinator reads them to prune or branch. Ids must be unique and
/// monotone within one search (they break ties in the best-bound order).
pub trait BranchNode: Send + Sized + 'static {
    /// Payload of a feasible solution carried back to the caller.
    type Incumbent: Send + Clone + 'static;

    fn id(&self) -> u64;

    /// Upper bound inherited from the parent; `f64::INFINITY` at the root.
    fn parent_bound(&self) -> f64;

    /// Valid after solving: false when the node's constraints are
    /// unsatisfiable.
    fn lp_feasible(&self) -> bool;

    /// False when the relaxation was truncated (deadline); the node's
    /// objective is then not a proven bound and the inherited bound stands.
    fn lp_optimal(&self) -> bool;

    fn lp_objective(&self) -> f64;

    fn lp_integral(&self) -> bool;

    /// Objective of the node-local integer solution, if one was found.
    fn mip_objective(&self) -> Option<f64>;

    /// The node-local integer solution payload.
    fn incumbent(&self) -> Option<Self::Incumbent>;

    /// Children for the branching step. Called only on solved, feasible,
    /// non-integral, non-fathomed nodes.
    fn branch(&self) -> Vec<Self>;
}

/// Per-worker solver. One value lives for the whole run of one worker
/// thread, so expensive handles (LP backends, pricing scratch space) are
/// created once and reused across nodes.
pub trait NodeSolver {
    type Node: BranchNode;

    fn solve(&mut self, node: &mut Self::Node, deadline: &Deadline) -> Result<()>;
}

/// Bounds observed at the root node.
#[derive(Debug, Clone, Copy)]
pub struct RootBounds {
    pub lower: f64,
    pub upper: f64,
    pub lp_optimal: bool,
}

/// Outcome of a branch-and-bound run.
#[derive(Debug, Clone)]
pub struct SearchReport<I> {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub incumbent: Option<I>,
    /// True when the gap closed or the tree was exhausted; false on
    /// deadline.
    pub optimal: bool,
    pub nodes_created: usize,
    pub nodes_solved: usize,
    pub nodes_feasible: usize,
    pub max_parallel: usize,
    pub root: Option<RootBounds>,
    pub elapsed: Duration,
}

impl<I> SearchReport<I> {
    pub fn gap(&self) -> f64 {
        if !self.upper_bound.is_finite() {
            return f64::INFINITY;
        }
        (self.upper_bound - self.lower_bound).max(0.0)
    }
}
