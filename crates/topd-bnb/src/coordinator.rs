use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;

use topd_core::{Deadline, Result, SolverError};

use crate::{BranchNode, NodeSolver, RootBounds, SearchReport};

/// Queue entry: best bound first, then lowest id so ties resolve the same
/// way on every run.
struct OpenNode<N> {
    bound: OrderedFloat<f64>,
    id: u64,
    node: N,
}

impl<N: BranchNode> OpenNode<N> {
    fn new(node: N) -> Self {
        OpenNode {
            bound: OrderedFloat(node.parent_bound()),
            id: node.id(),
            node,
        }
    }
}

impl<N> PartialEq for OpenNode<N> {
    fn eq(&self, other: &Self) -> bool {
        self.bound == other.bound && self.id == other.id
    }
}

impl<N> Eq for OpenNode<N> {}

impl<N> PartialOrd for OpenNode<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for OpenNode<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound
            .cmp(&other.bound)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Best-bound driver. `workers` solver threads are spawned per run; `eps`
/// is the optimality tolerance.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub workers: usize,
    pub eps: f64,
}

impl Coordinator {
    pub fn new(workers: usize, eps: f64) -> Self {
        Coordinator {
            workers: workers.max(1),
            eps,
        }
    }

    /// Runs the search to completion (gap closed, tree exhausted, or
    /// deadline). `make_solver` is invoked once inside each worker thread;
    /// the returned solver lives for that worker's whole run.
    pub fn run<N, S, F>(
        &self,
        root: N,
        deadline: Deadline,
        initial_lower: f64,
        make_solver: F,
    ) -> Result<SearchReport<N::Incumbent>>
    where
        N: BranchNode,
        S: NodeSolver<Node = N>,
        F: Fn(usize) -> S + Sync,
    {
        thread::scope(|scope| {
            let (unsolved_tx, unsolved_rx) = bounded::<N>(0);
            let (solved_tx, solved_rx) = bounded::<Result<N>>(0);

            for index in 0..self.workers {
                let rx = unsolved_rx.clone();
                let tx = solved_tx.clone();
                let make = &make_solver;
                scope.spawn(move || worker_loop(index, make, rx, tx, deadline));
            }
            drop(unsolved_rx);
            drop(solved_tx);

            self.drive(root, deadline, initial_lower, unsolved_tx, solved_rx)
        })
    }

    fn drive<N: BranchNode>(
        &self,
        root: N,
        deadline: Deadline,
        initial_lower: f64,
        unsolved_tx: Sender<N>,
        solved_rx: Receiver<Result<N>>,
    ) -> Result<SearchReport<N::Incumbent>> {
        let mut search = Search::<N> {
            eps: self.eps,
            workers: self.workers,
            root_id: root.id(),
            queue: BinaryHeap::new(),
            in_flight: HashMap::new(),
            lower: initial_lower,
            upper: f64::INFINITY,
            incumbent: None,
            nodes_created: 1,
            nodes_solved: 0,
            nodes_feasible: 0,
            max_parallel: 0,
            root: None,
            optimal: false,
        };
        search.queue.push(OpenNode::new(root));

        let outcome = search.event_loop(deadline, &unsolved_tx, &solved_rx);

        // Stop handing out work, then absorb whatever the workers were
        // still solving so the final bounds include it. The drain also
        // unblocks workers parked on their last rendezvous send.
        drop(unsolved_tx);
        let mut drain_error: Option<SolverError> = None;
        while let Ok(message) = solved_rx.recv() {
            match message {
                Ok(node) => search.absorb_drained(node),
                Err(e) => {
                    if drain_error.is_none() {
                        drain_error = Some(e);
                    }
                }
            }
        }
        outcome?;
        if let Some(e) = drain_error {
            return Err(e);
        }
        search.refresh_upper()?;
        Ok(search.into_report(deadline.elapsed()))
    }
}

fn worker_loop<S, F>(
    index: usize,
    make_solver: &F,
    rx: Receiver<S::Node>,
    tx: Sender<Result<S::Node>>,
    deadline: Deadline,
) where
    S: NodeSolver,
    F: Fn(usize) -> S,
{
    let mut solver = make_solver(index);
    while let Ok(mut node) = rx.recv() {
        let outcome = solver.solve(&mut node, &deadline).map(|()| node);
        if tx.send(outcome).is_err() {
            break;
        }
    }
    debug!("worker {index} shutting down");
}

struct Search<N: BranchNode> {
    eps: f64,
    workers: usize,
    root_id: u64,
    queue: BinaryHeap<OpenNode<N>>,
    in_flight: HashMap<u64, f64>,
    lower: f64,
    upper: f64,
    incumbent: Option<N::Incumbent>,
    nodes_created: usize,
    nodes_solved: usize,
    nodes_feasible: usize,
    max_parallel: usize,
    root: Option<RootBounds>,
    optimal: bool,
}

impl<N: BranchNode> Search<N> {
    fn event_loop(
        &mut self,
        deadline: Deadline,
        unsolved_tx: &Sender<N>,
        solved_rx: &Receiver<Result<N>>,
    ) -> Result<()> {
        loop {
            self.dispatch(unsolved_tx)?;
            self.refresh_upper()?;

            if self.upper - self.lower <= self.eps {
                self.optimal = true;
                return Ok(());
            }
            if self.queue.is_empty() && self.in_flight.is_empty() {
                self.optimal = true;
                return Ok(());
            }
            if deadline.expired() {
                debug!("deadline reached with {} nodes in flight", self.in_flight.len());
                return Ok(());
            }

            match solved_rx.recv_timeout(remaining_or_tick(deadline)) {
                Ok(Ok(node)) => self.absorb(node, true)?,
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SolverError::WorkerFailure(
                        "all workers exited while nodes were outstanding".into(),
                    ))
                }
            }
        }
    }

    /// Fills every idle worker slot with the best open nodes. Nodes whose
    /// carried bound can no longer beat the incumbent are discarded at the
    /// pop, so a dispatch never leaves the lower bound above the upper.
    fn dispatch(&mut self, tx: &Sender<N>) -> Result<()> {
        while self.in_flight.len() < self.workers {
            let Some(open) = self.queue.pop() else { break };
            if open.bound.0 <= self.lower + self.eps {
                debug!("node {} dropped before dispatch, bound {:.4}", open.id, open.bound.0);
                continue;
            }
            self.in_flight.insert(open.id, open.bound.0);
            self.max_parallel = self.max_parallel.max(self.in_flight.len());
            debug!(
                "dispatching node {} (bound {:.4}, {} in flight)",
                open.id,
                open.bound.0,
                self.in_flight.len()
            );
            if tx.send(open.node).is_err() {
                return Err(SolverError::WorkerFailure(
                    "worker pool disappeared during dispatch".into(),
                ));
            }
        }
        Ok(())
    }

    /// Upper bound = best of the open queue, the in-flight carried bounds,
    /// and the incumbent. Must never rise beyond tolerance.
    fn refresh_upper(&mut self) -> Result<()> {
        let mut candidate = self.lower;
        if let Some(top) = self.queue.peek() {
            candidate = candidate.max(top.bound.0);
        }
        for &bound in self.in_flight.values() {
            candidate = candidate.max(bound);
        }
        if candidate > self.upper + self.eps {
            return Err(SolverError::BoundMonotonicity(format!(
                "upper bound rose from {:.6} to {:.6}",
                self.upper, candidate
            )));
        }
        self.upper = candidate.min(self.upper);
        Ok(())
    }

    fn absorb(&mut self, node: N, branching_allowed: bool) -> Result<()> {
        let id = node.id();
        self.in_flight.remove(&id);
        self.nodes_solved += 1;
        let is_root = id == self.root_id;

        if !node.lp_feasible() {
            debug!("node {id} pruned: infeasible");
            if is_root {
                self.root = Some(RootBounds {
                    lower: self.lower,
                    upper: self.lower,
                    lp_optimal: true,
                });
            }
            return Ok(());
        }
        self.nodes_feasible += 1;

        let lp = node.lp_objective();
        let truncated = !node.lp_optimal();
        if !truncated && lp > node.parent_bound() + self.eps {
            return Err(SolverError::BoundMonotonicity(format!(
                "node {id} solved to {lp:.6}, above its inherited bound {:.6}",
                node.parent_bound()
            )));
        }

        if let Some(mip) = node.mip_objective() {
            if mip > self.lower + self.eps {
                self.lower = mip;
                self.incumbent = node.incumbent();
                let floor = self.lower + self.eps;
                self.queue.retain(|open| open.bound.0 > floor);
                info!("new incumbent {:.4} from node {}", mip, id);
            }
        }

        if is_root {
            self.root = Some(RootBounds {
                lower: node.mip_objective().unwrap_or(self.lower),
                upper: if truncated { f64::INFINITY } else { lp },
                lp_optimal: !truncated,
            });
        }

        if truncated {
            // Column generation was cut off by the deadline; the node
            // proved nothing, and the run is about to wind down.
            return Ok(());
        }
        if lp <= self.lower + self.eps {
            debug!("node {id} pruned by bound: {lp:.4} vs incumbent {:.4}", self.lower);
            return Ok(());
        }
        if node.lp_integral() {
            debug!("node {id} pruned: integral relaxation");
            return Ok(());
        }
        if let Some(mip) = node.mip_objective() {
            if (lp - mip).abs() <= self.eps {
                debug!("node {id} pruned: integer solution matches the relaxation");
                return Ok(());
            }
        }
        if !branching_allowed {
            return Ok(());
        }

        let children = node.branch();
        if children.is_empty() {
            warn!("node {id} is fractional but produced no children; dropping it");
            return Ok(());
        }
        debug!("node {id} branched into {} children", children.len());
        self.nodes_created += children.len();
        for child in children {
            self.queue.push(OpenNode::new(child));
        }
        Ok(())
    }

    /// Absorb a node that arrived after the search stopped: bounds and
    /// incumbent only, never branching, never fatal.
    fn absorb_drained(&mut self, node: N) {
        if let Err(e) = self.absorb(node, false) {
            warn!("late node ignored during shutdown: {e}");
        }
    }

    fn into_report(self, elapsed: Duration) -> SearchReport<N::Incumbent> {
        SearchReport {
            lower_bound: self.lower,
            upper_bound: self.upper,
            incumbent: self.incumbent,
            optimal: self.optimal,
            nodes_created: self.nodes_created,
            nodes_solved: self.nodes_solved,
            nodes_feasible: self.nodes_feasible,
            max_parallel: self.max_parallel,
            root: self.root,
            elapsed,
        }
    }
}

/// Block until the deadline at the latest, but wake periodically so a
/// stalled channel cannot outlive the limit by much.
fn remaining_or_tick(deadline: Deadline) -> Duration {
    deadline.remaining().min(Duration::from_millis(500)).max(Duration::from_millis(1))
}
