//! The restricted master problem: a set-cover LP/MIP over the current
//! column pool.
//!
//! One variable per route in [0,1] (binary in the MIP), a route-cap row
//! bounding the fleet size, at-most-one cover rows per priced target, and
//! equality rows for the branch-and-bound must-visit constraints. The
//! equality rows carry penalized artificial slacks so the LP stays
//! feasible during column generation; a slack still positive once pricing
//! is exhausted proves the node infeasible.

use std::collections::HashMap;

use highs::{HighsModelStatus, RowProblem, Sense};
use log::{debug, warn};

use topd_core::{Duals, Instance, Result, Route, SolverError, EPS};

/// Must-visit constraint sets of one branch-and-bound node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeConstraints<'a> {
    pub must_visit_targets: &'a [u32],
    pub must_visit_edges: &'a [(u32, u32)],
}

impl NodeConstraints<'_> {
    pub fn is_empty(&self) -> bool {
        self.must_visit_targets.is_empty() && self.must_visit_edges.is_empty()
    }
}

/// LP relaxation outcome over the pool.
#[derive(Debug, Clone)]
pub struct LpOutcome {
    /// Route-score objective (slack penalties excluded).
    pub objective: f64,
    /// False when an artificial slack stayed active: the node's must-visit
    /// constraints cannot be met by any fractional selection of the pool.
    pub feasible: bool,
    /// Value of each pool route, in pool order.
    pub values: Vec<f64>,
    pub duals: Duals,
    pub integral: bool,
}

/// Integer outcome over the pool; `None` when the 0/1 set cover is
/// infeasible or hit its time slice.
#[derive(Debug, Clone)]
pub struct MipOutcome {
    pub objective: f64,
    pub selected: Vec<usize>,
}

/// Long-lived per-worker handle to the master solver. HiGHS models are
/// built per call; the handle carries the shared tuning.
#[derive(Debug, Clone)]
pub struct SetCoverSolver {
    quiet: bool,
}

impl Default for SetCoverSolver {
    fn default() -> Self {
        SetCoverSolver { quiet: true }
    }
}

impl SetCoverSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn penalty(instance: &Instance) -> f64 {
        2.0 * instance.target_scores.iter().sum::<f64>() + 10.0
    }

    /// Solves the LP relaxation and recovers the dual information the
    /// pricing engine needs. `None` means the solve was cut off by its
    /// time slice — the caller treats the node as truncated, not failed.
    pub fn solve_lp(
        &self,
        instance: &Instance,
        pool: &[Route],
        constraints: &NodeConstraints,
        time_limit: f64,
    ) -> Result<Option<LpOutcome>> {
        if pool.is_empty() {
            // Nothing to select: the zero solution, with seed duals. Any
            // must-visit constraint is unsatisfiable at this point.
            return Ok(Some(LpOutcome {
                objective: 0.0,
                feasible: constraints.is_empty(),
                values: Vec::new(),
                duals: Duals::seed(instance),
                integral: true,
            }));
        }

        let penalty = Self::penalty(instance);
        let mut pb = RowProblem::default();
        let route_cols: Vec<_> = pool
            .iter()
            .map(|r| pb.add_column(r.score, 0.0..=1.0))
            .collect();

        // Row 0: the route cap.
        let cap: Vec<_> = route_cols.iter().map(|&c| (c, 1.0)).collect();
        pb.add_row(..=(instance.num_vehicles as f64), &cap);
        let mut next_row = 1usize;

        // At-most-one rows for every covered, unforced target.
        let mut target_rows: Vec<(u32, usize)> = Vec::new();
        for t in 0..instance.num_targets as u32 {
            if instance.is_terminal_target(t) || constraints.must_visit_targets.contains(&t) {
                continue;
            }
            let coefs: Vec<_> = pool
                .iter()
                .enumerate()
                .filter(|(_, r)| r.visits_target(t))
                .map(|(k, _)| (route_cols[k], 1.0))
                .collect();
            if coefs.is_empty() {
                continue;
            }
            pb.add_row(..=1.0, &coefs);
            target_rows.push((t, next_row));
            next_row += 1;
        }

        // Exactly-one rows for the must-visit constraints, each with its
        // own penalized artificial slack. The slacks land after the route
        // columns, so the primal slice splits cleanly.
        for &t in constraints.must_visit_targets {
            let mut coefs: Vec<_> = pool
                .iter()
                .enumerate()
                .filter(|(_, r)| r.visits_target(t))
                .map(|(k, _)| (route_cols[k], 1.0))
                .collect();
            coefs.push((pb.add_column(-penalty, 0.0..=1.0), 1.0));
            pb.add_row(1.0..=1.0, &coefs);
            target_rows.push((t, next_row));
            next_row += 1;
        }
        let mut edge_rows: Vec<((u32, u32), usize)> = Vec::new();
        for &pair in constraints.must_visit_edges {
            let mut coefs: Vec<_> = pool
                .iter()
                .enumerate()
                .filter(|(_, r)| r.traverses_pair(pair))
                .map(|(k, _)| (route_cols[k], 1.0))
                .collect();
            coefs.push((pb.add_column(-penalty, 0.0..=1.0), 1.0));
            pb.add_row(1.0..=1.0, &coefs);
            edge_rows.push((pair, next_row));
            next_row += 1;
        }

        let mut model = pb.optimise(Sense::Maximise);
        if self.quiet {
            model.set_option("output_flag", false);
        }
        model.set_option("parallel", "off");
        model.set_option("time_limit", time_limit.max(1.0));

        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {}
            HighsModelStatus::ReachedTimeLimit => {
                warn!("set-cover LP hit its time slice");
                return Ok(None);
            }
            status => {
                return Err(SolverError::Master(format!(
                    "set-cover LP ended with status {status:?}"
                )))
            }
        }
        let solution = solved.get_solution();
        let columns = solution.columns();
        let row_duals = solution.dual_rows();

        let values: Vec<f64> = columns[..pool.len()].to_vec();
        let slacks = &columns[pool.len()..];
        let feasible = slacks.iter().all(|&s| s <= EPS);
        let objective: f64 = pool.iter().zip(&values).map(|(r, &x)| r.score * x).sum();
        let integral = values.iter().all(|&x| x <= EPS || (1.0 - x).abs() <= EPS);

        let mut target_costs: Vec<f64> = instance.target_scores.iter().map(|s| -s).collect();
        for &(t, row) in &target_rows {
            target_costs[t as usize] = row_duals[row] - instance.target_scores[t as usize];
        }
        let mut edge_duals = HashMap::new();
        for &(pair, row) in &edge_rows {
            edge_duals.insert(pair, row_duals[row]);
        }
        let duals = Duals {
            vehicle_cover: row_duals[0],
            target_costs,
            edge_duals,
        };

        debug!(
            "LP over {} columns: objective {:.4}, {}integral, feasible={}",
            pool.len(),
            objective,
            if integral { "" } else { "not " },
            feasible
        );
        Ok(Some(LpOutcome {
            objective,
            feasible,
            values,
            duals,
            integral,
        }))
    }

    /// Solves the 0/1 set cover over the final pool for a node incumbent.
    pub fn solve_mip(
        &self,
        instance: &Instance,
        pool: &[Route],
        constraints: &NodeConstraints,
        time_limit: f64,
    ) -> Result<Option<MipOutcome>> {
        if pool.is_empty() {
            return Ok(if constraints.is_empty() {
                Some(MipOutcome {
                    objective: 0.0,
                    selected: Vec::new(),
                })
            } else {
                None
            });
        }
        // A must-visit constraint nothing in the pool can serve is a
        // guaranteed infeasibility; skip the solver call.
        for &t in constraints.must_visit_targets {
            if !pool.iter().any(|r| r.visits_target(t)) {
                return Ok(None);
            }
        }
        for &pair in constraints.must_visit_edges {
            if !pool.iter().any(|r| r.traverses_pair(pair)) {
                return Ok(None);
            }
        }

        let mut pb = RowProblem::default();
        let route_cols: Vec<_> = pool
            .iter()
            .map(|r| pb.add_integer_column(r.score, 0.0..=1.0))
            .collect();

        let cap: Vec<_> = route_cols.iter().map(|&c| (c, 1.0)).collect();
        pb.add_row(..=(instance.num_vehicles as f64), &cap);

        for t in 0..instance.num_targets as u32 {
            if instance.is_terminal_target(t) {
                continue;
            }
            let coefs: Vec<_> = pool
                .iter()
                .enumerate()
                .filter(|(_, r)| r.visits_target(t))
                .map(|(k, _)| (route_cols[k], 1.0))
                .collect();
            if coefs.is_empty() {
                continue;
            }
            if constraints.must_visit_targets.contains(&t) {
                pb.add_row(1.0..=1.0, &coefs);
            } else {
                pb.add_row(..=1.0, &coefs);
            }
        }
        for &pair in constraints.must_visit_edges {
            let coefs: Vec<_> = pool
                .iter()
                .enumerate()
                .filter(|(_, r)| r.traverses_pair(pair))
                .map(|(k, _)| (route_cols[k], 1.0))
                .collect();
            pb.add_row(1.0..=1.0, &coefs);
        }

        let mut model = pb.optimise(Sense::Maximise);
        if self.quiet {
            model.set_option("output_flag", false);
        }
        model.set_option("parallel", "off");
        model.set_option("time_limit", time_limit.max(1.0));

        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {}
            HighsModelStatus::Infeasible => return Ok(None),
            HighsModelStatus::ReachedTimeLimit => {
                warn!("set-cover MIP hit its time slice; dropping the node incumbent");
                return Ok(None);
            }
            status => {
                return Err(SolverError::Master(format!(
                    "set-cover MIP ended with status {status:?}"
                )))
            }
        }
        let solution = solved.get_solution();
        let selected: Vec<usize> = solution.columns()[..pool.len()]
            .iter()
            .enumerate()
            .filter(|(_, &x)| x > 0.5)
            .map(|(k, _)| k)
            .collect();
        let objective: f64 = selected.iter().map(|&k| pool[k].score).sum();
        Ok(Some(MipOutcome {
            objective,
            selected,
        }))
    }
}
