use std::collections::HashSet;

use log::debug;

use topd_core::{graph, Deadline, Duals, Result, Route, SolverError, EPS};
use topd_master::{NodeConstraints, SetCoverSolver};
use topd_pricing::{PricingEngine, PricingInput};

use crate::node::TopNode;

/// Column generation for one node: preprocess the subgraph, then alternate
/// the set-cover LP with the pricing engine until pricing comes back
/// empty, and finish with the 0/1 set cover for the node incumbent.
pub fn solve_node(
    node: &mut TopNode,
    pricing: &mut PricingEngine,
    master: &SetCoverSolver,
    deadline: &Deadline,
) -> Result<()> {
    let instance = node.instance.clone();

    let removed = graph::prune_over_budget(&mut node.graph, &instance);
    if removed > 0 {
        debug!("node {}: preprocessing removed {} vertices", node.id, removed);
    }
    for &t in &node.must_visit_targets {
        if graph::live_target_vertices(&node.graph, &instance, t).is_empty() {
            debug!("node {}: must-visit target {} lost all vertices", node.id, t);
            node.lp_feasible = false;
            node.lp_optimal = true;
            node.lp_objective = f64::NEG_INFINITY;
            return Ok(());
        }
    }

    let constraints = NodeConstraints {
        must_visit_targets: &node.must_visit_targets,
        must_visit_edges: &node.must_visit_target_edges,
    };
    let mut pool: Vec<Route> = Vec::new();
    let mut known: HashSet<Vec<u32>> = HashSet::new();
    let mut duals = Duals::seed(&instance);

    // First pricing run seeds the pool with the zero-dual columns; the
    // loop then re-prices against each LP's duals until nothing new comes
    // back, at which point the last LP is optimal for the node.
    let lp = loop {
        if deadline.expired() {
            return truncate(node);
        }
        let input = PricingInput {
            instance: &instance,
            graph: &node.graph,
            duals: &duals,
            deadline,
        };
        let fresh = pricing.generate(&input)?;
        let mut added = 0usize;
        for route in fresh {
            if known.insert(route.vertex_path.clone()) {
                pool.push(route);
                added += 1;
            }
        }
        if added > 0 && deadline.expired() {
            // An interrupted pricing run proves nothing about optimality.
            return truncate(node);
        }
        let Some(lp) = master.solve_lp(&instance, &pool, &constraints, deadline.remaining_secs())?
        else {
            return truncate(node);
        };
        if added == 0 {
            break lp;
        }
        debug!(
            "node {}: pool {} (+{}), lp {:.4}",
            node.id,
            pool.len(),
            added,
            lp.objective
        );
        duals = lp.duals;
    };

    node.lp_optimal = true;
    node.lp_feasible = lp.feasible;
    if !lp.feasible {
        node.lp_objective = f64::NEG_INFINITY;
        return Ok(());
    }
    node.lp_objective = lp.objective;
    node.lp_integral = lp.integral;
    node.target_reduced_costs = lp.duals.target_costs.clone();
    node.lp_solution = pool
        .iter()
        .zip(&lp.values)
        .filter(|(_, &x)| x > EPS)
        .map(|(r, &x)| (r.clone(), x))
        .collect();

    if lp.integral {
        // The relaxation already is a 0/1 selection; no second solve.
        node.mip_objective = Some(lp.objective);
        node.mip_solution = node
            .lp_solution
            .iter()
            .filter(|(_, x)| *x > 0.5)
            .map(|(r, _)| r.clone())
            .collect();
        return Ok(());
    }

    match master.solve_mip(&instance, &pool, &constraints, deadline.remaining_secs())? {
        Some(mip) => {
            if mip.objective > lp.objective + EPS {
                return Err(SolverError::BoundMonotonicity(format!(
                    "node {}: integer objective {:.6} above its relaxation {:.6}",
                    node.id, mip.objective, lp.objective
                )));
            }
            node.mip_solution = mip.selected.iter().map(|&k| pool[k].clone()).collect();
            node.mip_objective = Some(mip.objective);
        }
        None => {
            node.mip_objective = None;
            node.mip_solution = Vec::new();
        }
    }
    Ok(())
}

/// Deadline hit mid-node: the node proved nothing, so it inherits its
/// parent's bound and is marked non-optimal.
fn truncate(node: &mut TopNode) -> Result<()> {
    node.lp_feasible = true;
    node.lp_optimal = false;
    node.lp_objective = node.parent_lp_objective;
    Ok(())
}
