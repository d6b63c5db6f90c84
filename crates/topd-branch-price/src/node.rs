use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use topd_core::{graph, Instance, Route, VertexGraph, EPS};

/// One branch-and-bound subproblem: a vertex subgraph of the instance plus
/// the must-visit constraint sets accumulated on the way down the tree.
/// Ids come from a shared monotone sequence so queue ties break the same
/// way on every run.
#[derive(Debug)]
pub struct TopNode {
    pub id: u64,
    seq: Arc<AtomicU64>,
    pub instance: Arc<Instance>,
    pub graph: VertexGraph,
    pub must_visit_targets: Vec<u32>,
    pub must_visit_target_edges: Vec<(u32, u32)>,
    pub parent_lp_objective: f64,
    // Filled by the column-generation solver.
    pub lp_feasible: bool,
    pub lp_optimal: bool,
    pub lp_integral: bool,
    pub lp_objective: f64,
    pub lp_solution: Vec<(Route, f64)>,
    pub mip_objective: Option<f64>,
    pub mip_solution: Vec<Route>,
    pub target_reduced_costs: Vec<f64>,
}

impl TopNode {
    pub fn root(instance: Arc<Instance>) -> Self {
        let graph = instance.graph.clone();
        TopNode {
            id: 0,
            seq: Arc::new(AtomicU64::new(1)),
            instance,
            graph,
            must_visit_targets: Vec::new(),
            must_visit_target_edges: Vec::new(),
            parent_lp_objective: f64::INFINITY,
            lp_feasible: false,
            lp_optimal: false,
            lp_integral: false,
            lp_objective: 0.0,
            lp_solution: Vec::new(),
            mip_objective: None,
            mip_solution: Vec::new(),
            target_reduced_costs: Vec::new(),
        }
    }

    /// An unsolved copy inheriting the subgraph, both constraint sets, and
    /// this node's LP objective as its bound.
    fn child(&self) -> Self {
        TopNode {
            id: self.seq.fetch_add(1, Ordering::Relaxed),
            seq: Arc::clone(&self.seq),
            instance: Arc::clone(&self.instance),
            graph: self.graph.clone(),
            must_visit_targets: self.must_visit_targets.clone(),
            must_visit_target_edges: self.must_visit_target_edges.clone(),
            parent_lp_objective: self.lp_objective,
            lp_feasible: false,
            lp_optimal: false,
            lp_integral: false,
            lp_objective: 0.0,
            lp_solution: Vec::new(),
            mip_objective: None,
            mip_solution: Vec::new(),
            target_reduced_costs: Vec::new(),
        }
    }

    fn target_forced(&self, target: u32) -> bool {
        self.instance.is_terminal_target(target) || self.must_visit_targets.contains(&target)
    }

    /// Children of this node, from the fractional structure of its LP
    /// solution: a fractional target if one exists (two children),
    /// otherwise the most fractional target pair (two or three children).
    /// Empty when nothing is fractional.
    pub fn children(&self) -> Vec<TopNode> {
        let inst = &self.instance;
        let mut flow = vec![0.0; inst.num_targets];
        let mut pair_flow: BTreeMap<(u32, u32), f64> = BTreeMap::new();
        for (route, weight) in &self.lp_solution {
            for t in route.visited_targets() {
                flow[t as usize] += weight;
            }
            for pair in route.target_pairs() {
                *pair_flow.entry(pair).or_insert(0.0) += weight;
            }
        }

        let mut fractional_target: Option<(u32, f64)> = None;
        for t in 0..inst.num_targets as u32 {
            if self.target_forced(t) {
                continue;
            }
            let f = flow[t as usize];
            if f > EPS && f < 1.0 - EPS {
                let rc = self
                    .target_reduced_costs
                    .get(t as usize)
                    .copied()
                    .unwrap_or(0.0);
                if fractional_target.map_or(true, |(_, best)| rc < best) {
                    fractional_target = Some((t, rc));
                }
            }
        }
        if let Some((t, _)) = fractional_target {
            debug!("node {}: branching on target {} (flow {:.4})", self.id, t, flow[t as usize]);
            return self.branch_on_target(t);
        }

        let mut fractional_pair: Option<((u32, u32), f64)> = None;
        for (&pair, &f) in &pair_flow {
            if f > EPS && f < 1.0 - EPS {
                let distance = (f - 0.5).abs();
                if fractional_pair.map_or(true, |(_, best)| distance < best) {
                    fractional_pair = Some((pair, distance));
                }
            }
        }
        if let Some((pair, _)) = fractional_pair {
            debug!("node {}: branching on target edge {:?}", self.id, pair);
            return self.branch_on_pair(pair);
        }
        Vec::new()
    }

    fn branch_on_target(&self, target: u32) -> Vec<TopNode> {
        let vertices = &self.instance.vertices_in_target[target as usize];
        let mut without = self.child();
        graph::remove_vertices(&mut without.graph, vertices);
        let mut forced = self.child();
        forced.must_visit_targets.push(target);
        vec![without, forced]
    }

    fn branch_on_pair(&self, pair: (u32, u32)) -> Vec<TopNode> {
        let (from, to) = pair;
        let from_vertices = self.instance.vertices_in_target[from as usize].clone();
        let to_vertices = self.instance.vertices_in_target[to as usize].clone();

        if self.target_forced(from) {
            let mut cut = self.child();
            graph::remove_pair_edges(&mut cut.graph, &from_vertices, &to_vertices);
            let mut forced = self.child();
            forced.must_visit_target_edges.push(pair);
            vec![cut, forced]
        } else {
            let mut without_from = self.child();
            graph::remove_vertices(&mut without_from.graph, &from_vertices);
            let mut from_only = self.child();
            from_only.must_visit_targets.push(from);
            graph::remove_pair_edges(&mut from_only.graph, &from_vertices, &to_vertices);
            let mut both = self.child();
            both.must_visit_targets.push(from);
            both.must_visit_target_edges.push(pair);
            vec![without_from, from_only, both]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topd_core::graph::node;
    use topd_core::{InstanceBuilder, TargetSite};

    /// Five colinear sites, one vertex per target: cluster vertex id ==
    /// target id, pseudo vertices 5 (source) and 6 (destination).
    fn instance() -> Arc<Instance> {
        Arc::new(
            InstanceBuilder {
                sites: (0..5)
                    .map(|i| TargetSite {
                        x: i as f64,
                        y: 0.0,
                        score: if i == 0 || i == 4 { 0.0 } else { 3.0 },
                    })
                    .collect(),
                num_vehicles: 2,
                budget: 100.0,
                discretizations: 1,
                turn_radius: 1.0,
            }
            .build()
            .unwrap(),
        )
    }

    fn route(targets: &[u32], score: f64) -> Route {
        let mut vertex_path = vec![5u32];
        vertex_path.extend_from_slice(targets);
        vertex_path.push(6);
        let mut target_path = vec![0u32];
        target_path.extend_from_slice(targets);
        target_path.push(4);
        Route {
            vertex_path,
            target_path,
            score,
            length: 1.0,
            reduced_cost: -score,
        }
    }

    fn solved_root(instance: Arc<Instance>, lp_solution: Vec<(Route, f64)>) -> TopNode {
        let mut root = TopNode::root(instance);
        root.lp_feasible = true;
        root.lp_optimal = true;
        root.lp_objective = 10.0;
        root.lp_solution = lp_solution;
        root.target_reduced_costs = vec![0.0, -1.0, -5.0, -2.0, 0.0];
        root
    }

    #[test]
    fn fractional_target_gives_delete_and_force_children() {
        let inst = instance();
        // Target 1 is covered fully, targets 2 and 3 half each; target 2
        // has the lowest reduced cost and must be the branching pick.
        let root = solved_root(
            Arc::clone(&inst),
            vec![
                (route(&[0, 1, 2, 4], 6.0), 0.5),
                (route(&[0, 1, 3, 4], 6.0), 0.5),
            ],
        );
        let children = root.children();
        assert_eq!(children.len(), 2);
        let without = &children[0];
        assert!(graph::live_target_vertices(&without.graph, &inst, 2).is_empty());
        assert!(without.must_visit_targets.is_empty());
        let forced = &children[1];
        assert_eq!(forced.must_visit_targets, vec![2]);
        assert_eq!(forced.graph.node_count(), inst.num_vertices);
        for child in &children {
            assert_eq!(child.parent_lp_objective, 10.0);
            assert!(child.id > 0);
        }
    }

    #[test]
    fn integral_targets_fall_back_to_pair_branching() {
        let inst = instance();
        // Same target set in both columns, different interior order: every
        // target flow is 1.0 but the interior pairs split 0.5 / 0.5. The
        // lexicographically first fractional pair is (1, 2), whose tail is
        // not forced, so the branch has three children.
        let root = solved_root(
            Arc::clone(&inst),
            vec![
                (route(&[0, 1, 2, 3, 4], 9.0), 0.5),
                (route(&[0, 1, 3, 2, 4], 9.0), 0.5),
            ],
        );
        let children = root.children();
        assert_eq!(children.len(), 3);

        let without_from = &children[0];
        assert!(graph::live_target_vertices(&without_from.graph, &inst, 1).is_empty());

        let from_only = &children[1];
        assert_eq!(from_only.must_visit_targets, vec![1]);
        assert!(from_only.graph.find_edge(node(1), node(2)).is_none());
        assert!(from_only.graph.find_edge(node(2), node(1)).is_some());
        assert!(from_only.must_visit_target_edges.is_empty());

        let both = &children[2];
        assert_eq!(both.must_visit_targets, vec![1]);
        assert_eq!(both.must_visit_target_edges, vec![(1, 2)]);
        assert!(both.graph.find_edge(node(1), node(2)).is_some());
    }

    #[test]
    fn forced_tail_gets_the_two_child_edge_branch() {
        let inst = instance();
        let mut root = solved_root(
            Arc::clone(&inst),
            vec![
                (route(&[0, 1, 2, 3, 4], 9.0), 0.5),
                (route(&[0, 1, 3, 2, 4], 9.0), 0.5),
            ],
        );
        root.must_visit_targets.push(1);
        let children = root.children();
        assert_eq!(children.len(), 2);
        let cut = &children[0];
        assert!(cut.graph.find_edge(node(1), node(2)).is_none());
        assert_eq!(cut.must_visit_targets, vec![1]);
        let forced = &children[1];
        assert_eq!(forced.must_visit_target_edges, vec![(1, 2)]);
    }

    #[test]
    fn integral_solutions_produce_no_children() {
        let inst = instance();
        let root = solved_root(Arc::clone(&inst), vec![(route(&[0, 1, 2, 4], 6.0), 1.0)]);
        assert!(root.children().is_empty());
    }

    #[test]
    fn ids_are_unique_and_monotone() {
        let inst = instance();
        let root = solved_root(
            Arc::clone(&inst),
            vec![
                (route(&[0, 1, 2, 4], 6.0), 0.5),
                (route(&[0, 1, 3, 4], 6.0), 0.5),
            ],
        );
        let first = root.children();
        let second = root.children();
        let mut ids: Vec<u64> = first.iter().chain(second.iter()).map(|n| n.id).collect();
        let original = ids.clone();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), original.len());
    }
}
