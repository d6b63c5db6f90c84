use log::debug;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::visit::IntoEdgeReferences;

use crate::instance::Instance;

/// Directed weighted graph over vertex ids. Node weight = target id, edge
/// weight = travel length. `StableDiGraph` keeps vertex ids valid across
/// removals, which is what lets branch-and-bound children share the
/// instance-wide id space after copy-on-branch deletions.
pub type VertexGraph = StableDiGraph<u32, f64>;

pub fn node(v: u32) -> NodeIndex {
    NodeIndex::new(v as usize)
}

/// Removes every listed vertex that is still present.
pub fn remove_vertices(graph: &mut VertexGraph, vertices: &[u32]) {
    for &v in vertices {
        if graph.contains_node(node(v)) {
            graph.remove_node(node(v));
        }
    }
}

/// Removes every edge running from a vertex of `from` to a vertex of `to`.
pub fn remove_pair_edges(graph: &mut VertexGraph, from: &[u32], to: &[u32]) {
    for &u in from {
        for &w in to {
            if let Some(e) = graph.find_edge(node(u), node(w)) {
                graph.remove_edge(e);
            }
        }
    }
}

/// Best direct-edge length from the source cluster to every vertex and
/// from every vertex to the destination cluster, then deletion of every
/// vertex whose round trip cannot fit the budget.
///
/// This is a single-edge relaxation, not a shortest path: because the edge
/// lengths obey the triangle inequality, a missing or over-budget direct
/// edge already lower-bounds every detour, so the deletions are safe.
/// Vertices of the source and destination targets themselves are kept.
pub fn prune_over_budget(graph: &mut VertexGraph, instance: &Instance) -> usize {
    let n = instance.num_vertices;
    let mut best_in = vec![f64::INFINITY; n];
    let mut best_out = vec![f64::INFINITY; n];

    for e in graph.edge_references() {
        let u = e.source().index();
        let w = e.target().index();
        let len = *e.weight();
        if instance.target_of_vertex[u] == instance.source_target {
            if len < best_in[w] {
                best_in[w] = len;
            }
        }
        if instance.target_of_vertex[w] == instance.destination_target {
            if len < best_out[u] {
                best_out[u] = len;
            }
        }
    }

    let doomed: Vec<u32> = graph
        .node_indices()
        .filter_map(|idx| {
            let v = idx.index();
            let t = instance.target_of_vertex[v];
            if instance.is_terminal_target(t) {
                return None;
            }
            if best_in[v] + best_out[v] > instance.budget {
                Some(v as u32)
            } else {
                None
            }
        })
        .collect();

    for &v in &doomed {
        graph.remove_node(node(v));
    }
    if !doomed.is_empty() {
        debug!("preprocessing removed {} unreachable vertices", doomed.len());
    }
    doomed.len()
}

/// Vertices of `target` still present in the (possibly reduced) graph.
pub fn live_target_vertices(graph: &VertexGraph, instance: &Instance, target: u32) -> Vec<u32> {
    instance.vertices_in_target[target as usize]
        .iter()
        .copied()
        .filter(|&v| graph.contains_node(node(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{InstanceBuilder, TargetSite};

    fn instance(budget: f64) -> Instance {
        InstanceBuilder {
            sites: vec![
                TargetSite { x: 0.0, y: 0.0, score: 0.0 },
                TargetSite { x: 1.0, y: 0.0, score: 5.0 },
                TargetSite { x: 1.0, y: 4.0, score: 9.0 }, // far detour
                TargetSite { x: 2.0, y: 0.0, score: 0.0 },
            ],
            num_vehicles: 1,
            budget,
            discretizations: 1,
            turn_radius: 1.0,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn prune_removes_targets_whose_round_trip_exceeds_budget() {
        let inst = instance(3.0);
        let mut graph = inst.graph.clone();
        // Target 2 sits 4 units off the line: src -> 2 -> dst needs more
        // than 3.0 of budget (the over-budget direct edges are not even in
        // the graph), so its vertex must go.
        let removed = prune_over_budget(&mut graph, &inst);
        assert_eq!(removed, 1);
        assert!(live_target_vertices(&graph, &inst, 2).is_empty());
        assert!(!live_target_vertices(&graph, &inst, 1).is_empty());
    }

    #[test]
    fn prune_keeps_everything_under_a_loose_budget() {
        let inst = instance(50.0);
        let mut graph = inst.graph.clone();
        assert_eq!(prune_over_budget(&mut graph, &inst), 0);
        assert_eq!(graph.node_count(), inst.num_vertices);
    }

    #[test]
    fn pair_edge_removal_is_directional() {
        let inst = instance(50.0);
        let mut graph = inst.graph.clone();
        let ones = inst.vertices_in_target[1].clone();
        let twos = inst.vertices_in_target[2].clone();
        remove_pair_edges(&mut graph, &ones, &twos);
        assert!(graph.find_edge(node(ones[0]), node(twos[0])).is_none());
        assert!(graph.find_edge(node(twos[0]), node(ones[0])).is_some());
    }

    #[test]
    fn vertex_removal_tolerates_missing_vertices() {
        let inst = instance(50.0);
        let mut graph = inst.graph.clone();
        let ones = inst.vertices_in_target[1].clone();
        remove_vertices(&mut graph, &ones);
        remove_vertices(&mut graph, &ones); // second pass is a no-op
        assert!(live_target_vertices(&graph, &inst, 1).is_empty());
    }
}
