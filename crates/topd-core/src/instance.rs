use std::f64::consts::PI;

use log::debug;
use petgraph::graph::NodeIndex;

use crate::dubins::{self, Pose};
use crate::error::{Result, SolverError};
use crate::graph::VertexGraph;
use crate::params::Params;

/// One line of an instance file: a target location and its reward.
#[derive(Debug, Clone, Copy)]
pub struct TargetSite {
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// The immutable problem description shared by every worker.
///
/// Each target is a cluster of heading-discretized vertices; the source
/// and destination targets additionally contain one pseudo vertex wired to
/// their cluster with zero-weight connectors, so every route runs pseudo
/// source vertex -> ... -> pseudo destination vertex. Vertex ids equal
/// their `NodeIndex` in `graph`, and the node weight is the vertex's
/// target id.
#[derive(Debug)]
pub struct Instance {
    pub budget: f64,
    pub num_vehicles: usize,
    pub num_targets: usize,
    pub num_vertices: usize,
    pub source_target: u32,
    pub destination_target: u32,
    pub source_pseudo: u32,
    pub destination_pseudo: u32,
    pub target_of_vertex: Vec<u32>,
    pub vertices_in_target: Vec<Vec<u32>>,
    pub target_scores: Vec<f64>,
    pub graph: VertexGraph,
}

impl Instance {
    pub fn target_of(&self, vertex: u32) -> u32 {
        self.target_of_vertex[vertex as usize]
    }

    pub fn is_terminal_target(&self, target: u32) -> bool {
        target == self.source_target || target == self.destination_target
    }
}

/// Builds an [`Instance`] from parsed target sites and the discretization
/// parameters. The first site is the source, the last the destination;
/// their scores are ignored.
#[derive(Debug)]
pub struct InstanceBuilder {
    pub sites: Vec<TargetSite>,
    pub num_vehicles: usize,
    pub budget: f64,
    pub discretizations: usize,
    pub turn_radius: f64,
}

impl InstanceBuilder {
    pub fn from_params(sites: Vec<TargetSite>, num_vehicles: usize, budget: f64, params: &Params) -> Self {
        InstanceBuilder {
            sites,
            num_vehicles,
            budget,
            discretizations: params.discretizations,
            turn_radius: params.turn_radius,
        }
    }

    pub fn build(self) -> Result<Instance> {
        if self.sites.len() < 2 {
            return Err(SolverError::InstanceMalformed(format!(
                "need at least a source and a destination, got {} targets",
                self.sites.len()
            )));
        }
        if !(self.budget > 0.0) {
            return Err(SolverError::InstanceMalformed(format!(
                "budget must be positive, got {}",
                self.budget
            )));
        }
        if self.num_vehicles == 0 {
            return Err(SolverError::InstanceMalformed("vehicle count must be positive".into()));
        }
        if self.discretizations == 0 {
            return Err(SolverError::InstanceMalformed("discretization count must be positive".into()));
        }
        if !(self.turn_radius > 0.0) {
            return Err(SolverError::InstanceMalformed(format!(
                "turn radius must be positive, got {}",
                self.turn_radius
            )));
        }

        let n = self.sites.len();
        let d = self.discretizations;
        let source_target = 0u32;
        let destination_target = (n - 1) as u32;

        let mut graph = VertexGraph::with_capacity(n * d + 2, n * n * d * d);
        let mut target_of_vertex = Vec::with_capacity(n * d + 2);
        let mut vertices_in_target: Vec<Vec<u32>> = vec![Vec::new(); n];
        let mut poses: Vec<Pose> = Vec::with_capacity(n * d);

        for (t, site) in self.sites.iter().enumerate() {
            for k in 0..d {
                let heading = 2.0 * PI * (k as f64) / (d as f64);
                let v = graph.add_node(t as u32).index() as u32;
                target_of_vertex.push(t as u32);
                vertices_in_target[t].push(v);
                poses.push(Pose::new(site.x, site.y, heading));
            }
        }

        let source_pseudo = graph.add_node(source_target).index() as u32;
        target_of_vertex.push(source_target);
        let destination_pseudo = graph.add_node(destination_target).index() as u32;
        target_of_vertex.push(destination_target);

        // Inter-target edges. Nothing enters the source target and nothing
        // leaves the destination target: a route through either mid-path
        // scores nothing and, since Dubins lengths obey the triangle
        // inequality, can always be shortcut.
        let mut dropped = 0usize;
        for from_t in 0..n {
            if from_t == n - 1 {
                continue;
            }
            for to_t in 1..n {
                if to_t == from_t {
                    continue;
                }
                for &u in &vertices_in_target[from_t] {
                    for &w in &vertices_in_target[to_t] {
                        let weight = if d == 1 {
                            dubins::euclidean(poses[u as usize].x, poses[u as usize].y, poses[w as usize].x, poses[w as usize].y)
                        } else {
                            dubins::shortest_path(poses[u as usize], poses[w as usize], self.turn_radius).length()
                        };
                        if weight > self.budget {
                            dropped += 1;
                            continue;
                        }
                        graph.add_edge(NodeIndex::new(u as usize), NodeIndex::new(w as usize), weight);
                    }
                }
            }
        }

        // Zero-weight pseudo connectors.
        for &v in &vertices_in_target[0] {
            graph.add_edge(NodeIndex::new(source_pseudo as usize), NodeIndex::new(v as usize), 0.0);
        }
        for &v in &vertices_in_target[n - 1] {
            graph.add_edge(NodeIndex::new(v as usize), NodeIndex::new(destination_pseudo as usize), 0.0);
        }
        vertices_in_target[0].push(source_pseudo);
        vertices_in_target[n - 1].push(destination_pseudo);

        let mut target_scores: Vec<f64> = self.sites.iter().map(|s| s.score).collect();
        target_scores[0] = 0.0;
        target_scores[n - 1] = 0.0;

        debug!(
            "built instance: {} targets, {} vertices, {} edges ({} over-budget pairs dropped)",
            n,
            graph.node_count(),
            graph.edge_count(),
            dropped
        );

        Ok(Instance {
            budget: self.budget,
            num_vehicles: self.num_vehicles,
            num_targets: n,
            num_vertices: graph.node_count(),
            source_target,
            destination_target,
            source_pseudo,
            destination_pseudo,
            target_of_vertex,
            vertices_in_target,
            target_scores,
            graph,
        })
    }
}
