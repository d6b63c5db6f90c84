use topd_bnb::{BranchNode, NodeSolver};
use topd_core::{Deadline, Params, Result, Route};
use topd_master::SetCoverSolver;
use topd_pricing::{PricingConfig, PricingEngine};

use crate::colgen;
use crate::node::TopNode;

/// Per-worker solver: one pricing engine (whose dominance mode may flip
/// and stay flipped) and one master handle, reused across all nodes the
/// worker receives.
pub struct TopNodeSolver {
    pricing: PricingEngine,
    master: SetCoverSolver,
}

impl TopNodeSolver {
    pub fn new(params: &Params) -> Self {
        TopNodeSolver {
            pricing: PricingEngine::new(PricingConfig::from_params(params)),
            master: SetCoverSolver::new(),
        }
    }
}

impl NodeSolver for TopNodeSolver {
    type Node = TopNode;

    fn solve(&mut self, node: &mut TopNode, deadline: &Deadline) -> Result<()> {
        colgen::solve_node(node, &mut self.pricing, &self.master, deadline)
    }
}

impl BranchNode for TopNode {
    type Incumbent = Vec<Route>;

    fn id(&self) -> u64 {
        self.id
    }

    fn parent_bound(&self) -> f64 {
        self.parent_lp_objective
    }

    fn lp_feasible(&self) -> bool {
        self.lp_feasible
    }

    fn lp_optimal(&self) -> bool {
        self.lp_optimal
    }

    fn lp_objective(&self) -> f64 {
        self.lp_objective
    }

    fn lp_integral(&self) -> bool {
        self.lp_integral
    }

    fn mip_objective(&self) -> Option<f64> {
        self.mip_objective
    }

    fn incumbent(&self) -> Option<Vec<Route>> {
        self.mip_objective.map(|_| self.mip_solution.clone())
    }

    fn branch(&self) -> Vec<TopNode> {
        self.children()
    }
}
