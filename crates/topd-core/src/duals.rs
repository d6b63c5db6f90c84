use std::collections::HashMap;

use crate::instance::Instance;

/// Dual information handed from the restricted master to the pricing
/// engine.
///
/// `target_costs[t]` is the reduced-cost contribution of entering target
/// `t`: the target's cover-row dual minus its score. With all duals at
/// zero (the seeding round) it is simply `-score[t]`.
#[derive(Debug, Clone, Default)]
pub struct Duals {
    /// Dual of the route-cap (vehicle count) row.
    pub vehicle_cover: f64,
    /// Per-target reduced-cost contribution, indexed by target id.
    pub target_costs: Vec<f64>,
    /// Duals of must-visit target-pair rows, keyed by the ordered pair.
    pub edge_duals: HashMap<(u32, u32), f64>,
}

impl Duals {
    /// The zero-dual seed used before the first master solve.
    pub fn seed(instance: &Instance) -> Self {
        Duals {
            vehicle_cover: 0.0,
            target_costs: instance.target_scores.iter().map(|s| -s).collect(),
            edge_duals: HashMap::new(),
        }
    }

    pub fn edge_dual(&self, from: u32, to: u32) -> f64 {
        self.edge_duals.get(&(from, to)).copied().unwrap_or(0.0)
    }
}
