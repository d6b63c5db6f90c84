use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Algorithm {
    /// Compact-formulation branch-and-cut baseline. Accepted by the CLI
    /// grammar but not built into this binary.
    BranchAndCut,
    BranchAndPrice,
}

impl Algorithm {
    pub fn code(&self) -> u8 {
        match self {
            Algorithm::BranchAndCut => 1,
            Algorithm::BranchAndPrice => 2,
        }
    }
}

/// Which labeling search the pricing engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Simple,
    Interleaved,
}

/// Label dominance strength. Relaxed ignores the critical-visit vectors and
/// prunes harder; strict additionally requires the visit-vector subset
/// condition and is always sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominanceMode {
    Relaxed,
    Strict,
}

/// Ordering key for unprocessed labels in the interleaved search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMetric {
    ReducedCost,
    /// Reduced cost per unit of consumed budget.
    CostPerLength,
}

/// Everything the engine needs beyond the instance itself.
#[derive(Debug, Clone)]
pub struct Params {
    pub algorithm: Algorithm,
    pub num_workers: usize,
    pub column_cap: usize,
    pub discretizations: usize,
    pub turn_radius: f64,
    pub search: SearchKind,
    pub dominance: DominanceMode,
    pub visit_count_dominance: bool,
    pub selection_metric: SelectionMetric,
    pub time_limit: Duration,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            algorithm: Algorithm::BranchAndPrice,
            num_workers: 8,
            column_cap: 500,
            discretizations: 2,
            turn_radius: 1.0,
            search: SearchKind::Simple,
            dominance: DominanceMode::Relaxed,
            visit_count_dominance: false,
            selection_metric: SelectionMetric::ReducedCost,
            time_limit: Duration::from_secs(3600),
        }
    }
}
