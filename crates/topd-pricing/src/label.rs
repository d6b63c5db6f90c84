use fixedbitset::FixedBitSet;

use topd_core::DominanceMode;

/// A partial path incident to `vertex`, grown from the source (forward) or
/// from the destination (backward). Labels live in a per-search arena and
/// link to their parent by index; only the two flags ever mutate after
/// installation.
#[derive(Debug, Clone)]
pub struct Label {
    pub forward: bool,
    pub parent: Option<u32>,
    pub vertex: u32,
    pub path_length: f64,
    pub score: f64,
    pub reduced_cost: f64,
    pub targets_visited: u32,
    /// Critical targets on the path.
    pub visited_critical: FixedBitSet,
    /// Critical targets provably out of reach within the remaining budget.
    pub unreachable_critical: FixedBitSet,
    /// Ordering key for the unprocessed-label queues.
    pub metric: f64,
    pub extended: bool,
    pub dominated: bool,
}

impl Label {
    /// A fresh path of one vertex: zero resources, one visited target,
    /// empty bit vectors.
    pub fn terminal(forward: bool, vertex: u32, num_targets: usize) -> Self {
        Label {
            forward,
            parent: None,
            vertex,
            path_length: 0.0,
            score: 0.0,
            reduced_cost: 0.0,
            targets_visited: 1,
            visited_critical: FixedBitSet::with_capacity(num_targets),
            unreachable_critical: FixedBitSet::with_capacity(num_targets),
            metric: 0.0,
            extended: false,
            dominated: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DominanceRules {
    pub mode: DominanceMode,
    /// Track `targets_visited` as an additional dominance dimension.
    pub use_visit_count: bool,
}

/// Word-wise union of the visited and unreachable vectors. Once a critical
/// target is visited or unreachable it constrains every completion the same
/// way, so dominance compares the union.
fn covered<'a>(l: &'a Label) -> impl Iterator<Item = u32> + 'a {
    l.visited_critical
        .as_slice()
        .iter()
        .zip(l.unreachable_critical.as_slice())
        .map(|(&v, &u)| v | u)
}

fn covered_subset(a: &Label, b: &Label) -> bool {
    covered(a).zip(covered(b)).all(|(x, y)| x & !y == 0)
}

fn covered_equal(a: &Label, b: &Label) -> bool {
    covered(a).zip(covered(b)).all(|(x, y)| x == y)
}

/// True when `a` dominates `b` (same vertex, same direction assumed).
///
/// Both modes require reduced cost and length no worse; strict mode also
/// requires `a`'s covered criticals to be a subset of `b`'s, which is what
/// makes discarding `b` safe for every completion. Equal labels never
/// dominate each other: at least one tracked dimension must be strictly
/// better (a proper subset counts in strict mode).
pub fn dominates(a: &Label, b: &Label, rules: DominanceRules) -> bool {
    debug_assert_eq!(a.vertex, b.vertex);
    debug_assert_eq!(a.forward, b.forward);

    if a.reduced_cost > b.reduced_cost || a.path_length > b.path_length {
        return false;
    }
    if rules.use_visit_count && a.targets_visited > b.targets_visited {
        return false;
    }

    let mut strictly_better = a.reduced_cost < b.reduced_cost || a.path_length < b.path_length;
    if rules.use_visit_count {
        strictly_better |= a.targets_visited < b.targets_visited;
    }

    match rules.mode {
        DominanceMode::Relaxed => strictly_better,
        DominanceMode::Strict => {
            if !covered_subset(a, b) {
                return false;
            }
            strictly_better || !covered_equal(a, b)
        }
    }
}
