use std::collections::{HashSet, VecDeque};
use std::collections::BinaryHeap;
use std::cmp::Reverse;

use fixedbitset::FixedBitSet;
use log::{debug, trace};
use ordered_float::OrderedFloat;
use petgraph::visit::EdgeRef;
use petgraph::visit::IntoEdgeReferences;
use petgraph::Direction;

use topd_core::graph::node;
use topd_core::{
    Deadline, DominanceMode, Duals, Instance, Params, Result, Route, SearchKind, SelectionMetric,
    SolverError, VertexGraph, GEOM_EPS,
};

use crate::label::{dominates, DominanceRules, Label};

/// Reduced costs below this are treated as genuinely negative.
const NEGATIVE_RC: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub search: SearchKind,
    pub dominance: DominanceMode,
    pub use_visit_count: bool,
    pub column_cap: usize,
    pub metric: SelectionMetric,
}

impl PricingConfig {
    pub fn from_params(params: &Params) -> Self {
        PricingConfig {
            search: params.search,
            dominance: params.dominance,
            use_visit_count: params.visit_count_dominance,
            column_cap: params.column_cap,
            metric: params.selection_metric,
        }
    }
}

/// One pricing invocation: the node's subgraph plus the master duals.
pub struct PricingInput<'a> {
    pub instance: &'a Instance,
    pub graph: &'a VertexGraph,
    pub duals: &'a Duals,
    pub deadline: &'a Deadline,
}

/// Arena of labels plus the per-vertex label lists. Reset between search
/// iterations; the backing allocations are reused.
struct SearchSpace {
    arena: Vec<Label>,
    forward_at: Vec<Vec<u32>>,
    backward_at: Vec<Vec<u32>>,
}

impl SearchSpace {
    fn new(num_vertices: usize) -> Self {
        SearchSpace {
            arena: Vec::new(),
            forward_at: vec![Vec::new(); num_vertices],
            backward_at: vec![Vec::new(); num_vertices],
        }
    }

    fn reset(&mut self) {
        self.arena.clear();
        for list in &mut self.forward_at {
            list.clear();
        }
        for list in &mut self.backward_at {
            list.clear();
        }
    }

    fn label(&self, idx: u32) -> &Label {
        &self.arena[idx as usize]
    }

    /// Installs a label unless an existing one at its vertex dominates it;
    /// existing labels it dominates are flagged and dropped from the list.
    fn install(&mut self, label: Label, rules: DominanceRules) -> Option<u32> {
        let v = label.vertex as usize;
        let arena = &mut self.arena;
        let list = if label.forward {
            &mut self.forward_at[v]
        } else {
            &mut self.backward_at[v]
        };
        for &idx in list.iter() {
            if dominates(&arena[idx as usize], &label, rules) {
                return None;
            }
        }
        list.retain(|&idx| {
            if dominates(&label, &arena[idx as usize], rules) {
                arena[idx as usize].dominated = true;
                false
            } else {
                true
            }
        });
        let idx = arena.len() as u32;
        arena.push(label);
        list.push(idx);
        Some(idx)
    }
}

/// Best direct-edge length from every vertex into each target (forward
/// reach) and from each target into every vertex (backward reach). Used
/// for the unreachable-critical bits; a missing edge is an infinite bound.
struct ReachBounds {
    num_targets: usize,
    to_target: Vec<f64>,
    from_target: Vec<f64>,
}

impl ReachBounds {
    fn build(instance: &Instance, graph: &VertexGraph) -> Self {
        let n = instance.num_vertices;
        let t = instance.num_targets;
        let mut to_target = vec![f64::INFINITY; n * t];
        let mut from_target = vec![f64::INFINITY; n * t];
        for e in graph.edge_references() {
            let u = e.source().index();
            let w = e.target().index();
            let len = *e.weight();
            let tw = instance.target_of_vertex[w] as usize;
            let tu = instance.target_of_vertex[u] as usize;
            if len < to_target[u * t + tw] {
                to_target[u * t + tw] = len;
            }
            if len < from_target[w * t + tu] {
                from_target[w * t + tu] = len;
            }
        }
        ReachBounds {
            num_targets: t,
            to_target,
            from_target,
        }
    }

    fn to(&self, v: u32, target: usize) -> f64 {
        self.to_target[v as usize * self.num_targets + target]
    }

    fn from(&self, v: u32, target: usize) -> f64 {
        self.from_target[v as usize * self.num_targets + target]
    }
}

/// Accumulates accepted joins: the least-reduced-cost route of the current
/// iteration plus the deduplicated elementary negative routes across the
/// whole invocation.
struct Harvest {
    best: Option<Route>,
    routes: Vec<Route>,
    seen: HashSet<Vec<u32>>,
    cap: usize,
}

impl Harvest {
    fn full(&self) -> bool {
        self.routes.len() >= self.cap
    }

    fn record(&mut self, route: Route) {
        if self
            .best
            .as_ref()
            .map_or(true, |b| route.reduced_cost < b.reduced_cost)
        {
            self.best = Some(route.clone());
        }
        if !self.full() && route.is_elementary() && self.seen.insert(route.vertex_path.clone()) {
            self.routes.push(route);
        }
    }
}

/// The DSSR / I-DSSR pricing engine. One engine lives per worker; the
/// dominance mode may flip from relaxed to strict mid-run and then stays
/// strict for the rest of the engine's life.
pub struct PricingEngine {
    config: PricingConfig,
    critical: FixedBitSet,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        PricingEngine {
            config,
            critical: FixedBitSet::default(),
        }
    }

    pub fn dominance(&self) -> DominanceMode {
        self.config.dominance
    }

    fn rules(&self) -> DominanceRules {
        DominanceRules {
            mode: self.config.dominance,
            use_visit_count: self.config.use_visit_count,
        }
    }

    /// Elementary negative-reduced-cost routes for the given duals, or an
    /// empty vector when none exist (proving the master LP optimal).
    pub fn generate(&mut self, input: &PricingInput) -> Result<Vec<Route>> {
        self.critical = FixedBitSet::with_capacity(input.instance.num_targets);
        let reach = ReachBounds::build(input.instance, input.graph);
        let mut space = SearchSpace::new(input.instance.num_vertices);
        let mut harvest = Harvest {
            best: None,
            routes: Vec::new(),
            seen: HashSet::new(),
            cap: self.config.column_cap,
        };

        loop {
            if input.deadline.expired() {
                break;
            }
            harvest.best = None;
            match self.config.search {
                SearchKind::Simple => self.simple_search(input, &reach, &mut space, &mut harvest),
                SearchKind::Interleaved => {
                    self.interleaved_search(input, &reach, &mut space, &mut harvest)
                }
            }

            match harvest.best.take() {
                None => {
                    if self.config.dominance == DominanceMode::Relaxed {
                        debug!("no route under relaxed dominance; retrying with strict dominance");
                        self.config.dominance = DominanceMode::Strict;
                        continue;
                    }
                    break;
                }
                Some(best) => {
                    let repeats = best.repeated_targets();
                    if repeats.is_empty() {
                        break;
                    }
                    for &t in &repeats {
                        if self.critical.contains(t as usize) {
                            return Err(SolverError::CriticalCycle(format!(
                                "target {t} repeated in {:?} after promotion",
                                best.target_path
                            )));
                        }
                        self.critical.insert(t as usize);
                    }
                    trace!(
                        "promoted {:?} to critical ({} tracked)",
                        repeats,
                        self.critical.count_ones(..)
                    );
                }
            }
            if harvest.full() {
                break;
            }
        }

        debug!(
            "pricing returned {} routes ({} criticals)",
            harvest.routes.len(),
            self.critical.count_ones(..)
        );
        Ok(harvest.routes)
    }

    fn seed_terminals(&self, input: &PricingInput, space: &mut SearchSpace) -> (Vec<u32>, Vec<u32>) {
        let inst = input.instance;
        let rules = self.rules();
        let mut forward = Vec::new();
        let mut backward = Vec::new();
        for &v in &inst.vertices_in_target[inst.source_target as usize] {
            if input.graph.contains_node(node(v)) {
                if let Some(idx) = space.install(Label::terminal(true, v, inst.num_targets), rules) {
                    forward.push(idx);
                }
            }
        }
        for &v in &inst.vertices_in_target[inst.destination_target as usize] {
            if input.graph.contains_node(node(v)) {
                if let Some(idx) = space.install(Label::terminal(false, v, inst.num_targets), rules) {
                    backward.push(idx);
                }
            }
        }
        (forward, backward)
    }

    fn metric_of(&self, reduced_cost: f64, path_length: f64) -> f64 {
        match self.config.metric {
            SelectionMetric::ReducedCost => reduced_cost,
            SelectionMetric::CostPerLength => reduced_cost / path_length.max(GEOM_EPS),
        }
    }

    /// Feasibility-checked one-edge extension of `li` onto `new_v`.
    fn extension_candidate(
        &self,
        input: &PricingInput,
        reach: &ReachBounds,
        space: &SearchSpace,
        li: u32,
        new_v: u32,
        edge_len: f64,
    ) -> Option<Label> {
        let inst = input.instance;
        let l = space.label(li);
        let new_len = l.path_length + edge_len;
        if new_len >= inst.budget {
            return None;
        }
        let t_cur = inst.target_of(l.vertex);
        let t_new = inst.target_of(new_v);
        let same_target = t_new == t_cur; // pseudo connectors only

        let mut visited = l.visited_critical.clone();
        let mut visits = l.targets_visited;
        let mut reduced_cost = l.reduced_cost;
        let mut score = l.score;

        if !same_target {
            // No target 2-cycle through the predecessor.
            if let Some(p) = l.parent {
                if inst.target_of(space.label(p).vertex) == t_new {
                    return None;
                }
            }
            // No revisit: bit test for criticals, path scan otherwise.
            if self.critical.contains(t_new as usize) {
                if l.visited_critical.contains(t_new as usize) {
                    return None;
                }
            } else {
                let mut cursor = Some(li);
                while let Some(c) = cursor {
                    let cl = space.label(c);
                    if inst.target_of(cl.vertex) == t_new {
                        return None;
                    }
                    cursor = cl.parent;
                }
            }
            // The opposite side of any join holds at least one target.
            if visits + 1 > (inst.num_targets as u32).saturating_sub(1) {
                return None;
            }
            visits += 1;
            score += inst.target_scores[t_new as usize];
            reduced_cost += input.duals.target_costs[t_new as usize];
            reduced_cost += if l.forward {
                input.duals.edge_dual(t_cur, t_new)
            } else {
                input.duals.edge_dual(t_new, t_cur)
            };
            if self.critical.contains(t_new as usize) {
                visited.insert(t_new as usize);
            }
        }

        let mut unreachable = l.unreachable_critical.clone();
        for t in self.critical.ones() {
            if visited.contains(t) || unreachable.contains(t) {
                continue;
            }
            let bound = if l.forward {
                reach.to(new_v, t)
            } else {
                reach.from(new_v, t)
            };
            if new_len + bound > inst.budget {
                unreachable.insert(t);
            }
        }

        Some(Label {
            forward: l.forward,
            parent: Some(li),
            vertex: new_v,
            path_length: new_len,
            score,
            reduced_cost,
            targets_visited: visits,
            visited_critical: visited,
            unreachable_critical: unreachable,
            metric: self.metric_of(reduced_cost, new_len),
            extended: false,
            dominated: false,
        })
    }

    /// Canonical-join test: accept only the most balanced length split of a
    /// path. `edge_len` is the join edge between the two labels.
    fn halfway_accepts(&self, space: &SearchSpace, f: &Label, b: &Label, edge_len: f64) -> bool {
        let curr = (f.path_length - b.path_length).abs();
        if curr <= GEOM_EPS {
            return true;
        }
        let forward_heavier = f.path_length > b.path_length;
        let longer = if forward_heavier { f } else { b };
        let Some(p) = longer.parent else {
            // No competing split exists on that side.
            return true;
        };
        let last_edge = longer.path_length - space.label(p).path_length;
        let (f2, b2) = if forward_heavier {
            (f.path_length - last_edge, b.path_length + edge_len)
        } else {
            (f.path_length + edge_len, b.path_length - last_edge)
        };
        let other = (f2 - b2).abs();
        if (curr - other).abs() <= GEOM_EPS {
            // Exact tie: keep the forward-heavier pair.
            return forward_heavier;
        }
        curr < other
    }

    fn try_join(
        &self,
        input: &PricingInput,
        space: &SearchSpace,
        fi: u32,
        bi: u32,
        edge_len: f64,
        harvest: &mut Harvest,
    ) {
        let inst = input.instance;
        let f = space.label(fi);
        let b = space.label(bi);

        let total_len = f.path_length + edge_len + b.path_length;
        if total_len > inst.budget + GEOM_EPS {
            return;
        }
        if !f.visited_critical.is_disjoint(&b.visited_critical) {
            return;
        }
        let t_i = inst.target_of(f.vertex);
        let t_j = inst.target_of(b.vertex);
        // No target 2-cycle across the join edge.
        if let Some(p) = f.parent {
            if inst.target_of(space.label(p).vertex) == t_j {
                return;
            }
        }
        if let Some(p) = b.parent {
            if inst.target_of(space.label(p).vertex) == t_i {
                return;
            }
        }

        let mut reduced_cost = input.duals.vehicle_cover + f.reduced_cost + b.reduced_cost;
        if t_i != t_j {
            reduced_cost += input.duals.edge_dual(t_i, t_j);
        }
        if reduced_cost >= -NEGATIVE_RC {
            return;
        }
        if !self.halfway_accepts(space, f, b, edge_len) {
            return;
        }

        let mut vertex_path = Vec::new();
        let mut cursor = Some(fi);
        while let Some(c) = cursor {
            let l = space.label(c);
            vertex_path.push(l.vertex);
            cursor = l.parent;
        }
        vertex_path.reverse();
        let mut cursor = Some(bi);
        while let Some(c) = cursor {
            let l = space.label(c);
            vertex_path.push(l.vertex);
            cursor = l.parent;
        }
        let target_path = vertex_path.iter().map(|&v| inst.target_of(v)).collect();

        harvest.record(Route {
            vertex_path,
            target_path,
            score: f.score + b.score,
            length: total_len,
            reduced_cost,
        });
    }

    /// One-shot search: extend every label to a fixpoint, then sweep every
    /// directed edge for joins.
    fn simple_search(
        &self,
        input: &PricingInput,
        reach: &ReachBounds,
        space: &mut SearchSpace,
        harvest: &mut Harvest,
    ) {
        space.reset();
        let (forward, backward) = self.seed_terminals(input, space);
        let rules = self.rules();
        let inst = input.instance;
        let half = inst.budget / 2.0;

        let mut queued = vec![false; inst.num_vertices];
        let mut work: VecDeque<u32> = VecDeque::new();
        for &idx in forward.iter().chain(backward.iter()) {
            let v = space.label(idx).vertex;
            if !queued[v as usize] {
                queued[v as usize] = true;
                work.push_back(v);
            }
        }

        while let Some(v) = work.pop_front() {
            queued[v as usize] = false;
            if input.deadline.expired() {
                return;
            }

            // Forward labels at v extend along out-edges.
            let out_edges: Vec<(u32, f64)> = input
                .graph
                .edges(node(v))
                .map(|e| (e.target().index() as u32, *e.weight()))
                .collect();
            let snapshot: Vec<u32> = space.forward_at[v as usize].clone();
            for li in snapshot {
                if space.label(li).dominated || space.label(li).extended {
                    continue;
                }
                space.arena[li as usize].extended = true;
                if space.label(li).path_length >= half {
                    continue;
                }
                for &(w, len) in &out_edges {
                    if let Some(candidate) = self.extension_candidate(input, reach, space, li, w, len) {
                        if space.install(candidate, rules).is_some() && !queued[w as usize] {
                            queued[w as usize] = true;
                            work.push_back(w);
                        }
                    }
                }
            }

            // Backward labels at v extend along in-edges.
            let in_edges: Vec<(u32, f64)> = input
                .graph
                .edges_directed(node(v), Direction::Incoming)
                .map(|e| (e.source().index() as u32, *e.weight()))
                .collect();
            let snapshot: Vec<u32> = space.backward_at[v as usize].clone();
            for li in snapshot {
                if space.label(li).dominated || space.label(li).extended {
                    continue;
                }
                space.arena[li as usize].extended = true;
                if space.label(li).path_length >= half {
                    continue;
                }
                for &(u, len) in &in_edges {
                    if let Some(candidate) = self.extension_candidate(input, reach, space, li, u, len) {
                        if space.install(candidate, rules).is_some() && !queued[u as usize] {
                            queued[u as usize] = true;
                            work.push_back(u);
                        }
                    }
                }
            }
        }

        // Join phase: every directed edge, forward tail against backward
        // head.
        for e in input.graph.edge_references() {
            if input.deadline.expired() || harvest.full() {
                return;
            }
            let i = e.source().index();
            let j = e.target().index();
            let len = *e.weight();
            for fi in 0..space.forward_at[i].len() {
                let fi = space.forward_at[i][fi];
                if space.label(fi).dominated {
                    continue;
                }
                for bi in 0..space.backward_at[j].len() {
                    let bi = space.backward_at[j][bi];
                    if space.label(bi).dominated {
                        continue;
                    }
                    self.try_join(input, space, fi, bi, len, harvest);
                    if harvest.full() {
                        return;
                    }
                }
            }
        }
    }

    /// Interleaved bidirectional search: two metric-ordered queues, joins
    /// attempted as each label is processed, then one-edge extension.
    fn interleaved_search(
        &self,
        input: &PricingInput,
        reach: &ReachBounds,
        space: &mut SearchSpace,
        harvest: &mut Harvest,
    ) {
        space.reset();
        let (forward, backward) = self.seed_terminals(input, space);
        let rules = self.rules();
        let inst = input.instance;
        let half = inst.budget / 2.0;

        type Entry = Reverse<(OrderedFloat<f64>, u32)>;
        let mut fwd_queue: BinaryHeap<Entry> = forward
            .iter()
            .map(|&i| Reverse((OrderedFloat(space.label(i).metric), i)))
            .collect();
        let mut bwd_queue: BinaryHeap<Entry> = backward
            .iter()
            .map(|&i| Reverse((OrderedFloat(space.label(i).metric), i)))
            .collect();

        let mut forward_turn = true;
        loop {
            if input.deadline.expired() || harvest.full() {
                return;
            }
            let li = if forward_turn {
                pop_live(space, &mut fwd_queue).or_else(|| pop_live(space, &mut bwd_queue))
            } else {
                pop_live(space, &mut bwd_queue).or_else(|| pop_live(space, &mut fwd_queue))
            };
            let Some(li) = li else { return };
            forward_turn = !forward_turn;

            let is_forward = space.label(li).forward;
            let v = space.label(li).vertex;

            // Joins with every opposite label on the adjacent vertices.
            if is_forward {
                for e in input.graph.edges(node(v)) {
                    let w = e.target().index();
                    let len = *e.weight();
                    for k in 0..space.backward_at[w].len() {
                        let bi = space.backward_at[w][k];
                        if !space.label(bi).dominated {
                            self.try_join(input, space, li, bi, len, harvest);
                        }
                    }
                }
            } else {
                for e in input.graph.edges_directed(node(v), Direction::Incoming) {
                    let u = e.source().index();
                    let len = *e.weight();
                    for k in 0..space.forward_at[u].len() {
                        let fi = space.forward_at[u][k];
                        if !space.label(fi).dominated {
                            self.try_join(input, space, fi, li, len, harvest);
                        }
                    }
                }
            }

            // One-edge extension.
            if space.label(li).path_length < half {
                let edges: Vec<(u32, f64)> = if is_forward {
                    input
                        .graph
                        .edges(node(v))
                        .map(|e| (e.target().index() as u32, *e.weight()))
                        .collect()
                } else {
                    input
                        .graph
                        .edges_directed(node(v), Direction::Incoming)
                        .map(|e| (e.source().index() as u32, *e.weight()))
                        .collect()
                };
                for (w, len) in edges {
                    if let Some(candidate) = self.extension_candidate(input, reach, space, li, w, len) {
                        if let Some(idx) = space.install(candidate, rules) {
                            let entry = Reverse((OrderedFloat(space.label(idx).metric), idx));
                            if space.label(idx).forward {
                                fwd_queue.push(entry);
                            } else {
                                bwd_queue.push(entry);
                            }
                        }
                    }
                }
            }
            space.arena[li as usize].extended = true;
        }
    }
}

fn pop_live(space: &SearchSpace, queue: &mut BinaryHeap<Reverse<(OrderedFloat<f64>, u32)>>) -> Option<u32> {
    while let Some(Reverse((_, idx))) = queue.pop() {
        if !space.label(idx).dominated {
            return Some(idx);
        }
    }
    None
}
