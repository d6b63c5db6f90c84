//! End-to-end pricing runs on small Euclidean instances.

use std::time::Duration;

use topd_core::graph::node;
use topd_core::{
    Deadline, DominanceMode, Duals, Instance, InstanceBuilder, Route, SearchKind, SelectionMetric,
    TargetSite,
};
use topd_pricing::{PricingConfig, PricingEngine, PricingInput};

/// Colinear targets one unit apart; first and last are the terminals.
fn line(scores: &[f64], budget: f64) -> Instance {
    let sites = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| TargetSite {
            x: i as f64,
            y: 0.0,
            score,
        })
        .collect();
    InstanceBuilder {
        sites,
        num_vehicles: 2,
        budget,
        discretizations: 1,
        turn_radius: 1.0,
    }
    .build()
    .unwrap()
}

fn config(search: SearchKind, dominance: DominanceMode) -> PricingConfig {
    PricingConfig {
        search,
        dominance,
        use_visit_count: false,
        column_cap: 10_000,
        metric: SelectionMetric::ReducedCost,
    }
}

fn price(instance: &Instance, duals: &Duals, cfg: PricingConfig) -> Vec<Route> {
    let deadline = Deadline::new(Duration::from_secs(30));
    let mut engine = PricingEngine::new(cfg);
    let input = PricingInput {
        instance,
        graph: &instance.graph,
        duals,
        deadline: &deadline,
    };
    engine.generate(&input).expect("pricing succeeds")
}

fn assert_route_consistent(instance: &Instance, route: &Route) {
    assert!(route.is_elementary(), "{:?} repeats a target", route.target_path);
    assert!(route.length <= instance.budget + 1e-6);
    assert!(route.reduced_cost < 0.0);
    let first = route.vertex_path[0];
    let last = *route.vertex_path.last().unwrap();
    assert_eq!(instance.target_of(first), instance.source_target);
    assert_eq!(instance.target_of(last), instance.destination_target);
    let mut walked = 0.0;
    for pair in route.vertex_path.windows(2) {
        let e = instance
            .graph
            .find_edge(node(pair[0]), node(pair[1]))
            .expect("route follows graph edges");
        walked += instance.graph[e];
    }
    assert!((walked - route.length).abs() < 1e-6);
    for (k, &v) in route.vertex_path.iter().enumerate() {
        assert_eq!(instance.target_of(v), route.target_path[k]);
    }
}

#[test]
fn collects_the_full_scoring_route() {
    let instance = line(&[0.0, 5.0, 4.0, 0.0], 10.0);
    let duals = Duals::seed(&instance);
    let routes = price(&instance, &duals, config(SearchKind::Simple, DominanceMode::Relaxed));
    assert!(!routes.is_empty());
    for r in &routes {
        assert_route_consistent(&instance, r);
        // With zero duals the reduced cost is exactly the negated score.
        assert!((r.reduced_cost + r.score).abs() < 1e-6);
    }
    assert!(
        routes.iter().any(|r| r.visited_targets() == vec![0, 1, 2, 3]),
        "the both-targets route must be priced"
    );
}

#[test]
fn no_feasible_route_under_a_starvation_budget() {
    // The shortest source-destination connection is 3 units; nothing fits.
    let instance = line(&[0.0, 5.0, 4.0, 0.0], 0.5);
    let duals = Duals::seed(&instance);
    let routes = price(&instance, &duals, config(SearchKind::Simple, DominanceMode::Relaxed));
    assert!(routes.is_empty());
}

/// Targets zigzagging off the x-axis with scores growing away from the
/// source: every detour is strictly longer and strictly more rewarding, so
/// labels at the same vertex stay pairwise incomparable and no dominance
/// kill can hide a canonical join.
fn zigzag(budget: f64) -> Instance {
    InstanceBuilder {
        sites: vec![
            TargetSite { x: 0.0, y: 0.0, score: 0.0 },
            TargetSite { x: 1.0, y: 0.8, score: 3.0 },
            TargetSite { x: 2.0, y: -0.7, score: 4.0 },
            TargetSite { x: 3.0, y: 0.6, score: 5.0 },
            TargetSite { x: 4.0, y: 0.0, score: 0.0 },
        ],
        num_vehicles: 2,
        budget,
        discretizations: 1,
        turn_radius: 1.0,
    }
    .build()
    .unwrap()
}

#[test]
fn relaxed_search_recovers_elementarity() {
    // Budget 10 leaves room to revisit the first target after sweeping the
    // high-score tail, so the relaxed optimum repeats and the engine must
    // promote its way back to an elementary best path.
    let instance = zigzag(10.0);
    let duals = Duals::seed(&instance);
    for kind in [SearchKind::Simple, SearchKind::Interleaved] {
        let routes = price(&instance, &duals, config(kind, DominanceMode::Relaxed));
        assert!(!routes.is_empty());
        for r in &routes {
            assert_route_consistent(&instance, r);
        }
        assert!(
            routes.iter().any(|r| r.visited_targets() == vec![0, 1, 2, 3, 4]),
            "the all-targets route survives promotion"
        );
    }
}

#[test]
fn simple_and_interleaved_agree_without_a_cap() {
    // Budget 6 admits exactly the monotone-order subsets of the zigzag, a
    // regime where the two searches must enumerate the same set.
    let instance = zigzag(6.0);
    let duals = Duals::seed(&instance);
    for dominance in [DominanceMode::Relaxed, DominanceMode::Strict] {
        let mut simple: Vec<Vec<u32>> = price(&instance, &duals, config(SearchKind::Simple, dominance))
            .into_iter()
            .map(|r| r.vertex_path)
            .collect();
        let mut inter: Vec<Vec<u32>> =
            price(&instance, &duals, config(SearchKind::Interleaved, dominance))
                .into_iter()
                .map(|r| r.vertex_path)
                .collect();
        simple.sort();
        inter.sort();
        assert!(!simple.is_empty());
        assert_eq!(simple, inter);
    }
}

#[test]
fn selection_metric_changes_order_not_results() {
    // Cost-per-length pops cheap short labels first; with no cap both
    // metrics still enumerate the same elementary set.
    let instance = zigzag(6.0);
    let duals = Duals::seed(&instance);
    let mut bang_for_buck = config(SearchKind::Interleaved, DominanceMode::Relaxed);
    bang_for_buck.metric = SelectionMetric::CostPerLength;
    let mut a: Vec<Vec<u32>> = price(&instance, &duals, bang_for_buck)
        .into_iter()
        .map(|r| r.vertex_path)
        .collect();
    let mut b: Vec<Vec<u32>> =
        price(&instance, &duals, config(SearchKind::Interleaved, DominanceMode::Relaxed))
            .into_iter()
            .map(|r| r.vertex_path)
            .collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn expensive_duals_push_a_target_out() {
    let instance = line(&[0.0, 5.0, 4.0, 0.0], 10.0);
    let mut duals = Duals::seed(&instance);
    // Cover dual far above the score: any route through target 1 prices
    // non-negative on that leg.
    duals.target_costs[1] = 100.0;
    let routes = price(&instance, &duals, config(SearchKind::Simple, DominanceMode::Relaxed));
    assert!(!routes.is_empty());
    for r in &routes {
        assert!(!r.visits_target(1), "target 1 must be priced out: {:?}", r.target_path);
    }
}

#[test]
fn vehicle_cover_dual_shuts_pricing_down() {
    let instance = line(&[0.0, 5.0, 4.0, 0.0], 10.0);
    let mut duals = Duals::seed(&instance);
    duals.target_costs = vec![0.0; instance.num_targets];
    duals.vehicle_cover = 1.0;
    let routes = price(&instance, &duals, config(SearchKind::Simple, DominanceMode::Relaxed));
    assert!(routes.is_empty(), "no route can price negative");
}

#[test]
fn column_cap_bounds_the_harvest() {
    let instance = line(&[0.0, 2.0, 2.0, 2.0, 0.0], 8.0);
    let duals = Duals::seed(&instance);
    let mut cfg = config(SearchKind::Simple, DominanceMode::Relaxed);
    cfg.column_cap = 3;
    let routes = price(&instance, &duals, cfg);
    assert!(routes.len() <= 3);
    assert!(!routes.is_empty());
}

#[test]
fn strict_and_relaxed_find_the_same_best_score() {
    let instance = line(&[0.0, 5.0, 4.0, 3.0, 0.0], 9.0);
    let duals = Duals::seed(&instance);
    let best = |mode| {
        price(&instance, &duals, config(SearchKind::Simple, mode))
            .iter()
            .map(|r| r.score)
            .fold(0.0f64, f64::max)
    };
    assert_eq!(best(DominanceMode::Relaxed), best(DominanceMode::Strict));
}
