//! Drives the best-bound coordinator with a continuous-knapsack toy: the
//! relaxation is the classic fractional greedy, branching fixes the split
//! item in or out. Small enough to verify the search bookkeeping exactly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use topd_bnb::{BranchNode, Coordinator, NodeSolver, SearchReport};
use topd_core::{Deadline, Result};

const EPS: f64 = 1e-4;

#[derive(Debug, Clone, Copy)]
struct Item {
    profit: f64,
    weight: f64,
}

fn items() -> Vec<Item> {
    [(24.0, 8.0), (2.0, 1.0), (20.0, 5.0), (4.0, 4.0)]
        .into_iter()
        .map(|(profit, weight)| Item { profit, weight })
        .collect()
}

#[derive(Debug, Clone)]
struct KnapsackNode {
    id: u64,
    seq: Arc<AtomicU64>,
    parent_bound: f64,
    taken: Vec<usize>,
    banned: Vec<usize>,
    feasible: bool,
    lp: f64,
    integral: bool,
    mip: Option<f64>,
    chosen: Vec<usize>,
    split_item: Option<usize>,
}

impl KnapsackNode {
    fn root() -> Self {
        KnapsackNode {
            id: 0,
            seq: Arc::new(AtomicU64::new(1)),
            parent_bound: f64::INFINITY,
            taken: Vec::new(),
            banned: Vec::new(),
            feasible: false,
            lp: 0.0,
            integral: false,
            mip: None,
            chosen: Vec::new(),
            split_item: None,
        }
    }

    fn child(&self) -> Self {
        KnapsackNode {
            id: self.seq.fetch_add(1, Ordering::Relaxed),
            seq: Arc::clone(&self.seq),
            parent_bound: self.lp,
            taken: self.taken.clone(),
            banned: self.banned.clone(),
            feasible: false,
            lp: 0.0,
            integral: false,
            mip: None,
            chosen: Vec::new(),
            split_item: None,
        }
    }
}

impl BranchNode for KnapsackNode {
    type Incumbent = Vec<usize>;

    fn id(&self) -> u64 {
        self.id
    }
    fn parent_bound(&self) -> f64 {
        self.parent_bound
    }
    fn lp_feasible(&self) -> bool {
        self.feasible
    }
    fn lp_optimal(&self) -> bool {
        true
    }
    fn lp_objective(&self) -> f64 {
        self.lp
    }
    fn lp_integral(&self) -> bool {
        self.integral
    }
    fn mip_objective(&self) -> Option<f64> {
        self.mip
    }
    fn incumbent(&self) -> Option<Vec<usize>> {
        self.mip.map(|_| self.chosen.clone())
    }

    fn branch(&self) -> Vec<Self> {
        let Some(split) = self.split_item else {
            return Vec::new();
        };
        let mut out = self.child();
        out.banned.push(split);
        let mut inn = self.child();
        inn.taken.push(split);
        vec![out, inn]
    }
}

struct GreedySolver {
    items: Vec<Item>,
    capacity: f64,
}

impl NodeSolver for GreedySolver {
    type Node = KnapsackNode;

    fn solve(&mut self, node: &mut KnapsackNode, _deadline: &Deadline) -> Result<()> {
        let fixed_weight: f64 = node.taken.iter().map(|&i| self.items[i].weight).sum();
        let fixed_profit: f64 = node.taken.iter().map(|&i| self.items[i].profit).sum();
        let capacity = self.capacity - fixed_weight;
        if capacity < -1e-9 {
            node.feasible = false;
            return Ok(());
        }
        node.feasible = true;

        let mut free: Vec<usize> = (0..self.items.len())
            .filter(|i| !node.taken.contains(i) && !node.banned.contains(i))
            .collect();
        free.sort_by(|&a, &b| {
            let ra = self.items[a].profit / self.items[a].weight;
            let rb = self.items[b].profit / self.items[b].weight;
            rb.partial_cmp(&ra).unwrap().then(a.cmp(&b))
        });

        // Integer greedy: the node-local incumbent.
        let mut chosen = node.taken.clone();
        let mut int_profit = fixed_profit;
        let mut int_capacity = capacity;
        for &i in &free {
            if self.items[i].weight <= int_capacity + 1e-9 {
                int_capacity -= self.items[i].weight;
                int_profit += self.items[i].profit;
                chosen.push(i);
            }
        }
        node.mip = Some(int_profit);
        node.chosen = chosen;

        // Fractional greedy: the relaxation bound and the branching item.
        let mut lp = fixed_profit;
        let mut lp_capacity = capacity;
        node.split_item = None;
        for &i in &free {
            if self.items[i].weight <= lp_capacity + 1e-9 {
                lp_capacity -= self.items[i].weight;
                lp += self.items[i].profit;
            } else {
                if lp_capacity > 1e-9 {
                    lp += self.items[i].profit * lp_capacity / self.items[i].weight;
                    node.split_item = Some(i);
                }
                break;
            }
        }
        node.lp = lp;
        node.integral = node.split_item.is_none();
        Ok(())
    }
}

fn run(workers: usize) -> SearchReport<Vec<usize>> {
    let coordinator = Coordinator::new(workers, EPS);
    coordinator
        .run(
            KnapsackNode::root(),
            Deadline::new(Duration::from_secs(30)),
            0.0,
            |_| GreedySolver {
                items: items(),
                capacity: 9.0,
            },
        )
        .expect("search completes")
}

#[test]
fn finds_the_integer_optimum() {
    let report = run(1);
    assert!((report.lower_bound - 26.0).abs() < EPS);
    assert!((report.upper_bound - 26.0).abs() < EPS);
    assert!(report.optimal);
    let mut chosen = report.incumbent.expect("incumbent exists");
    chosen.sort_unstable();
    assert_eq!(chosen, vec![0, 1]);
}

#[test]
fn explores_a_real_tree() {
    let report = run(1);
    assert!(report.nodes_created > 1);
    assert!(report.nodes_solved > 1);
    assert!(report.nodes_feasible <= report.nodes_created);
    let root = report.root.expect("root was solved");
    assert!(root.lp_optimal);
    assert!(root.upper >= report.lower_bound - EPS);
}

#[test]
fn single_worker_never_runs_in_parallel() {
    let report = run(1);
    assert_eq!(report.max_parallel, 1);
}

#[test]
fn five_workers_overlap() {
    let report = run(5);
    assert!(report.max_parallel > 1);
    assert!((report.lower_bound - 26.0).abs() < EPS);
}

#[test]
fn single_worker_runs_are_deterministic() {
    let a = run(1);
    let b = run(1);
    assert_eq!(a.nodes_created, b.nodes_created);
    assert_eq!(a.nodes_solved, b.nodes_solved);
    assert_eq!(a.lower_bound, b.lower_bound);
    assert_eq!(a.upper_bound, b.upper_bound);
    assert_eq!(a.incumbent, b.incumbent);
}
