pub mod dubins;
pub mod duals;
pub mod error;
pub mod graph;
pub mod instance;
pub mod params;
pub mod route;
pub mod time;

pub use duals::Duals;
pub use error::{Result, SolverError};
pub use graph::VertexGraph;
pub use instance::{Instance, InstanceBuilder, TargetSite};
pub use params::{Algorithm, DominanceMode, Params, SearchKind, SelectionMetric};
pub use route::Route;
pub use time::Deadline;

/// Tolerance for objective/bound comparisons across the whole engine.
pub const EPS: f64 = 1e-4;

/// Tolerance for geometric length comparisons.
pub const GEOM_EPS: f64 = 1e-6;
