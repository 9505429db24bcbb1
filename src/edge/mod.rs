//! Network-edge routing: path classification and the presence-only gate.

pub mod classifier;
pub mod middleware;

pub use classifier::{RouteClass, RouteClassifier};
pub use middleware::route_gate;
