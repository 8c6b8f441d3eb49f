//! Connection checks run by the prober

pub mod reachability;

pub use reachability::{ProbeError, ReachabilityProbe, TcpProbe};
