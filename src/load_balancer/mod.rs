// src/load_balancer/mod.rs
mod algorithm;
mod least_conn;

pub use algorithm::{LoadBalancer, NoHealthyBackend};
pub use least_conn::LeastConnections;
