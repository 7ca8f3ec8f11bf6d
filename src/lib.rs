//! rustlb - an HTTP reverse-proxy load balancer
//!
//! Requests accepted on one or more listen addresses are relayed to one of a
//! fixed set of backends, chosen by:
//! - Round robin
//! - Weighted round robin
//! - IP hash

pub mod backend;
pub mod config;
pub mod frontend;
pub mod proxy;
pub mod state;
pub mod util;

pub use config::Config;
pub use state::AppContext;
