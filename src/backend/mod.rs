//! Backend servers and load balancing algorithms.

pub mod algorithms;
mod selector;
mod server;

pub use algorithms::SelectionError;
pub use selector::Selector;
pub use server::Backend;
