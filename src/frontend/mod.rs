//! Frontend listeners.
//!
//! One listener per configured address; all of them share the same
//! selector and relay settings.

mod listener;

pub use listener::FrontendListener;
