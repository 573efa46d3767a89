//! Bubble-popping therapy exercises: layout, symbol pools, the session state
//! machine, timing metrics and report export. The terminal front end lives in
//! the binary; everything here runs headless.

pub mod catalog;
pub mod config;
pub mod export;
pub mod game;
pub mod layout;
pub mod metrics;
pub mod pool;
pub mod rng;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod util;
