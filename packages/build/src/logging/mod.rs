//! Logging
//!
//! Leveled logger used by the orchestrator and the watch manager.

pub mod src;

#[cfg(test)]
mod test;

pub use src::*;
