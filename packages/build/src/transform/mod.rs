//! Transform Passes
//!
//! Phase-tagged tree rewrites and the registry that hands them to the host
//! emit as custom transformers.

pub mod src;


pub use src::*;
