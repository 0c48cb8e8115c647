//! Watch
//!
//! Filesystem watches that follow a project's configuration.

pub mod src;

#[cfg(test)]
mod test;

pub use src::*;
