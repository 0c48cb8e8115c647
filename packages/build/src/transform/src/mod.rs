pub mod environment;
pub mod pass;
pub mod registry;

pub use environment::*;
pub use pass::*;
pub use registry::*;
