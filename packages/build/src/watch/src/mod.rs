pub mod filter;
pub mod manager;

pub use filter::*;
pub use manager::*;
