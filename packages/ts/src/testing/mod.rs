//! Test doubles for the host layer.

mod in_memory_system;

pub use in_memory_system::InMemorySystem;
