//! ResultStore implementations

pub mod inmemory;

pub use inmemory::InMemoryResultStore;
