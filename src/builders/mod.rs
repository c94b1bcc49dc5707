//! Builders to construct a cluster manager from configuration.

pub mod manager_builder;

pub use manager_builder::ManagerBuilder;
