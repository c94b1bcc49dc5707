//! API surface for submitters and status readers.

pub mod api;

pub use api::{ClusterStatus, InstanceStatus, TaskSubmission};
