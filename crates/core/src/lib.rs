//! Domain building blocks for the webhook distribution subsystem.
//!
//! Nothing in here performs I/O. The persistence layer (`hookline-db`) and
//! the delivery runtime (`hookline-events`) both build on these types.

pub mod delivery;
pub mod error;
pub mod event_types;
pub mod pagination;
pub mod secrets;
pub mod signing;
pub mod types;
pub mod validation;
