//! The Delivery Engine: one signed HTTP attempt per call.

mod engine;
pub mod request;

pub use engine::{DeliveryEngine, DeliveryOutcome};
