pub mod deliveries;
pub mod events;
pub mod subscriptions;
