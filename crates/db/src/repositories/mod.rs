//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every query is tenant-scoped
//! except the retry sweep, which works across tenants by design of the
//! background worker.

pub mod delivery_repo;
pub mod subscription_repo;

pub use delivery_repo::DeliveryRepo;
pub use subscription_repo::SubscriptionRepo;
