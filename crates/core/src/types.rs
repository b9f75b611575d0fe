/// Primary keys are UUIDs (v7 for rows created by this service).
pub type DbId = uuid::Uuid;

/// Tenant identifier taken from the authenticated caller.
pub type TenantId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
