//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the caller and their tenant from a JWT Bearer token.

pub mod auth;
