//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 access-token generation and validation.
//!
//! Tokens are issued by the platform's identity service; this crate only
//! validates them and, for tests and tooling, mints them.

pub mod jwt;
