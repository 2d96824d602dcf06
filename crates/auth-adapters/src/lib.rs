//! # auth-adapters
//!
//! Implementations of `AuthProvider`. Account management lives outside this
//! service; it only verifies the bearer tokens minted for it.

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtAuthProvider;
