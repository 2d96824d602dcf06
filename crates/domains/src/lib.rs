//! fanhub/crates/domains/src/lib.rs
//!
//! Entities, port traits and the pure business rules of fanhub.
//! Nothing in this crate performs I/O.

pub mod cart;
pub mod error;
pub mod models;
pub mod ports;
pub mod voting;

pub use error::*;
pub use models::*;
pub use ports::*;
