//! # services
//!
//! Orchestration layer: loads a snapshot through the ports, applies the pure
//! rules from `domains`, persists the result, then runs the side effects the
//! rules asked for.

pub mod access;
pub mod cart;
pub mod craftland;

pub use cart::{CartService, CheckoutReceipt};
pub use craftland::{CraftlandService, LikeOutcome};
