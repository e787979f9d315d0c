//! Core types for Mercadito.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod principal;
pub mod product;

pub use cart::{CartLine, CartMode};
pub use id::*;
pub use price::{Price, format_price};
pub use principal::{Principal, PrincipalKind};
pub use product::Product;
