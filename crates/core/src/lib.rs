//! GAMERLY Core - domain types and rules.
//!
//! Shared by the storefront server and the CLI:
//! - `storefront` - the HTTP API for browsing, carts and accounts
//! - `cli` - migrations, catalog seeding and user management
//!
//! # Architecture
//!
//! Nothing here performs I/O. Cart mutations and token checks are pure
//! functions over snapshots; the storefront loads those snapshots inside a
//! transaction and persists the returned change.
//!
//! # Modules
//!
//! - [`types`] - IDs, money, emails, usernames and status enums
//! - [`catalog`] - products, categories, pricing and pagination
//! - [`cart`] - the cart aggregate
//! - [`token`] - one-time token lifecycle
//! - [`validation`] - shared input rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod token;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartError, CartLine, CartTotals, LineChange};
pub use catalog::{Category, CategoryDraft, PageInfo, Product, ProductDraft, ProductInput};
pub use token::{OneTimeToken, TokenError, TokenState};
pub use types::*;
pub use validation::ValidationError;
