//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, two-step login, password change and recovery
//! - `tokens` - Login codes and recovery tokens
//! - `cart` - Cart mutations under a row lock
//! - `catalog` - Product and category browsing and administration
//! - `email` - Transactional email (SMTP or console)

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod email;
pub mod tokens;

pub use auth::{AuthError, AuthService, Registration};
pub use cart::{CartService, CartServiceError};
pub use catalog::{CatalogError, CatalogService};
pub use email::{EmailError, EmailService};
pub use tokens::{TokenService, TokenServiceError};
