//! Domain models for the storefront.

pub mod session;
pub mod user;

pub use session::{CurrentUser, PendingLogin, keys as session_keys};
pub use user::{Account, Profile, ProfileForm, ProfileUpdate, User};
