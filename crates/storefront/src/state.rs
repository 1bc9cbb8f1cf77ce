//! Shared handler state: configuration, the database pool and the mailer.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::EmailService;

/// Handles every route needs, behind one `Arc` so cloning per request is a
/// refcount bump.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

struct Shared {
    config: StorefrontConfig,
    pool: PgPool,
    email: EmailService,
}

impl AppState {
    /// Build the state, setting up the configured email backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay settings are rejected by lettre.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, SmtpError> {
        let email = EmailService::new(&config.email)?;
        Ok(Self {
            inner: Arc::new(Shared {
                config,
                pool,
                email,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Mailer for login codes and recovery links.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }
}
