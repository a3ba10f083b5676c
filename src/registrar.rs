//! Token Registrar: records the current delivery token for an owner.
//!
//! Called by the client whenever it obtains or refreshes a push token.
//! Registration is a single upsert; failures are logged and returned, and
//! the next natural registration (e.g. the next app load) is the retry.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::domain::DeliveryToken;
use crate::error::RegistrationError;
use crate::store::TokenStore;

/// Writes owner → token mappings into a [`TokenStore`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use task_reminders::registrar::TokenRegistrar;
/// use task_reminders::store::memory::InMemoryStore;
/// use task_reminders::store::TokenStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(InMemoryStore::in_memory());
/// let registrar = TokenRegistrar::new(store.clone());
/// registrar.register_token("u1", "tok1").await.unwrap();
/// assert_eq!(store.get_token("u1").await.unwrap().unwrap().token, "tok1");
/// # }
/// ```
pub struct TokenRegistrar {
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenRegistrar {
    /// Creates a registrar using the system clock.
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            tokens,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for `updated_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upserts `token` as the delivery token for `owner_id`.
    ///
    /// Registering the same token twice leaves the same final mapping.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::InvalidInput`] if either argument is blank.
    /// - [`RegistrationError::Store`] if the write fails.
    pub async fn register_token(
        &self,
        owner_id: &str,
        token: &str,
    ) -> Result<DeliveryToken, RegistrationError> {
        let owner_id = owner_id.trim();
        let token = token.trim();
        if owner_id.is_empty() {
            return Err(RegistrationError::InvalidInput { field: "owner_id" });
        }
        if token.is_empty() {
            return Err(RegistrationError::InvalidInput { field: "token" });
        }

        match self.tokens.put_token(owner_id, token, self.clock.now()).await {
            Ok(record) => {
                tracing::info!(owner_id, "delivery token saved");
                Ok(record)
            },
            Err(err) => {
                tracing::error!(owner_id, error = %err, "failed to save delivery token");
                Err(RegistrationError::Store(err))
            },
        }
    }
}
