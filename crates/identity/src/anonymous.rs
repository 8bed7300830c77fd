//! Anonymous identity for public mode
//!
//! When the backend runs without authentication the console still needs a
//! stable per-user id to correlate shared configuration and image pulls.
//! The id is a v4 UUID generated once and kept in the key-value store under
//! `USER_ID_KEY`; it is only regenerated if the stored value is missing or
//! not a UUID.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::USER_ID_KEY;
use crate::error::Result;
use crate::store::KeyValueStore;

pub struct AnonymousIdentityStore {
    store: Arc<dyn KeyValueStore>,
}

impl AnonymousIdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Return the persisted anonymous id, generating and persisting one first
    /// if none is stored yet.
    pub async fn get_or_create(&self) -> Result<String> {
        match self.store.get(USER_ID_KEY).await? {
            Some(existing) if Uuid::parse_str(existing.trim()).is_ok() => {
                debug!("reusing persisted anonymous user id");
                return Ok(existing.trim().to_string());
            }
            Some(invalid) => {
                warn!(value = %invalid, "stored anonymous user id is not a UUID, regenerating");
            }
            None => {}
        }

        let id = Uuid::new_v4().to_string();
        self.store.set(USER_ID_KEY, id.clone()).await?;
        info!(user_id = %id, "generated anonymous user id");
        Ok(id)
    }
}
