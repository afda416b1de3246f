//! Source of permission grants for the authorizer.

use crate::errors::ApiError;
use crate::models::Permissions;
use crate::repositories::{permissions, Store};
use uuid::Uuid;

/// Trait for permission lookups (enables mocking).
#[async_trait::async_trait]
pub trait GrantSource: Send + Sync {
    /// Every permission code currently granted to `user_id`. Never cached.
    async fn all_grants(&self, user_id: Uuid) -> Result<Permissions, ApiError>;
}

/// Grant source backed by the `users_permissions` table.
#[derive(Clone)]
pub struct StoreGrantSource {
    store: Store,
}

impl StoreGrantSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl GrantSource for StoreGrantSource {
    async fn all_grants(&self, user_id: Uuid) -> Result<Permissions, ApiError> {
        self.store
            .run(
                "permissions.all_for_user",
                permissions::all_for_user(self.store.pool(), user_id),
            )
            .await
    }
}

/// Mock grant sources for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed grant set and counts lookups.
    #[derive(Debug, Default)]
    pub struct CountingGrantSource {
        grants: Permissions,
        call_count: AtomicUsize,
    }

    impl CountingGrantSource {
        pub fn with_grants(codes: &[&str]) -> Self {
            Self {
                grants: codes.iter().map(|c| c.to_string()).collect(),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl GrantSource for CountingGrantSource {
        async fn all_grants(&self, _user_id: Uuid) -> Result<Permissions, ApiError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.grants.clone())
        }
    }
}
