use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{NewUserRecord, UserRecord};
use super::errors::StoreError;
use crate::context::RequestContext;

/// Persistence capability for user records, keyed by username.
///
/// `create` must be atomic: under concurrent calls with the same username
/// exactly one succeeds and the rest see [`StoreError::DuplicateUsername`].
/// Cancellation is checked before the write starts; a write that has
/// started is not abandoned. Lookups return `Ok(None)` for a missing record
/// and reserve errors for infrastructure failures.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, ctx: &RequestContext, record: NewUserRecord) -> Result<UserRecord, StoreError>;
    async fn find_by_username(&self, ctx: &RequestContext, username: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
}

/// In-process store backed by a sharded concurrent map.
pub mod memory {
    use super::*;
    use chrono::Utc;
    use dashmap::{mapref::entry::Entry, DashMap};
    use tracing::{debug, Span};

    pub struct MemoryCredentialStore {
        users: DashMap<String, UserRecord>, // key: username
        span: Span,
    }

    impl MemoryCredentialStore {
        pub fn new(span: Span) -> Self {
            Self { users: DashMap::new(), span }
        }

        pub fn len(&self) -> usize {
            self.users.len()
        }

        pub fn is_empty(&self) -> bool {
            self.users.is_empty()
        }
    }

    impl Default for MemoryCredentialStore {
        fn default() -> Self {
            Self::new(Span::none())
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn create(&self, ctx: &RequestContext, record: NewUserRecord) -> Result<UserRecord, StoreError> {
            ctx.check()?;
            // The entry guard holds the shard lock across check and insert.
            match self.users.entry(record.username.clone()) {
                Entry::Occupied(_) => {
                    debug!(parent: &self.span, username = %record.username, "username taken");
                    Err(StoreError::DuplicateUsername)
                }
                Entry::Vacant(slot) => {
                    let user = UserRecord {
                        id: Uuid::new_v4(),
                        username: record.username,
                        password_hash: record.password_hash,
                        password_algorithm: record.password_algorithm,
                        email: record.email,
                        created_at: Utc::now(),
                    };
                    slot.insert(user.clone());
                    debug!(parent: &self.span, user_id = %user.id, username = %user.username, "user stored");
                    Ok(user)
                }
            }
        }

        async fn find_by_username(&self, ctx: &RequestContext, username: &str) -> Result<Option<UserRecord>, StoreError> {
            ctx.check()?;
            Ok(self.users.get(username).map(|u| u.value().clone()))
        }

        async fn find_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
            ctx.check()?;
            Ok(self.users.iter().find(|u| u.id == id).map(|u| u.value().clone()))
        }
    }

}
