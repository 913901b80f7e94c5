use async_trait::async_trait;
use models::errors::ModelError;
use sea_orm::DatabaseConnection;
use tracing::{debug, warn, Span};
use uuid::Uuid;

use crate::accounts::domain::{NewUserRecord, UserRecord};
use crate::accounts::errors::StoreError;
use crate::accounts::repository::CredentialStore;
use crate::context::RequestContext;

/// PostgreSQL-backed store. Username uniqueness is the table's UNIQUE
/// constraint; each call is a single statement, so a cancelled call is
/// either fully applied or not at all.
pub struct SeaOrmCredentialStore {
    db: DatabaseConnection,
    span: Span,
}

impl SeaOrmCredentialStore {
    pub fn new(db: DatabaseConnection, span: Span) -> Self {
        Self { db, span }
    }
}

fn to_record(m: models::user_account::Model) -> UserRecord {
    UserRecord {
        id: m.id,
        username: m.username,
        password_hash: m.password_hash,
        password_algorithm: m.password_algorithm,
        email: m.email,
        created_at: m.created_at.into(),
    }
}

impl SeaOrmCredentialStore {
    fn map_err(&self, err: ModelError) -> StoreError {
        match err {
            ModelError::Duplicate(_) => StoreError::DuplicateUsername,
            ModelError::Validation(msg) | ModelError::Db(msg) => {
                warn!(parent: &self.span, error = %msg, "credential store query failed");
                StoreError::Unavailable(msg)
            }
        }
    }
}

#[async_trait]
impl CredentialStore for SeaOrmCredentialStore {
    async fn create(&self, ctx: &RequestContext, record: NewUserRecord) -> Result<UserRecord, StoreError> {
        // An autocommit INSERT that has been sent cannot be taken back, so
        // cancellation is only observed before it starts.
        ctx.check()?;
        let created = models::user_account::create(
            &self.db,
            &record.username,
            &record.password_hash,
            &record.password_algorithm,
            &record.email,
        )
        .await
        .map_err(|e| self.map_err(e))?;
        debug!(parent: &self.span, user_id = %created.id, username = %created.username, "user stored");
        Ok(to_record(created))
    }

    async fn find_by_username(&self, ctx: &RequestContext, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let found = ctx
            .run(models::user_account::find_by_username(&self.db, username))
            .await?
            .map_err(|e| self.map_err(e))?;
        Ok(found.map(to_record))
    }

    async fn find_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let found = ctx
            .run(models::user_account::find_by_id(&self.db, id))
            .await?
            .map_err(|e| self.map_err(e))?;
        Ok(found.map(to_record))
    }
}
