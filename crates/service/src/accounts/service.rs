use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, Span};
use zeroize::Zeroizing;

use super::domain::{AccountView, AuthToken, LoginInput, NewUserRecord, RegisterInput, UserRecord};
use super::errors::AccountError;
use super::password::{HashParams, PasswordHasher, ALGORITHM_LABEL};
use super::repository::CredentialStore;
use super::token::TokenIssuer;
use super::validation::{validate_email, validate_password, validate_username, MAX_PASSWORD_BYTES};
use crate::context::RequestContext;

/// Account service configuration
#[derive(Clone)]
pub struct AccountConfig {
    pub jwt_secret: String,
    pub token_issuer: String,
    pub token_ttl: Duration,
    pub min_password_length: usize,
    pub hash_params: HashParams,
}

impl AccountConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_issuer: "user-account".into(),
            token_ttl: Duration::from_secs(15 * 60),
            min_password_length: 1,
            hash_params: HashParams::default(),
        }
    }
}

/// Registration and login, independent of web framework and storage.
///
/// Stateless apart from its collaborators; share it behind an `Arc`.
pub struct AccountService<S: CredentialStore + ?Sized = dyn CredentialStore> {
    store: Arc<S>,
    hasher: Arc<PasswordHasher>,
    tokens: TokenIssuer,
    min_password_length: usize,
    span: Span,
}

impl<S: CredentialStore + ?Sized> AccountService<S> {
    /// `span` parents every event this service emits.
    pub fn new(store: Arc<S>, cfg: AccountConfig, span: Span) -> Result<Self, AccountError> {
        if cfg.jwt_secret.is_empty() {
            return Err(AccountError::Token("signing secret must not be empty".into()));
        }
        let hasher = PasswordHasher::new(cfg.hash_params)?;
        let tokens = TokenIssuer::new(cfg.jwt_secret.as_bytes(), cfg.token_issuer, cfg.token_ttl)
            .map_err(|e| AccountError::Token(e.to_string()))?;
        Ok(Self {
            store,
            hasher: Arc::new(hasher),
            tokens,
            min_password_length: cfg.min_password_length,
            span,
        })
    }

    /// Register a new user with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::accounts::{AccountService, AccountConfig, domain::RegisterInput};
    /// use service::accounts::{password::HashParams, repository::memory::MemoryCredentialStore};
    /// use service::context::RequestContext;
    /// use std::sync::Arc;
    /// let store = Arc::new(MemoryCredentialStore::default());
    /// let cfg = AccountConfig { hash_params: HashParams::insecure_fast(), ..AccountConfig::new("secret") };
    /// let svc = AccountService::new(store, cfg, tracing::Span::none()).unwrap();
    /// let input = RegisterInput { username: "alice".into(), password: "s3cret!".into(), email: "a@x.com".into() };
    /// let user = tokio_test::block_on(svc.register(&RequestContext::new(), input)).unwrap();
    /// assert_eq!(user.username, "alice");
    /// assert_ne!(user.password_hash, "s3cret!");
    /// ```
    #[instrument(parent = &self.span, name = "register", skip_all, fields(username = %input.username))]
    pub async fn register(&self, ctx: &RequestContext, input: RegisterInput) -> Result<UserRecord, AccountError> {
        let RegisterInput { username, password, email } = input;
        let password = Zeroizing::new(password);
        validate_username(&username)?;
        validate_password(&password, self.min_password_length)?;
        validate_email(&email)?;

        let password_hash = self.hash_password(ctx, password).await?;
        let record = NewUserRecord {
            username,
            password_hash,
            password_algorithm: ALGORITHM_LABEL.to_string(),
            email,
        };
        // Last cancellation point: once the insert is issued it runs to
        // completion so the reply always matches what was stored.
        ctx.check()?;
        let user = self.store.create(ctx, record).await?;
        info!(user_id = %user.id, "user_registered");
        Ok(user)
    }

    /// Authenticate a user and issue a bearer token.
    ///
    /// Unknown usernames and wrong passwords both yield
    /// [`AccountError::InvalidCredentials`], after comparable hashing work.
    ///
    /// # Examples
    /// ```
    /// use service::accounts::{AccountService, AccountConfig, domain::{RegisterInput, LoginInput}};
    /// use service::accounts::{password::HashParams, repository::memory::MemoryCredentialStore};
    /// use service::context::RequestContext;
    /// use std::sync::Arc;
    /// let store = Arc::new(MemoryCredentialStore::default());
    /// let cfg = AccountConfig { hash_params: HashParams::insecure_fast(), ..AccountConfig::new("secret") };
    /// let svc = AccountService::new(store, cfg, tracing::Span::none()).unwrap();
    /// let ctx = RequestContext::new();
    /// let _ = tokio_test::block_on(svc.register(&ctx, RegisterInput { username: "u".into(), password: "Passw0rd".into(), email: "u@e.com".into() }));
    /// let token = tokio_test::block_on(svc.login(&ctx, LoginInput { username: "u".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(token.token_type, "Bearer");
    /// ```
    #[instrument(parent = &self.span, name = "login", skip_all, fields(username = %input.username))]
    pub async fn login(&self, ctx: &RequestContext, input: LoginInput) -> Result<AuthToken, AccountError> {
        let LoginInput { username, password } = input;
        let password = Zeroizing::new(password);
        if password.len() > MAX_PASSWORD_BYTES {
            debug!("login_rejected: oversized password");
            return Err(AccountError::InvalidCredentials);
        }

        let found = ctx.run(self.store.find_by_username(ctx, &username)).await??;
        let verified = match found {
            Some(user) => {
                let matches = self.verify_password(ctx, password, Some(user.password_hash.clone())).await?;
                matches.then_some(user)
            }
            None => {
                self.verify_password(ctx, password, None).await?;
                None
            }
        };
        let Some(user) = verified else {
            info!("login_rejected");
            return Err(AccountError::InvalidCredentials);
        };

        let token = self.tokens.issue(&user).map_err(|e| AccountError::Token(e.to_string()))?;
        info!(user_id = %user.id, expires_at = %token.expires_at, "user_logged_in");
        Ok(token)
    }

    /// Resolve a bearer token to the account it was issued for.
    #[instrument(parent = &self.span, name = "authenticate", skip_all)]
    pub async fn authenticate(&self, ctx: &RequestContext, token: &str) -> Result<AccountView, AccountError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "token_rejected");
            AccountError::InvalidCredentials
        })?;
        let id = claims.user_id().ok_or(AccountError::InvalidCredentials)?;
        let user = ctx
            .run(self.store.find_by_id(ctx, id))
            .await??
            .ok_or(AccountError::InvalidCredentials)?;
        Ok(AccountView::from(user))
    }

    async fn hash_password(&self, ctx: &RequestContext, password: Zeroizing<String>) -> Result<String, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let task = tokio::task::spawn_blocking(move || hasher.hash(&password));
        ctx.run(task).await?.map_err(|e| AccountError::Hashing(e.to_string()))?
    }

    /// `None` runs a dummy verification so unknown users cost the same.
    async fn verify_password(
        &self,
        ctx: &RequestContext,
        password: Zeroizing<String>,
        stored_hash: Option<String>,
    ) -> Result<bool, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let task = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        });
        ctx.run(task).await?.map_err(|e| AccountError::Hashing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::errors::StoreError;
    use crate::accounts::repository::memory::MemoryCredentialStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    fn config() -> AccountConfig {
        AccountConfig { hash_params: HashParams::insecure_fast(), ..AccountConfig::new("test-secret") }
    }

    fn service() -> (Arc<MemoryCredentialStore>, AccountService<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::default());
        let svc = AccountService::new(Arc::clone(&store), config(), Span::none()).unwrap();
        (store, svc)
    }

    fn register_input(username: &str, password: &str, email: &str) -> RegisterInput {
        RegisterInput { username: username.into(), password: password.into(), email: email.into() }
    }

    fn login_input(username: &str, password: &str) -> LoginInput {
        LoginInput { username: username.into(), password: password.into() }
    }

    #[tokio::test]
    async fn register_then_login_issues_token() {
        let (_, svc) = service();
        let ctx = RequestContext::new();
        let user = svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        let token = svc.login(&ctx, login_input("alice", "s3cret!")).await.unwrap();
        assert!(!token.token.is_empty());
        assert!(token.expires_at > chrono::Utc::now());

        let me = svc.authenticate(&ctx, &token.token).await.unwrap();
        assert_eq!(me, AccountView::from(&user));
    }

    #[tokio::test]
    async fn duplicate_username_keeps_single_record() {
        let (store, svc) = service();
        let ctx = RequestContext::new();
        let first = svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        let second = svc.register(&ctx, register_input("alice", "other", "b@x.com")).await;
        assert_eq!(second.unwrap_err(), AccountError::DuplicateUsername);
        assert_eq!(store.len(), 1);
        let stored = store.find_by_username(&ctx, "alice").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn plaintext_never_stored() {
        let (store, svc) = service();
        let ctx = RequestContext::new();
        svc.register(&ctx, register_input("bob", "hunter2hunter2", "b@x.com")).await.unwrap();
        let stored = store.find_by_username(&ctx, "bob").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter2hunter2");
        assert!(!stored.password_hash.contains("hunter2"));
        assert_eq!(stored.password_algorithm, "argon2id");
        assert!(!format!("{stored:?}").contains("argon2id$"));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (_, svc) = service();
        let ctx = RequestContext::new();
        svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        let wrong_password = svc.login(&ctx, login_input("alice", "nope")).await.unwrap_err();
        let unknown_user = svc.login(&ctx, login_input("mallory", "s3cret!")).await.unwrap_err();
        assert_eq!(wrong_password, AccountError::InvalidCredentials);
        assert_eq!(wrong_password, unknown_user);
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn validation_runs_before_store() {
        let (store, svc) = service();
        let ctx = RequestContext::new();
        for input in [
            register_input("", "pw", "a@x.com"),
            register_input("alice", "", "a@x.com"),
            register_input("alice", "pw", "not-an-email"),
            register_input(" alice", "pw", "a@x.com"),
        ] {
            let err = svc.register(&ctx, input).await.unwrap_err();
            assert!(matches!(err, AccountError::Validation(_)), "{err:?}");
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn min_password_length_is_enforced() {
        let store = Arc::new(MemoryCredentialStore::default());
        let cfg = AccountConfig { min_password_length: 8, ..config() };
        let svc = AccountService::new(store, cfg, Span::none()).unwrap();
        let err = svc.register(&RequestContext::new(), register_input("alice", "short", "a@x.com")).await;
        assert!(matches!(err, Err(AccountError::Validation(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_have_one_winner() {
        let (store, svc) = service();
        let svc = Arc::new(svc);
        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.register(&RequestContext::new(), register_input("race", &format!("pw-{i}"), "r@x.com")).await
            }));
        }
        let mut winners = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_eq!(e, AccountError::DuplicateUsername),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_register_writes_nothing() {
        let (store, svc) = service();
        let ctx = RequestContext::new();
        ctx.cancel();
        let err = svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap_err();
        assert_eq!(err, AccountError::Cancelled);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_deadline_cancels_login() {
        let (_, svc) = service();
        svc.register(&RequestContext::new(), register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        let ctx = RequestContext::with_timeout(Duration::ZERO);
        let err = svc.login(&ctx, login_input("alice", "s3cret!")).await.unwrap_err();
        assert_eq!(err, AccountError::Cancelled);
    }

    #[tokio::test]
    async fn foreign_token_rejected() {
        let (_, svc) = service();
        let ctx = RequestContext::new();
        svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();

        let other_cfg = AccountConfig { jwt_secret: "other-secret".into(), ..config() };
        let other = AccountService::new(Arc::new(MemoryCredentialStore::default()), other_cfg, Span::none()).unwrap();
        other.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        let token = other.login(&ctx, login_input("alice", "s3cret!")).await.unwrap();

        assert_eq!(svc.authenticate(&ctx, &token.token).await.unwrap_err(), AccountError::InvalidCredentials);
        assert_eq!(svc.authenticate(&ctx, "garbage").await.unwrap_err(), AccountError::InvalidCredentials);
    }

    struct DownStore;

    #[async_trait]
    impl CredentialStore for DownStore {
        async fn create(&self, _: &RequestContext, _: NewUserRecord) -> Result<UserRecord, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_by_username(&self, _: &RequestContext, _: &str) -> Result<Option<UserRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_by_id(&self, _: &RequestContext, _: Uuid) -> Result<Option<UserRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let store: Arc<dyn CredentialStore> = Arc::new(DownStore);
        let svc: AccountService = AccountService::new(store, config(), Span::none()).unwrap();
        let ctx = RequestContext::new();
        let err = svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::StoreUnavailable(_)));
        assert!(err.is_transient());
        let err = svc.login(&ctx, login_input("alice", "s3cret!")).await.unwrap_err();
        assert!(matches!(err, AccountError::StoreUnavailable(_)));
    }

    /// Commits the record, then sees the request cancelled before returning.
    struct CancelledMidWrite {
        inner: MemoryCredentialStore,
    }

    #[async_trait]
    impl CredentialStore for CancelledMidWrite {
        async fn create(&self, ctx: &RequestContext, record: NewUserRecord) -> Result<UserRecord, StoreError> {
            let user = self.inner.create(&RequestContext::new(), record).await?;
            ctx.cancel();
            tokio::task::yield_now().await;
            Ok(user)
        }
        async fn find_by_username(&self, ctx: &RequestContext, username: &str) -> Result<Option<UserRecord>, StoreError> {
            self.inner.find_by_username(ctx, username).await
        }
        async fn find_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
            self.inner.find_by_id(ctx, id).await
        }
    }

    #[tokio::test]
    async fn started_write_is_reported_not_cancelled() {
        let store = Arc::new(CancelledMidWrite { inner: MemoryCredentialStore::default() });
        let svc = AccountService::new(Arc::clone(&store), config(), Span::none()).unwrap();
        let ctx = RequestContext::new();
        let user = svc.register(&ctx, register_input("alice", "s3cret!", "a@x.com")).await.unwrap();
        assert!(ctx.is_cancelled());
        assert_eq!(store.inner.len(), 1);
        let stored = store.inner.find_by_username(&RequestContext::new(), "alice").await.unwrap().unwrap();
        assert_eq!(stored.id, user.id);
    }

    #[test]
    fn out_of_range_token_ttl_rejected() {
        let cfg = AccountConfig { token_ttl: Duration::from_secs(u64::MAX / 2), ..config() };
        let res = AccountService::new(Arc::new(MemoryCredentialStore::default()), cfg, Span::none());
        assert!(matches!(res, Err(AccountError::Token(_))));
    }

    #[test]
    fn empty_secret_rejected() {
        let store = Arc::new(MemoryCredentialStore::default());
        let res = AccountService::new(store, AccountConfig::new(""), Span::none());
        assert!(matches!(res, Err(AccountError::Token(_))));
    }
}
