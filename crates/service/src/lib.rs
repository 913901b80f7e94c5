//! Account core: credential storage and the register/login use-case.
//! - Separates business logic from data access behind `CredentialStore`.
//! - Every operation takes a `RequestContext` carrying deadline and cancellation.
//! - Provides clear error types and documented interfaces.

pub mod accounts;
pub mod context;
