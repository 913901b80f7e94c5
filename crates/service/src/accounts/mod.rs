//! Accounts module: three-layer architecture (domain, repository, service).
//!
//! Registration and login business logic lives in [`service::AccountService`];
//! storage sits behind the [`repository::CredentialStore`] trait.

pub mod domain;
pub mod errors;
pub mod password;
pub mod repo;
pub mod repository;
pub mod service;
pub mod token;
pub mod validation;

pub use errors::{AccountError, StoreError};
pub use repository::CredentialStore;
pub use service::{AccountConfig, AccountService};
