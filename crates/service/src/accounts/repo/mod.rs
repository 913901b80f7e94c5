//! Persistent `CredentialStore` backends.

#[cfg(feature = "seaorm")]
pub mod seaorm;
