//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Secrets such as password hashes are never serialised.
//!
//! Request bodies are validated with `validator` before use; see
//! [`validation::validated`].

pub mod auth;
pub mod comment;
pub mod pagination;
pub mod poll;
pub mod response;
pub mod user;
pub mod validation;
