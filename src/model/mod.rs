//! Data types and the operations on them.
//!
//! - [`db`] types are stored in MongoDB.
//! - [`api`] types are exchanged with clients.
//! - [`common`] types and rules are shared by both.

pub mod api;
pub mod common;
pub mod db;
pub mod lifecycle;
pub mod mongodb;
pub mod voting;
