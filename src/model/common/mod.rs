//! Types shared between the database and API representations.

pub mod access;
pub mod group;
pub mod points;
pub mod poll;
