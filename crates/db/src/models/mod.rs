//! Row structs matching the database tables.

pub mod session;
pub mod user;
