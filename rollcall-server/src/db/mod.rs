//! Database access layer for rollcall-server
//!
//! One module per table. Functions take the pool (or a connection when they
//! must run inside a caller's transaction) so storage is always injected.

pub mod attendance;
pub mod classes;
pub mod notifications;
pub mod students;
pub mod users;

pub use rollcall_common::db::init::{init_database, init_memory_database};
