//! # Rollcall Common Library
//!
//! Shared code for the Rollcall attendance service:
//! - Database schema initialization and domain models
//! - Configuration loading and root folder resolution
//! - Calendar-day helpers used for attendance dates
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
