//! Common library for the receipt helper application
//!
//! This crate provides shared infrastructure used by the receipt service:
//! database connectivity and infrastructure error handling.

pub mod database;
pub mod error;
