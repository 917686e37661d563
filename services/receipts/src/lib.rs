//! Receipt helper service
//!
//! An internal expense-receipt workflow: employees submit receipt documents
//! with metadata, administrators manage accounts, and the finance role
//! reviews, approves, rejects, and archives receipts, with email
//! notifications at the key transitions.

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod validation;
pub mod workflow;
