//! # École Common Library
//!
//! Shared code for the École services including:
//! - Domain models (students, classes, school years, affectations, recouvrements)
//! - Numeric key coercion and raw-record normalization
//! - Recouvrement ledger computation and dashboard statistics
//! - Configuration loading and database schema
//! - Password hashing and session types

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod matricule;
pub mod models;
pub mod normalize;
pub mod stats;

pub use error::{Error, Result};
pub use ledger::{LedgerSummary, PaymentStatus};
