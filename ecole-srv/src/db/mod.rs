//! Database access layer for ecole-srv
//!
//! Functions return `sqlx::Result` so constraint violations reach the API
//! layer intact and can be reported as collisions.

pub mod affectations;
pub mod identity;
pub mod recouvrements;
pub mod stats;
pub mod users;

/// Outcome of an idempotent insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert<T> {
    /// A new row was written
    Created(T),
    /// The row was already there and is returned untouched
    Existing(T),
    /// Another uniqueness constraint blocked the insert and no row matches the key
    Conflict,
}

/// Today's year, used to bound birth years and stamp matricules
pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}
