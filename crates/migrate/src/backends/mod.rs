//! Database Backend Abstractions
//!
//! The engine is written against the [`DatabaseConnection`] capability;
//! PostgreSQL is the shipped implementation.

pub mod core;
pub mod postgres;

pub use self::core::*;
pub use postgres::{PostgresConnection, PostgresRow};
